use super::MutexInterface;
use crate::time::TimePoint;
use core::time::Duration;

/// How a lock guard acquires its mutex on construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Block until the mutex is held.
    Immediate,
    /// Don't touch the mutex; the guard starts out not owning it.
    Deferred,
    /// Make one non-blocking attempt.
    Try,
    /// The calling thread already holds the mutex; take over responsibility
    /// for unlocking it.
    Adopt,
}

/// A scoped exclusive lock.
///
/// If the guard owns its mutex when it is dropped, the mutex is unlocked.
#[derive(Debug)]
pub struct UniqueLock<'a> {
    // `None` once the guard has been released from its mutex.
    mutex: Option<MutexInterface<'a>>,
    owned: bool,
}

impl<'a> UniqueLock<'a> {
    /// Lock `mutex`, blocking until it is held.
    pub fn new(mutex: impl Into<MutexInterface<'a>>) -> Self {
        Self::with_mode(mutex, LockMode::Immediate)
    }

    /// Associate with `mutex` without locking it.
    pub fn deferred(mutex: impl Into<MutexInterface<'a>>) -> Self {
        Self::with_mode(mutex, LockMode::Deferred)
    }

    /// Make one non-blocking attempt to lock `mutex`; check
    /// [`owns_lock`](Self::owns_lock) for the outcome.
    pub fn try_new(mutex: impl Into<MutexInterface<'a>>) -> Self {
        Self::with_mode(mutex, LockMode::Try)
    }

    /// Take over a `mutex` the calling thread already holds.
    pub fn adopt(mutex: impl Into<MutexInterface<'a>>) -> Self {
        Self::with_mode(mutex, LockMode::Adopt)
    }

    /// Associate with `mutex`, acquiring it as `mode` says.
    pub fn with_mode(mutex: impl Into<MutexInterface<'a>>, mode: LockMode) -> Self {
        let mutex = mutex.into();
        let owned = match mode {
            LockMode::Immediate => {
                mutex.lock();
                true
            }
            LockMode::Deferred => false,
            LockMode::Try => mutex.try_lock(),
            LockMode::Adopt => true,
        };
        Self {
            mutex: Some(mutex),
            owned,
        }
    }

    /// Block until the mutex is held.
    ///
    /// # Panics
    ///
    /// Panics if this guard already owns its mutex.
    #[track_caller]
    pub fn lock(&mut self) {
        self.acquirable("UniqueLock::lock").lock();
        self.owned = true;
    }

    /// Make one non-blocking attempt to lock the mutex.
    ///
    /// # Panics
    ///
    /// Panics if this guard already owns its mutex.
    #[track_caller]
    pub fn try_lock(&mut self) -> bool {
        self.owned = self.acquirable("UniqueLock::try_lock").try_lock();
        self.owned
    }

    /// Try to lock the mutex, waiting at most `duration`.
    ///
    /// # Panics
    ///
    /// Panics if this guard already owns its mutex, or if the mutex isn't a
    /// timed kind.
    #[track_caller]
    pub fn try_lock_for(&mut self, duration: Duration) -> bool {
        let mutex = self.acquirable("UniqueLock::try_lock_for");
        let Some(timed) = mutex.as_timed() else {
            panic!("UniqueLock::try_lock_for called on a UniqueLock associated with a non-timed mutex");
        };
        self.owned = timed.try_lock_for(duration);
        self.owned
    }

    /// Try to lock the mutex, waiting until `stop_point` at the latest.
    ///
    /// # Panics
    ///
    /// Panics if this guard already owns its mutex, or if the mutex isn't a
    /// timed kind.
    #[track_caller]
    pub fn try_lock_until(&mut self, stop_point: TimePoint) -> bool {
        let mutex = self.acquirable("UniqueLock::try_lock_until");
        let Some(timed) = mutex.as_timed() else {
            panic!("UniqueLock::try_lock_until called on a UniqueLock associated with a non-timed mutex");
        };
        self.owned = timed.try_lock_until(stop_point);
        self.owned
    }

    /// Unlock the mutex. The guard stays associated with it and may lock it
    /// again.
    ///
    /// # Panics
    ///
    /// Panics if this guard doesn't own its mutex.
    #[track_caller]
    pub fn unlock(&mut self) {
        if !self.owned {
            panic!("UniqueLock::unlock called on a UniqueLock that has not acquired its mutex");
        }
        let Some(mutex) = self.mutex else {
            panic!("UniqueLock::unlock called on a UniqueLock that has been moved out of");
        };
        mutex.unlock();
        self.owned = false;
    }

    /// Disassociate from the mutex without unlocking it, returning it.
    ///
    /// If the guard owned the mutex, the caller is now responsible for
    /// unlocking it. Afterwards, every operation on this guard panics and
    /// dropping it does nothing.
    pub fn release(&mut self) -> Option<MutexInterface<'a>> {
        self.owned = false;
        self.mutex.take()
    }

    /// The mutex this guard is associated with, if it hasn't been released.
    #[inline]
    pub fn mutex(&self) -> Option<MutexInterface<'a>> {
        self.mutex
    }

    /// Whether this guard currently holds its mutex.
    #[inline]
    pub fn owns_lock(&self) -> bool {
        self.owned
    }

    pub(crate) fn is_lock_of<'m>(&self, mutex: impl Into<MutexInterface<'m>>) -> bool {
        self.mutex.map_or(false, |m| m == mutex.into())
    }

    #[track_caller]
    fn acquirable(&self, caller: &str) -> MutexInterface<'a> {
        if self.owned {
            panic!("{caller} called on a UniqueLock that has already acquired its mutex");
        }
        match self.mutex {
            Some(mutex) => mutex,
            None => panic!("{caller} called on a UniqueLock that has been moved out of"),
        }
    }
}

impl Drop for UniqueLock<'_> {
    fn drop(&mut self) {
        if let (true, Some(mutex)) = (self.owned, self.mutex) {
            mutex.unlock();
        }
    }
}
