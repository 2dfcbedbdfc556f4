use super::{LockMode, SharedMutexInterface};
use crate::time::TimePoint;
use core::time::Duration;

/// A scoped shared (reader) lock.
///
/// Mirrors [`UniqueLock`](super::UniqueLock), but over the `*_shared`
/// operations of a shared mutex. Any number of `SharedLock`s may own the
/// same mutex at once; keeping writers out is the mutex's job.
#[derive(Debug)]
pub struct SharedLock<'a> {
    // `None` once the guard has been released from its mutex.
    mutex: Option<SharedMutexInterface<'a>>,
    owned: bool,
}

impl<'a> SharedLock<'a> {
    /// Lock `mutex` shared, blocking until it is held.
    pub fn new(mutex: impl Into<SharedMutexInterface<'a>>) -> Self {
        Self::with_mode(mutex, LockMode::Immediate)
    }

    /// Associate with `mutex` without locking it.
    pub fn deferred(mutex: impl Into<SharedMutexInterface<'a>>) -> Self {
        Self::with_mode(mutex, LockMode::Deferred)
    }

    /// Make one non-blocking attempt to lock `mutex` shared.
    pub fn try_new(mutex: impl Into<SharedMutexInterface<'a>>) -> Self {
        Self::with_mode(mutex, LockMode::Try)
    }

    /// Take over a shared hold on `mutex` the calling thread already has.
    pub fn adopt(mutex: impl Into<SharedMutexInterface<'a>>) -> Self {
        Self::with_mode(mutex, LockMode::Adopt)
    }

    /// Associate with `mutex`, acquiring it shared as `mode` says.
    pub fn with_mode(mutex: impl Into<SharedMutexInterface<'a>>, mode: LockMode) -> Self {
        let mutex = mutex.into();
        let owned = match mode {
            LockMode::Immediate => {
                mutex.lock_shared();
                true
            }
            LockMode::Deferred => false,
            LockMode::Try => mutex.try_lock_shared(),
            LockMode::Adopt => true,
        };
        Self {
            mutex: Some(mutex),
            owned,
        }
    }

    /// Block until the mutex is held shared.
    ///
    /// # Panics
    ///
    /// Panics if this guard already owns its mutex.
    #[track_caller]
    pub fn lock(&mut self) {
        self.acquirable("SharedLock::lock").lock_shared();
        self.owned = true;
    }

    /// Make one non-blocking attempt to lock the mutex shared.
    #[track_caller]
    pub fn try_lock(&mut self) -> bool {
        self.owned = self.acquirable("SharedLock::try_lock").try_lock_shared();
        self.owned
    }

    /// Try to lock the mutex shared, waiting at most `duration`.
    ///
    /// # Panics
    ///
    /// Panics if this guard already owns its mutex, or if the mutex isn't a
    /// timed kind.
    #[track_caller]
    pub fn try_lock_for(&mut self, duration: Duration) -> bool {
        let mutex = self.acquirable("SharedLock::try_lock_for");
        let Some(timed) = mutex.as_timed() else {
            panic!("SharedLock::try_lock_for called on a SharedLock associated with a non-timed mutex");
        };
        self.owned = timed.try_lock_shared_for(duration);
        self.owned
    }

    /// Try to lock the mutex shared, waiting until `stop_point` at the
    /// latest.
    #[track_caller]
    pub fn try_lock_until(&mut self, stop_point: TimePoint) -> bool {
        let mutex = self.acquirable("SharedLock::try_lock_until");
        let Some(timed) = mutex.as_timed() else {
            panic!("SharedLock::try_lock_until called on a SharedLock associated with a non-timed mutex");
        };
        self.owned = timed.try_lock_shared_until(stop_point);
        self.owned
    }

    /// Release the shared hold. The guard may lock again afterwards.
    ///
    /// # Panics
    ///
    /// Panics if this guard doesn't own its mutex.
    #[track_caller]
    pub fn unlock(&mut self) {
        if !self.owned {
            panic!("SharedLock::unlock called on a SharedLock that has not acquired its mutex");
        }
        let Some(mutex) = self.mutex else {
            panic!("SharedLock::unlock called on a SharedLock that has been moved out of");
        };
        mutex.unlock_shared();
        self.owned = false;
    }

    /// Disassociate from the mutex without unlocking it, returning it.
    pub fn release(&mut self) -> Option<SharedMutexInterface<'a>> {
        self.owned = false;
        self.mutex.take()
    }

    /// The mutex this guard is associated with, if it hasn't been released.
    #[inline]
    pub fn mutex(&self) -> Option<SharedMutexInterface<'a>> {
        self.mutex
    }

    /// Whether this guard currently holds a shared lock on its mutex.
    #[inline]
    pub fn owns_lock(&self) -> bool {
        self.owned
    }

    #[track_caller]
    fn acquirable(&self, caller: &str) -> SharedMutexInterface<'a> {
        if self.owned {
            panic!("{caller} called on a SharedLock that has already acquired its mutex");
        }
        match self.mutex {
            Some(mutex) => mutex,
            None => panic!("{caller} called on a SharedLock that has been moved out of"),
        }
    }
}

impl Drop for SharedLock<'_> {
    fn drop(&mut self) {
        if let (true, Some(mutex)) = (self.owned, self.mutex) {
            mutex.unlock_shared();
        }
    }
}
