use super::{Condvar, CondvarStatus, UniqueLock};
use crate::basic::{BasicMutex, BasicRecursiveMutex};
use crate::thread::{current_thread_id, ThreadId};
use crate::time::{system_clock_now, TimePoint};
use core::cell::UnsafeCell;
use core::time::Duration;

/// A plain exclusive mutex.
///
/// Locking it again on the thread that holds it deadlocks.
pub struct Mutex {
    inner: BasicMutex,
}

impl Mutex {
    /// Construct an unlocked mutex.
    pub fn new() -> Self {
        Self {
            inner: BasicMutex::new().expect("Failed to create a new BasicMutex in Mutex::new"),
        }
    }

    /// Block until the calling thread holds the mutex.
    #[inline]
    pub fn lock(&self) {
        self.inner.lock().expect("Mutex::lock: futex wait failed");
    }

    /// Take the mutex if it is free, without blocking.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.inner.try_lock()
    }

    /// Release the mutex. The calling thread must hold it.
    #[inline]
    pub fn unlock(&self) {
        self.inner.unlock().expect("Mutex::unlock: futex wake failed");
    }

    #[inline]
    pub(crate) fn native(&self) -> &BasicMutex {
        &self.inner
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

/// A mutex its owning thread may lock again without deadlocking.
///
/// N calls to `lock` on one thread need N calls to `unlock` before another
/// thread can take it.
pub struct RecursiveMutex {
    inner: BasicRecursiveMutex,
}

impl RecursiveMutex {
    /// Construct an unlocked recursive mutex.
    pub fn new() -> Self {
        Self {
            inner: BasicRecursiveMutex::new()
                .expect("Failed to create a new BasicRecursiveMutex in RecursiveMutex::new"),
        }
    }

    /// Block until the calling thread holds the mutex, or add a level if it
    /// already does.
    #[inline]
    pub fn lock(&self) {
        self.inner
            .lock()
            .expect("RecursiveMutex::lock: recursion limit reached or futex wait failed");
    }

    /// Take the mutex (or add a level) without blocking.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.inner.try_lock()
    }

    /// Release one level. The calling thread must hold the mutex.
    #[inline]
    pub fn unlock(&self) {
        self.inner
            .unlock()
            .expect("RecursiveMutex::unlock called by a thread that doesn't hold it");
    }

    #[inline]
    pub(crate) fn native(&self) -> &BasicRecursiveMutex {
        &self.inner
    }
}

impl Default for RecursiveMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// A mutex that also supports giving up after a deadline.
///
/// Ownership is a flag guarded by an internal `Mutex`; waiters sleep on a
/// `Condvar` until the flag clears.
pub struct TimedMutex {
    guard: Mutex,
    signal: Condvar,
    // Only accessed while `guard` is held.
    locked: UnsafeCell<bool>,
}

// SAFETY: `locked` is only read or written through `TimedMutex::locked`,
// which requires a `UniqueLock` that holds `guard`.
unsafe impl Sync for TimedMutex {}

impl TimedMutex {
    /// Construct an unlocked timed mutex.
    pub fn new() -> Self {
        #[cfg(feature = "log")]
        log::trace!(target: "cnx_sync::mutex", "TimedMutex created");

        Self {
            guard: Mutex::new(),
            signal: Condvar::new(),
            locked: UnsafeCell::new(false),
        }
    }

    /// Block until the calling thread owns the mutex.
    pub fn lock(&self) {
        let mut lock = UniqueLock::new(&self.guard);
        while *self.locked(&lock) {
            self.signal.wait(&mut lock);
        }
        *self.locked(&lock) = true;
    }

    /// Take the mutex if it is free, without blocking.
    ///
    /// This also fails if another thread is momentarily inside one of this
    /// mutex's operations.
    pub fn try_lock(&self) -> bool {
        let lock = UniqueLock::try_new(&self.guard);
        if lock.owns_lock() && !*self.locked(&lock) {
            *self.locked(&lock) = true;
            return true;
        }
        false
    }

    /// Try to take the mutex, waiting at most `duration` (measured on the
    /// system clock).
    pub fn try_lock_for(&self, duration: Duration) -> bool {
        self.try_lock_until(system_clock_now() + duration)
    }

    /// Try to take the mutex, waiting until `stop_point` at the latest.
    pub fn try_lock_until(&self, stop_point: TimePoint) -> bool {
        let mut lock = UniqueLock::new(&self.guard);
        // "now" is re-read on every wake, so a spurious wake just loops.
        let mut not_timed_out = stop_point.is_future();
        while not_timed_out && *self.locked(&lock) {
            not_timed_out =
                self.signal.wait_until(&mut lock, stop_point) == CondvarStatus::NoTimeout;
        }

        let locked = self.locked(&lock);
        if !*locked {
            *locked = true;
            return true;
        }

        #[cfg(feature = "log")]
        log::trace!(target: "cnx_sync::mutex", "TimedMutex::try_lock_until timed out");

        false
    }

    /// Release the mutex and wake one waiter. The calling thread must own
    /// it.
    pub fn unlock(&self) {
        let lock = UniqueLock::new(&self.guard);
        *self.locked(&lock) = false;
        self.signal.notify_one();
    }

    #[inline]
    pub(crate) fn native(&self) -> &BasicMutex {
        self.guard.native()
    }

    /// Access the ownership flag. `held` proves the calling thread holds
    /// `guard`.
    #[allow(clippy::mut_from_ref)]
    fn locked<'g>(&'g self, held: &'g UniqueLock<'_>) -> &'g mut bool {
        debug_assert!(held.owns_lock() && held.is_lock_of(&self.guard));
        // SAFETY: `guard` is held, so no other thread is touching `locked`.
        unsafe { &mut *self.locked.get() }
    }
}

impl Default for TimedMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimedMutex {
    fn drop(&mut self) {
        #[cfg(feature = "log")]
        log::trace!(
            target: "cnx_sync::mutex",
            "TimedMutex freed (locked: {})",
            self.locked.get_mut()
        );
    }
}

struct RecursiveState {
    owner: ThreadId,
    times_locked: usize,
}

impl RecursiveState {
    /// Add a level for the owning thread; fails once the count is saturated.
    fn relock(&mut self) -> bool {
        match self.times_locked.checked_add(1) {
            Some(times_locked) => {
                self.times_locked = times_locked;
                true
            }
            None => false,
        }
    }

    fn claim(&mut self, owner: ThreadId) {
        self.owner = owner;
        self.times_locked = 1;
    }
}

/// A recursive mutex that also supports giving up after a deadline.
///
/// The owning thread id and the recursion depth are guarded by an internal
/// `Mutex`; other threads sleep on a `Condvar` until the depth drops to
/// zero.
pub struct RecursiveTimedMutex {
    guard: Mutex,
    signal: Condvar,
    // Only accessed while `guard` is held. `owner` is `NULL` whenever
    // `times_locked` is zero.
    state: UnsafeCell<RecursiveState>,
}

// SAFETY: `state` is only accessed through `RecursiveTimedMutex::state`,
// which requires a `UniqueLock` that holds `guard`.
unsafe impl Sync for RecursiveTimedMutex {}

impl RecursiveTimedMutex {
    /// Construct an unlocked recursive timed mutex.
    pub fn new() -> Self {
        #[cfg(feature = "log")]
        log::trace!(target: "cnx_sync::mutex", "RecursiveTimedMutex created");

        Self {
            guard: Mutex::new(),
            signal: Condvar::new(),
            state: UnsafeCell::new(RecursiveState {
                owner: ThreadId::NULL,
                times_locked: 0,
            }),
        }
    }

    /// Block until the calling thread owns the mutex, or add a level if it
    /// already does. The depth saturates rather than overflowing.
    pub fn lock(&self) {
        let tid = current_thread_id();
        let mut lock = UniqueLock::new(&self.guard);
        let state = self.state(&lock);
        if state.owner == tid {
            state.times_locked = state.times_locked.saturating_add(1);
            return;
        }

        self.wait_until_free(&mut lock);
        self.state(&lock).claim(tid);
    }

    /// Add a level if the calling thread owns the mutex, or take it if it is
    /// free, without waiting for another owner.
    pub fn try_lock(&self) -> bool {
        let tid = current_thread_id();
        let lock = UniqueLock::new(&self.guard);
        let state = self.state(&lock);
        if state.owner == tid {
            return state.relock();
        }
        if state.times_locked == 0 {
            state.claim(tid);
            return true;
        }
        false
    }

    /// Like [`try_lock_until`](Self::try_lock_until), `duration` from now on
    /// the system clock.
    pub fn try_lock_for(&self, duration: Duration) -> bool {
        self.try_lock_until(system_clock_now() + duration)
    }

    /// Add a level if the calling thread owns the mutex; otherwise wait until
    /// `stop_point` at the latest for the owner to let go.
    pub fn try_lock_until(&self, stop_point: TimePoint) -> bool {
        let tid = current_thread_id();
        let mut lock = UniqueLock::new(&self.guard);
        let state = self.state(&lock);
        if state.owner == tid {
            return state.relock();
        }

        let mut not_timed_out = stop_point.is_future();
        while not_timed_out && self.state(&lock).times_locked != 0 {
            not_timed_out =
                self.signal.wait_until(&mut lock, stop_point) == CondvarStatus::NoTimeout;
        }

        let state = self.state(&lock);
        if state.times_locked == 0 {
            state.claim(tid);
            return true;
        }

        #[cfg(feature = "log")]
        log::trace!(
            target: "cnx_sync::mutex",
            "RecursiveTimedMutex::try_lock_until timed out (held by {:?})",
            state.owner
        );

        false
    }

    /// Release one level. Once the last level is released, the mutex is
    /// free and one waiter is woken.
    pub fn unlock(&self) {
        let mut lock = UniqueLock::new(&self.guard);
        let state = self.state(&lock);
        debug_assert_ne!(
            state.times_locked, 0,
            "RecursiveTimedMutex::unlock called on an unlocked mutex"
        );
        state.times_locked -= 1;
        if state.times_locked == 0 {
            state.owner = ThreadId::NULL;
            lock.unlock();
            self.signal.notify_one();
        }
    }

    /// Release every level at once, returning the depth that was held. The
    /// calling thread must own the mutex.
    pub(crate) fn unlock_all(&self) -> usize {
        let mut lock = UniqueLock::new(&self.guard);
        let state = self.state(&lock);
        debug_assert_eq!(
            state.owner,
            current_thread_id(),
            "RecursiveTimedMutex::unlock_all called by a thread that doesn't own it"
        );
        let depth = core::mem::take(&mut state.times_locked);
        state.owner = ThreadId::NULL;
        lock.unlock();
        self.signal.notify_one();
        depth
    }

    /// Block until the mutex is free, then take it at `depth` levels.
    pub(crate) fn lock_at_depth(&self, depth: usize) {
        let tid = current_thread_id();
        let mut lock = UniqueLock::new(&self.guard);
        self.wait_until_free(&mut lock);
        let state = self.state(&lock);
        state.owner = tid;
        state.times_locked = depth;
    }

    fn wait_until_free(&self, lock: &mut UniqueLock<'_>) {
        while self.state(lock).times_locked != 0 {
            self.signal.wait(lock);
        }
    }

    #[inline]
    pub(crate) fn native(&self) -> &BasicMutex {
        self.guard.native()
    }

    #[cfg(test)]
    pub(crate) fn times_locked(&self) -> usize {
        let lock = UniqueLock::new(&self.guard);
        self.state(&lock).times_locked
    }

    #[allow(clippy::mut_from_ref)]
    fn state<'g>(&'g self, held: &'g UniqueLock<'_>) -> &'g mut RecursiveState {
        debug_assert!(held.owns_lock() && held.is_lock_of(&self.guard));
        // SAFETY: `guard` is held, so no other thread is touching `state`.
        unsafe { &mut *self.state.get() }
    }
}

impl Default for RecursiveTimedMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RecursiveTimedMutex {
    fn drop(&mut self) {
        #[cfg(feature = "log")]
        log::trace!(
            target: "cnx_sync::mutex",
            "RecursiveTimedMutex freed (times locked: {})",
            self.state.get_mut().times_locked
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};

    #[test]
    fn recursive_timed_depth_tracks_lock_calls() {
        let m = RecursiveTimedMutex::new();
        m.lock();
        m.lock();
        assert!(m.try_lock());
        assert!(m.try_lock_for(Duration::from_millis(1)));
        assert_eq!(m.times_locked(), 4);
        for expected in (0..4).rev() {
            m.unlock();
            assert_eq!(m.times_locked(), expected);
        }
    }

    #[test]
    fn recursive_timed_saturates() {
        let m = RecursiveTimedMutex::new();
        m.lock();
        {
            let lock = UniqueLock::new(&m.guard);
            m.state(&lock).times_locked = usize::MAX;
        }
        m.lock();
        assert_eq!(m.times_locked(), usize::MAX);
        assert!(!m.try_lock());
        assert!(!m.try_lock_for(Duration::from_millis(1)));
        {
            let lock = UniqueLock::new(&m.guard);
            m.state(&lock).times_locked = 1;
        }
        m.unlock();
        assert_eq!(m.times_locked(), 0);
    }

    #[test]
    fn recursive_timed_drain() {
        let m = RecursiveTimedMutex::new();
        let step = AtomicUsize::new(0);
        m.lock();
        m.lock();
        assert_eq!(m.times_locked(), 2);

        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(!m.try_lock_for(Duration::from_millis(20)));
                step.store(1, SeqCst);
                while step.load(SeqCst) != 2 {
                    std::thread::yield_now();
                }
                assert!(!m.try_lock_for(Duration::from_millis(20)));
                step.store(3, SeqCst);
                m.lock();
                assert_eq!(m.times_locked(), 1);
                m.unlock();
            });

            while step.load(SeqCst) != 1 {
                std::thread::yield_now();
            }
            m.unlock();
            assert_eq!(m.times_locked(), 1);
            step.store(2, SeqCst);
            while step.load(SeqCst) != 3 {
                std::thread::yield_now();
            }
            m.unlock();
        });

        assert_eq!(m.times_locked(), 0);
    }

    #[test]
    fn recursive_timed_condvar_wait_keeps_depth() {
        let m = RecursiveTimedMutex::new();
        let cv = Condvar::new();
        let done = AtomicUsize::new(0);
        m.lock();
        let mut lock = UniqueLock::adopt(&m);
        m.lock();
        m.lock();

        std::thread::scope(|s| {
            s.spawn(|| {
                // Only possible while the waiter has let go of every level.
                while !m.try_lock() {
                    std::thread::yield_now();
                }
                assert_eq!(m.times_locked(), 1);
                m.unlock();
                done.store(1, SeqCst);
                cv.notify_all();
            });
            while done.load(SeqCst) == 0 {
                cv.wait_for(&mut lock, Duration::from_millis(10));
                assert_eq!(m.times_locked(), 3);
            }
        });

        m.unlock();
        m.unlock();
        drop(lock);
        assert_eq!(m.times_locked(), 0);
    }

    #[test]
    fn timed_mutex_flag_follows_ownership() {
        let m = TimedMutex::new();
        m.lock();
        {
            let lock = UniqueLock::new(&m.guard);
            assert!(*m.locked(&lock));
        }
        m.unlock();
        let lock = UniqueLock::new(&m.guard);
        assert!(!*m.locked(&lock));
    }
}
