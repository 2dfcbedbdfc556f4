use super::{Condvar, CondvarStatus, Mutex, UniqueLock};
use crate::basic::BasicMutex;
use crate::time::{system_clock_now, TimePoint};
use core::cell::UnsafeCell;
use core::time::Duration;

// The top bit of the state is set once a writer has claimed the mutex, which
// includes the time it spends waiting for readers to drain. The rest counts
// readers.
const EXCLUSIVE: u32 = 1 << (u32::BITS - 1);
const READERS: u32 = !EXCLUSIVE;

#[inline]
fn readers(state: u32) -> u32 {
    state & READERS
}

#[inline]
fn is_exclusive(state: u32) -> bool {
    state & EXCLUSIVE != 0
}

/// A reader-writer mutex.
///
/// Any number of threads (up to 2^31 - 1) may hold it shared, or one thread
/// may hold it exclusively. A writer that is waiting blocks new readers, so
/// a steady stream of readers cannot starve it.
pub struct SharedMutex {
    guard: Mutex,
    // Waited on by writers for the exclusive bit, and by readers for both
    // the exclusive bit and a free reader slot.
    exclusive_signal: Condvar,
    // Waited on by a writer that has claimed the exclusive bit, for the
    // readers to drain.
    shared_signal: Condvar,
    // Only accessed while `guard` is held.
    state: UnsafeCell<u32>,
}

// SAFETY: `state` is only accessed through `SharedMutex::state`, which
// requires a `UniqueLock` that holds `guard`.
unsafe impl Sync for SharedMutex {}

impl SharedMutex {
    /// Construct an unlocked shared mutex.
    pub fn new() -> Self {
        #[cfg(feature = "log")]
        log::trace!(target: "cnx_sync::shared_mutex", "SharedMutex created");

        Self {
            guard: Mutex::new(),
            exclusive_signal: Condvar::new(),
            shared_signal: Condvar::new(),
            state: UnsafeCell::new(0),
        }
    }

    /// Block until the calling thread holds the mutex exclusively.
    pub fn lock(&self) {
        let mut lock = UniqueLock::new(&self.guard);
        while is_exclusive(*self.state(&lock)) {
            self.exclusive_signal.wait(&mut lock);
        }

        *self.state(&lock) |= EXCLUSIVE;

        while readers(*self.state(&lock)) != 0 {
            self.shared_signal.wait(&mut lock);
        }
    }

    /// Take the mutex exclusively if nobody holds it at all.
    pub fn try_lock(&self) -> bool {
        let lock = UniqueLock::new(&self.guard);
        let state = self.state(&lock);
        if *state == 0 {
            *state = EXCLUSIVE;
            return true;
        }
        false
    }

    /// Release exclusive ownership and wake everyone waiting to get in.
    pub fn unlock(&self) {
        let lock = UniqueLock::new(&self.guard);
        *self.state(&lock) = 0;
        self.exclusive_signal.notify_all();
    }

    /// Block until the calling thread holds the mutex shared.
    pub fn lock_shared(&self) {
        let mut lock = UniqueLock::new(&self.guard);
        while !Self::admits_reader(*self.state(&lock)) {
            self.exclusive_signal.wait(&mut lock);
        }
        *self.state(&lock) += 1;
    }

    /// Take the mutex shared if no writer has claimed it and a reader slot
    /// is free.
    pub fn try_lock_shared(&self) -> bool {
        let lock = UniqueLock::new(&self.guard);
        let state = self.state(&lock);
        if Self::admits_reader(*state) {
            *state += 1;
            return true;
        }
        false
    }

    /// Release one shared hold.
    pub fn unlock_shared(&self) {
        let lock = UniqueLock::new(&self.guard);
        let state = self.state(&lock);
        debug_assert_ne!(
            readers(*state),
            0,
            "SharedMutex::unlock_shared called without a shared hold"
        );
        *state -= 1;
        let remaining = readers(*state);
        if is_exclusive(*state) {
            // A writer is draining readers; the last one out lets it in.
            if remaining == 0 {
                self.shared_signal.notify_one();
            }
        } else if remaining == READERS - 1 {
            // A reader slot just opened up.
            self.exclusive_signal.notify_one();
        }
    }

    /// Like `try_lock`, but wait until `stop_point` for other holders to
    /// leave. If the readers haven't drained by then, the claim is dropped
    /// again.
    fn try_lock_until(&self, stop_point: TimePoint) -> bool {
        let mut lock = UniqueLock::new(&self.guard);
        if is_exclusive(*self.state(&lock)) {
            loop {
                let status = self.exclusive_signal.wait_until(&mut lock, stop_point);
                if !is_exclusive(*self.state(&lock)) {
                    break;
                }
                if status == CondvarStatus::Timeout {
                    return false;
                }
            }
        }

        *self.state(&lock) |= EXCLUSIVE;

        if readers(*self.state(&lock)) != 0 {
            loop {
                let status = self.shared_signal.wait_until(&mut lock, stop_point);
                if readers(*self.state(&lock)) == 0 {
                    break;
                }
                if status == CondvarStatus::Timeout {
                    *self.state(&lock) &= !EXCLUSIVE;
                    self.exclusive_signal.notify_all();

                    #[cfg(feature = "log")]
                    log::trace!(
                        target: "cnx_sync::shared_mutex",
                        "gave up waiting for {} readers to drain",
                        readers(*self.state(&lock))
                    );

                    return false;
                }
            }
        }

        true
    }

    fn try_lock_shared_until(&self, stop_point: TimePoint) -> bool {
        let mut lock = UniqueLock::new(&self.guard);
        if !Self::admits_reader(*self.state(&lock)) {
            loop {
                let status = self.exclusive_signal.wait_until(&mut lock, stop_point);
                if Self::admits_reader(*self.state(&lock)) {
                    break;
                }
                if status == CondvarStatus::Timeout {
                    return false;
                }
            }
        }
        *self.state(&lock) += 1;
        true
    }

    #[inline]
    fn admits_reader(state: u32) -> bool {
        !is_exclusive(state) && readers(state) != READERS
    }

    #[inline]
    pub(crate) fn native(&self) -> &BasicMutex {
        self.guard.native()
    }

    #[cfg(test)]
    pub(crate) fn readers(&self) -> u32 {
        let lock = UniqueLock::new(&self.guard);
        readers(*self.state(&lock))
    }

    #[allow(clippy::mut_from_ref)]
    fn state<'g>(&'g self, held: &'g UniqueLock<'_>) -> &'g mut u32 {
        debug_assert!(held.owns_lock() && held.is_lock_of(&self.guard));
        // SAFETY: `guard` is held, so no other thread is touching `state`.
        unsafe { &mut *self.state.get() }
    }
}

impl Default for SharedMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SharedMutex {
    fn drop(&mut self) {
        #[cfg(feature = "log")]
        log::trace!(
            target: "cnx_sync::shared_mutex",
            "SharedMutex freed (state: {:#x})",
            self.state.get_mut()
        );
    }
}

/// A [`SharedMutex`] whose exclusive and shared acquisitions can both give
/// up after a deadline.
pub struct SharedTimedMutex {
    inner: SharedMutex,
}

impl SharedTimedMutex {
    /// Construct an unlocked shared timed mutex.
    pub fn new() -> Self {
        Self {
            inner: SharedMutex::new(),
        }
    }

    /// Block until the calling thread holds the mutex exclusively.
    #[inline]
    pub fn lock(&self) {
        self.inner.lock()
    }

    /// Take the mutex exclusively if nobody holds it at all.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.inner.try_lock()
    }

    /// Try to take the mutex exclusively, waiting at most `duration` on the
    /// system clock.
    pub fn try_lock_for(&self, duration: Duration) -> bool {
        self.try_lock_until(system_clock_now() + duration)
    }

    /// Try to take the mutex exclusively, waiting until `stop_point` at the
    /// latest.
    pub fn try_lock_until(&self, stop_point: TimePoint) -> bool {
        self.inner.try_lock_until(stop_point)
    }

    /// Release exclusive ownership.
    #[inline]
    pub fn unlock(&self) {
        self.inner.unlock()
    }

    /// Block until the calling thread holds the mutex shared.
    #[inline]
    pub fn lock_shared(&self) {
        self.inner.lock_shared()
    }

    /// Take the mutex shared without blocking, if possible.
    #[inline]
    pub fn try_lock_shared(&self) -> bool {
        self.inner.try_lock_shared()
    }

    /// Try to take the mutex shared, waiting at most `duration` on the system
    /// clock.
    pub fn try_lock_shared_for(&self, duration: Duration) -> bool {
        self.try_lock_shared_until(system_clock_now() + duration)
    }

    /// Try to take the mutex shared, waiting until `stop_point` at the
    /// latest.
    pub fn try_lock_shared_until(&self, stop_point: TimePoint) -> bool {
        self.inner.try_lock_shared_until(stop_point)
    }

    /// Release one shared hold.
    #[inline]
    pub fn unlock_shared(&self) {
        self.inner.unlock_shared()
    }

    #[inline]
    pub(crate) fn native(&self) -> &BasicMutex {
        self.inner.native()
    }
}

impl Default for SharedTimedMutex {
    fn default() -> Self {
        Self::new()
    }
}
