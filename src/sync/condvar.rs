use super::{MutexInterface, NativeMutex, UniqueLock};
use crate::basic::{BasicCondvar, Relock};
use crate::time::{system_clock_now, TimePoint};
use core::time::Duration;
use rustix::io;

/// Whether a timed wait returned before or after its deadline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CondvarStatus {
    /// Woken (by a notification or spuriously) before the deadline.
    NoTimeout,
    /// The deadline passed.
    Timeout,
}

/// A condition variable that waits with a [`UniqueLock`] over any of the
/// mutex kinds.
///
/// No fairness is guaranteed: `notify_one` wakes whichever waiter the
/// kernel picks. Waits may wake spuriously, so callers re-check their
/// condition in a loop.
pub struct Condvar {
    inner: BasicCondvar,
}

impl Condvar {
    /// Construct a condition variable. Panics if the OS refuses.
    pub fn new() -> Self {
        Self {
            inner: BasicCondvar::new().expect("Failed to create new BasicCondvar in Condvar::new"),
        }
    }

    /// Release `lock`'s mutex, block until notified, and reacquire it.
    ///
    /// # Panics
    ///
    /// Panics if `lock` doesn't own its mutex.
    #[track_caller]
    pub fn wait(&self, lock: &mut UniqueLock<'_>) {
        let mutex = Self::owned_mutex(lock, "Condvar::wait");
        self.wait_native(mutex, None)
            .expect("Condvar::wait: failed to wait on the native condvar");
    }

    /// Like [`wait_until`](Self::wait_until), `duration` from now on the
    /// system clock.
    #[track_caller]
    pub fn wait_for(&self, lock: &mut UniqueLock<'_>, duration: Duration) -> CondvarStatus {
        self.wait_until(lock, system_clock_now() + duration)
    }

    /// Release `lock`'s mutex, block until notified or until `stop_point`
    /// passes, and reacquire it.
    ///
    /// A `stop_point` already in the past returns `Timeout` without
    /// blocking. Otherwise the result is classified by re-reading the clock
    /// after waking, so a wake that races the deadline reports `Timeout`.
    ///
    /// # Panics
    ///
    /// Panics if `lock` doesn't own its mutex.
    #[track_caller]
    pub fn wait_until(&self, lock: &mut UniqueLock<'_>, stop_point: TimePoint) -> CondvarStatus {
        let mutex = Self::owned_mutex(lock, "Condvar::wait_until");
        if stop_point < stop_point.clock().now() {
            return CondvarStatus::Timeout;
        }

        self.wait_native(mutex, Some(stop_point))
            .expect("Condvar::wait_until: failed to wait on the native condvar");

        if stop_point.is_future() {
            CondvarStatus::NoTimeout
        } else {
            #[cfg(feature = "log")]
            log::trace!(target: "cnx_sync::condvar", "Condvar wait timed out at {:?}", stop_point);

            CondvarStatus::Timeout
        }
    }

    /// Wake one waiting thread, if any.
    pub fn notify_one(&self) {
        self.inner
            .signal()
            .expect("Condvar::notify_one: futex wake failed");
    }

    /// Wake all waiting threads.
    pub fn notify_all(&self) {
        self.inner
            .broadcast()
            .expect("Condvar::notify_all: futex wake failed");
    }

    #[track_caller]
    fn owned_mutex<'a>(lock: &UniqueLock<'a>, caller: &str) -> MutexInterface<'a> {
        match lock.mutex() {
            Some(mutex) if lock.owns_lock() => mutex,
            Some(_) => panic!("{caller} called with a UniqueLock that doesn't own its mutex"),
            None => panic!("{caller} called with a UniqueLock that has been moved out of"),
        }
    }

    /// Sleep on the native condvar, releasing whatever `mutex` is built on.
    fn wait_native(&self, mutex: MutexInterface<'_>, deadline: Option<TimePoint>) -> io::Result<bool> {
        match mutex.native_mutex() {
            NativeMutex::Plain(native) if !mutex.kind().is_emulated() => {
                self.wait_on(native, deadline)
            }
            NativeMutex::Recursive(native) => self.wait_on(native, deadline),
            // The caller of an emulated mutex owns its flag, not its internal
            // guard, so the flag is what gets released.
            NativeMutex::Plain(_) => self.wait_on(&mutex, deadline),
        }
    }

    fn wait_on<M: Relock + ?Sized>(&self, mutex: &M, deadline: Option<TimePoint>) -> io::Result<bool> {
        match deadline {
            Some(deadline) => self.inner.wait_until(mutex, deadline),
            None => self.inner.wait(mutex).map(|()| true),
        }
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
