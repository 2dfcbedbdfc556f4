//! The following is derived from Rust's
//! library/std/src/sys/unix/locks/futex_condvar.rs at revision
//! 98815742cf2e914ee0d7142a02322cf939c47834.

use super::wait_wake::{futex_wait, futex_wake, futex_wake_all};
use super::Relock;
use crate::time::TimePoint;
use core::sync::atomic::{AtomicU32, Ordering::Relaxed};
use rustix::io;

/// A futex condition variable.
pub struct BasicCondvar {
    // The value of this atomic is simply incremented on every notification.
    // This is used by `.wait()` to not miss any notifications after
    // unlocking the mutex and before waiting for notifications.
    futex: AtomicU32,
}

impl BasicCondvar {
    /// Returns a new `BasicCondvar` with no waiters.
    #[inline]
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            futex: AtomicU32::new(0),
        })
    }

    // All the memory orderings here are `Relaxed`,
    // because synchronization is done by unlocking and locking the mutex.

    /// Wake one waiter, if there is one.
    pub fn signal(&self) -> io::Result<()> {
        self.futex.fetch_add(1, Relaxed);
        futex_wake(&self.futex).map(drop)
    }

    /// Wake every waiter.
    pub fn broadcast(&self) -> io::Result<()> {
        self.futex.fetch_add(1, Relaxed);
        futex_wake_all(&self.futex)
    }

    /// Release `mutex`, sleep until notified (or spuriously woken), and take
    /// `mutex` back.
    ///
    /// The calling thread must hold `mutex`.
    pub fn wait<M: Relock + ?Sized>(&self, mutex: &M) -> io::Result<()> {
        self.wait_optional_deadline(mutex, None).map(drop)
    }

    /// Like [`wait`](Self::wait), but give up at `deadline`. Returns `false`
    /// if the kernel reported a timeout.
    pub fn wait_until<M: Relock + ?Sized>(&self, mutex: &M, deadline: TimePoint) -> io::Result<bool> {
        self.wait_optional_deadline(mutex, Some(deadline))
    }

    fn wait_optional_deadline<M: Relock + ?Sized>(
        &self,
        mutex: &M,
        deadline: Option<TimePoint>,
    ) -> io::Result<bool> {
        // Examine the notification counter _before_ we unlock the mutex.
        let futex_value = self.futex.load(Relaxed);

        // Unlock the mutex before going to sleep.
        let saved = mutex.release()?;

        // Wait, but only if there hasn't been any
        // notification since we unlocked the mutex.
        let r = futex_wait(&self.futex, futex_value, deadline);

        // Lock the mutex again.
        mutex.reacquire(saved)?;

        Ok(r)
    }
}
