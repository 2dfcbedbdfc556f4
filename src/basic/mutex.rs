use super::Relock;
use crate::thread::current_thread_id;
use core::ptr::{null, null_mut};
use core::sync::atomic::Ordering::{Relaxed, SeqCst};
use core::sync::atomic::{AtomicI32, AtomicU32, AtomicUsize};
use rustix::io::{self, Errno};
use rustix::thread::{futex, FutexFlags, FutexOperation};

/// Raw mutex type backed by atomic operations and Linux `futex` calls.
///
/// The current implementation does not provide fairness and is not
/// reentrant.
// 0 => unlocked
// 1 => locked
// 2 => locked with waiters waiting
pub struct BasicMutex(AtomicU32);

impl BasicMutex {
    /// Returns a new, unlocked `BasicMutex`.
    ///
    /// A futex needs no kernel object, so this does not fail in practice; the
    /// `Result` keeps construction uniform with the rest of the basic layer.
    #[inline]
    pub fn new() -> io::Result<Self> {
        Ok(Self(AtomicU32::new(0)))
    }

    /// Acquires this mutex, blocking the current thread until it is able to do
    /// so.
    #[inline]
    pub fn lock(&self) -> io::Result<()> {
        match self.0.compare_exchange(0, 1, SeqCst, SeqCst) {
            Ok(_) => Ok(()),
            Err(c) => self.block(c),
        }
    }

    /// Attempts to acquire this mutex without blocking. Returns `true` if the
    /// lock was successfully acquired and `false` otherwise.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.0.compare_exchange(0, 1, SeqCst, SeqCst).is_ok()
    }

    /// Unlocks this mutex.
    ///
    /// This must be paired with a successful call to `lock` or `try_lock` on
    /// the current thread.
    #[inline]
    pub fn unlock(&self) -> io::Result<()> {
        if self.0.swap(0, SeqCst) != 1 {
            self.wake()?;
        }
        Ok(())
    }

    /// Test whether some thread currently holds this mutex.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.0.load(SeqCst) != 0
    }

    fn block(&self, mut c: u32) -> io::Result<()> {
        loop {
            // If needed, (re-)register our intent to wait.
            if c == 2
                || (match self.0.compare_exchange(1, 2, SeqCst, SeqCst) {
                    Ok(x) | Err(x) => x,
                }) != 0
            {
                // Wait until woken.
                let r = unsafe {
                    futex(
                        self.0.as_ptr(),
                        FutexOperation::Wait,
                        FutexFlags::PRIVATE,
                        2,
                        null(),
                        null_mut(),
                        0,
                    )
                };
                match r {
                    Ok(_) | Err(Errno::AGAIN) | Err(Errno::INTR) => {}
                    Err(err) => return Err(err),
                }
            }

            // We were woken up; try to acquire the lock now.
            c = match self.0.compare_exchange(0, 2, SeqCst, SeqCst) {
                Ok(_) => return Ok(()),
                Err(c) => c,
            };
        }
    }

    fn wake(&self) -> io::Result<()> {
        unsafe {
            futex(
                self.0.as_ptr(),
                FutexOperation::Wake,
                FutexFlags::PRIVATE,
                1,
                null(),
                null_mut(),
                0,
            )?;
        }
        Ok(())
    }
}

impl Relock for BasicMutex {
    type Saved = ();

    #[inline]
    fn release(&self) -> io::Result<()> {
        self.unlock()
    }

    #[inline]
    fn reacquire(&self, (): ()) -> io::Result<()> {
        self.lock()
    }
}

/// A [`BasicMutex`] that its owning thread may lock again without
/// deadlocking. Each `lock` must be balanced by an `unlock`.
///
/// Errors follow POSIX recursive mutexes: `EAGAIN` when the recursion count
/// would overflow, `EPERM` when a thread that doesn't own the mutex unlocks
/// it.
pub struct BasicRecursiveMutex {
    inner: BasicMutex,
    // Raw thread id of the owner, or 0. Only the owner ever stores its own id
    // here, so a thread reading its own id knows it is the owner.
    owner: AtomicI32,
    // Only touched by the owner.
    count: AtomicUsize,
}

impl BasicRecursiveMutex {
    /// Returns a new, unlocked `BasicRecursiveMutex`.
    #[inline]
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            inner: BasicMutex::new()?,
            owner: AtomicI32::new(0),
            count: AtomicUsize::new(0),
        })
    }

    /// Acquires this mutex, blocking unless the calling thread already owns
    /// it.
    pub fn lock(&self) -> io::Result<()> {
        let me = current_thread_id().as_raw();
        if self.owner.load(Relaxed) == me {
            return self.relock();
        }
        self.inner.lock()?;
        self.owner.store(me, Relaxed);
        self.count.store(1, Relaxed);
        Ok(())
    }

    /// Attempts to acquire this mutex without blocking.
    pub fn try_lock(&self) -> bool {
        let me = current_thread_id().as_raw();
        if self.owner.load(Relaxed) == me {
            return self.relock().is_ok();
        }
        if !self.inner.try_lock() {
            return false;
        }
        self.owner.store(me, Relaxed);
        self.count.store(1, Relaxed);
        true
    }

    /// Release one level of ownership, unlocking the mutex for other threads
    /// once the count reaches zero.
    pub fn unlock(&self) -> io::Result<()> {
        if self.owner.load(Relaxed) != current_thread_id().as_raw() {
            return Err(Errno::PERM);
        }
        let count = self.count.load(Relaxed) - 1;
        self.count.store(count, Relaxed);
        if count == 0 {
            self.owner.store(0, Relaxed);
            self.inner.unlock()?;
        }
        Ok(())
    }

    fn relock(&self) -> io::Result<()> {
        let count = self.count.load(Relaxed);
        if count == usize::MAX {
            return Err(Errno::AGAIN);
        }
        self.count.store(count + 1, Relaxed);
        Ok(())
    }
}

impl Relock for BasicRecursiveMutex {
    /// The recursion depth at the time of release.
    type Saved = usize;

    /// Releases every level of ownership at once.
    fn release(&self) -> io::Result<usize> {
        if self.owner.load(Relaxed) != current_thread_id().as_raw() {
            return Err(Errno::PERM);
        }
        let depth = self.count.swap(0, Relaxed);
        self.owner.store(0, Relaxed);
        self.inner.unlock()?;
        Ok(depth)
    }

    fn reacquire(&self, depth: usize) -> io::Result<()> {
        self.inner.lock()?;
        self.owner.store(current_thread_id().as_raw(), Relaxed);
        self.count.store(depth, Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_try_lock_fails_while_held() {
        let m = BasicMutex::new().unwrap();
        assert!(!m.is_locked());
        m.lock().unwrap();
        assert!(m.is_locked());
        assert!(!m.try_lock());
        m.unlock().unwrap();
        assert!(m.try_lock());
        m.unlock().unwrap();
    }

    #[test]
    fn recursive_counts_levels() {
        let m = BasicRecursiveMutex::new().unwrap();
        m.lock().unwrap();
        m.lock().unwrap();
        assert!(m.try_lock());
        assert_eq!(m.count.load(Relaxed), 3);
        m.unlock().unwrap();
        m.unlock().unwrap();
        assert!(m.inner.is_locked());
        m.unlock().unwrap();
        assert!(!m.inner.is_locked());
    }

    #[test]
    fn recursive_unlock_by_stranger_is_eperm() {
        let m = BasicRecursiveMutex::new().unwrap();
        assert_eq!(m.unlock(), Err(Errno::PERM));
        m.lock().unwrap();
        std::thread::scope(|s| {
            s.spawn(|| {
                assert_eq!(m.unlock(), Err(Errno::PERM));
                assert!(!m.try_lock());
            });
        });
        m.unlock().unwrap();
    }

    #[test]
    fn recursive_release_restores_depth() {
        let m = BasicRecursiveMutex::new().unwrap();
        m.lock().unwrap();
        m.lock().unwrap();
        let depth = m.release().unwrap();
        assert_eq!(depth, 2);
        assert!(!m.inner.is_locked());
        m.reacquire(depth).unwrap();
        m.unlock().unwrap();
        m.unlock().unwrap();
        assert!(!m.inner.is_locked());
    }
}
