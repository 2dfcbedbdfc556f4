//! Thread identity.

use core::fmt;
use rustix::thread::Pid;

/// An identifier for an OS thread.
///
/// `ThreadId::NULL` never denotes a live thread, so it can be stored as the
/// "no owner" value of a lock.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(Option<Pid>);

impl ThreadId {
    /// The id that no thread has.
    pub const NULL: Self = Self(None);

    /// Construct a `ThreadId` from a raw kernel thread id. Zero maps to
    /// `NULL`.
    #[inline]
    pub fn from_raw(raw: i32) -> Self {
        Self(Pid::from_raw(raw))
    }

    /// Return the raw kernel thread id, or zero for `NULL`.
    #[inline]
    pub fn as_raw(self) -> i32 {
        match self.0 {
            Some(pid) => pid.as_raw_nonzero().get(),
            None => 0,
        }
    }

    /// Test whether this is the `NULL` id.
    #[inline]
    pub fn is_null(self) -> bool {
        self.0.is_none()
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(pid) => write!(f, "ThreadId({})", pid.as_raw_nonzero()),
            None => f.write_str("ThreadId(NULL)"),
        }
    }
}

/// Return the id of the calling thread.
///
/// This is a plain `gettid` call; nothing is cached.
#[inline]
pub fn current_thread_id() -> ThreadId {
    ThreadId(Some(rustix::thread::gettid()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_not_current() {
        assert!(ThreadId::NULL.is_null());
        assert_ne!(current_thread_id(), ThreadId::NULL);
        assert_eq!(ThreadId::from_raw(0), ThreadId::NULL);
    }

    #[test]
    fn raw_round_trip() {
        let me = current_thread_id();
        assert_eq!(ThreadId::from_raw(me.as_raw()), me);
    }

    #[test]
    fn differs_across_threads() {
        let me = current_thread_id();
        let other = std::thread::spawn(current_thread_id).join().unwrap();
        assert_ne!(me, other);
    }
}
