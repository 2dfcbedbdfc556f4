//! Dispatch over the six mutex kinds.
//!
//! [`MutexInterface`] and [`SharedMutexInterface`] are non-owning, `Copy`
//! handles that pair a reference to a concrete mutex with its kind. Lock
//! operations go through the capability traits below, and the timed ones are
//! only reachable (via `as_timed`) for kinds that support them. The
//! condition variable additionally needs the native futex mutex underneath,
//! which [`MutexInterface::native_mutex`] digs out by kind.

use super::{
    Mutex, RecursiveMutex, RecursiveTimedMutex, SharedMutex, SharedTimedMutex, TimedMutex,
};
use crate::basic::{BasicMutex, BasicRecursiveMutex, Relock};
use crate::time::TimePoint;
use core::fmt;
use core::time::Duration;
use rustix::io;

/// Exclusive locking.
pub trait Lockable {
    /// Block until the calling thread holds the lock.
    fn lock(&self);
    /// Take the lock without blocking, if possible.
    fn try_lock(&self) -> bool;
    /// Release the lock held by the calling thread.
    fn unlock(&self);
}

/// Exclusive locking with a deadline.
pub trait TimedLockable: Lockable {
    /// Try to take the lock, waiting at most `duration`.
    fn try_lock_for(&self, duration: Duration) -> bool;
    /// Try to take the lock, waiting until `stop_point` at the latest.
    fn try_lock_until(&self, stop_point: TimePoint) -> bool;
}

/// Shared (reader) locking on top of exclusive locking.
pub trait SharedLockable: Lockable {
    /// Block until the calling thread holds a shared lock.
    fn lock_shared(&self);
    /// Take a shared lock without blocking, if possible.
    fn try_lock_shared(&self) -> bool;
    /// Release a shared lock held by the calling thread.
    fn unlock_shared(&self);
}

/// Shared locking with a deadline.
pub trait SharedTimedLockable: SharedLockable + TimedLockable {
    /// Try to take a shared lock, waiting at most `duration`.
    fn try_lock_shared_for(&self, duration: Duration) -> bool;
    /// Try to take a shared lock, waiting until `stop_point` at the latest.
    fn try_lock_shared_until(&self, stop_point: TimePoint) -> bool;
}

macro_rules! impl_lockable {
    ($($ty:ty),*) => {$(
        impl Lockable for $ty {
            #[inline]
            fn lock(&self) {
                <$ty>::lock(self)
            }

            #[inline]
            fn try_lock(&self) -> bool {
                <$ty>::try_lock(self)
            }

            #[inline]
            fn unlock(&self) {
                <$ty>::unlock(self)
            }
        }
    )*};
}

macro_rules! impl_timed_lockable {
    ($($ty:ty),*) => {$(
        impl TimedLockable for $ty {
            #[inline]
            fn try_lock_for(&self, duration: Duration) -> bool {
                <$ty>::try_lock_for(self, duration)
            }

            #[inline]
            fn try_lock_until(&self, stop_point: TimePoint) -> bool {
                <$ty>::try_lock_until(self, stop_point)
            }
        }
    )*};
}

macro_rules! impl_shared_lockable {
    ($($ty:ty),*) => {$(
        impl SharedLockable for $ty {
            #[inline]
            fn lock_shared(&self) {
                <$ty>::lock_shared(self)
            }

            #[inline]
            fn try_lock_shared(&self) -> bool {
                <$ty>::try_lock_shared(self)
            }

            #[inline]
            fn unlock_shared(&self) {
                <$ty>::unlock_shared(self)
            }
        }
    )*};
}

impl_lockable!(
    Mutex,
    RecursiveMutex,
    TimedMutex,
    RecursiveTimedMutex,
    SharedMutex,
    SharedTimedMutex
);
impl_timed_lockable!(TimedMutex, RecursiveTimedMutex, SharedTimedMutex);
impl_shared_lockable!(SharedMutex, SharedTimedMutex);

impl SharedTimedLockable for SharedTimedMutex {
    #[inline]
    fn try_lock_shared_for(&self, duration: Duration) -> bool {
        SharedTimedMutex::try_lock_shared_for(self, duration)
    }

    #[inline]
    fn try_lock_shared_until(&self, stop_point: TimePoint) -> bool {
        SharedTimedMutex::try_lock_shared_until(self, stop_point)
    }
}

/// Which concrete type a [`MutexInterface`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutexKind {
    /// [`Mutex`]
    Mutex,
    /// [`RecursiveMutex`]
    RecursiveMutex,
    /// [`TimedMutex`]
    TimedMutex,
    /// [`RecursiveTimedMutex`]
    RecursiveTimedMutex,
    /// [`SharedMutex`]
    SharedMutex,
    /// [`SharedTimedMutex`]
    SharedTimedMutex,
}

impl MutexKind {
    /// Whether this kind supports `try_lock_for` and `try_lock_until`.
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            Self::TimedMutex | Self::RecursiveTimedMutex | Self::SharedTimedMutex
        )
    }

    /// Whether the owning thread may lock this kind again.
    pub fn is_recursive(self) -> bool {
        matches!(self, Self::RecursiveMutex | Self::RecursiveTimedMutex)
    }

    /// Whether this kind also has shared (reader) locking.
    pub fn is_shared(self) -> bool {
        matches!(self, Self::SharedMutex | Self::SharedTimedMutex)
    }

    /// Whether ownership of this kind is a flag behind an internal guard
    /// mutex, rather than the native mutex itself.
    pub(crate) fn is_emulated(self) -> bool {
        !matches!(self, Self::Mutex | Self::RecursiveMutex)
    }
}

/// The futex mutex at the bottom of a mutex kind.
#[derive(Clone, Copy)]
pub enum NativeMutex<'a> {
    /// A plain futex mutex: the whole of a `Mutex`, or the internal guard of
    /// an emulated kind.
    Plain(&'a BasicMutex),
    /// The recursive futex mutex of a `RecursiveMutex`.
    Recursive(&'a BasicRecursiveMutex),
}

/// A non-owning handle to any of the six mutex kinds.
///
/// Obtained with `From`/`Into` from a reference to the concrete mutex; it
/// cannot outlive that mutex.
#[derive(Clone, Copy)]
pub enum MutexInterface<'a> {
    /// A [`Mutex`].
    Mutex(&'a Mutex),
    /// A [`RecursiveMutex`].
    RecursiveMutex(&'a RecursiveMutex),
    /// A [`TimedMutex`].
    TimedMutex(&'a TimedMutex),
    /// A [`RecursiveTimedMutex`].
    RecursiveTimedMutex(&'a RecursiveTimedMutex),
    /// A [`SharedMutex`], used exclusively.
    SharedMutex(&'a SharedMutex),
    /// A [`SharedTimedMutex`], used exclusively.
    SharedTimedMutex(&'a SharedTimedMutex),
}

impl<'a> MutexInterface<'a> {
    /// The kind of mutex this refers to.
    pub fn kind(&self) -> MutexKind {
        match self {
            Self::Mutex(_) => MutexKind::Mutex,
            Self::RecursiveMutex(_) => MutexKind::RecursiveMutex,
            Self::TimedMutex(_) => MutexKind::TimedMutex,
            Self::RecursiveTimedMutex(_) => MutexKind::RecursiveTimedMutex,
            Self::SharedMutex(_) => MutexKind::SharedMutex,
            Self::SharedTimedMutex(_) => MutexKind::SharedTimedMutex,
        }
    }

    /// The exclusive-locking operations of the referenced mutex.
    pub fn as_lockable(&self) -> &'a dyn Lockable {
        match *self {
            Self::Mutex(m) => m,
            Self::RecursiveMutex(m) => m,
            Self::TimedMutex(m) => m,
            Self::RecursiveTimedMutex(m) => m,
            Self::SharedMutex(m) => m,
            Self::SharedTimedMutex(m) => m,
        }
    }

    /// The timed operations of the referenced mutex, or `None` if its kind
    /// has none.
    pub fn as_timed(&self) -> Option<&'a dyn TimedLockable> {
        match *self {
            Self::TimedMutex(m) => Some(m as &dyn TimedLockable),
            Self::RecursiveTimedMutex(m) => Some(m as &dyn TimedLockable),
            Self::SharedTimedMutex(m) => Some(m as &dyn TimedLockable),
            Self::Mutex(_)
            | Self::RecursiveMutex(_)
            | Self::SharedMutex(_) => None,
        }
    }

    /// Block until the calling thread holds the mutex.
    #[inline]
    pub fn lock(&self) {
        self.as_lockable().lock()
    }

    /// Take the mutex without blocking, if possible.
    #[inline]
    pub fn try_lock(&self) -> bool {
        self.as_lockable().try_lock()
    }

    /// Release the mutex held by the calling thread.
    #[inline]
    pub fn unlock(&self) {
        self.as_lockable().unlock()
    }

    /// The futex mutex at the bottom of the referenced mutex.
    ///
    /// For the emulated kinds this is the internal guard, which the owner of
    /// the emulated mutex does not hold between operations.
    pub fn native_mutex(&self) -> NativeMutex<'a> {
        match *self {
            Self::Mutex(m) => NativeMutex::Plain(m.native()),
            Self::RecursiveMutex(m) => NativeMutex::Recursive(m.native()),
            Self::TimedMutex(m) => NativeMutex::Plain(m.native()),
            Self::RecursiveTimedMutex(m) => NativeMutex::Plain(m.native()),
            Self::SharedMutex(m) => NativeMutex::Plain(m.native()),
            Self::SharedTimedMutex(m) => NativeMutex::Plain(m.native()),
        }
    }

    fn addr(&self) -> *const () {
        match *self {
            Self::Mutex(m) => m as *const Mutex as *const (),
            Self::RecursiveMutex(m) => m as *const RecursiveMutex as *const (),
            Self::TimedMutex(m) => m as *const TimedMutex as *const (),
            Self::RecursiveTimedMutex(m) => m as *const RecursiveTimedMutex as *const (),
            Self::SharedMutex(m) => m as *const SharedMutex as *const (),
            Self::SharedTimedMutex(m) => m as *const SharedTimedMutex as *const (),
        }
    }
}

/// Two interfaces are equal when they refer to the same mutex.
impl<'a, 'b> PartialEq<MutexInterface<'b>> for MutexInterface<'a> {
    fn eq(&self, other: &MutexInterface<'b>) -> bool {
        self.kind() == other.kind() && self.addr() == other.addr()
    }
}

impl Eq for MutexInterface<'_> {}

impl fmt::Debug for MutexInterface<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexInterface")
            .field("kind", &self.kind())
            .field("addr", &self.addr())
            .finish()
    }
}

/// The logical release used when a condvar waits on an emulated kind.
///
/// A `RecursiveTimedMutex` gives up every level and gets the same depth
/// back; the other kinds have a depth of one.
impl Relock for MutexInterface<'_> {
    type Saved = usize;

    fn release(&self) -> io::Result<usize> {
        match *self {
            Self::RecursiveTimedMutex(m) => Ok(m.unlock_all()),
            _ => {
                self.unlock();
                Ok(1)
            }
        }
    }

    fn reacquire(&self, depth: usize) -> io::Result<()> {
        match *self {
            Self::RecursiveTimedMutex(m) => m.lock_at_depth(depth),
            _ => self.lock(),
        }
        Ok(())
    }
}

macro_rules! impl_from_mutex {
    ($($variant:ident),*) => {$(
        impl<'a> From<&'a $variant> for MutexInterface<'a> {
            #[inline]
            fn from(mutex: &'a $variant) -> Self {
                Self::$variant(mutex)
            }
        }
    )*};
}

impl_from_mutex!(
    Mutex,
    RecursiveMutex,
    TimedMutex,
    RecursiveTimedMutex,
    SharedMutex,
    SharedTimedMutex
);

/// A non-owning handle to either shared mutex kind.
#[derive(Clone, Copy)]
pub enum SharedMutexInterface<'a> {
    /// A [`SharedMutex`].
    SharedMutex(&'a SharedMutex),
    /// A [`SharedTimedMutex`].
    SharedTimedMutex(&'a SharedTimedMutex),
}

impl<'a> SharedMutexInterface<'a> {
    /// The kind of mutex this refers to.
    pub fn kind(&self) -> MutexKind {
        match self {
            Self::SharedMutex(_) => MutexKind::SharedMutex,
            Self::SharedTimedMutex(_) => MutexKind::SharedTimedMutex,
        }
    }

    /// The shared-locking operations of the referenced mutex.
    pub fn as_shared(&self) -> &'a dyn SharedLockable {
        match *self {
            Self::SharedMutex(m) => m,
            Self::SharedTimedMutex(m) => m,
        }
    }

    /// The timed shared-locking operations of the referenced mutex, or
    /// `None` if it has none.
    pub fn as_timed(&self) -> Option<&'a dyn SharedTimedLockable> {
        match *self {
            Self::SharedMutex(_) => None,
            Self::SharedTimedMutex(m) => Some(m as &dyn SharedTimedLockable),
        }
    }

    /// Block until the calling thread holds a shared lock.
    #[inline]
    pub fn lock_shared(&self) {
        self.as_shared().lock_shared()
    }

    /// Take a shared lock without blocking, if possible.
    #[inline]
    pub fn try_lock_shared(&self) -> bool {
        self.as_shared().try_lock_shared()
    }

    /// Release a shared lock held by the calling thread.
    #[inline]
    pub fn unlock_shared(&self) {
        self.as_shared().unlock_shared()
    }

    /// The same mutex, viewed for exclusive locking.
    #[inline]
    pub fn exclusive(&self) -> MutexInterface<'a> {
        (*self).into()
    }
}

impl<'a, 'b> PartialEq<SharedMutexInterface<'b>> for SharedMutexInterface<'a> {
    fn eq(&self, other: &SharedMutexInterface<'b>) -> bool {
        self.exclusive() == other.exclusive()
    }
}

impl Eq for SharedMutexInterface<'_> {}

impl fmt::Debug for SharedMutexInterface<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMutexInterface")
            .field("kind", &self.kind())
            .field("addr", &self.exclusive().addr())
            .finish()
    }
}

impl<'a> From<&'a SharedMutex> for SharedMutexInterface<'a> {
    #[inline]
    fn from(mutex: &'a SharedMutex) -> Self {
        Self::SharedMutex(mutex)
    }
}

impl<'a> From<&'a SharedTimedMutex> for SharedMutexInterface<'a> {
    #[inline]
    fn from(mutex: &'a SharedTimedMutex) -> Self {
        Self::SharedTimedMutex(mutex)
    }
}

impl<'a> From<SharedMutexInterface<'a>> for MutexInterface<'a> {
    #[inline]
    fn from(mutex: SharedMutexInterface<'a>) -> Self {
        match mutex {
            SharedMutexInterface::SharedMutex(m) => Self::SharedMutex(m),
            SharedMutexInterface::SharedTimedMutex(m) => Self::SharedTimedMutex(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_capability_follows_kind() {
        let plain = Mutex::new();
        let recursive = RecursiveMutex::new();
        let timed = TimedMutex::new();
        let recursive_timed = RecursiveTimedMutex::new();
        let shared = SharedMutex::new();
        let shared_timed = SharedTimedMutex::new();

        let all: [MutexInterface<'_>; 6] = [
            (&plain).into(),
            (&recursive).into(),
            (&timed).into(),
            (&recursive_timed).into(),
            (&shared).into(),
            (&shared_timed).into(),
        ];
        for m in all {
            assert_eq!(m.as_timed().is_some(), m.kind().is_timed(), "{:?}", m);
        }
    }

    #[test]
    fn native_mutex_reaches_the_guard() {
        let timed = TimedMutex::new();
        let m = MutexInterface::from(&timed);
        let NativeMutex::Plain(native) = m.native_mutex() else {
            panic!("TimedMutex should sit on a plain futex mutex");
        };

        // Between operations the emulated mutex's guard is free, even while
        // the emulated mutex itself is owned.
        m.lock();
        assert!(!native.is_locked());
        assert!(!m.try_lock());
        m.unlock();

        let recursive = RecursiveMutex::new();
        assert!(matches!(
            MutexInterface::from(&recursive).native_mutex(),
            NativeMutex::Recursive(_)
        ));
    }

    #[test]
    fn equality_is_identity() {
        let a = Mutex::new();
        let b = Mutex::new();
        assert_eq!(MutexInterface::from(&a), MutexInterface::from(&a));
        assert_ne!(MutexInterface::from(&a), MutexInterface::from(&b));

        let shared = SharedMutex::new();
        assert_eq!(
            SharedMutexInterface::from(&shared).exclusive(),
            MutexInterface::from(&shared)
        );
    }
}
