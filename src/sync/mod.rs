//! Mutexes, condition variables, and scoped lock guards.
//!
//! The mutex types here hold no data; they are locked and unlocked
//! explicitly, usually through a [`UniqueLock`] or [`SharedLock`] that
//! releases them on every exit path.
//!
//! `Mutex` and `RecursiveMutex` pass straight through to the futex
//! primitives in [`crate::basic`]. `TimedMutex`, `RecursiveTimedMutex`, and
//! the shared mutexes are monitors: a plain `Mutex` guarding a little state,
//! plus condition variables to sleep on while that state says "busy".

mod condvar;
mod interface;
mod mutex;
mod shared_lock;
mod shared_mutex;
mod unique_lock;

pub use condvar::{Condvar, CondvarStatus};
pub use interface::{
    Lockable, MutexInterface, MutexKind, NativeMutex, SharedLockable, SharedMutexInterface,
    SharedTimedLockable, TimedLockable,
};
pub use mutex::{Mutex, RecursiveMutex, RecursiveTimedMutex, TimedMutex};
pub use shared_lock::SharedLock;
pub use shared_mutex::{SharedMutex, SharedTimedMutex};
pub use unique_lock::{LockMode, UniqueLock};
