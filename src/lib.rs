#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

pub mod basic;
pub mod sync;
pub mod thread;
pub mod time;

pub use rustix::io::Errno;
pub use sync::{
    Condvar, CondvarStatus, LockMode, Mutex, MutexInterface, MutexKind, RecursiveMutex,
    RecursiveTimedMutex, SharedLock, SharedMutex, SharedMutexInterface, SharedTimedMutex,
    TimedMutex, UniqueLock,
};
pub use thread::{current_thread_id, ThreadId};
pub use time::{steady_clock_now, system_clock_now, Clock, TimePoint};
