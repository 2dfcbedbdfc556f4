//! Basic primitives: a futex mutex, a recursive mutex built on it, and a
//! futex condition variable.
//!
//! These report OS failures as [`rustix::io::Result`] and attach no further
//! semantics; the types in [`crate::sync`] are layered on top of them.

mod condvar;
mod mutex;
mod wait_wake;

pub use condvar::BasicCondvar;
pub use mutex::{BasicMutex, BasicRecursiveMutex};

/// A lock that a [`BasicCondvar`] can let go of while it sleeps, and take
/// back when it wakes.
pub trait Relock {
    /// Whatever `release` must hand back to `reacquire` so the lock is
    /// restored exactly, such as a recursion depth.
    type Saved;

    /// Give up the calling thread's hold on this lock.
    fn release(&self) -> rustix::io::Result<Self::Saved>;

    /// Block until the lock is held again, restoring `saved`.
    fn reacquire(&self, saved: Self::Saved) -> rustix::io::Result<()>;
}
