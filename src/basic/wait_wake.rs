//! The following is derived from Rust's
//! library/std/src/sys/unix/futex.rs at revision
//! f3579268372723bc4ff7b76090c090aa7b9e6a3a.
//!
//! Thin wrappers over the Linux `futex` wait and wake operations.

use crate::time::{Clock, TimePoint};
use core::ptr::{null, null_mut};
use core::sync::atomic::AtomicU32;
use core::sync::atomic::Ordering::Relaxed;
use rustix::io::Errno;
use rustix::thread::{futex, FutexFlags, FutexOperation};

/// Wait for a `futex_wake` operation to wake us.
///
/// Returns directly if the futex doesn't hold the expected value.
///
/// `deadline` is absolute, measured on its own clock; `None` waits forever.
/// Returns false on timeout, and true in all other cases.
pub(crate) fn futex_wait(futex_word: &AtomicU32, expected: u32, deadline: Option<TimePoint>) -> bool {
    // Overflows are rounded up to an infinite timeout (None).
    let timespec = deadline.and_then(TimePoint::to_timespec);

    // FUTEX_WAIT_BITSET measures its absolute timeout on CLOCK_MONOTONIC
    // unless asked for CLOCK_REALTIME.
    let flags = match deadline.map(|d| d.clock()) {
        Some(Clock::System) => FutexFlags::PRIVATE | FutexFlags::CLOCK_REALTIME,
        _ => FutexFlags::PRIVATE,
    };

    loop {
        // No need to wait if the value already changed.
        if futex_word.load(Relaxed) != expected {
            return true;
        }

        let r = unsafe {
            // Use FUTEX_WAIT_BITSET rather than FUTEX_WAIT to be able to give
            // an absolute time rather than a relative time.
            futex(
                futex_word.as_ptr(),
                FutexOperation::WaitBitset,
                flags,
                expected,
                timespec.as_ref().map_or(null(), |t| t as *const _),
                null_mut(),
                !0u32, // A full bitmask, to make it behave like a regular FUTEX_WAIT.
            )
        };

        match r {
            Err(Errno::TIMEDOUT) => return false,
            Err(Errno::INTR) => continue,
            _ => return true,
        }
    }
}

/// Wake up one thread that's blocked on `futex_wait` on this futex.
///
/// Returns true if this actually woke up such a thread, or false if no
/// thread was waiting on this futex.
pub(crate) fn futex_wake(futex_word: &AtomicU32) -> rustix::io::Result<bool> {
    let woken = unsafe {
        futex(
            futex_word.as_ptr(),
            FutexOperation::Wake,
            FutexFlags::PRIVATE,
            1,
            null(),
            null_mut(),
            0,
        )?
    };
    Ok(woken > 0)
}

/// Wake up all threads that are waiting on `futex_wait` on this futex.
pub(crate) fn futex_wake_all(futex_word: &AtomicU32) -> rustix::io::Result<()> {
    unsafe {
        futex(
            futex_word.as_ptr(),
            FutexOperation::Wake,
            FutexFlags::PRIVATE,
            i32::MAX as u32,
            null(),
            null_mut(),
            0,
        )?;
    }
    Ok(())
}
