//! Clocks and time points.
//!
//! Every deadline in this crate is an absolute [`TimePoint`] tagged with the
//! [`Clock`] it was read from, so a wait can re-read "now" from the same
//! clock on each iteration rather than tracking elapsed time.

use core::cmp::Ordering;
use core::ops::{Add, Sub};
use core::time::Duration;
use rustix::time::{clock_gettime, ClockId, Timespec};

/// A source of time points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Clock {
    /// The wall clock (`CLOCK_REALTIME`). It may jump when the system time is
    /// adjusted.
    System,
    /// A monotonic clock (`CLOCK_MONOTONIC`). It never goes backwards.
    Steady,
}

impl Clock {
    /// Read the current time from this clock.
    #[inline]
    pub fn now(self) -> TimePoint {
        TimePoint {
            clock: self,
            since_epoch: since_epoch(clock_gettime(self.id())),
        }
    }

    #[inline]
    pub(crate) fn id(self) -> ClockId {
        match self {
            Self::System => ClockId::Realtime,
            Self::Steady => ClockId::Monotonic,
        }
    }
}

// A wall clock set before 1970 reads as the epoch.
fn since_epoch(ts: Timespec) -> Duration {
    match u64::try_from(ts.tv_sec) {
        Ok(secs) => Duration::new(secs, ts.tv_nsec as u32),
        Err(_) => Duration::ZERO,
    }
}

/// A point in time on a particular [`Clock`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimePoint {
    clock: Clock,
    since_epoch: Duration,
}

impl TimePoint {
    /// Construct a time point `since_epoch` after the epoch of `clock`.
    #[inline]
    pub const fn new(clock: Clock, since_epoch: Duration) -> Self {
        Self { clock, since_epoch }
    }

    /// Read the current time from `clock`. Same as [`Clock::now`].
    #[inline]
    pub fn now(clock: Clock) -> Self {
        clock.now()
    }

    /// The clock this time point was measured on.
    #[inline]
    pub const fn clock(&self) -> Clock {
        self.clock
    }

    /// The distance from the clock's epoch.
    #[inline]
    pub const fn since_epoch(&self) -> Duration {
        self.since_epoch
    }

    /// Test whether this time point is strictly in the future of its clock.
    #[inline]
    pub fn is_future(&self) -> bool {
        self.clock.now() < *self
    }

    /// Convert to an absolute `Timespec` for a kernel timed wait.
    ///
    /// Returns `None` if the time point is too far out for a `Timespec`,
    /// which callers treat as an infinite timeout.
    pub(crate) fn to_timespec(self) -> Option<Timespec> {
        Some(Timespec {
            tv_sec: self.since_epoch.as_secs().try_into().ok()?,
            tv_nsec: self.since_epoch.subsec_nanos() as _,
        })
    }
}

impl PartialOrd for TimePoint {
    /// Time points are only ordered against points from the same clock.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.clock == other.clock {
            Some(self.since_epoch.cmp(&other.since_epoch))
        } else {
            None
        }
    }
}

impl Add<Duration> for TimePoint {
    type Output = Self;

    /// Saturates at the largest representable time point.
    fn add(self, rhs: Duration) -> Self {
        Self {
            clock: self.clock,
            since_epoch: self.since_epoch.saturating_add(rhs),
        }
    }
}

impl Sub<Duration> for TimePoint {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self {
        Self {
            clock: self.clock,
            since_epoch: self.since_epoch.saturating_sub(rhs),
        }
    }
}

impl Sub for TimePoint {
    type Output = Duration;

    /// The (saturating) distance between two time points on the same clock.
    fn sub(self, rhs: Self) -> Duration {
        debug_assert_eq!(
            self.clock, rhs.clock,
            "subtracting time points from different clocks"
        );
        self.since_epoch.saturating_sub(rhs.since_epoch)
    }
}

/// Read the system (wall) clock.
#[inline]
pub fn system_clock_now() -> TimePoint {
    Clock::System.now()
}

/// Read the steady (monotonic) clock.
#[inline]
pub fn steady_clock_now() -> TimePoint {
    Clock::Steady.now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_clock_does_not_go_backwards() {
        let a = steady_clock_now();
        let b = steady_clock_now();
        assert!(a <= b);
    }

    #[test]
    fn no_order_across_clocks() {
        let sys = TimePoint::new(Clock::System, Duration::from_secs(1));
        let steady = TimePoint::new(Clock::Steady, Duration::from_secs(1));
        assert_eq!(sys.partial_cmp(&steady), None);
        assert!(!(sys < steady));
        assert!(!(sys > steady));
    }

    #[test]
    fn arithmetic() {
        let t = TimePoint::new(Clock::Steady, Duration::from_millis(500));
        let later = t + Duration::from_millis(250);
        assert_eq!(later - t, Duration::from_millis(250));
        assert_eq!(t - later, Duration::ZERO);
        assert_eq!((later - Duration::from_secs(10)).since_epoch(), Duration::ZERO);
        assert!(t < later);
    }

    #[test]
    fn future_and_past() {
        assert!((system_clock_now() + Duration::from_secs(60)).is_future());
        assert!(!(system_clock_now() - Duration::from_secs(60)).is_future());
    }

    #[test]
    fn timespec_conversion() {
        let t = TimePoint::new(Clock::System, Duration::new(12, 345));
        let ts = t.to_timespec().unwrap();
        assert_eq!(ts.tv_sec, 12);
        assert_eq!(ts.tv_nsec, 345);
    }

    #[test]
    fn clock_before_epoch_reads_as_epoch() {
        let before = Timespec {
            tv_sec: -5,
            tv_nsec: 250,
        };
        assert_eq!(since_epoch(before), Duration::ZERO);
        let after = Timespec {
            tv_sec: 5,
            tv_nsec: 250,
        };
        assert_eq!(since_epoch(after), Duration::new(5, 250));
    }

    #[test]
    fn far_future_has_no_timespec() {
        let end_of_time = steady_clock_now() + Duration::MAX;
        assert_eq!(end_of_time.since_epoch(), Duration::MAX);
        assert!(end_of_time.to_timespec().is_none());

        let last = TimePoint::new(Clock::System, Duration::from_secs(i64::MAX as u64));
        assert_eq!(last.to_timespec().unwrap().tv_sec, i64::MAX);
    }
}
