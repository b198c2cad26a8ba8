//! Exact seconds + nanoseconds arithmetic for ttytee
//!
//! The engine paces its poll loop by comparing monotonic clock readings.
//! [`Interval`] keeps those readings as a pair of fixed-width integers so
//! differences are exact, and normalizes carries in both directions,
//! including values that are negative.
//!
//! Values are truncated toward zero: a non-negative interval has
//! `nanos` in `[0, 1e9)`, a negative one has `nanos` in `(-1e9, 0]`.
//! With that representation the lexicographic order of
//! `(secs, nanos)` is the numeric order of the value.

use std::ops::{Add, Sub};
use std::time::Duration;

use nix::time::{clock_gettime, ClockId};

/// Nanoseconds in one second
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A signed time interval or timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Interval {
    pub secs: i64,
    pub nanos: i64,
}

impl Interval {
    pub const ZERO: Interval = Interval { secs: 0, nanos: 0 };

    /// Build an interval from raw fields.
    ///
    /// The fields are stored as given; use [`Interval::normalized`] for
    /// values that may be out of range.
    pub const fn new(secs: i64, nanos: i64) -> Self {
        Self { secs, nanos }
    }

    pub const fn from_millis(millis: i64) -> Self {
        Self {
            secs: millis / 1000,
            nanos: (millis % 1000) * 1_000_000,
        }
    }

    /// Fold an arbitrary `(secs, nanos)` pair into canonical form.
    ///
    /// Seconds wrap on overflow, like the fixed-width fields they model.
    pub fn normalized(secs: i64, nanos: i64) -> Self {
        let mut secs = secs.wrapping_add(nanos / NANOS_PER_SEC);
        let mut nanos = nanos % NANOS_PER_SEC;

        // Borrow: whole seconds positive, fraction negative (11.1 - 10.5 = 1, -0.4)
        if secs > 0 && nanos < 0 {
            nanos += NANOS_PER_SEC;
            secs = secs.wrapping_sub(1);
        }

        // Carry: whole seconds negative, fraction positive
        if secs < 0 && nanos > 0 {
            nanos -= NANOS_PER_SEC;
            secs = secs.wrapping_add(1);
        }

        Self { secs, nanos }
    }

    /// `self + rhs`
    ///
    /// Handles the positive overflow of the nanosecond sum, the borrow
    /// when seconds end up positive with a negative fraction, and the
    /// double borrow of two negative values (-10.6 + -1.6 = -12.2).
    pub fn add(self, rhs: Interval) -> Interval {
        Self::normalized(
            self.secs.wrapping_add(rhs.secs),
            self.nanos.wrapping_add(rhs.nanos),
        )
    }

    /// `self - rhs`
    ///
    /// Either operand may be negative. The result keeps `nanos` in
    /// `[0, 1e9)` when it is non-negative and in `(-1e9, 0]` otherwise.
    pub fn subtract(self, rhs: Interval) -> Interval {
        Self::normalized(
            self.secs.wrapping_sub(rhs.secs),
            self.nanos.wrapping_sub(rhs.nanos),
        )
    }

    /// Strict "is later than": seconds first, nanoseconds on a tie.
    ///
    /// Equal values are not after each other.
    pub fn is_after(&self, other: &Interval) -> bool {
        if self.secs != other.secs {
            return self.secs > other.secs;
        }
        self.nanos > other.nanos
    }

    pub fn is_negative(&self) -> bool {
        self.secs < 0 || self.nanos < 0
    }

    /// Convert to a [`Duration`], or `None` if the interval is negative
    pub fn to_duration(self) -> Option<Duration> {
        if self.is_negative() {
            return None;
        }
        Some(Duration::new(self.secs as u64, self.nanos as u32))
    }

    /// Current reading of the raw monotonic clock
    pub fn now() -> nix::Result<Interval> {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        let clock = ClockId::CLOCK_MONOTONIC_RAW;
        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        let clock = ClockId::CLOCK_MONOTONIC;

        let ts = clock_gettime(clock)?;
        Ok(Interval::new(ts.tv_sec() as i64, ts.tv_nsec() as i64))
    }
}

impl Add for Interval {
    type Output = Interval;

    fn add(self, rhs: Interval) -> Interval {
        Interval::add(self, rhs)
    }
}

impl Sub for Interval {
    type Output = Interval;

    fn sub(self, rhs: Interval) -> Interval {
        Interval::subtract(self, rhs)
    }
}

impl From<Duration> for Interval {
    fn from(d: Duration) -> Self {
        Interval::new(d.as_secs() as i64, d.subsec_nanos() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_carries_into_seconds() {
        let sum = Interval::new(0, 999_999_999).add(Interval::new(0, 2));
        assert_eq!(sum, Interval::new(1, 1));
    }

    #[test]
    fn test_add_borrows_when_fraction_negative() {
        // 11.1 + (-10.5)
        let sum = Interval::new(11, 100_000_000).add(Interval::new(-10, -500_000_000));
        assert_eq!(sum, Interval::new(0, 600_000_000));
    }

    #[test]
    fn test_add_double_borrow_negative() {
        // -10.6 + -1.6 = -12.2
        let sum = Interval::new(-10, -600_000_000).add(Interval::new(-1, -600_000_000));
        assert_eq!(sum, Interval::new(-12, -200_000_000));
    }

    #[test]
    fn test_subtract_across_second_boundary() {
        let diff = Interval::new(2, 100).subtract(Interval::new(0, 200));
        assert_eq!(diff, Interval::new(1, 999_999_900));
    }

    #[test]
    fn test_subtract_below_zero() {
        let diff = Interval::new(0, 500_000_000).subtract(Interval::new(1, 0));
        assert_eq!(diff, Interval::new(0, -500_000_000));

        let diff = Interval::new(1, 0).subtract(Interval::new(2, 500_000_000));
        assert_eq!(diff, Interval::new(-1, -500_000_000));
    }

    #[test]
    fn test_subtract_negative_left_operand() {
        // -1.5 - 0.6 = -2.1
        let diff = Interval::new(-1, -500_000_000).subtract(Interval::new(0, 600_000_000));
        assert_eq!(diff, Interval::new(-2, -100_000_000));

        // -1.5 - (-3.0) = 1.5
        let diff = Interval::new(-1, -500_000_000).subtract(Interval::new(-3, 0));
        assert_eq!(diff, Interval::new(1, 500_000_000));
    }

    #[test]
    fn test_is_after_is_strict() {
        let a = Interval::new(3, 10);
        assert!(!a.is_after(&a));
        assert!(a.is_after(&Interval::new(3, 9)));
        assert!(a.is_after(&Interval::new(2, 999_999_999)));
        assert!(!a.is_after(&Interval::new(4, 0)));
    }

    #[test]
    fn test_extreme_fields_wrap_instead_of_panicking() {
        let max = Interval::new(i64::MAX, 999_999_999);
        assert_eq!(max.add(Interval::new(0, 1)), Interval::new(i64::MIN, 0));

        let min = Interval::new(i64::MIN, 0);
        assert_eq!(min.subtract(Interval::new(1, 0)), Interval::new(i64::MAX, 0));

        // Unnormalized nanoseconds at the edge of the range
        let wide = Interval::normalized(0, i64::MAX);
        assert_eq!(wide, Interval::new(i64::MAX / NANOS_PER_SEC, i64::MAX % NANOS_PER_SEC));
        let _ = Interval::new(0, i64::MIN).subtract(Interval::new(0, 1));
    }

    #[test]
    fn test_from_millis() {
        assert_eq!(Interval::from_millis(10), Interval::new(0, 10_000_000));
        assert_eq!(Interval::from_millis(1500), Interval::new(1, 500_000_000));
    }

    #[test]
    fn test_to_duration() {
        assert_eq!(
            Interval::new(1, 5).to_duration(),
            Some(Duration::new(1, 5))
        );
        assert_eq!(Interval::new(0, -5).to_duration(), None);
    }

    #[test]
    fn test_now_is_monotonic() {
        let a = Interval::now().unwrap();
        let b = Interval::now().unwrap();
        assert!(!a.is_after(&b));
    }
}
