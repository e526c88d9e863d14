//! Rational time values for sample- and frame-accurate positioning.
//!
//! All timeline positions in the engine are rational numbers
//! (`numerator / denominator` seconds) rather than floats, so that
//! audio sample positions (`n / 48000`) and video frame positions
//! (`n / 30`) can be represented and compared exactly, without
//! accumulating floating-point drift over long timelines.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Fallback denominator (microsecond precision) used when an exact
/// arithmetic result would not fit a 32-bit denominator.
const MICROS_DEN: i32 = 1_000_000;

/// Rational time value in seconds: `num / den`.
///
/// Invariant: `den > 0`. The sign is carried by `num`, and the fraction
/// is kept reduced (gcd-normalized) by every constructor and operation.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
pub struct TimeRational {
    pub num: i64,
    pub den: i32,
}

impl TimeRational {
    pub const ZERO: Self = Self { num: 0, den: 1 };

    /// Create a reduced rational. The sign is normalized onto the
    /// numerator.
    ///
    /// # Panics
    ///
    /// Panics if `den == 0`.
    pub fn new(num: i64, den: i32) -> Self {
        assert!(den != 0, "TimeRational denominator must be non-zero");
        let (num, den) = if den < 0 {
            (-(num as i128), -(den as i128))
        } else {
            (num as i128, den as i128)
        };
        reduce(num, den)
    }

    /// Value in (floating-point) seconds. Lossy; use only for display,
    /// logging, and millisecond-domain math.
    pub fn as_secs_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

/// Reduce `num / den` (with `den > 0`) by their gcd and fit the result
/// into `(i64, i32)`. When the reduced denominator still exceeds
/// `i32::MAX` the value is rounded to microsecond precision instead --
/// exactness is preserved wherever the representation allows it, and
/// degrades to +/-0.5us only on pathological denominator combinations.
fn reduce(num: i128, den: i128) -> TimeRational {
    debug_assert!(den > 0);
    let g = gcd(num.unsigned_abs(), den as u128);
    let (num, den) = if g > 1 {
        (num / g as i128, den / g as i128)
    } else {
        (num, den)
    };

    if den <= i32::MAX as i128 && num >= i64::MIN as i128 && num <= i64::MAX as i128 {
        return TimeRational {
            num: num as i64,
            den: den as i32,
        };
    }

    // Round half away from zero to the microsecond grid.
    let scaled = num * MICROS_DEN as i128;
    let half = den / 2;
    let rounded = if scaled >= 0 {
        (scaled + half) / den
    } else {
        (scaled - half) / den
    };
    let g = gcd(rounded.unsigned_abs(), MICROS_DEN as u128);
    TimeRational {
        num: (rounded / g as i128) as i64,
        den: MICROS_DEN / g as i32,
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

fn add_rationals(a: TimeRational, b: TimeRational) -> TimeRational {
    let num = a.num as i128 * b.den as i128 + b.num as i128 * a.den as i128;
    let den = a.den as i128 * b.den as i128;
    reduce(num, den)
}

fn sub_rationals(a: TimeRational, b: TimeRational) -> TimeRational {
    let num = a.num as i128 * b.den as i128 - b.num as i128 * a.den as i128;
    let den = a.den as i128 * b.den as i128;
    reduce(num, den)
}

// Equality and ordering compare cross-multiplied numerators, so
// unreduced literals (`{6, 2}`) still compare equal to `{3, 1}`.
impl PartialEq for TimeRational {
    fn eq(&self, other: &Self) -> bool {
        self.num as i128 * other.den as i128 == other.num as i128 * self.den as i128
    }
}

impl Eq for TimeRational {}

impl PartialOrd for TimeRational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeRational {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.num as i128 * other.den as i128;
        let rhs = other.num as i128 * self.den as i128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for TimeRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl Default for TimeRational {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Absolute position on the timeline.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimePoint(TimeRational);

impl TimePoint {
    pub const ZERO: Self = Self(TimeRational { num: 0, den: 1 });

    pub fn new(num: i64, den: i32) -> Self {
        Self(TimeRational::new(num, den))
    }

    pub fn from_rational(rational: TimeRational) -> Self {
        Self(rational)
    }

    /// Position of `samples` at `sample_rate` Hz: `samples / sample_rate`.
    pub fn from_samples(samples: i64, sample_rate: u32) -> Self {
        Self(TimeRational::new(samples, sample_rate as i32))
    }

    pub fn from_micros(micros: i64) -> Self {
        Self(TimeRational::new(micros, MICROS_DEN))
    }

    pub fn to_rational(self) -> TimeRational {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    pub fn as_millis_f64(self) -> f64 {
        self.0.as_secs_f64() * 1000.0
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

/// Relative time span (may be negative).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeDuration(TimeRational);

impl TimeDuration {
    pub const ZERO: Self = Self(TimeRational { num: 0, den: 1 });

    pub fn new(num: i64, den: i32) -> Self {
        Self(TimeRational::new(num, den))
    }

    pub fn from_rational(rational: TimeRational) -> Self {
        Self(rational)
    }

    pub fn from_micros(micros: i64) -> Self {
        Self(TimeRational::new(micros, MICROS_DEN))
    }

    /// Millisecond value rounded to the microsecond grid. Used to fold
    /// millisecond-domain correction math back into rational positions.
    pub fn from_millis_f64(millis: f64) -> Self {
        Self(TimeRational::new((millis * 1000.0).round() as i64, MICROS_DEN))
    }

    pub fn to_rational(self) -> TimeRational {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    pub fn as_millis_f64(self) -> f64 {
        self.0.as_secs_f64() * 1000.0
    }
}

impl fmt::Display for TimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+.6}s", self.as_secs_f64())
    }
}

impl Add<TimeDuration> for TimePoint {
    type Output = TimePoint;
    fn add(self, rhs: TimeDuration) -> TimePoint {
        TimePoint(add_rationals(self.0, rhs.0))
    }
}

impl Sub<TimeDuration> for TimePoint {
    type Output = TimePoint;
    fn sub(self, rhs: TimeDuration) -> TimePoint {
        TimePoint(sub_rationals(self.0, rhs.0))
    }
}

impl Sub for TimePoint {
    type Output = TimeDuration;
    fn sub(self, rhs: TimePoint) -> TimeDuration {
        TimeDuration(sub_rationals(self.0, rhs.0))
    }
}

impl Add for TimeDuration {
    type Output = TimeDuration;
    fn add(self, rhs: TimeDuration) -> TimeDuration {
        TimeDuration(add_rationals(self.0, rhs.0))
    }
}

impl Sub for TimeDuration {
    type Output = TimeDuration;
    fn sub(self, rhs: TimeDuration) -> TimeDuration {
        TimeDuration(sub_rationals(self.0, rhs.0))
    }
}

impl Neg for TimeDuration {
    type Output = TimeDuration;
    fn neg(self) -> TimeDuration {
        TimeDuration(TimeRational {
            num: -self.0.num,
            den: self.0.den,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rational_roundtrip_exact() {
        for (n, d) in [(0, 1), (1, 48000), (30000, 1001), (-7, 3), (6, 2)] {
            let tp = TimePoint::new(n, d);
            let r = tp.to_rational();
            assert_eq!(TimePoint::from_rational(r), tp);
        }
    }

    #[test]
    fn normalization_reduces_and_fixes_sign() {
        let r = TimeRational::new(6, 2);
        assert_eq!(r.num, 3);
        assert_eq!(r.den, 1);

        let r = TimeRational::new(5, -10);
        assert_eq!(r.num, -1);
        assert_eq!(r.den, 2);
        assert!(r.den > 0);
    }

    #[test]
    fn equality_is_cross_multiplied() {
        assert_eq!(TimePoint::new(6, 2), TimePoint::new(3, 1));
        assert_eq!(
            TimeRational { num: 6, den: 2 },
            TimeRational { num: 3, den: 1 }
        );
        assert_ne!(TimePoint::new(1, 48000), TimePoint::new(1, 44100));
    }

    #[test]
    fn ordering() {
        let a = TimePoint::new(1, 48000);
        let b = TimePoint::new(1, 44100);
        assert!(a < b);
        assert!(TimePoint::new(-1, 2) < TimePoint::ZERO);
        assert!(TimePoint::new(30000, 1001) < TimePoint::new(30, 1));
    }

    #[test]
    fn addition_exact_same_denominator() {
        let a = TimePoint::from_samples(48000, 48000);
        let d = TimeDuration::new(24000, 48000);
        assert_eq!(a + d, TimePoint::new(3, 2));
    }

    #[test]
    fn addition_cross_denominator() {
        // 1/3 + 1/6 == 1/2, exactly
        let sum = TimeDuration::new(1, 3) + TimeDuration::new(1, 6);
        assert_eq!(sum, TimeDuration::new(1, 2));
    }

    #[test]
    fn subtraction_yields_duration() {
        let audio = TimePoint::from_samples(48000, 48000);
        let video = TimePoint::new(1001, 1000);
        let offset = video - audio;
        assert_eq!(offset, TimeDuration::new(1, 1000));
        assert!((offset.as_millis_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overflowing_denominator_falls_back_to_micros() {
        // 48000 and 999983 are coprime, so the exact common denominator
        // exceeds i32::MAX and the sum rounds to the microsecond grid.
        let sum = TimeDuration::new(1, 48000) + TimeDuration::new(1, 999_983);
        assert_eq!(sum, TimeDuration::new(22, 1_000_000));
        let expected = 1.0 / 48000.0 + 1.0 / 999_983.0;
        assert!((sum.as_secs_f64() - expected).abs() < 1e-6);
    }

    #[test]
    fn in_range_cross_denominator_stays_exact() {
        // Sample-rate + microsecond denominators reduce to 6_000_000,
        // which still fits, so no rounding occurs.
        let sum = TimePoint::from_samples(48001, 48000) + TimeDuration::from_micros(1);
        assert_eq!(sum, TimePoint::new(6_000_131, 6_000_000));
    }

    #[test]
    fn millis_conversion_rounds_to_micros() {
        let d = TimeDuration::from_millis_f64(2.5);
        assert_eq!(d, TimeDuration::new(2500, 1_000_000));
        let neg = TimeDuration::from_millis_f64(-0.1);
        assert!((neg.as_millis_f64() + 0.1).abs() < 1e-9);
    }

    #[test]
    fn negation() {
        let d = TimeDuration::new(3, 4);
        assert_eq!(-d, TimeDuration::new(-3, 4));
        assert_eq!(d + -d, TimeDuration::ZERO);
    }

    #[test]
    fn display() {
        assert_eq!(TimeRational::new(30, 1).to_string(), "30");
        assert_eq!(TimeRational::new(30000, 1001).to_string(), "30000/1001");
        assert_eq!(TimePoint::new(1, 2).to_string(), "0.500000s");
    }

    #[test]
    fn serde_roundtrip() {
        let tp = TimePoint::new(30000, 1001);
        let json = serde_json::to_string(&tp).unwrap();
        let back: TimePoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tp);
    }
}
