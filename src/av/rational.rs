//! Rational timebases and timestamp rescaling.
//!
//! Every packet timestamp is an integer tick count whose meaning is defined
//! by the stream's [`Rational`] timebase (seconds per tick). Remuxing moves
//! ticks between incompatible timebases, so the conversion has to round to
//! nearest and must not lose precision on large inputs; the arithmetic is
//! done in `i128` and clamped back to the `i64` range.

/// A rational number used as a stream timebase (seconds per tick).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    /// Numerator.
    pub num: i32,
    /// Denominator. Must be positive.
    pub den: i32,
}

impl Rational {
    /// One tick per nanosecond. Used as the common unit for normalized
    /// timestamps when comparing packets across streams.
    pub const NANOSECONDS: Rational = Rational::new(1, 1_000_000_000);

    /// One tick per millisecond.
    pub const MILLISECONDS: Rational = Rational::new(1, 1000);

    /// Constructs a timebase of `num / den` seconds per tick.
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Rescales a tick count from one timebase to another, rounding to nearest
/// with ties away from zero. The result is clamped to the `i64` range.
pub fn rescale_rnd(value: i64, from: Rational, to: Rational) -> i64 {
    debug_assert!(from.den > 0 && to.den > 0, "timebase denominators must be positive");

    let num = value as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    let half = den / 2;
    let rounded = if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    };

    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Rescales an optional tick count, passing the unset sentinel through
/// untouched.
pub fn rescale_opt(value: Option<i64>, from: Rational, to: Rational) -> Option<i64> {
    value.map(|v| rescale_rnd(v, from, to))
}

/// Converts a tick count in the given timebase to nanoseconds.
pub fn to_nanos(value: i64, timebase: Rational) -> i64 {
    rescale_rnd(value, timebase, Rational::NANOSECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identity_rescale() {
        let tb = Rational::new(1, 1000);
        assert_eq!(rescale_rnd(42, tb, tb), 42);
    }

    #[test]
    fn milliseconds_to_90khz() {
        let ms = Rational::new(1, 1000);
        let mpeg = Rational::new(1, 90_000);
        assert_eq!(rescale_rnd(1000, ms, mpeg), 90_000);
        assert_eq!(rescale_rnd(1, ms, mpeg), 90);
    }

    #[test]
    fn rounds_to_nearest() {
        // 1 tick at 1/3s into 1/1s: 0.333s rounds to 0
        assert_eq!(rescale_rnd(1, Rational::new(1, 3), Rational::new(1, 1)), 0);
        // 2 ticks at 1/3s: 0.667s rounds to 1
        assert_eq!(rescale_rnd(2, Rational::new(1, 3), Rational::new(1, 1)), 1);
        // ties round away from zero
        assert_eq!(rescale_rnd(1, Rational::new(1, 2), Rational::new(1, 1)), 1);
        assert_eq!(rescale_rnd(-1, Rational::new(1, 2), Rational::new(1, 1)), -1);
    }

    #[test]
    fn negative_values() {
        let ms = Rational::new(1, 1000);
        let mpeg = Rational::new(1, 90_000);
        assert_eq!(rescale_rnd(-1000, ms, mpeg), -90_000);
    }

    #[test]
    fn large_values_do_not_overflow() {
        let fine = Rational::new(1, 1_000_000_000);
        let coarse = Rational::new(1, 1000);
        let big = i64::MAX / 2;
        assert_eq!(rescale_rnd(big, fine, coarse), big / 1_000_000);
    }

    #[test]
    fn unset_passes_through() {
        let ms = Rational::new(1, 1000);
        assert_eq!(rescale_opt(None, ms, Rational::NANOSECONDS), None);
        assert_eq!(
            rescale_opt(Some(10), ms, Rational::NANOSECONDS),
            Some(10_000_000)
        );
    }

    #[test]
    fn to_nanos_converts() {
        assert_eq!(to_nanos(40, Rational::new(1, 1000)), 40_000_000);
        assert_eq!(to_nanos(90_000, Rational::new(1, 90_000)), 1_000_000_000);
    }
}
