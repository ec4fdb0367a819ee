//! Integer fixed-point helpers for vote weights.
//!
//! Every ratio in the crate goes through here so that the displayed
//! percentage and the raw value never disagree because of float rounding.
//! Fractions coming from plugin settings are held in parts per million
//! (the plugins' own `RATIO_BASE`), percentages in basis points.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const RATIO_BASE: u32 = 1_000_000;
const BASIS_POINTS: u64 = 10_000;

/// A fraction in `[0, 1]` stored as parts per million.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ppm(u32);

impl Ppm {
    pub const ZERO: Ppm = Ppm(0);
    pub const ONE: Ppm = Ppm(RATIO_BASE);

    pub fn new(value: u32) -> Option<Self> {
        (value <= RATIO_BASE).then_some(Self(value))
    }

    /// Converts a settings fraction (`0.5`) into ppm, clamping to `[0, 1]`.
    pub fn from_fraction(fraction: f64) -> Self {
        if !fraction.is_finite() || fraction <= 0.0 {
            return Self::ZERO;
        }
        if fraction >= 1.0 {
            return Self::ONE;
        }
        Self((fraction * RATIO_BASE as f64).round() as u32)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Whole percent, rounded half-up (`0.555` -> `56`).
    pub fn whole_percent(self) -> u32 {
        (self.0 + 5_000) / 10_000
    }

    /// `ceil(total * self)`, the smallest weight that satisfies the fraction.
    pub fn apply_ceil(self, total: U256) -> U256 {
        let base = U256::from(RATIO_BASE);
        let scaled = total.saturating_mul(U256::from(self.0));
        let quotient = scaled / base;
        if (scaled % base).is_zero() {
            quotient
        } else {
            quotient + U256::from(1)
        }
    }

    /// Strict `part / whole > self`. A zero `whole` never exceeds anything.
    pub fn is_exceeded_by(self, part: U256, whole: U256) -> bool {
        if whole.is_zero() {
            return false;
        }
        part.saturating_mul(U256::from(RATIO_BASE)) > whole.saturating_mul(U256::from(self.0))
    }
}

/// A percentage held in basis points (hundredths of a percent).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Percentage(U256);

impl Percentage {
    pub const ZERO: Percentage = Percentage(U256::ZERO);

    /// `part / whole * 100`, rounded half-up to two decimals. Zero when `whole` is zero.
    pub fn of(part: U256, whole: U256) -> Self {
        if whole.is_zero() {
            return Self::ZERO;
        }
        let doubled = part.saturating_mul(U256::from(2 * BASIS_POINTS));
        Self((doubled + whole) / (whole * U256::from(2)))
    }

    pub fn from_ppm(ppm: Ppm) -> Self {
        Self(U256::from((ppm.value() + 50) / 100))
    }

    pub fn basis_points(&self) -> U256 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hundredths_to_string(self.0))
    }
}

/// Renders a token amount in whole units, rounded half-up to two decimals
/// and trimmed (`1_234_500_000_000_000_000` with 18 decimals is `"1.23"`).
pub fn format_amount(value: U256, decimals: u8) -> String {
    let scale = U256::from(10u64).pow(U256::from(decimals));
    let doubled = value.saturating_mul(U256::from(200u64));
    let hundredths = (doubled + scale) / (scale * U256::from(2));
    hundredths_to_string(hundredths)
}

fn hundredths_to_string(hundredths: U256) -> String {
    let hundred = U256::from(100u64);
    let whole = hundredths / hundred;
    let fraction = (hundredths % hundred).to::<u64>();

    match fraction {
        0 => whole.to_string(),
        f if f % 10 == 0 => format!("{whole}.{}", f / 10),
        f => format!("{whole}.{f:02}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ppm_from_fraction() {
        assert_eq!(Ppm::from_fraction(0.5).value(), 500_000);
        assert_eq!(Ppm::from_fraction(0.2).value(), 200_000);
        assert_eq!(Ppm::from_fraction(-1.0), Ppm::ZERO);
        assert_eq!(Ppm::from_fraction(f64::NAN), Ppm::ZERO);
        assert_eq!(Ppm::from_fraction(1.7), Ppm::ONE);
        assert_eq!(Ppm::new(1_000_001), None);
    }

    #[test]
    fn test_apply_ceil_rounds_up() {
        let twenty = Ppm::from_fraction(0.2);
        assert_eq!(twenty.apply_ceil(U256::from(1000)), U256::from(200));
        assert_eq!(twenty.apply_ceil(U256::from(7)), U256::from(2));
        assert_eq!(Ppm::ZERO.apply_ceil(U256::from(7)), U256::ZERO);
    }

    #[test]
    fn test_is_exceeded_by_is_strict() {
        let half = Ppm::from_fraction(0.5);
        assert!(half.is_exceeded_by(U256::from(600), U256::from(650)));
        assert!(!half.is_exceeded_by(U256::from(50), U256::from(100)));
        assert!(!half.is_exceeded_by(U256::from(300), U256::from(1000)));
        assert!(!half.is_exceeded_by(U256::ZERO, U256::ZERO));
    }

    #[test]
    fn test_percentage_rounds_half_up() {
        assert_eq!(Percentage::of(U256::from(600), U256::from(650)).to_string(), "92.31");
        assert_eq!(Percentage::of(U256::from(1), U256::from(8)).to_string(), "12.5");
        // 1/3 = 33.333.. and 2/3 = 66.666..
        assert_eq!(Percentage::of(U256::from(1), U256::from(3)).to_string(), "33.33");
        assert_eq!(Percentage::of(U256::from(2), U256::from(3)).to_string(), "66.67");
        assert_eq!(Percentage::of(U256::from(600), U256::from(1000)).to_string(), "60");
        assert_eq!(Percentage::of(U256::from(5), U256::ZERO), Percentage::ZERO);
    }

    #[test]
    fn test_format_amount() {
        let wei = U256::from(1_234_500_000_000_000_000u128);
        assert_eq!(format_amount(wei, 18), "1.23");
        assert_eq!(format_amount(U256::from(1_235_000_000_000_000_000u128), 18), "1.24");
        assert_eq!(format_amount(U256::from(600), 0), "600");
        assert_eq!(format_amount(U256::from(150), 2), "1.5");
        assert_eq!(format_amount(U256::ZERO, 6), "0");
    }

    #[test]
    fn test_whole_percent() {
        assert_eq!(Ppm::from_fraction(0.5).whole_percent(), 50);
        assert_eq!(Ppm::from_fraction(0.555).whole_percent(), 56);
        assert_eq!(Percentage::from_ppm(Ppm::from_fraction(0.2)).to_string(), "20");
    }
}
