//! Fixed-point progress percentage.
//!
//! Progress is stored as hundredths of a percent so that ratios and means
//! round the same way every time they are recomputed.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Hundredths in 100.00%.
const FULL_HUNDREDTHS: u16 = 10_000;

/// A percentage in `[0.00, 100.00]` with two decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Progress(u16);

impl Progress {
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(FULL_HUNDREDTHS);

    /// Build from hundredths of a percent, clamping to 100.00.
    #[must_use]
    pub const fn from_hundredths(hundredths: u16) -> Self {
        if hundredths > FULL_HUNDREDTHS {
            Self::FULL
        } else {
            Self(hundredths)
        }
    }

    /// Raw value in hundredths of a percent.
    #[must_use]
    pub const fn hundredths(self) -> u16 {
        self.0
    }

    /// `min(100, part / whole * 100)`, rounded half-up to two decimals.
    ///
    /// A zero `whole` yields `ZERO`.
    #[must_use]
    pub fn from_ratio(part: u64, whole: u64) -> Self {
        if whole == 0 {
            return Self::ZERO;
        }
        let whole = u128::from(whole);
        let scaled = (u128::from(part) * u128::from(FULL_HUNDREDTHS) + whole / 2) / whole;
        let clamped = scaled.min(u128::from(FULL_HUNDREDTHS));
        Self(u16::try_from(clamped).unwrap_or(FULL_HUNDREDTHS))
    }

    /// Arithmetic mean, rounded half-up. An empty input yields `ZERO`.
    #[must_use]
    pub fn mean<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let (sum, count) = values
            .into_iter()
            .fold((0u64, 0u64), |(sum, count), p| (sum + u64::from(p.0), count + 1));
        if count == 0 {
            return Self::ZERO;
        }
        let avg = (sum + count / 2) / count;
        Self(u16::try_from(avg).unwrap_or(FULL_HUNDREDTHS))
    }

    /// Parse a user-supplied percentage, rejecting values outside `[0, 100]`.
    ///
    /// # Errors
    ///
    /// Returns the rejected value when it is out of range or not finite.
    pub fn try_from_percent(value: f64) -> std::result::Result<Self, f64> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(value);
        }
        Ok(Self::from_percent_lossy(value))
    }

    /// Convert a stored percentage, clamping into range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_percent_lossy(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::ZERO;
        }
        let hundredths = (value * 100.0).round().min(f64::from(FULL_HUNDREDTHS));
        Self(hundredths as u16)
    }

    /// Percentage as a float (e.g. `75.0`).
    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 100.0
    }

    #[must_use]
    pub const fn is_complete(self) -> bool {
        self.0 == FULL_HUNDREDTHS
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{}.{:02}", self.0 / 100, self.0 % 100))
    }
}

impl Serialize for Progress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Progress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Self::try_from_percent(value).map_err(|v| {
            serde::de::Error::custom(format!("progress {v} is outside [0, 100]"))
        })
    }
}
