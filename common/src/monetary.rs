//! Monetary types: token amounts and fixed-point ratios.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use crate::error::CommonError;

/// Denominator of [`Ratio`]: ratios are expressed in parts-per-million.
pub const RATIO_BASE: u32 = 1_000_000;

/// Parts-per-million in one basis point.
const PPM_PER_BPS: u32 = 100;

/// Parts-per-million in one percent.
const PPM_PER_PERCENT: u32 = 10_000;

/// A non-negative, arbitrary-precision token quantity.
///
/// Serialized as a decimal string so values wider than 64 bits survive JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(BigUint);

impl Amount {
    /// Wrap a big unsigned integer.
    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    /// The zero amount.
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Get the underlying integer.
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Unwrap into the underlying integer.
    pub fn into_biguint(self) -> BigUint {
        self.0
    }

    /// Subtract, returning `None` if `other` exceeds `self`.
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(&self.0 - &other.0))
        }
    }

    /// Subtract, flooring at zero.
    pub fn saturating_sub(&self, other: &Amount) -> Amount {
        self.checked_sub(other).unwrap_or_default()
    }

    /// Scale by `ratio`, rounding the fractional part in the given direction.
    pub fn apply_ratio(&self, ratio: &Ratio, rounding: Rounding) -> Amount {
        if self.is_zero() || ratio.is_zero() {
            return Amount::zero();
        }

        let base = BigUint::from(RATIO_BASE);
        let product = &self.0 * BigUint::from(ratio.ppm());
        let quotient = &product / &base;

        match rounding {
            Rounding::Down => Self(quotient),
            Rounding::Up if (&product % &base).is_zero() => Self(quotient),
            Rounding::Up => Self(quotient + 1u32),
        }
    }

    /// Convert to `u128` if it fits.
    pub fn to_u128(&self) -> Option<u128> {
        self.0.to_u128()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // BigUint's parser tolerates a leading '+' and '_' separators; amounts don't.
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CommonError::InvalidAmount(s.to_string()));
        }

        BigUint::from_str(s)
            .map(Self)
            .map_err(|_| CommonError::InvalidAmount(s.to_string()))
    }
}

impl TryFrom<String> for Amount {
    type Error = CommonError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.0.to_string()
    }
}

impl From<BigUint> for Amount {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl From<u32> for Amount {
    fn from(value: u32) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(BigUint::from(value))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Self::Output {
        Self(self.0 + other.0)
    }
}

impl<'a> Add<&'a Amount> for &'a Amount {
    type Output = Amount;

    fn add(self, other: &'a Amount) -> Self::Output {
        Amount(&self.0 + &other.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, other: Amount) {
        self.0 += other.0;
    }
}

impl<'a> AddAssign<&'a Amount> for Amount {
    fn add_assign(&mut self, other: &'a Amount) {
        self.0 += &other.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |mut acc, x| {
            acc += x;
            acc
        })
    }
}

/// Rounding direction for proportional amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Truncate toward zero; dust stays behind.
    #[default]
    Down,
    /// Round any remainder up to the next unit.
    Up,
}

/// Fixed-point fraction in parts-per-million.
///
/// `Ratio::from_ppm(200_000)` is 20%. Values above [`RATIO_BASE`] are allowed
/// and describe more than the whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ratio(u32);

impl Ratio {
    /// 0%.
    pub const ZERO: Ratio = Ratio(0);
    /// 100%.
    pub const ONE: Ratio = Ratio(RATIO_BASE);

    /// Create from parts-per-million.
    pub const fn from_ppm(ppm: u32) -> Self {
        Self(ppm)
    }

    /// Create from basis points (1 bps = 0.01%).
    pub fn from_bps(bps: u32) -> Self {
        Self(bps.saturating_mul(PPM_PER_BPS))
    }

    /// Create from whole percent.
    pub fn percent(percent: u32) -> Self {
        Self(percent.saturating_mul(PPM_PER_PERCENT))
    }

    /// Create from a decimal fraction, e.g. `0.2` for 20%.
    pub fn from_decimal(fraction: Decimal) -> Result<Self, CommonError> {
        if fraction.is_sign_negative() && !fraction.is_zero() {
            return Err(CommonError::InvalidRatio(fraction.to_string()));
        }

        let scaled = fraction
            .checked_mul(Decimal::from(RATIO_BASE))
            .ok_or_else(|| CommonError::InvalidRatio(fraction.to_string()))?;

        if !scaled.fract().is_zero() {
            return Err(CommonError::InvalidRatio(format!(
                "{fraction} is finer than one part per million"
            )));
        }

        scaled
            .to_u32()
            .map(Self)
            .ok_or_else(|| CommonError::InvalidRatio(fraction.to_string()))
    }

    /// Get parts-per-million.
    pub fn ppm(&self) -> u32 {
        self.0
    }

    /// Check if the ratio is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / PPM_PER_PERCENT;
        let frac = self.0 % PPM_PER_PERCENT;
        if frac == 0 {
            write!(f, "{whole}%")
        } else {
            let digits = format!("{frac:04}");
            write!(f, "{whole}.{}%", digits.trim_end_matches('0'))
        }
    }
}
