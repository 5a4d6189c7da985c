//! Monetary amounts and rates.
//!
//! All amounts are integers in minor currency units (cents). Rates
//! (discounts, tax) are basis points, so arithmetic stays exact.

use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Amount in minor currency units (e.g. cents). Signed so discount lines and
/// balance arithmetic can go below zero before clamping.
///
/// The operators saturate at the `i64` bounds. Arithmetic on user-supplied
/// amounts goes through the `checked_*` methods, which report overflow as
/// `DomainError::Validation`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    /// Largest accepted input amount: 10,000,000,000.00.
    pub const MAX: Money = Money(1_000_000_000_000);

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Whole currency units (e.g. `Money::from_major(50)` == 50.00).
    pub const fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Clamp at zero (balances, refunds and releases never go negative).
    pub fn non_negative(self) -> Self {
        Self(self.0.max(0))
    }

    pub fn times(self, quantity: i64) -> Self {
        Self(self.0.saturating_mul(quantity))
    }

    pub fn checked_add(self, rhs: Self) -> DomainResult<Self> {
        self.0.checked_add(rhs.0).map(Self).ok_or_else(|| out_of_range(self, "+", rhs.0))
    }

    pub fn checked_sub(self, rhs: Self) -> DomainResult<Self> {
        self.0.checked_sub(rhs.0).map(Self).ok_or_else(|| out_of_range(self, "-", rhs.0))
    }

    pub fn checked_times(self, quantity: i64) -> DomainResult<Self> {
        self.0
            .checked_mul(quantity)
            .map(Self)
            .ok_or_else(|| out_of_range(self, "x", quantity))
    }

    /// Sum that fails instead of saturating.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> DomainResult<Self> {
        amounts.into_iter().try_fold(Money::zero(), Money::checked_add)
    }

    /// Multiply by a rate expressed in basis points, rounding half away from zero.
    pub fn apply_rate(self, rate: BasisPoints) -> Self {
        let product = self.0 as i128 * rate.0 as i128;
        let half = BasisPoints::SCALE as i128 / 2;
        let rounded = if product >= 0 {
            (product + half) / BasisPoints::SCALE as i128
        } else {
            (product - half) / BasisPoints::SCALE as i128
        };
        Self(clamp_i128(rounded))
    }

    /// Scale by `numerator / denominator`, truncating toward zero.
    ///
    /// A zero denominator yields zero.
    pub fn prorate(self, numerator: i64, denominator: i64) -> Self {
        if denominator == 0 {
            return Self::zero();
        }
        Self(clamp_i128((self.0 as i128 * numerator as i128) / denominator as i128))
    }
}

fn clamp_i128(value: i128) -> i64 {
    value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

fn out_of_range(lhs: Money, op: &str, rhs: i64) -> DomainError {
    DomainError::validation(format!("amount out of range: {} {op} {rhs}", lhs.0))
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(self.0.saturating_neg())
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// Rate in basis points: 10_000 bps = 100%.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisPoints(u32);

impl ValueObject for BasisPoints {}

impl BasisPoints {
    pub const SCALE: u32 = 10_000;

    pub const fn new(bps: u32) -> Self {
        Self(bps)
    }

    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Whether this is a valid percentage (0% ..= 100%).
    pub fn is_percentage(self) -> bool {
        self.0 <= Self::SCALE
    }
}

impl core::fmt::Display for BasisPoints {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
