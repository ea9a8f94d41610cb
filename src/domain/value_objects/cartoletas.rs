//! Cartoletas - the in-game currency
//!
//! Amounts are held as integer cents so that sums over a lineup never drift.
//! Conversions from decimal text or backend JSON numbers are rounded half-even
//! to two fraction digits through `bigdecimal`.

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Monetary amount in cartoletas, exact to the cent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cartoletas(i64);

impl Cartoletas {
    pub const ZERO: Cartoletas = Cartoletas(0);

    pub const fn from_cents(cents: i64) -> Self {
        Cartoletas(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Round a decimal amount to the nearest cent
    pub fn from_decimal(value: &BigDecimal) -> Result<Self, String> {
        let cents = (value.round(2) * BigDecimal::from(100))
            .to_i64()
            .ok_or_else(|| format!("Amount out of range: {}", value))?;
        Ok(Cartoletas(cents))
    }

    /// Convert a floating point amount as returned by JSON backends
    pub fn from_f64(value: f64) -> Result<Self, String> {
        if !value.is_finite() {
            return Err("Amount must be finite".to_string());
        }
        let decimal =
            BigDecimal::from_f64(value).ok_or_else(|| format!("Invalid amount: {}", value))?;
        Self::from_decimal(&decimal)
    }

    pub fn to_decimal(&self) -> BigDecimal {
        BigDecimal::new(self.0.into(), 2)
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl Add for Cartoletas {
    type Output = Cartoletas;

    fn add(self, rhs: Cartoletas) -> Cartoletas {
        Cartoletas(self.0 + rhs.0)
    }
}

impl Sub for Cartoletas {
    type Output = Cartoletas;

    fn sub(self, rhs: Cartoletas) -> Cartoletas {
        Cartoletas(self.0 - rhs.0)
    }
}

impl Sum for Cartoletas {
    fn sum<I: Iterator<Item = Cartoletas>>(iter: I) -> Cartoletas {
        iter.fold(Cartoletas::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Cartoletas> for Cartoletas {
    fn sum<I: Iterator<Item = &'a Cartoletas>>(iter: I) -> Cartoletas {
        iter.copied().sum()
    }
}

/// Formats as `C$ 12.50`
impl fmt::Display for Cartoletas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "C$ {}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

/// Accepts plain decimals (`12.5`) and the display form (`C$ 12.50`)
impl FromStr for Cartoletas {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let raw = trimmed.strip_prefix("C$").unwrap_or(trimmed).trim();
        let decimal = BigDecimal::from_str(raw)
            .map_err(|e| format!("Invalid amount '{}': {}", s, e))?;
        Self::from_decimal(&decimal)
    }
}

impl Serialize for Cartoletas {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Cartoletas {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Cartoletas::from_f64(value).map_err(serde::de::Error::custom)
    }
}
