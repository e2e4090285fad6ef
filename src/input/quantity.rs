//! Memory quantities such as `512Mi` or `1Gi`.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

static QUANTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+)([A-Za-z]+)$").expect("quantity regex is valid"));

/// Binary memory unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum MemoryUnit {
    /// Kibibytes.
    Ki,
    /// Mebibytes.
    Mi,
    /// Gibibytes.
    Gi,
}

impl MemoryUnit {
    /// Bytes in one unit.
    pub fn bytes(&self) -> u64 {
        match self {
            MemoryUnit::Ki => 1 << 10,
            MemoryUnit::Mi => 1 << 20,
            MemoryUnit::Gi => 1 << 30,
        }
    }
}

/// A memory limit as `<amount><unit>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryQuantity {
    /// Amount in `unit`.
    pub amount: u64,
    /// Unit suffix.
    pub unit: MemoryUnit,
}

/// Reason a quantity string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityParseError {
    /// Not `<digits><unit>`, or unknown unit.
    Malformed,
    /// Amount is too large to represent.
    Overflow,
}

impl MemoryQuantity {
    /// Default memory limit for a service.
    pub const DEFAULT: MemoryQuantity = MemoryQuantity {
        amount: 1,
        unit: MemoryUnit::Gi,
    };

    /// Total size in bytes, `None` on overflow.
    pub fn bytes(&self) -> Option<u64> {
        self.amount.checked_mul(self.unit.bytes())
    }
}

impl FromStr for MemoryQuantity {
    type Err = QuantityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = QUANTITY_RE
            .captures(s.trim())
            .ok_or(QuantityParseError::Malformed)?;
        let unit =
            MemoryUnit::from_str(&caps[2]).map_err(|_| QuantityParseError::Malformed)?;
        let amount = caps[1]
            .parse::<u64>()
            .map_err(|_| QuantityParseError::Overflow)?;
        Ok(Self { amount, unit })
    }
}

impl fmt::Display for MemoryQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit)
    }
}
