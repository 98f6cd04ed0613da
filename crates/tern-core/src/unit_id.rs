//! Time-derived migration identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Format used when minting identifiers from a timestamp (14 digits).
pub const UNIT_ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// Identifier of a migration unit.
///
/// Identifiers are the numeric prefix of a migration file name, conventionally
/// `YYYYMMDDHHMMSS`. They order migrations globally regardless of scope or
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(u64);

impl UnitId {
    /// Largest identifier the migration store can hold (a signed 64-bit column).
    pub const MAX: UnitId = UnitId(i64::MAX as u64);

    /// Wrap a raw identifier value.
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Mint an identifier from a UTC timestamp.
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        // The formatted string is always 14 ASCII digits.
        let digits = at.format(UNIT_ID_FORMAT).to_string();
        Self(digits.parse().unwrap_or_default())
    }

    /// Mint an identifier for "now" that is strictly greater than `floor`.
    ///
    /// Two migrations generated within the same second would otherwise share
    /// an identifier. Returns `None` when `floor` is already [`UnitId::MAX`].
    pub fn next_after(floor: Option<UnitId>) -> Option<Self> {
        let candidate = Self::from_timestamp(Utc::now());
        match floor {
            Some(floor) if candidate <= floor => floor
                .0
                .checked_add(1)
                .map(Self)
                .filter(|next| *next <= Self::MAX),
            _ => Some(candidate),
        }
    }

    /// Return the raw numeric value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UnitId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("identifier is empty".to_string());
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("'{s}' is not all digits"));
        }
        s.parse::<u64>()
            .ok()
            .map(Self)
            .filter(|id| *id <= Self::MAX)
            .ok_or_else(|| format!("'{s}' is larger than the maximum identifier {}", Self::MAX))
    }
}

impl From<u64> for UnitId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
