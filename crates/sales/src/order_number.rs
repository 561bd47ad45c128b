use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, ValueObject};

/// Human-readable order number: `ORD-<yyyymmddHHMMSS>-<8 upper-case hex>`.
///
/// The timestamp is UTC. Uniqueness is enforced by storage; callers generate a
/// fresh random suffix and retry on collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderNumber(String);

impl ValueObject for OrderNumber {}

const PREFIX: &str = "ORD-";
const STAMP_LEN: usize = 14;
const SUFFIX_LEN: usize = 8;

impl OrderNumber {
    pub fn compose(at: DateTime<Utc>, suffix: u32) -> Self {
        Self(format!("{PREFIX}{}-{suffix:08X}", at.format("%Y%m%d%H%M%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation(format!("malformed order number '{s}'"));

        let rest = s.strip_prefix(PREFIX).ok_or_else(invalid)?;
        let (stamp, suffix) = rest.split_once('-').ok_or_else(invalid)?;

        if stamp.len() != STAMP_LEN || !stamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hex_upper = |b: u8| b.is_ascii_digit() || (b'A'..=b'F').contains(&b);
        if suffix.len() != SUFFIX_LEN || !suffix.bytes().all(hex_upper) {
            return Err(invalid());
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for OrderNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OrderNumber> for String {
    fn from(value: OrderNumber) -> Self {
        value.0
    }
}

impl core::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
