//! Persisted-state encodings shared with stored pending caches.
//!
//! Big integers are written as decimal strings with an `n` suffix
//! (`"1000n"`). Readers also accept bare decimal strings and JSON numbers,
//! which older caches and address-list counts use. Dates go through
//! chrono's RFC 3339 representation.

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serializer, de};

const BIG_INT_SUFFIX: char = 'n';

/// Parses `"123n"` or `"123"` into a `U256`.
pub fn parse_big_int(raw: &str) -> Option<U256> {
    let digits = raw.strip_suffix(BIG_INT_SUFFIX).unwrap_or(raw);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(digits, 10).ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BigIntRepr {
    Text(String),
    Number(u64),
}

impl BigIntRepr {
    fn into_u256<E: de::Error>(self) -> Result<U256, E> {
        match self {
            BigIntRepr::Text(raw) => parse_big_int(&raw).ok_or_else(|| E::custom(format!("invalid big integer `{raw}`"))),
            BigIntRepr::Number(value) => Ok(U256::from(value)),
        }
    }
}

pub mod big_int {
    use super::*;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{value}{BIG_INT_SUFFIX}"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        BigIntRepr::deserialize(deserializer)?.into_u256()
    }
}
