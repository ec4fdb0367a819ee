//! Proposal identifiers combine the plugin instance address with the
//! plugin-local proposal counter, e.g.
//! `0x4206cdbc0ad2f4c4e2b1a5c2c3e7c9a675cae35a_0x3`.

use crate::error::{GovernanceError, Result};
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

const SEPARATOR: char = '_';

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProposalId {
    pub plugin: Address,
    pub local_id: U256,
}

impl ProposalId {
    pub fn new(plugin: Address, local_id: U256) -> Self {
        Self { plugin, local_id }
    }

    /// The plugin-less `0x…` part of the id.
    pub fn local_hex(&self) -> String {
        format!("0x{:x}", self.local_id)
    }
}

pub fn encode_proposal_id(plugin: Address, local_id: U256) -> String {
    format!("{plugin:#x}{SEPARATOR}0x{local_id:x}")
}

/// Strict decode: `{address}_0x{hex}` only.
pub fn decode_proposal_id(raw: &str) -> Result<ProposalId> {
    decode_proposal_id_with_fallback(raw, None)
}

/// Decodes a proposal id, accepting legacy plugin-less ids (`0x00`, `2`)
/// when the plugin address is known from context.
pub fn decode_proposal_id_with_fallback(raw: &str, fallback_plugin: Option<Address>) -> Result<ProposalId> {
    let malformed = || GovernanceError::MalformedId(raw.to_string());
    let raw = raw.trim();

    match raw.split(SEPARATOR).collect::<Vec<_>>().as_slice() {
        [address, local] => {
            let plugin = Address::from_str(address).map_err(|_| malformed())?;
            let digits = strip_hex_prefix(local).ok_or_else(malformed)?;
            let local_id = parse_hex(digits).ok_or_else(malformed)?;
            Ok(ProposalId::new(plugin, local_id))
        }
        [legacy] => {
            let local_id = match strip_hex_prefix(legacy) {
                Some(digits) => parse_hex(digits),
                None => parse_decimal(legacy),
            }
            .ok_or_else(malformed)?;

            let plugin = fallback_plugin.ok_or_else(|| GovernanceError::MissingPluginAddress(raw.to_string()))?;
            Ok(ProposalId::new(plugin, local_id))
        }
        _ => Err(malformed()),
    }
}

/// The normalized spelling of `raw`, i.e. `encode(decode(raw))`.
pub fn canonical_proposal_id(raw: &str, fallback_plugin: Option<Address>) -> Result<String> {
    decode_proposal_id_with_fallback(raw, fallback_plugin).map(|id| id.to_string())
}

fn strip_hex_prefix(value: &str) -> Option<&str> {
    value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"))
}

fn parse_hex(digits: &str) -> Option<U256> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    // leading zeros would otherwise count against the 64 digit limit
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(significant, 16).ok()
}

fn parse_decimal(digits: &str) -> Option<U256> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(digits, 10).ok()
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_proposal_id(self.plugin, self.local_id))
    }
}

impl FromStr for ProposalId {
    type Err = GovernanceError;

    fn from_str(s: &str) -> Result<Self> {
        decode_proposal_id(s)
    }
}

impl Serialize for ProposalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProposalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        decode_proposal_id(&raw).map_err(serde::de::Error::custom)
    }
}
