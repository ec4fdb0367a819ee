use crate::{
    error::{GovernanceError, Result},
    math::Ppm,
    proposal_id::ProposalId,
    serde_ext::big_int,
};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Ballot option. Numeric values match the voting plugins' `VoteOption`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Abstain = 1,
    Yes = 2,
    No = 3,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::Yes, Choice::No, Choice::Abstain];

    pub fn from_vote_value(value: u64) -> Option<Self> {
        match value {
            1 => Some(Choice::Abstain),
            2 => Some(Choice::Yes),
            3 => Some(Choice::No),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::Abstain => "abstain",
            Choice::Yes => "yes",
            Choice::No => "no",
        }
    }
}

impl<'de> Deserialize<'de> for Choice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Name(String),
            Value(u64),
        }

        let parsed = match Repr::deserialize(deserializer)? {
            Repr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "abstain" => Some(Choice::Abstain),
                "yes" => Some(Choice::Yes),
                "no" => Some(Choice::No),
                _ => None,
            },
            Repr::Value(value) => Choice::from_vote_value(value),
        };
        parsed.ok_or_else(|| serde::de::Error::custom("unknown vote option"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResult {
    #[serde(with = "big_int")]
    pub yes: U256,
    #[serde(with = "big_int")]
    pub no: U256,
    #[serde(with = "big_int")]
    pub abstain: U256,
}

impl VoteResult {
    pub fn get(&self, choice: Choice) -> U256 {
        match choice {
            Choice::Yes => self.yes,
            Choice::No => self.no,
            Choice::Abstain => self.abstain,
        }
    }

    pub fn get_mut(&mut self, choice: Choice) -> &mut U256 {
        match choice {
            Choice::Yes => &mut self.yes,
            Choice::No => &mut self.no,
            Choice::Abstain => &mut self.abstain,
        }
    }

    pub fn total(&self) -> U256 {
        self.yes + self.no + self.abstain
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenVote {
    pub voter: Address,
    pub choice: Choice,
    #[serde(with = "big_int")]
    pub weight: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberVote {
    pub voter: Address,
    pub choice: Choice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenVotingTally {
    pub token: TokenInfo,
    /// Snapshot taken at proposal creation.
    #[serde(with = "big_int")]
    pub total_voting_weight: U256,
    #[serde(with = "big_int")]
    pub used_voting_weight: U256,
    pub result: VoteResult,
    #[serde(default)]
    pub votes: Vec<TokenVote>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressListTally {
    /// Member count at proposal creation.
    #[serde(with = "big_int")]
    pub total_voting_weight: U256,
    pub result: VoteResult,
    #[serde(default)]
    pub votes: Vec<MemberVote>,
}

impl AddressListTally {
    pub fn used_voting_weight(&self) -> U256 {
        U256::from(self.votes.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisigTally {
    /// In approval order.
    pub approvals: Vec<Address>,
}

/// The voting mechanism a proposal was created under.
///
/// Stored records carry no tag; the shape decides, in this order:
/// a `token` field, an `approvals` field, then a plain `result`.
/// Once a field picks the variant, the record must decode as that variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProposalVariant {
    TokenWeighted(TokenVotingTally),
    Multisig(MultisigTally),
    AddressList(AddressListTally),
}

impl ProposalVariant {
    /// Classifies a raw record by the fields it carries.
    pub fn from_raw(raw: &Value) -> Result<Self> {
        let object = raw.as_object().ok_or(GovernanceError::UnknownVariant)?;
        let parsed = if object.contains_key("token") {
            serde_json::from_value(raw.clone()).map(ProposalVariant::TokenWeighted)
        } else if object.contains_key("approvals") {
            serde_json::from_value(raw.clone()).map(ProposalVariant::Multisig)
        } else if object.contains_key("result") {
            serde_json::from_value(raw.clone()).map(ProposalVariant::AddressList)
        } else {
            return Err(GovernanceError::UnknownVariant);
        };
        parsed.map_err(|_| GovernanceError::UnknownVariant)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ProposalVariant::TokenWeighted(_) => "token voting",
            ProposalVariant::AddressList(_) => "address list",
            ProposalVariant::Multisig(_) => "multisig",
        }
    }

    pub fn has_voted(&self, voter: Address) -> bool {
        match self {
            ProposalVariant::TokenWeighted(tally) => tally.votes.iter().any(|v| v.voter == voter),
            ProposalVariant::AddressList(tally) => tally.votes.iter().any(|v| v.voter == voter),
            ProposalVariant::Multisig(tally) => tally.approvals.contains(&voter),
        }
    }
}

impl<'de> Deserialize<'de> for ProposalVariant {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        ProposalVariant::from_raw(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Pending,
    Active,
    Succeeded,
    Defeated,
    Executed,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Defeated | ProposalStatus::Executed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ExecutionOutcome {
    #[serde(rename_all = "camelCase")]
    Executed {
        date: DateTime<Utc>,
        #[serde(default)]
        block_number: Option<u64>,
    },
    /// The execution transaction reverted; the proposal stays executable.
    #[serde(rename_all = "camelCase")]
    Failed { observed_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: ProposalId,
    pub dao_address: Address,
    pub creator_address: Address,
    #[serde(default)]
    pub title: String,
    pub creation_date: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub creation_block_number: Option<u64>,
    /// As reported by the source; see `lifecycle::derive_status` for the derived one.
    pub status: ProposalStatus,
    #[serde(default)]
    pub execution: Option<ExecutionOutcome>,
    #[serde(flatten)]
    pub variant: ProposalVariant,
}

impl Proposal {
    pub fn executed_at(&self) -> Option<(DateTime<Utc>, Option<u64>)> {
        match &self.execution {
            Some(ExecutionOutcome::Executed { date, block_number }) => Some((*date, *block_number)),
            _ => None,
        }
    }

    pub fn execution_failed(&self) -> bool {
        matches!(self.execution, Some(ExecutionOutcome::Failed { .. }))
    }
}

/// A not-yet-confirmed ballot or approval submitted from this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CastVote {
    Ballot {
        voter: Address,
        choice: Choice,
        /// Ignored for address-list proposals, where every member counts once.
        #[serde(with = "big_int")]
        weight: U256,
    },
    Approval {
        approver: Address,
    },
}

impl CastVote {
    pub fn voter(&self) -> Address {
        match self {
            CastVote::Ballot { voter, .. } => *voter,
            CastVote::Approval { approver } => *approver,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VotingMode {
    #[default]
    Standard,
    EarlyExecution,
    VoteReplacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MajorityVotingSettings {
    pub support_threshold: Ppm,
    pub min_participation: Ppm,
    /// Seconds.
    pub min_duration: u64,
    pub voting_mode: VotingMode,
}

impl MajorityVotingSettings {
    pub fn from_fractions(support_threshold: f64, min_participation: f64, min_duration: u64, voting_mode: VotingMode) -> Self {
        Self {
            support_threshold: Ppm::from_fraction(support_threshold),
            min_participation: Ppm::from_fraction(min_participation),
            min_duration,
            voting_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigSettings {
    pub min_approvals: u32,
    #[serde(default)]
    pub only_listed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VotingSettings {
    TokenWeighted(MajorityVotingSettings),
    AddressList(MajorityVotingSettings),
    Multisig(MultisigSettings),
}

impl VotingSettings {
    pub fn majority(&self) -> Option<&MajorityVotingSettings> {
        match self {
            VotingSettings::TokenWeighted(settings) | VotingSettings::AddressList(settings) => Some(settings),
            VotingSettings::Multisig(_) => None,
        }
    }

    pub fn voting_mode(&self) -> VotingMode {
        self.majority().map(|s| s.voting_mode).unwrap_or_default()
    }

    pub fn matches(&self, variant: &ProposalVariant) -> bool {
        matches!(
            (self, variant),
            (VotingSettings::TokenWeighted(_), ProposalVariant::TokenWeighted(_))
                | (VotingSettings::AddressList(_), ProposalVariant::AddressList(_))
                | (VotingSettings::Multisig(_), ProposalVariant::Multisig(_))
        )
    }
}
