use alloy::primitives::{Address, U256};
use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use proposalsapp_governance::{
    ExecutionOutcome, MajorityVotingSettings, MultisigSettings, Proposal, ProposalStatus, ProposalVariant, VotingMode,
    VotingSettings, decode_proposal_id_with_fallback,
    math::Ppm,
    serde_ext::parse_big_int,
    types::{AddressListTally, Choice, MemberVote, MultisigTally, TokenInfo, TokenVote, TokenVotingTally, VoteResult},
};
use serde::Deserialize;
use std::str::FromStr;

#[derive(Deserialize, Debug)]
pub struct GraphqlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Deserialize, Debug)]
pub struct GraphqlError {
    pub message: String,
}

#[derive(Deserialize, Debug)]
pub struct ProposalsData {
    pub proposals: Vec<SubgraphProposal>,
}

#[derive(Deserialize, Debug)]
pub struct PluginData {
    pub plugin: Option<SubgraphPlugin>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PluginKind {
    TokenVoting,
    AddressList,
    Multisig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SubgraphToken {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphVoter {
    pub address: String,
    pub vote_option: String,
    pub voting_power: Option<String>,
}

/// One proposal as indexed by the governance subgraph. Numeric fields are
/// subgraph `BigInt`s, i.e. decimal strings; dates are unix seconds.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphProposal {
    pub id: String,
    pub plugin: String,
    pub dao: String,
    pub creator: String,
    pub kind: PluginKind,
    #[serde(default)]
    pub title: Option<String>,
    pub created_at: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub creation_block_number: Option<String>,
    pub status: String,
    #[serde(default)]
    pub executed: bool,
    #[serde(default)]
    pub execution_date: Option<String>,
    #[serde(default)]
    pub execution_block_number: Option<String>,
    #[serde(default)]
    pub token: Option<SubgraphToken>,
    #[serde(default)]
    pub total_voting_power: Option<String>,
    #[serde(default)]
    pub used_voting_power: Option<String>,
    #[serde(default)]
    pub yes: Option<String>,
    #[serde(default)]
    pub no: Option<String>,
    #[serde(default)]
    pub abstain: Option<String>,
    #[serde(default)]
    pub voters: Vec<SubgraphVoter>,
    #[serde(default)]
    pub approvers: Vec<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubgraphPlugin {
    pub id: String,
    pub kind: PluginKind,
    /// Parts per million.
    #[serde(default)]
    pub support_threshold: Option<String>,
    /// Parts per million.
    #[serde(default)]
    pub min_participation: Option<String>,
    #[serde(default)]
    pub min_duration: Option<String>,
    #[serde(default)]
    pub voting_mode: Option<String>,
    #[serde(default)]
    pub min_approvals: Option<u32>,
    #[serde(default)]
    pub only_listed: Option<bool>,
    #[serde(default)]
    pub members: Vec<String>,
}

fn address(raw: &str) -> Result<Address> {
    Address::from_str(raw).with_context(|| format!("invalid address `{raw}`"))
}

fn big_int(raw: &str) -> Result<U256> {
    parse_big_int(raw).ok_or_else(|| anyhow!("invalid BigInt `{raw}`"))
}

fn optional_big_int(raw: Option<&str>) -> Result<U256> {
    raw.map(big_int).transpose().map(Option::unwrap_or_default)
}

fn timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let seconds: i64 = raw.parse().with_context(|| format!("invalid timestamp `{raw}`"))?;
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| anyhow!("timestamp out of range `{raw}`"))
}

fn block_number(raw: Option<&str>) -> Result<Option<u64>> {
    raw.map(|raw| raw.parse::<u64>().with_context(|| format!("invalid block number `{raw}`")))
        .transpose()
}

fn choice(raw: &str) -> Result<Choice> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" => Ok(Choice::Yes),
        "no" => Ok(Choice::No),
        "abstain" => Ok(Choice::Abstain),
        other => bail!("unknown vote option `{other}`"),
    }
}

fn status(raw: &str) -> Result<ProposalStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "pending" => Ok(ProposalStatus::Pending),
        "active" => Ok(ProposalStatus::Active),
        "succeeded" => Ok(ProposalStatus::Succeeded),
        "defeated" => Ok(ProposalStatus::Defeated),
        "executed" => Ok(ProposalStatus::Executed),
        other => bail!("unknown proposal status `{other}`"),
    }
}

pub fn status_filter(status: ProposalStatus) -> &'static str {
    match status {
        ProposalStatus::Pending => "Pending",
        ProposalStatus::Active => "Active",
        ProposalStatus::Succeeded => "Succeeded",
        ProposalStatus::Defeated => "Defeated",
        ProposalStatus::Executed => "Executed",
    }
}

impl SubgraphProposal {
    fn result(&self) -> Result<VoteResult> {
        Ok(VoteResult {
            yes: optional_big_int(self.yes.as_deref())?,
            no: optional_big_int(self.no.as_deref())?,
            abstain: optional_big_int(self.abstain.as_deref())?,
        })
    }

    fn variant(&self) -> Result<ProposalVariant> {
        let variant = match self.kind {
            PluginKind::TokenVoting => {
                let token = self.token.as_ref().context("token voting proposal without token")?;
                let votes = self
                    .voters
                    .iter()
                    .map(|voter| {
                        Ok(TokenVote {
                            voter: address(&voter.address)?,
                            choice: choice(&voter.vote_option)?,
                            weight: optional_big_int(voter.voting_power.as_deref())?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                ProposalVariant::TokenWeighted(TokenVotingTally {
                    token: TokenInfo {
                        address: address(&token.id)?,
                        symbol: token.symbol.clone(),
                        name: token.name.clone(),
                        decimals: token.decimals,
                    },
                    total_voting_weight: optional_big_int(self.total_voting_power.as_deref())?,
                    used_voting_weight: optional_big_int(self.used_voting_power.as_deref())?,
                    result: self.result()?,
                    votes,
                })
            }
            PluginKind::AddressList => {
                let votes = self
                    .voters
                    .iter()
                    .map(|voter| {
                        Ok(MemberVote {
                            voter: address(&voter.address)?,
                            choice: choice(&voter.vote_option)?,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;

                ProposalVariant::AddressList(AddressListTally {
                    total_voting_weight: optional_big_int(self.total_voting_power.as_deref())?,
                    result: self.result()?,
                    votes,
                })
            }
            PluginKind::Multisig => ProposalVariant::Multisig(MultisigTally {
                approvals: self.approvers.iter().map(|a| address(a)).collect::<Result<Vec<_>>>()?,
            }),
        };
        Ok(variant)
    }

    fn execution(&self) -> Result<Option<ExecutionOutcome>> {
        if !self.executed {
            return Ok(None);
        }
        let Some(date) = self.execution_date.as_deref() else {
            return Ok(None);
        };
        Ok(Some(ExecutionOutcome::Executed {
            date: timestamp(date)?,
            block_number: block_number(self.execution_block_number.as_deref())?,
        }))
    }
}

impl TryFrom<SubgraphProposal> for Proposal {
    type Error = anyhow::Error;

    fn try_from(raw: SubgraphProposal) -> Result<Self> {
        let plugin = address(&raw.plugin)?;
        // older deployments index bare local ids
        let id = decode_proposal_id_with_fallback(&raw.id, Some(plugin))?;

        Ok(Proposal {
            id,
            dao_address: address(&raw.dao)?,
            creator_address: address(&raw.creator)?,
            title: raw.title.clone().unwrap_or_default(),
            creation_date: timestamp(&raw.created_at)?,
            start_date: timestamp(&raw.start_date)?,
            end_date: timestamp(&raw.end_date)?,
            creation_block_number: block_number(raw.creation_block_number.as_deref())?,
            status: status(&raw.status)?,
            execution: raw.execution()?,
            variant: raw.variant()?,
        })
    }
}

fn voting_mode(raw: Option<&str>) -> Result<VotingMode> {
    match raw {
        None | Some("Standard") => Ok(VotingMode::Standard),
        Some("EarlyExecution") => Ok(VotingMode::EarlyExecution),
        Some("VoteReplacement") => Ok(VotingMode::VoteReplacement),
        Some(other) => bail!("unknown voting mode `{other}`"),
    }
}

fn ppm(raw: Option<&str>) -> Result<Ppm> {
    let value = optional_big_int(raw)?;
    let value: u32 = value.try_into().map_err(|_| anyhow!("ratio out of range `{value}`"))?;
    Ppm::new(value).ok_or_else(|| anyhow!("ratio above one `{value}`"))
}

impl TryFrom<&SubgraphPlugin> for VotingSettings {
    type Error = anyhow::Error;

    fn try_from(raw: &SubgraphPlugin) -> Result<Self> {
        let majority = || -> Result<MajorityVotingSettings> {
            Ok(MajorityVotingSettings {
                support_threshold: ppm(raw.support_threshold.as_deref())?,
                min_participation: ppm(raw.min_participation.as_deref())?,
                min_duration: optional_big_int(raw.min_duration.as_deref())?.saturating_to(),
                voting_mode: voting_mode(raw.voting_mode.as_deref())?,
            })
        };

        Ok(match raw.kind {
            PluginKind::TokenVoting => VotingSettings::TokenWeighted(majority()?),
            PluginKind::AddressList => VotingSettings::AddressList(majority()?),
            PluginKind::Multisig => VotingSettings::Multisig(MultisigSettings {
                min_approvals: raw.min_approvals.context("multisig plugin without minApprovals")?,
                only_listed: raw.only_listed.unwrap_or(true),
            }),
        })
    }
}

impl SubgraphPlugin {
    pub fn member_addresses(&self) -> Result<Vec<Address>> {
        self.members.iter().map(|m| address(m)).collect()
    }
}
