use crate::{
    error::{GovernanceError, Result},
    math::{Percentage, format_amount},
    types::{
        AddressListTally, CastVote, Choice, MemberVote, MultisigTally, ProposalVariant, TokenVote, TokenVotingTally,
        VoteResult, VotingMode,
    },
};
use alloy::primitives::{Address, U256};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceTally {
    pub raw: U256,
    /// Token units for token voting, a member count otherwise.
    pub value: String,
    /// Share of the total voting weight.
    pub percentage: Percentage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallyResults {
    pub yes: ChoiceTally,
    pub no: ChoiceTally,
    pub abstain: ChoiceTally,
}

impl TallyResults {
    pub fn get(&self, choice: Choice) -> &ChoiceTally {
        match choice {
            Choice::Yes => &self.yes,
            Choice::No => &self.no,
            Choice::Abstain => &self.abstain,
        }
    }

    pub fn raw(&self) -> VoteResult {
        VoteResult {
            yes: self.yes.raw,
            no: self.no.raw,
            abstain: self.abstain.raw,
        }
    }
}

pub fn tally(variant: &ProposalVariant) -> Result<TallyResults> {
    let (result, total, decimals) = match variant {
        ProposalVariant::TokenWeighted(tally) => (&tally.result, tally.total_voting_weight, Some(tally.token.decimals)),
        ProposalVariant::AddressList(tally) => (&tally.result, tally.total_voting_weight, None),
        ProposalVariant::Multisig(_) => {
            return Err(GovernanceError::IncompatibleVote {
                vote: "a yes/no/abstain tally",
                variant: variant.kind_name(),
            });
        }
    };

    let column = |choice: Choice| {
        let raw = result.get(choice);
        ChoiceTally {
            raw,
            value: match decimals {
                Some(decimals) => format_amount(raw, decimals),
                None => raw.to_string(),
            },
            percentage: Percentage::of(raw, total),
        }
    };

    Ok(TallyResults {
        yes: column(Choice::Yes),
        no: column(Choice::No),
        abstain: column(Choice::Abstain),
    })
}

/// Sums the recorded votes. For well-formed records this equals `result`.
pub fn recount(variant: &ProposalVariant) -> Option<VoteResult> {
    let mut result = VoteResult::default();
    match variant {
        ProposalVariant::TokenWeighted(tally) => {
            for vote in &tally.votes {
                let slot = result.get_mut(vote.choice);
                *slot = slot.saturating_add(vote.weight);
            }
        }
        ProposalVariant::AddressList(tally) => {
            for vote in &tally.votes {
                let slot = result.get_mut(vote.choice);
                *slot = slot.saturating_add(U256::from(1));
            }
        }
        ProposalVariant::Multisig(_) => return None,
    }
    Some(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterOption {
    Yes,
    No,
    Abstain,
    Approved,
    None,
}

impl From<Choice> for VoterOption {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::Yes => VoterOption::Yes,
            Choice::No => VoterOption::No,
            Choice::Abstain => VoterOption::Abstain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voter {
    pub wallet: Address,
    pub option: VoterOption,
    pub weight: U256,
    pub voting_power: Option<Percentage>,
    /// e.g. `"1.5 GOV"`, token voting only.
    pub amount: Option<String>,
}

/// Per-voter breakdown with the viewer, if present, listed first.
///
/// For multisig proposals every known member is listed, approvers marked
/// `Approved`, the rest `None`.
pub fn voters(variant: &ProposalVariant, viewer: Option<Address>, members: Option<&[Address]>) -> Vec<Voter> {
    let mut voters: Vec<Voter> = match variant {
        ProposalVariant::TokenWeighted(tally) => tally
            .votes
            .iter()
            .map(|vote| Voter {
                wallet: vote.voter,
                option: vote.choice.into(),
                weight: vote.weight,
                voting_power: Some(Percentage::of(vote.weight, tally.total_voting_weight)),
                amount: Some(format!(
                    "{} {}",
                    format_amount(vote.weight, tally.token.decimals),
                    tally.token.symbol
                )),
            })
            .collect(),
        ProposalVariant::AddressList(tally) => tally
            .votes
            .iter()
            .map(|vote| Voter {
                wallet: vote.voter,
                option: vote.choice.into(),
                weight: U256::from(1),
                voting_power: None,
                amount: None,
            })
            .collect(),
        ProposalVariant::Multisig(tally) => {
            let mut listed: Vec<Voter> = members
                .unwrap_or_default()
                .iter()
                .map(|member| Voter {
                    wallet: *member,
                    option: if tally.approvals.contains(member) { VoterOption::Approved } else { VoterOption::None },
                    weight: U256::from(1),
                    voting_power: None,
                    amount: None,
                })
                .collect();
            for approver in &tally.approvals {
                if !listed.iter().any(|v| v.wallet == *approver) {
                    listed.push(Voter {
                        wallet: *approver,
                        option: VoterOption::Approved,
                        weight: U256::from(1),
                        voting_power: None,
                        amount: None,
                    });
                }
            }
            listed
        }
    };

    if let Some(viewer) = viewer {
        voters.sort_by_key(|v| v.wallet != viewer);
    }
    voters
}

/// Returns a copy of `variant` with `vote` counted.
///
/// A voter that already voted is rejected with `DuplicateVoter` unless the
/// plugin runs in vote replacement mode, in which case the prior ballot is
/// backed out first. Approvals are idempotent.
pub fn merge_vote(variant: &ProposalVariant, vote: &CastVote, mode: VotingMode) -> Result<ProposalVariant> {
    match (variant, vote) {
        (ProposalVariant::TokenWeighted(tally), CastVote::Ballot { voter, choice, weight }) => {
            merge_token_vote(tally, *voter, *choice, *weight, mode).map(ProposalVariant::TokenWeighted)
        }
        (ProposalVariant::AddressList(tally), CastVote::Ballot { voter, choice, .. }) => {
            merge_member_vote(tally, *voter, *choice, mode).map(ProposalVariant::AddressList)
        }
        (ProposalVariant::Multisig(tally), CastVote::Approval { approver }) => {
            Ok(ProposalVariant::Multisig(merge_approval(tally, *approver)))
        }
        (ProposalVariant::Multisig(_), CastVote::Ballot { .. }) => Err(GovernanceError::IncompatibleVote {
            vote: "a ballot",
            variant: variant.kind_name(),
        }),
        (_, CastVote::Approval { .. }) => Err(GovernanceError::IncompatibleVote {
            vote: "an approval",
            variant: variant.kind_name(),
        }),
    }
}

fn merge_token_vote(
    tally: &TokenVotingTally,
    voter: Address,
    choice: Choice,
    weight: U256,
    mode: VotingMode,
) -> Result<TokenVotingTally> {
    let mut next = tally.clone();

    if let Some(position) = next.votes.iter().position(|v| v.voter == voter) {
        if mode != VotingMode::VoteReplacement {
            return Err(GovernanceError::DuplicateVoter(format!("{voter:#x}")));
        }
        let prior = next.votes.remove(position);
        let slot = next.result.get_mut(prior.choice);
        *slot = slot.saturating_sub(prior.weight);
        next.used_voting_weight = next.used_voting_weight.saturating_sub(prior.weight);
    }

    let slot = next.result.get_mut(choice);
    *slot = slot.saturating_add(weight);
    next.used_voting_weight = next.used_voting_weight.saturating_add(weight);
    if next.used_voting_weight > next.total_voting_weight {
        warn!(
            voter = %voter,
            used = %next.used_voting_weight,
            total = %next.total_voting_weight,
            "Used voting weight exceeds snapshot total, capping"
        );
        next.used_voting_weight = next.total_voting_weight;
    }
    next.votes.push(TokenVote { voter, choice, weight });

    Ok(next)
}

fn merge_member_vote(tally: &AddressListTally, voter: Address, choice: Choice, mode: VotingMode) -> Result<AddressListTally> {
    let mut next = tally.clone();

    if let Some(position) = next.votes.iter().position(|v| v.voter == voter) {
        if mode != VotingMode::VoteReplacement {
            return Err(GovernanceError::DuplicateVoter(format!("{voter:#x}")));
        }
        let prior = next.votes.remove(position);
        let slot = next.result.get_mut(prior.choice);
        *slot = slot.saturating_sub(U256::from(1));
    }

    let slot = next.result.get_mut(choice);
    *slot = slot.saturating_add(U256::from(1));
    next.votes.push(MemberVote { voter, choice });

    Ok(next)
}

pub fn merge_approval(tally: &MultisigTally, approver: Address) -> MultisigTally {
    let mut next = tally.clone();
    if !next.approvals.contains(&approver) {
        next.approvals.push(approver);
    }
    next
}

/// Whether `vote` is already part of the recorded votes, exactly as cast.
pub fn is_reflected(variant: &ProposalVariant, vote: &CastVote) -> bool {
    match (variant, vote) {
        (ProposalVariant::TokenWeighted(tally), CastVote::Ballot { voter, choice, weight }) => tally
            .votes
            .iter()
            .any(|v| v.voter == *voter && v.choice == *choice && v.weight == *weight),
        (ProposalVariant::AddressList(tally), CastVote::Ballot { voter, choice, .. }) => {
            tally.votes.iter().any(|v| v.voter == *voter && v.choice == *choice)
        }
        (ProposalVariant::Multisig(tally), CastVote::Approval { approver }) => tally.approvals.contains(approver),
        _ => false,
    }
}
