//! Fixture builders shared by unit and integration tests.
//!
//! Fixture proposals are created at [`at(0)`](at), start at `at(100)` and
//! end at `at(200)`.

use crate::{
    proposal_id::ProposalId,
    types::{
        AddressListTally, Choice, MemberVote, MultisigTally, Proposal, ProposalStatus, ProposalVariant, TokenInfo,
        TokenVote, TokenVotingTally, VoteResult,
    },
};
use alloy::primitives::{Address, U256};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// An address whose last byte is `byte`.
pub fn addr(byte: u8) -> Address {
    let mut raw = [0u8; 20];
    raw[19] = byte;
    Address::from(raw)
}

pub fn dao() -> Address {
    addr(0xda)
}

pub fn plugin() -> Address {
    addr(0xee)
}

/// Seconds after 2024-01-01T00:00:00Z.
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default() + Duration::seconds(seconds)
}

pub fn token_tally(total: u64, votes: &[(u8, Choice, u64)]) -> TokenVotingTally {
    let mut result = VoteResult::default();
    let mut used = U256::ZERO;
    let votes = votes
        .iter()
        .map(|&(voter, choice, weight)| {
            let weight = U256::from(weight);
            *result.get_mut(choice) += weight;
            used += weight;
            TokenVote {
                voter: addr(voter),
                choice,
                weight,
            }
        })
        .collect();

    TokenVotingTally {
        token: TokenInfo {
            address: addr(0x70),
            symbol: "TKN".to_string(),
            name: "Test Token".to_string(),
            decimals: 0,
        },
        total_voting_weight: U256::from(total),
        used_voting_weight: used,
        result,
        votes,
    }
}

pub fn address_list_tally(members: u64, votes: &[(u8, Choice)]) -> AddressListTally {
    let mut result = VoteResult::default();
    let votes = votes
        .iter()
        .map(|&(voter, choice)| {
            *result.get_mut(choice) += U256::from(1);
            MemberVote {
                voter: addr(voter),
                choice,
            }
        })
        .collect();

    AddressListTally {
        total_voting_weight: U256::from(members),
        result,
        votes,
    }
}

pub fn proposal(local_id: u64, variant: ProposalVariant) -> Proposal {
    Proposal {
        id: ProposalId::new(plugin(), U256::from(local_id)),
        dao_address: dao(),
        creator_address: addr(0xc0),
        title: format!("Proposal {local_id}"),
        creation_date: at(0),
        start_date: at(100),
        end_date: at(200),
        creation_block_number: Some(1_000 + local_id),
        status: ProposalStatus::Pending,
        execution: None,
        variant,
    }
}

pub fn token_proposal(local_id: u64, total: u64, votes: &[(u8, Choice, u64)]) -> Proposal {
    proposal(local_id, ProposalVariant::TokenWeighted(token_tally(total, votes)))
}

pub fn address_list_proposal(local_id: u64, members: u64, votes: &[(u8, Choice)]) -> Proposal {
    proposal(local_id, ProposalVariant::AddressList(address_list_tally(members, votes)))
}

pub fn multisig_proposal(local_id: u64, approvals: &[Address]) -> Proposal {
    proposal(
        local_id,
        ProposalVariant::Multisig(MultisigTally {
            approvals: approvals.to_vec(),
        }),
    )
}
