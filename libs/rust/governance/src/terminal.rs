//! The aggregate read model for a single proposal.

use crate::{
    lifecycle::{
        ExecutionStatus, Milestone, StatusLabel, VoteButtonLabel, derive_status, execution_status, status_label, timeline,
        vote_button_label,
    },
    math::Percentage,
    participation::{Participation, is_early_executable, participation},
    proposal_id::ProposalId,
    tally::{TallyResults, Voter, tally, voters},
    types::{Proposal, ProposalStatus, ProposalVariant, VotingMode, VotingSettings},
};
use alloy::primitives::Address;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSummary {
    pub proposal_id: ProposalId,
    pub status: ProposalStatus,
    pub status_label: StatusLabel,
    pub execution_status: ExecutionStatus,
    /// `None` for multisig proposals, which have approvals instead.
    pub tally: Option<TallyResults>,
    pub voters: Vec<Voter>,
    pub participation: Participation,
    pub timeline: Vec<Milestone>,
    pub vote_button_label: VoteButtonLabel,
    pub early_executable: bool,
    pub support_threshold: Option<Percentage>,
    pub viewer_voted: bool,
    pub can_vote: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalView {
    /// Voting settings for the proposal's plugin are not loaded yet.
    Loading,
    Ready(Box<TerminalSummary>),
}

pub fn compute_terminal_view(
    proposal: &Proposal,
    settings: Option<&VotingSettings>,
    members: Option<&[Address]>,
    viewer: Option<Address>,
    now: DateTime<Utc>,
) -> TerminalView {
    let Some(settings) = settings.filter(|s| s.matches(&proposal.variant)) else {
        return TerminalView::Loading;
    };
    let Ok(participation) = participation(&proposal.variant, Some(settings)) else {
        return TerminalView::Loading;
    };

    let status = derive_status(proposal, Some(settings), now);
    let early_executable = is_early_executable(&proposal.variant, settings, participation.missing_weight);
    let viewer_voted = viewer.is_some_and(|v| proposal.variant.has_voted(v));
    let can_vote = viewer.is_some_and(|viewer| {
        status == ProposalStatus::Active
            && match &proposal.variant {
                ProposalVariant::Multisig(_) => !viewer_voted && members.is_none_or(|m| m.contains(&viewer)),
                _ => !viewer_voted || settings.voting_mode() == VotingMode::VoteReplacement,
            }
    });

    TerminalView::Ready(Box::new(TerminalSummary {
        proposal_id: proposal.id,
        status,
        status_label: status_label(proposal, status, now),
        execution_status: execution_status(status, early_executable, proposal.execution_failed()),
        tally: tally(&proposal.variant).ok(),
        voters: voters(&proposal.variant, viewer, members),
        participation,
        timeline: timeline(proposal, status, now),
        vote_button_label: vote_button_label(&proposal.variant, status, viewer_voted, can_vote),
        early_executable,
        support_threshold: settings.majority().map(|s| Percentage::from_ppm(s.support_threshold)),
        viewer_voted,
        can_vote,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{addr, address_list_proposal, at, multisig_proposal, token_proposal},
        types::{Choice, MajorityVotingSettings, MultisigSettings},
    };
    use alloy::primitives::U256;

    fn ready(view: TerminalView) -> TerminalSummary {
        match view {
            TerminalView::Ready(summary) => *summary,
            TerminalView::Loading => panic!("expected a ready view"),
        }
    }

    #[test]
    fn test_loading_without_settings() {
        let proposal = token_proposal(1, 1000, &[]);
        assert_eq!(compute_terminal_view(&proposal, None, None, None, at(150)), TerminalView::Loading);

        let wrong = VotingSettings::Multisig(MultisigSettings { min_approvals: 1, only_listed: true });
        assert_eq!(compute_terminal_view(&proposal, Some(&wrong), None, None, at(150)), TerminalView::Loading);
    }

    #[test]
    fn test_early_executable_token_proposal() {
        let settings = VotingSettings::TokenWeighted(MajorityVotingSettings::from_fractions(
            0.5,
            0.2,
            3600,
            VotingMode::EarlyExecution,
        ));
        let proposal = token_proposal(1, 1000, &[(1, Choice::Yes, 600), (2, Choice::No, 50)]);
        let summary = ready(compute_terminal_view(&proposal, Some(&settings), None, Some(addr(3)), at(150)));

        assert!(summary.early_executable);
        assert_eq!(summary.status, ProposalStatus::Succeeded);
        assert_eq!(summary.execution_status, ExecutionStatus::Executable);
        assert_eq!(summary.participation.missing_weight, U256::ZERO);
        assert_eq!(summary.support_threshold.map(|p| p.to_string()), Some("50".to_string()));
        assert_eq!(summary.tally.map(|t| t.yes.percentage.to_string()), Some("60".to_string()));
        assert!(!summary.can_vote);
        assert_eq!(summary.vote_button_label, VoteButtonLabel::VoteOver);
    }

    #[test]
    fn test_vote_replacement_lets_voter_revote() {
        let settings = VotingSettings::AddressList(MajorityVotingSettings::from_fractions(
            0.5,
            0.5,
            3600,
            VotingMode::VoteReplacement,
        ));
        let proposal = address_list_proposal(1, 4, &[(1, Choice::Yes)]);
        let summary = ready(compute_terminal_view(&proposal, Some(&settings), None, Some(addr(1)), at(150)));

        assert!(summary.viewer_voted);
        assert!(summary.can_vote);
        assert_eq!(summary.vote_button_label, VoteButtonLabel::Revote);
        assert_eq!(summary.voters[0].wallet, addr(1));
        assert_eq!(summary.participation.missing_weight, U256::from(1));
    }

    #[test]
    fn test_multisig_member_can_approve() {
        let settings = VotingSettings::Multisig(MultisigSettings { min_approvals: 2, only_listed: true });
        let proposal = multisig_proposal(1, &[addr(1)]);
        let members = [addr(1), addr(2)];

        let member = ready(compute_terminal_view(&proposal, Some(&settings), Some(&members), Some(addr(2)), at(150)));
        assert!(member.tally.is_none());
        assert!(member.can_vote);
        assert_eq!(member.vote_button_label, VoteButtonLabel::Approve);
        assert_eq!(member.voters.len(), 2);

        let outsider = ready(compute_terminal_view(&proposal, Some(&settings), Some(&members), Some(addr(9)), at(150)));
        assert!(!outsider.can_vote);

        let expired = ready(compute_terminal_view(&proposal, Some(&settings), Some(&members), None, at(250)));
        assert_eq!(expired.status_label, StatusLabel::Expired);
        assert_eq!(expired.execution_status, ExecutionStatus::Defeated);
        assert_eq!(expired.vote_button_label, VoteButtonLabel::Concluded);
    }
}
