//! Proposal status state machine and the milestone timeline built from it.

use crate::{
    participation::{is_early_executable, participation, thresholds_met},
    types::{Proposal, ProposalStatus, ProposalVariant, VotingSettings},
};
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Everything the transition function looks at, gathered once.
#[derive(Debug, Clone, Copy)]
struct Observation {
    now: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    /// `None` when settings are not loaded.
    passed: Option<bool>,
    early_executable: bool,
    executed: bool,
    reported: ProposalStatus,
}

fn transition(state: ProposalStatus, seen: &Observation) -> Option<ProposalStatus> {
    use ProposalStatus::*;

    match state {
        Pending if seen.now >= seen.start => Some(Active),
        Active if seen.executed || (seen.early_executable && seen.now < seen.end) => Some(Succeeded),
        Active if seen.now >= seen.end => match seen.passed {
            Some(true) => Some(Succeeded),
            Some(false) => Some(Defeated),
            // without settings trust what the source saw on chain
            None => match seen.reported {
                Succeeded | Executed => Some(Succeeded),
                Defeated => Some(Defeated),
                Pending | Active => None,
            },
        },
        Succeeded if seen.executed => Some(Executed),
        _ => None,
    }
}

/// Runs the state machine from `Pending` until no transition applies.
pub fn derive_status(proposal: &Proposal, settings: Option<&VotingSettings>, now: DateTime<Utc>) -> ProposalStatus {
    let early_executable = match (settings, participation(&proposal.variant, settings)) {
        (Some(settings), Ok(summary)) => is_early_executable(&proposal.variant, settings, summary.missing_weight),
        _ => false,
    };

    let seen = Observation {
        now,
        start: proposal.start_date,
        end: proposal.end_date,
        passed: thresholds_met(&proposal.variant, settings),
        early_executable,
        executed: proposal.executed_at().is_some() || proposal.status == ProposalStatus::Executed,
        reported: proposal.status,
    };

    let mut state = ProposalStatus::Pending;
    while let Some(next) = transition(state, &seen) {
        state = next;
    }
    state
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneKind {
    Published,
    Pending,
    Active,
    Passed,
    Succeeded,
    Defeated,
    Executed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilestoneMode {
    Done,
    Active,
    Upcoming,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub kind: MilestoneKind,
    pub mode: MilestoneMode,
    pub date: Option<DateTime<Utc>>,
    pub block: Option<u64>,
}

impl Milestone {
    fn new(kind: MilestoneKind, mode: MilestoneMode, date: Option<DateTime<Utc>>) -> Self {
        Self { kind, mode, date, block: None }
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            MilestoneKind::Published => "Published",
            MilestoneKind::Pending => "Pending",
            MilestoneKind::Active => "Active",
            MilestoneKind::Passed => "Passed",
            MilestoneKind::Succeeded => "Succeeded",
            MilestoneKind::Defeated => "Defeated",
            MilestoneKind::Executed => "Executed",
            MilestoneKind::Failed => "Failed",
        }
    }

    pub fn display_date(&self) -> Option<String> {
        self.date.map(format_display_date)
    }
}

pub fn format_display_date(date: DateTime<Utc>) -> String {
    date.format("%Y/%m/%d %I:%M %p UTC").to_string()
}

/// `Published -> [Passed] -> {Pending|Active|Succeeded|Defeated|Executed|Failed}`.
pub fn timeline(proposal: &Proposal, status: ProposalStatus, now: DateTime<Utc>) -> Vec<Milestone> {
    let published = Milestone {
        block: proposal.creation_block_number,
        ..Milestone::new(MilestoneKind::Published, MilestoneMode::Done, Some(proposal.creation_date))
    };
    let passed = Milestone::new(MilestoneKind::Passed, MilestoneMode::Done, Some(proposal.start_date));

    match status {
        ProposalStatus::Pending => vec![
            published,
            Milestone::new(MilestoneKind::Pending, MilestoneMode::Upcoming, Some(proposal.start_date)),
        ],
        ProposalStatus::Active => vec![
            published,
            Milestone::new(MilestoneKind::Active, MilestoneMode::Active, Some(proposal.start_date)),
        ],
        ProposalStatus::Defeated => vec![
            published,
            Milestone::new(MilestoneKind::Defeated, MilestoneMode::Failed, Some(proposal.end_date)),
        ],
        ProposalStatus::Succeeded if proposal.execution_failed() => vec![
            published,
            passed,
            Milestone::new(MilestoneKind::Failed, MilestoneMode::Failed, Some(now)),
        ],
        ProposalStatus::Succeeded => vec![
            published,
            passed,
            Milestone::new(MilestoneKind::Succeeded, MilestoneMode::Upcoming, None),
        ],
        ProposalStatus::Executed => match proposal.executed_at() {
            Some((date, block)) => vec![
                published,
                passed,
                Milestone {
                    block,
                    ..Milestone::new(MilestoneKind::Executed, MilestoneMode::Succeeded, Some(date))
                },
            ],
            None => vec![
                published,
                passed,
                Milestone::new(MilestoneKind::Failed, MilestoneMode::Failed, None),
            ],
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Default,
    Executable,
    ExecutableFailed,
    Executed,
    Defeated,
}

pub fn execution_status(status: ProposalStatus, early_executable: bool, execution_failed: bool) -> ExecutionStatus {
    match status {
        ProposalStatus::Succeeded if execution_failed => ExecutionStatus::ExecutableFailed,
        ProposalStatus::Succeeded => ExecutionStatus::Executable,
        ProposalStatus::Executed => ExecutionStatus::Executed,
        ProposalStatus::Defeated => ExecutionStatus::Defeated,
        ProposalStatus::Active if early_executable => ExecutionStatus::Executable,
        ProposalStatus::Active | ProposalStatus::Pending => ExecutionStatus::Default,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Pending { starts_in: Duration },
    Active { ends_in: Duration },
    Succeeded,
    Executed,
    Defeated,
    /// A multisig proposal that ran out of time before enough approvals.
    Expired,
}

pub fn status_label(proposal: &Proposal, status: ProposalStatus, now: DateTime<Utc>) -> StatusLabel {
    match status {
        ProposalStatus::Pending => StatusLabel::Pending {
            starts_in: (proposal.start_date - now).max(Duration::zero()),
        },
        ProposalStatus::Active => StatusLabel::Active {
            ends_in: (proposal.end_date - now).max(Duration::zero()),
        },
        ProposalStatus::Succeeded => StatusLabel::Succeeded,
        ProposalStatus::Executed => StatusLabel::Executed,
        ProposalStatus::Defeated => match proposal.variant {
            ProposalVariant::Multisig(_) => StatusLabel::Expired,
            _ => StatusLabel::Defeated,
        },
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLabel::Pending { starts_in } => write!(f, "Starts in {}", humanize(*starts_in)),
            StatusLabel::Active { ends_in } => write!(f, "Ends in {}", humanize(*ends_in)),
            StatusLabel::Succeeded => f.write_str("Vote succeeded"),
            StatusLabel::Executed => f.write_str("Proposal executed"),
            StatusLabel::Defeated => f.write_str("Vote defeated"),
            StatusLabel::Expired => f.write_str("Proposal expired"),
        }
    }
}

fn humanize(duration: Duration) -> String {
    let plural = |value: i64, unit: &str| format!("{value} {unit}{}", if value == 1 { "" } else { "s" });

    if duration.num_days() > 0 {
        plural(duration.num_days(), "day")
    } else if duration.num_hours() > 0 {
        plural(duration.num_hours(), "hour")
    } else if duration.num_minutes() > 0 {
        plural(duration.num_minutes(), "minute")
    } else {
        plural(duration.num_seconds(), "second")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteButtonLabel {
    VoteNow,
    Revote,
    VoteSubmitted,
    VoteOver,
    Approve,
    Approved,
    Concluded,
}

impl VoteButtonLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteButtonLabel::VoteNow => "Vote now",
            VoteButtonLabel::Revote => "Change vote",
            VoteButtonLabel::VoteSubmitted => "Vote submitted",
            VoteButtonLabel::VoteOver => "Voting over",
            VoteButtonLabel::Approve => "Approve",
            VoteButtonLabel::Approved => "Approved",
            VoteButtonLabel::Concluded => "Concluded",
        }
    }
}

pub fn vote_button_label(variant: &ProposalVariant, status: ProposalStatus, voted: bool, can_vote: bool) -> VoteButtonLabel {
    let open = status == ProposalStatus::Pending || (status == ProposalStatus::Active && !voted);

    match variant {
        ProposalVariant::Multisig(_) if open => VoteButtonLabel::Approve,
        ProposalVariant::Multisig(_) if voted => VoteButtonLabel::Approved,
        ProposalVariant::Multisig(_) => VoteButtonLabel::Concluded,
        _ if open => VoteButtonLabel::VoteNow,
        _ if voted && can_vote => VoteButtonLabel::Revote,
        _ if voted => VoteButtonLabel::VoteSubmitted,
        _ => VoteButtonLabel::VoteOver,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{addr, at, multisig_proposal, token_proposal},
        types::{Choice, ExecutionOutcome, MajorityVotingSettings, MultisigSettings, VotingMode},
    };

    fn settings(mode: VotingMode) -> VotingSettings {
        VotingSettings::TokenWeighted(MajorityVotingSettings::from_fractions(0.5, 0.2, 3600, mode))
    }

    // fixture proposals are created at 0, start at 100 and end at 200

    #[test]
    fn test_pending_then_active() {
        let proposal = token_proposal(1, 1000, &[]);
        let standard = settings(VotingMode::Standard);
        assert_eq!(derive_status(&proposal, Some(&standard), at(50)), ProposalStatus::Pending);
        assert_eq!(derive_status(&proposal, Some(&standard), at(100)), ProposalStatus::Active);
    }

    #[test]
    fn test_outcome_at_end_date() {
        let standard = settings(VotingMode::Standard);
        let passing = token_proposal(1, 1000, &[(1, Choice::Yes, 300), (2, Choice::No, 100)]);
        assert_eq!(derive_status(&passing, Some(&standard), at(150)), ProposalStatus::Active);
        assert_eq!(derive_status(&passing, Some(&standard), at(200)), ProposalStatus::Succeeded);

        let failing = token_proposal(2, 1000, &[(1, Choice::Yes, 100), (2, Choice::No, 300)]);
        assert_eq!(derive_status(&failing, Some(&standard), at(200)), ProposalStatus::Defeated);

        let no_quorum = token_proposal(3, 1000, &[(1, Choice::Yes, 100)]);
        assert_eq!(derive_status(&no_quorum, Some(&standard), at(201)), ProposalStatus::Defeated);
    }

    #[test]
    fn test_early_execution_succeeds_before_end() {
        let proposal = token_proposal(1, 1000, &[(1, Choice::Yes, 600), (2, Choice::No, 50)]);
        assert_eq!(
            derive_status(&proposal, Some(&settings(VotingMode::EarlyExecution)), at(150)),
            ProposalStatus::Succeeded
        );
        assert_eq!(derive_status(&proposal, Some(&settings(VotingMode::Standard)), at(150)), ProposalStatus::Active);
    }

    #[test]
    fn test_execution_receipt() {
        let mut proposal = token_proposal(1, 1000, &[(1, Choice::Yes, 600)]);
        proposal.execution = Some(ExecutionOutcome::Executed { date: at(250), block_number: Some(42) });
        let status = derive_status(&proposal, Some(&settings(VotingMode::Standard)), at(300));
        assert_eq!(status, ProposalStatus::Executed);

        let steps = timeline(&proposal, status, at(300));
        let kinds: Vec<_> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![MilestoneKind::Published, MilestoneKind::Passed, MilestoneKind::Executed]);
        assert_eq!(steps[2].block, Some(42));
    }

    fn steps(milestones: &[Milestone]) -> Vec<(MilestoneKind, MilestoneMode, Option<DateTime<Utc>>)> {
        milestones.iter().map(|m| (m.kind, m.mode, m.date)).collect()
    }

    #[test]
    fn test_timeline_before_an_outcome() {
        let proposal = token_proposal(1, 1000, &[]);
        let standard = settings(VotingMode::Standard);

        let pending = timeline(&proposal, derive_status(&proposal, Some(&standard), at(50)), at(50));
        assert_eq!(
            steps(&pending),
            vec![
                (MilestoneKind::Published, MilestoneMode::Done, Some(at(0))),
                (MilestoneKind::Pending, MilestoneMode::Upcoming, Some(at(100))),
            ]
        );
        assert_eq!(pending[0].block, Some(1001));

        let active = timeline(&proposal, derive_status(&proposal, Some(&standard), at(150)), at(150));
        assert_eq!(
            steps(&active),
            vec![
                (MilestoneKind::Published, MilestoneMode::Done, Some(at(0))),
                (MilestoneKind::Active, MilestoneMode::Active, Some(at(100))),
            ]
        );
    }

    #[test]
    fn test_defeated_timeline_ends_at_end_date() {
        let proposal = token_proposal(1, 1000, &[(1, Choice::Yes, 100), (2, Choice::No, 300)]);
        let status = derive_status(&proposal, Some(&settings(VotingMode::Standard)), at(500));
        assert_eq!(status, ProposalStatus::Defeated);

        let defeated = timeline(&proposal, status, at(500));
        assert_eq!(
            steps(&defeated),
            vec![
                (MilestoneKind::Published, MilestoneMode::Done, Some(at(0))),
                (MilestoneKind::Defeated, MilestoneMode::Failed, Some(at(200))),
            ]
        );
    }

    #[test]
    fn test_failed_execution_stays_succeeded() {
        let mut proposal = token_proposal(1, 1000, &[(1, Choice::Yes, 600)]);
        proposal.execution = Some(ExecutionOutcome::Failed { observed_at: at(260) });
        let status = derive_status(&proposal, Some(&settings(VotingMode::Standard)), at(300));
        assert_eq!(status, ProposalStatus::Succeeded);
        assert_eq!(execution_status(status, false, proposal.execution_failed()), ExecutionStatus::ExecutableFailed);

        let steps = timeline(&proposal, status, at(300));
        assert_eq!(steps.last().map(|s| (s.kind, s.date)), Some((MilestoneKind::Failed, Some(at(300)))));
    }

    #[test]
    fn test_without_settings_trusts_reported_outcome() {
        let mut proposal = token_proposal(1, 1000, &[]);
        proposal.status = ProposalStatus::Defeated;
        assert_eq!(derive_status(&proposal, None, at(150)), ProposalStatus::Active);
        assert_eq!(derive_status(&proposal, None, at(250)), ProposalStatus::Defeated);

        proposal.status = ProposalStatus::Active;
        assert_eq!(derive_status(&proposal, None, at(250)), ProposalStatus::Active);
    }

    #[test]
    fn test_multisig_expires() {
        let settings = VotingSettings::Multisig(MultisigSettings { min_approvals: 2, only_listed: true });
        let proposal = multisig_proposal(1, &[addr(1)]);
        let status = derive_status(&proposal, Some(&settings), at(250));
        assert_eq!(status, ProposalStatus::Defeated);
        assert_eq!(status_label(&proposal, status, at(250)), StatusLabel::Expired);

        let approved = multisig_proposal(2, &[addr(1), addr(2)]);
        assert_eq!(derive_status(&approved, Some(&settings), at(250)), ProposalStatus::Succeeded);
    }

    #[test]
    fn test_status_label_text() {
        let proposal = token_proposal(1, 1000, &[]);
        let label = status_label(&proposal, ProposalStatus::Pending, at(100 - 2 * 3600));
        assert_eq!(label.to_string(), "Starts in 2 hours");
        let label = status_label(&proposal, ProposalStatus::Active, at(199));
        assert_eq!(label.to_string(), "Ends in 1 second");
    }

    #[test]
    fn test_vote_button_labels() {
        let token = token_proposal(1, 10, &[]).variant;
        assert_eq!(vote_button_label(&token, ProposalStatus::Pending, false, false), VoteButtonLabel::VoteNow);
        assert_eq!(vote_button_label(&token, ProposalStatus::Active, true, true), VoteButtonLabel::Revote);
        assert_eq!(vote_button_label(&token, ProposalStatus::Active, true, false), VoteButtonLabel::VoteSubmitted);
        assert_eq!(vote_button_label(&token, ProposalStatus::Defeated, false, false), VoteButtonLabel::VoteOver);

        let multisig = multisig_proposal(1, &[]).variant;
        assert_eq!(vote_button_label(&multisig, ProposalStatus::Active, false, true), VoteButtonLabel::Approve);
        assert_eq!(vote_button_label(&multisig, ProposalStatus::Active, true, false), VoteButtonLabel::Approved);
        assert_eq!(vote_button_label(&multisig, ProposalStatus::Succeeded, false, false), VoteButtonLabel::Concluded);
    }

    #[test]
    fn test_display_date() {
        assert_eq!(format_display_date(at(0)), "2024/01/01 12:00 AM UTC");
    }
}
