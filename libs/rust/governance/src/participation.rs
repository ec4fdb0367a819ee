use crate::{
    error::{GovernanceError, Result},
    math::Percentage,
    types::{ProposalVariant, VotingMode, VotingSettings},
};
use alloy::primitives::U256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participation {
    pub total_weight: U256,
    pub current_weight: U256,
    pub current_percent: Percentage,
    pub min_weight: U256,
    pub min_percent: Percentage,
    /// `max(0, min_weight - current_weight)`.
    pub missing_weight: U256,
}

/// Current against minimum participation.
///
/// Multisig proposals report approvals against `min_approvals`, so the
/// minimum is always 100%.
pub fn participation(variant: &ProposalVariant, settings: Option<&VotingSettings>) -> Result<Participation> {
    let settings = settings
        .filter(|s| s.matches(variant))
        .ok_or(GovernanceError::SettingsNotLoaded)?;

    let (total_weight, current_weight, min_weight, min_percent) = match (variant, settings) {
        (ProposalVariant::TokenWeighted(tally), VotingSettings::TokenWeighted(s)) => (
            tally.total_voting_weight,
            tally.used_voting_weight,
            s.min_participation.apply_ceil(tally.total_voting_weight),
            Percentage::from_ppm(s.min_participation),
        ),
        (ProposalVariant::AddressList(tally), VotingSettings::AddressList(s)) => (
            tally.total_voting_weight,
            tally.used_voting_weight(),
            s.min_participation.apply_ceil(tally.total_voting_weight),
            Percentage::from_ppm(s.min_participation),
        ),
        (ProposalVariant::Multisig(tally), VotingSettings::Multisig(s)) => {
            let min = U256::from(s.min_approvals);
            (min, U256::from(tally.approvals.len()), min, Percentage::of(min, min))
        }
        _ => return Err(GovernanceError::SettingsNotLoaded),
    };

    Ok(Participation {
        total_weight,
        current_weight,
        current_percent: Percentage::of(current_weight, total_weight),
        min_weight,
        min_percent,
        missing_weight: min_weight.saturating_sub(current_weight),
    })
}

/// Whether the outcome can no longer flip, so the proposal may execute
/// before its end date.
///
/// Only token voting in early-execution mode qualifies. Requires the
/// quorum to be met and the support threshold to be exceeded both among
/// cast yes/no votes and in the worst case where every absent weight
/// shows up voting no.
pub fn is_early_executable(variant: &ProposalVariant, settings: &VotingSettings, missing_weight: U256) -> bool {
    let (ProposalVariant::TokenWeighted(tally), VotingSettings::TokenWeighted(settings)) = (variant, settings) else {
        return false;
    };
    if settings.voting_mode != VotingMode::EarlyExecution || !missing_weight.is_zero() {
        return false;
    }

    let yes = tally.result.yes;
    let cast = yes.saturating_add(tally.result.no);
    let absent = tally.total_voting_weight.saturating_sub(tally.used_voting_weight);

    settings.support_threshold.is_exceeded_by(yes, cast)
        && settings.support_threshold.is_exceeded_by(yes, cast.saturating_add(absent))
}

/// Whether the proposal passes if voting closed now. `None` when the
/// settings for this plugin are not loaded.
pub fn thresholds_met(variant: &ProposalVariant, settings: Option<&VotingSettings>) -> Option<bool> {
    let summary = participation(variant, settings).ok()?;
    let passed = match (variant, settings?) {
        (ProposalVariant::TokenWeighted(tally), VotingSettings::TokenWeighted(s)) => {
            summary.missing_weight.is_zero()
                && s.support_threshold.is_exceeded_by(tally.result.yes, tally.result.yes.saturating_add(tally.result.no))
        }
        (ProposalVariant::AddressList(tally), VotingSettings::AddressList(s)) => {
            summary.missing_weight.is_zero()
                && s.support_threshold.is_exceeded_by(tally.result.yes, tally.result.yes.saturating_add(tally.result.no))
        }
        (ProposalVariant::Multisig(_), VotingSettings::Multisig(_)) => summary.missing_weight.is_zero(),
        _ => return None,
    };
    Some(passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{addr, address_list_tally, token_tally},
        types::{Choice, MajorityVotingSettings, MultisigSettings, MultisigTally},
    };
    use proptest::prelude::*;

    fn token_settings(support: f64, min_participation: f64, mode: VotingMode) -> VotingSettings {
        VotingSettings::TokenWeighted(MajorityVotingSettings::from_fractions(support, min_participation, 3600, mode))
    }

    #[test]
    fn test_early_execution_guaranteed() {
        let settings = token_settings(0.5, 0.2, VotingMode::EarlyExecution);
        let variant = ProposalVariant::TokenWeighted(token_tally(1000, &[(1, Choice::Yes, 600), (2, Choice::No, 50)]));

        let summary = participation(&variant, Some(&settings)).unwrap();
        assert_eq!(summary.min_weight, U256::from(200));
        assert_eq!(summary.missing_weight, U256::ZERO);
        assert_eq!(summary.current_percent.to_string(), "65");
        assert!(is_early_executable(&variant, &settings, summary.missing_weight));
    }

    #[test]
    fn test_late_no_wave_blocks_early_execution() {
        let settings = token_settings(0.5, 0.2, VotingMode::EarlyExecution);
        let variant = ProposalVariant::TokenWeighted(token_tally(1000, &[(1, Choice::Yes, 300), (2, Choice::No, 290)]));

        let summary = participation(&variant, Some(&settings)).unwrap();
        assert_eq!(summary.missing_weight, U256::ZERO);
        assert!(!is_early_executable(&variant, &settings, summary.missing_weight));
        // but it would pass if the vote closed now
        assert_eq!(thresholds_met(&variant, Some(&settings)), Some(true));
    }

    #[test]
    fn test_early_execution_needs_mode_and_quorum() {
        let variant = ProposalVariant::TokenWeighted(token_tally(1000, &[(1, Choice::Yes, 900)]));
        let standard = token_settings(0.5, 0.2, VotingMode::Standard);
        assert!(!is_early_executable(&variant, &standard, U256::ZERO));

        let early = token_settings(0.5, 0.2, VotingMode::EarlyExecution);
        assert!(!is_early_executable(&variant, &early, U256::from(1)));

        let list = ProposalVariant::AddressList(address_list_tally(3, &[(1, Choice::Yes), (2, Choice::Yes), (3, Choice::Yes)]));
        let list_settings =
            VotingSettings::AddressList(MajorityVotingSettings::from_fractions(0.5, 0.2, 3600, VotingMode::EarlyExecution));
        assert!(!is_early_executable(&list, &list_settings, U256::ZERO));
    }

    #[test]
    fn test_missing_participation() {
        let settings = token_settings(0.5, 0.5, VotingMode::Standard);
        let variant = ProposalVariant::TokenWeighted(token_tally(1000, &[(1, Choice::Yes, 120)]));
        let summary = participation(&variant, Some(&settings)).unwrap();
        assert_eq!(summary.missing_weight, U256::from(380));
        assert_eq!(summary.min_percent.to_string(), "50");
        assert_eq!(thresholds_met(&variant, Some(&settings)), Some(false));
    }

    #[test]
    fn test_settings_not_loaded() {
        let variant = ProposalVariant::TokenWeighted(token_tally(1000, &[]));
        assert_eq!(participation(&variant, None), Err(GovernanceError::SettingsNotLoaded));

        let wrong = VotingSettings::Multisig(MultisigSettings { min_approvals: 1, only_listed: true });
        assert_eq!(participation(&variant, Some(&wrong)), Err(GovernanceError::SettingsNotLoaded));
        assert_eq!(thresholds_met(&variant, None), None);
    }

    #[test]
    fn test_multisig_participation() {
        let settings = VotingSettings::Multisig(MultisigSettings { min_approvals: 3, only_listed: true });
        let variant = ProposalVariant::Multisig(MultisigTally { approvals: vec![addr(1), addr(2)] });
        let summary = participation(&variant, Some(&settings)).unwrap();
        assert_eq!(summary.missing_weight, U256::from(1));
        assert_eq!(summary.min_percent.to_string(), "100");
        assert_eq!(thresholds_met(&variant, Some(&settings)), Some(false));

        let approved = ProposalVariant::Multisig(MultisigTally { approvals: vec![addr(1), addr(2), addr(3), addr(4)] });
        assert_eq!(participation(&approved, Some(&settings)).unwrap().missing_weight, U256::ZERO);
    }

    proptest! {
        #[test]
        fn prop_missing_weight_is_bounded(
            total in 0u64..1_000_000,
            used_share in 0u64..=100,
            min_participation in 0.0f64..=1.0,
            support in 0.0f64..1.0,
        ) {
            let used = total * used_share / 100;
            let settings = token_settings(support, min_participation, VotingMode::EarlyExecution);
            let variant = ProposalVariant::TokenWeighted(token_tally(total, &[(1, Choice::Yes, used)]));
            let summary = participation(&variant, Some(&settings)).unwrap();

            prop_assert!(summary.missing_weight <= summary.min_weight);
            prop_assert_eq!(summary.missing_weight.is_zero(), summary.current_weight >= summary.min_weight);
            if !summary.missing_weight.is_zero() {
                prop_assert!(!is_early_executable(&variant, &settings, summary.missing_weight));
            }
        }
    }
}
