use crate::{
    cache::{CachedVote, KeyValueStore, PendingCache},
    lifecycle::derive_status,
    proposal_id::ProposalId,
    source::PageRequest,
    tally::{is_reflected, merge_vote},
    types::{ExecutionOutcome, Proposal, ProposalStatus, ProposalVariant, VotingMode, VotingSettings},
};
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentedProposal {
    pub proposal: Proposal,
    pub status: ProposalStatus,
    /// Built from the pending cache rather than the source.
    pub optimistic: bool,
}

/// Merges fetched pages with the pending cache. The reconciler is the only
/// writer of the cache while a feed is running.
pub struct Reconciler<S> {
    cache: PendingCache<S>,
}

impl<S: KeyValueStore> Reconciler<S> {
    pub fn new(cache: PendingCache<S>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &PendingCache<S> {
        &self.cache
    }

    /// Labels a fetched page and, on the first page, prunes confirmed
    /// proposals from the cache and prepends the ones still pending.
    ///
    /// Reconciling the same page twice yields the same list and leaves the
    /// cache as the first call left it.
    #[instrument(skip_all, fields(dao = %dao, skip = request.skip, fetched = fetched.len()))]
    pub fn reconcile(
        &self,
        dao: Address,
        fetched: Vec<Proposal>,
        request: &PageRequest,
        settings: Option<&VotingSettings>,
        now: DateTime<Utc>,
    ) -> Vec<AugmentedProposal> {
        let labelled = fetched.into_iter().map(|proposal| AugmentedProposal {
            status: derive_status(&proposal, settings, now),
            proposal,
            optimistic: false,
        });

        if request.skip > 0 {
            return labelled.collect();
        }
        let labelled: Vec<_> = labelled.collect();

        let fetched_ids: HashSet<ProposalId> = labelled.iter().map(|p| p.proposal.id).collect();
        let (confirmed, mut pending): (Vec<Proposal>, Vec<Proposal>) = self
            .cache
            .proposals(dao)
            .into_iter()
            .partition(|cached| fetched_ids.contains(&cached.id));

        if !confirmed.is_empty() {
            let ids: Vec<ProposalId> = confirmed.iter().map(|p| p.id).collect();
            if let Err(e) = self.cache.prune_proposals(dao, &ids) {
                warn!(error = %e, "Failed to persist pruned pending cache");
            }
        }

        pending.sort_by(|a, b| b.creation_date.cmp(&a.creation_date).then_with(|| b.id.cmp(&a.id)));

        let mut result = Vec::with_capacity(pending.len() + labelled.len());
        for cached in pending {
            let proposal = self.augment_pending(dao, cached, settings);
            let status = derive_status(&proposal, settings, now);
            if request.status.is_some_and(|wanted| wanted != status) {
                debug!(proposal_id = %proposal.id, ?status, "Pending proposal filtered out by status");
                continue;
            }
            result.push(AugmentedProposal {
                proposal,
                status,
                optimistic: true,
            });
        }
        result.extend(labelled);
        result
    }

    /// Applies cached votes and a cached execution to a proposal that only
    /// exists in the cache.
    fn augment_pending(&self, dao: Address, mut proposal: Proposal, settings: Option<&VotingSettings>) -> Proposal {
        for cached in self.cache.votes_for(dao, proposal.id) {
            if let Some(merged) = merge_cached_vote(&proposal, &cached, settings) {
                proposal.variant = merged;
            }
        }
        if let Some(execution) = self.cache.execution_for(dao, proposal.id) {
            proposal.execution = Some(execution.into());
        }
        proposal
    }

    /// Reconciles one fetched proposal for a detail view. Cached votes and
    /// executions the source already shows are removed from the cache; the
    /// rest are merged into the returned copy.
    #[instrument(skip_all, fields(dao = %dao, proposal_id = %fetched.id))]
    pub fn reconcile_detail(
        &self,
        dao: Address,
        fetched: Proposal,
        settings: Option<&VotingSettings>,
        now: DateTime<Utc>,
    ) -> AugmentedProposal {
        let mut proposal = fetched;
        let mut optimistic = false;
        let mode = settings.map(|s| s.voting_mode()).unwrap_or_default();
        // a replacement vote may still be in flight until voting closes
        let recorded_vote_is_final = mode != VotingMode::VoteReplacement || now >= proposal.end_date;

        for cached in self.cache.votes_for(dao, proposal.id) {
            let voter = cached.vote.voter();
            if is_reflected(&proposal.variant, &cached.vote) {
                debug!(voter = %voter, "Cached vote confirmed, removing");
                self.drop_cached_vote(dao, proposal.id, voter);
            } else if recorded_vote_is_final && proposal.variant.has_voted(voter) {
                debug!(voter = %voter, "Cached vote superseded by recorded vote, removing");
                self.drop_cached_vote(dao, proposal.id, voter);
            } else if let Some(merged) = merge_cached_vote(&proposal, &cached, settings) {
                proposal.variant = merged;
                optimistic = true;
            }
        }

        if let Some(execution) = self.cache.execution_for(dao, proposal.id) {
            if proposal.executed_at().is_some() || proposal.status == ProposalStatus::Executed {
                if let Err(e) = self.cache.remove_execution(dao, proposal.id) {
                    warn!(error = %e, "Failed to remove confirmed execution from pending cache");
                }
            } else {
                proposal.execution = Some(ExecutionOutcome::from(execution));
                optimistic = true;
            }
        }

        AugmentedProposal {
            status: derive_status(&proposal, settings, now),
            proposal,
            optimistic,
        }
    }

    fn drop_cached_vote(&self, dao: Address, proposal_id: ProposalId, voter: Address) {
        if let Err(e) = self.cache.remove_vote(dao, proposal_id, voter) {
            warn!(error = %e, "Failed to remove confirmed vote from pending cache");
        }
    }
}

fn merge_cached_vote(
    proposal: &Proposal,
    cached: &CachedVote,
    settings: Option<&VotingSettings>,
) -> Option<ProposalVariant> {
    if is_reflected(&proposal.variant, &cached.vote) {
        return None;
    }
    let mode = settings.map(|s| s.voting_mode()).unwrap_or_default();
    match merge_vote(&proposal.variant, &cached.vote, mode) {
        Ok(merged) => Some(merged),
        Err(e) => {
            warn!(proposal_id = %proposal.id, voter = %cached.vote.voter(), error = %e, "Skipping cached vote");
            None
        }
    }
}
