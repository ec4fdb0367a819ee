//! Seams to the systems that hold authoritative proposal data.

use crate::{
    cache::KeyValueStore,
    reconcile::{AugmentedProposal, Reconciler},
    types::{Proposal, ProposalStatus, VotingSettings},
};
use alloy::primitives::Address;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

pub const DEFAULT_PAGE_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortBy {
    #[default]
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub skip: usize,
    pub status: Option<ProposalStatus>,
    pub sort_by: SortBy,
    pub direction: SortDirection,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            skip: 0,
            status: None,
            sort_by: SortBy::default(),
            direction: SortDirection::default(),
        }
    }
}

impl PageRequest {
    pub fn page(limit: usize, page: usize) -> Self {
        Self {
            limit,
            skip: limit * page,
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait ProposalSource: Send + Sync {
    /// Proposals of `dao`, newest first.
    async fn fetch_proposals_page(&self, dao: Address, request: &PageRequest) -> Result<Vec<Proposal>>;
}

#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// `None` when the plugin is unknown to the source.
    async fn voting_settings(&self, plugin: Address) -> Result<Option<VotingSettings>>;

    /// Multisig members of `plugin`. Sources without member data list none.
    async fn members(&self, _plugin: Address) -> Result<Vec<Address>> {
        Ok(Vec::new())
    }
}

/// One fetch, one settings lookup, then a synchronous reconcile.
pub struct ProposalFeed<P, V, S> {
    proposals: P,
    settings: V,
    reconciler: Reconciler<S>,
}

impl<P, V, S> ProposalFeed<P, V, S>
where
    P: ProposalSource,
    V: SettingsSource,
    S: KeyValueStore,
{
    pub fn new(proposals: P, settings: V, reconciler: Reconciler<S>) -> Self {
        Self {
            proposals,
            settings,
            reconciler,
        }
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    pub fn settings_source(&self) -> &V {
        &self.settings
    }

    /// A failed settings lookup degrades to "not loaded" rather than
    /// failing the page.
    #[instrument(skip_all, fields(dao = %dao, plugin = %plugin, skip = request.skip))]
    pub async fn load_page(
        &self,
        dao: Address,
        plugin: Address,
        request: &PageRequest,
        now: DateTime<Utc>,
    ) -> Result<(Vec<AugmentedProposal>, Option<VotingSettings>)> {
        let fetched = self.proposals.fetch_proposals_page(dao, request).await?;

        let settings = match self.settings.voting_settings(plugin).await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to load voting settings");
                None
            }
        };

        let page = self.reconciler.reconcile(dao, fetched, request, settings.as_ref(), now);
        info!(proposals = page.len(), optimistic = page.iter().filter(|p| p.optimistic).count(), "Page reconciled");
        Ok((page, settings))
    }
}
