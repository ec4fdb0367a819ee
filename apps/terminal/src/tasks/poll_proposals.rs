use crate::config::{DaoConfig, TerminalConfig};
use alloy::primitives::Address;
use anyhow::Result;
use chrono::Utc;
use proposalsapp_governance::{
    AugmentedProposal, KeyValueStore, PageRequest, ProposalFeed, ProposalSource, SettingsSource, TerminalView,
    VotingSettings, compute_terminal_view,
};
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Reconciles the first page of every configured DAO, then sleeps.
#[instrument(name = "tasks_run_periodic_proposals_poll", skip_all)]
pub async fn run_periodic_proposals_poll<P, V, S>(feed: ProposalFeed<P, V, S>, config: &TerminalConfig) -> Result<()>
where
    P: ProposalSource,
    V: SettingsSource,
    S: KeyValueStore,
{
    info!(daos = config.daos.len(), "Starting periodic proposals poll");

    loop {
        for dao in &config.daos {
            match poll_dao(&feed, dao, config.page_size, config.viewer).await {
                Ok(count) => info!(dao = %dao.name, proposals = count, "Polled proposals"),
                Err(e) => error!(dao = %dao.name, error = %e, "Failed to poll proposals"),
            }
        }

        tokio::time::sleep(Duration::from_secs(config.poll_interval_secs)).await;
    }
}

#[instrument(skip_all, fields(dao = %dao.name))]
pub async fn poll_dao<P, V, S>(
    feed: &ProposalFeed<P, V, S>,
    dao: &DaoConfig,
    page_size: usize,
    viewer: Option<Address>,
) -> Result<usize>
where
    P: ProposalSource,
    V: SettingsSource,
    S: KeyValueStore,
{
    let now = Utc::now();
    let request = PageRequest::page(page_size, 0);
    let (page, settings) = feed.load_page(dao.address, dao.plugin, &request, now).await?;

    let members = match settings {
        Some(VotingSettings::Multisig(_)) => match feed.settings_source().members(dao.plugin).await {
            Ok(members) => Some(members),
            Err(e) => {
                warn!(error = %e, "Failed to load multisig members");
                None
            }
        },
        _ => None,
    };

    for entry in &page {
        // confirmed proposals still get their cached votes applied or cleared
        let entry = if entry.optimistic {
            entry.clone()
        } else {
            feed.reconciler()
                .reconcile_detail(dao.address, entry.proposal.clone(), settings.as_ref(), now)
        };
        report(&entry, settings.as_ref(), members.as_deref(), viewer, now);
    }

    Ok(page.len())
}

fn report(
    entry: &AugmentedProposal,
    settings: Option<&VotingSettings>,
    members: Option<&[Address]>,
    viewer: Option<Address>,
    now: chrono::DateTime<Utc>,
) {
    let proposal = &entry.proposal;
    match compute_terminal_view(proposal, settings, members, viewer, now) {
        TerminalView::Loading => info!(
            proposal_id = %proposal.id,
            title = %proposal.title,
            status = ?entry.status,
            optimistic = entry.optimistic,
            "Proposal (settings loading)"
        ),
        TerminalView::Ready(summary) => {
            let (yes, no, abstain) = match &summary.tally {
                Some(tally) => (
                    tally.yes.percentage.to_string(),
                    tally.no.percentage.to_string(),
                    tally.abstain.percentage.to_string(),
                ),
                None => Default::default(),
            };
            let last_milestone = summary
                .timeline
                .last()
                .map(|m| format!("{} {}", m.label(), m.display_date().unwrap_or_default()))
                .unwrap_or_default();

            info!(
                proposal_id = %summary.proposal_id,
                title = %proposal.title,
                status = ?summary.status,
                label = %summary.status_label,
                execution = ?summary.execution_status,
                yes_pct = %yes,
                no_pct = %no,
                abstain_pct = %abstain,
                participation_pct = %summary.participation.current_percent,
                min_participation_pct = %summary.participation.min_percent,
                missing_weight = %summary.participation.missing_weight,
                early_executable = summary.early_executable,
                voters = summary.voters.len(),
                milestone = %last_milestone,
                button = summary.vote_button_label.as_str(),
                optimistic = entry.optimistic,
                "Proposal"
            );
        }
    }
}
