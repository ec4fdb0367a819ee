use alloy::primitives::Address;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use proposalsapp_governance::{
    PageRequest, Proposal, ProposalSource, SettingsSource, VotingSettings,
    source::SortDirection,
};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};
use utils::errors::{SUBGRAPH_REQUEST_FAILED, SUBGRAPH_RESPONSE_INVALID};

pub mod models;
use models::*;

const PROPOSALS_QUERY: &str = r#"
    query Proposals($dao: String!, $first: Int!, $skip: Int!, $status: String, $direction: String!) {
        proposals(
            first: $first,
            skip: $skip,
            where: { dao: $dao, status: $status },
            orderBy: "createdAt",
            orderDirection: $direction
        ) {
            id
            plugin
            dao
            creator
            kind
            title
            createdAt
            startDate
            endDate
            creationBlockNumber
            status
            executed
            executionDate
            executionBlockNumber
            token { id symbol name decimals }
            totalVotingPower
            usedVotingPower
            yes
            no
            abstain
            voters { address voteOption votingPower }
            approvers
        }
    }"#;

const PLUGIN_QUERY: &str = r#"
    query Plugin($id: String!) {
        plugin(id: $id) {
            id
            kind
            supportThreshold
            minParticipation
            minDuration
            votingMode
            minApprovals
            onlyListed
            members
        }
    }"#;

/// Client for the governance subgraph; backs both source seams.
#[derive(Clone)]
pub struct SubgraphClient {
    client: ClientWithMiddleware,
    endpoint: String,
}

impl SubgraphClient {
    pub fn new_with_endpoint(endpoint: String) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self { client, endpoint }
    }

    async fn fetch_graphql<T>(&self, query: &str, variables: Value) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("User-Agent", "proposals.app/1.0")
            .body(serde_json::to_string(&json!({ "query": query, "variables": variables }))?)
            .send()
            .await
            .context(SUBGRAPH_REQUEST_FAILED)?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(anyhow!("Subgraph error: status={}, body={}", status, text));
        }

        let body = response.text().await?;
        let parsed: GraphqlResponse<T> = serde_json::from_str(&body).context(SUBGRAPH_RESPONSE_INVALID)?;
        if let Some(error) = parsed.errors.first() {
            return Err(anyhow!("Subgraph query error: {}", error.message));
        }
        parsed.data.ok_or_else(|| anyhow!(SUBGRAPH_RESPONSE_INVALID))
    }

    #[instrument(name = "fetch_plugin", skip(self))]
    pub async fn fetch_plugin(&self, plugin: Address) -> Result<Option<SubgraphPlugin>> {
        let data: PluginData = self
            .fetch_graphql(PLUGIN_QUERY, json!({ "id": format!("{plugin:#x}") }))
            .await?;
        Ok(data.plugin)
    }
}

#[async_trait]
impl ProposalSource for SubgraphClient {
    #[instrument(name = "fetch_proposals_page", skip(self, request), fields(skip = request.skip, limit = request.limit))]
    async fn fetch_proposals_page(&self, dao: Address, request: &PageRequest) -> Result<Vec<Proposal>> {
        let variables = json!({
            "dao": format!("{dao:#x}"),
            "first": request.limit,
            "skip": request.skip,
            "status": request.status.map(status_filter),
            "direction": match request.direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            },
        });

        let data: ProposalsData = self.fetch_graphql(PROPOSALS_QUERY, variables).await?;
        let fetched = data.proposals.len();

        // a record the engine cannot model is skipped, not fatal to the page
        let proposals: Vec<Proposal> = data
            .proposals
            .into_iter()
            .filter_map(|raw| {
                let raw_id = raw.id.clone();
                match Proposal::try_from(raw) {
                    Ok(proposal) => Some(proposal),
                    Err(e) => {
                        warn!(proposal_id = %raw_id, error = %e, "Skipping unreadable subgraph proposal");
                        None
                    }
                }
            })
            .collect();

        debug!(fetched, kept = proposals.len(), "Fetched proposals page");
        Ok(proposals)
    }
}

#[async_trait]
impl SettingsSource for SubgraphClient {
    async fn voting_settings(&self, plugin: Address) -> Result<Option<VotingSettings>> {
        self.fetch_plugin(plugin)
            .await?
            .as_ref()
            .map(VotingSettings::try_from)
            .transpose()
    }

    async fn members(&self, plugin: Address) -> Result<Vec<Address>> {
        match self.fetch_plugin(plugin).await? {
            Some(plugin) => plugin.member_addresses(),
            None => Ok(Vec::new()),
        }
    }
}
