use crate::extensions::subgraph::SubgraphClient;
use alloy::primitives::{Address, U256, address};
use mockito::{Matcher, Server};
use proposalsapp_governance::{
    PageRequest, ProposalSource, ProposalStatus, ProposalVariant, SettingsSource, VotingMode, VotingSettings,
    types::ExecutionOutcome,
};
use serde_json::json;

const DAO: Address = address!("00000000000000000000000000000000000000da");
const PLUGIN: Address = address!("00000000000000000000000000000000000000ee");

fn token_voting_record(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "plugin": "0x00000000000000000000000000000000000000ee",
        "dao": "0x00000000000000000000000000000000000000da",
        "creator": "0x00000000000000000000000000000000000000c0",
        "kind": "tokenVoting",
        "title": "Fund the grants program",
        "createdAt": "1704067200",
        "startDate": "1704067300",
        "endDate": "1704672000",
        "creationBlockNumber": "18908000",
        "status": "Executed",
        "executed": true,
        "executionDate": "1704700000",
        "executionBlockNumber": "18950000",
        "token": {
            "id": "0x0000000000000000000000000000000000000070",
            "symbol": "GOV",
            "name": "Governance",
            "decimals": 18
        },
        "totalVotingPower": "1000000000000000000000",
        "usedVotingPower": "650000000000000000000",
        "yes": "600000000000000000000",
        "no": "50000000000000000000",
        "abstain": "0",
        "voters": [
            {"address": "0x0000000000000000000000000000000000000001", "voteOption": "Yes", "votingPower": "600000000000000000000"},
            {"address": "0x0000000000000000000000000000000000000002", "voteOption": "No", "votingPower": "50000000000000000000"}
        ],
        "approvers": []
    })
}

#[tokio::test]
async fn test_fetch_proposals_page() {
    let mut server = Server::new_async().await;
    let api = SubgraphClient::new_with_endpoint(server.url());

    let mut broken = token_voting_record("0x00000000000000000000000000000000000000ee_0x2");
    broken["status"] = json!("Vetoed");

    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "variables": {
                "dao": "0x00000000000000000000000000000000000000da",
                "first": 6,
                "skip": 0,
                "direction": "desc"
            }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"data": {"proposals": [token_voting_record("0x1"), broken]}}).to_string())
        .create_async()
        .await;

    let proposals = api.fetch_proposals_page(DAO, &PageRequest::default()).await.unwrap();

    // the record with an unknown status is skipped
    assert_eq!(proposals.len(), 1);
    let proposal = &proposals[0];
    // legacy bare id resolved against the plugin
    assert_eq!(proposal.id.to_string(), "0x00000000000000000000000000000000000000ee_0x1");
    assert_eq!(proposal.status, ProposalStatus::Executed);
    assert_eq!(proposal.creation_block_number, Some(18_908_000));
    assert!(matches!(
        proposal.execution,
        Some(ExecutionOutcome::Executed { block_number: Some(18_950_000), .. })
    ));
    let ProposalVariant::TokenWeighted(tally) = &proposal.variant else {
        panic!("expected token voting");
    };
    assert_eq!(tally.token.decimals, 18);
    assert_eq!(tally.result.yes, U256::from(600u64) * U256::from(10u64).pow(U256::from(18)));
    assert_eq!(tally.votes.len(), 2);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_filter_is_sent() {
    let mut server = Server::new_async().await;
    let api = SubgraphClient::new_with_endpoint(server.url());

    let mock = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"variables": {"status": "Active", "skip": 12}})))
        .with_status(200)
        .with_body(json!({"data": {"proposals": []}}).to_string())
        .create_async()
        .await;

    let request = PageRequest {
        status: Some(ProposalStatus::Active),
        ..PageRequest::page(6, 2)
    };
    assert!(api.fetch_proposals_page(DAO, &request).await.unwrap().is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_graphql_errors_fail_the_page() {
    let mut server = Server::new_async().await;
    let api = SubgraphClient::new_with_endpoint(server.url());

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(json!({"data": null, "errors": [{"message": "indexer behind"}]}).to_string())
        .create_async()
        .await;

    let err = api.fetch_proposals_page(DAO, &PageRequest::default()).await.unwrap_err();
    assert!(err.to_string().contains("indexer behind"));
}

#[tokio::test]
async fn test_voting_settings() {
    let mut server = Server::new_async().await;
    let api = SubgraphClient::new_with_endpoint(server.url());

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(
            json!({"data": {"plugin": {
                "id": "0x00000000000000000000000000000000000000ee",
                "kind": "tokenVoting",
                "supportThreshold": "500000",
                "minParticipation": "200000",
                "minDuration": "3600",
                "votingMode": "EarlyExecution",
                "members": []
            }}})
            .to_string(),
        )
        .create_async()
        .await;

    let settings = api.voting_settings(PLUGIN).await.unwrap().unwrap();
    let VotingSettings::TokenWeighted(majority) = settings else {
        panic!("expected token voting settings");
    };
    assert_eq!(majority.support_threshold.value(), 500_000);
    assert_eq!(majority.min_participation.value(), 200_000);
    assert_eq!(majority.min_duration, 3600);
    assert_eq!(majority.voting_mode, VotingMode::EarlyExecution);
}

#[tokio::test]
async fn test_multisig_members_and_unknown_plugin() {
    let mut server = Server::new_async().await;
    let api = SubgraphClient::new_with_endpoint(server.url());

    let _mock = server
        .mock("POST", "/")
        .with_status(200)
        .with_body(
            json!({"data": {"plugin": {
                "id": "0x00000000000000000000000000000000000000ee",
                "kind": "multisig",
                "minApprovals": 2,
                "onlyListed": true,
                "members": ["0x0000000000000000000000000000000000000001", "0x0000000000000000000000000000000000000002"]
            }}})
            .to_string(),
        )
        .create_async()
        .await;

    let members = api.members(PLUGIN).await.unwrap();
    assert_eq!(members.len(), 2);
    assert!(matches!(
        api.voting_settings(PLUGIN).await.unwrap(),
        Some(VotingSettings::Multisig(settings)) if settings.min_approvals == 2
    ));

    let mut empty = Server::new_async().await;
    let api = SubgraphClient::new_with_endpoint(empty.url());
    let _mock = empty
        .mock("POST", "/")
        .with_status(200)
        .with_body(json!({"data": {"plugin": null}}).to_string())
        .create_async()
        .await;
    assert_eq!(api.voting_settings(PLUGIN).await.unwrap(), None);
}
