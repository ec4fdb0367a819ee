//! Optimistic cache of proposals, votes and executions submitted from this
//! client but not yet confirmed by the source.
//!
//! Each DAO owns three JSON objects in the backing store:
//!
//! | key                        | entry key        | entry         |
//! |----------------------------|------------------|---------------|
//! | `pendingProposals/{dao}`   | `{id}`           | [`Proposal`]  |
//! | `pendingVotes/{dao}`       | `{id}/{voter}`   | [`CachedVote`]|
//! | `pendingExecutions/{dao}`  | `{id}`           | [`CachedExecution`] |
//!
//! Entries are decoded one by one. An entry that fails to decode is dropped
//! with a warning and disappears from the store on the next write.

use crate::{
    error::StoreError,
    proposal_id::ProposalId,
    types::{CastVote, ExecutionOutcome, Proposal},
};
use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Mutex, PoisonError},
};
use tracing::{debug, instrument, warn};

const PROPOSALS_PREFIX: &str = "pendingProposals";
const VOTES_PREFIX: &str = "pendingVotes";
const EXECUTIONS_PREFIX: &str = "pendingExecutions";

/// Durable JSON persistence. Writes replace the whole value under `key`.
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<S> {
    fn load(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        (**self).save(key, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedVote {
    pub proposal_id: ProposalId,
    pub vote: CastVote,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedExecution {
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub block_number: Option<u64>,
}

impl From<CachedExecution> for ExecutionOutcome {
    fn from(execution: CachedExecution) -> Self {
        ExecutionOutcome::Executed {
            date: execution.date,
            block_number: execution.block_number,
        }
    }
}

fn store_key(prefix: &str, dao: Address) -> String {
    format!("{prefix}/{dao:#x}")
}

fn vote_key(proposal_id: ProposalId, voter: Address) -> String {
    format!("{proposal_id}/{voter:#x}")
}

pub struct PendingCache<S> {
    store: S,
}

impl<S: KeyValueStore> PendingCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads and decodes every entry under `key`. Store failures degrade to
    /// an empty map.
    fn load_entries<T: DeserializeOwned>(&self, key: &str) -> BTreeMap<String, T> {
        let raw = match self.store.load(key) {
            Ok(Some(Value::Object(raw))) => raw,
            Ok(Some(other)) => {
                warn!(key, kind = json_kind(&other), "Pending cache value is not an object, ignoring");
                return BTreeMap::new();
            }
            Ok(None) => return BTreeMap::new(),
            Err(e) => {
                warn!(key, error = %e, "Failed to load pending cache");
                return BTreeMap::new();
            }
        };

        raw.into_iter()
            .filter_map(|(entry, value)| match serde_json::from_value::<T>(value) {
                Ok(decoded) => Some((entry, decoded)),
                Err(e) => {
                    warn!(key, entry = %entry, error = %e, "Dropping undecodable pending cache entry");
                    None
                }
            })
            .collect()
    }

    fn save_entries<T: Serialize>(&self, key: &str, entries: &BTreeMap<String, T>) -> Result<(), StoreError> {
        let mut object = Map::with_capacity(entries.len());
        for (entry, value) in entries {
            object.insert(entry.clone(), serde_json::to_value(value)?);
        }
        self.store.save(key, &Value::Object(object))
    }

    #[instrument(skip_all, fields(dao = %proposal.dao_address, proposal_id = %proposal.id))]
    pub fn add_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        let key = store_key(PROPOSALS_PREFIX, proposal.dao_address);
        let mut entries: BTreeMap<String, Proposal> = self.load_entries(&key);
        entries.insert(proposal.id.to_string(), proposal.clone());
        self.save_entries(&key, &entries)
    }

    /// Records a ballot or approval. A later vote by the same voter on the
    /// same proposal replaces the earlier one.
    #[instrument(skip_all, fields(dao = %dao, proposal_id = %proposal_id, voter = %vote.voter()))]
    pub fn add_vote(&self, dao: Address, proposal_id: ProposalId, vote: CastVote, cast_at: DateTime<Utc>) -> Result<(), StoreError> {
        let key = store_key(VOTES_PREFIX, dao);
        let mut entries: BTreeMap<String, CachedVote> = self.load_entries(&key);
        entries.insert(
            vote_key(proposal_id, vote.voter()),
            CachedVote {
                proposal_id,
                vote,
                cast_at,
            },
        );
        self.save_entries(&key, &entries)
    }

    pub fn add_approval(
        &self,
        dao: Address,
        proposal_id: ProposalId,
        approver: Address,
        cast_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.add_vote(dao, proposal_id, CastVote::Approval { approver }, cast_at)
    }

    #[instrument(skip_all, fields(dao = %dao, proposal_id = %proposal_id))]
    pub fn add_execution(&self, dao: Address, proposal_id: ProposalId, execution: CachedExecution) -> Result<(), StoreError> {
        let key = store_key(EXECUTIONS_PREFIX, dao);
        let mut entries: BTreeMap<String, CachedExecution> = self.load_entries(&key);
        entries.insert(proposal_id.to_string(), execution);
        self.save_entries(&key, &entries)
    }

    pub fn proposals(&self, dao: Address) -> Vec<Proposal> {
        self.load_entries::<Proposal>(&store_key(PROPOSALS_PREFIX, dao))
            .into_values()
            .collect()
    }

    /// Cached votes for one proposal, oldest first.
    pub fn votes_for(&self, dao: Address, proposal_id: ProposalId) -> Vec<CachedVote> {
        let mut votes: Vec<CachedVote> = self
            .load_entries::<CachedVote>(&store_key(VOTES_PREFIX, dao))
            .into_values()
            .filter(|cached| cached.proposal_id == proposal_id)
            .collect();
        votes.sort_by_key(|cached| cached.cast_at);
        votes
    }

    pub fn execution_for(&self, dao: Address, proposal_id: ProposalId) -> Option<CachedExecution> {
        self.load_entries::<CachedExecution>(&store_key(EXECUTIONS_PREFIX, dao))
            .remove(&proposal_id.to_string())
    }

    /// Deletes the given proposals from the cache and returns how many were
    /// present. The store is only written when something was removed.
    #[instrument(skip_all, fields(dao = %dao))]
    pub fn prune_proposals(&self, dao: Address, ids: &[ProposalId]) -> Result<usize, StoreError> {
        let key = store_key(PROPOSALS_PREFIX, dao);
        let mut entries: BTreeMap<String, Proposal> = self.load_entries(&key);
        let before = entries.len();
        entries.retain(|_, proposal| !ids.contains(&proposal.id));

        let pruned = before - entries.len();
        if pruned > 0 {
            debug!(pruned, "Pruning confirmed proposals from pending cache");
            self.save_entries(&key, &entries)?;
        }
        Ok(pruned)
    }

    pub fn remove_vote(&self, dao: Address, proposal_id: ProposalId, voter: Address) -> Result<bool, StoreError> {
        let key = store_key(VOTES_PREFIX, dao);
        let mut entries: BTreeMap<String, CachedVote> = self.load_entries(&key);
        if entries.remove(&vote_key(proposal_id, voter)).is_none() {
            return Ok(false);
        }
        self.save_entries(&key, &entries)?;
        Ok(true)
    }

    pub fn remove_execution(&self, dao: Address, proposal_id: ProposalId) -> Result<bool, StoreError> {
        let key = store_key(EXECUTIONS_PREFIX, dao);
        let mut entries: BTreeMap<String, CachedExecution> = self.load_entries(&key);
        if entries.remove(&proposal_id.to_string()).is_none() {
            return Ok(false);
        }
        self.save_entries(&key, &entries)?;
        Ok(true)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
