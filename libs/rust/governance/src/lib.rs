pub mod cache;
pub mod error;
pub mod lifecycle;
pub mod math;
pub mod participation;
pub mod proposal_id;
pub mod reconcile;
pub mod serde_ext;
pub mod source;
pub mod tally;
pub mod terminal;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{CachedExecution, CachedVote, KeyValueStore, MemoryStore, PendingCache};
pub use error::{GovernanceError, Result, StoreError};
pub use proposal_id::{ProposalId, canonical_proposal_id, decode_proposal_id, decode_proposal_id_with_fallback, encode_proposal_id};
pub use reconcile::{AugmentedProposal, Reconciler};
pub use source::{PageRequest, ProposalFeed, ProposalSource, SettingsSource};
pub use terminal::{TerminalSummary, TerminalView, compute_terminal_view};
pub use types::{
    CastVote, Choice, ExecutionOutcome, MajorityVotingSettings, MultisigSettings, Proposal, ProposalStatus, ProposalVariant,
    VotingMode, VotingSettings,
};
