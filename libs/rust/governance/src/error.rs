use thiserror::Error;

pub type Result<T> = std::result::Result<T, GovernanceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GovernanceError {
    #[error("malformed proposal id `{0}`")]
    MalformedId(String),

    #[error("proposal id `{0}` has no plugin address and no fallback was supplied")]
    MissingPluginAddress(String),

    #[error("{0} already voted and vote replacement is disabled")]
    DuplicateVoter(String),

    #[error("voting settings are not loaded")]
    SettingsNotLoaded,

    #[error("record does not match any known proposal shape")]
    UnknownVariant,

    #[error("{vote} cannot be applied to a {variant} proposal")]
    IncompatibleVote {
        vote: &'static str,
        variant: &'static str,
    },
}

/// Failures of the durable key-value seam.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store json error: {0}")]
    Json(#[from] serde_json::Error),
}
