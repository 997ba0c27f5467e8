use thiserror::Error;

/// Engine failure taxonomy.
///
/// Configuration problems fail fast before the first tick. Persistence
/// problems are retried at the boundary where they occur and escalate to
/// fatal only after the retry budget is exhausted. Invariant violations are
/// programming defects and always abort the run; masking one would corrupt
/// downstream joins.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("persistence failure ({context}): {source}")]
    Persistence {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint is locked by another process: {0}")]
    CheckpointLocked(String),

    #[error("serialization failure: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl EngineError {
    pub fn persistence(context: impl Into<String>, source: std::io::Error) -> Self {
        EngineError::Persistence { context: context.into(), source }
    }
}
