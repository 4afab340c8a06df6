use crate::pool::{EngineId, Variant};

/// Errors surfaced by the recycling engine.
///
/// Every variant signals a misconfigured adapter. Running out of indices or
/// being superseded by a newer job are reported through
/// [`RecycleOutcome`](crate::RecycleOutcome) instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecyclerError {
    #[error("invalid recycler configuration: {0}")]
    InvalidConfiguration(String),

    #[error("policy does not implement `{capability}`")]
    Unimplemented { capability: &'static str },

    #[error("{variant} is already claimed by {owner}")]
    VariantConflict { variant: Variant, owner: EngineId },
}

impl RecyclerError {
    pub fn unimplemented(capability: &'static str) -> Self {
        Self::Unimplemented { capability }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }
}

pub type Result<T, E = RecyclerError> = std::result::Result<T, E>;
