//! Orchestrator error types.

use serde::Serialize;
use thiserror::Error;

use shield_core::{QuantityError, TenantKeyError};
use shield_platform::PlatformError;

/// Why one member of a group was not provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberFailure {
    pub name: String,
    pub reason: String,
}

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Sizes in bytes.
    #[error("storage quota exceeded: {used} used + {requested} requested > {ceiling} bytes")]
    QuotaExceeded {
        used: u64,
        requested: u64,
        ceiling: u64,
    },

    #[error(transparent)]
    MalformedQuantity(#[from] QuantityError),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error(
        "group {group_id} partially provisioned: {} succeeded, {} failed",
        succeeded.len(),
        failed.len()
    )]
    PartialFailure {
        group_id: String,
        succeeded: Vec<String>,
        failed: Vec<MemberFailure>,
    },

    /// Transport failure or timeout; callers may retry.
    #[error("platform unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("platform rejected request: {0}")]
    Platform(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl From<PlatformError> for OrchestratorError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(what) => Self::NotFound(what),
            PlatformError::Conflict(what) => Self::Conflict(what),
            PlatformError::Unavailable(what) => Self::PlatformUnavailable(what),
            PlatformError::Rejected(what) => Self::Platform(what),
        }
    }
}

impl From<TenantKeyError> for OrchestratorError {
    fn from(err: TenantKeyError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl OrchestratorError {
    /// Whether a caller-side retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PlatformUnavailable(_))
    }
}
