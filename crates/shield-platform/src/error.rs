//! Platform error types.

use thiserror::Error;

/// Result type alias for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors reported by a platform backend.
///
/// Backends classify every failure into one of these kinds so callers can
/// absorb the expected ones (`NotFound` on delete, `Conflict` on create)
/// and propagate the rest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Conflict(String),

    /// Transport failure or timeout; eligible for caller retry.
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    /// The platform refused the request (validation, permissions, ...).
    #[error("rejected by platform: {0}")]
    Rejected(String),
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Absorb the two expected outcomes of idempotent mutations.
pub trait PlatformResultExt {
    /// `Ok(true)` when the resource was deleted, `Ok(false)` when it was
    /// already absent. Any other error propagates.
    fn absent_ok(self) -> PlatformResult<bool>;

    /// `Ok(true)` when the resource was created, `Ok(false)` when it
    /// already existed. Any other error propagates.
    fn existing_ok(self) -> PlatformResult<bool>;
}

impl PlatformResultExt for PlatformResult<()> {
    fn absent_ok(self) -> PlatformResult<bool> {
        match self {
            Ok(()) => Ok(true),
            Err(PlatformError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn existing_ok(self) -> PlatformResult<bool> {
        match self {
            Ok(()) => Ok(true),
            Err(PlatformError::Conflict(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
