//! Error types for Compass operations

use crate::{EntityType, Mode};
use thiserror::Error;

/// Input validation errors. Rejected synchronously, no state change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Year {year} outside supported range {min}..={max}")]
    YearOutOfRange { year: i32, min: i32, max: i32 },

    #[error("Response value for {question_id} does not match a {expected} question: {reason}")]
    ValueShapeMismatch {
        question_id: String,
        expected: String,
        reason: String,
    },
}

/// Remote store failures. Never roll back local state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote store is not configured")]
    NotConfigured,

    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    #[error("Remote returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Could not decode remote payload: {reason}")]
    Decode { reason: String },

    #[error("Remote {entity_type:?} with id {id} not found")]
    NotFound { entity_type: EntityType, id: String },

    #[error("No async runtime available to run remote work")]
    NoRuntime,

    #[error("Remote store lock poisoned")]
    LockPoisoned,
}

/// Durable local snapshot failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Snapshot IO error: {reason}")]
    Io { reason: String },

    #[error("Snapshot is malformed: {reason}")]
    Malformed { reason: String },

    #[error("Snapshot lock poisoned")]
    LockPoisoned,
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed {
            reason: err.to_string(),
        }
    }
}

/// Master error type for all Compass errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompassError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    #[error("{entity_type:?} not found: {id}")]
    NotFound { entity_type: EntityType, id: String },

    #[error("Cannot upgrade from {from} to {to}: target mode must be deeper")]
    InvalidUpgrade { from: Mode, to: Mode },

    #[error("Remote failure: {0}")]
    Remote(#[from] RemoteError),

    #[error("Snapshot failure: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Local data must be migrated to the remote store before hydrating from it")]
    MigrationPending,

    #[error("Operation requires an authenticated user")]
    NotAuthenticated,
}

/// Result type alias for Compass operations.
pub type CompassResult<T> = Result<T, CompassError>;

// =============================================================================
// TESTS
// =============================================================================
