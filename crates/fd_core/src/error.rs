//! Error types for the simulation core.
//!
//! Gameplay failures (blocked placements, missing inputs, dry turrets) are
//! never errors; they surface as [`crate::placement::PlacementResult`] codes
//! and events. `GameError` is reserved for the decode/load boundary.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// Invalid world state.
    #[error("Invalid world state: {0}")]
    InvalidState(String),

    /// Snapshot or replay bytes could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Snapshot was written with a different schema.
    #[error("Snapshot schema mismatch: expected version {expected}, found {found}")]
    SnapshotVersion {
        /// Schema version this build understands.
        expected: u32,
        /// Schema version found in the encoded snapshot.
        found: u32,
    },

    /// Replay was written with a different format version.
    #[error("Replay version mismatch: expected {expected}, found {found}")]
    ReplayVersion {
        /// Replay version this build understands.
        expected: u32,
        /// Replay version found in the file.
        found: u32,
    },

    /// Content or configuration text failed to parse or validate.
    #[error("Invalid content: {0}")]
    ContentError(String),

    /// A content definition referenced by id does not exist.
    #[error("Unknown {kind} definition: {id}")]
    UnknownDefinition {
        /// Definition family (recipe, turret, enemy, ...).
        kind: &'static str,
        /// Missing identifier.
        id: String,
    },

    /// Re-simulation diverged from a recorded digest.
    #[error("Desync detected at tick {tick}: expected {expected}, got {actual}")]
    DesyncDetected {
        /// Tick where the divergence was observed.
        tick: u64,
        /// Recorded digest.
        expected: String,
        /// Digest produced by this run.
        actual: String,
    },
}

impl From<bincode::Error> for GameError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<ron::error::SpannedError> for GameError {
    fn from(err: ron::error::SpannedError) -> Self {
        Self::ContentError(err.to_string())
    }
}
