//! World snapshots and the byte store they are kept in.

use std::collections::BTreeMap;
use std::convert::Infallible;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::commands::PlayerCommand;
use crate::error::{GameError, Result};
use crate::world::WorldState;

/// Snapshot schema understood by this build.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// The world plus the commands queued for future ticks.
///
/// Encodings are byte-stable: identical states encode to identical bytes,
/// which makes [`WorldSnapshot::digest_hex`] usable as a golden value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Schema version.
    pub schema_version: u32,
    /// Complete world state.
    pub world: WorldState,
    /// Commands not yet applied, in application order.
    pub queued_commands: Vec<PlayerCommand>,
}

impl WorldSnapshot {
    /// Snapshot at the current schema version.
    #[must_use]
    pub fn new(world: WorldState, queued_commands: Vec<PlayerCommand>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            world,
            queued_commands,
        }
    }

    /// Encode with bincode.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode bytes produced by [`Self::encode`].
    ///
    /// # Errors
    /// Fails on malformed bytes or a schema version other than
    /// [`SNAPSHOT_SCHEMA_VERSION`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = bincode::deserialize(bytes)?;
        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(GameError::SnapshotVersion {
                expected: SNAPSHOT_SCHEMA_VERSION,
                found: snapshot.schema_version,
            });
        }
        Ok(snapshot)
    }

    /// Lowercase hex SHA-256 of the encoding.
    pub fn digest_hex(&self) -> Result<String> {
        Ok(digest_bytes(&self.encode()?))
    }
}

/// Lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Named byte storage for encoded snapshots.
pub trait SnapshotStore {
    /// Store failure.
    type Error;

    /// Store `bytes` under `name`, replacing any previous value.
    fn put(&mut self, name: &str, bytes: &[u8]) -> std::result::Result<(), Self::Error>;

    /// Bytes stored under `name`.
    fn get(&self, name: &str) -> std::result::Result<Option<Vec<u8>>, Self::Error>;

    /// Every stored name, sorted.
    fn names(&self) -> std::result::Result<Vec<String>, Self::Error>;
}

/// In-memory [`SnapshotStore`].
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemorySnapshotStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    type Error = Infallible;

    fn put(&mut self, name: &str, bytes: &[u8]) -> std::result::Result<(), Self::Error> {
        self.entries.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, name: &str) -> std::result::Result<Option<Vec<u8>>, Self::Error> {
        Ok(self.entries.get(name).cloned())
    }

    fn names(&self) -> std::result::Result<Vec<String>, Self::Error> {
        Ok(self.entries.keys().cloned().collect())
    }
}
