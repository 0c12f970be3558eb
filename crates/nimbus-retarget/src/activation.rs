//! Activation table for the activation-gated policy.
//!
//! Maps a feed id to the unix time its activation expires. Persisted as a
//! bincode blob, or as JSON when the file name ends in `.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use bincode::{Decode, Encode};
use nimbus_core::error::NimbusError;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, Default, PartialEq, Eq)]
pub struct ActivationTable {
    expiries: BTreeMap<String, u64>,
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

impl ActivationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Activate `id` until `until`; an existing later expiry is kept.
    pub fn activate(&mut self, id: &str, until: u64) {
        let expiry = self.expiries.entry(id.to_string()).or_insert(until);
        *expiry = (*expiry).max(until);
    }

    pub fn is_active(&self, id: &str, now: u64) -> bool {
        self.expiries.get(id).is_some_and(|&expiry| expiry > now)
    }

    pub fn expiry(&self, id: &str) -> Option<u64> {
        self.expiries.get(id).copied()
    }

    /// Drop entries expired at `now`; returns how many were dropped.
    pub fn prune(&mut self, now: u64) -> usize {
        let before = self.expiries.len();
        self.expiries.retain(|_, &mut expiry| expiry > now);
        before - self.expiries.len()
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }

    /// Load from `path`; a missing file is an empty table.
    pub fn load(path: &Path) -> Result<Self, NimbusError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let table = if is_json(path) {
            serde_json::from_slice(&bytes)?
        } else {
            let (table, _): (Self, _) = bincode::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| NimbusError::Serialization(e.to_string()))?;
            table
        };
        debug!(path = %path.display(), "loaded activation table");
        Ok(table)
    }

    /// Write atomically through a sibling temp file.
    pub fn save(&self, path: &Path) -> Result<(), NimbusError> {
        let bytes = if is_json(path) {
            serde_json::to_vec_pretty(self)?
        } else {
            bincode::encode_to_vec(self, bincode::config::standard())
                .map_err(|e| NimbusError::Serialization(e.to_string()))?
        };
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}
