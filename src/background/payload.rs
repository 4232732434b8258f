//! Large-payload handoff through the session store.
//!
//! Transaction payloads can exceed what fits in a window route, so the
//! dispatcher writes them under a generated key and passes only the key.
//! The approval window consumes the entry exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::host::KeyValueStore;
use crate::identifiers::StorageKey;

// ============================================================================
// PayloadStore
// ============================================================================

/// Write-once, consume-once payload storage.
#[derive(Clone)]
pub struct PayloadStore {
    store: Arc<dyn KeyValueStore>,
}

impl PayloadStore {
    /// Wraps a session store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stores a payload under a fresh key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] or a store error if the write fails.
    pub async fn put(&self, payload: &Value) -> Result<StorageKey> {
        let key = StorageKey::generate();
        let serialized = serde_json::to_string(payload)?;
        let size = serialized.len();

        self.store.set(key.as_str(), serialized).await?;
        trace!(%key, size, "Payload stored");
        Ok(key)
    }

    /// Reads and removes a payload.
    ///
    /// # Errors
    ///
    /// - [`Error::PayloadMissing`] if the key was never written or already taken
    /// - [`Error::Json`] if the stored value is corrupt
    pub async fn take(&self, key: &StorageKey) -> Result<Value> {
        let raw = self
            .store
            .get(key.as_str())
            .await?
            .ok_or_else(|| Error::payload_missing(key.clone()))?;

        self.store.remove(key.as_str()).await?;
        debug!(%key, "Payload consumed");
        Ok(serde_json::from_str(&raw)?)
    }

    /// Drops a payload that will never be consumed.
    pub async fn discard(&self, key: &StorageKey) {
        if let Err(e) = self.store.remove(key.as_str()).await {
            debug!(%key, error = %e, "Failed to discard payload");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
