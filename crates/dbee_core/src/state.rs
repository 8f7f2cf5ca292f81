//! Host state: the client registry plus every open client, keyed by the id
//! of the source it was opened from.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::DbeeError;
use crate::models::SourceConfig;
use crate::services::{ClientRegistry, DatabaseClient};

/// Central state shared by the host.
///
/// Thread-safe via `parking_lot::RwLock`.
pub struct DbeeState {
    registry: ClientRegistry,
    clients: RwLock<HashMap<Uuid, Arc<dyn DatabaseClient>>>,
}

impl DbeeState {
    /// Create state with the built-in client types.
    pub fn new() -> Self {
        Self::with_registry(ClientRegistry::with_defaults())
    }

    /// Create state over a custom registry.
    pub fn with_registry(registry: ClientRegistry) -> Self {
        Self { registry, clients: RwLock::new(HashMap::new()) }
    }

    /// The client registry.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    // ========== Client Management ==========

    /// Open a client for `source` and track it under the source id.
    ///
    /// A client already open for the same id is closed and replaced.
    pub fn open_source(&self, source: &SourceConfig) -> Result<Arc<dyn DatabaseClient>, DbeeError> {
        source.validate()?;
        let client: Arc<dyn DatabaseClient> =
            Arc::from(self.registry.open(&source.client_type, &source.url, &source.options)?);

        tracing::info!(
            source_id = %source.id,
            source = %source.name,
            url = %source.redacted_url(),
            "Source opened"
        );

        let previous = self.clients.write().insert(source.id, Arc::clone(&client));
        if let Some(previous) = previous {
            tracing::debug!(source_id = %source.id, "Replacing open client");
            previous.close();
        }
        Ok(client)
    }

    /// Get the client opened for a source.
    pub fn get_client(&self, source_id: &Uuid) -> Option<Arc<dyn DatabaseClient>> {
        self.clients.read().get(source_id).cloned()
    }

    /// Stop tracking a client and close it.
    pub fn remove_client(&self, source_id: &Uuid) -> Option<Arc<dyn DatabaseClient>> {
        let client = self.clients.write().remove(source_id);
        if let Some(client) = client.as_ref() {
            client.close();
            tracing::debug!(source_id = %source_id, "Removed client from state");
        }
        client
    }

    /// Ids of all sources with an open client.
    pub fn client_ids(&self) -> Vec<Uuid> {
        self.clients.read().keys().copied().collect()
    }

    /// Close and forget every client.
    pub fn close_all(&self) {
        let clients: Vec<_> = self.clients.write().drain().collect();
        for (_, client) in &clients {
            client.close();
        }
        if !clients.is_empty() {
            tracing::info!(count = clients.len(), "Closed all clients");
        }
    }
}

impl Default for DbeeState {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DbeeState {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Row;

    fn sqlite_source(name: &str) -> SourceConfig {
        SourceConfig::new(name, "sqlite", ":memory:")
    }

    #[test]
    fn test_open_and_get_client() {
        let state = DbeeState::new();
        let source = sqlite_source("scratch");

        let client = state.open_source(&source).unwrap();
        assert_eq!(client.dialect().name(), "sqlite");
        assert_eq!(state.client_ids(), vec![source.id]);

        let fetched = state.get_client(&source.id).unwrap();
        assert_eq!(fetched.id(), client.id());

        let rows: Vec<Row> = fetched.query("SELECT 1").unwrap().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_remove_client_closes_it() {
        let state = DbeeState::new();
        let source = sqlite_source("scratch");
        state.open_source(&source).unwrap();

        let removed = state.remove_client(&source.id).unwrap();
        assert!(state.get_client(&source.id).is_none());
        assert!(removed.query("SELECT 1").unwrap_err().is_connection());
        assert!(state.remove_client(&source.id).is_none());
    }

    #[test]
    fn test_reopen_replaces_and_closes_previous() {
        let state = DbeeState::new();
        let source = sqlite_source("scratch");

        let first = state.open_source(&source).unwrap();
        let second = state.open_source(&source).unwrap();
        assert_ne!(first.id(), second.id());
        assert!(first.query("SELECT 1").unwrap_err().is_connection());
        assert_eq!(state.client_ids().len(), 1);
    }

    #[test]
    fn test_invalid_source_is_config_error() {
        let state = DbeeState::new();

        let unknown = SourceConfig::new("x", "oracle", "oracle://db");
        assert!(state.open_source(&unknown).err().unwrap().is_config());

        let blank = SourceConfig::new("x", "sqlite", "  ");
        assert!(state.open_source(&blank).err().unwrap().is_config());
        assert!(state.client_ids().is_empty());
    }

    #[test]
    fn test_close_all() {
        let state = DbeeState::new();
        let a = state.open_source(&sqlite_source("a")).unwrap();
        let b = state.open_source(&sqlite_source("b")).unwrap();

        state.close_all();
        assert!(state.client_ids().is_empty());
        assert!(a.query("SELECT 1").unwrap_err().is_connection());
        assert!(b.layout().unwrap_err().is_connection());
    }
}
