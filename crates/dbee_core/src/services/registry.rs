//! Client-type registry: maps a client-type name to the constructor that
//! opens clients of that type.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DbeeError;
use crate::models::{ClientOptions, Dialect};
use crate::services::client::DatabaseClient;
use crate::services::{postgres, sqlite};

/// Opens a client from a connection URL.
pub type ClientConstructor =
    Arc<dyn Fn(&str, &ClientOptions) -> Result<Box<dyn DatabaseClient>, DbeeError> + Send + Sync>;

/// Registered client types.
pub struct ClientRegistry {
    constructors: RwLock<HashMap<String, ClientConstructor>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { constructors: RwLock::new(HashMap::new()) }
    }

    /// Create a registry with the built-in client types: `postgres`,
    /// `redshift` and `sqlite`.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let builtins: [(&str, ClientConstructor); 3] = [
            (
                "postgres",
                Arc::new(|url: &str, options: &ClientOptions| {
                    Ok(Box::new(postgres::open(url, options, Dialect::POSTGRES)?) as Box<dyn DatabaseClient>)
                }),
            ),
            (
                "redshift",
                Arc::new(|url: &str, options: &ClientOptions| {
                    Ok(Box::new(postgres::open(url, options, Dialect::REDSHIFT)?) as Box<dyn DatabaseClient>)
                }),
            ),
            (
                "sqlite",
                Arc::new(|url: &str, options: &ClientOptions| {
                    Ok(Box::new(sqlite::open(url, options)?) as Box<dyn DatabaseClient>)
                }),
            ),
        ];

        {
            let mut constructors = registry.constructors.write();
            for (name, constructor) in builtins {
                constructors.insert(name.to_string(), constructor);
            }
        }
        registry
    }

    /// Register a client type. Names are case-insensitive and may be
    /// registered once.
    pub fn register(&self, client_type: &str, constructor: ClientConstructor) -> Result<(), DbeeError> {
        let key = normalize(client_type);
        if key.is_empty() {
            return Err(DbeeError::config("client type name is required"));
        }

        let mut constructors = self.constructors.write();
        if constructors.contains_key(&key) {
            return Err(DbeeError::config(format!("client type '{key}' is already registered")));
        }
        constructors.insert(key.clone(), constructor);
        tracing::debug!(client_type = %key, "Client type registered");
        Ok(())
    }

    /// Check if a client type is registered.
    pub fn contains(&self, client_type: &str) -> bool {
        self.constructors.read().contains_key(&normalize(client_type))
    }

    /// Registered client-type names, sorted.
    pub fn client_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Open a client of the given type.
    pub fn open(
        &self,
        client_type: &str,
        url: &str,
        options: &ClientOptions,
    ) -> Result<Box<dyn DatabaseClient>, DbeeError> {
        let key = normalize(client_type);
        let constructor = self
            .constructors
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| DbeeError::config(format!("unknown client type '{}'", client_type.trim())))?;

        options.validate()?;
        let client = constructor(url, options)?;
        tracing::info!(
            client_type = %key,
            client_id = %client.id(),
            dialect = %client.dialect(),
            "Client opened"
        );
        Ok(client)
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn normalize(client_type: &str) -> String {
    client_type.trim().to_ascii_lowercase()
}
