//! Core of the dbee database client.
//!
//! Opens dialect-aware clients to configured data sources, runs queries that
//! yield lazily consumed result streams, and discovers schema layouts:
//!
//! - **error**: Error taxonomy with server-reported details
//! - **models**: Values, rows, dialects, layout nodes and source configuration
//! - **services**: Driver contract, clients, result streams, layout builder, registry
//! - **state**: Open clients keyed by source
//! - **logging**: Structured logging setup

pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

#[cfg(test)]
mod testing;

pub use error::{DbeeError, ErrorInfo};
pub use models::{
    ClientOptions, Dialect, LayoutKind, LayoutNode, ObjectTyping, Row, SourceConfig, Value,
};
pub use services::{
    Client, ClientRegistry, DatabaseClient, LayoutBuilder, ReleaseCallback, ResultStream,
};
pub use state::DbeeState;
