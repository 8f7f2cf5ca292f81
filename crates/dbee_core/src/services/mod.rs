//! Service layer of the dbee core.
//!
//! - `driver` - Driver, Connection and Cursor traits
//! - `stream` - ResultStream with its release callback
//! - `client` - Client (connection manager) and the DatabaseClient trait
//! - `layout` - LayoutBuilder
//! - `registry` - client-type registry
//! - `postgres` - tokio-postgres driver (postgres, redshift)
//! - `sqlite` - rusqlite driver

pub mod client;
pub mod driver;
pub mod layout;
pub mod postgres;
pub mod registry;
pub mod sqlite;
pub mod stream;

pub use client::{Client, DatabaseClient};
pub use driver::{Connection, Cursor, Driver};
pub use layout::LayoutBuilder;
pub use postgres::PostgresDriver;
pub use registry::{ClientConstructor, ClientRegistry};
pub use sqlite::SqliteDriver;
pub use stream::{ReleaseCallback, ResultStream};
