//! Clients: one logical connection per configured data source.
//!
//! [`Client`] is the connection manager. It acquires the connection for each
//! query and either hands its release to the returned [`ResultStream`] or,
//! when execution fails, releases it before the error is returned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::DbeeError;
use crate::models::{Dialect, LayoutNode};
use crate::services::driver::{Connection, Cursor, Driver};
use crate::services::layout::LayoutBuilder;
use crate::services::stream::{ReleaseCallback, ResultStream};

/// Capabilities every client type exposes to the host.
pub trait DatabaseClient: Send + Sync {
    /// Unique identifier of this client instance.
    fn id(&self) -> Uuid;

    /// Dialect driving layout discovery.
    fn dialect(&self) -> &Dialect;

    /// Execute `sql`, returning a lazily consumed result.
    fn query(&self, sql: &str) -> Result<ResultStream, DbeeError>;

    /// Discover schemas, tables and views.
    fn layout(&self) -> Result<Vec<LayoutNode>, DbeeError>;

    /// Release the connection and the underlying handle. Idempotent.
    fn close(&self);
}

/// Driver-backed client.
pub struct Client {
    id: Uuid,
    dialect: Dialect,
    driver: Box<dyn Driver>,
    /// Set while a connection is out on a query.
    checked_out: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl Client {
    /// Create a client over an initialized driver.
    pub fn new(driver: impl Driver + 'static, dialect: Dialect) -> Self {
        Self {
            id: Uuid::new_v4(),
            dialect,
            driver: Box::new(driver),
            checked_out: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
        }
    }

    /// Check if a result stream currently holds the connection.
    pub fn is_busy(&self) -> bool {
        self.checked_out.load(Ordering::Acquire)
    }

    /// Check if the client has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl DatabaseClient for Client {
    fn id(&self) -> Uuid {
        self.id
    }

    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    fn query(&self, sql: &str) -> Result<ResultStream, DbeeError> {
        if self.is_closed() {
            return Err(DbeeError::connection("client is closed"));
        }

        let mut lease = ConnectionLease::acquire(self.driver.as_ref(), &self.checked_out)?;
        tracing::debug!(client_id = %self.id, dialect = %self.dialect, "Executing query");

        // On error the lease drops here and releases the connection.
        let cursor = lease.execute(sql)?;

        let stream = ResultStream::new(cursor).with_callback(lease.into_release());
        tracing::debug!(
            client_id = %self.id,
            query_id = %stream.query_id(),
            columns = stream.columns().len(),
            "Result stream opened"
        );
        Ok(stream)
    }

    fn layout(&self) -> Result<Vec<LayoutNode>, DbeeError> {
        let stream = self.query(self.dialect.layout_query())?;
        LayoutBuilder::new(self.dialect).build(stream)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if self.is_busy() {
            tracing::debug!(client_id = %self.id, "Closing client while a result stream is open");
        }
        if let Err(e) = self.driver.close() {
            tracing::warn!(client_id = %self.id, error = %e, "Failed to close client");
        }
        tracing::info!(client_id = %self.id, dialect = %self.dialect, "Client closed");
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("dialect", &self.dialect.name())
            .field("busy", &self.is_busy())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An acquired connection that is released when dropped, unless handed off
/// to a result stream with [`ConnectionLease::into_release`].
struct ConnectionLease {
    connection: Option<Box<dyn Connection>>,
    checked_out: Arc<AtomicBool>,
}

impl ConnectionLease {
    fn acquire(driver: &dyn Driver, checked_out: &Arc<AtomicBool>) -> Result<Self, DbeeError> {
        if checked_out
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(DbeeError::connection(
                "connection is busy: close the open result stream first",
            ));
        }

        match driver.acquire() {
            Ok(connection) => Ok(Self {
                connection: Some(connection),
                checked_out: Arc::clone(checked_out),
            }),
            Err(e) => {
                checked_out.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>, DbeeError> {
        match self.connection.as_mut() {
            Some(connection) => connection.execute(sql),
            None => Err(DbeeError::internal("connection lease already handed off")),
        }
    }

    fn into_release(mut self) -> ReleaseCallback {
        let connection = self.connection.take();
        let checked_out = Arc::clone(&self.checked_out);
        Box::new(move || release(connection, &checked_out))
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if self.connection.is_some() {
            release(self.connection.take(), &self.checked_out);
        }
    }
}

fn release(connection: Option<Box<dyn Connection>>, checked_out: &AtomicBool) {
    if let Some(connection) = connection {
        if let Err(e) = connection.close() {
            tracing::warn!(error = %e, "Failed to release connection");
        }
    }
    checked_out.store(false, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LayoutKind;
    use crate::testing::{text_row, Script, ScriptedDriver};

    #[test]
    fn test_query_defers_release_to_stream() {
        let driver = ScriptedDriver::new().on("SELECT 1", Script::Rows(vec![text_row(&["1"])]));
        let stats = driver.stats();
        let client = Client::new(driver, Dialect::POSTGRES);

        let mut stream = client.query("SELECT 1").unwrap();
        assert_eq!(stats.acquired(), 1);
        assert_eq!(stats.released(), 0);
        assert!(client.is_busy());

        assert!(stream.next_row().unwrap().is_some());
        assert!(stream.next_row().unwrap().is_none());
        assert_eq!(stats.released(), 1);
        assert!(!client.is_busy());
    }

    #[test]
    fn test_rejected_query_releases_connection() {
        let driver = ScriptedDriver::new().on("SELEC 1", Script::Reject("syntax error".into()));
        let stats = driver.stats();
        let client = Client::new(driver, Dialect::POSTGRES);

        let err = client.query("SELEC 1").unwrap_err();
        assert!(err.is_query());
        assert_eq!(stats.acquired(), 1);
        assert_eq!(stats.released(), 1);
        assert!(!client.is_busy());
    }

    #[test]
    fn test_acquire_failure_is_connection_error() {
        let driver = ScriptedDriver::new().refusing_acquire();
        let stats = driver.stats();
        let client = Client::new(driver, Dialect::POSTGRES);

        let err = client.query("SELECT 1").unwrap_err();
        assert!(err.is_connection());
        assert_eq!(stats.released(), 0);
        assert!(!client.is_busy());
    }

    #[test]
    fn test_second_query_while_stream_open_is_rejected() {
        let driver = ScriptedDriver::new().on("SELECT 1", Script::Rows(vec![text_row(&["1"])]));
        let stats = driver.stats();
        let client = Client::new(driver, Dialect::POSTGRES);

        let mut first = client.query("SELECT 1").unwrap();
        let err = client.query("SELECT 1").unwrap_err();
        assert!(err.is_connection());
        assert_eq!(stats.acquired(), 1);

        first.close();
        assert!(client.query("SELECT 1").is_ok());
        assert_eq!(stats.acquired(), 2);
        assert_eq!(stats.released(), 2);
    }

    #[test]
    fn test_release_errors_are_swallowed() {
        let driver = ScriptedDriver::new()
            .on("SELECT 1", Script::Rows(Vec::new()))
            .failing_release();
        let stats = driver.stats();
        let client = Client::new(driver, Dialect::POSTGRES);

        let mut stream = client.query("SELECT 1").unwrap();
        assert!(stream.next_row().unwrap().is_none());
        assert_eq!(stats.released(), 1);
        assert!(!client.is_busy());
    }

    #[test]
    fn test_close_is_best_effort_and_idempotent() {
        let driver = ScriptedDriver::new().failing_close();
        let stats = driver.stats();
        let client = Client::new(driver, Dialect::POSTGRES);

        client.close();
        client.close();
        assert!(client.is_closed());
        assert_eq!(stats.driver_closed(), 1);

        let err = client.query("SELECT 1").unwrap_err();
        assert!(err.is_connection());
        assert_eq!(stats.acquired(), 0);

        drop(client);
        assert_eq!(stats.driver_closed(), 1);
    }

    #[test]
    fn test_drop_closes_client() {
        let driver = ScriptedDriver::new();
        let stats = driver.stats();
        drop(Client::new(driver, Dialect::POSTGRES));
        assert_eq!(stats.driver_closed(), 1);
    }

    #[test]
    fn test_stream_outlives_client_close() {
        let driver = ScriptedDriver::new().on("SELECT 1", Script::Rows(vec![text_row(&["1"])]));
        let stats = driver.stats();
        let client = Client::new(driver, Dialect::POSTGRES);

        let stream = client.query("SELECT 1").unwrap();
        client.close();
        drop(stream);
        assert_eq!(stats.released(), 1);
    }

    #[test]
    fn test_layout_uses_dialect_query() {
        let driver = ScriptedDriver::new().on(
            Dialect::REDSHIFT.layout_query(),
            Script::Rows(vec![text_row(&["public", "users", "TABLE"])]),
        );
        let stats = driver.stats();
        let client = Client::new(driver, Dialect::REDSHIFT);

        let layout = client.layout().unwrap();
        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].children[0].kind, LayoutKind::Table);
        assert_eq!(layout[0].children[0].dialect, "redshift");
        assert_eq!(stats.released(), 1);
        assert!(!client.is_busy());
    }
}
