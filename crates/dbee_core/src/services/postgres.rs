//! PostgreSQL wire-protocol driver built on tokio-postgres.
//!
//! Serves both the `postgres` and `redshift` client types; only the dialect
//! differs. The driver owns a small tokio runtime and blocks on it, so the
//! rest of the core stays synchronous.

use futures_util::StreamExt;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio_postgres::types::{FromSql, Kind, ToSql, Type};
use tokio_postgres::{NoTls, RowStream};

use crate::error::DbeeError;
use crate::models::connection::redact_url;
use crate::models::{ClientOptions, Dialect, Row, Value};
use crate::services::client::Client;
use crate::services::driver::{Connection, Cursor, Driver};

/// Open a client speaking the PostgreSQL protocol with the given dialect.
///
/// Only the URL is checked here; the server is contacted on the first query.
pub fn open(url: &str, options: &ClientOptions, dialect: Dialect) -> Result<Client, DbeeError> {
    Ok(Client::new(PostgresDriver::new(url, options)?, dialect))
}

/// Driver for one PostgreSQL-compatible server.
///
/// Calls block on the driver's own runtime and must come from a thread that
/// is not driving a tokio runtime; from inside one they fail with
/// [`DbeeError::Internal`]. Drop the last client, stream and driver outside
/// async code as well, since that shuts the runtime down.
pub struct PostgresDriver {
    config: tokio_postgres::Config,
    runtime: Arc<Runtime>,
    client: Mutex<Option<Arc<tokio_postgres::Client>>>,
}

impl PostgresDriver {
    /// Parse the URL (URL or key-value form) and apply the client options
    /// the URL does not set itself.
    pub fn new(url: &str, options: &ClientOptions) -> Result<Self, DbeeError> {
        options.validate()?;

        let mut config: tokio_postgres::Config = url.trim().parse().map_err(|e| {
            DbeeError::config_with_source(format!("Invalid PostgreSQL url '{}'", redact_url(url)), e)
        })?;
        if config.get_application_name().is_none() {
            config.application_name(&options.application_name);
        }
        if config.get_connect_timeout().is_none() && options.connect_timeout_secs > 0 {
            config.connect_timeout(Duration::from_secs(options.connect_timeout_secs as u64));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("dbee-postgres")
            .enable_all()
            .build()
            .map_err(|e| DbeeError::internal(format!("Failed to start PostgreSQL runtime: {e}")))?;

        tracing::debug!(url = %redact_url(url), "PostgreSQL driver initialized");

        Ok(Self { config, runtime: Arc::new(runtime), client: Mutex::new(None) })
    }

    /// The parsed connection configuration.
    pub fn config(&self) -> &tokio_postgres::Config {
        &self.config
    }

    /// Return the live client, connecting (or reconnecting) first if needed.
    fn connected_client(&self) -> Result<Arc<tokio_postgres::Client>, DbeeError> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            if !client.is_closed() {
                return Ok(Arc::clone(client));
            }
            tracing::info!("PostgreSQL connection lost, reconnecting");
        }

        let (client, connection) = block_on(&self.runtime, self.config.connect(NoTls))?
            .map_err(|e| DbeeError::connection_with_source(format!("Failed to connect: {e}"), e))?;

        self.runtime.spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "PostgreSQL connection terminated");
            }
        });

        tracing::info!(hosts = ?self.config.get_hosts(), "PostgreSQL connection established");

        let client = Arc::new(client);
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }
}

impl Driver for PostgresDriver {
    fn acquire(&self) -> Result<Box<dyn Connection>, DbeeError> {
        let client = self.connected_client()?;
        Ok(Box::new(PostgresConnection { client, runtime: Arc::clone(&self.runtime) }))
    }

    fn close(&self) -> Result<(), DbeeError> {
        // Dropping the last client handle ends the connection task.
        if self.client.lock().take().is_some() {
            tracing::debug!("PostgreSQL connection closing");
        }
        Ok(())
    }
}

impl std::fmt::Debug for PostgresDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDriver")
            .field("hosts", &self.config.get_hosts())
            .field("dbname", &self.config.get_dbname())
            .field("connected", &self.client.lock().is_some())
            .finish()
    }
}

/// Run `future` on the driver runtime, refusing to nest inside another one.
fn block_on<F: Future>(runtime: &Runtime, future: F) -> Result<F::Output, DbeeError> {
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(DbeeError::internal(
            "PostgreSQL client used from inside an async runtime; call it from a blocking thread",
        ));
    }
    Ok(runtime.block_on(future))
}

struct PostgresConnection {
    client: Arc<tokio_postgres::Client>,
    runtime: Arc<Runtime>,
}

impl Connection for PostgresConnection {
    fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>, DbeeError> {
        let client = &self.client;
        let statement = block_on(&self.runtime, client.prepare(sql))??;
        let columns = statement.columns().iter().map(|c| c.name().to_string()).collect();

        let stream =
            block_on(&self.runtime, client.query_raw(&statement, std::iter::empty::<&dyn ToSql>()))??;
        let mut stream = Box::pin(stream);

        // Errors raised before the first row still count as a rejected statement.
        let pending = match block_on(&self.runtime, stream.next())? {
            Some(Ok(row)) => Some(convert_row(&row)?),
            Some(Err(e)) => return Err(DbeeError::from(e)),
            None => None,
        };

        Ok(Box::new(PostgresCursor {
            columns,
            pending,
            stream: Some(stream),
            runtime: Arc::clone(&self.runtime),
        }))
    }

    fn close(self: Box<Self>) -> Result<(), DbeeError> {
        Ok(())
    }
}

struct PostgresCursor {
    columns: Vec<String>,
    pending: Option<Row>,
    stream: Option<Pin<Box<RowStream>>>,
    runtime: Arc<Runtime>,
}

impl Cursor for PostgresCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, DbeeError> {
        if let Some(row) = self.pending.take() {
            return Ok(Some(row));
        }
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        match block_on(&self.runtime, stream.next())? {
            Some(Ok(row)) => convert_row(&row).map(Some),
            Some(Err(e)) => Err(DbeeError::row_with_source(e.to_string(), e)),
            None => {
                self.stream = None;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<(), DbeeError> {
        self.pending = None;
        self.stream = None;
        Ok(())
    }
}

/// A column decoded from its binary wire form.
///
/// Accepts every type: domains decode as their base type, enums as their
/// label, and types without a mapping (numeric, timestamps, arrays, ...)
/// keep their raw bytes.
struct Column(Value);

impl<'a> FromSql<'a> for Column {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        decode(ty, raw).map(Column)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn decode(ty: &Type, raw: &[u8]) -> Result<Value, Box<dyn std::error::Error + Sync + Send>> {
    match ty.kind() {
        Kind::Domain(base) => return decode(base, raw),
        Kind::Enum(_) => return Ok(Value::Text(String::from_utf8(raw.to_vec())?)),
        _ => {}
    }

    let value = match ty.name() {
        "bool" => Value::Bool(bool::from_sql(ty, raw)?),
        "int2" => Value::Int(i16::from_sql(ty, raw)?.into()),
        "int4" => Value::Int(i32::from_sql(ty, raw)?.into()),
        "int8" => Value::Int(i64::from_sql(ty, raw)?),
        "oid" => Value::Int(u32::from_sql(ty, raw)?.into()),
        "float4" => Value::Float(f32::from_sql(ty, raw)?.into()),
        "float8" => Value::Float(f64::from_sql(ty, raw)?),
        "text" | "varchar" | "bpchar" | "name" | "unknown" | "citext" | "json" | "xml" => {
            Value::Text(String::from_sql(ty, raw)?)
        }
        // Binary jsonb carries a one-byte format version ahead of the text.
        "jsonb" => match raw.split_first() {
            Some((&1, text)) => Value::Text(std::str::from_utf8(text)?.to_string()),
            _ => return Err(format!("unsupported jsonb encoding for {}", ty.name()).into()),
        },
        "uuid" => Value::Text(uuid::Uuid::from_slice(raw)?.to_string()),
        "bytea" => Value::Bytes(raw.to_vec()),
        _ => Value::Bytes(raw.to_vec()),
    };
    Ok(value)
}

fn convert_row(row: &tokio_postgres::Row) -> Result<Row, DbeeError> {
    (0..row.len())
        .map(|idx| convert_value(row, idx))
        .collect::<Result<Vec<_>, _>>()
        .map(Row::new)
}

fn convert_value(row: &tokio_postgres::Row, idx: usize) -> Result<Value, DbeeError> {
    let column: Option<Column> = row
        .try_get(idx)
        .map_err(|e| DbeeError::row_with_source(format!("column {idx}: {e}"), e))?;
    Ok(column.map_or(Value::Null, |c| c.0))
}
