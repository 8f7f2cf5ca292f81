//! SQLite driver built on rusqlite.
//!
//! rusqlite rows borrow their statement, so each cursor reads on a worker
//! thread that owns the statement and sends rows over a bounded channel.
//! Closing the cursor drops the receiver, which stops the worker at its next
//! send, and then joins it.

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::DbeeError;
use crate::models::{ClientOptions, Dialect, Row, Value};
use crate::services::client::Client;
use crate::services::driver::{Connection, Cursor, Driver};

type SharedConnection = Arc<Mutex<rusqlite::Connection>>;

/// Open a SQLite client. The database file is not touched until the first
/// query.
pub fn open(url: &str, options: &ClientOptions) -> Result<Client, DbeeError> {
    Ok(Client::new(SqliteDriver::new(url, options)?, Dialect::SQLITE))
}

/// Driver for a single SQLite database.
pub struct SqliteDriver {
    path: String,
    row_buffer: usize,
    handle: Mutex<Option<SharedConnection>>,
}

impl SqliteDriver {
    /// Parse the URL. Accepted forms are `sqlite://path`, `sqlite:path`,
    /// `file:` URIs, a bare path and `:memory:`.
    pub fn new(url: &str, options: &ClientOptions) -> Result<Self, DbeeError> {
        options.validate()?;
        let path = parse_url(url)?;
        tracing::debug!(path = %path, "SQLite driver initialized");
        Ok(Self { path, row_buffer: options.row_buffer, handle: Mutex::new(None) })
    }

    /// Path (or URI) handed to SQLite.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn connection(&self) -> Result<SharedConnection, DbeeError> {
        let mut handle = self.handle.lock();
        if let Some(conn) = handle.as_ref() {
            return Ok(Arc::clone(conn));
        }

        let conn = rusqlite::Connection::open(&self.path).map_err(|e| {
            DbeeError::connection_with_source(format!("Failed to open database '{}': {e}", self.path), e)
        })?;
        tracing::info!(path = %self.path, "SQLite database opened");

        let conn = Arc::new(Mutex::new(conn));
        *handle = Some(Arc::clone(&conn));
        Ok(conn)
    }
}

impl Driver for SqliteDriver {
    fn acquire(&self) -> Result<Box<dyn Connection>, DbeeError> {
        let conn = self.connection()?;
        Ok(Box::new(SqliteConnection { conn, row_buffer: self.row_buffer }))
    }

    fn close(&self) -> Result<(), DbeeError> {
        let Some(conn) = self.handle.lock().take() else {
            return Ok(());
        };

        match Arc::try_unwrap(conn) {
            Ok(conn) => conn.into_inner().close().map_err(|(_, e)| {
                DbeeError::connection_with_source(format!("Failed to close database '{}'", self.path), e)
            }),
            Err(_) => {
                // An open result stream still reads from it.
                tracing::debug!(path = %self.path, "SQLite database closes after its last stream");
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for SqliteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDriver")
            .field("path", &self.path)
            .field("row_buffer", &self.row_buffer)
            .field("open", &self.handle.lock().is_some())
            .finish()
    }
}

fn parse_url(url: &str) -> Result<String, DbeeError> {
    let url = url.trim();
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);

    if path.is_empty() {
        return Err(DbeeError::config(format!("SQLite url '{url}' has no database path")));
    }
    Ok(path.to_string())
}

struct SqliteConnection {
    conn: SharedConnection,
    row_buffer: usize,
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>, DbeeError> {
        let (header_tx, header_rx) = mpsc::sync_channel(1);
        let (row_tx, row_rx) = mpsc::sync_channel(self.row_buffer);
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();

        let worker = std::thread::Builder::new()
            .name("dbee-sqlite-cursor".to_string())
            .spawn(move || stream_rows(&conn, &sql, header_tx, row_tx))
            .map_err(|e| DbeeError::internal(format!("Failed to spawn cursor thread: {e}")))?;

        match header_rx.recv() {
            Ok(Ok(columns)) => Ok(Box::new(SqliteCursor { columns, rows: Some(row_rx), worker: Some(worker) })),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(DbeeError::internal("SQLite cursor thread exited before executing"))
            }
        }
    }

    fn close(self: Box<Self>) -> Result<(), DbeeError> {
        Ok(())
    }
}

/// Worker body: prepare, step once, report the header, then stream the rest.
///
/// Failures up to the first step are query errors; later ones are row errors.
fn stream_rows(
    conn: &SharedConnection,
    sql: &str,
    header_tx: SyncSender<Result<Vec<String>, DbeeError>>,
    row_tx: SyncSender<Result<Row, DbeeError>>,
) {
    let conn = conn.lock();
    let mut stmt = match conn.prepare(sql) {
        Ok(stmt) => stmt,
        Err(e) => {
            let _ = header_tx.send(Err(query_error(e)));
            return;
        }
    };

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = match stmt.query([]) {
        Ok(rows) => rows,
        Err(e) => {
            let _ = header_tx.send(Err(query_error(e)));
            return;
        }
    };

    let first = match rows.next() {
        Ok(first) => first.map(|row| convert_row(row, width)),
        Err(e) => {
            let _ = header_tx.send(Err(query_error(e)));
            return;
        }
    };
    if header_tx.send(Ok(columns)).is_err() {
        return;
    }
    if let Some(row) = first {
        if row_tx.send(row).is_err() {
            return;
        }
    }

    loop {
        let next = match rows.next() {
            Ok(Some(row)) => convert_row(row, width),
            Ok(None) => return,
            Err(e) => Err(DbeeError::row_with_source(e.to_string(), e)),
        };
        let failed = next.is_err();
        // A send error means the cursor was closed.
        if row_tx.send(next).is_err() || failed {
            return;
        }
    }
}

fn query_error(err: rusqlite::Error) -> DbeeError {
    match &err {
        rusqlite::Error::SqliteFailure(code, message) => DbeeError::query_with_details(
            message.clone().unwrap_or_else(|| code.to_string()),
            None,
            None,
            None,
            Some(code.extended_code.to_string()),
        ),
        _ => DbeeError::query(err.to_string()),
    }
}

fn convert_row(row: &rusqlite::Row<'_>, width: usize) -> Result<Row, DbeeError> {
    let mut values = Vec::with_capacity(width);
    for idx in 0..width {
        let value = row
            .get_ref(idx)
            .map_err(|e| DbeeError::row_with_source(format!("column {idx}: {e}"), e))?;
        values.push(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Int(i),
            ValueRef::Real(f) => Value::Float(f),
            ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
        });
    }
    Ok(Row::new(values))
}

struct SqliteCursor {
    columns: Vec<String>,
    rows: Option<Receiver<Result<Row, DbeeError>>>,
    worker: Option<JoinHandle<()>>,
}

impl SqliteCursor {
    fn join_worker(&mut self) -> Result<(), DbeeError> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| DbeeError::row("SQLite cursor thread panicked")),
            None => Ok(()),
        }
    }
}

impl Cursor for SqliteCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, DbeeError> {
        let Some(rows) = self.rows.as_ref() else {
            return Ok(None);
        };
        match rows.recv() {
            Ok(row) => row.map(Some),
            Err(_) => {
                // The worker hung up: the result is done, unless it panicked.
                self.rows = None;
                self.join_worker()?;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<(), DbeeError> {
        self.rows = None;
        self.join_worker()
    }
}

impl Drop for SqliteCursor {
    fn drop(&mut self) {
        self.rows = None;
        let _ = self.join_worker();
    }
}
