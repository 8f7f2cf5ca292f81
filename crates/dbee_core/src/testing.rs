//! Scripted driver used by the unit tests.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::DbeeError;
use crate::models::{Row, Value};
use crate::services::driver::{Connection, Cursor, Driver};
use crate::services::stream::ReleaseCallback;

/// A release callback that counts how often it fired.
pub fn counting_callback() -> (ReleaseCallback, Arc<AtomicUsize>) {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let callback: ReleaseCallback = Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (callback, fired)
}

/// Build a row of text values.
pub fn text_row(values: &[&str]) -> Row {
    Row::new(values.iter().map(|v| Value::from(*v)).collect())
}

/// Cursor replaying a fixed list of rows.
pub struct ScriptedCursor {
    columns: Vec<String>,
    rows: VecDeque<Row>,
    fail_after: Option<usize>,
    delivered: usize,
    closed: Arc<AtomicBool>,
}

impl ScriptedCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            columns: Vec::new(),
            rows: rows.into(),
            fail_after: None,
            delivered: 0,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Fail with a row error once `n` rows were delivered.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn closed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.closed)
    }
}

impl Cursor for ScriptedCursor {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>, DbeeError> {
        if self.fail_after == Some(self.delivered) {
            return Err(DbeeError::row("scripted cursor failure"));
        }
        let row = self.rows.pop_front();
        if row.is_some() {
            self.delivered += 1;
        }
        Ok(row)
    }

    fn close(&mut self) -> Result<(), DbeeError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// What a scripted statement does when executed.
#[derive(Clone)]
pub enum Script {
    Rows(Vec<Row>),
    RowsThenError(Vec<Row>),
    Reject(String),
}

/// Counters shared between a [`ScriptedDriver`] and the test observing it.
#[derive(Debug, Default)]
pub struct DriverStats {
    pub acquired: AtomicUsize,
    pub released: AtomicUsize,
    pub executed: AtomicUsize,
    pub driver_closed: AtomicUsize,
}

impl DriverStats {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    pub fn driver_closed(&self) -> usize {
        self.driver_closed.load(Ordering::SeqCst)
    }
}

/// In-memory driver answering statements from a script.
pub struct ScriptedDriver {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    stats: Arc<DriverStats>,
    refuse_acquire: bool,
    fail_release: bool,
    fail_close: bool,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(DriverStats::default()),
            refuse_acquire: false,
            fail_release: false,
            fail_close: false,
        }
    }

    pub fn on(self, sql: &str, script: Script) -> Self {
        self.scripts.lock().insert(sql.trim().to_string(), script);
        self
    }

    pub fn refusing_acquire(mut self) -> Self {
        self.refuse_acquire = true;
        self
    }

    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn stats(&self) -> Arc<DriverStats> {
        Arc::clone(&self.stats)
    }
}

impl Driver for ScriptedDriver {
    fn acquire(&self) -> Result<Box<dyn Connection>, DbeeError> {
        if self.refuse_acquire {
            return Err(DbeeError::connection("scripted driver refused"));
        }
        self.stats.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            scripts: Arc::clone(&self.scripts),
            stats: Arc::clone(&self.stats),
            fail_release: self.fail_release,
        }))
    }

    fn close(&self) -> Result<(), DbeeError> {
        self.stats.driver_closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(DbeeError::connection("scripted close failure"));
        }
        Ok(())
    }
}

struct ScriptedConnection {
    scripts: Arc<Mutex<HashMap<String, Script>>>,
    stats: Arc<DriverStats>,
    fail_release: bool,
}

impl Connection for ScriptedConnection {
    fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>, DbeeError> {
        self.stats.executed.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().get(sql.trim()).cloned();
        match script {
            Some(Script::Rows(rows)) => Ok(Box::new(ScriptedCursor::new(rows))),
            Some(Script::RowsThenError(rows)) => {
                let n = rows.len();
                Ok(Box::new(ScriptedCursor::new(rows).failing_after(n)))
            }
            Some(Script::Reject(message)) => Err(DbeeError::query(message)),
            None => Err(DbeeError::query(format!("no script for: {}", sql.trim()))),
        }
    }

    fn close(self: Box<Self>) -> Result<(), DbeeError> {
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        if self.fail_release {
            return Err(DbeeError::connection("scripted release failure"));
        }
        Ok(())
    }
}
