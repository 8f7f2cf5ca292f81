//! Lazily consumed query results.
//!
//! A [`ResultStream`] wraps a driver cursor and the release callback that
//! hands the connection back. The callback fires exactly once: on the first
//! end-of-rows signal, on [`ResultStream::close`], or when the stream is
//! dropped, whichever comes first.

use uuid::Uuid;

use crate::error::DbeeError;
use crate::models::Row;
use crate::services::driver::Cursor;

/// Action returning the stream's connection to the available state.
pub type ReleaseCallback = Box<dyn FnOnce() + Send + 'static>;

/// An in-flight query result.
pub struct ResultStream {
    /// Identifier used in log fields.
    query_id: Uuid,
    /// Column names captured at execution time.
    columns: Vec<String>,
    /// Underlying cursor; `None` once released.
    cursor: Option<Box<dyn Cursor>>,
    /// Fires once on release.
    on_release: Option<ReleaseCallback>,
    /// Rows handed to the consumer so far.
    rows_read: usize,
    closed: bool,
}

impl ResultStream {
    /// Wrap a freshly executed cursor.
    pub fn new(cursor: Box<dyn Cursor>) -> Self {
        let columns = cursor.columns().to_vec();
        Self {
            query_id: Uuid::new_v4(),
            columns,
            cursor: Some(cursor),
            on_release: None,
            rows_read: 0,
            closed: false,
        }
    }

    /// Assign the release callback.
    ///
    /// A stream that is already closed runs the callback immediately, so the
    /// connection it guards is never stranded.
    pub fn set_callback(&mut self, callback: ReleaseCallback) {
        if self.closed {
            callback();
            return;
        }
        if self.on_release.replace(callback).is_some() {
            tracing::warn!(query_id = %self.query_id, "Release callback replaced before firing");
        }
    }

    /// Builder form of [`ResultStream::set_callback`].
    pub fn with_callback(mut self, callback: ReleaseCallback) -> Self {
        self.set_callback(callback);
        self
    }

    /// Identifier of this query.
    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    /// Column names of the result.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows read so far.
    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    /// Check if the stream has been released.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read the next row.
    ///
    /// `Ok(None)` is the end signal. The first one releases the stream; any
    /// later call returns `Ok(None)` again without side effects. A cursor
    /// error is returned as-is and leaves the stream open: call
    /// [`ResultStream::close`] to release it.
    pub fn next_row(&mut self) -> Result<Option<Row>, DbeeError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        match cursor.next_row()? {
            Some(row) => {
                self.rows_read += 1;
                Ok(Some(row))
            }
            None => {
                tracing::debug!(query_id = %self.query_id, rows = self.rows_read, "Result stream exhausted");
                self.release();
                Ok(None)
            }
        }
    }

    /// Release the stream early. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            tracing::debug!(query_id = %self.query_id, rows = self.rows_read, "Result stream closed early");
        }
        self.release();
    }

    fn release(&mut self) {
        if self.closed {
            return;
        }
        if let Some(mut cursor) = self.cursor.take() {
            if let Err(e) = cursor.close() {
                tracing::warn!(query_id = %self.query_id, error = %e, "Failed to close cursor");
            }
        }
        if let Some(callback) = self.on_release.take() {
            callback();
        }
        self.closed = true;
    }
}

impl Iterator for ResultStream {
    type Item = Result<Row, DbeeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl Drop for ResultStream {
    fn drop(&mut self) {
        if !self.closed {
            tracing::debug!(query_id = %self.query_id, "Result stream dropped while open");
            self.release();
        }
    }
}

impl std::fmt::Debug for ResultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultStream")
            .field("query_id", &self.query_id)
            .field("columns", &self.columns)
            .field("rows_read", &self.rows_read)
            .field("closed", &self.closed)
            .finish()
    }
}
