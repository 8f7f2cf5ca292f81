//! The narrow contract between the core and an underlying database driver.
//!
//! A [`Driver`] owns the data-source handle and hands out the logical
//! [`Connection`]. Executing a statement on the connection yields a
//! [`Cursor`] that owns whatever it needs to keep reading, so the connection
//! can be released independently once the cursor is done.

use crate::error::DbeeError;
use crate::models::Row;

/// Owner of the underlying data-source handle.
pub trait Driver: Send + Sync {
    /// Acquire the logical connection.
    ///
    /// Drivers that defer connecting do so here; failures are
    /// [`DbeeError::Connection`].
    fn acquire(&self) -> Result<Box<dyn Connection>, DbeeError>;

    /// Tear down the data-source handle.
    fn close(&self) -> Result<(), DbeeError>;
}

/// An acquired connection.
pub trait Connection: Send {
    /// Execute a statement, returning a cursor over its rows.
    ///
    /// A statement the data source rejects is a [`DbeeError::Query`].
    fn execute(&mut self, sql: &str) -> Result<Box<dyn Cursor>, DbeeError>;

    /// Return the connection to the driver.
    fn close(self: Box<Self>) -> Result<(), DbeeError>;
}

/// A forward-only row cursor.
pub trait Cursor: Send {
    /// Column names of the result.
    fn columns(&self) -> &[String];

    /// Read the next row; `Ok(None)` at the end.
    fn next_row(&mut self) -> Result<Option<Row>, DbeeError>;

    /// Stop reading and free the cursor's resources.
    fn close(&mut self) -> Result<(), DbeeError>;
}
