//! Layout discovery.
//!
//! Groups the flat `(schema, name[, type])` rows of a dialect's layout query
//! into one schema-group node per schema, each carrying its tables and views
//! in the order the rows were read.

use std::collections::HashMap;

use crate::error::DbeeError;
use crate::models::{Dialect, LayoutKind, LayoutNode, Row};
use crate::services::stream::ResultStream;

/// Builds the layout tree for one dialect.
pub struct LayoutBuilder {
    dialect: Dialect,
    /// Leaves per schema key.
    children: HashMap<String, Vec<LayoutNode>>,
    /// Schema keys in first-seen order.
    schema_order: Vec<String>,
}

impl LayoutBuilder {
    /// Create an empty builder.
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect, children: HashMap::new(), schema_order: Vec::new() }
    }

    /// Drain `stream` and build the layout.
    ///
    /// On a row or schema error the stream is closed before the error is
    /// returned and nothing accumulated so far is kept.
    pub fn build(mut self, mut stream: ResultStream) -> Result<Vec<LayoutNode>, DbeeError> {
        loop {
            let row = match stream.next_row() {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(query_id = %stream.query_id(), error = %e, "Layout query failed mid-stream");
                    stream.close();
                    return Err(e);
                }
            };
            if let Err(e) = self.add_row(&row) {
                tracing::warn!(query_id = %stream.query_id(), error = %e, "Malformed layout row");
                stream.close();
                return Err(e);
            }
        }

        let dialect = self.dialect;
        let layout = self.finish();
        tracing::debug!(dialect = %dialect, schemas = layout.len(), "Layout built");
        Ok(layout)
    }

    /// Classify one metadata row and file it under its schema.
    pub fn add_row(&mut self, row: &Row) -> Result<(), DbeeError> {
        let schema = required_text(row, 0, "schema")?;
        let name = required_text(row, 1, "object name")?;

        let kind = if self.dialect.has_explicit_typing() {
            // Null or non-text types classify as untyped; only a missing column is malformed.
            match row.get(2) {
                Some(typ) => LayoutKind::from_object_type(typ.as_text().map_or("", str::trim)),
                None => {
                    return Err(DbeeError::schema(format!(
                        "column 2 missing from row of {} columns",
                        row.len()
                    )))
                }
            }
        } else {
            LayoutKind::Table
        };

        let leaf = LayoutNode::leaf(name, schema, self.dialect.name(), kind);
        match self.children.get_mut(schema) {
            Some(leaves) => leaves.push(leaf),
            None => {
                self.schema_order.push(schema.to_string());
                self.children.insert(schema.to_string(), vec![leaf]);
            }
        }
        Ok(())
    }

    /// Emit one schema group per distinct schema, in first-seen order.
    pub fn finish(mut self) -> Vec<LayoutNode> {
        let dialect = self.dialect.name();
        self.schema_order
            .into_iter()
            .map(|schema| {
                let children = self.children.remove(&schema).unwrap_or_default();
                LayoutNode::schema_group(schema, dialect, children)
            })
            .collect()
    }
}

/// Read a trimmed, non-blank text column.
fn required_text<'r>(row: &'r Row, index: usize, what: &str) -> Result<&'r str, DbeeError> {
    let value = row.text(index)?.trim();
    if value.is_empty() {
        return Err(DbeeError::schema(format!("blank {what} in column {index}")));
    }
    Ok(value)
}
