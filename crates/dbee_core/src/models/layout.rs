//! Layout models.
//!
//! The discovered structure of a data source: schema groups at the root, each
//! carrying the tables and views that belong to it.

use serde::{Deserialize, Serialize};

/// Kind of a layout node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    /// Root-level grouping of objects sharing a schema.
    SchemaGroup,
    /// A table.
    Table,
    /// A view.
    View,
    /// An object whose reported type is neither table nor view.
    Untyped,
}

impl LayoutKind {
    /// Classify an explicit object-type value.
    pub fn from_object_type(typ: &str) -> Self {
        match typ {
            "TABLE" => Self::Table,
            "VIEW" => Self::View,
            _ => Self::Untyped,
        }
    }

    /// Check if this kind is a leaf (anything but a schema group).
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Self::SchemaGroup)
    }
}

/// One entry in the discovered schema/table/view hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutNode {
    /// Object or schema name.
    pub name: String,
    /// Parent schema; `None` for schema groups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Dialect that produced this node.
    pub dialect: String,
    /// Node kind.
    pub kind: LayoutKind,
    /// Child nodes; only schema groups have any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    /// Create a leaf node for an object inside `schema`.
    pub fn leaf(
        name: impl Into<String>,
        schema: impl Into<String>,
        dialect: impl Into<String>,
        kind: LayoutKind,
    ) -> Self {
        Self {
            name: name.into(),
            schema: Some(schema.into()),
            dialect: dialect.into(),
            kind,
            children: Vec::new(),
        }
    }

    /// Create a schema group holding `children`.
    pub fn schema_group(
        name: impl Into<String>,
        dialect: impl Into<String>,
        children: Vec<LayoutNode>,
    ) -> Self {
        Self {
            name: name.into(),
            schema: None,
            dialect: dialect.into(),
            kind: LayoutKind::SchemaGroup,
            children,
        }
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&LayoutNode> {
        self.children.iter().find(|c| c.name == name)
    }
}
