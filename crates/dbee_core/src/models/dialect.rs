//! Dialects: how a client type discovers and classifies its layout.

/// Whether a dialect's layout query reports the kind of each object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectTyping {
    /// A third column carries `TABLE` or `VIEW`.
    Explicit,
    /// Only schema and object name are reported; every object is a table.
    Implicit,
}

/// A named variant of metadata-query behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    name: &'static str,
    typing: ObjectTyping,
    layout_query: &'static str,
}

impl Dialect {
    /// PostgreSQL: tables and views from `information_schema`, plus
    /// materialized views. Object kind is not reported.
    pub const POSTGRES: Dialect = Dialect::new(
        "postgres",
        ObjectTyping::Implicit,
        r#"
        SELECT table_schema, table_name
        FROM information_schema.tables
        UNION ALL
        SELECT schemaname, matviewname
        FROM pg_matviews
        "#,
    );

    /// Redshift: postgres wire protocol, but catalog names come back padded
    /// and views must be told apart through `relkind`.
    pub const REDSHIFT: Dialect = Dialect::new(
        "redshift",
        ObjectTyping::Explicit,
        r#"
        SELECT
            trim(n.nspname) AS schema_name,
            trim(c.relname) AS table_name,
            CASE
                WHEN c.relkind = 'v' THEN 'VIEW'
                ELSE 'TABLE'
            END AS table_type
        FROM pg_class AS c
        JOIN pg_namespace AS n ON c.relnamespace = n.oid
        WHERE n.nspname NOT IN ('information_schema', 'pg_catalog')
        "#,
    );

    /// SQLite: a single `main` schema, object kind from `sqlite_master`.
    pub const SQLITE: Dialect = Dialect::new(
        "sqlite",
        ObjectTyping::Explicit,
        r#"
        SELECT 'main' AS schema_name, name AS table_name, upper(type) AS table_type
        FROM sqlite_master
        WHERE type IN ('table', 'view')
          AND substr(name, 1, 7) <> 'sqlite_'
        "#,
    );

    /// Declare a dialect.
    pub const fn new(name: &'static str, typing: ObjectTyping, layout_query: &'static str) -> Self {
        Self { name, typing, layout_query }
    }

    /// Identifier embedded in every layout node.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// How objects are classified.
    pub fn typing(&self) -> ObjectTyping {
        self.typing
    }

    /// Whether rows carry an explicit object-type column.
    pub fn has_explicit_typing(&self) -> bool {
        self.typing == ObjectTyping::Explicit
    }

    /// Read-only query returning `(schema, name[, type])` rows.
    pub fn layout_query(&self) -> &'static str {
        self.layout_query
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}
