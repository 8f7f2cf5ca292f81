//! Error types for the dbee core.
//!
//! The taxonomy follows the lifecycle of a request: configuration, connection
//! acquisition, statement execution, row reading and layout interpretation.

use thiserror::Error;

/// Boxed error source carried by several variants.
type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for the dbee core.
#[derive(Debug, Error)]
pub enum DbeeError {
    /// Malformed connection URL, unusable options or an unreadable source file.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<BoxedSource>,
    },

    /// The driver could not open or hand out the connection.
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<BoxedSource>,
    },

    /// The data source rejected the statement.
    #[error("{message}")]
    Query {
        /// Server error message.
        message: String,
        /// Additional detail reported by the server.
        detail: Option<String>,
        /// Server hint.
        hint: Option<String>,
        /// Position in query (1-indexed).
        position: Option<usize>,
        /// Server error code (e.g., "42P01").
        code: Option<String>,
    },

    /// Reading a row from an open cursor failed.
    #[error("Row error: {message}")]
    Row {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<BoxedSource>,
    },

    /// A metadata row did not have the expected shape.
    #[error("Schema error: {message}")]
    Schema {
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<BoxedSource>,
    },
}

impl DbeeError {
    // ========== Constructors ==========

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a new config error with source.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a new connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Create a new connection error with source.
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a query error carrying only a message.
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query { message: message.into(), detail: None, hint: None, position: None, code: None }
    }

    /// Create a query error with full server details.
    pub fn query_with_details(
        message: impl Into<String>,
        detail: Option<String>,
        hint: Option<String>,
        position: Option<usize>,
        code: Option<String>,
    ) -> Self {
        Self::Query { message: message.into(), detail, hint, position, code }
    }

    /// Create a new row error.
    pub fn row(message: impl Into<String>) -> Self {
        Self::Row { message: message.into(), source: None }
    }

    /// Create a new row error with source.
    pub fn row_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Row { message: message.into(), source: Some(Box::new(source)) }
    }

    /// Create a new schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema { message: message.into() }
    }

    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    // ========== Methods ==========

    /// Check if this is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Check if this is a connection error.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if the data source rejected the statement.
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }

    /// Check if this is a row read error.
    pub fn is_row(&self) -> bool {
        matches!(self, Self::Row { .. })
    }

    /// Check if this is a metadata shape error.
    pub fn is_schema(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "Config",
            Self::Connection { .. } => "Connection",
            Self::Query { .. } => "Query",
            Self::Row { .. } => "Row",
            Self::Schema { .. } => "Schema",
            Self::Internal { .. } => "Internal",
        }
    }

    /// Get actionable hint for the user.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Config { .. } => Some("Check the connection URL and source definition"),
            Self::Connection { .. } => Some("Check that the database server is running"),
            Self::Query { hint, .. } => hint.as_deref(),
            Self::Row { .. } => Some("Close the result and run the query again"),
            Self::Schema { .. } => None,
            Self::Internal { .. } => Some("Please report this issue"),
        }
    }

    /// Get the server error code (if applicable).
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Query { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Convert to host-displayable error info.
    pub fn to_error_info(&self) -> ErrorInfo {
        let error_type = format!("{} Error", self.category());
        let message = self.to_string();
        let hint = self.hint().map(String::from);

        let technical_detail = match self {
            Self::Query { detail, code, position, .. } => {
                let mut parts = Vec::new();
                if let Some(code) = code {
                    parts.push(format!("Code: {code}"));
                }
                if let Some(pos) = position {
                    parts.push(format!("Position: {pos}"));
                }
                if let Some(detail) = detail {
                    parts.push(format!("Detail: {detail}"));
                }
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("\n"))
                }
            }
            _ => None,
        };

        ErrorInfo { error_type, message, hint, technical_detail }
    }
}

/// Host-displayable error information.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Category name (e.g., "Connection Error").
    pub error_type: String,
    /// User-friendly message.
    pub message: String,
    /// Actionable suggestion.
    pub hint: Option<String>,
    /// Technical detail for an expanded view.
    pub technical_detail: Option<String>,
}

// ========== Error Conversions ==========

/// Convert from tokio_postgres::Error to DbeeError.
impl From<tokio_postgres::Error> for DbeeError {
    fn from(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let message = db_err.message().to_string();
            let code_str = db_err.code().code();

            // Connection exceptions (08xxx)
            if code_str.starts_with("08") {
                return DbeeError::Connection { message, source: Some(Box::new(err)) };
            }

            let position = db_err.position().and_then(|p| match p {
                tokio_postgres::error::ErrorPosition::Original(pos) => Some(*pos as usize),
                tokio_postgres::error::ErrorPosition::Internal { .. } => None,
            });
            return DbeeError::Query {
                message,
                detail: db_err.detail().map(String::from),
                hint: db_err.hint().map(String::from),
                position,
                code: Some(code_str.to_string()),
            };
        }

        if err.is_closed() {
            return DbeeError::Connection {
                message: "Connection closed".to_string(),
                source: Some(Box::new(err)),
            };
        }

        DbeeError::Connection { message: err.to_string(), source: Some(Box::new(err)) }
    }
}

/// Convert from std::io::Error to DbeeError.
impl From<std::io::Error> for DbeeError {
    fn from(err: std::io::Error) -> Self {
        DbeeError::Config { message: err.to_string(), source: Some(Box::new(err)) }
    }
}

/// Convert from serde_json::Error to DbeeError.
impl From<serde_json::Error> for DbeeError {
    fn from(err: serde_json::Error) -> Self {
        DbeeError::Config { message: format!("JSON error: {err}"), source: Some(Box::new(err)) }
    }
}
