//! Data models for the dbee core.
//!
//! - `connection` - SourceConfig, ClientOptions, source file loading
//! - `dialect` - Dialect, ObjectTyping
//! - `layout` - LayoutNode, LayoutKind
//! - `value` - Value, Row

pub mod connection;
pub mod dialect;
pub mod layout;
pub mod value;

pub use connection::{load_sources, save_sources, ClientOptions, SourceConfig};
pub use dialect::{Dialect, ObjectTyping};
pub use layout::{LayoutKind, LayoutNode};
pub use value::{Row, Value};
