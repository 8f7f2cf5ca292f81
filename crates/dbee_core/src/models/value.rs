//! Column values and rows as produced by a result stream.

use serde::{Deserialize, Serialize};

use crate::error::DbeeError;

/// A single dynamically-typed column value.
///
/// Drivers convert their native representation into one of these variants;
/// consumers read them back through the fallible accessors on [`Row`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Any integer type, widened to 64 bits.
    Int(i64),
    /// Any floating point type, widened to 64 bits.
    Float(f64),
    /// Text value.
    Text(String),
    /// Binary value, or the raw encoding of a type the driver does not decode.
    Bytes(Vec<u8>),
}

impl Value {
    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
        }
    }

    /// Check for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the text payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer payload, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// An ordered tuple of column values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a row from its column values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the value at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Iterate over the column values.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.values.iter()
    }

    /// Read column `index` as text.
    ///
    /// Fails with [`DbeeError::Schema`] if the column is absent or holds
    /// anything other than text.
    pub fn text(&self, index: usize) -> Result<&str, DbeeError> {
        match self.values.get(index) {
            Some(Value::Text(s)) => Ok(s),
            Some(other) => Err(DbeeError::schema(format!(
                "column {index} must be text, got {}",
                other.type_name()
            ))),
            None => Err(DbeeError::schema(format!(
                "column {index} missing from row of {} columns",
                self.values.len()
            ))),
        }
    }

    /// Consume the row, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_accessor() {
        let row = Row::new(vec![Value::from("public"), Value::Int(7), Value::Null]);

        assert_eq!(row.text(0).unwrap(), "public");

        let err = row.text(1).unwrap_err();
        assert!(err.is_schema());
        assert!(err.to_string().contains("got int"));

        assert!(row.text(2).unwrap_err().is_schema());

        let err = row.text(3).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(Value::from(Some(3_i64)), Value::Int(3));
    }

    #[test]
    fn test_row_serializes_as_array() {
        let row = Row::new(vec![
            Value::from("a"),
            Value::Int(1),
            Value::Float(1.5),
            Value::Bool(true),
            Value::Null,
        ]);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"["a",1,1.5,true,null]"#);
    }
}
