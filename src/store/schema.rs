use std::fmt::{Display, Formatter};

use chrono::NaiveDate;
use rusqlite::types::{Value, ValueRef};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Real,
    Date,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            Self::Text | Self::Date => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
        }
    }

    pub fn parse_value(&self, raw: &str) -> Result<Value, ValueError> {
        if raw.is_empty() {
            return Ok(Value::Null);
        }
        let trimmed = raw.trim();
        match self {
            Self::Text => Ok(Value::Text(raw.to_string())),
            Self::Integer => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| ValueError::new(*self, raw)),
            Self::Real => trimmed
                .parse::<f64>()
                .map(Value::Real)
                .map_err(|_| ValueError::new(*self, raw)),
            Self::Date => parse_date(trimmed)
                .map(|d| Value::Text(d.format(DATE_FORMAT).to_string())),
        }
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Date => "date",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("cannot read {raw:?} as {expected}")]
pub struct ValueError {
    pub expected: ColumnType,
    pub raw: String,
}

impl ValueError {
    pub(crate) fn new(expected: ColumnType, raw: &str) -> Self {
        Self {
            expected,
            raw: raw.to_string(),
        }
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ValueError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| ValueError::new(ColumnType::Date, raw))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn qualified(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// Renders a stored value the way it is written to flat files. NULL is empty.
pub fn value_to_string(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(format!("{f:?}")),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::types::{Value, ValueRef};

    use super::{qualified, quote_ident, value_to_string, ColumnType};

    #[test]
    fn parses_typed_values_and_treats_empty_as_null() {
        assert_eq!(ColumnType::Integer.parse_value("42").unwrap(), Value::Integer(42));
        assert_eq!(ColumnType::Real.parse_value("1.5").unwrap(), Value::Real(1.5));
        assert_eq!(ColumnType::Integer.parse_value("").unwrap(), Value::Null);
        assert_eq!(
            ColumnType::Date.parse_value("2021-01-02").unwrap(),
            Value::Text("2021-01-02".to_string())
        );
        assert!(ColumnType::Integer.parse_value("12a").is_err());
        assert!(ColumnType::Date.parse_value("01/02/2021").is_err());
    }

    #[test]
    fn quotes_identifiers() {
        assert_eq!(quote_ident("cases"), "\"cases\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified("nytimes", "t"), "\"nytimes\".\"t\"");
    }

    #[test]
    fn renders_stored_values() {
        assert_eq!(value_to_string(ValueRef::Null), None);
        assert_eq!(value_to_string(ValueRef::Integer(7)).as_deref(), Some("7"));
        assert_eq!(value_to_string(ValueRef::Real(1.0)).as_deref(), Some("1.0"));
        assert_eq!(value_to_string(ValueRef::Real(0.25)).as_deref(), Some("0.25"));
        assert_eq!(value_to_string(ValueRef::Text(b"CA".as_slice())).as_deref(), Some("CA"));
    }
}
