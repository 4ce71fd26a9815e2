//! Target schema types: catalog column specs and the SQL types they declare.

use crate::error::{Result, TermError};
use arrow::datatypes::{DataType, TimeUnit};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Base types treated as free text. Columns of these types get no dtype rule.
pub const STRING_FAMILY: [&str; 3] = ["string", "varchar", "char"];

/// Precision used for `decimal` declared without parameters.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 10;

/// Largest precision that fits in a 128-bit decimal.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// A SQL type the engine can validate against and cast to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    /// `string`, `varchar(n)`, `char(n)`
    Text,
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal { precision: u8, scale: u8 },
    Date,
    Timestamp,
}

impl SqlType {
    /// Parses a declared type descriptor such as `int`, `decimal(10,2)` or `varchar(50)`.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace. Returns
    /// `None` for descriptors the engine does not support (complex types,
    /// malformed parameters).
    pub fn parse(declared: &str) -> Option<Self> {
        let declared = declared.trim().to_ascii_lowercase();
        let (base, params) = match declared.find('(') {
            Some(open) => {
                let close = declared.rfind(')')?;
                if close < open || !declared[close + 1..].trim().is_empty() {
                    return None;
                }
                (declared[..open].trim(), Some(&declared[open + 1..close]))
            }
            None => (declared.as_str(), None),
        };

        let params: Vec<&str> = params
            .map(|p| p.split(',').map(str::trim).collect())
            .unwrap_or_default();

        let ty = match base {
            "string" | "varchar" | "char" => SqlType::Text,
            "boolean" | "bool" => SqlType::Boolean,
            "tinyint" | "byte" => SqlType::TinyInt,
            "smallint" | "short" => SqlType::SmallInt,
            "int" | "integer" => SqlType::Int,
            "bigint" | "long" => SqlType::BigInt,
            "float" | "real" => SqlType::Float,
            "double" => SqlType::Double,
            "decimal" | "dec" | "numeric" => {
                let precision = match params.first() {
                    Some(p) => p.parse::<u8>().ok()?,
                    None => DEFAULT_DECIMAL_PRECISION,
                };
                let scale = match params.get(1) {
                    Some(s) => s.parse::<u8>().ok()?,
                    None => 0,
                };
                if params.len() > 2
                    || precision == 0
                    || precision > MAX_DECIMAL_PRECISION
                    || scale > precision
                {
                    return None;
                }
                return Some(SqlType::Decimal { precision, scale });
            }
            "date" => SqlType::Date,
            "timestamp" => SqlType::Timestamp,
            _ => return None,
        };

        // Only decimal and the string family take parameters.
        if !params.is_empty() && !matches!(base, "varchar" | "char" | "string") {
            return None;
        }
        Some(ty)
    }

    /// Returns true if values of this type are stored as text.
    pub fn is_text(&self) -> bool {
        matches!(self, SqlType::Text)
    }

    /// The Arrow type used for this column in columnar output.
    pub fn arrow_type(&self) -> DataType {
        match self {
            SqlType::Text => DataType::Utf8,
            SqlType::Boolean => DataType::Boolean,
            SqlType::TinyInt => DataType::Int8,
            SqlType::SmallInt => DataType::Int16,
            SqlType::Int => DataType::Int32,
            SqlType::BigInt => DataType::Int64,
            SqlType::Float => DataType::Float32,
            SqlType::Double => DataType::Float64,
            SqlType::Decimal { precision, scale } => DataType::Decimal128(*precision, *scale as i8),
            SqlType::Date => DataType::Date32,
            SqlType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }

    /// Inclusive integer range for the integral types.
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        match self {
            SqlType::TinyInt => Some((i8::MIN as i64, i8::MAX as i64)),
            SqlType::SmallInt => Some((i16::MIN as i64, i16::MAX as i64)),
            SqlType::Int => Some((i32::MIN as i64, i32::MAX as i64)),
            SqlType::BigInt => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Text => write!(f, "string"),
            SqlType::Boolean => write!(f, "boolean"),
            SqlType::TinyInt => write!(f, "tinyint"),
            SqlType::SmallInt => write!(f, "smallint"),
            SqlType::Int => write!(f, "int"),
            SqlType::BigInt => write!(f, "bigint"),
            SqlType::Float => write!(f, "float"),
            SqlType::Double => write!(f, "double"),
            SqlType::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            SqlType::Date => write!(f, "date"),
            SqlType::Timestamp => write!(f, "timestamp"),
        }
    }
}

/// Lowercased text of a declared type before any parenthesis.
pub fn base_type(declared: &str) -> String {
    let lower = declared.trim().to_ascii_lowercase();
    match lower.split_once('(') {
        Some((base, _)) => base.trim().to_string(),
        None => lower,
    }
}

/// A column of the target schema as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub declared_type: String,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }

    /// See [`base_type`].
    pub fn base_type(&self) -> String {
        base_type(&self.declared_type)
    }

    /// True for blank declared types and the `string`/`varchar`/`char` family.
    pub fn is_free_text(&self) -> bool {
        self.declared_type.trim().is_empty() || STRING_FAMILY.contains(&self.base_type().as_str())
    }

    /// True when the declared type is exactly `date` (case-insensitive).
    pub fn is_date(&self) -> bool {
        self.declared_type.trim().eq_ignore_ascii_case("date")
    }

    /// Resolves the declared type, treating a blank declaration as text.
    pub fn sql_type(&self) -> Result<SqlType> {
        if self.declared_type.trim().is_empty() {
            return Ok(SqlType::Text);
        }
        SqlType::parse(&self.declared_type).ok_or_else(|| TermError::UnsupportedType {
            column: self.name.clone(),
            declared_type: self.declared_type.clone(),
        })
    }
}

/// The target schema of a table: regular columns followed by partition columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub database: String,
    pub table: String,
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Builds a schema, rejecting duplicate column names (case-insensitive).
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<ColumnSpec>,
    ) -> Result<Self> {
        let database = database.into();
        let table = table.into();
        let mut seen = HashSet::new();
        for column in &columns {
            if column.name.trim().is_empty() {
                return Err(TermError::Configuration(format!(
                    "Table '{database}.{table}' has a column with an empty name"
                )));
            }
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(TermError::Configuration(format!(
                    "Duplicate column '{}' in table '{database}.{table}'",
                    column.name
                )));
            }
        }
        Ok(Self {
            database,
            table,
            columns,
        })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Resolves every declared type; fails on the first unsupported one.
    pub fn sql_types(&self) -> Result<Vec<SqlType>> {
        self.columns.iter().map(ColumnSpec::sql_type).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_types() {
        assert_eq!(SqlType::parse("int"), Some(SqlType::Int));
        assert_eq!(SqlType::parse(" INTEGER "), Some(SqlType::Int));
        assert_eq!(SqlType::parse("bigint"), Some(SqlType::BigInt));
        assert_eq!(SqlType::parse("Double"), Some(SqlType::Double));
        assert_eq!(SqlType::parse("date"), Some(SqlType::Date));
        assert_eq!(SqlType::parse("timestamp"), Some(SqlType::Timestamp));
        assert_eq!(SqlType::parse("boolean"), Some(SqlType::Boolean));
    }

    #[test]
    fn test_parse_parameterised_types() {
        assert_eq!(
            SqlType::parse("decimal(10,2)"),
            Some(SqlType::Decimal {
                precision: 10,
                scale: 2
            })
        );
        assert_eq!(
            SqlType::parse("DECIMAL( 5 )"),
            Some(SqlType::Decimal {
                precision: 5,
                scale: 0
            })
        );
        assert_eq!(
            SqlType::parse("decimal"),
            Some(SqlType::Decimal {
                precision: 10,
                scale: 0
            })
        );
        assert_eq!(SqlType::parse("varchar(50)"), Some(SqlType::Text));
        assert_eq!(SqlType::parse("char(1)"), Some(SqlType::Text));
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        assert_eq!(SqlType::parse("array<int>"), None);
        assert_eq!(SqlType::parse("map<string,int>"), None);
        assert_eq!(SqlType::parse("decimal(2,5)"), None);
        assert_eq!(SqlType::parse("decimal(40,2)"), None);
        assert_eq!(SqlType::parse("int(4)"), None);
        assert_eq!(SqlType::parse("decimal(10,2"), None);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for ty in [
            SqlType::Int,
            SqlType::Decimal {
                precision: 12,
                scale: 4,
            },
            SqlType::Timestamp,
        ] {
            assert_eq!(SqlType::parse(&ty.to_string()), Some(ty));
        }
    }

    #[test]
    fn test_base_type() {
        assert_eq!(base_type("VARCHAR(50)"), "varchar");
        assert_eq!(base_type(" decimal (10,2)"), "decimal");
        assert_eq!(base_type("date"), "date");
    }

    #[test]
    fn test_column_spec_classification() {
        assert!(ColumnSpec::new("name", "varchar(50)").is_free_text());
        assert!(ColumnSpec::new("name", "String").is_free_text());
        assert!(ColumnSpec::new("name", "").is_free_text());
        assert!(!ColumnSpec::new("id", "int").is_free_text());
        assert!(ColumnSpec::new("hired", "DATE").is_date());
        assert!(!ColumnSpec::new("hired", "timestamp").is_date());
    }

    #[test]
    fn test_unsupported_column_type_error() {
        let err = ColumnSpec::new("tags", "array<string>").sql_type().unwrap_err();
        assert!(matches!(err, TermError::UnsupportedType { .. }));
    }

    #[test]
    fn test_schema_rejects_duplicates() {
        let result = TableSchema::new(
            "db",
            "t",
            vec![ColumnSpec::new("id", "int"), ColumnSpec::new("ID", "bigint")],
        );
        assert!(matches!(result, Err(TermError::Configuration(_))));
    }

    #[test]
    fn test_arrow_types() {
        assert_eq!(SqlType::Int.arrow_type(), DataType::Int32);
        assert_eq!(
            SqlType::Decimal {
                precision: 10,
                scale: 2
            }
            .arrow_type(),
            DataType::Decimal128(10, 2)
        );
        assert_eq!(SqlType::Date.arrow_type(), DataType::Date32);
    }
}
