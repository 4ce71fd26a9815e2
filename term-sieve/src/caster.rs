//! Casting valid records to the target schema.
//!
//! Only records that passed every rule reach the caster. Since dtype rules
//! and the caster share [`cast_str`], a failed cast here means the rule set
//! and the schema disagree, and the run is aborted.

use crate::error::{Result, TermError};
use crate::logging::truncate_field;
use crate::record::Record;
use crate::types::{ColumnSpec, SqlType, TableSchema};
use crate::value::{cast_str, date_pattern_to_chrono, parse_date_with_format, Value};
use tracing::instrument;

/// Default cap on the raw value carried by a [`TermError::CastFailure`].
pub const DEFAULT_MAX_FIELD_LENGTH: usize = 128;

/// A record whose values follow the target schema's column order and types.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRecord {
    values: Vec<Value>,
}

impl TypedRecord {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Casts records to a [`TableSchema`].
#[derive(Debug, Clone)]
pub struct SchemaCaster {
    columns: Vec<(ColumnSpec, SqlType)>,
    date_format: String,
    max_field_length: usize,
}

impl SchemaCaster {
    /// Resolves the schema's declared types and the date pattern.
    pub fn new(schema: &TableSchema, date_pattern: &str) -> Result<Self> {
        let date_format = date_pattern_to_chrono(date_pattern).ok_or_else(|| {
            TermError::Configuration(format!("Invalid date pattern '{date_pattern}'"))
        })?;
        let columns = schema
            .columns()
            .iter()
            .map(|c| Ok((c.clone(), c.sql_type()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns,
            date_format,
            max_field_length: DEFAULT_MAX_FIELD_LENGTH,
        })
    }

    /// Caps the raw value reported in cast failures.
    pub fn with_max_field_length(mut self, max_field_length: usize) -> Self {
        self.max_field_length = max_field_length;
        self
    }

    /// Casts one record. Output values follow catalog order; extra input
    /// columns are dropped.
    pub fn cast(&self, record: &Record) -> Result<TypedRecord> {
        let mut values = Vec::with_capacity(self.columns.len());
        for (column, ty) in &self.columns {
            let raw = record.get(&column.name).ok_or_else(|| TermError::CastFailure {
                column: column.name.clone(),
                value: "<missing>".to_string(),
                target: column.declared_type.clone(),
            })?;
            let value = match raw {
                None => Value::Null,
                Some(text) => self.cast_text(column, ty, text)?,
            };
            values.push(value);
        }
        Ok(TypedRecord { values })
    }

    /// Casts all records, stopping at the first failure.
    #[instrument(skip(self, records), fields(records = records.len()))]
    pub fn cast_all(&self, records: &[Record]) -> Result<Vec<TypedRecord>> {
        records.iter().map(|r| self.cast(r)).collect()
    }

    fn cast_text(&self, column: &ColumnSpec, ty: &SqlType, text: &str) -> Result<Value> {
        let value = match ty {
            SqlType::Text => Value::String(text.to_string()),
            SqlType::Date => {
                parse_date_with_format(text, &self.date_format).map_or(Value::Null, Value::Date)
            }
            other => cast_str(text, other),
        };
        if value.is_null() {
            return Err(TermError::CastFailure {
                column: column.name.clone(),
                value: truncate_field(text, self.max_field_length),
                target: column.declared_type.clone(),
            });
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn schema() -> TableSchema {
        TableSchema::new(
            "hr",
            "employees",
            vec![
                ColumnSpec::new("id", "int"),
                ColumnSpec::new("name", "string"),
                ColumnSpec::new("hired", "date"),
                ColumnSpec::new("salary", "decimal(8,2)"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_casts_in_catalog_order() {
        let caster = SchemaCaster::new(&schema(), "yyyy-MM-dd").unwrap();
        let record = Record::from_pairs([
            ("salary", Some("1200.5")),
            ("extra", Some("dropped")),
            ("hired", Some("2024-01-05")),
            ("name", Some("Ann")),
            ("id", Some("2")),
        ]);
        let typed = caster.cast(&record).unwrap();
        assert_eq!(typed.values().len(), 4);
        assert_eq!(typed.get(0), Some(&Value::Int(2)));
        assert_eq!(typed.get(1), Some(&Value::String("Ann".into())));
        assert_eq!(
            typed.get(2),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()))
        );
        assert_eq!(typed.get(3).unwrap().to_text().unwrap(), "1200.50");
    }

    #[test]
    fn test_nulls_pass_through() {
        let caster = SchemaCaster::new(&schema(), "yyyy-MM-dd").unwrap();
        let record = Record::from_pairs([
            ("id", None::<&str>),
            ("name", None),
            ("hired", None),
            ("salary", None),
        ]);
        let typed = caster.cast(&record).unwrap();
        assert!(typed.values().iter().all(Value::is_null));
    }

    #[test]
    fn test_custom_date_pattern() {
        let caster = SchemaCaster::new(&schema(), "dd/MM/yyyy").unwrap();
        let record = Record::from_pairs([
            ("id", Some("1")),
            ("name", Some("Bo")),
            ("hired", Some("05/01/2024")),
            ("salary", None),
        ]);
        let typed = caster.cast(&record).unwrap();
        assert_eq!(
            typed.get(2),
            Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()))
        );
    }

    #[test]
    fn test_cast_failure_is_fatal() {
        let caster = SchemaCaster::new(&schema(), "yyyy-MM-dd").unwrap();
        let record = Record::from_pairs([
            ("id", Some("abc")),
            ("name", None),
            ("hired", None),
            ("salary", None),
        ]);
        let err = caster.cast(&record).unwrap_err();
        assert!(matches!(err, TermError::CastFailure { ref column, .. } if column == "id"));
    }

    #[test]
    fn test_cast_failure_value_is_truncated() {
        let long = "x".repeat(40);
        let record = Record::from_pairs([
            ("id", Some(long.as_str())),
            ("name", None),
            ("hired", None),
            ("salary", None),
        ]);

        let caster = SchemaCaster::new(&schema(), "yyyy-MM-dd")
            .unwrap()
            .with_max_field_length(8);
        match caster.cast(&record).unwrap_err() {
            TermError::CastFailure { value, .. } => assert_eq!(value, "xxxxxxxx...(truncated)"),
            other => panic!("unexpected error: {other}"),
        }

        let caster = SchemaCaster::new(&schema(), "yyyy-MM-dd").unwrap();
        match caster.cast(&record).unwrap_err() {
            TermError::CastFailure { value, .. } => assert_eq!(value, long),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let caster = SchemaCaster::new(&schema(), "yyyy-MM-dd").unwrap();
        let record = Record::from_pairs([("id", Some("1"))]);
        assert!(matches!(
            caster.cast_all(&[record]),
            Err(TermError::CastFailure { .. })
        ));
    }

    #[test]
    fn test_invalid_date_pattern() {
        let err = SchemaCaster::new(&schema(), "yyyy-QQ").unwrap_err();
        assert!(err.is_configuration());
    }
}
