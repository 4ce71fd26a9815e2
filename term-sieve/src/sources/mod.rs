//! Dataset sources.
//!
//! A source yields the whole input as an ordered list of untyped records.
//! Sources are restartable: every call to [`DatasetSource::read`] reads the
//! input again from the beginning.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::{Result, TermError};
use crate::record::Record;

mod csv;

pub use csv::{CsvOptions, CsvSource};

/// A materialised input dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    /// Column names in input order
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, records: Vec<Record>) -> Self {
        Self { columns, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolves `column` against the dataset's header: exact match first,
    /// then case-insensitive.
    pub fn resolve_column(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| *c == column)
            .or_else(|| self.columns.iter().find(|c| c.eq_ignore_ascii_case(column)))
            .map(String::as_str)
    }

    /// Fails with [`TermError::ColumnNotFound`] for the first name in
    /// `required` that the dataset does not have.
    pub fn require_columns<'a>(&self, required: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for column in required {
            if self.resolve_column(column).is_none() {
                return Err(TermError::ColumnNotFound {
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Produces the records to validate.
#[async_trait]
pub trait DatasetSource: Debug + Send + Sync {
    /// Reads the full dataset.
    async fn read(&self) -> Result<Dataset>;

    /// Returns a human-readable description of this source.
    fn description(&self) -> String;
}

/// A source over records already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    dataset: Dataset,
}

impl MemorySource {
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    /// Builds a source from records, taking column names from the first record.
    pub fn from_records(records: Vec<Record>) -> Self {
        let columns = records
            .first()
            .map(|r| r.columns().map(str::to_string).collect())
            .unwrap_or_default();
        Self::new(Dataset::new(columns, records))
    }
}

#[async_trait]
impl DatasetSource for MemorySource {
    async fn read(&self) -> Result<Dataset> {
        Ok(self.dataset.clone())
    }

    fn description(&self) -> String {
        format!("memory ({} records)", self.dataset.len())
    }
}

/// Expands glob patterns into the files they match, in pattern order.
pub(crate) fn expand_globs(patterns: &[String]) -> Result<Vec<String>> {
    use glob::glob;

    let mut paths = Vec::new();
    for pattern in patterns {
        let matches = glob(pattern).map_err(|e| {
            TermError::Configuration(format!("Invalid glob pattern '{pattern}': {e}"))
        })?;

        for entry in matches {
            let path = entry.map_err(|e| TermError::Io(std::io::Error::other(e)))?;
            if path.is_file() {
                if let Some(path_str) = path.to_str() {
                    paths.push(path_str.to_string());
                }
            }
        }
    }

    if paths.is_empty() {
        return Err(TermError::data_source(
            "file",
            format!("No files found matching {patterns:?}"),
        ));
    }

    Ok(paths)
}
