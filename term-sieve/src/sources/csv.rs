//! Delimited text source.

use arrow::array::{Array, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{expand_globs, Dataset, DatasetSource};
use crate::error::{Result, TermError};
use crate::record::Record;

/// Options for reading delimited text.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote: u8,
    /// Rows per Arrow batch while reading
    pub batch_size: usize,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            batch_size: 8192,
        }
    }
}

/// Reads one or more CSV files with a header row.
///
/// Every column is read as text without type inference; empty fields become
/// null, as do the trailing fields of rows shorter than the header. When several files match, they must share the same header and their
/// records are concatenated in path order.
#[derive(Debug, Clone)]
pub struct CsvSource {
    patterns: Vec<String>,
    options: CsvOptions,
}

impl CsvSource {
    /// Creates a source over a path or glob pattern.
    pub fn new(path: impl Into<String>) -> Self {
        Self::from_patterns(vec![path.into()])
    }

    pub fn from_patterns(patterns: Vec<String>) -> Self {
        Self {
            patterns,
            options: CsvOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CsvOptions) -> Self {
        self.options = options;
        self
    }

    fn read_blocking(patterns: &[String], options: &CsvOptions) -> Result<Dataset> {
        let paths = expand_globs(patterns)?;
        let mut columns: Option<Vec<String>> = None;
        let mut records = Vec::new();

        for path in &paths {
            let (header, file_records) = read_file(path, options)?;
            match &columns {
                None => columns = Some(header),
                Some(expected) if *expected != header => {
                    return Err(TermError::data_source(
                        "CSV",
                        format!("Header of '{path}' does not match the first file"),
                    ))
                }
                Some(_) => {}
            }
            records.extend(file_records);
        }

        debug!(files = paths.len(), records = records.len(), "Read CSV input");
        Ok(Dataset::new(columns.unwrap_or_default(), records))
    }
}

fn read_file(path: &str, options: &CsvOptions) -> Result<(Vec<String>, Vec<Record>)> {
    let csv_error = |e: arrow::error::ArrowError| {
        TermError::data_source_with_source("CSV", format!("Failed to read '{path}'"), Box::new(e))
    };

    let mut file = File::open(path)?;
    let format = Format::default()
        .with_header(true)
        .with_delimiter(options.delimiter)
        .with_quote(options.quote)
        // Short rows are padded with nulls instead of failing the read.
        .with_truncated_rows(true);
    let (inferred, _) = format
        .infer_schema(BufReader::new(&file), Some(1))
        .map_err(csv_error)?;
    let header: Vec<String> = inferred.fields().iter().map(|f| f.name().clone()).collect();
    file.seek(SeekFrom::Start(0))?;

    // Read every column as nullable text.
    let schema = Arc::new(Schema::new(
        header
            .iter()
            .map(|name| Field::new(name, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));
    let reader = ReaderBuilder::new(schema)
        .with_format(format)
        .with_batch_size(options.batch_size)
        .build(BufReader::new(file))
        .map_err(csv_error)?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.map_err(csv_error)?;
        let arrays = batch
            .columns()
            .iter()
            .map(|c| {
                c.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
                    TermError::Internal(format!("CSV column in '{path}' was not read as text"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for row in 0..batch.num_rows() {
            records.push(Record::from_pairs(header.iter().zip(&arrays).map(
                |(name, array)| {
                    let value = (!array.is_null(row))
                        .then(|| array.value(row))
                        .filter(|v| !v.is_empty());
                    (name.as_str(), value)
                },
            )));
        }
    }
    Ok((header, records))
}

#[async_trait]
impl DatasetSource for CsvSource {
    #[instrument(skip(self), fields(source_type = "csv", patterns = ?self.patterns))]
    async fn read(&self) -> Result<Dataset> {
        let patterns = self.patterns.clone();
        let options = self.options.clone();
        tokio::task::spawn_blocking(move || Self::read_blocking(&patterns, &options))
            .await
            .map_err(|e| TermError::Internal(format!("CSV reader task failed: {e}")))?
    }

    fn description(&self) -> String {
        format!("CSV source: {}", self.patterns.join(", "))
    }
}
