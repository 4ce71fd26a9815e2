//! Parquet output with overwrite semantics.
//!
//! Each destination is a directory holding a single `part-00000.parquet`
//! file. Writes go to a hidden staging directory next to the destination,
//! which then replaces the destination by rename.

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use super::{invalid_batch, valid_batch, DatasetSink, Destination};
use crate::caster::TypedRecord;
use crate::classifier::InvalidRecord;
use crate::error::{Result, TermError};
use crate::types::TableSchema;

/// File name of the single data file in each output directory.
pub const PART_FILE: &str = "part-00000.parquet";

/// Writes outputs as Parquet directories.
#[derive(Debug, Clone)]
pub struct ParquetSink {
    compression: Compression,
}

impl Default for ParquetSink {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
        }
    }
}

impl ParquetSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    async fn write_batch(&self, batch: RecordBatch, destination: &Destination) -> Result<()> {
        let path = destination.path.clone();
        let compression = self.compression;
        let rows = batch.num_rows();
        tokio::task::spawn_blocking(move || write_directory(&path, batch, compression))
            .await
            .map_err(|e| TermError::Internal(format!("Parquet writer task failed: {e}")))?
            .map_err(|e| match e {
                e @ TermError::Sink { .. } => e,
                other => TermError::sink(destination.to_string(), other.to_string()),
            })?;
        info!(destination = %destination, rows, "Wrote output");
        Ok(())
    }
}

fn staging_path(destination: &Path) -> Result<PathBuf> {
    let name = destination
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            TermError::sink(
                destination.display().to_string(),
                "destination path has no final component",
            )
        })?;
    Ok(destination.with_file_name(format!(".{name}.staging")))
}

fn write_directory(destination: &Path, batch: RecordBatch, compression: Compression) -> Result<()> {
    let staging = staging_path(destination)?;
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let props = WriterProperties::builder()
        .set_compression(compression)
        .build();
    let file = File::create(staging.join(PART_FILE))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    if destination.is_dir() {
        fs::remove_dir_all(destination)?;
    } else if destination.exists() {
        fs::remove_file(destination)?;
    }
    fs::rename(&staging, destination)?;
    Ok(())
}

#[async_trait]
impl DatasetSink for ParquetSink {
    #[instrument(skip(self, schema, records), fields(sink_type = "parquet", records = records.len()))]
    async fn write_valid(
        &self,
        schema: &TableSchema,
        records: &[TypedRecord],
        destination: &Destination,
    ) -> Result<()> {
        let batch = valid_batch(schema, records, &destination.table_name)?;
        self.write_batch(batch, destination).await
    }

    #[instrument(skip(self, columns, records), fields(sink_type = "parquet", records = records.len()))]
    async fn write_invalid(
        &self,
        columns: &[String],
        records: &[InvalidRecord],
        destination: &Destination,
    ) -> Result<()> {
        let batch = invalid_batch(columns, records, &destination.table_name)?;
        self.write_batch(batch, destination).await
    }
}
