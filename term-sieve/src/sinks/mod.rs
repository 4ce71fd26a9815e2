//! Dataset sinks.
//!
//! Both outputs of a run are written with overwrite semantics: after a
//! successful write the destination holds exactly the records of this run.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::caster::TypedRecord;
use crate::classifier::InvalidRecord;
use crate::error::Result;
use crate::types::TableSchema;

mod batch;
mod parquet;

pub use batch::{invalid_batch, valid_batch, TABLE_NAME_METADATA};
pub use self::parquet::ParquetSink;

/// Where an output goes: a location plus the table name it is published as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
    pub path: PathBuf,
    /// Qualified table name, e.g. `hr.employees_error`
    pub table_name: String,
}

impl Destination {
    pub fn new(path: impl Into<PathBuf>, table_name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table_name: table_name.into(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.table_name, self.path.display())
    }
}

/// Persists the two outputs of a run.
#[async_trait]
pub trait DatasetSink: Debug + Send + Sync {
    /// Replaces `destination` with the valid records, typed per `schema`.
    async fn write_valid(
        &self,
        schema: &TableSchema,
        records: &[TypedRecord],
        destination: &Destination,
    ) -> Result<()>;

    /// Replaces `destination` with the invalid records and their annotations.
    async fn write_invalid(
        &self,
        columns: &[String],
        records: &[InvalidRecord],
        destination: &Destination,
    ) -> Result<()>;
}

/// What a [`MemorySink`] holds for one destination.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOutput {
    Valid {
        columns: Vec<String>,
        records: Vec<TypedRecord>,
    },
    Invalid {
        columns: Vec<String>,
        records: Vec<InvalidRecord>,
    },
}

impl SinkOutput {
    pub fn len(&self) -> usize {
        match self {
            SinkOutput::Valid { records, .. } => records.len(),
            SinkOutput::Invalid { records, .. } => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A sink that keeps outputs in memory, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    outputs: Arc<RwLock<HashMap<String, SinkOutput>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns what was last written under `table_name`.
    pub async fn output(&self, table_name: &str) -> Option<SinkOutput> {
        self.outputs.read().await.get(table_name).cloned()
    }

    pub async fn valid(&self, table_name: &str) -> Option<Vec<TypedRecord>> {
        match self.output(table_name).await? {
            SinkOutput::Valid { records, .. } => Some(records),
            SinkOutput::Invalid { .. } => None,
        }
    }

    pub async fn invalid(&self, table_name: &str) -> Option<Vec<InvalidRecord>> {
        match self.output(table_name).await? {
            SinkOutput::Invalid { records, .. } => Some(records),
            SinkOutput::Valid { .. } => None,
        }
    }
}

#[async_trait]
impl DatasetSink for MemorySink {
    async fn write_valid(
        &self,
        schema: &TableSchema,
        records: &[TypedRecord],
        destination: &Destination,
    ) -> Result<()> {
        let output = SinkOutput::Valid {
            columns: schema.column_names(),
            records: records.to_vec(),
        };
        self.outputs
            .write()
            .await
            .insert(destination.table_name.clone(), output);
        Ok(())
    }

    async fn write_invalid(
        &self,
        columns: &[String],
        records: &[InvalidRecord],
        destination: &Destination,
    ) -> Result<()> {
        let output = SinkOutput::Invalid {
            columns: columns.to_vec(),
            records: records.to_vec(),
        };
        self.outputs
            .write()
            .await
            .insert(destination.table_name.clone(), output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnSpec;
    use crate::value::Value;

    #[tokio::test]
    async fn test_memory_sink_overwrites() {
        let sink = MemorySink::new();
        let schema = TableSchema::new("db", "t", vec![ColumnSpec::new("a", "int")]).unwrap();
        let destination = Destination::new("/out/t", "db.t");

        sink.write_valid(&schema, &[TypedRecord::new(vec![Value::Int(1)])], &destination)
            .await
            .unwrap();
        sink.write_valid(&schema, &[], &destination).await.unwrap();

        let output = sink.output("db.t").await.unwrap();
        assert!(output.is_empty());
        assert_eq!(sink.valid("db.t").await, Some(Vec::new()));
        assert_eq!(sink.invalid("db.t").await, None);
    }
}
