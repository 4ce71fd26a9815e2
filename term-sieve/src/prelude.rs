//! Prelude for commonly used types and traits in term-sieve.

pub use crate::caster::{SchemaCaster, TypedRecord};
pub use crate::catalog::{Catalog, InMemoryCatalog, JsonCatalog};
pub use crate::classifier::{classify, Classification, InvalidRecord, Reprocess};
pub use crate::config::PipelineConfig;
pub use crate::contracts::{ContractStore, InMemoryContractStore, LocalContractStore};
pub use crate::error::{ErrorContext, Result, TermError};
pub use crate::evaluator::RuleEvaluator;
pub use crate::logging::LogConfig;
pub use crate::pipeline::{QualityPipeline, RunSummary};
pub use crate::record::{EvaluatedRecord, Record};
pub use crate::rules::{Rule, RuleDocument, RuleSet, RuleType, Severity};
pub use crate::sinks::{DatasetSink, Destination, MemorySink, ParquetSink};
pub use crate::sources::{CsvSource, Dataset, DatasetSource, MemorySource};
pub use crate::types::{ColumnSpec, SqlType, TableSchema};
pub use crate::value::Value;

#[cfg(feature = "cloud-storage")]
pub use crate::contracts::ObjectStoreContractStore;
