//! # Term Sieve - Contract-Driven Record Validation
//!
//! Term Sieve validates a tabular dataset record by record against a target
//! schema and a declarative rule contract. Every record ends up in exactly one
//! of two outputs:
//!
//! - **valid** records, cast to the catalog's declared types and written as
//!   `<database>.<table>`;
//! - **invalid** records, kept as raw text and annotated with the
//!   descriptions and severities of every rule they failed, plus a
//!   `Reprocess_IND` flag, written as `<database>.<table>_error`.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use term_sieve::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let catalog = InMemoryCatalog::new();
//! catalog
//!     .register(TableSchema::new(
//!         "hr",
//!         "employees",
//!         vec![ColumnSpec::new("id", "int"), ColumnSpec::new("hired", "date")],
//!     )?)
//!     .await;
//!
//! let contracts = InMemoryContractStore::new();
//! contracts
//!     .insert_document(
//!         "contracts/employees.json",
//!         &RuleDocument::new(vec![Rule::new(
//!             "id",
//!             "id > 0",
//!             Severity::Warning,
//!             "id must be positive",
//!         )]),
//!     )
//!     .await;
//!
//! let records = vec![
//!     Record::from_pairs([("id", Some("2")), ("hired", Some("2024-01-05"))]),
//!     Record::from_pairs([("id", Some("abc")), ("hired", None)]),
//! ];
//!
//! let sink = MemorySink::new();
//! let pipeline = QualityPipeline::builder(PipelineConfig::new(
//!     "employees_dq",
//!     "hr",
//!     "employees",
//!     "memory",
//!     "/warehouse",
//! ))
//! .catalog(Arc::new(catalog))
//! .contracts(Arc::new(contracts))
//! .source(Arc::new(MemorySource::from_records(records)))
//! .sink(Arc::new(sink.clone()))
//! .build()?;
//!
//! let summary = pipeline.run().await?;
//! assert_eq!(summary.valid, 1);
//! assert_eq!(summary.invalid, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Rules
//!
//! Contract rules are SQL boolean expressions over one record (see
//! [`expression`]). Each typed catalog column also gets a synthesized `dtype`
//! rule checking that its values cast to the declared type. Rules on the
//! `__TABLE__` pseudo-column, key rules and vacuous `true` rules are skipped.
//! A rule whose predicate is NULL for a record does not fail that record.
//!
//! ## Architecture
//!
//! - **`catalog`**: target schemas (in memory or Glue-style JSON files)
//! - **`contracts`**: rule documents (in memory, local files, object storage)
//! - **`sources`** / **`sinks`**: CSV input, Parquet output
//! - **`rules`**: rule model, dtype synthesis, filtering, compilation
//! - **`expression`**: the predicate parser and interpreter
//! - **`evaluator`**, **`classifier`**, **`caster`**: the per-record stages
//! - **`pipeline`**: wires everything into a run

pub mod caster;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod contracts;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod logging;
pub mod pipeline;
pub mod prelude;
pub mod record;
pub mod rules;
pub mod sinks;
pub mod sources;
pub mod types;
pub mod value;
