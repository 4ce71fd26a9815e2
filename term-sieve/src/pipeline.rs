//! The end-to-end validation run.
//!
//! A [`QualityPipeline`] loads the target schema and the rule contract, reads
//! the input, evaluates every rule against every record, casts the valid
//! records and writes both outputs. Configuration problems abort the run
//! before any record is evaluated; both outputs are fully computed before
//! either is written.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use term_sieve::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let config = PipelineConfig::from_file("jobs/employees_dq.json")?;
//! let pipeline = QualityPipeline::builder(config.clone())
//!     .catalog(Arc::new(JsonCatalog::new("catalog")))
//!     .contracts(Arc::new(LocalContractStore::new("contracts-bucket")))
//!     .source(Arc::new(CsvSource::new(config.input_path.clone())))
//!     .sink(Arc::new(ParquetSink::new()))
//!     .build()?;
//!
//! let summary = pipeline.run().await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::caster::SchemaCaster;
use crate::catalog::Catalog;
use crate::classifier::classify;
use crate::config::PipelineConfig;
use crate::contracts::ContractStore;
use crate::error::{Result, TermError};
use crate::evaluator::RuleEvaluator;
use crate::logging::{truncate_field, LogConfig};
use crate::rules::{merge_rules, synthesize_dtype_rules_with_pattern, RuleSet};
use crate::sinks::DatasetSink;
use crate::sources::DatasetSource;
use crate::types::TableSchema;
use crate::{log_data_op, log_rule};

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Invalid records with `Reprocess_IND = Y`
    pub reprocessable: usize,
    /// Rules evaluated per record after filtering and compilation
    pub rules_applied: usize,
}

impl RunSummary {
    /// The summary as a single JSON object, for machine-readable job logs.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records: {} valid, {} invalid ({} reprocessable), {} rules applied",
            self.total, self.valid, self.invalid, self.reprocessable, self.rules_applied
        )
    }
}

/// The target schema and compiled rules for a run.
#[derive(Debug, Clone)]
pub struct LoadedRules {
    pub schema: TableSchema,
    pub rules: Arc<RuleSet>,
}

/// A configured validation run.
#[derive(Debug, Clone)]
pub struct QualityPipeline {
    config: PipelineConfig,
    catalog: Arc<dyn Catalog>,
    contracts: Arc<dyn ContractStore>,
    source: Arc<dyn DatasetSource>,
    sink: Arc<dyn DatasetSink>,
    log_config: LogConfig,
}

/// Builder for [`QualityPipeline`].
#[derive(Debug)]
pub struct QualityPipelineBuilder {
    config: PipelineConfig,
    catalog: Option<Arc<dyn Catalog>>,
    contracts: Option<Arc<dyn ContractStore>>,
    source: Option<Arc<dyn DatasetSource>>,
    sink: Option<Arc<dyn DatasetSink>>,
    log_config: LogConfig,
}

impl QualityPipelineBuilder {
    pub fn catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn contracts(mut self, contracts: Arc<dyn ContractStore>) -> Self {
        self.contracts = Some(contracts);
        self
    }

    pub fn source(mut self, source: Arc<dyn DatasetSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DatasetSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Validates the configuration and checks that every collaborator is set.
    pub fn build(self) -> Result<QualityPipeline> {
        self.config.validate()?;
        let missing = |what: &str| TermError::Configuration(format!("No {what} configured"));
        Ok(QualityPipeline {
            catalog: self.catalog.ok_or_else(|| missing("catalog"))?,
            contracts: self.contracts.ok_or_else(|| missing("contract store"))?,
            source: self.source.ok_or_else(|| missing("dataset source"))?,
            sink: self.sink.ok_or_else(|| missing("dataset sink"))?,
            config: self.config,
            log_config: self.log_config,
        })
    }
}

impl QualityPipeline {
    pub fn builder(config: PipelineConfig) -> QualityPipelineBuilder {
        QualityPipelineBuilder {
            config,
            catalog: None,
            contracts: None,
            source: None,
            sink: None,
            log_config: LogConfig::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loads the schema and builds the run's rule set: contract rules first,
    /// synthesized dtype rules after, inapplicable and unparsable rules dropped.
    #[instrument(skip(self), fields(job = %self.config.job_name, table = %self.config.table))]
    pub async fn load_rules(&self) -> Result<LoadedRules> {
        let schema = self
            .catalog
            .get_columns(&self.config.database, &self.config.table)
            .await?;
        let synthesized = synthesize_dtype_rules_with_pattern(&schema, &self.config.date_pattern)?;
        let document = self.contracts.get_rules(&self.config.contract_key()).await?;
        let contract_rules = document.rules.len();

        let rules = RuleSet::compile(merge_rules(document.rules, synthesized.clone()));
        for rule in rules.iter() {
            log_rule!(
                self.log_config,
                column = %rule.rule().column,
                rule_type = %rule.rule().rule_type,
                severity = %rule.severity(),
                "Applying rule"
            );
        }
        info!(
            contract_rules,
            dtype_rules = synthesized.len(),
            applied = rules.len(),
            "Loaded rules"
        );

        Ok(LoadedRules {
            schema,
            rules: Arc::new(rules),
        })
    }

    /// Executes the run and writes both outputs.
    #[instrument(skip(self), fields(job = %self.config.job_name, table = %self.config.table))]
    pub async fn run(&self) -> Result<RunSummary> {
        let LoadedRules { schema, rules } = self.load_rules().await?;
        let caster = SchemaCaster::new(&schema, &self.config.date_pattern)?
            .with_max_field_length(self.log_config.max_field_length);

        let dataset = self.source.read().await?;
        log_data_op!(
            self.log_config,
            source = %self.source.description(),
            records = dataset.len(),
            "Read input"
        );
        dataset.require_columns(schema.columns().iter().map(|c| c.name.as_str()))?;

        let rules_applied = rules.len();
        let evaluator = RuleEvaluator::new(rules).with_partitions(self.config.partitions());
        let columns = dataset.columns;
        let classification = classify(evaluator.evaluate_all(dataset.records).await?);
        if self.log_config.log_values {
            for invalid in &classification.invalid {
                debug!(
                    record = %truncate_field(&invalid.record.to_string(), self.log_config.max_field_length),
                    reasons = ?invalid.reasons,
                    reprocess = %invalid.reprocess,
                    "Rejected record"
                );
            }
        }
        let typed = caster.cast_all(&classification.valid)?;

        let summary = RunSummary {
            total: classification.total(),
            valid: classification.valid.len(),
            invalid: classification.invalid.len(),
            reprocessable: classification.reprocessable(),
            rules_applied,
        };

        let valid_destination = self.config.valid_destination();
        let invalid_destination = self.config.invalid_destination();
        self.sink
            .write_valid(&schema, &typed, &valid_destination)
            .await?;
        log_data_op!(self.log_config, destination = %valid_destination, rows = typed.len(), "Wrote valid records");
        self.sink
            .write_invalid(&columns, &classification.invalid, &invalid_destination)
            .await?;
        log_data_op!(
            self.log_config,
            destination = %invalid_destination,
            rows = classification.invalid.len(),
            "Wrote invalid records"
        );

        info!(
            total = summary.total,
            valid = summary.valid,
            invalid = summary.invalid,
            reprocessable = summary.reprocessable,
            "Run complete"
        );
        Ok(summary)
    }
}
