//! Run configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TermError};
use crate::rules::DEFAULT_DATE_PATTERN;
use crate::sinks::Destination;
use crate::value::date_pattern_to_chrono;

fn default_date_pattern() -> String {
    DEFAULT_DATE_PATTERN.to_string()
}

/// Everything a run needs to locate its inputs and outputs.
///
/// Usually loaded from a JSON file named after the job:
///
/// ```json
/// {
///   "job_name": "employees_dq",
///   "database": "hr",
///   "table": "employees",
///   "input_path": "landing/employees/*.csv",
///   "output_root": "warehouse"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub job_name: String,
    pub database: String,
    pub table: String,
    /// Contract key; defaults to `contracts/<table>.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_key: Option<String>,
    /// Object-storage bucket holding the contracts; local files when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// Input file or glob pattern
    pub input_path: String,
    pub output_root: PathBuf,
    /// Pattern used to check and cast `date` columns
    #[serde(default = "default_date_pattern")]
    pub date_pattern: String,
    /// Evaluation partitions; defaults to the number of CPUs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions: Option<usize>,
}

impl PipelineConfig {
    pub fn new(
        job_name: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
        input_path: impl Into<String>,
        output_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job_name: job_name.into(),
            database: database.into(),
            table: table.into(),
            contract_key: None,
            bucket: None,
            input_path: input_path.into(),
            output_root: output_root.into(),
            date_pattern: default_date_pattern(),
            partitions: None,
        }
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TermError::Configuration(format!("Cannot read config '{}': {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            TermError::Configuration(format!("Invalid config '{}': {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_contract_key(mut self, key: impl Into<String>) -> Self {
        self.contract_key = Some(key.into());
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn with_date_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.date_pattern = pattern.into();
        self
    }

    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = Some(partitions);
        self
    }

    /// Rejects empty identifiers, zero partitions and unusable date patterns.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("job_name", &self.job_name),
            ("database", &self.database),
            ("table", &self.table),
            ("input_path", &self.input_path),
        ] {
            if value.trim().is_empty() {
                return Err(TermError::Configuration(format!("{name} must not be empty")));
            }
        }
        if self.output_root.as_os_str().is_empty() {
            return Err(TermError::Configuration(
                "output_root must not be empty".to_string(),
            ));
        }
        if self.bucket.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(TermError::Configuration(
                "bucket must not be empty when set".to_string(),
            ));
        }
        if self.partitions == Some(0) {
            return Err(TermError::Configuration(
                "partitions must be at least 1".to_string(),
            ));
        }
        if date_pattern_to_chrono(&self.date_pattern).is_none() {
            return Err(TermError::Configuration(format!(
                "Invalid date pattern '{}'",
                self.date_pattern
            )));
        }
        Ok(())
    }

    pub fn contract_key(&self) -> String {
        self.contract_key
            .clone()
            .unwrap_or_else(|| format!("contracts/{}.json", self.table))
    }

    pub fn partitions(&self) -> usize {
        self.partitions.unwrap_or_else(num_cpus::get).max(1)
    }

    /// `<output_root>/processed/<table>`, published as `<database>.<table>`.
    pub fn valid_destination(&self) -> Destination {
        Destination::new(
            self.output_root.join("processed").join(&self.table),
            format!("{}.{}", self.database, self.table),
        )
    }

    /// `<output_root>/error/<table>_error`, published as `<database>.<table>_error`.
    pub fn invalid_destination(&self) -> Destination {
        let table = format!("{}_error", self.table);
        Destination::new(
            self.output_root.join("error").join(&table),
            format!("{}.{table}", self.database),
        )
    }
}
