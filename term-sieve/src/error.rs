//! Error types for the term-sieve validation engine.
//!
//! Every fallible operation in the crate returns [`TermError`]. Per-record rule
//! violations are *not* errors: they are collected on the record and routed to
//! the invalid output. Errors here abort the run.

use thiserror::Error;

/// The main error type for term-sieve.
#[derive(Error, Debug)]
pub enum TermError {
    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The catalog has no definition for the requested table.
    #[error("Table '{database}.{table}' not found in catalog")]
    CatalogTableNotFound { database: String, table: String },

    /// The contract store has no rule document under the given key.
    #[error("Contract '{key}' not found")]
    ContractNotFound { key: String },

    /// A rule document exists but could not be parsed.
    #[error("Contract '{key}' could not be parsed: {message}")]
    ContractParse { key: String, message: String },

    /// A declared column type the engine cannot validate or cast to.
    #[error("Unsupported declared type '{declared_type}' for column '{column}'")]
    UnsupportedType {
        column: String,
        declared_type: String,
    },

    /// A required column is not present in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// A record already classified as valid could not be cast to its declared type.
    #[error("Cannot cast value '{value}' in column '{column}' to {target}")]
    CastFailure {
        column: String,
        value: String,
        target: String,
    },

    /// Error from data source operations.
    #[error("Data source error: {message}")]
    DataSource {
        /// Type of data source (e.g., "CSV", "memory")
        source_type: String,
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Error while persisting an output destination.
    #[error("Sink error writing '{destination}': {message}")]
    Sink {
        destination: String,
        message: String,
    },

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from Parquet operations.
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TermError>`.
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates a new data source error.
    pub fn data_source(source_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new data source error with a source error.
    pub fn data_source_with_source(
        source_type: impl Into<String>,
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::DataSource {
            source_type: source_type.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new sink error.
    pub fn sink(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sink {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors raised before any record was processed.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TermError::Configuration(_)
                | TermError::CatalogTableNotFound { .. }
                | TermError::ContractNotFound { .. }
                | TermError::ContractParse { .. }
                | TermError::UnsupportedType { .. }
                | TermError::ColumnNotFound { .. }
        )
    }
}

impl From<serde_json::Error> for TermError {
    fn from(err: serde_json::Error) -> Self {
        TermError::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
            other => TermError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
                other => TermError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_data_source_error() {
        let err = TermError::data_source("CSV", "Invalid file format");
        assert_eq!(err.to_string(), "Data source error: Invalid file format");
    }

    #[test]
    fn test_data_source_error_keeps_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err = TermError::data_source_with_source("CSV", "Could not open", Box::new(source));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_cast_failure_message() {
        let err = TermError::CastFailure {
            column: "id".to_string(),
            value: "abc".to_string(),
            target: "int".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot cast value 'abc' in column 'id' to int");
    }

    #[test]
    fn test_configuration_classification() {
        assert!(TermError::ContractNotFound {
            key: "contracts/x.json".to_string()
        }
        .is_configuration());
        assert!(TermError::CatalogTableNotFound {
            database: "db".to_string(),
            table: "t".to_string()
        }
        .is_configuration());
        assert!(!TermError::sink("out/", "disk full").is_configuration());
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> Result<()> {
            Err(TermError::Internal("Something went wrong".to_string()))
        }

        let err = failing_operation().context("While casting").unwrap_err();
        assert!(err.to_string().contains("While casting"));
        assert!(err.to_string().contains("Something went wrong"));
    }
}
