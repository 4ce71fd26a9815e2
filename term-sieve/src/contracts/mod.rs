//! Contract stores: where rule documents come from.
//!
//! A contract is a JSON document with a `data_quality.rules` array, addressed
//! by a key such as `contracts/employees.json`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::error::{ErrorContext, Result, TermError};
use crate::rules::RuleDocument;

#[cfg(feature = "cloud-storage")]
mod object;

#[cfg(feature = "cloud-storage")]
pub use object::ObjectStoreContractStore;

/// Fetches and parses rule documents.
#[async_trait]
pub trait ContractStore: Debug + Send + Sync {
    /// Returns the document stored under `key`.
    ///
    /// Fails with [`TermError::ContractNotFound`] when nothing is stored under
    /// the key and [`TermError::ContractParse`] when the document is malformed.
    async fn get_rules(&self, key: &str) -> Result<RuleDocument>;
}

/// Contracts held in memory as raw JSON.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContractStore {
    documents: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl InMemoryContractStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw contract under `key`, replacing any previous one.
    pub async fn insert(&self, key: impl Into<String>, document: serde_json::Value) {
        self.documents.write().await.insert(key.into(), document);
    }

    /// Stores an already-built rule document.
    pub async fn insert_document(&self, key: impl Into<String>, document: &RuleDocument) {
        let value = serde_json::json!({ "data_quality": { "rules": document.rules } });
        self.insert(key, value).await;
    }
}

#[async_trait]
impl ContractStore for InMemoryContractStore {
    #[instrument(skip(self), fields(store_type = "in_memory"))]
    async fn get_rules(&self, key: &str) -> Result<RuleDocument> {
        let documents = self.documents.read().await;
        let value = documents.get(key).ok_or_else(|| TermError::ContractNotFound {
            key: key.to_string(),
        })?;
        RuleDocument::from_value(key, value)
    }
}

/// Contracts stored as files below a root directory, at `<root>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalContractStore {
    root: PathBuf,
}

impl LocalContractStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ContractStore for LocalContractStore {
    #[instrument(skip(self), fields(store_type = "local", root = %self.root.display()))]
    async fn get_rules(&self, key: &str) -> Result<RuleDocument> {
        let path = self.root.join(key.trim_start_matches('/'));
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TermError::ContractNotFound {
                    key: key.to_string(),
                })
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read contract '{}'", path.display()))
            }
        };
        let document = RuleDocument::from_json_str(key, &text)?;
        debug!(rules = document.len(), "Loaded contract");
        Ok(document)
    }
}

/// Picks the contract store for a run: the object-storage bucket when one is
/// configured, otherwise files below `local_root`.
///
/// Reading contracts from a bucket requires the `s3` feature.
pub fn contract_store_for(
    bucket: Option<&str>,
    local_root: impl Into<PathBuf>,
) -> Result<Arc<dyn ContractStore>> {
    match bucket {
        #[cfg(feature = "s3")]
        Some(bucket) => {
            debug!(bucket, "Using S3 contract store");
            Ok(Arc::new(ObjectStoreContractStore::from_s3_bucket(bucket, None)?))
        }
        #[cfg(not(feature = "s3"))]
        Some(bucket) => Err(TermError::Configuration(format!(
            "Contract bucket '{bucket}' requires the `s3` feature"
        ))),
        None => Ok(Arc::new(LocalContractStore::new(local_root))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Rule, Severity};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryContractStore::new();
        store
            .insert(
                "contracts/emp.json",
                json!({"data_quality": {"rules": [
                    {"column": "id", "severity": "ERROR", "spark_exp": "id > 0", "description": "positive"}
                ]}}),
            )
            .await;

        let document = store.get_rules("contracts/emp.json").await.unwrap();
        assert_eq!(document.rules[0].description, "positive");

        let err = store.get_rules("contracts/other.json").await.unwrap_err();
        assert!(matches!(err, TermError::ContractNotFound { .. }));
    }

    #[tokio::test]
    async fn test_in_memory_document_roundtrip() {
        let store = InMemoryContractStore::new();
        let document = RuleDocument::new(vec![Rule::new(
            "id",
            "id > 0",
            Severity::Warning,
            "id must be positive",
        )]);
        store.insert_document("k", &document).await;
        assert_eq!(store.get_rules("k").await.unwrap(), document);
    }

    #[tokio::test]
    async fn test_local_store() {
        let dir = TempDir::new().unwrap();
        tokio::fs::create_dir_all(dir.path().join("contracts"))
            .await
            .unwrap();
        tokio::fs::write(
            dir.path().join("contracts/emp.json"),
            r#"{"data_quality": {"rules": [{"column": "a", "severity": "INFO", "spark_exp": "a = 1"}]}}"#,
        )
        .await
        .unwrap();
        tokio::fs::write(dir.path().join("contracts/broken.json"), "{")
            .await
            .unwrap();

        let store = LocalContractStore::new(dir.path());
        assert_eq!(store.get_rules("contracts/emp.json").await.unwrap().len(), 1);
        assert!(matches!(
            store.get_rules("contracts/missing.json").await,
            Err(TermError::ContractNotFound { .. })
        ));
        assert!(matches!(
            store.get_rules("contracts/broken.json").await,
            Err(TermError::ContractParse { .. })
        ));
    }

    #[tokio::test]
    async fn test_local_read_error_carries_context() {
        let dir = TempDir::new().unwrap();
        tokio::fs::create_dir_all(dir.path().join("contracts/emp.json"))
            .await
            .unwrap();

        let store = LocalContractStore::new(dir.path());
        let err = store.get_rules("contracts/emp.json").await.unwrap_err();
        assert!(matches!(err, TermError::Internal(ref message)
            if message.starts_with("Failed to read contract")));
    }

    #[tokio::test]
    async fn test_store_selection_without_bucket_is_local() {
        let dir = TempDir::new().unwrap();
        tokio::fs::create_dir_all(dir.path().join("contracts"))
            .await
            .unwrap();
        tokio::fs::write(
            dir.path().join("contracts/emp.json"),
            r#"{"data_quality": {"rules": []}}"#,
        )
        .await
        .unwrap();

        let store = contract_store_for(None, dir.path()).unwrap();
        assert!(store.get_rules("contracts/emp.json").await.unwrap().is_empty());
    }

    #[cfg(not(feature = "s3"))]
    #[test]
    fn test_bucket_requires_s3_feature() {
        let err = contract_store_for(Some("dq-contracts"), ".").unwrap_err();
        assert!(err.is_configuration());
    }

    #[cfg(feature = "s3")]
    #[test]
    fn test_bucket_selects_object_store() {
        let store = contract_store_for(Some("dq-contracts"), ".").unwrap();
        assert!(format!("{store:?}").contains("ObjectStoreContractStore"));
    }
}
