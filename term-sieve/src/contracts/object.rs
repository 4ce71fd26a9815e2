//! Contracts stored in object storage (S3, GCS, Azure Blob).

use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;
use tracing::{debug, instrument};

#[cfg(feature = "s3")]
use object_store::{aws::AmazonS3Builder, RetryConfig};

use super::ContractStore;
use crate::error::{Result, TermError};
use crate::rules::RuleDocument;

/// A contract store over any [`ObjectStore`], with an optional key prefix.
#[derive(Debug, Clone)]
pub struct ObjectStoreContractStore {
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl ObjectStoreContractStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            prefix: None,
        }
    }

    /// Prepends `prefix` to every key.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Creates a store over an S3 bucket using ambient AWS credentials.
    #[cfg(feature = "s3")]
    pub fn from_s3_bucket(bucket: &str, region: Option<&str>) -> Result<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_retry(RetryConfig {
                max_retries: 3,
                retry_timeout: std::time::Duration::from_secs(30),
                ..Default::default()
            });
        if let Some(region) = region {
            builder = builder.with_region(region);
        }
        let store = builder.build().map_err(|e| {
            TermError::Configuration(format!("Failed to create S3 client for '{bucket}': {e}"))
        })?;
        Ok(Self::new(Arc::new(store)))
    }

    fn location(&self, key: &str) -> ObjectPath {
        let key = key.trim_start_matches('/');
        match &self.prefix {
            Some(prefix) => ObjectPath::from(format!("{prefix}/{key}")),
            None => ObjectPath::from(key),
        }
    }
}

#[async_trait]
impl ContractStore for ObjectStoreContractStore {
    #[instrument(skip(self), fields(store_type = "object_store"))]
    async fn get_rules(&self, key: &str) -> Result<RuleDocument> {
        let location = self.location(key);
        let not_found_or = |e: object_store::Error| match e {
            object_store::Error::NotFound { .. } => TermError::ContractNotFound {
                key: key.to_string(),
            },
            other => TermError::data_source_with_source(
                "object_store",
                format!("Failed to read contract '{location}'"),
                Box::new(other),
            ),
        };

        let bytes = self
            .store
            .get(&location)
            .await
            .map_err(not_found_or)?
            .bytes()
            .await
            .map_err(not_found_or)?;
        let text = std::str::from_utf8(&bytes).map_err(|e| TermError::ContractParse {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let document = RuleDocument::from_json_str(key, text)?;
        debug!(rules = document.len(), "Loaded contract");
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use object_store::PutPayload;

    #[tokio::test]
    async fn test_reads_prefixed_contract() {
        let memory = Arc::new(InMemory::new());
        let body = r#"{"data_quality": {"rules": [{"column": "a", "severity": "ERROR", "spark_exp": "a > 0"}]}}"#;
        memory
            .put(
                &ObjectPath::from("dq/contracts/t.json"),
                PutPayload::from(body.as_bytes().to_vec()),
            )
            .await
            .unwrap();

        let store = ObjectStoreContractStore::new(memory).with_prefix("/dq/");
        assert_eq!(store.get_rules("contracts/t.json").await.unwrap().len(), 1);
        assert!(matches!(
            store.get_rules("contracts/none.json").await,
            Err(TermError::ContractNotFound { .. })
        ));
    }
}
