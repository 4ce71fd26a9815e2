//! Table catalogs: where target schemas come from.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::error::{Result, TermError};
use crate::types::TableSchema;

mod json;

pub use json::JsonCatalog;

/// Resolves a table's column names and declared types.
#[async_trait]
pub trait Catalog: Debug + Send + Sync {
    /// Returns the table's regular columns followed by its partition columns.
    ///
    /// Fails with [`TermError::CatalogTableNotFound`] when the table is unknown.
    async fn get_columns(&self, database: &str, table: &str) -> Result<TableSchema>;
}

/// A catalog held in memory, mainly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tables: Arc<RwLock<HashMap<(String, String), TableSchema>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a table definition.
    pub async fn register(&self, schema: TableSchema) {
        let key = (schema.database.clone(), schema.table.clone());
        self.tables.write().await.insert(key, schema);
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tables.read().await.is_empty()
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    #[instrument(skip(self), fields(catalog_type = "in_memory"))]
    async fn get_columns(&self, database: &str, table: &str) -> Result<TableSchema> {
        self.tables
            .read()
            .await
            .get(&(database.to_string(), table.to_string()))
            .cloned()
            .ok_or_else(|| TermError::CatalogTableNotFound {
                database: database.to_string(),
                table: table.to_string(),
            })
    }
}
