use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use super::Catalog;
use crate::error::{ErrorContext, Result, TermError};
use crate::types::{ColumnSpec, TableSchema};

/// A catalog backed by table definition files on disk.
///
/// Each table lives at `<root>/<database>/<table>.json` in the shape returned
/// by a Glue `GetTable` call:
///
/// ```json
/// {
///   "Table": {
///     "StorageDescriptor": { "Columns": [{ "Name": "id", "Type": "int" }] },
///     "PartitionKeys": [{ "Name": "dt", "Type": "date" }]
///   }
/// }
/// ```
///
/// The outer `Table` wrapper is optional.
#[derive(Debug, Clone)]
pub struct JsonCatalog {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TableFile {
    Wrapped {
        #[serde(rename = "Table")]
        table: TableDefinition,
    },
    Bare(TableDefinition),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TableDefinition {
    storage_descriptor: StorageDescriptor,
    #[serde(default)]
    partition_keys: Vec<CatalogColumn>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StorageDescriptor {
    #[serde(default)]
    columns: Vec<CatalogColumn>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CatalogColumn {
    name: String,
    #[serde(default)]
    r#type: String,
}

impl JsonCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn table_path(&self, database: &str, table: &str) -> PathBuf {
        self.root.join(database).join(format!("{table}.json"))
    }
}

#[async_trait]
impl Catalog for JsonCatalog {
    #[instrument(skip(self), fields(catalog_type = "json", root = %self.root.display()))]
    async fn get_columns(&self, database: &str, table: &str) -> Result<TableSchema> {
        let path = self.table_path(database, table);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TermError::CatalogTableNotFound {
                    database: database.to_string(),
                    table: table.to_string(),
                })
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read table definition '{}'", path.display())
                })
            }
        };

        let definition = match serde_json::from_str::<TableFile>(&text).map_err(|e| {
            TermError::Configuration(format!(
                "Invalid table definition '{}': {e}",
                path.display()
            ))
        })? {
            TableFile::Wrapped { table } | TableFile::Bare(table) => table,
        };

        let columns: Vec<ColumnSpec> = definition
            .storage_descriptor
            .columns
            .into_iter()
            .chain(definition.partition_keys)
            .map(|c| ColumnSpec::new(c.name, c.r#type))
            .collect();
        debug!(columns = columns.len(), "Loaded table definition");
        TableSchema::new(database, table, columns)
    }
}
