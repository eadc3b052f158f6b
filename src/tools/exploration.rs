//! Schema exploration tools.
//!
//! This module implements the `list_databases`, `list_collections`,
//! `collection_stats` and `collection_schema` MCP tools.

use crate::db::convert::{bson_to_json, type_name};
use crate::db::{ConnectionHolder, Namespace};
use crate::error::{GatewayError, GatewayResult};
use futures_util::TryStreamExt;
use indexmap::IndexMap;
use mongodb::bson::{Document, doc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

/// Default number of documents sampled by collection_schema.
pub const DEFAULT_SAMPLE_SIZE: i64 = 5;

/// Message returned when there is nothing to sample.
pub const EMPTY_COLLECTION_MESSAGE: &str = "Collection is empty, cannot infer schema.";

/// Fields kept from the collStats command output.
pub const STATS_FIELDS: [&str; 7] = [
    "ns",
    "count",
    "size",
    "avgObjSize",
    "storageSize",
    "nindexes",
    "totalIndexSize",
];

/// Input for the list_collections tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListCollectionsInput {
    /// Database name
    pub database: String,
}

/// Input for the collection_stats tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CollectionStatsInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
}

fn default_sample_size() -> i64 {
    DEFAULT_SAMPLE_SIZE
}

/// Input for the collection_schema tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CollectionSchemaInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Number of documents to sample. Default: 5
    #[serde(default = "default_sample_size")]
    pub sample_size: i64,
}

/// Output for the list_databases tool.
#[derive(Debug, Clone, Serialize)]
pub struct ListDatabasesOutput {
    pub databases: Vec<String>,
}

/// Output for the list_collections tool.
#[derive(Debug, Clone, Serialize)]
pub struct ListCollectionsOutput {
    pub database: String,
    pub collections: Vec<String>,
}

/// Output for the collection_stats tool. Only whitelisted fields survive.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStatsOutput(pub serde_json::Map<String, JsonValue>);

/// Output for the collection_schema tool.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSchemaOutput {
    pub database: String,
    pub collection: String,
    pub sampled_docs: usize,
    /// Field name -> sorted list of observed type names
    pub inferred_schema: InferredSchema,
}

/// Outcome of schema inference.
#[derive(Debug, Clone)]
pub enum SchemaOutcome {
    /// Nothing sampled
    Empty,
    Inferred(CollectionSchemaOutput),
}

/// Union of observed type names per top-level field, in first-seen field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InferredSchema {
    fields: IndexMap<String, BTreeSet<&'static str>>,
}

impl InferredSchema {
    pub fn observe(&mut self, field: &str, type_name: &'static str) {
        match self.fields.get_mut(field) {
            Some(types) => {
                types.insert(type_name);
            }
            None => {
                self.fields
                    .insert(field.to_string(), BTreeSet::from([type_name]));
            }
        }
    }

    /// Observed types for `field`, sorted.
    pub fn types(&self, field: &str) -> Option<Vec<&'static str>> {
        self.fields
            .get(field)
            .map(|types| types.iter().copied().collect())
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub struct ExplorationToolHandler {
    holder: Arc<ConnectionHolder>,
}

impl ExplorationToolHandler {
    pub fn new(holder: Arc<ConnectionHolder>) -> Self {
        Self { holder }
    }

    pub async fn list_databases(&self) -> GatewayResult<ListDatabasesOutput> {
        let client = self.holder.require().await?;
        let databases = client.list_database_names().await?;
        info!(count = databases.len(), "Listed databases");
        Ok(ListDatabasesOutput { databases })
    }

    pub async fn list_collections(
        &self,
        input: ListCollectionsInput,
    ) -> GatewayResult<ListCollectionsOutput> {
        let client = self.holder.require().await?;
        let database = input.database.trim().to_string();
        if database.is_empty() {
            return Err(GatewayError::invalid_input("database name cannot be empty"));
        }
        let collections = client.list_collection_names(&database).await?;
        info!(
            database = %database,
            count = collections.len(),
            "Listed collections"
        );
        Ok(ListCollectionsOutput {
            database,
            collections,
        })
    }

    pub async fn collection_stats(
        &self,
        input: CollectionStatsInput,
    ) -> GatewayResult<CollectionStatsOutput> {
        let client = self.holder.require().await?;
        let ns = Namespace::new(&input.database, &input.collection)?;
        let stats = client
            .run_command(&ns.database, doc! { "collStats": ns.collection.as_str() })
            .await?;

        let relevant = STATS_FIELDS
            .iter()
            .map(|field| {
                let value = stats.get(*field).map_or(JsonValue::Null, bson_to_json);
                (field.to_string(), value)
            })
            .collect();
        info!(namespace = %ns, count = ?stats.get("count"), "Retrieved collection stats");
        Ok(CollectionStatsOutput(relevant))
    }

    /// Infer a best-effort schema from a random sample.
    pub async fn collection_schema(
        &self,
        input: CollectionSchemaInput,
    ) -> GatewayResult<SchemaOutcome> {
        let client = self.holder.require().await?;
        let ns = Namespace::new(&input.database, &input.collection)?;
        if input.sample_size < 1 {
            return Err(GatewayError::invalid_input(format!(
                "sample_size must be at least 1, got {}",
                input.sample_size
            )));
        }

        let pipeline = vec![doc! { "$sample": { "size": input.sample_size } }];
        let samples: Vec<Document> = client.aggregate(&ns, pipeline).await?.try_collect().await?;

        if samples.is_empty() {
            info!(namespace = %ns, "Collection is empty");
            return Ok(SchemaOutcome::Empty);
        }

        let mut schema = InferredSchema::default();
        for doc in &samples {
            for (key, value) in doc {
                schema.observe(key, type_name(value));
            }
        }
        info!(
            namespace = %ns,
            samples = samples.len(),
            fields = schema.len(),
            "Inferred schema"
        );

        Ok(SchemaOutcome::Inferred(CollectionSchemaOutput {
            database: ns.database,
            collection: ns.collection,
            sampled_docs: samples.len(),
            inferred_schema: schema,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_input_default_sample_size() {
        let input: CollectionSchemaInput =
            serde_json::from_str(r#"{"database": "db", "collection": "c"}"#).unwrap();
        assert_eq!(input.sample_size, DEFAULT_SAMPLE_SIZE);
    }

    #[test]
    fn test_inferred_schema_unions_types() {
        let mut schema = InferredSchema::default();
        schema.observe("x", "int");
        schema.observe("y", "string");
        schema.observe("x", "string");
        schema.observe("x", "int");
        assert_eq!(schema.types("x"), Some(vec!["int", "string"]));
        assert_eq!(schema.field_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_inferred_schema_serializes_as_map() {
        let mut schema = InferredSchema::default();
        schema.observe("b", "int");
        schema.observe("a", "bool");
        let text = serde_json::to_string(&schema).unwrap();
        assert_eq!(text, r#"{"b":["int"],"a":["bool"]}"#);
    }
}
