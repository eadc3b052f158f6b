//! Query tools.
//!
//! This module implements the `find`, `find_one`, `count`, `distinct` and
//! `aggregate` MCP tools. Filters, projections and pipelines are passed to the
//! server uninterpreted.

use crate::db::convert::{
    JsonObject, bson_to_json, documents_to_json, document_to_json, json_to_documents,
    non_empty_document, optional_document, sort_document,
};
use crate::db::{ConnectionHolder, FindQuery, Namespace};
use crate::error::{GatewayError, GatewayResult};
use crate::tools::guard::PolicyGuard;
use futures_util::{StreamExt, TryStreamExt};
use mongodb::bson::Document;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info};

/// Default number of documents requested by find.
pub const DEFAULT_FIND_LIMIT: i64 = 20;

/// Message returned by find_one when nothing matches.
pub const NO_DOCUMENT_FOUND: &str = "No document found.";

fn default_find_limit() -> i64 {
    DEFAULT_FIND_LIMIT
}

/// Input for the find tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Query filter (MongoDB filter syntax). Omit to match all documents.
    #[serde(default)]
    pub filter: Option<JsonObject>,
    /// Fields to include/exclude (e.g., {"name": 1, "_id": 0})
    #[serde(default)]
    pub projection: Option<JsonObject>,
    /// Sort order (e.g., {"created_at": -1}). Key order is sort precedence.
    #[serde(default)]
    pub sort: Option<JsonObject>,
    /// Maximum documents to return. Default: 20, capped by the server's MAX_DOCUMENTS.
    /// 0 returns up to the cap.
    #[serde(default = "default_find_limit")]
    pub limit: i64,
}

/// Input for the find_one tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindOneInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Query filter
    #[serde(default)]
    pub filter: Option<JsonObject>,
    /// Fields to include/exclude
    #[serde(default)]
    pub projection: Option<JsonObject>,
}

/// Input for the count tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CountInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Query filter
    #[serde(default)]
    pub filter: Option<JsonObject>,
}

/// Input for the distinct tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DistinctInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Field name to get distinct values for
    pub field: String,
    /// Optional query filter
    #[serde(default)]
    pub filter: Option<JsonObject>,
}

/// Input for the aggregate tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AggregateInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Aggregation pipeline stages
    pub pipeline: Vec<JsonObject>,
}

/// Output for find and aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentsOutput {
    pub count: usize,
    pub documents: Vec<JsonValue>,
}

/// Output for the count tool.
#[derive(Debug, Clone, Serialize)]
pub struct CountOutput {
    pub count: u64,
}

/// Output for the distinct tool.
#[derive(Debug, Clone, Serialize)]
pub struct DistinctOutput {
    pub values: Vec<JsonValue>,
}

pub struct QueryToolHandler {
    holder: Arc<ConnectionHolder>,
    guard: PolicyGuard,
}

impl QueryToolHandler {
    pub fn new(holder: Arc<ConnectionHolder>, guard: PolicyGuard) -> Self {
        Self { holder, guard }
    }

    pub async fn find(&self, input: FindInput) -> GatewayResult<DocumentsOutput> {
        let client = self.holder.require().await?;
        let ns = Namespace::new(&input.database, &input.collection)?;

        if input.limit < 0 {
            return Err(GatewayError::invalid_input(format!(
                "limit must be zero or positive, got {}",
                input.limit
            )));
        }
        let limit = self.guard.effective_limit(input.limit);
        let query = FindQuery {
            filter: optional_document(input.filter, "filter")?,
            projection: non_empty_document(input.projection, "projection")?,
            sort: match input.sort {
                Some(sort) if !sort.is_empty() => Some(sort_document(sort)?),
                _ => None,
            },
            limit,
        };
        info!(namespace = %ns, filter = %query.filter, limit = limit, "find");

        let documents = client.find(&ns, query).await?;
        info!(namespace = %ns, returned = documents.len(), "find: returned documents");

        Ok(DocumentsOutput {
            count: documents.len(),
            documents: documents_to_json(&documents),
        })
    }

    /// First matching document, or `None` when nothing matches.
    pub async fn find_one(&self, input: FindOneInput) -> GatewayResult<Option<JsonValue>> {
        let client = self.holder.require().await?;
        let ns = Namespace::new(&input.database, &input.collection)?;
        let filter = optional_document(input.filter, "filter")?;
        let projection = non_empty_document(input.projection, "projection")?;
        info!(namespace = %ns, filter = %filter, "find_one");

        let document = client.find_one(&ns, filter, projection).await?;
        if document.is_none() {
            debug!(namespace = %ns, "find_one: no document found");
        }
        Ok(document.as_ref().map(document_to_json))
    }

    pub async fn count(&self, input: CountInput) -> GatewayResult<CountOutput> {
        let client = self.holder.require().await?;
        let ns = Namespace::new(&input.database, &input.collection)?;
        let filter = optional_document(input.filter, "filter")?;

        let count = client.count_documents(&ns, filter).await?;
        info!(namespace = %ns, count = count, "count");
        Ok(CountOutput { count })
    }

    pub async fn distinct(&self, input: DistinctInput) -> GatewayResult<DistinctOutput> {
        let client = self.holder.require().await?;
        let ns = Namespace::new(&input.database, &input.collection)?;
        if input.field.trim().is_empty() {
            return Err(GatewayError::invalid_input("field name cannot be empty"));
        }
        let filter = optional_document(input.filter, "filter")?;

        let values = client.distinct(&ns, &input.field, filter).await?;
        info!(
            namespace = %ns,
            field = %input.field,
            values = values.len(),
            "distinct"
        );
        Ok(DistinctOutput {
            values: values.iter().map(bson_to_json).collect(),
        })
    }

    /// Run a pipeline, consuming at most `max_documents` results.
    ///
    /// Truncation at the cap is silent.
    pub async fn aggregate(&self, input: AggregateInput) -> GatewayResult<DocumentsOutput> {
        let client = self.holder.require().await?;
        let ns = Namespace::new(&input.database, &input.collection)?;
        self.guard.ensure_pipeline_allowed(&input.pipeline)?;

        let cap = self.guard.result_cap();
        let stages = input.pipeline.len();
        let pipeline = json_to_documents(input.pipeline, "pipeline stage")?;
        info!(namespace = %ns, stages = stages, "aggregate");

        let documents: Vec<Document> = client
            .aggregate(&ns, pipeline)
            .await?
            .take(cap)
            .try_collect()
            .await?;
        info!(namespace = %ns, returned = documents.len(), "aggregate: returned documents");

        Ok(DocumentsOutput {
            count: documents.len(),
            documents: documents_to_json(&documents),
        })
    }
}
