//! Write operation tools.
//!
//! This module implements the insert, update and delete MCP tools. Every tool
//! here is blocked when the server runs in read-only mode.

use crate::db::convert::{JsonObject, bson_to_json, json_to_bson, json_to_document, json_to_documents};
use crate::db::{ClientHandle, ConnectionHolder, Namespace, UpdateQuery, UpdateSpec};
use crate::error::{GatewayError, GatewayResult};
use crate::tools::guard::PolicyGuard;
use mongodb::bson::Bson;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the insert_one tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertOneInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Document to insert
    pub document: JsonObject,
}

/// Input for the insert_many tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertManyInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// List of documents to insert
    pub documents: Vec<JsonObject>,
}

/// Input for the update_one and update_many tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Filter to find documents
    pub filter: JsonObject,
    /// Update operations (e.g., {"$set": {"status": "active"}}) or an update pipeline (array of stages)
    pub update: JsonValue,
    /// If true, create a new document if no match found. Default: false
    #[serde(default)]
    pub upsert: bool,
}

/// Input for the delete_one and delete_many tools.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteInput {
    /// Database name
    pub database: String,
    /// Collection name
    pub collection: String,
    /// Filter to find documents to delete
    pub filter: JsonObject,
}

/// Output from insert_one.
#[derive(Debug, Clone, Serialize)]
pub struct InsertOneOutput {
    pub inserted_id: String,
}

/// Output from insert_many.
#[derive(Debug, Clone, Serialize)]
pub struct InsertManyOutput {
    pub inserted_count: usize,
    pub inserted_ids: Vec<String>,
}

/// Output from update_one and update_many.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutput {
    pub matched_count: u64,
    pub modified_count: u64,
    /// Present only when an upsert inserted a document
    pub upserted_id: Option<String>,
}

/// Output from delete_one and delete_many.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutput {
    pub deleted_count: u64,
}

/// Render an identifier as a plain string.
pub fn id_to_string(id: &Bson) -> String {
    match bson_to_json(id) {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

fn update_spec(update: JsonValue) -> GatewayResult<UpdateSpec> {
    match update {
        JsonValue::Object(object) => Ok(UpdateSpec::Document(json_to_document(object, "update")?)),
        JsonValue::Array(stages) => {
            let stages = stages
                .into_iter()
                .map(|stage| match json_to_bson(stage, "update stage")? {
                    Bson::Document(doc) => Ok(doc),
                    _ => Err(GatewayError::invalid_input(
                        "update pipeline stages must be documents",
                    )),
                })
                .collect::<GatewayResult<Vec<_>>>()?;
            Ok(UpdateSpec::Pipeline(stages))
        }
        _ => Err(GatewayError::invalid_input(
            "update must be a document or an array of pipeline stages",
        )),
    }
}

pub struct CrudToolHandler {
    holder: Arc<ConnectionHolder>,
    guard: PolicyGuard,
}

impl CrudToolHandler {
    pub fn new(holder: Arc<ConnectionHolder>, guard: PolicyGuard) -> Self {
        Self { holder, guard }
    }

    /// Resolve the active client, then check read-only mode.
    async fn writable_client(&self, operation: &str) -> GatewayResult<ClientHandle> {
        let client = self.holder.require().await?;
        self.guard.ensure_writable(operation)?;
        Ok(client)
    }

    pub async fn insert_one(&self, input: InsertOneInput) -> GatewayResult<InsertOneOutput> {
        let client = self.writable_client("insert_one").await?;
        let ns = Namespace::new(&input.database, &input.collection)?;
        let document = json_to_document(input.document, "document")?;

        let inserted_id = client.insert_one(&ns, document).await?;
        let inserted_id = id_to_string(&inserted_id);
        info!(namespace = %ns, inserted_id = %inserted_id, "insert_one");
        Ok(InsertOneOutput { inserted_id })
    }

    pub async fn insert_many(&self, input: InsertManyInput) -> GatewayResult<InsertManyOutput> {
        let client = self.writable_client("insert_many").await?;
        let ns = Namespace::new(&input.database, &input.collection)?;
        if input.documents.is_empty() {
            return Err(GatewayError::invalid_input("documents must not be empty"));
        }
        let documents = json_to_documents(input.documents, "document")?;

        let ids = client.insert_many(&ns, documents).await?;
        let inserted_ids: Vec<String> = ids.iter().map(id_to_string).collect();
        info!(namespace = %ns, inserted = inserted_ids.len(), "insert_many");
        Ok(InsertManyOutput {
            inserted_count: inserted_ids.len(),
            inserted_ids,
        })
    }

    pub async fn update_one(&self, input: UpdateInput) -> GatewayResult<UpdateOutput> {
        self.update("update_one", input, false).await
    }

    pub async fn update_many(&self, input: UpdateInput) -> GatewayResult<UpdateOutput> {
        self.update("update_many", input, true).await
    }

    async fn update(
        &self,
        operation: &str,
        input: UpdateInput,
        many: bool,
    ) -> GatewayResult<UpdateOutput> {
        let client = self.writable_client(operation).await?;
        let ns = Namespace::new(&input.database, &input.collection)?;
        let query = UpdateQuery {
            filter: json_to_document(input.filter, "filter")?,
            update: update_spec(input.update)?,
            upsert: input.upsert,
            many,
        };

        let outcome = client.update(&ns, query).await?;
        info!(
            namespace = %ns,
            operation = operation,
            matched = outcome.matched_count,
            modified = outcome.modified_count,
            "update"
        );
        Ok(UpdateOutput {
            matched_count: outcome.matched_count,
            modified_count: outcome.modified_count,
            upserted_id: outcome.upserted_id.as_ref().map(id_to_string),
        })
    }

    pub async fn delete_one(&self, input: DeleteInput) -> GatewayResult<DeleteOutput> {
        self.delete("delete_one", input, false).await
    }

    pub async fn delete_many(&self, input: DeleteInput) -> GatewayResult<DeleteOutput> {
        self.delete("delete_many", input, true).await
    }

    async fn delete(
        &self,
        operation: &str,
        input: DeleteInput,
        many: bool,
    ) -> GatewayResult<DeleteOutput> {
        let client = self.writable_client(operation).await?;
        let ns = Namespace::new(&input.database, &input.collection)?;
        let filter = json_to_document(input.filter, "filter")?;

        let deleted_count = client.delete(&ns, filter, many).await?;
        info!(
            namespace = %ns,
            operation = operation,
            deleted = deleted_count,
            "delete"
        );
        Ok(DeleteOutput { deleted_count })
    }
}
