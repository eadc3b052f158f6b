//! MCP service implementation using rmcp.
//!
//! This module defines the MongoService struct with all MongoDB tools
//! exposed via the MCP protocol using the rmcp framework's macros. The
//! `#[tool_router]` block is the complete tool registry; it is built once per
//! service and can be enumerated with `tool_router().list_all()`.
//!
//! Tools receive their arguments as a raw JSON object and decode them in the
//! body, so malformed arguments come back as `Error:` text. The advertised
//! input schema is still generated from the typed input struct.

use crate::db::convert::JsonObject;
use crate::db::{ConnectionHolder, Connector};
use crate::error::GatewayResult;
use crate::tools::connection::{ConnectInput, ConnectionToolHandler};
use crate::tools::crud::{
    CrudToolHandler, DeleteInput, InsertManyInput, InsertOneInput, UpdateInput,
};
use crate::tools::exploration::{
    CollectionSchemaInput, CollectionStatsInput, EMPTY_COLLECTION_MESSAGE,
    ExplorationToolHandler, ListCollectionsInput, SchemaOutcome,
};
use crate::tools::guard::PolicyGuard;
use crate::tools::query::{
    AggregateInput, CountInput, DistinctInput, FindInput, FindOneInput, NO_DOCUMENT_FOUND,
    QueryToolHandler,
};
use crate::tools::response::{ToolResponse, decode_arguments, respond};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::common::schema_for_type,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct MongoService {
    /// Process-wide connection slot shared by every tool call
    holder: Arc<ConnectionHolder>,
    /// Opens new driver clients for `connect`
    connector: Arc<dyn Connector>,
    /// Read-only and result cap policy, re-read per call
    guard: PolicyGuard,
    /// Connection string used when `connect` is called without one
    default_uri: Option<String>,
    /// Bound on the liveness check used by connect and connection_status
    liveness_timeout: Duration,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl MongoService {
    /// Create a new MongoService instance.
    ///
    /// # Arguments
    ///
    /// * `holder` - Shared connection slot, also used by the shutdown path
    /// * `connector` - Factory for driver clients
    /// * `guard` - Policy guard for read-only mode and result caps
    /// * `default_uri` - Fallback connection string for `connect`
    /// * `liveness_timeout` - Timeout applied to the liveness ping
    pub fn new(
        holder: Arc<ConnectionHolder>,
        connector: Arc<dyn Connector>,
        guard: PolicyGuard,
        default_uri: Option<String>,
        liveness_timeout: Duration,
    ) -> Self {
        Self {
            holder,
            connector,
            guard,
            default_uri,
            liveness_timeout,
            tool_router: Self::tool_router(),
        }
    }

    pub fn holder(&self) -> &Arc<ConnectionHolder> {
        &self.holder
    }

    fn connection_handler(&self) -> ConnectionToolHandler {
        ConnectionToolHandler::new(
            self.holder.clone(),
            self.connector.clone(),
            self.default_uri.clone(),
            self.liveness_timeout,
        )
    }

    fn exploration_handler(&self) -> ExplorationToolHandler {
        ExplorationToolHandler::new(self.holder.clone())
    }

    fn query_handler(&self) -> QueryToolHandler {
        QueryToolHandler::new(self.holder.clone(), self.guard.clone())
    }

    fn crud_handler(&self) -> CrudToolHandler {
        CrudToolHandler::new(self.holder.clone(), self.guard.clone())
    }

    /// Decode arguments for a tool that needs the connection. A disconnected
    /// server answers NotConnected whatever the arguments look like.
    async fn connected_arguments<T: DeserializeOwned>(
        &self,
        arguments: JsonObject,
    ) -> GatewayResult<T> {
        self.holder.require().await?;
        decode_arguments(arguments)
    }

    fn instructions(&self) -> String {
        let flags = self.guard.flags();
        let mode = if flags.read_only {
            "READ-ONLY: insert, update and delete tools and aggregations with $out or $merge are rejected."
        } else {
            "Read-write: all tools are available."
        };
        format!(
            "MongoDB tools for exploring, querying and modifying documents.\n\
            \n\
            ## Workflow\n\
            1. Call `connect` (optionally with `connection_string`; defaults to MONGODB_URI)\n\
            2. Explore with `list_databases`, `list_collections`, `collection_stats`, `collection_schema`\n\
            3. Query with `find`, `find_one`, `count`, `distinct`, `aggregate`\n\
            4. Call `disconnect` when done\n\
            \n\
            ## Policy\n\
            - Mode: {}\n\
            - `find` and `aggregate` return at most {} documents\n\
            \n\
            ## Arguments\n\
            Filters, projections, sorts and pipelines use MongoDB query syntax and accept \
            extended JSON values such as {{\"$oid\": \"...\"}} and {{\"$date\": \"...\"}}.\n\
            Sort key order is sort precedence.\n\
            \n\
            ## Errors\n\
            Failures are returned as text starting with \"Error: \".",
            mode, flags.max_documents
        )
    }
}

#[tool_router]
impl MongoService {
    #[tool(
        description = "Connect to a MongoDB instance.\nUses the MONGODB_URI environment variable when connection_string is omitted.\nReplaces any existing connection.",
        input_schema = schema_for_type::<ConnectInput>()
    )]
    async fn connect(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = decode_arguments(arguments)?;
            let connected = self.connection_handler().connect(input).await?;
            Ok(ToolResponse::message(connected.to_string()))
        }
        .await;
        Ok(respond("connect", result))
    }

    #[tool(description = "Disconnect from MongoDB. Safe to call when not connected.")]
    async fn disconnect(&self) -> Result<CallToolResult, McpError> {
        let outcome = self.connection_handler().disconnect().await;
        Ok(respond("disconnect", Ok(ToolResponse::message(outcome.to_string()))))
    }

    #[tool(description = "Check whether the MongoDB connection is alive.")]
    async fn connection_status(&self) -> Result<CallToolResult, McpError> {
        let status = self.connection_handler().status().await;
        Ok(respond(
            "connection_status",
            Ok(ToolResponse::message(status.to_string())),
        ))
    }

    #[tool(description = "List all databases on the connected server.")]
    async fn list_databases(&self) -> Result<CallToolResult, McpError> {
        let result = self.exploration_handler().list_databases().await;
        Ok(respond(
            "list_databases",
            result.and_then(|output| ToolResponse::json(&output)),
        ))
    }

    #[tool(
        description = "List all collections in a database.",
        input_schema = schema_for_type::<ListCollectionsInput>()
    )]
    async fn list_collections(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.exploration_handler().list_collections(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("list_collections", result))
    }

    #[tool(
        description = "Get collection statistics: ns, count, size, avgObjSize, storageSize, nindexes, totalIndexSize.",
        input_schema = schema_for_type::<CollectionStatsInput>()
    )]
    async fn collection_stats(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.exploration_handler().collection_stats(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("collection_stats", result))
    }

    #[tool(
        description = "Infer a collection's schema from a random sample of documents.\nReturns the observed BSON type names per top-level field. Best effort, not a contract.",
        input_schema = schema_for_type::<CollectionSchemaInput>()
    )]
    async fn collection_schema(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            match self.exploration_handler().collection_schema(input).await? {
                SchemaOutcome::Empty => Ok(ToolResponse::message(EMPTY_COLLECTION_MESSAGE)),
                SchemaOutcome::Inferred(output) => ToolResponse::json(&output),
            }
        }
        .await;
        Ok(respond("collection_schema", result))
    }

    #[tool(
        description = "Find documents matching a filter.\nSupports projection, sort (key order is precedence) and limit.\nThe limit is capped by the server's MAX_DOCUMENTS setting; 0 returns up to the cap.",
        input_schema = schema_for_type::<FindInput>()
    )]
    async fn find(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.query_handler().find(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("find", result))
    }

    #[tool(
        description = "Find a single document matching a filter.",
        input_schema = schema_for_type::<FindOneInput>()
    )]
    async fn find_one(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            match self.query_handler().find_one(input).await? {
                Some(document) => ToolResponse::json(&document),
                None => Ok(ToolResponse::message(NO_DOCUMENT_FOUND)),
            }
        }
        .await;
        Ok(respond("find_one", result))
    }

    #[tool(
        description = "Count documents matching a filter (exact count).",
        input_schema = schema_for_type::<CountInput>()
    )]
    async fn count(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.query_handler().count(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("count", result))
    }

    #[tool(
        description = "Get the distinct values of a field, optionally filtered.",
        input_schema = schema_for_type::<DistinctInput>()
    )]
    async fn distinct(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.query_handler().distinct(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("distinct", result))
    }

    #[tool(
        description = "Run an aggregation pipeline.\nResults are truncated to the server's MAX_DOCUMENTS setting.\n$out and $merge stages are rejected in read-only mode.",
        input_schema = schema_for_type::<AggregateInput>()
    )]
    async fn aggregate(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.query_handler().aggregate(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("aggregate", result))
    }

    #[tool(
        description = "Insert a single document. Returns the inserted _id.",
        input_schema = schema_for_type::<InsertOneInput>()
    )]
    async fn insert_one(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.crud_handler().insert_one(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("insert_one", result))
    }

    #[tool(
        description = "Insert multiple documents. Returns the inserted _ids in input order.",
        input_schema = schema_for_type::<InsertManyInput>()
    )]
    async fn insert_many(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.crud_handler().insert_many(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("insert_many", result))
    }

    #[tool(
        description = "Update the first document matching a filter.\nAccepts an update document or an update pipeline. Set upsert to insert when nothing matches.",
        input_schema = schema_for_type::<UpdateInput>()
    )]
    async fn update_one(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.crud_handler().update_one(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("update_one", result))
    }

    #[tool(
        description = "Update all documents matching a filter.\nAccepts an update document or an update pipeline. Set upsert to insert when nothing matches.",
        input_schema = schema_for_type::<UpdateInput>()
    )]
    async fn update_many(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.crud_handler().update_many(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("update_many", result))
    }

    #[tool(
        description = "Delete the first document matching a filter.",
        input_schema = schema_for_type::<DeleteInput>()
    )]
    async fn delete_one(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.crud_handler().delete_one(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("delete_one", result))
    }

    #[tool(
        description = "Delete all documents matching a filter.",
        input_schema = schema_for_type::<DeleteInput>()
    )]
    async fn delete_many(
        &self,
        Parameters(arguments): Parameters<JsonObject>,
    ) -> Result<CallToolResult, McpError> {
        let result: GatewayResult<ToolResponse> = async {
            let input = self.connected_arguments(arguments).await?;
            let output = self.crud_handler().delete_many(input).await?;
            ToolResponse::json(&output)
        }
        .await;
        Ok(respond("delete_many", result))
    }
}

#[tool_handler]
impl ServerHandler for MongoService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "mongodb-mcp-server".to_owned(),
                title: Some("MongoDB MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(self.instructions()),
        }
    }
}
