//! MCP tool implementations.
//!
//! This module contains all MongoDB tool handlers:
//! - `connection`: connect, disconnect, connection_status
//! - `exploration`: list_databases, list_collections, collection_stats, collection_schema
//! - `query`: find, find_one, count, distinct, aggregate
//! - `crud`: insert, update and delete tools
//! - `guard`: read-only and result cap enforcement
//! - `response`: the text envelope every tool returns

pub mod connection;
pub mod crud;
pub mod exploration;
pub mod guard;
pub mod query;
pub mod response;

pub use connection::{
    ConnectInput, Connected, ConnectionStatus, ConnectionToolHandler, DisconnectOutcome,
    redact_uri,
};
pub use crud::{
    CrudToolHandler, DeleteInput, DeleteOutput, InsertManyInput, InsertManyOutput,
    InsertOneInput, InsertOneOutput, UpdateInput, UpdateOutput,
};
pub use exploration::{
    CollectionSchemaInput, CollectionSchemaOutput, CollectionStatsInput, CollectionStatsOutput,
    ExplorationToolHandler, InferredSchema, ListCollectionsInput, ListCollectionsOutput,
    ListDatabasesOutput, SchemaOutcome,
};
pub use guard::{PipelineCheckResult, PolicyGuard, check_pipeline};
pub use query::{
    AggregateInput, CountInput, CountOutput, DistinctInput, DistinctOutput, DocumentsOutput,
    FindInput, FindOneInput, QueryToolHandler,
};
pub use response::{ToolResponse, decode_arguments, respond};
