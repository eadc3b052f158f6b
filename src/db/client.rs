//! Driver seam.
//!
//! Tool handlers talk to the database exclusively through these traits so the
//! MongoDB driver can be swapped for an in-memory fake in tests.

use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use mongodb::bson::{Bson, Document};
use std::fmt;
use std::sync::Arc;

/// Stream of documents produced by a server-side cursor.
pub type DocumentStream = BoxStream<'static, GatewayResult<Document>>;

/// Target `database.collection` of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    /// Build a namespace, rejecting empty names.
    pub fn new(database: &str, collection: &str) -> GatewayResult<Self> {
        let database = database.trim();
        let collection = collection.trim();
        if database.is_empty() {
            return Err(GatewayError::invalid_input("database name cannot be empty"));
        }
        if collection.is_empty() {
            return Err(GatewayError::invalid_input(
                "collection name cannot be empty",
            ));
        }
        Ok(Self {
            database: database.to_string(),
            collection: collection.to_string(),
        })
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Parameters of a `find` call after argument conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct FindQuery {
    pub filter: Document,
    pub projection: Option<Document>,
    /// Key order is sort precedence.
    pub sort: Option<Document>,
    /// Always positive; already capped by the policy guard.
    pub limit: i64,
}

/// Update specification: either an update document or an update pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSpec {
    Document(Document),
    Pipeline(Vec<Document>),
}

/// Parameters of an `update_one`/`update_many` call.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateQuery {
    pub filter: Document,
    pub update: UpdateSpec,
    pub upsert: bool,
    pub many: bool,
}

/// Outcome of an update as reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

/// A live session to a database server.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Lightweight round-trip used as liveness check.
    async fn ping(&self) -> GatewayResult<()>;

    async fn list_database_names(&self) -> GatewayResult<Vec<String>>;

    async fn list_collection_names(&self, database: &str) -> GatewayResult<Vec<String>>;

    async fn run_command(&self, database: &str, command: Document) -> GatewayResult<Document>;

    async fn find(&self, ns: &Namespace, query: FindQuery) -> GatewayResult<Vec<Document>>;

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
        projection: Option<Document>,
    ) -> GatewayResult<Option<Document>>;

    /// Exact count of matching documents.
    async fn count_documents(&self, ns: &Namespace, filter: Document) -> GatewayResult<u64>;

    async fn distinct(
        &self,
        ns: &Namespace,
        field: &str,
        filter: Document,
    ) -> GatewayResult<Vec<Bson>>;

    /// Open an aggregation cursor. Callers decide how much of it to consume.
    async fn aggregate(
        &self,
        ns: &Namespace,
        pipeline: Vec<Document>,
    ) -> GatewayResult<DocumentStream>;

    async fn insert_one(&self, ns: &Namespace, document: Document) -> GatewayResult<Bson>;

    /// Returns the inserted ids in input order.
    async fn insert_many(&self, ns: &Namespace, documents: Vec<Document>)
    -> GatewayResult<Vec<Bson>>;

    async fn update(&self, ns: &Namespace, query: UpdateQuery) -> GatewayResult<UpdateOutcome>;

    async fn delete(&self, ns: &Namespace, filter: Document, many: bool) -> GatewayResult<u64>;

    /// Release the session. Further calls may fail.
    async fn close(&self);
}

/// Opens sessions from connection URIs.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Create a client for `uri`. No liveness check is implied.
    async fn connect(&self, uri: &str) -> GatewayResult<Arc<dyn DocumentClient>>;
}
