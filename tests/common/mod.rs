//! In-memory stand-in for the MongoDB driver used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use mongodb_mcp_server::config::PolicyFlags;
use mongodb_mcp_server::db::{
    ClientHandle, ConnectionHolder, Connector, DocumentClient, DocumentStream, FindQuery,
    Namespace, UpdateOutcome, UpdateQuery,
};
use mongodb_mcp_server::error::{GatewayError, GatewayResult};
use mongodb_mcp_server::tools::PolicyGuard;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A driver call as observed by the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Ping,
    ListDatabases,
    ListCollections(String),
    RunCommand(String, Document),
    Find(Namespace, FindQuery),
    FindOne(Namespace, Document, Option<Document>),
    Count(Namespace, Document),
    Distinct(Namespace, String, Document),
    Aggregate(Namespace, Vec<Document>),
    InsertOne(Namespace, Document),
    InsertMany(Namespace, Vec<Document>),
    Update(Namespace, UpdateQuery),
    Delete(Namespace, Document, bool),
    Close,
}

/// Canned server state and behaviour.
#[derive(Debug, Clone, Default)]
pub struct FakeConfig {
    pub databases: Vec<String>,
    pub collections: Vec<String>,
    /// Returned by find, find_one, count and aggregate
    pub documents: Vec<Document>,
    /// Returned by run_command
    pub command_reply: Document,
    pub ping_error: Option<String>,
    pub ping_delay: Option<Duration>,
    /// Makes every data operation fail with this driver message
    pub operation_error: Option<String>,
    pub update_outcome: Option<UpdateOutcome>,
    pub deleted_count: u64,
}

#[derive(Debug)]
pub struct FakeClient {
    config: FakeConfig,
    calls: Mutex<Vec<Call>>,
    ping_fails: AtomicBool,
    closed: AtomicBool,
    pulled: Arc<AtomicUsize>,
}

impl FakeClient {
    pub fn new(config: FakeConfig) -> Self {
        let ping_fails = config.ping_error.is_some();
        Self {
            config,
            calls: Mutex::new(Vec::new()),
            ping_fails: AtomicBool::new(ping_fails),
            closed: AtomicBool::new(false),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self::new(FakeConfig {
            documents,
            ..FakeConfig::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than liveness pings and close.
    pub fn data_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::Ping | Call::Close))
            .collect()
    }

    pub fn last_call(&self) -> Option<Call> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn set_ping_fails(&self, fails: bool) {
        self.ping_fails.store(fails, Ordering::SeqCst);
    }

    /// Number of documents consumed from aggregation cursors.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn fail_if_configured(&self) -> GatewayResult<()> {
        match &self.config.operation_error {
            Some(message) => Err(GatewayError::operation_failed(message.clone())),
            None => Ok(()),
        }
    }

    fn id_of(document: &Document) -> Bson {
        document
            .get("_id")
            .cloned()
            .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()))
    }
}

#[async_trait]
impl DocumentClient for FakeClient {
    async fn ping(&self) -> GatewayResult<()> {
        self.record(Call::Ping);
        if let Some(delay) = self.config.ping_delay {
            tokio::time::sleep(delay).await;
        }
        if self.ping_fails.load(Ordering::SeqCst) {
            let message = self
                .config
                .ping_error
                .clone()
                .unwrap_or_else(|| "connection reset by peer".to_string());
            return Err(GatewayError::operation_failed(message));
        }
        Ok(())
    }

    async fn list_database_names(&self) -> GatewayResult<Vec<String>> {
        self.record(Call::ListDatabases);
        self.fail_if_configured()?;
        Ok(self.config.databases.clone())
    }

    async fn list_collection_names(&self, database: &str) -> GatewayResult<Vec<String>> {
        self.record(Call::ListCollections(database.to_string()));
        self.fail_if_configured()?;
        Ok(self.config.collections.clone())
    }

    async fn run_command(&self, database: &str, command: Document) -> GatewayResult<Document> {
        self.record(Call::RunCommand(database.to_string(), command));
        self.fail_if_configured()?;
        Ok(self.config.command_reply.clone())
    }

    async fn find(&self, ns: &Namespace, query: FindQuery) -> GatewayResult<Vec<Document>> {
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        self.record(Call::Find(ns.clone(), query));
        self.fail_if_configured()?;
        Ok(self.config.documents.iter().take(limit).cloned().collect())
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
        projection: Option<Document>,
    ) -> GatewayResult<Option<Document>> {
        self.record(Call::FindOne(ns.clone(), filter, projection));
        self.fail_if_configured()?;
        Ok(self.config.documents.first().cloned())
    }

    async fn count_documents(&self, ns: &Namespace, filter: Document) -> GatewayResult<u64> {
        self.record(Call::Count(ns.clone(), filter));
        self.fail_if_configured()?;
        Ok(self.config.documents.len() as u64)
    }

    async fn distinct(
        &self,
        ns: &Namespace,
        field: &str,
        filter: Document,
    ) -> GatewayResult<Vec<Bson>> {
        self.record(Call::Distinct(ns.clone(), field.to_string(), filter));
        self.fail_if_configured()?;
        let mut values: Vec<Bson> = Vec::new();
        for value in self.config.documents.iter().filter_map(|doc| doc.get(field)) {
            if !values.contains(value) {
                values.push(value.clone());
            }
        }
        Ok(values)
    }

    async fn aggregate(
        &self,
        ns: &Namespace,
        pipeline: Vec<Document>,
    ) -> GatewayResult<DocumentStream> {
        self.record(Call::Aggregate(ns.clone(), pipeline));
        self.fail_if_configured()?;
        let pulled = self.pulled.clone();
        Ok(stream::iter(self.config.documents.clone())
            .map(move |doc| {
                pulled.fetch_add(1, Ordering::SeqCst);
                Ok(doc)
            })
            .boxed())
    }

    async fn insert_one(&self, ns: &Namespace, document: Document) -> GatewayResult<Bson> {
        let id = Self::id_of(&document);
        self.record(Call::InsertOne(ns.clone(), document));
        self.fail_if_configured()?;
        Ok(id)
    }

    async fn insert_many(
        &self,
        ns: &Namespace,
        documents: Vec<Document>,
    ) -> GatewayResult<Vec<Bson>> {
        let ids = documents.iter().map(Self::id_of).collect();
        self.record(Call::InsertMany(ns.clone(), documents));
        self.fail_if_configured()?;
        Ok(ids)
    }

    async fn update(&self, ns: &Namespace, query: UpdateQuery) -> GatewayResult<UpdateOutcome> {
        self.record(Call::Update(ns.clone(), query));
        self.fail_if_configured()?;
        Ok(self.config.update_outcome.clone().unwrap_or(UpdateOutcome {
            matched_count: 0,
            modified_count: 0,
            upserted_id: None,
        }))
    }

    async fn delete(&self, ns: &Namespace, filter: Document, many: bool) -> GatewayResult<u64> {
        self.record(Call::Delete(ns.clone(), filter, many));
        self.fail_if_configured()?;
        Ok(self.config.deleted_count)
    }

    async fn close(&self) {
        self.record(Call::Close);
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out [`FakeClient`]s.
///
/// URIs containing `unreachable` produce a client whose liveness ping fails;
/// URIs containing `malformed` are rejected outright.
#[derive(Debug, Default)]
pub struct FakeConnector {
    config: FakeConfig,
    uris: Mutex<Vec<String>>,
    clients: Mutex<Vec<Arc<FakeClient>>>,
}

impl FakeConnector {
    pub fn new(config: FakeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }

    pub fn clients(&self) -> Vec<Arc<FakeClient>> {
        self.clients.lock().unwrap().clone()
    }

    pub fn last_client(&self) -> Arc<FakeClient> {
        self.clients().last().cloned().expect("no client created")
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, uri: &str) -> GatewayResult<ClientHandle> {
        self.uris.lock().unwrap().push(uri.to_string());
        if uri.contains("malformed") {
            return Err(GatewayError::connection_failed(
                "URI must begin with 'mongodb://' or 'mongodb+srv://'",
            ));
        }
        let mut config = self.config.clone();
        if uri.contains("unreachable") {
            config.ping_error = Some("Server selection timeout: No available servers".into());
        }
        let client = Arc::new(FakeClient::new(config));
        self.clients.lock().unwrap().push(client.clone());
        Ok(client)
    }
}

/// A holder that already contains `client`.
pub async fn connected_holder(client: Arc<FakeClient>) -> Arc<ConnectionHolder> {
    let holder = Arc::new(ConnectionHolder::new());
    holder.set(Some(client)).await;
    holder
}

pub fn read_write() -> PolicyGuard {
    PolicyGuard::fixed(PolicyFlags::default())
}

pub fn read_only() -> PolicyGuard {
    PolicyGuard::fixed(PolicyFlags {
        read_only: true,
        ..PolicyFlags::default()
    })
}

pub fn capped(max_documents: u32) -> PolicyGuard {
    PolicyGuard::fixed(PolicyFlags {
        read_only: false,
        max_documents,
    })
}

/// Parse a JSON object literal into a transport object.
pub fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected JSON object, got {}", other),
    }
}
