//! MongoDB implementation of the driver seam.

use crate::db::client::{
    Connector, DocumentClient, DocumentStream, FindQuery, Namespace, UpdateOutcome, UpdateQuery,
    UpdateSpec,
};
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use mongodb::bson::{Bson, Document, doc};
use mongodb::options::{
    ClientOptions, FindOneOptions, FindOptions, UpdateModifications, UpdateOptions,
};
use mongodb::{Client, Collection};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const APP_NAME: &str = "mongodb-mcp-server";

/// Creates [`MongoClient`]s with bounded server selection time.
#[derive(Debug, Clone)]
pub struct MongoConnector {
    connect_timeout: Duration,
}

impl MongoConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for MongoConnector {
    async fn connect(&self, uri: &str) -> GatewayResult<Arc<dyn DocumentClient>> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| GatewayError::connection_failed(e.to_string()))?;
        options.server_selection_timeout = Some(self.connect_timeout);
        options.connect_timeout = Some(self.connect_timeout);
        if options.app_name.is_none() {
            options.app_name = Some(APP_NAME.to_string());
        }

        let client = Client::with_options(options)
            .map_err(|e| GatewayError::connection_failed(e.to_string()))?;
        debug!(
            timeout_secs = self.connect_timeout.as_secs(),
            "MongoDB client created"
        );
        Ok(Arc::new(MongoClient { client }))
    }
}

/// A driver client. Cloning the inner client is cheap and shares the pool.
#[derive(Debug, Clone)]
pub struct MongoClient {
    client: Client,
}

impl MongoClient {
    fn collection(&self, ns: &Namespace) -> Collection<Document> {
        self.client
            .database(&ns.database)
            .collection::<Document>(&ns.collection)
    }
}

#[async_trait]
impl DocumentClient for MongoClient {
    async fn ping(&self) -> GatewayResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    async fn list_database_names(&self) -> GatewayResult<Vec<String>> {
        Ok(self.client.list_database_names().await?)
    }

    async fn list_collection_names(&self, database: &str) -> GatewayResult<Vec<String>> {
        Ok(self
            .client
            .database(database)
            .list_collection_names()
            .await?)
    }

    async fn run_command(&self, database: &str, command: Document) -> GatewayResult<Document> {
        Ok(self.client.database(database).run_command(command).await?)
    }

    async fn find(&self, ns: &Namespace, query: FindQuery) -> GatewayResult<Vec<Document>> {
        let mut options = FindOptions::default();
        options.projection = query.projection;
        options.sort = query.sort;
        options.limit = Some(query.limit);

        let cursor = self
            .collection(ns)
            .find(query.filter)
            .with_options(options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_one(
        &self,
        ns: &Namespace,
        filter: Document,
        projection: Option<Document>,
    ) -> GatewayResult<Option<Document>> {
        let mut options = FindOneOptions::default();
        options.projection = projection;

        Ok(self
            .collection(ns)
            .find_one(filter)
            .with_options(options)
            .await?)
    }

    async fn count_documents(&self, ns: &Namespace, filter: Document) -> GatewayResult<u64> {
        Ok(self.collection(ns).count_documents(filter).await?)
    }

    async fn distinct(
        &self,
        ns: &Namespace,
        field: &str,
        filter: Document,
    ) -> GatewayResult<Vec<Bson>> {
        Ok(self.collection(ns).distinct(field, filter).await?)
    }

    async fn aggregate(
        &self,
        ns: &Namespace,
        pipeline: Vec<Document>,
    ) -> GatewayResult<DocumentStream> {
        let cursor = self.collection(ns).aggregate(pipeline).await?;
        Ok(cursor.map_err(GatewayError::from).boxed())
    }

    async fn insert_one(&self, ns: &Namespace, document: Document) -> GatewayResult<Bson> {
        let result = self.collection(ns).insert_one(document).await?;
        Ok(result.inserted_id)
    }

    async fn insert_many(
        &self,
        ns: &Namespace,
        documents: Vec<Document>,
    ) -> GatewayResult<Vec<Bson>> {
        let result = self.collection(ns).insert_many(documents).await?;
        let mut ids: Vec<(usize, Bson)> = result.inserted_ids.into_iter().collect();
        ids.sort_by_key(|(index, _)| *index);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn update(&self, ns: &Namespace, query: UpdateQuery) -> GatewayResult<UpdateOutcome> {
        let mut options = UpdateOptions::default();
        options.upsert = Some(query.upsert);

        let update = match query.update {
            UpdateSpec::Document(doc) => UpdateModifications::Document(doc),
            UpdateSpec::Pipeline(stages) => UpdateModifications::Pipeline(stages),
        };

        let collection = self.collection(ns);
        let result = if query.many {
            collection
                .update_many(query.filter, update)
                .with_options(options)
                .await?
        } else {
            collection
                .update_one(query.filter, update)
                .with_options(options)
                .await?
        };

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete(&self, ns: &Namespace, filter: Document, many: bool) -> GatewayResult<u64> {
        let collection = self.collection(ns);
        let result = if many {
            collection.delete_many(filter).await?
        } else {
            collection.delete_one(filter).await?
        };
        Ok(result.deleted_count)
    }

    async fn close(&self) {
        self.client.clone().shutdown().immediate(true).await;
    }
}
