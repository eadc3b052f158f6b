//! End-to-end tests through the MCP tool router.
//!
//! A real rmcp client talks to `MongoService` over an in-memory duplex pipe,
//! so arguments travel as raw JSON and go through the same decoding as in
//! production.

mod common;

use common::{Call, FakeClient, FakeConfig, FakeConnector, capped, connected_holder, read_only};
use mongodb::bson::doc;
use mongodb_mcp_server::MongoService;
use mongodb_mcp_server::db::{ConnectionHolder, UpdateSpec};
use mongodb_mcp_server::tools::PolicyGuard;
use rmcp::model::CallToolRequestParam;
use rmcp::service::RunningService;
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

type Client = RunningService<RoleClient, ()>;

const NOT_CONNECTED: &str = "Error: Not connected to MongoDB. Please use 'connect' tool first.";

async fn serve(service: MongoService) -> Client {
    let (server_io, client_io) = tokio::io::duplex(64 * 1024);
    tokio::spawn(async move {
        if let Ok(running) = service.serve(server_io).await {
            let _ = running.waiting().await;
        }
    });
    ().serve(client_io).await.expect("client handshake")
}

fn service(holder: Arc<ConnectionHolder>, guard: PolicyGuard) -> MongoService {
    MongoService::new(
        holder,
        Arc::new(FakeConnector::default()),
        guard,
        None,
        Duration::from_millis(200),
    )
}

async fn connected(client: Arc<FakeClient>, guard: PolicyGuard) -> Client {
    serve(service(connected_holder(client).await, guard)).await
}

/// Call a tool with JSON arguments and return the text payload.
async fn call(client: &Client, name: &'static str, arguments: Value) -> String {
    let result = client
        .call_tool(CallToolRequestParam {
            name: name.into(),
            arguments: Some(common::object(arguments)),
        })
        .await
        .unwrap_or_else(|e| panic!("{} returned a protocol error: {}", name, e));
    assert_ne!(result.is_error, Some(true));
    result
        .content
        .first()
        .and_then(|content| content.raw.as_text())
        .map(|text| text.text.clone())
        .expect("text content")
}

fn parse(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|e| panic!("not JSON ({}): {}", e, text))
}

#[tokio::test]
async fn test_tool_listing_advertises_typed_schemas() {
    let client = connected(Arc::new(FakeClient::new(FakeConfig::default())), capped(10)).await;

    let tools = client.list_all_tools().await.unwrap();
    assert_eq!(tools.len(), 18);

    let find = tools.iter().find(|tool| tool.name == "find").unwrap();
    assert_eq!(find.input_schema["properties"]["limit"]["type"], "integer");
    let schema = tools
        .iter()
        .find(|tool| tool.name == "collection_schema")
        .unwrap();
    assert!(schema.input_schema["properties"].get("sample_size").is_some());

    let _ = client.cancel().await;
}

#[tokio::test]
async fn test_find_argument_errors_are_text() {
    let fake = Arc::new(FakeClient::with_documents(vec![doc! { "_id": 1 }]));
    let client = connected(fake.clone(), capped(10)).await;

    let text = call(
        &client,
        "find",
        json!({ "database": "shop", "collection": "orders", "limit": -5 }),
    )
    .await;
    assert_eq!(
        text,
        "Error: Invalid input: limit must be zero or positive, got -5"
    );

    let text = call(
        &client,
        "find",
        json!({ "database": "shop", "collection": "orders", "filter": "x" }),
    )
    .await;
    assert!(
        text.starts_with("Error: Invalid input: invalid type: string \"x\", expected a map"),
        "{}",
        text
    );

    let text = call(&client, "find", json!({ "database": "shop" })).await;
    assert_eq!(text, "Error: Invalid input: missing field `collection`");

    let text = call(
        &client,
        "find",
        json!({ "database": "shop", "collection": "orders", "limit": "ten" }),
    )
    .await;
    assert!(text.starts_with("Error: Invalid input: invalid type: string \"ten\""), "{}", text);

    assert!(fake.data_calls().is_empty());
    let _ = client.cancel().await;
}

#[tokio::test]
async fn test_find_through_router() {
    let documents = (0..30).map(|i| doc! { "_id": i }).collect();
    let fake = Arc::new(FakeClient::with_documents(documents));
    let client = connected(fake.clone(), capped(10)).await;

    let output = parse(
        &call(
            &client,
            "find",
            json!({
                "database": "shop",
                "collection": "orders",
                "filter": { "status": "open" },
                "sort": { "b": -1, "a": 1 },
                "limit": 1000
            }),
        )
        .await,
    );

    assert_eq!(output["count"], 10);
    let Some(Call::Find(_, query)) = fake.last_call() else {
        panic!("expected find call");
    };
    assert_eq!(query.filter, doc! { "status": "open" });
    assert_eq!(query.sort, Some(doc! { "b": -1, "a": 1 }));
    assert_eq!(query.limit, 10);

    let _ = client.cancel().await;
}

#[tokio::test]
async fn test_not_connected_text_whatever_the_arguments() {
    let client = serve(service(Arc::new(ConnectionHolder::new()), capped(10))).await;

    assert_eq!(
        call(&client, "find", json!({ "filter": "x", "limit": -5 })).await,
        NOT_CONNECTED
    );
    assert_eq!(call(&client, "aggregate", json!({})).await, NOT_CONNECTED);
    assert_eq!(call(&client, "delete_many", json!({ "filter": 1 })).await, NOT_CONNECTED);

    let result = client
        .call_tool(CallToolRequestParam {
            name: "list_databases".into(),
            arguments: None,
        })
        .await
        .unwrap();
    assert_eq!(
        result.content[0].raw.as_text().map(|t| t.text.as_str()),
        Some(NOT_CONNECTED)
    );

    let _ = client.cancel().await;
}

#[tokio::test]
async fn test_connection_tools_through_router() {
    let client = serve(service(Arc::new(ConnectionHolder::new()), capped(10))).await;

    assert_eq!(
        call(&client, "connect", json!({ "connection_string": 27017 })).await,
        "Error: Invalid input: invalid type: integer `27017`, expected a string"
    );
    assert_eq!(
        call(&client, "connect", json!({})).await,
        "Error: No connection string provided and MONGODB_URI not set in environment."
    );
    assert_eq!(
        call(
            &client,
            "connect",
            json!({ "connection_string": "mongodb://good:27017" })
        )
        .await,
        "Successfully connected to MongoDB"
    );
    assert_eq!(
        call(&client, "connection_status", json!({})).await,
        "Connected and healthy."
    );
    assert_eq!(
        call(&client, "disconnect", json!({})).await,
        "Disconnected from MongoDB."
    );
    assert_eq!(
        call(&client, "disconnect", json!({})).await,
        "No active connection."
    );

    let _ = client.cancel().await;
}

#[tokio::test]
async fn test_exploration_arguments_through_router() {
    let fake = Arc::new(FakeClient::new(FakeConfig {
        collections: vec!["orders".into()],
        documents: vec![doc! { "_id": 1, "x": 10 }, doc! { "_id": 2, "x": "ten" }],
        ..FakeConfig::default()
    }));
    let client = connected(fake.clone(), capped(10)).await;

    let output = parse(&call(&client, "list_collections", json!({ "database": "shop" })).await);
    assert_eq!(output, json!({ "database": "shop", "collections": ["orders"] }));

    assert_eq!(
        call(
            &client,
            "collection_schema",
            json!({ "database": "shop", "collection": "orders", "sample_size": 0 })
        )
        .await,
        "Error: Invalid input: sample_size must be at least 1, got 0"
    );

    let output = parse(
        &call(
            &client,
            "collection_schema",
            json!({ "database": "shop", "collection": "orders" }),
        )
        .await,
    );
    assert_eq!(output["sampled_docs"], 2);
    assert_eq!(output["inferred_schema"]["x"], json!(["int", "string"]));
    let Some(Call::Aggregate(_, pipeline)) = fake.last_call() else {
        panic!("expected aggregate call");
    };
    assert_eq!(pipeline, vec![doc! { "$sample": { "size": 5_i64 } }]);

    let _ = client.cancel().await;
}

#[tokio::test]
async fn test_aggregate_and_distinct_arguments_through_router() {
    let fake = Arc::new(FakeClient::with_documents(vec![doc! { "n": 1 }]));
    let client = connected(fake.clone(), capped(10)).await;

    let text = call(
        &client,
        "aggregate",
        json!({ "database": "shop", "collection": "orders", "pipeline": { "$match": {} } }),
    )
    .await;
    assert!(text.starts_with("Error: Invalid input: invalid type: map"), "{}", text);

    let output = parse(
        &call(
            &client,
            "aggregate",
            json!({
                "database": "shop",
                "collection": "orders",
                "pipeline": [{ "$match": { "n": { "$gte": 1 } } }]
            }),
        )
        .await,
    );
    assert_eq!(output["count"], 1);

    assert_eq!(
        call(
            &client,
            "distinct",
            json!({ "database": "shop", "collection": "orders" })
        )
        .await,
        "Error: Invalid input: missing field `field`"
    );

    let _ = client.cancel().await;
}

#[tokio::test]
async fn test_write_arguments_through_router() {
    let fake = Arc::new(FakeClient::new(FakeConfig::default()));
    let client = connected(fake.clone(), capped(10)).await;

    let output = parse(
        &call(
            &client,
            "insert_many",
            json!({
                "database": "shop",
                "collection": "orders",
                "documents": [{ "_id": "a" }, { "_id": "b" }]
            }),
        )
        .await,
    );
    assert_eq!(output["inserted_ids"], json!(["a", "b"]));

    let text = call(
        &client,
        "insert_one",
        json!({ "database": "shop", "collection": "orders", "document": [1, 2] }),
    )
    .await;
    assert!(text.starts_with("Error: Invalid input: "), "{}", text);

    call(
        &client,
        "update_one",
        json!({
            "database": "shop",
            "collection": "orders",
            "filter": { "_id": "a" },
            "update": [{ "$set": { "seen": true } }]
        }),
    )
    .await;
    let Some(Call::Update(_, query)) = fake.last_call() else {
        panic!("expected update call");
    };
    assert_eq!(
        query.update,
        UpdateSpec::Pipeline(vec![doc! { "$set": { "seen": true } }])
    );

    let output = parse(
        &call(
            &client,
            "delete_many",
            json!({ "database": "shop", "collection": "orders", "filter": {} }),
        )
        .await,
    );
    assert_eq!(output["deleted_count"], 0);

    let _ = client.cancel().await;
}

#[tokio::test]
async fn test_read_only_through_router() {
    let fake = Arc::new(FakeClient::new(FakeConfig::default()));
    let client = connected(fake.clone(), read_only()).await;

    assert_eq!(
        call(
            &client,
            "delete_one",
            json!({ "database": "shop", "collection": "orders", "filter": {} })
        )
        .await,
        "Error: Server is in READ-ONLY mode: delete_one is not allowed."
    );
    assert!(fake.data_calls().is_empty());

    let _ = client.cancel().await;
}
