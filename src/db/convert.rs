//! Conversion between BSON values and the JSON transport representation.
//!
//! Outbound (`bson_to_json`) is a closed visitor over BSON element types:
//!
//! | BSON | JSON |
//! |---|---|
//! | double | number (`"NaN"`, `"Infinity"`, `"-Infinity"` as strings) |
//! | int32 / int64 | number |
//! | decimal128 | string |
//! | string, symbol, javascript | string |
//! | objectId | 24-char hex string |
//! | date | RFC 3339 UTC string with milliseconds |
//! | timestamp | RFC 3339 UTC string of the seconds part |
//! | binData | hyphenated string for UUID subtypes, base64 otherwise |
//! | regex | `/pattern/options` string |
//! | document / array | object / array, recursively |
//! | null, undefined | null |
//! | minKey / maxKey | `"MinKey"` / `"MaxKey"` |
//! | anything else | the value's display string |
//!
//! The conversion is lossy; results are meant for display, not for writing back.
//!
//! Inbound (`json_to_bson`) accepts relaxed or canonical extended JSON, so
//! `{"$oid": "..."}` or `{"$date": "..."}` in a filter become native values.

use crate::error::{GatewayError, GatewayResult};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, SecondsFormat, Utc};
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{Binary, Bson, Document};
use serde_json::{Map, Value as JsonValue};

pub type JsonObject = Map<String, JsonValue>;

// =============================================================================
// BSON -> JSON
// =============================================================================

/// Convert a BSON value to the transport representation.
pub fn bson_to_json(value: &Bson) -> JsonValue {
    match value {
        Bson::Double(f) => double_to_json(*f),
        Bson::Int32(i) => JsonValue::from(*i),
        Bson::Int64(i) => JsonValue::from(*i),
        Bson::Decimal128(d) => JsonValue::String(d.to_string()),
        Bson::String(s) | Bson::Symbol(s) | Bson::JavaScriptCode(s) => {
            JsonValue::String(s.clone())
        }
        Bson::JavaScriptCodeWithScope(code) => JsonValue::String(code.code.clone()),
        Bson::Boolean(b) => JsonValue::Bool(*b),
        Bson::Null | Bson::Undefined => JsonValue::Null,
        Bson::ObjectId(oid) => JsonValue::String(oid.to_hex()),
        Bson::DateTime(dt) => JsonValue::String(format_millis(dt.timestamp_millis())),
        Bson::Timestamp(ts) => JsonValue::String(format_millis(i64::from(ts.time) * 1000)),
        Bson::Binary(binary) => JsonValue::String(binary_to_string(binary)),
        Bson::RegularExpression(regex) => {
            JsonValue::String(format!("/{}/{}", regex.pattern, regex.options))
        }
        Bson::Document(doc) => document_to_json(doc),
        Bson::Array(items) => JsonValue::Array(items.iter().map(bson_to_json).collect()),
        Bson::MinKey => JsonValue::String("MinKey".to_string()),
        Bson::MaxKey => JsonValue::String("MaxKey".to_string()),
        other => JsonValue::String(other.to_string()),
    }
}

/// Convert a document to a JSON object, keeping field order.
pub fn document_to_json(doc: &Document) -> JsonValue {
    JsonValue::Object(
        doc.iter()
            .map(|(key, value)| (key.clone(), bson_to_json(value)))
            .collect(),
    )
}

/// Convert a list of documents.
pub fn documents_to_json(docs: &[Document]) -> Vec<JsonValue> {
    docs.iter().map(document_to_json).collect()
}

fn double_to_json(f: f64) -> JsonValue {
    if f.is_nan() {
        JsonValue::String("NaN".to_string())
    } else if f.is_infinite() {
        let text = if f > 0.0 { "Infinity" } else { "-Infinity" };
        JsonValue::String(text.to_string())
    } else {
        serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

/// Canonical date rendering: `2024-01-02T03:04:05.678Z`.
fn format_millis(millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => millis.to_string(),
    }
}

fn binary_to_string(binary: &Binary) -> String {
    if matches!(
        binary.subtype,
        BinarySubtype::Uuid | BinarySubtype::UuidOld
    ) {
        if let Ok(uuid) = uuid::Uuid::from_slice(&binary.bytes) {
            return uuid.hyphenated().to_string();
        }
    }
    STANDARD.encode(&binary.bytes)
}

// =============================================================================
// Type names (schema inference)
// =============================================================================

/// Server-side type alias of a value, as used by the `$type` operator.
pub fn type_name(value: &Bson) -> &'static str {
    match value {
        Bson::Double(_) => "double",
        Bson::String(_) => "string",
        Bson::Document(_) => "object",
        Bson::Array(_) => "array",
        Bson::Binary(_) => "binData",
        Bson::Undefined => "undefined",
        Bson::ObjectId(_) => "objectId",
        Bson::Boolean(_) => "bool",
        Bson::DateTime(_) => "date",
        Bson::Null => "null",
        Bson::RegularExpression(_) => "regex",
        Bson::JavaScriptCode(_) => "javascript",
        Bson::Symbol(_) => "symbol",
        Bson::JavaScriptCodeWithScope(_) => "javascriptWithScope",
        Bson::Int32(_) => "int",
        Bson::Timestamp(_) => "timestamp",
        Bson::Int64(_) => "long",
        Bson::Decimal128(_) => "decimal",
        Bson::MinKey => "minKey",
        Bson::MaxKey => "maxKey",
        _ => "dbPointer",
    }
}

// =============================================================================
// JSON -> BSON
// =============================================================================

/// Convert a transport value (extended JSON allowed) to BSON.
pub fn json_to_bson(value: JsonValue, what: &str) -> GatewayResult<Bson> {
    Bson::try_from(value)
        .map_err(|e| GatewayError::invalid_input(format!("invalid {}: {}", what, e)))
}

/// Convert a transport object to a document.
pub fn json_to_document(object: JsonObject, what: &str) -> GatewayResult<Document> {
    match json_to_bson(JsonValue::Object(object), what)? {
        Bson::Document(doc) => Ok(doc),
        // `{"$oid": ...}` and friends parse to scalars
        other => Err(GatewayError::invalid_input(format!(
            "{} must be a document, got {}",
            what,
            type_name(&other)
        ))),
    }
}

/// Convert an optional object, treating `None` as the empty document.
pub fn optional_document(object: Option<JsonObject>, what: &str) -> GatewayResult<Document> {
    match object {
        Some(object) => json_to_document(object, what),
        None => Ok(Document::new()),
    }
}

/// Convert an optional object, mapping `None` and `{}` to `None`.
pub fn non_empty_document(object: Option<JsonObject>, what: &str) -> GatewayResult<Option<Document>> {
    match object {
        Some(object) if !object.is_empty() => json_to_document(object, what).map(Some),
        _ => Ok(None),
    }
}

/// Convert a list of objects.
pub fn json_to_documents(objects: Vec<JsonObject>, what: &str) -> GatewayResult<Vec<Document>> {
    objects
        .into_iter()
        .map(|object| json_to_document(object, what))
        .collect()
}

/// Build a sort specification as ordered `(field, direction)` pairs.
///
/// Iteration order of `sort` is the sort-key precedence and is preserved.
pub fn sort_document(sort: JsonObject) -> GatewayResult<Document> {
    let mut doc = Document::new();
    for (field, direction) in sort {
        let direction = json_to_bson(direction, "sort direction")?;
        doc.insert(field, direction);
    }
    Ok(doc)
}
