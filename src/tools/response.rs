//! Uniform response envelope for MCP tools.
//!
//! Every tool returns text: either a pretty-printed JSON payload, a plain
//! status message, or `"Error: <message>"`. Failures are never raised as
//! protocol errors, including arguments that fail to decode.

use crate::db::convert::JsonObject;
use crate::error::{GatewayError, GatewayResult};
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::warn;

/// Prefix of every error payload.
pub const ERROR_PREFIX: &str = "Error: ";

/// Successful tool outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
    /// Structured payload, rendered as indented JSON
    Json(JsonValue),
    /// Status message, rendered as is
    Message(String),
}

impl ToolResponse {
    /// Serialize an output struct.
    pub fn json<T: Serialize>(output: &T) -> GatewayResult<Self> {
        serde_json::to_value(output)
            .map(Self::Json)
            .map_err(|e| GatewayError::internal(format!("Failed to serialize result: {}", e)))
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    /// Render to the text sent to the caller.
    pub fn into_text(self) -> String {
        match self {
            Self::Json(value) => {
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }
            Self::Message(text) => text,
        }
    }
}

/// Decode raw tool arguments into a typed input.
pub fn decode_arguments<T: DeserializeOwned>(arguments: JsonObject) -> GatewayResult<T> {
    serde_json::from_value(JsonValue::Object(arguments))
        .map_err(|e| GatewayError::invalid_input(e.to_string()))
}

/// Render a tool result as text, converting failures to `"Error: ..."`.
pub fn render(tool: &str, result: GatewayResult<ToolResponse>) -> String {
    match result {
        Ok(response) => response.into_text(),
        Err(err) => {
            warn!(tool = tool, kind = err.kind(), error = %err, "Tool call failed");
            format!("{}{}", ERROR_PREFIX, err)
        }
    }
}

/// Build the MCP call result for a tool outcome.
pub fn respond(tool: &str, result: GatewayResult<ToolResponse>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(render(tool, result))])
}
