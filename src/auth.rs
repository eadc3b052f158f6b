//! Authentication module for MCP server HTTP transport.
//!
//! Two schemes are supported, selected by `AUTH_MODE`:
//! - `api_key`: `X-API-Key: <key>`
//! - `bearer`: `Authorization: Bearer <key>`

use crate::config::AuthMode;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Header carrying the key in `api_key` mode.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authentication configuration for the MCP server.
#[derive(Clone)]
pub struct AuthConfig {
    mode: AuthMode,
    key: Option<String>,
}

impl AuthConfig {
    /// Create a new AuthConfig. Blank keys are treated as missing.
    pub fn new(mode: AuthMode, key: Option<String>) -> Self {
        let key = key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        Self { mode, key }
    }

    pub fn disabled() -> Self {
        Self::new(AuthMode::Disabled, None)
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.mode != AuthMode::Disabled
    }

    /// Auth is enabled but no key is configured, so every request is rejected.
    pub fn is_misconfigured(&self) -> bool {
        self.is_enabled() && self.key.is_none()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("mode", &self.mode)
            .field("key", &self.key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Authentication middleware for HTTP requests.
pub async fn auth_middleware(
    State(auth_config): State<Arc<AuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !auth_config.is_enabled() {
        return next.run(request).await;
    }

    let Some(expected) = auth_config.key.as_deref() else {
        warn!(mode = %auth_config.mode, "Authentication failed: no API key configured on the server");
        return unauthorized_response(
            "Server authentication is not configured",
            "Set MCP_API_KEY on the server",
        );
    };

    let provided = match extract_credential(auth_config.mode, request.headers()) {
        Ok(Some(credential)) => credential,
        Ok(None) => {
            warn!(mode = %auth_config.mode, "Authentication failed: missing credentials");
            return unauthorized_response("Missing credentials", usage_hint(auth_config.mode));
        }
        Err(msg) => {
            warn!(mode = %auth_config.mode, "Authentication failed: invalid header format");
            return unauthorized_response(msg, usage_hint(auth_config.mode));
        }
    };

    if verify_key(expected, provided) {
        debug!("Request authenticated");
        next.run(request).await
    } else {
        warn!(key_prefix = %mask_key(provided), "Authentication failed: invalid key");
        unauthorized_response(
            "Invalid API key",
            "Check that you are using the key configured on the server",
        )
    }
}

fn usage_hint(mode: AuthMode) -> &'static str {
    match mode {
        AuthMode::ApiKey => "Include the key: 'X-API-Key: <key>'",
        AuthMode::Bearer | AuthMode::Disabled => "Include the key: 'Authorization: Bearer <key>'",
    }
}

/// Pull the credential for `mode` out of the request headers.
fn extract_credential(mode: AuthMode, headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    match mode {
        AuthMode::Disabled => Ok(None),
        AuthMode::ApiKey => {
            let Some(value) = headers.get(API_KEY_HEADER) else {
                return Ok(None);
            };
            let key = value
                .to_str()
                .map_err(|_| "X-API-Key header contains invalid characters")?;
            if key.is_empty() {
                return Err("X-API-Key header is empty");
            }
            Ok(Some(key))
        }
        AuthMode::Bearer => {
            let Some(value) = headers.get(header::AUTHORIZATION) else {
                return Ok(None);
            };
            let auth_str = value
                .to_str()
                .map_err(|_| "Authorization header contains invalid characters")?;
            let token = auth_str
                .strip_prefix("Bearer ")
                .ok_or("Invalid Authorization header format. Expected 'Bearer <key>'")?;
            if token.is_empty() {
                return Err("Bearer token is empty");
            }
            Ok(Some(token))
        }
    }
}

fn verify_key(expected: &str, provided: &str) -> bool {
    constant_time_eq(provided.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn mask_key(key: &str) -> String {
    match key.get(..3) {
        Some(prefix) if key.len() > 3 => format!("{}***", prefix),
        _ => "***".to_string(),
    }
}

fn unauthorized_response(message: impl Into<String>, suggestion: impl Into<String>) -> Response {
    #[derive(Serialize)]
    struct ErrorResponse {
        error: ErrorDetail,
    }
    #[derive(Serialize)]
    struct ErrorDetail {
        code: &'static str,
        message: String,
        suggestion: String,
    }

    let body = ErrorResponse {
        error: ErrorDetail {
            code: "unauthorized",
            message: message.into(),
            suggestion: suggestion.into(),
        },
    };
    let json = serde_json::to_string(&body).unwrap_or_else(|_| {
        r#"{"error":{"code":"unauthorized","message":"Authentication failed"}}"#.to_string()
    });

    (
        StatusCode::UNAUTHORIZED,
        [(header::CONTENT_TYPE, "application/json")],
        json,
    )
        .into_response()
}
