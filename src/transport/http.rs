//! HTTP transport with Streamable HTTP support for the MCP server.
//!
//! This transport uses HTTP with SSE streaming responses,
//! which is suitable for web-based MCP integrations. Requests pass through
//! the authentication middleware when `AUTH_MODE` is not `disabled`.

use crate::auth::{AuthConfig, auth_middleware};
use crate::error::{GatewayError, GatewayResult};
use crate::mcp::MongoService;
use crate::transport::{Transport, close_connection, wait_for_signal};
use axum::middleware;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// SSE connections may keep the server alive indefinitely after shutdown starts.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP transport implementation with Streamable HTTP support.
///
/// This transport provides:
/// - HTTP endpoints for MCP protocol messages
/// - Server-Sent Events for streaming responses
/// - Session management for stateful connections
/// - Optional API key or bearer authentication
pub struct HttpTransport {
    service: MongoService,
    auth: Arc<AuthConfig>,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    ///
    /// # Arguments
    ///
    /// * `service` - MCP service; cloned per session, all clones share one connection slot
    /// * `auth` - Authentication settings
    /// * `host` - Host address to bind to
    /// * `port` - Port to bind to
    /// * `endpoint` - MCP endpoint path (e.g., "/mcp")
    pub fn new(
        service: MongoService,
        auth: AuthConfig,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            service,
            auth: Arc::new(auth),
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the MCP endpoint path.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn router(&self) -> axum::Router {
        let service = self.service.clone();
        let mcp = StreamableHttpService::new(
            move || Ok(service.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service doesn't support the root path "/", use fallback_service instead
        let app = if self.endpoint == "/" {
            axum::Router::new().fallback_service(mcp)
        } else {
            axum::Router::new().nest_service(&self.endpoint, mcp)
        };

        if self.auth.is_enabled() {
            app.layer(middleware::from_fn_with_state(
                self.auth.clone(),
                auth_middleware,
            ))
        } else {
            app
        }
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> GatewayResult<()> {
        let bind_addr = self.bind_addr();
        info!(
            auth_mode = %self.auth.mode(),
            "Starting MCP server with HTTP transport on {}",
            bind_addr
        );

        let app = self.router();

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            GatewayError::internal(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // Race between: server completing normally vs forced timeout/second signal after shutdown
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        close_connection(self.service.holder()).await;
                        return Err(GatewayError::internal(format!(
                            "HTTP server error: {}",
                            e
                        )));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for connections to close (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        close_connection(self.service.holder()).await;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
