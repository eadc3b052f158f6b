//! MongoDB MCP Server - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) tools for AI assistants
//! to interact with MongoDB.

use mongodb_mcp_server::auth::AuthConfig;
use mongodb_mcp_server::config::{AuthMode, Config, EnvPolicySource, TransportMode};
use mongodb_mcp_server::db::{ConnectionHolder, MongoConnector};
use mongodb_mcp_server::mcp::MongoService;
use mongodb_mcp_server::tools::{PolicyGuard, redact_uri};
use mongodb_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Everything goes to stderr; stdout belongs to the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    init_tracing(&config);

    let flags = config.policy_flags();
    let default_uri = config.default_uri();
    info!(
        transport = %config.transport,
        read_only = flags.read_only,
        max_documents = flags.max_documents,
        default_uri = ?default_uri.as_deref().map(redact_uri),
        "Starting MongoDB MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );
    if flags.read_only {
        warn!("Server is in READ-ONLY mode: write operations are disabled");
    }

    let holder = Arc::new(ConnectionHolder::new());
    let connector = Arc::new(MongoConnector::new(config.connect_timeout_duration()));
    let guard = PolicyGuard::new(Arc::new(EnvPolicySource::new(flags)));
    let service = MongoService::new(
        holder,
        connector,
        guard,
        default_uri,
        config.connect_timeout_duration(),
    );

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(service).run().await
        }
        TransportMode::Http => {
            let auth = AuthConfig::new(config.auth_mode, config.api_key.clone());
            match auth.mode() {
                AuthMode::Disabled => {
                    warn!("HTTP authentication is disabled; set AUTH_MODE to api_key or bearer");
                }
                _ if auth.is_misconfigured() => warn!(
                    auth_mode = %auth.mode(),
                    "MCP_API_KEY is not set; all HTTP requests will be rejected"
                ),
                _ => info!(auth_mode = %auth.mode(), "HTTP authentication enabled"),
            }
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                service,
                auth,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
