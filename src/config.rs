//! Configuration handling for the MongoDB MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables,
//! plus the policy flags (read-only mode, result cap) consulted on every tool call.

use clap::builder::FalseyValueParser;
use clap::{Parser, ValueEnum};
use std::fmt::Debug;
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_DOCUMENTS: u32 = 100;

pub const READ_ONLY_ENV: &str = "READ_ONLY";
pub const MAX_DOCUMENTS_ENV: &str = "MAX_DOCUMENTS";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP with Server-Sent Events (for web clients)
    #[value(alias = "streamable-http")]
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Authentication mode for the HTTP transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AuthMode {
    /// No authentication
    #[default]
    Disabled,
    /// `X-API-Key: <key>` header
    #[value(name = "api_key", alias = "api-key")]
    ApiKey,
    /// `Authorization: Bearer <key>` header
    Bearer,
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::ApiKey => write!(f, "api_key"),
            Self::Bearer => write!(f, "bearer"),
        }
    }
}

/// Global policy switches evaluated against every tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyFlags {
    /// Block inserts, updates, deletes and `$out`/`$merge` aggregations
    pub read_only: bool,
    /// Upper bound on documents returned by `find` and `aggregate`
    pub max_documents: u32,
}

impl Default for PolicyFlags {
    fn default() -> Self {
        Self {
            read_only: false,
            max_documents: DEFAULT_MAX_DOCUMENTS,
        }
    }
}

/// Source of policy flags. Implementations are queried on every call; the
/// result must not be cached by callers.
pub trait PolicySource: Send + Sync + Debug {
    fn flags(&self) -> PolicyFlags;
}

impl PolicySource for PolicyFlags {
    fn flags(&self) -> PolicyFlags {
        *self
    }
}

/// Policy source that re-reads `READ_ONLY` and `MAX_DOCUMENTS` at call time.
///
/// Unset or malformed variables fall back to the values parsed at startup.
#[derive(Debug, Clone)]
pub struct EnvPolicySource {
    fallback: PolicyFlags,
    lookup: fn(&str) -> Option<String>,
}

impl EnvPolicySource {
    /// Read flags from the process environment.
    pub fn new(fallback: PolicyFlags) -> Self {
        Self::with_lookup(fallback, |key| std::env::var(key).ok())
    }

    /// Read flags through a custom variable lookup.
    pub fn with_lookup(fallback: PolicyFlags, lookup: fn(&str) -> Option<String>) -> Self {
        Self { fallback, lookup }
    }
}

impl PolicySource for EnvPolicySource {
    fn flags(&self) -> PolicyFlags {
        let read_only = (self.lookup)(READ_ONLY_ENV)
            .map(|v| parse_bool_flag(&v))
            .unwrap_or(self.fallback.read_only);
        let max_documents = (self.lookup)(MAX_DOCUMENTS_ENV)
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(self.fallback.max_documents);
        PolicyFlags {
            read_only,
            max_documents,
        }
    }
}

fn parse_bool_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Server configuration from CLI arguments and environment variables.
#[derive(Parser, Debug, Clone)]
#[command(name = "mongodb-mcp-server")]
#[command(author, version, about = "MCP server for MongoDB")]
pub struct Config {
    /// Default MongoDB connection URI used by `connect` when no connection string is given
    #[arg(long = "uri", value_name = "URI", env = "MONGODB_URI")]
    pub connection_uri: Option<String>,

    /// Reject all write operations and aggregations containing $out/$merge
    #[arg(long, env = "READ_ONLY", value_parser = FalseyValueParser::new())]
    pub read_only: bool,

    /// Maximum number of documents returned by find/aggregate
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_DOCUMENTS,
        env = "MAX_DOCUMENTS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_documents: u32,

    /// Timeout in seconds for server selection and liveness checks
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "MCP_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Authentication mode for the HTTP transport
    #[arg(long, value_enum, default_value = "disabled", env = "AUTH_MODE")]
    pub auth_mode: AuthMode,

    /// API key expected by the HTTP transport when authentication is enabled
    #[arg(long, value_name = "KEY", env = "MCP_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            connection_uri: None,
            read_only: false,
            max_documents: DEFAULT_MAX_DOCUMENTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            auth_mode: AuthMode::Disabled,
            api_key: None,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Policy flags as parsed at startup.
    pub fn policy_flags(&self) -> PolicyFlags {
        PolicyFlags {
            read_only: self.read_only,
            max_documents: self.max_documents,
        }
    }

    /// Default connection URI, ignoring blank values.
    pub fn default_uri(&self) -> Option<String> {
        self.connection_uri
            .as_deref()
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
            .map(str::to_string)
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
