//! MongoDB MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to explore, query and modify MongoDB databases through a single shared
//! connection, with an optional global read-only mode and a result cap.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use mcp::MongoService;
