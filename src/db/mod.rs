//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The driver seam (`DocumentClient`, `Connector`)
//! - The MongoDB driver implementation
//! - The process-wide single connection slot
//! - BSON <-> JSON conversion

pub mod client;
pub mod convert;
pub mod holder;
pub mod mongo;

pub use client::{
    Connector, DocumentClient, DocumentStream, FindQuery, Namespace, UpdateOutcome, UpdateQuery,
    UpdateSpec,
};
pub use holder::{ClientHandle, ConnectionHolder};
pub use mongo::{MongoClient, MongoConnector};
