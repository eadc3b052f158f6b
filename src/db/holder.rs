//! Single-slot connection state.
//!
//! The holder stores at most one live client for the whole process. It is
//! pure storage: nothing here validates or closes clients, that is the job of
//! the connection tools.

use crate::db::client::DocumentClient;
use crate::error::{GatewayError, GatewayResult};
use std::sync::Arc;
use tokio::sync::RwLock;

pub type ClientHandle = Arc<dyn DocumentClient>;

#[derive(Default)]
pub struct ConnectionHolder {
    slot: RwLock<Option<ClientHandle>>,
}

impl ConnectionHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current client, if any.
    ///
    /// The returned handle is a clone; the lock is never held across driver calls.
    pub async fn get(&self) -> Option<ClientHandle> {
        self.slot.read().await.clone()
    }

    /// Current client or `NotConnected`.
    pub async fn require(&self) -> GatewayResult<ClientHandle> {
        self.get().await.ok_or(GatewayError::NotConnected)
    }

    /// Store `client`, returning whatever was there before without closing it.
    pub async fn set(&self, client: Option<ClientHandle>) -> Option<ClientHandle> {
        std::mem::replace(&mut *self.slot.write().await, client)
    }

    /// Remove and return the current client.
    pub async fn take(&self) -> Option<ClientHandle> {
        self.slot.write().await.take()
    }

    pub async fn is_connected(&self) -> bool {
        self.slot.read().await.is_some()
    }
}

impl std::fmt::Debug for ConnectionHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connected = self.slot.try_read().map(|slot| slot.is_some()).ok();
        f.debug_struct("ConnectionHolder")
            .field("connected", &connected)
            .finish()
    }
}
