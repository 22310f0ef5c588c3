//! Registry of fabric networks and their ports.

use indexmap::IndexMap;
use tokio::sync::{OwnedMutexGuard, RwLock};

use netbind_shared_types::Network;

use crate::error::BindError;
use crate::locks::KeyedLocks;
use crate::Result;

/// Injected owner of the logical network set. Networks keep insertion order.
#[derive(Default)]
pub struct NetworkRegistry {
    networks: RwLock<IndexMap<String, Network>>,
    locks: KeyedLocks,
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive section for one network id, held across remote calls that
    /// must not interleave with another operation on the same network.
    pub async fn lock_network(&self, net_id: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(net_id).await
    }

    pub async fn contains(&self, net_id: &str) -> bool {
        self.networks.read().await.contains_key(net_id)
    }

    pub async fn insert(&self, network: Network) -> Result<()> {
        let mut networks = self.networks.write().await;
        if networks.contains_key(&network.id) {
            return Err(BindError::AlreadyExists {
                resource: "network".to_string(),
                id: network.id,
            });
        }
        networks.insert(network.id.clone(), network);
        Ok(())
    }

    pub async fn get(&self, net_id: &str) -> Result<Network> {
        self.networks
            .read()
            .await
            .get(net_id)
            .cloned()
            .ok_or_else(|| BindError::NetworkNotFound {
                net_id: net_id.to_string(),
            })
    }

    pub async fn list(&self) -> Vec<Network> {
        self.networks.read().await.values().cloned().collect()
    }

    pub async fn remove(&self, net_id: &str) -> Result<Network> {
        self.networks
            .write()
            .await
            .shift_remove(net_id)
            .ok_or_else(|| BindError::NetworkNotFound {
                net_id: net_id.to_string(),
            })
    }

    /// Run `f` against one network under the registry's write lock.
    pub async fn with_network_mut<T, F>(&self, net_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Network) -> Result<T>,
    {
        let mut networks = self.networks.write().await;
        let network = networks
            .get_mut(net_id)
            .ok_or_else(|| BindError::NetworkNotFound {
                net_id: net_id.to_string(),
            })?;
        f(network)
    }

    pub async fn len(&self) -> usize {
        self.networks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.networks.read().await.is_empty()
    }
}
