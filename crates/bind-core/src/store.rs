//! Binding store
//!
//! One table per relationship type, held in memory and optionally mirrored to
//! a JSON snapshot. A row is added only after the remote object it names was
//! created and removed only after that object was deleted; the store itself
//! never cascades from a parent row to its children.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedMutexGuard, RwLock};

use netbind_shared_types::{
    Binding, L7PolicyBinding, ListenerBinding, LoadBalancerBinding, MemberBinding,
    MonitorBinding, PoolBinding,
};

use crate::error::BindError;
use crate::locks::KeyedLocks;
use crate::Result;

/// Rows of a single binding type, keyed by the row's logical key.
#[derive(Debug, Clone)]
pub struct BindingTable<B: Binding> {
    rows: IndexMap<B::Key, B>,
}

impl<B: Binding> Default for BindingTable<B> {
    fn default() -> Self {
        Self {
            rows: IndexMap::new(),
        }
    }
}

impl<B: Binding> BindingTable<B> {
    pub fn get(&self, key: &B::Key) -> Option<&B> {
        self.rows.get(key)
    }

    pub fn add(&mut self, row: B) -> Result<()> {
        let key = row.key();
        if self.rows.contains_key(&key) {
            return Err(BindError::AlreadyExists {
                resource: format!("{} binding", B::KIND),
                id: key.to_string(),
            });
        }
        self.rows.insert(key, row);
        Ok(())
    }

    /// Replace an existing row, returning the previous one.
    pub fn update(&mut self, row: B) -> Result<B> {
        let key = row.key();
        match self.rows.get_mut(&key) {
            Some(existing) => Ok(std::mem::replace(existing, row)),
            None => Err(BindError::binding_not_found(B::KIND, key)),
        }
    }

    pub fn delete(&mut self, key: &B::Key) -> Result<B> {
        self.rows
            .shift_remove(key)
            .ok_or_else(|| BindError::binding_not_found(B::KIND, key))
    }

    pub fn find<F>(&self, predicate: F) -> Vec<B>
    where
        F: Fn(&B) -> bool,
    {
        self.rows.values().filter(|row| predicate(row)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn rows(&self) -> Vec<B> {
        self.rows.values().cloned().collect()
    }

    fn from_rows(rows: Vec<B>) -> Self {
        let mut table = Self::default();
        for row in rows {
            let key = row.key();
            if table.rows.insert(key.clone(), row).is_some() {
                log::warn!("Duplicate {} binding {} in snapshot, keeping last", B::KIND, key);
            }
        }
        table
    }
}

/// All binding tables of one store.
#[derive(Debug, Clone, Default)]
pub struct BindingTables {
    loadbalancers: BindingTable<LoadBalancerBinding>,
    listeners: BindingTable<ListenerBinding>,
    pools: BindingTable<PoolBinding>,
    members: BindingTable<MemberBinding>,
    monitors: BindingTable<MonitorBinding>,
    l7policies: BindingTable<L7PolicyBinding>,
}

/// On-disk layout: each table as a list of rows, keys are rebuilt on load.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    loadbalancers: Vec<LoadBalancerBinding>,
    #[serde(default)]
    listeners: Vec<ListenerBinding>,
    #[serde(default)]
    pools: Vec<PoolBinding>,
    #[serde(default)]
    members: Vec<MemberBinding>,
    #[serde(default)]
    monitors: Vec<MonitorBinding>,
    #[serde(default)]
    l7policies: Vec<L7PolicyBinding>,
}

impl From<&BindingTables> for Snapshot {
    fn from(tables: &BindingTables) -> Self {
        Self {
            loadbalancers: tables.loadbalancers.rows(),
            listeners: tables.listeners.rows(),
            pools: tables.pools.rows(),
            members: tables.members.rows(),
            monitors: tables.monitors.rows(),
            l7policies: tables.l7policies.rows(),
        }
    }
}

impl From<Snapshot> for BindingTables {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            loadbalancers: BindingTable::from_rows(snapshot.loadbalancers),
            listeners: BindingTable::from_rows(snapshot.listeners),
            pools: BindingTable::from_rows(snapshot.pools),
            members: BindingTable::from_rows(snapshot.members),
            monitors: BindingTable::from_rows(snapshot.monitors),
            l7policies: BindingTable::from_rows(snapshot.l7policies),
        }
    }
}

/// Binding row types that have a table in [`BindingTables`].
pub trait StoredBinding: Binding {
    fn table(tables: &BindingTables) -> &BindingTable<Self>;
    fn table_mut(tables: &mut BindingTables) -> &mut BindingTable<Self>;
}

macro_rules! stored_binding {
    ($row:ty, $field:ident) => {
        impl StoredBinding for $row {
            fn table(tables: &BindingTables) -> &BindingTable<Self> {
                &tables.$field
            }

            fn table_mut(tables: &mut BindingTables) -> &mut BindingTable<Self> {
                &mut tables.$field
            }
        }
    };
}

stored_binding!(LoadBalancerBinding, loadbalancers);
stored_binding!(ListenerBinding, listeners);
stored_binding!(PoolBinding, pools);
stored_binding!(MemberBinding, members);
stored_binding!(MonitorBinding, monitors);
stored_binding!(L7PolicyBinding, l7policies);

pub struct BindingStore {
    tables: RwLock<BindingTables>,
    path: Option<PathBuf>,
    locks: KeyedLocks,
}

impl BindingStore {
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(BindingTables::default()),
            path: None,
            locks: KeyedLocks::new(),
        }
    }

    /// Open a store backed by a JSON snapshot at `path`. A missing file
    /// starts an empty store; the file is created on the first mutation.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let tables = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let snapshot: Snapshot = serde_json::from_str(&content)?;
                log::info!("Loaded binding snapshot from {}", path.display());
                BindingTables::from(snapshot)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No binding snapshot at {}, starting empty", path.display());
                BindingTables::default()
            }
            Err(e) => {
                log::warn!("Failed to read binding snapshot {}: {}", path.display(), e);
                return Err(e.into());
            }
        };

        Ok(Self {
            tables: RwLock::new(tables),
            path: Some(path),
            locks: KeyedLocks::new(),
        })
    }

    /// Exclusive section for one logical entity. Managers hold the guard
    /// across their lookup, remote calls and binding write.
    pub async fn lock_entry<B: Binding>(&self, key: &B::Key) -> OwnedMutexGuard<()> {
        self.locks.lock(format!("{}:{}", B::KIND, key)).await
    }

    pub async fn get<B: StoredBinding>(&self, key: &B::Key) -> Result<B> {
        self.get_opt::<B>(key)
            .await
            .ok_or_else(|| BindError::binding_not_found(B::KIND, key))
    }

    pub async fn get_opt<B: StoredBinding>(&self, key: &B::Key) -> Option<B> {
        let tables = self.tables.read().await;
        B::table(&tables).get(key).cloned()
    }

    pub async fn add<B: StoredBinding>(&self, row: B) -> Result<()> {
        let key = row.key();
        self.mutate(|tables| B::table_mut(tables).add(row)).await?;
        log::debug!("Added {} binding {}", B::KIND, key);
        Ok(())
    }

    pub async fn update<B: StoredBinding>(&self, row: B) -> Result<()> {
        let key = row.key();
        self.mutate(|tables| B::table_mut(tables).update(row)).await?;
        log::debug!("Updated {} binding {}", B::KIND, key);
        Ok(())
    }

    pub async fn delete<B: StoredBinding>(&self, key: &B::Key) -> Result<B> {
        let removed = self.mutate(|tables| B::table_mut(tables).delete(key)).await?;
        log::debug!("Deleted {} binding {}", B::KIND, key);
        Ok(removed)
    }

    pub async fn find<B, F>(&self, predicate: F) -> Vec<B>
    where
        B: StoredBinding,
        F: Fn(&B) -> bool,
    {
        let tables = self.tables.read().await;
        B::table(&tables).find(predicate)
    }

    pub async fn count<B: StoredBinding>(&self) -> usize {
        let tables = self.tables.read().await;
        B::table(&tables).len()
    }

    pub async fn pool_by_lb_pool_id(
        &self,
        loadbalancer_id: &str,
        lb_pool_id: &str,
    ) -> Option<PoolBinding> {
        self.find::<PoolBinding, _>(|row| {
            row.loadbalancer_id == loadbalancer_id && row.lb_pool_id == lb_pool_id
        })
        .await
        .into_iter()
        .next()
    }

    pub async fn listener_by_vs_id(
        &self,
        loadbalancer_id: &str,
        lb_vs_id: &str,
    ) -> Option<ListenerBinding> {
        self.find::<ListenerBinding, _>(|row| {
            row.loadbalancer_id == loadbalancer_id && row.lb_vs_id == lb_vs_id
        })
        .await
        .into_iter()
        .next()
    }

    pub async fn member_by_remote(
        &self,
        loadbalancer_id: &str,
        lb_pool_id: &str,
        ip_address: IpAddr,
        port: u16,
    ) -> Option<MemberBinding> {
        self.find::<MemberBinding, _>(|row| {
            row.loadbalancer_id == loadbalancer_id
                && row.lb_pool_id == lb_pool_id
                && row.ip_address == ip_address
                && row.port == port
        })
        .await
        .into_iter()
        .next()
    }

    /// Apply `change` and mirror the result to the snapshot. If the snapshot
    /// cannot be written the in-memory tables are put back as they were.
    async fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut BindingTables) -> Result<T>,
    {
        let mut tables = self.tables.write().await;

        let Some(path) = &self.path else {
            return change(&mut *tables);
        };

        let previous = tables.clone();
        let value = change(&mut *tables)?;

        if let Err(e) = write_snapshot(path, &tables).await {
            log::error!(
                "Failed to write binding snapshot {}: {}, reverting",
                path.display(),
                e
            );
            *tables = previous;
            return Err(e);
        }

        Ok(value)
    }
}

async fn write_snapshot(path: &Path, tables: &BindingTables) -> Result<()> {
    let content = serde_json::to_string_pretty(&Snapshot::from(tables))?;

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    tokio::fs::write(&temp_path, content).await?;
    tokio::fs::rename(&temp_path, path).await?;

    log::debug!("Saved binding snapshot to {}", path.display());
    Ok(())
}
