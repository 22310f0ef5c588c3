//! Binding rows: which remote object was created for which logical entity.

use std::fmt;
use std::hash::Hash;
use std::net::IpAddr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    LoadBalancer,
    Listener,
    Pool,
    Member,
    HealthMonitor,
    L7Policy,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::LoadBalancer => write!(f, "loadbalancer"),
            BindingKind::Listener => write!(f, "listener"),
            BindingKind::Pool => write!(f, "pool"),
            BindingKind::Member => write!(f, "member"),
            BindingKind::HealthMonitor => write!(f, "health monitor"),
            BindingKind::L7Policy => write!(f, "l7policy"),
        }
    }
}

/// A row of one binding table. Each row type names its own key.
pub trait Binding: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    type Key: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync;

    const KIND: BindingKind;

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadBalancerBinding {
    pub loadbalancer_id: String,
    pub lb_service_id: String,
    /// Device-side router id the service is attached to.
    pub lb_router_id: String,
    pub vip_address: IpAddr,
}

impl Binding for LoadBalancerBinding {
    type Key = String;
    const KIND: BindingKind = BindingKind::LoadBalancer;

    fn key(&self) -> String {
        self.loadbalancer_id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey {
    pub loadbalancer_id: String,
    pub listener_id: String,
}

impl ListenerKey {
    pub fn new(loadbalancer_id: &str, listener_id: &str) -> Self {
        Self {
            loadbalancer_id: loadbalancer_id.to_string(),
            listener_id: listener_id.to_string(),
        }
    }
}

impl fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.loadbalancer_id, self.listener_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListenerBinding {
    pub loadbalancer_id: String,
    pub listener_id: String,
    pub app_profile_id: String,
    pub lb_vs_id: String,
}

impl Binding for ListenerBinding {
    type Key = ListenerKey;
    const KIND: BindingKind = BindingKind::Listener;

    fn key(&self) -> ListenerKey {
        ListenerKey::new(&self.loadbalancer_id, &self.listener_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub loadbalancer_id: String,
    pub pool_id: String,
}

impl PoolKey {
    pub fn new(loadbalancer_id: &str, pool_id: &str) -> Self {
        Self {
            loadbalancer_id: loadbalancer_id.to_string(),
            pool_id: pool_id.to_string(),
        }
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.loadbalancer_id, self.pool_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolBinding {
    pub loadbalancer_id: String,
    pub pool_id: String,
    pub lb_pool_id: String,
    /// Virtual server the pool is the default pool of, once linked.
    pub lb_vs_id: Option<String>,
}

impl Binding for PoolBinding {
    type Key = PoolKey;
    const KIND: BindingKind = BindingKind::Pool;

    fn key(&self) -> PoolKey {
        PoolKey::new(&self.loadbalancer_id, &self.pool_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub loadbalancer_id: String,
    pub pool_id: String,
    pub member_id: String,
}

impl MemberKey {
    pub fn new(loadbalancer_id: &str, pool_id: &str, member_id: &str) -> Self {
        Self {
            loadbalancer_id: loadbalancer_id.to_string(),
            pool_id: pool_id.to_string(),
            member_id: member_id.to_string(),
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.loadbalancer_id, self.pool_id, self.member_id
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberBinding {
    pub loadbalancer_id: String,
    pub pool_id: String,
    pub member_id: String,
    pub lb_pool_id: String,
    /// Address as programmed on the device (fixed IP for floating members).
    pub ip_address: IpAddr,
    pub port: u16,
}

impl Binding for MemberBinding {
    type Key = MemberKey;
    const KIND: BindingKind = BindingKind::Member;

    fn key(&self) -> MemberKey {
        MemberKey::new(&self.loadbalancer_id, &self.pool_id, &self.member_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MonitorKey {
    pub loadbalancer_id: String,
    pub pool_id: String,
    pub hm_id: String,
}

impl MonitorKey {
    pub fn new(loadbalancer_id: &str, pool_id: &str, hm_id: &str) -> Self {
        Self {
            loadbalancer_id: loadbalancer_id.to_string(),
            pool_id: pool_id.to_string(),
            hm_id: hm_id.to_string(),
        }
    }
}

impl fmt::Display for MonitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.loadbalancer_id, self.pool_id, self.hm_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorBinding {
    pub loadbalancer_id: String,
    pub pool_id: String,
    pub hm_id: String,
    pub lb_monitor_id: String,
    pub lb_pool_id: String,
}

impl Binding for MonitorBinding {
    type Key = MonitorKey;
    const KIND: BindingKind = BindingKind::HealthMonitor;

    fn key(&self) -> MonitorKey {
        MonitorKey::new(&self.loadbalancer_id, &self.pool_id, &self.hm_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct L7PolicyBinding {
    pub l7policy_id: String,
    pub lb_rule_id: String,
    pub lb_vs_id: String,
}

impl Binding for L7PolicyBinding {
    type Key = String;
    const KIND: BindingKind = BindingKind::L7Policy;

    fn key(&self) -> String {
        self.l7policy_id.clone()
    }
}
