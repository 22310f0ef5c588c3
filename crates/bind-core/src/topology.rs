//! Read-only view of the logical network topology owned by the core plugin.

use std::net::IpAddr;

use async_trait::async_trait;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::remote::RemoteResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
    /// Provider network reachable from outside (`router:external`).
    pub external: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouterInfo {
    pub id: String,
    pub name: String,
    pub has_gateway: bool,
    /// Subnets of the router's external gateway.
    #[serde(default)]
    pub gateway_cidrs: Vec<IpNet>,
}

/// Where a floating IP on an external network actually lands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FloatingIpTarget {
    pub fixed_ip: IpAddr,
    pub router_id: String,
}

#[async_trait]
pub trait NetworkTopology: Send + Sync {
    async fn network_for_subnet(&self, subnet_id: &str) -> RemoteResult<NetworkInfo>;

    /// Logical router the network is attached to, if any.
    async fn router_for_network(&self, network_id: &str) -> RemoteResult<Option<String>>;

    async fn router(&self, router_id: &str) -> RemoteResult<RouterInfo>;

    /// Device-side id of a logical router.
    async fn device_router_id(&self, router_id: &str) -> RemoteResult<Option<String>>;

    /// Floating IP associated with a port, e.g. a loadbalancer VIP port.
    async fn floating_ip_for_port(&self, port_id: &str) -> RemoteResult<Option<IpAddr>>;

    /// Fixed IP and router behind a floating IP.
    async fn floating_ip_target(&self, floating_ip: IpAddr)
        -> RemoteResult<Option<FloatingIpTarget>>;

    async fn router_for_subnet(&self, subnet_id: &str) -> RemoteResult<Option<String>> {
        let network = self.network_for_subnet(subnet_id).await?;
        self.router_for_network(&network.id).await
    }
}
