//! Fabric interconnect capabilities.

use async_trait::async_trait;

use netbind_shared_types::{PortPlacement, ReservedInterface};

use super::RemoteResult;
use crate::context::DeviceSession;

/// VLAN and port-profile operations on the fabric interconnect.
#[async_trait]
pub trait FabricClient: Send + Sync {
    async fn create_vlan(
        &self,
        session: &DeviceSession,
        vlan_name: &str,
        vlan_id: u16,
    ) -> RemoteResult<()>;

    async fn delete_vlan(&self, session: &DeviceSession, vlan_name: &str) -> RemoteResult<()>;

    async fn create_profile(
        &self,
        session: &DeviceSession,
        profile_name: &str,
        vlan_name: &str,
    ) -> RemoteResult<()>;

    async fn delete_profile(&self, session: &DeviceSession, profile_name: &str)
        -> RemoteResult<()>;

    async fn change_vlan_in_profile(
        &self,
        session: &DeviceSession,
        profile_name: &str,
        old_vlan_name: &str,
        new_vlan_name: &str,
    ) -> RemoteResult<()>;
}

/// Blade interface bookkeeping. Choosing the blade is the caller's business;
/// this only reserves and releases an interface on the chosen one.
#[async_trait]
pub trait BladeInventory: Send + Sync {
    async fn reserve_interface(
        &self,
        session: &DeviceSession,
        placement: &PortPlacement,
        tenant_id: &str,
        port_id: &str,
        profile_name: &str,
    ) -> RemoteResult<ReservedInterface>;

    async fn unreserve_interface(
        &self,
        session: &DeviceSession,
        reservation: &ReservedInterface,
    ) -> RemoteResult<()>;
}
