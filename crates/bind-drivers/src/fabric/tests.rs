//! Fabric manager tests

use std::sync::Arc;

use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::eq;
use netbind_core::{
    BindError, BladeInventory, CompletedEntity, CompletionNotifier, Credentials, DeviceSession,
    ErrorKind, FabricClient, FabricConfig, NetworkRegistry, OperationContext, RemoteError,
    RemoteResult,
};
use netbind_shared_types::{PortPlacement, PortState, ReservedInterface};

use super::FabricManager;

mock! {
    pub Fabric {}

    #[async_trait]
    impl FabricClient for Fabric {
        async fn create_vlan(&self, session: &DeviceSession, vlan_name: &str, vlan_id: u16) -> RemoteResult<()>;
        async fn delete_vlan(&self, session: &DeviceSession, vlan_name: &str) -> RemoteResult<()>;
        async fn create_profile(&self, session: &DeviceSession, profile_name: &str, vlan_name: &str) -> RemoteResult<()>;
        async fn delete_profile(&self, session: &DeviceSession, profile_name: &str) -> RemoteResult<()>;
        async fn change_vlan_in_profile(
            &self,
            session: &DeviceSession,
            profile_name: &str,
            old_vlan_name: &str,
            new_vlan_name: &str,
        ) -> RemoteResult<()>;
    }
}

mock! {
    pub Inventory {}

    #[async_trait]
    impl BladeInventory for Inventory {
        async fn reserve_interface(
            &self,
            session: &DeviceSession,
            placement: &PortPlacement,
            tenant_id: &str,
            port_id: &str,
            profile_name: &str,
        ) -> RemoteResult<ReservedInterface>;
        async fn unreserve_interface(&self, session: &DeviceSession, reservation: &ReservedInterface) -> RemoteResult<()>;
    }
}

mock! {
    pub Notifier {}

    #[async_trait]
    impl CompletionNotifier for Notifier {
        async fn successful_completion(&self, ctx: &OperationContext, entity: &CompletedEntity, delete: bool);
    }
}

const NET_ID: &str = "net-1";
const VLAN_NAME: &str = "vlan-blue";
const VLAN_ID: u16 = 100;

fn ctx() -> OperationContext {
    OperationContext::new(
        "tenant-1",
        DeviceSession::new("192.0.2.10".parse().unwrap(), Credentials::new("admin", "pw")),
    )
}

fn placement() -> PortPlacement {
    PortPlacement::new("chassis-1", "blade-2")
}

fn reservation(port_id: &str) -> ReservedInterface {
    ReservedInterface {
        chassis_id: "chassis-1".to_string(),
        blade_id: "blade-2".to_string(),
        interface_dn: format!("sys/chassis-1/blade-2/{}", port_id),
    }
}

/// Fabric mock that accepts every call.
fn permissive_fabric() -> MockFabric {
    let mut fabric = MockFabric::new();
    fabric.expect_create_vlan().returning(|_, _, _| Ok(()));
    fabric.expect_delete_vlan().returning(|_, _| Ok(()));
    fabric.expect_create_profile().returning(|_, _, _| Ok(()));
    fabric.expect_delete_profile().returning(|_, _| Ok(()));
    fabric
        .expect_change_vlan_in_profile()
        .returning(|_, _, _, _| Ok(()));
    fabric
}

fn permissive_inventory() -> MockInventory {
    let mut inventory = MockInventory::new();
    inventory
        .expect_reserve_interface()
        .returning(|_, _, _, port_id, _| Ok(reservation(port_id)));
    inventory
        .expect_unreserve_interface()
        .returning(|_, _| Ok(()));
    inventory
}

fn quiet_notifier() -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_successful_completion().return_const(());
    notifier
}

fn manager_with(
    fabric: MockFabric,
    inventory: MockInventory,
    notifier: MockNotifier,
    max_profiles: usize,
) -> FabricManager {
    let _ = env_logger::builder().is_test(true).try_init();
    FabricManager::new(
        Arc::new(fabric),
        Arc::new(inventory),
        Arc::new(NetworkRegistry::new()),
        Arc::new(notifier),
        FabricConfig {
            max_port_profiles: max_profiles,
            ..FabricConfig::default()
        },
    )
}

fn manager(max_profiles: usize) -> FabricManager {
    manager_with(
        permissive_fabric(),
        permissive_inventory(),
        quiet_notifier(),
        max_profiles,
    )
}

async fn manager_with_network(max_profiles: usize) -> FabricManager {
    let manager = manager(max_profiles);
    manager
        .create_network(&ctx(), "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();
    manager
}

#[tokio::test]
async fn test_create_and_delete_network() {
    let mut fabric = MockFabric::new();
    fabric
        .expect_create_vlan()
        .withf(|_, name, id| name == VLAN_NAME && *id == VLAN_ID)
        .times(1)
        .returning(|_, _, _| Ok(()));
    fabric
        .expect_delete_vlan()
        .withf(|_, name| name == VLAN_NAME)
        .times(1)
        .returning(|_, _| Ok(()));

    let mut notifier = MockNotifier::new();
    notifier
        .expect_successful_completion()
        .withf(|_, entity, delete| matches!(entity, CompletedEntity::Network(n) if n.id == NET_ID) && !*delete)
        .times(1)
        .return_const(());
    notifier
        .expect_successful_completion()
        .withf(|_, _, delete| *delete)
        .times(1)
        .return_const(());

    let manager = manager_with(fabric, MockInventory::new(), notifier, 4);
    let ctx = ctx();

    let network = manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();
    assert_eq!(network.vlan_id, VLAN_ID);
    assert_eq!(manager.get_all_networks(&ctx).await.len(), 1);

    manager.delete_network(&ctx, NET_ID).await.unwrap();
    assert!(manager.get_all_networks(&ctx).await.is_empty());

    let err = manager.delete_network(&ctx, NET_ID).await.unwrap_err();
    assert!(matches!(err, BindError::NetworkNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_failed_vlan_creation_registers_nothing() {
    let mut fabric = MockFabric::new();
    fabric
        .expect_create_vlan()
        .returning(|_, _, _| Err(RemoteError::rejected("create_vlan", "VLAN exists")));

    let manager = manager_with(fabric, MockInventory::new(), MockNotifier::new(), 4);
    let ctx = ctx();

    let err = manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteRejected);
    assert!(manager.get_network_details(&ctx, NET_ID).await.is_err());
}

#[tokio::test]
async fn test_duplicate_network_rejected_before_remote_call() {
    let mut fabric = MockFabric::new();
    fabric
        .expect_create_vlan()
        .times(1)
        .returning(|_, _, _| Ok(()));

    let manager = manager_with(fabric, MockInventory::new(), quiet_notifier(), 4);
    let ctx = ctx();
    manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();

    let err = manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_invalid_vlan_id_rejected() {
    let manager = manager_with(MockFabric::new(), MockInventory::new(), MockNotifier::new(), 4);
    let err = manager
        .create_network(&ctx(), "blue", NET_ID, VLAN_NAME, 4095)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_rename_network() {
    let manager = manager_with_network(4).await;
    let ctx = ctx();

    let network = manager.rename_network(&ctx, NET_ID, "green").await.unwrap();
    assert_eq!(network.name, "green");
    assert_eq!(
        manager.get_network_details(&ctx, NET_ID).await.unwrap().name,
        "green"
    );

    let err = manager.rename_network(&ctx, "missing", "x").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_delete_network_with_ports_refused() {
    let manager = manager_with_network(4).await;
    let ctx = ctx();
    manager
        .create_port(&ctx, NET_ID, "port-1", &placement())
        .await
        .unwrap();

    let err = manager.delete_network(&ctx, NET_ID).await.unwrap_err();
    assert!(matches!(err, BindError::NetworkInUse { ports: 1, .. }));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(manager.get_network_details(&ctx, NET_ID).await.is_ok());
}

#[tokio::test]
async fn test_create_port_uses_default_vlan_profile() {
    let mut fabric = MockFabric::new();
    fabric.expect_create_vlan().returning(|_, _, _| Ok(()));
    fabric
        .expect_create_profile()
        .withf(|_, profile, vlan| profile.starts_with("q-") && vlan == "default")
        .times(1)
        .returning(|_, _, _| Ok(()));

    let mut inventory = MockInventory::new();
    inventory
        .expect_reserve_interface()
        .withf(|_, placement, tenant, port, profile| {
            placement.blade_id == "blade-2"
                && tenant == "tenant-1"
                && port == "port-1"
                && profile.starts_with("q-")
        })
        .times(1)
        .returning(|_, _, _, port_id, _| Ok(reservation(port_id)));

    let manager = manager_with(fabric, inventory, quiet_notifier(), 4);
    let ctx = ctx();
    manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();

    let port = manager
        .create_port(&ctx, NET_ID, "port-1", &placement())
        .await
        .unwrap();
    assert_eq!(port.state, PortState::Up);
    assert!(port.attachment.is_none());
    assert_eq!(port.profile.vlan_name, "default");
    assert_eq!(port.profile.vlan_id, 1);
    assert_eq!(port.profile.name, manager.profiles().profile_name("port-1"));
    assert_eq!(port.reservation, Some(reservation("port-1")));
    assert_eq!(manager.profiles().live(), 1);

    let ports = manager.get_all_ports(&ctx, NET_ID).await.unwrap();
    assert_eq!(ports.len(), 1);
}

#[tokio::test]
async fn test_create_port_on_missing_network() {
    let manager = manager(4);
    let err = manager
        .create_port(&ctx(), "missing", "port-1", &placement())
        .await
        .unwrap_err();
    assert!(matches!(err, BindError::NetworkNotFound { .. }));
    assert_eq!(manager.profiles().live(), 0);
}

#[tokio::test]
async fn test_profile_cap_rejects_without_remote_call() {
    let mut fabric = MockFabric::new();
    fabric.expect_create_vlan().returning(|_, _, _| Ok(()));
    fabric
        .expect_create_profile()
        .times(2)
        .returning(|_, _, _| Ok(()));

    let manager = manager_with(fabric, permissive_inventory(), quiet_notifier(), 2);
    let ctx = ctx();
    manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();

    manager.create_port(&ctx, NET_ID, "port-1", &placement()).await.unwrap();
    manager.create_port(&ctx, NET_ID, "port-2", &placement()).await.unwrap();

    let err = manager
        .create_port(&ctx, NET_ID, "port-3", &placement())
        .await
        .unwrap_err();
    assert!(matches!(err, BindError::ProfileLimitExceeded { max: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::LimitExceeded);
    assert_eq!(manager.profiles().live(), 2);
    assert_eq!(manager.get_all_ports(&ctx, NET_ID).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_then_delete_port_is_net_zero() {
    let manager = manager_with_network(4).await;
    let ctx = ctx();

    manager.create_port(&ctx, NET_ID, "port-1", &placement()).await.unwrap();
    manager.create_port(&ctx, NET_ID, "port-2", &placement()).await.unwrap();
    manager.delete_port(&ctx, NET_ID, "port-1").await.unwrap();

    assert_eq!(manager.profiles().live(), 1);
    let ports = manager.get_all_ports(&ctx, NET_ID).await.unwrap();
    assert_eq!(ports.len(), 1);
    assert_eq!(ports[0].id, "port-2");

    let err = manager.delete_port(&ctx, NET_ID, "port-1").await.unwrap_err();
    assert!(matches!(err, BindError::PortNotFound { .. }));
}

#[tokio::test]
async fn test_delete_port_order() {
    let mut seq = mockall::Sequence::new();
    let mut fabric = MockFabric::new();
    fabric.expect_create_vlan().returning(|_, _, _| Ok(()));
    fabric.expect_create_profile().returning(|_, _, _| Ok(()));
    fabric
        .expect_delete_profile()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let mut inventory = MockInventory::new();
    inventory
        .expect_reserve_interface()
        .returning(|_, _, _, port_id, _| Ok(reservation(port_id)));
    inventory
        .expect_unreserve_interface()
        .with(mockall::predicate::always(), eq(reservation("port-1")))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let manager = manager_with(fabric, inventory, quiet_notifier(), 4);
    let ctx = ctx();
    manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();
    manager.create_port(&ctx, NET_ID, "port-1", &placement()).await.unwrap();

    manager.delete_port(&ctx, NET_ID, "port-1").await.unwrap();
}

#[tokio::test]
async fn test_delete_port_completes_when_unreserve_fails() {
    let mut inventory = MockInventory::new();
    inventory
        .expect_reserve_interface()
        .returning(|_, _, _, port_id, _| Ok(reservation(port_id)));
    inventory
        .expect_unreserve_interface()
        .times(1)
        .returning(|_, _| Err(RemoteError::unavailable("unreserve", "inventory down")));

    let mut notifier = MockNotifier::new();
    notifier
        .expect_successful_completion()
        .withf(|_, _, delete| !*delete)
        .return_const(());
    notifier
        .expect_successful_completion()
        .withf(|_, entity, delete| {
            matches!(entity, CompletedEntity::Port { port, .. } if port.id == "port-1") && *delete
        })
        .times(1)
        .return_const(());

    let manager = manager_with(permissive_fabric(), inventory, notifier, 4);
    let ctx = ctx();
    manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();
    manager.create_port(&ctx, NET_ID, "port-1", &placement()).await.unwrap();

    let port = manager.delete_port(&ctx, NET_ID, "port-1").await.unwrap();
    assert_eq!(port.reservation, Some(reservation("port-1")));
    assert_eq!(manager.profiles().live(), 0);
    assert!(manager.get_all_ports(&ctx, NET_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_reservation_rolls_back_profile() {
    let mut fabric = MockFabric::new();
    fabric.expect_create_vlan().returning(|_, _, _| Ok(()));
    fabric
        .expect_create_profile()
        .times(1)
        .returning(|_, _, _| Ok(()));
    fabric
        .expect_delete_profile()
        .times(1)
        .returning(|_, _| Ok(()));

    let mut inventory = MockInventory::new();
    inventory
        .expect_reserve_interface()
        .returning(|_, _, _, _, _| Err(RemoteError::unavailable("reserve", "inventory down")));

    let manager = manager_with(fabric, inventory, quiet_notifier(), 4);
    let ctx = ctx();
    manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();

    let err = manager
        .create_port(&ctx, NET_ID, "port-1", &placement())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteUnavailable);
    assert_eq!(manager.profiles().live(), 0);
    assert!(manager.get_all_ports(&ctx, NET_ID).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_profile_creation_releases_slot() {
    let mut fabric = MockFabric::new();
    fabric.expect_create_vlan().returning(|_, _, _| Ok(()));
    fabric
        .expect_create_profile()
        .returning(|_, _, _| Err(RemoteError::unavailable("create_profile", "timeout")));

    let manager = manager_with(fabric, MockInventory::new(), quiet_notifier(), 1);
    let ctx = ctx();
    manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();

    assert!(manager
        .create_port(&ctx, NET_ID, "port-1", &placement())
        .await
        .is_err());
    assert_eq!(manager.profiles().live(), 0);
}

#[tokio::test]
async fn test_update_port_state() {
    let manager = manager_with_network(4).await;
    let ctx = ctx();
    manager.create_port(&ctx, NET_ID, "port-1", &placement()).await.unwrap();

    let port = manager
        .update_port(&ctx, NET_ID, "port-1", "down")
        .await
        .unwrap();
    assert_eq!(port.state, PortState::Down);

    let err = manager
        .update_port(&ctx, NET_ID, "port-1", "sideways")
        .await
        .unwrap_err();
    assert!(matches!(err, BindError::InvalidState { ref state } if state == "sideways"));
    assert_eq!(
        manager
            .get_port_details(&ctx, NET_ID, "port-1")
            .await
            .unwrap()
            .state,
        PortState::Down
    );

    let err = manager
        .update_port(&ctx, NET_ID, "port-9", "UP")
        .await
        .unwrap_err();
    assert!(matches!(err, BindError::PortNotFound { .. }));
}

#[tokio::test]
async fn test_plug_and_unplug_interface() {
    let manager = manager_with_network(4).await;
    let ctx = ctx();
    manager.create_port(&ctx, NET_ID, "port-1", &placement()).await.unwrap();

    let port = manager
        .plug_interface(&ctx, NET_ID, "port-1", "vif-1")
        .await
        .unwrap();
    assert_eq!(port.attachment.as_deref(), Some("vif-1"));
    assert_eq!(port.profile.vlan_name, VLAN_NAME);
    assert_eq!(port.profile.vlan_id, VLAN_ID);

    let err = manager.delete_port(&ctx, NET_ID, "port-1").await.unwrap_err();
    assert!(matches!(err, BindError::PortInUse { ref att_id, .. } if att_id == "vif-1"));
    assert_eq!(manager.profiles().live(), 1);

    let port = manager
        .unplug_interface(&ctx, NET_ID, "port-1")
        .await
        .unwrap();
    assert!(port.attachment.is_none());
    assert_eq!(port.profile.vlan_name, "default");
    assert_eq!(port.profile.vlan_id, 1);

    manager.delete_port(&ctx, NET_ID, "port-1").await.unwrap();
    assert_eq!(manager.profiles().live(), 0);
}

#[tokio::test]
async fn test_plug_swaps_profile_vlan() {
    let mut fabric = MockFabric::new();
    fabric.expect_create_vlan().returning(|_, _, _| Ok(()));
    fabric.expect_create_profile().returning(|_, _, _| Ok(()));
    fabric
        .expect_change_vlan_in_profile()
        .withf(|_, _, old, new| old == "default" && new == VLAN_NAME)
        .times(1)
        .returning(|_, _, _, _| Ok(()));

    let manager = manager_with(fabric, permissive_inventory(), quiet_notifier(), 4);
    let ctx = ctx();
    manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();
    manager.create_port(&ctx, NET_ID, "port-1", &placement()).await.unwrap();

    manager
        .plug_interface(&ctx, NET_ID, "port-1", "vif-1")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_same_interface_twice_in_network_conflicts() {
    let manager = manager_with_network(4).await;
    let ctx = ctx();
    manager.create_port(&ctx, NET_ID, "port-1", &placement()).await.unwrap();
    manager.create_port(&ctx, NET_ID, "port-2", &placement()).await.unwrap();

    manager
        .plug_interface(&ctx, NET_ID, "port-1", "vif-1")
        .await
        .unwrap();

    let err = manager
        .plug_interface(&ctx, NET_ID, "port-2", "vif-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(manager
        .get_port_details(&ctx, NET_ID, "port-2")
        .await
        .unwrap()
        .attachment
        .is_none());

    let err = manager
        .plug_interface(&ctx, NET_ID, "port-1", "vif-2")
        .await
        .unwrap_err();
    assert!(matches!(err, BindError::PortInUse { ref att_id, .. } if att_id == "vif-1"));
}

#[tokio::test]
async fn test_failed_vlan_swap_leaves_port_unplugged() {
    let mut fabric = MockFabric::new();
    fabric.expect_create_vlan().returning(|_, _, _| Ok(()));
    fabric.expect_create_profile().returning(|_, _, _| Ok(()));
    fabric
        .expect_change_vlan_in_profile()
        .returning(|_, _, _, _| Err(RemoteError::unavailable("change_vlan", "timeout")));

    let manager = manager_with(fabric, permissive_inventory(), quiet_notifier(), 4);
    let ctx = ctx();
    manager
        .create_network(&ctx, "blue", NET_ID, VLAN_NAME, VLAN_ID)
        .await
        .unwrap();
    manager.create_port(&ctx, NET_ID, "port-1", &placement()).await.unwrap();

    assert!(manager
        .plug_interface(&ctx, NET_ID, "port-1", "vif-1")
        .await
        .is_err());
    let port = manager.get_port_details(&ctx, NET_ID, "port-1").await.unwrap();
    assert!(port.attachment.is_none());
    assert_eq!(port.profile.vlan_name, "default");
}

#[tokio::test]
async fn test_concurrent_port_creation_respects_cap() {
    let manager = Arc::new(manager_with_network(3).await);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                manager
                    .create_port(&ctx(), NET_ID, &format!("port-{}", i), &placement())
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::LimitExceeded),
        }
    }

    assert_eq!(created, 3);
    assert_eq!(manager.profiles().live(), 3);
}
