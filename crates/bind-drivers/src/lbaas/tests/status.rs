use netbind_core::remote::{
    MemberStatus, PoolStatus, ServiceStatus, VirtualServerStatus, VirtualServersStatus,
};
use netbind_shared_types::{EntityStatus, OperatingStatus, OperatingStatuses};

use super::fixtures::*;
use super::Harness;

#[tokio::test]
async fn test_operating_status_maps_bound_objects() {
    let h = Harness::new();
    h.bind_loadbalancer().await;
    h.bind_listener().await;
    h.bind_pool().await;
    h.bind_member().await;
    h.client.set_statuses(
        ServiceStatus {
            service_id: LB_SERVICE_ID.to_string(),
            service_status: "UP".to_string(),
            virtual_servers: Vec::new(),
            pools: vec![
                PoolStatus {
                    pool_id: LB_POOL_ID.to_string(),
                    status: "DOWN".to_string(),
                    members: vec![
                        MemberStatus {
                            ip_address: ip(MEMBER_ADDRESS),
                            port: 80,
                            status: "DOWN".to_string(),
                        },
                        MemberStatus {
                            ip_address: ip("10.0.0.250"),
                            port: 80,
                            status: "UP".to_string(),
                        },
                    ],
                },
                PoolStatus {
                    pool_id: "unbound-pool".to_string(),
                    status: "UP".to_string(),
                    members: Vec::new(),
                },
            ],
        },
        VirtualServersStatus {
            results: vec![
                VirtualServerStatus {
                    virtual_server_id: LB_VS_ID.to_string(),
                    status: "UP".to_string(),
                },
                VirtualServerStatus {
                    virtual_server_id: "vs-unbound".to_string(),
                    status: "DOWN".to_string(),
                },
            ],
        },
    );

    let statuses = h
        .driver
        .loadbalancer
        .get_operating_status(&h.ctx, LB_ID)
        .await
        .unwrap();

    assert_eq!(
        statuses,
        OperatingStatuses {
            loadbalancers: vec![EntityStatus::new(LB_ID, OperatingStatus::Online)],
            listeners: vec![EntityStatus::new(LISTENER_ID, OperatingStatus::Online)],
            pools: vec![EntityStatus::new(POOL_ID, OperatingStatus::Offline)],
            members: vec![EntityStatus::new(MEMBER_ID, OperatingStatus::Offline)],
        }
    );
}

#[tokio::test]
async fn test_partially_up_service_is_online() {
    let h = Harness::new();
    h.bind_loadbalancer().await;
    h.client.set_statuses(
        ServiceStatus {
            service_id: LB_SERVICE_ID.to_string(),
            service_status: "PARTIALLY_UP".to_string(),
            ..ServiceStatus::default()
        },
        VirtualServersStatus::default(),
    );

    let statuses = h
        .driver
        .loadbalancer
        .get_operating_status(&h.ctx, LB_ID)
        .await
        .unwrap();
    assert_eq!(
        statuses.loadbalancers,
        vec![EntityStatus::new(LB_ID, OperatingStatus::Online)]
    );
    assert!(statuses.listeners.is_empty());
}

#[tokio::test]
async fn test_unbound_loadbalancer_has_no_status() {
    let h = Harness::new();

    let statuses = h
        .driver
        .loadbalancer
        .get_operating_status(&h.ctx, LB_ID)
        .await
        .unwrap();
    assert!(statuses.is_empty());
    assert!(h.client.calls().is_empty());
}
