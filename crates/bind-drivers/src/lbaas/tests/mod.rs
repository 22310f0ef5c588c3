//! Edge manager scenarios against recording fakes.


mod status;

use std::sync::Arc;

use netbind_core::{BindingStore, Credentials, DeviceSession, EdgeConfig, OperationContext};
use netbind_shared_types::{
    EntityKind, L7PolicyBinding, ListenerBinding, LoadBalancerBinding, MemberBinding,
    MonitorBinding, PoolBinding,
};

use super::{EdgeLoadBalancerDriver, LbaasServices};
use fakes::{FakeTopology, RecordingEdgeClient, RecordingNotifier};
use fixtures::*;

pub(crate) struct Harness {
    pub client: Arc<RecordingEdgeClient>,
    pub topology: Arc<FakeTopology>,
    pub store: Arc<BindingStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub driver: EdgeLoadBalancerDriver,
    pub ctx: OperationContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(BindingStore::in_memory())
    }

    pub fn with_store(store: BindingStore) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let client = Arc::new(RecordingEdgeClient::new());
        let topology = Arc::new(FakeTopology::new());
        let store = Arc::new(store);
        let notifier = Arc::new(RecordingNotifier::default());
        let services = LbaasServices::new(
            client.clone(),
            topology.clone(),
            store.clone(),
            notifier.clone(),
            EdgeConfig::default(),
        );

        Self {
            client,
            topology,
            store,
            notifier,
            driver: EdgeLoadBalancerDriver::new(services),
            ctx: OperationContext::new(
                LB_TENANT_ID,
                DeviceSession::new(ip("192.0.2.20"), Credentials::new("admin", "pw")),
            ),
        }
    }

    pub fn assert_completed(&self, kind: EntityKind, id: &str, delete: bool) {
        assert_eq!(self.notifier.last(), Some((kind, id.to_string(), delete)));
    }

    pub fn assert_not_completed(&self) {
        assert!(self.notifier.completions().is_empty());
    }

    pub async fn bind_loadbalancer(&self) {
        self.store
            .add(LoadBalancerBinding {
                loadbalancer_id: LB_ID.to_string(),
                lb_service_id: LB_SERVICE_ID.to_string(),
                lb_router_id: LB_ROUTER_ID.to_string(),
                vip_address: ip(LB_VIP),
            })
            .await
            .unwrap();
    }

    pub async fn bind_listener(&self) {
        self.store
            .add(ListenerBinding {
                loadbalancer_id: LB_ID.to_string(),
                listener_id: LISTENER_ID.to_string(),
                app_profile_id: APP_PROFILE_ID.to_string(),
                lb_vs_id: LB_VS_ID.to_string(),
            })
            .await
            .unwrap();
    }

    pub async fn bind_pool(&self) {
        self.store
            .add(PoolBinding {
                loadbalancer_id: LB_ID.to_string(),
                pool_id: POOL_ID.to_string(),
                lb_pool_id: LB_POOL_ID.to_string(),
                lb_vs_id: Some(LB_VS_ID.to_string()),
            })
            .await
            .unwrap();
    }

    pub async fn bind_member(&self) {
        self.store
            .add(MemberBinding {
                loadbalancer_id: LB_ID.to_string(),
                pool_id: POOL_ID.to_string(),
                member_id: MEMBER_ID.to_string(),
                lb_pool_id: LB_POOL_ID.to_string(),
                ip_address: ip(MEMBER_ADDRESS),
                port: 80,
            })
            .await
            .unwrap();
    }

    pub async fn bind_monitor(&self) {
        self.store
            .add(MonitorBinding {
                loadbalancer_id: LB_ID.to_string(),
                pool_id: POOL_ID.to_string(),
                hm_id: HM_ID.to_string(),
                lb_monitor_id: LB_MONITOR_ID.to_string(),
                lb_pool_id: LB_POOL_ID.to_string(),
            })
            .await
            .unwrap();
    }

    pub async fn bind_l7policy(&self) {
        self.store
            .add(L7PolicyBinding {
                l7policy_id: L7POLICY_ID.to_string(),
                lb_rule_id: LB_RULE_ID.to_string(),
                lb_vs_id: LB_VS_ID.to_string(),
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_bindings_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bindings.json");

    {
        let h = Harness::with_store(BindingStore::open(&path).await.unwrap());
        h.bind_loadbalancer().await;
        h.bind_listener().await;
        h.driver.pool.create(&h.ctx, &pool()).await.unwrap();
    }

    let h = Harness::with_store(BindingStore::open(&path).await.unwrap());
    let binding = h
        .store
        .get::<PoolBinding>(&netbind_shared_types::PoolKey::new(LB_ID, POOL_ID))
        .await
        .unwrap();
    assert_eq!(binding.lb_pool_id, LB_POOL_ID);
    assert_eq!(binding.lb_vs_id.as_deref(), Some(LB_VS_ID));

    h.driver.pool.delete(&h.ctx, &pool()).await.unwrap();
    assert!(h.client.called(&fakes::Call::DeletePool(LB_POOL_ID.to_string())));
    assert_eq!(h.store.count::<PoolBinding>().await, 0);
}

#[test]
fn test_display_names() {
    let h = Harness::new();
    let services = LbaasServices::new(
        h.client.clone(),
        h.topology.clone(),
        h.store.clone(),
        h.notifier.clone(),
        EdgeConfig {
            max_name_length: 4,
            ..EdgeConfig::default()
        },
    );

    assert_eq!(services.display_name("member1", "member", MEMBER_ID), "memb_mmm-mmm");
    assert_eq!(services.display_name("", "member", MEMBER_ID), "member_mmm-mmm");
}
