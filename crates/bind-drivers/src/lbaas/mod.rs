//! Edge loadbalancer managers
//!
//! One manager per logical entity. Each resolves the bindings of its
//! ancestors, drives the edge client, and only then writes its own binding
//! row. Remote deletes happen before the binding row is removed, so the store
//! never points at an object the device no longer has.

mod healthmonitor;
mod l7policy;
mod l7rule;
mod listener;
mod loadbalancer;
mod member;
mod pool;
mod rule_body;
mod status;

#[cfg(test)]
mod tests;

pub use healthmonitor::{parse_expected_codes, HealthMonitorManager};
pub use l7policy::L7PolicyManager;
pub use l7rule::L7RuleManager;
pub use listener::ListenerManager;
pub use loadbalancer::LoadBalancerManager;
pub use member::MemberManager;
pub use pool::PoolManager;
pub use rule_body::position_rule;
pub use status::StatusReconciler;

use std::sync::Arc;

use netbind_core::{
    BindError, BindingStore, CompletedEntity, CompletionNotifier, EdgeConfig, EdgeLbClient,
    NetworkTopology, OperationContext, Result, StoredBinding,
};
use netbind_shared_types::Binding;

/// Collaborators shared by every edge manager.
#[derive(Clone)]
pub struct LbaasServices {
    pub client: Arc<dyn EdgeLbClient>,
    pub topology: Arc<dyn NetworkTopology>,
    pub store: Arc<BindingStore>,
    pub notifier: Arc<dyn CompletionNotifier>,
    pub config: EdgeConfig,
}

impl LbaasServices {
    pub fn new(
        client: Arc<dyn EdgeLbClient>,
        topology: Arc<dyn NetworkTopology>,
        store: Arc<BindingStore>,
        notifier: Arc<dyn CompletionNotifier>,
        config: EdgeConfig,
    ) -> Self {
        Self {
            client,
            topology,
            store,
            notifier,
            config,
        }
    }

    /// Device-side display name: the logical name cut to the configured
    /// length with the id appended, or `<kind>_<id>` for unnamed entities.
    pub fn display_name(&self, name: &str, kind: &str, id: &str) -> String {
        if name.is_empty() {
            return format!("{}_{}", kind, id);
        }
        let short: String = name.chars().take(self.config.max_name_length).collect();
        format!("{}_{}", short, id)
    }

    pub(crate) async fn complete(
        &self,
        ctx: &OperationContext,
        entity: CompletedEntity,
        delete: bool,
    ) {
        log::debug!(
            "{} {} {}",
            entity.kind(),
            entity.id(),
            if delete { "deleted" } else { "applied" }
        );
        self.notifier
            .successful_completion(ctx, &entity, delete)
            .await;
    }

    /// Fails when a binding row already exists under `key`.
    pub(crate) async fn ensure_unbound<B: StoredBinding>(&self, key: &B::Key) -> Result<()> {
        if self.store.get_opt::<B>(key).await.is_some() {
            return Err(already_bound::<B>(key));
        }
        Ok(())
    }
}

fn already_bound<B: Binding>(key: &B::Key) -> BindError {
    BindError::AlreadyExists {
        resource: format!("{} binding", B::KIND),
        id: key.to_string(),
    }
}

/// The full set of edge managers over one set of collaborators.
pub struct EdgeLoadBalancerDriver {
    pub loadbalancer: LoadBalancerManager,
    pub listener: ListenerManager,
    pub pool: PoolManager,
    pub member: MemberManager,
    pub healthmonitor: HealthMonitorManager,
    pub l7policy: L7PolicyManager,
    pub l7rule: L7RuleManager,
}

impl EdgeLoadBalancerDriver {
    pub fn new(services: LbaasServices) -> Self {
        log::info!(
            "Edge loadbalancer driver ready (service size {})",
            services.config.service_size
        );
        Self {
            loadbalancer: LoadBalancerManager::new(services.clone()),
            listener: ListenerManager::new(services.clone()),
            pool: PoolManager::new(services.clone()),
            member: MemberManager::new(services.clone()),
            healthmonitor: HealthMonitorManager::new(services.clone()),
            l7policy: L7PolicyManager::new(services.clone()),
            l7rule: L7RuleManager::new(services),
        }
    }
}
