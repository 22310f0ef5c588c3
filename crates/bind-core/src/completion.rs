//! Completion reporting back to the orchestrator.

use async_trait::async_trait;

use netbind_event_bus::EventBus;
use netbind_shared_types::{
    CompletionEvent, EntityKind, HealthMonitor, L7Policy, L7Rule, Listener, LoadBalancer,
    Member, Network, Pool, Port,
};

use crate::context::OperationContext;

/// Entity whose operation finished, as handed back to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletedEntity {
    Network(Network),
    Port { net_id: String, port: Port },
    LoadBalancer(LoadBalancer),
    Listener(Listener),
    Pool(Pool),
    Member(Member),
    HealthMonitor(HealthMonitor),
    L7Policy(L7Policy),
    L7Rule(L7Rule),
}

impl CompletedEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            CompletedEntity::Network(_) => EntityKind::Network,
            CompletedEntity::Port { .. } => EntityKind::Port,
            CompletedEntity::LoadBalancer(_) => EntityKind::LoadBalancer,
            CompletedEntity::Listener(_) => EntityKind::Listener,
            CompletedEntity::Pool(_) => EntityKind::Pool,
            CompletedEntity::Member(_) => EntityKind::Member,
            CompletedEntity::HealthMonitor(_) => EntityKind::HealthMonitor,
            CompletedEntity::L7Policy(_) => EntityKind::L7Policy,
            CompletedEntity::L7Rule(_) => EntityKind::L7Rule,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            CompletedEntity::Network(network) => &network.id,
            CompletedEntity::Port { port, .. } => &port.id,
            CompletedEntity::LoadBalancer(lb) => &lb.id,
            CompletedEntity::Listener(listener) => &listener.id,
            CompletedEntity::Pool(pool) => &pool.id,
            CompletedEntity::Member(member) => &member.id,
            CompletedEntity::HealthMonitor(hm) => &hm.id,
            CompletedEntity::L7Policy(policy) => &policy.id,
            CompletedEntity::L7Rule(rule) => &rule.id,
        }
    }
}

/// Called once per successful operation. Failed operations never reach it,
/// leaving the orchestrator's record pending.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn successful_completion(
        &self,
        ctx: &OperationContext,
        entity: &CompletedEntity,
        delete: bool,
    );
}

/// Publishes every completion on an [`EventBus`].
#[derive(Clone, Default)]
pub struct EventBusNotifier {
    bus: EventBus,
}

impl EventBusNotifier {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }
}

#[async_trait]
impl CompletionNotifier for EventBusNotifier {
    async fn successful_completion(
        &self,
        ctx: &OperationContext,
        entity: &CompletedEntity,
        delete: bool,
    ) {
        let event = CompletionEvent::new(
            ctx.request_id.clone(),
            ctx.tenant_id.clone(),
            entity.kind(),
            entity.id(),
            delete,
        );

        match self.bus.publish(event).await {
            Ok(delivered) => log::debug!(
                "Completion of {} {} delivered to {} listener(s)",
                entity.kind(),
                entity.id(),
                delivered
            ),
            // The device state is already final; a listener failure must not
            // turn the operation into an error.
            Err(e) => log::warn!(
                "Completion of {} {} not fully delivered: {}",
                entity.kind(),
                entity.id(),
                e
            ),
        }
    }
}
