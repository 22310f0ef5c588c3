use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Network,
    Port,
    LoadBalancer,
    Listener,
    Pool,
    Member,
    HealthMonitor,
    L7Policy,
    L7Rule,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Network => "network",
            EntityKind::Port => "port",
            EntityKind::LoadBalancer => "loadbalancer",
            EntityKind::Listener => "listener",
            EntityKind::Pool => "pool",
            EntityKind::Member => "member",
            EntityKind::HealthMonitor => "health_monitor",
            EntityKind::L7Policy => "l7policy",
            EntityKind::L7Rule => "l7rule",
        };
        f.write_str(name)
    }
}

/// Emitted once an entity operation has fully completed on the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub event_id: Uuid,
    pub request_id: String,
    pub tenant_id: String,
    pub kind: EntityKind,
    pub entity_id: String,
    pub delete: bool,
    pub at: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn new(
        request_id: impl Into<String>,
        tenant_id: impl Into<String>,
        kind: EntityKind,
        entity_id: impl Into<String>,
        delete: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            request_id: request_id.into(),
            tenant_id: tenant_id.into(),
            kind,
            entity_id: entity_id.into(),
            delete,
            at: Utc::now(),
        }
    }
}
