//! Completion event bus.
//!
//! Entity managers report finished operations here; orchestrator hooks
//! register as listeners and move their own records out of the pending state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use netbind_shared_types::{CompletionEvent, EntityKind};
use thiserror::Error;
use tokio::sync::RwLock;

pub type EventBusResult<T> = Result<T, EventBusError>;

/// Contract implemented by orchestrator hooks interested in completions.
#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_completion(&self, event: &CompletionEvent) -> anyhow::Result<()>;
}

struct Subscription {
    listener: Arc<dyn EventListener>,
    /// Empty means every kind.
    kinds: HashSet<EntityKind>,
}

impl Subscription {
    fn wants(&self, kind: EntityKind) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&kind)
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Arc<RwLock<HashMap<String, Subscription>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all entity kinds. Names must be unique.
    pub async fn register_listener<L>(
        &self,
        name: impl Into<String>,
        listener: L,
    ) -> EventBusResult<()>
    where
        L: EventListener + 'static,
    {
        self.subscribe(name, listener, std::iter::empty()).await
    }

    /// Register a listener that only receives the given entity kinds.
    pub async fn subscribe<L, I>(
        &self,
        name: impl Into<String>,
        listener: L,
        kinds: I,
    ) -> EventBusResult<()>
    where
        L: EventListener + 'static,
        I: IntoIterator<Item = EntityKind>,
    {
        let name = name.into();
        let mut guard = self.subscriptions.write().await;
        if guard.contains_key(&name) {
            return Err(EventBusError::ListenerExists(name));
        }

        guard.insert(
            name,
            Subscription {
                listener: Arc::new(listener),
                kinds: kinds.into_iter().collect(),
            },
        );
        Ok(())
    }

    pub async fn unregister_listener(&self, name: &str) -> EventBusResult<()> {
        let mut guard = self.subscriptions.write().await;
        guard
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EventBusError::ListenerNotFound(name.to_string()))
    }

    pub async fn listener_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Deliver an event to every interested listener and return how many
    /// received it. A failing listener does not stop delivery to the others;
    /// all failures are reported together.
    pub async fn publish(&self, event: CompletionEvent) -> EventBusResult<usize> {
        let targets: Vec<(String, Arc<dyn EventListener>)> = {
            let guard = self.subscriptions.read().await;
            guard
                .iter()
                .filter(|(_, sub)| sub.wants(event.kind))
                .map(|(name, sub)| (name.clone(), Arc::clone(&sub.listener)))
                .collect()
        };

        debug!(
            "publishing {} completion for {} (delete={}) to {} listener(s)",
            event.kind,
            event.entity_id,
            event.delete,
            targets.len()
        );

        let mut failures = Vec::new();
        let delivered = targets.len();
        for (name, listener) in targets {
            if let Err(err) = listener.on_completion(&event).await {
                warn!("completion listener '{}' failed: {}", name, err);
                failures.push(ListenerFailure {
                    listener: name,
                    error: err.to_string(),
                });
            }
        }

        if failures.is_empty() {
            Ok(delivered)
        } else {
            Err(failures.into())
        }
    }
}

#[derive(Debug, Error)]
pub enum EventBusError {
    #[error("listener '{0}' already registered")]
    ListenerExists(String),
    #[error("listener '{0}' not found")]
    ListenerNotFound(String),
    #[error("one or more listeners failed: {0}")]
    ListenerFailures(ListenerFailureReport),
}

#[derive(Debug, Clone)]
pub struct ListenerFailure {
    pub listener: String,
    pub error: String,
}

impl std::fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.listener, self.error)
    }
}

#[derive(Debug, Clone)]
pub struct ListenerFailureReport(pub Vec<ListenerFailure>);

impl std::fmt::Display for ListenerFailureReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join("; "))
    }
}

impl From<Vec<ListenerFailure>> for EventBusError {
    fn from(value: Vec<ListenerFailure>) -> Self {
        EventBusError::ListenerFailures(ListenerFailureReport(value))
    }
}

impl EventBusError {
    pub fn listener_failures(&self) -> Option<&[ListenerFailure]> {
        match self {
            EventBusError::ListenerFailures(report) => Some(&report.0),
            _ => None,
        }
    }
}
