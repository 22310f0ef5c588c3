pub mod binding;
pub mod error;
pub mod events;
pub mod fabric;
pub mod lbaas;
pub mod status;

pub use binding::{
    Binding, BindingKind, L7PolicyBinding, ListenerBinding, ListenerKey, LoadBalancerBinding,
    MemberBinding, MemberKey, MonitorBinding, MonitorKey, PoolBinding, PoolKey,
};
pub use error::SharedTypeError;
pub use events::{CompletionEvent, EntityKind};
pub use fabric::{
    BladeData, Network, Port, PortPlacement, PortProfile, PortState, ReservedInterface,
};
pub use lbaas::{
    HealthMonitor, L7CompareType, L7Policy, L7PolicyAction, L7Rule, L7RuleType,
    LbAlgorithm, Listener, ListenerProtocol, LoadBalancer, Member, MonitorType, Pool,
    TlsCertificate,
};
pub use status::{EntityStatus, OperatingStatus, OperatingStatuses};
