//! netbind drivers
//!
//! Entity managers that map the logical model onto a device: the fabric
//! interconnect manager for networks and ports, and the edge loadbalancer
//! managers for the loadbalancer family.

pub mod fabric;
pub mod lbaas;

pub use fabric::{FabricManager, ProfileAllocator};
pub use lbaas::{
    EdgeLoadBalancerDriver, HealthMonitorManager, L7PolicyManager, L7RuleManager,
    ListenerManager, LoadBalancerManager, LbaasServices, MemberManager, PoolManager,
    StatusReconciler,
};
