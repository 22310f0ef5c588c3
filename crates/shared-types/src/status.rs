//! Operating status vocabulary reported back for loadbalancer trees.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperatingStatus {
    Online,
    Offline,
}

impl OperatingStatus {
    /// Collapse a device status string onto the two-valued vocabulary.
    pub fn from_remote(status: &str) -> Self {
        match status.to_uppercase().as_str() {
            "UP" | "PARTIALLY_UP" => OperatingStatus::Online,
            _ => OperatingStatus::Offline,
        }
    }
}

impl std::fmt::Display for OperatingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatingStatus::Online => write!(f, "ONLINE"),
            OperatingStatus::Offline => write!(f, "OFFLINE"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityStatus {
    pub id: String,
    pub status: OperatingStatus,
}

impl EntityStatus {
    pub fn new(id: impl Into<String>, status: OperatingStatus) -> Self {
        Self {
            id: id.into(),
            status,
        }
    }
}

/// Parallel per-type status lists for one loadbalancer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatingStatuses {
    pub loadbalancers: Vec<EntityStatus>,
    pub listeners: Vec<EntityStatus>,
    pub pools: Vec<EntityStatus>,
    pub members: Vec<EntityStatus>,
}

impl OperatingStatuses {
    pub fn is_empty(&self) -> bool {
        self.loadbalancers.is_empty()
            && self.listeners.is_empty()
            && self.pools.is_empty()
            && self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_status_mapping() {
        assert_eq!(OperatingStatus::from_remote("UP"), OperatingStatus::Online);
        assert_eq!(OperatingStatus::from_remote("partially_up"), OperatingStatus::Online);
        assert_eq!(OperatingStatus::from_remote("DOWN"), OperatingStatus::Offline);
        assert_eq!(OperatingStatus::from_remote("DETACHED"), OperatingStatus::Offline);
        assert_eq!(OperatingStatus::from_remote("UNKNOWN"), OperatingStatus::Offline);
    }

    #[test]
    fn test_status_serializes_upper_case() {
        let status = EntityStatus::new("lb", OperatingStatus::Online);
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["status"], "ONLINE");
    }
}
