//! Fabric interconnect model: networks backed by VLANs, ports backed by
//! per-port profiles.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::SharedTypeError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PortState {
    Up,
    Down,
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortState::Up => write!(f, "UP"),
            PortState::Down => write!(f, "DOWN"),
        }
    }
}

impl std::str::FromStr for PortState {
    type Err = SharedTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UP" => Ok(PortState::Up),
            "DOWN" => Ok(PortState::Down),
            _ => Err(SharedTypeError::UnknownValue {
                field: "port_state",
                value: s.to_string(),
            }),
        }
    }
}

/// Remote per-port configuration object binding a port to one VLAN.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortProfile {
    pub name: String,
    pub vlan_name: String,
    pub vlan_id: u16,
}

/// Blade interface handed out by the inventory for one port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservedInterface {
    pub chassis_id: String,
    pub blade_id: String,
    pub interface_dn: String,
}

/// Opaque per-blade inventory data chosen by the placement heuristic.
pub type BladeData = HashMap<String, serde_json::Value>;

/// Where a new port should be placed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PortPlacement {
    pub chassis_id: String,
    pub blade_id: String,
    #[serde(default)]
    pub blade_data: BladeData,
}

impl PortPlacement {
    pub fn new(chassis_id: impl Into<String>, blade_id: impl Into<String>) -> Self {
        Self {
            chassis_id: chassis_id.into(),
            blade_id: blade_id.into(),
            blade_data: BladeData::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Port {
    pub id: String,
    pub state: PortState,
    /// Remote interface currently plugged into the port.
    pub attachment: Option<String>,
    pub profile: PortProfile,
    pub reservation: Option<ReservedInterface>,
}

impl Port {
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ports: IndexMap<String, Port>,
    pub vlan_name: String,
    pub vlan_id: u16,
}

impl Network {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        vlan_name: impl Into<String>,
        vlan_id: u16,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ports: IndexMap::new(),
            vlan_name: vlan_name.into(),
            vlan_id,
        }
    }

    /// Port currently holding the given remote interface, if any.
    pub fn port_with_attachment(&self, remote_interface_id: &str) -> Option<&Port> {
        self.ports
            .values()
            .find(|port| port.attachment.as_deref() == Some(remote_interface_id))
    }
}
