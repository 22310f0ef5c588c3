//! Loadbalancer-family logical entities.
//!
//! Entities are supplied wholesale on every operation and carry their parent
//! chain (member -> pool -> loadbalancer, rule -> policy -> listener), so a
//! manager never has to consult a local cache of logical state.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error::SharedTypeError;

/// Implements `Display`/`FromStr` over the upper-case wire names.
macro_rules! wire_enum {
    ($name:ident, $field:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = SharedTypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_uppercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(SharedTypeError::UnknownValue {
                        field: $field,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListenerProtocol {
    Tcp,
    Http,
    Https,
    TerminatedHttps,
}

wire_enum!(ListenerProtocol, "protocol", {
    Tcp => "TCP",
    Http => "HTTP",
    Https => "HTTPS",
    TerminatedHttps => "TERMINATED_HTTPS",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LbAlgorithm {
    RoundRobin,
    LeastConnections,
    SourceIp,
}

wire_enum!(LbAlgorithm, "lb_algorithm", {
    RoundRobin => "ROUND_ROBIN",
    LeastConnections => "LEAST_CONNECTIONS",
    SourceIp => "SOURCE_IP",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorType {
    Ping,
    Tcp,
    Http,
    Https,
}

wire_enum!(MonitorType, "type", {
    Ping => "PING",
    Tcp => "TCP",
    Http => "HTTP",
    Https => "HTTPS",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum L7PolicyAction {
    RedirectToPool,
    RedirectToUrl,
    Reject,
}

wire_enum!(L7PolicyAction, "action", {
    RedirectToPool => "REDIRECT_TO_POOL",
    RedirectToUrl => "REDIRECT_TO_URL",
    Reject => "REJECT",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum L7RuleType {
    HostName,
    Path,
    FileType,
    Header,
    Cookie,
}

wire_enum!(L7RuleType, "type", {
    HostName => "HOST_NAME",
    Path => "PATH",
    FileType => "FILE_TYPE",
    Header => "HEADER",
    Cookie => "COOKIE",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum L7CompareType {
    Regex,
    StartsWith,
    EndsWith,
    Contains,
    EqualTo,
}

wire_enum!(L7CompareType, "compare_type", {
    Regex => "REGEX",
    StartsWith => "STARTS_WITH",
    EndsWith => "ENDS_WITH",
    Contains => "CONTAINS",
    EqualTo => "EQUAL_TO",
});

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadBalancer {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub vip_subnet_id: String,
    pub vip_port_id: String,
    pub vip_address: IpAddr,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
}

/// Certificate material for TERMINATED_HTTPS listeners.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TlsCertificate {
    pub id: String,
    pub certificate: String,
    pub private_key: Option<String>,
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listener {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub protocol: ListenerProtocol,
    pub protocol_port: u16,
    /// -1 means unlimited.
    #[serde(default = "Listener::unlimited")]
    pub connection_limit: i64,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    pub default_pool_id: Option<String>,
    pub default_tls_certificate: Option<TlsCertificate>,
    pub loadbalancer: LoadBalancer,
}

impl Listener {
    fn unlimited() -> i64 {
        -1
    }

    pub fn loadbalancer_id(&self) -> &str {
        &self.loadbalancer.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pool {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub protocol: ListenerProtocol,
    pub lb_algorithm: LbAlgorithm,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    pub loadbalancer: LoadBalancer,
    pub listener: Option<Listener>,
}

impl Pool {
    pub fn loadbalancer_id(&self) -> &str {
        &self.loadbalancer.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    pub address: IpAddr,
    pub protocol_port: u16,
    pub weight: u32,
    pub subnet_id: String,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    pub pool: Pool,
}

impl Member {
    pub fn loadbalancer_id(&self) -> &str {
        self.pool.loadbalancer_id()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthMonitor {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub monitor_type: MonitorType,
    pub delay: u32,
    pub timeout: u32,
    pub max_retries: u32,
    pub http_method: Option<String>,
    pub url_path: Option<String>,
    pub expected_codes: Option<String>,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    pub pool: Pool,
}

impl HealthMonitor {
    pub fn loadbalancer_id(&self) -> &str {
        self.pool.loadbalancer_id()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct L7Policy {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub action: L7PolicyAction,
    pub redirect_pool_id: Option<String>,
    pub redirect_url: Option<String>,
    /// 1-based position among the listener's policies.
    pub position: u32,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    pub listener: Listener,
    /// Current full set of rules; entries carry no back-reference.
    #[serde(default)]
    pub rules: Vec<L7Rule>,
}

impl L7Policy {
    pub fn loadbalancer_id(&self) -> &str {
        self.listener.loadbalancer_id()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct L7Rule {
    pub id: String,
    pub tenant_id: String,
    pub l7policy_id: String,
    #[serde(rename = "type")]
    pub rule_type: L7RuleType,
    pub compare_type: L7CompareType,
    #[serde(default)]
    pub invert: bool,
    pub key: Option<String>,
    pub value: String,
    #[serde(default = "default_true")]
    pub admin_state_up: bool,
    /// Owning policy as seen by the caller.
    pub policy: Option<Box<L7Policy>>,
}

impl L7Rule {
    /// Copy of the rule without its parent reference, as stored in
    /// [`L7Policy::rules`].
    pub fn detached(&self) -> L7Rule {
        L7Rule {
            policy: None,
            ..self.clone()
        }
    }
}
