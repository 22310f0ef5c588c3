//! Edge loadbalancer capabilities and the object shapes exchanged with them.

use std::net::IpAddr;

use async_trait::async_trait;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use super::RemoteResult;
use crate::context::DeviceSession;

/// Edge loadbalancer service attached to one router.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LbService {
    pub id: String,
    #[serde(default)]
    pub virtual_server_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSpec {
    pub display_name: String,
    pub description: String,
    /// Device-side router the service is attached to.
    pub router_id: String,
    pub size: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppProfileType {
    LbHttpProfile,
    LbFastTcpProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppProfileSpec {
    pub resource_type: AppProfileType,
    pub display_name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientSslBinding {
    pub default_certificate_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualServerSpec {
    pub display_name: String,
    pub description: String,
    pub enabled: bool,
    pub ip_address: IpAddr,
    pub port: u16,
    pub ip_protocol: String,
    pub application_profile_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_connections: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ssl_profile_binding: Option<ClientSslBinding>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualServer {
    pub id: String,
    #[serde(default)]
    pub pool_id: Option<String>,
    #[serde(default)]
    pub rule_ids: Vec<String>,
    #[serde(default)]
    pub default_certificate_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolSpec {
    pub display_name: String,
    pub description: String,
    pub algorithm: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteMember {
    pub display_name: String,
    pub weight: u32,
    pub ip_address: IpAddr,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LbPool {
    pub id: String,
    #[serde(default)]
    pub members: Vec<RemoteMember>,
    #[serde(default)]
    pub active_monitor_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MonitorResourceType {
    LbIcmpMonitor,
    LbTcpMonitor,
    LbHttpMonitor,
    LbHttpsMonitor,
}

impl MonitorResourceType {
    pub fn is_http(&self) -> bool {
        matches!(
            self,
            MonitorResourceType::LbHttpMonitor | MonitorResourceType::LbHttpsMonitor
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorSpec {
    pub resource_type: MonitorResourceType,
    pub display_name: String,
    pub fall_count: u32,
    pub interval: u32,
    pub timeout: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status_codes: Option<Vec<u16>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Equals,
    StartsWith,
    EndsWith,
    Contains,
    Regex,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MatchCondition {
    LbHttpRequestHeaderCondition {
        match_type: MatchType,
        header_name: String,
        header_value: String,
    },
    LbHttpRequestUriCondition {
        match_type: MatchType,
        uri: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleAction {
    LbSelectPoolAction {
        pool_id: String,
    },
    LbHttpRedirectAction {
        redirect_status: String,
        redirect_url: String,
    },
    LbHttpRejectAction {
        reply_status: String,
    },
}

/// Full body of one edge rule. The device has no per-condition objects, so
/// any change to a policy's rules rewrites the whole body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LbRuleBody {
    pub match_conditions: Vec<MatchCondition>,
    pub actions: Vec<RuleAction>,
    pub phase: String,
    pub match_strategy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CertificateSpec {
    pub display_name: String,
    pub pem_encoded: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleFilter {
    pub match_route_types: Vec<String>,
    pub prefix_operator: String,
}

/// Router advertisement rule, used to announce loadbalancer VIPs upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdvertisementRule {
    pub networks: Vec<IpNet>,
    pub display_name: String,
    pub rule_filter: RuleFilter,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualServerStatus {
    pub virtual_server_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberStatus {
    pub ip_address: IpAddr,
    pub port: u16,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolStatus {
    pub pool_id: String,
    pub status: String,
    #[serde(default)]
    pub members: Vec<MemberStatus>,
}

/// Raw status record of one edge service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceStatus {
    pub service_id: String,
    pub service_status: String,
    #[serde(default)]
    pub virtual_servers: Vec<VirtualServerStatus>,
    #[serde(default)]
    pub pools: Vec<PoolStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VirtualServersStatus {
    #[serde(default)]
    pub results: Vec<VirtualServerStatus>,
}

/// Object operations of the edge loadbalancer.
#[async_trait]
pub trait EdgeLbClient: Send + Sync {
    // Services

    async fn get_service(&self, session: &DeviceSession, service_id: &str)
        -> RemoteResult<LbService>;

    /// Service attached to `router_id`, if one was provisioned.
    async fn get_router_service(
        &self,
        session: &DeviceSession,
        router_id: &str,
    ) -> RemoteResult<Option<LbService>>;

    async fn create_service(
        &self,
        session: &DeviceSession,
        spec: &ServiceSpec,
    ) -> RemoteResult<LbService>;

    async fn delete_service(&self, session: &DeviceSession, service_id: &str) -> RemoteResult<()>;

    async fn add_virtual_server(
        &self,
        session: &DeviceSession,
        service_id: &str,
        vs_id: &str,
    ) -> RemoteResult<()>;

    async fn remove_virtual_server(
        &self,
        session: &DeviceSession,
        service_id: &str,
        vs_id: &str,
    ) -> RemoteResult<()>;

    async fn get_service_status(
        &self,
        session: &DeviceSession,
        service_id: &str,
    ) -> RemoteResult<ServiceStatus>;

    async fn get_virtual_servers_status(
        &self,
        session: &DeviceSession,
        service_id: &str,
    ) -> RemoteResult<VirtualServersStatus>;

    // Application profiles

    async fn create_app_profile(
        &self,
        session: &DeviceSession,
        spec: &AppProfileSpec,
    ) -> RemoteResult<String>;

    async fn update_app_profile(
        &self,
        session: &DeviceSession,
        profile_id: &str,
        spec: &AppProfileSpec,
    ) -> RemoteResult<()>;

    async fn delete_app_profile(&self, session: &DeviceSession, profile_id: &str)
        -> RemoteResult<()>;

    // Virtual servers

    async fn create_virtual_server(
        &self,
        session: &DeviceSession,
        spec: &VirtualServerSpec,
    ) -> RemoteResult<String>;

    async fn get_virtual_server(
        &self,
        session: &DeviceSession,
        vs_id: &str,
    ) -> RemoteResult<VirtualServer>;

    async fn update_virtual_server(
        &self,
        session: &DeviceSession,
        vs_id: &str,
        spec: &VirtualServerSpec,
    ) -> RemoteResult<()>;

    /// Set or clear (`None`) the default pool of a virtual server.
    async fn set_virtual_server_pool(
        &self,
        session: &DeviceSession,
        vs_id: &str,
        pool_id: Option<&str>,
    ) -> RemoteResult<()>;

    /// Replace the ordered rule list of a virtual server.
    async fn set_virtual_server_rules(
        &self,
        session: &DeviceSession,
        vs_id: &str,
        rule_ids: &[String],
    ) -> RemoteResult<()>;

    async fn remove_rule(
        &self,
        session: &DeviceSession,
        vs_id: &str,
        rule_id: &str,
    ) -> RemoteResult<()>;

    async fn delete_virtual_server(&self, session: &DeviceSession, vs_id: &str)
        -> RemoteResult<()>;

    // Pools

    async fn create_pool(&self, session: &DeviceSession, spec: &PoolSpec) -> RemoteResult<String>;

    async fn get_pool(&self, session: &DeviceSession, pool_id: &str) -> RemoteResult<LbPool>;

    async fn update_pool(
        &self,
        session: &DeviceSession,
        pool_id: &str,
        spec: &PoolSpec,
    ) -> RemoteResult<()>;

    async fn delete_pool(&self, session: &DeviceSession, pool_id: &str) -> RemoteResult<()>;

    /// Replace the full member list of a pool.
    async fn update_pool_with_members(
        &self,
        session: &DeviceSession,
        pool_id: &str,
        members: &[RemoteMember],
    ) -> RemoteResult<()>;

    async fn add_monitor_to_pool(
        &self,
        session: &DeviceSession,
        pool_id: &str,
        monitor_id: &str,
    ) -> RemoteResult<()>;

    async fn remove_monitor_from_pool(
        &self,
        session: &DeviceSession,
        pool_id: &str,
        monitor_id: &str,
    ) -> RemoteResult<()>;

    // Monitors

    async fn create_monitor(
        &self,
        session: &DeviceSession,
        spec: &MonitorSpec,
    ) -> RemoteResult<String>;

    async fn update_monitor(
        &self,
        session: &DeviceSession,
        monitor_id: &str,
        spec: &MonitorSpec,
    ) -> RemoteResult<()>;

    async fn delete_monitor(&self, session: &DeviceSession, monitor_id: &str) -> RemoteResult<()>;

    // Rules

    async fn create_rule(
        &self,
        session: &DeviceSession,
        display_name: &str,
        body: &LbRuleBody,
    ) -> RemoteResult<String>;

    async fn update_rule(
        &self,
        session: &DeviceSession,
        rule_id: &str,
        body: &LbRuleBody,
    ) -> RemoteResult<()>;

    async fn delete_rule(&self, session: &DeviceSession, rule_id: &str) -> RemoteResult<()>;

    // Certificates and routing

    async fn create_certificate(
        &self,
        session: &DeviceSession,
        spec: &CertificateSpec,
    ) -> RemoteResult<String>;

    async fn delete_certificate(&self, session: &DeviceSession, cert_id: &str)
        -> RemoteResult<()>;

    /// Replace the router's advertisement rules whose display name starts
    /// with `name_prefix` by `rules`.
    async fn update_advertisement_rules(
        &self,
        session: &DeviceSession,
        router_id: &str,
        rules: &[AdvertisementRule],
        name_prefix: &str,
    ) -> RemoteResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_body_shape() {
        let body = LbRuleBody {
            match_conditions: vec![MatchCondition::LbHttpRequestHeaderCondition {
                match_type: MatchType::Equals,
                header_name: "key1".to_string(),
                header_value: "val1".to_string(),
            }],
            actions: vec![RuleAction::LbSelectPoolAction {
                pool_id: "pool-xx".to_string(),
            }],
            phase: "HTTP_FORWARDING".to_string(),
            match_strategy: "ALL".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "match_conditions": [{
                    "type": "LbHttpRequestHeaderCondition",
                    "match_type": "EQUALS",
                    "header_name": "key1",
                    "header_value": "val1"
                }],
                "actions": [{"type": "LbSelectPoolAction", "pool_id": "pool-xx"}],
                "phase": "HTTP_FORWARDING",
                "match_strategy": "ALL"
            })
        );
    }

    #[test]
    fn test_uri_condition_shape() {
        let condition = MatchCondition::LbHttpRequestUriCondition {
            match_type: MatchType::StartsWith,
            uri: "/api".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&condition).unwrap(),
            json!({
                "type": "LbHttpRequestUriCondition",
                "match_type": "STARTS_WITH",
                "uri": "/api"
            })
        );
    }

    #[test]
    fn test_service_status_deserializes() {
        let status: ServiceStatus = serde_json::from_value(json!({
            "service_id": "service-1",
            "service_status": "UP",
            "virtual_servers": [{"virtual_server_id": "vs-x", "status": "UP"}],
            "pools": [{
                "pool_id": "pool-xx",
                "status": "DOWN",
                "members": [{"ip_address": "10.0.0.200", "port": 80, "status": "DOWN"}]
            }]
        }))
        .unwrap();

        assert_eq!(status.pools[0].members[0].port, 80);
        assert_eq!(status.virtual_servers[0].virtual_server_id, "vs-x");
    }
}
