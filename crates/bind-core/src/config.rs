//! Driver configuration
//!
//! Loaded from a file with `NETBIND_*` environment overrides, e.g.
//! `NETBIND_FABRIC__MAX_PORT_PROFILES=512`.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::context::{Credentials, StaticCredentialStore};
use crate::error::BindError;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FabricConfig {
    /// Prefix of every port profile name created on the interconnect.
    pub profile_name_prefix: String,
    /// VLAN an unplugged port profile falls back to.
    pub default_vlan_name: String,
    pub default_vlan_id: u16,
    /// Upper bound on concurrently live port profiles.
    pub max_port_profiles: usize,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            profile_name_prefix: "q-".to_string(),
            default_vlan_name: "default".to_string(),
            default_vlan_id: 1,
            max_port_profiles: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Display name of the router advertisement rule for loadbalancer VIPs.
    pub advertisement_rule_name: String,
    /// Size requested for lazily provisioned edge services.
    pub service_size: String,
    /// Logical names are cut to this length before an id suffix is appended.
    pub max_name_length: usize,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            advertisement_rule_name: "LB external VIP advertisement".to_string(),
            service_size: "SMALL".to_string(),
            max_name_length: 219,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file of the binding store; in-memory only when unset.
    pub binding_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub device: IpAddr,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub fabric: FabricConfig,
    pub edge: EdgeConfig,
    pub storage: StorageConfig,
    pub credentials: Vec<CredentialEntry>,
}

impl DriverConfig {
    /// Load configuration from file, overlaid with environment variables.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .to_str()
            .ok_or_else(|| BindError::invalid_input("config path", "path is not valid UTF-8"))?;

        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(name))
            .add_source(
                ::config::Environment::with_prefix("NETBIND")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: DriverConfig = settings.try_deserialize()?;
        config.validate()?;
        log::info!("Loaded driver configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fabric.max_port_profiles == 0 {
            return Err(BindError::invalid_input(
                "fabric.max_port_profiles",
                "must be at least 1",
            ));
        }

        if self.fabric.default_vlan_id == 0 || self.fabric.default_vlan_id > 4094 {
            return Err(BindError::invalid_input(
                "fabric.default_vlan_id",
                "VLAN id must be between 1 and 4094",
            ));
        }

        if self.fabric.profile_name_prefix.is_empty() {
            return Err(BindError::invalid_input(
                "fabric.profile_name_prefix",
                "cannot be empty",
            ));
        }

        if self.edge.max_name_length == 0 {
            return Err(BindError::invalid_input(
                "edge.max_name_length",
                "must be at least 1",
            ));
        }

        Ok(())
    }

    pub fn credential_store(&self) -> StaticCredentialStore {
        let mut store = StaticCredentialStore::new();
        for entry in &self.credentials {
            store.insert(
                entry.device,
                Credentials::new(entry.username.clone(), entry.password.clone()),
            );
        }
        store
    }
}
