//! Per-call context threaded through every manager operation.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use uuid::Uuid;

use crate::error::BindError;
use crate::Result;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credential lookup keyed by device address.
pub trait CredentialStore: Send + Sync {
    fn credentials(&self, device: IpAddr) -> Option<Credentials>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    entries: HashMap<IpAddr, Credentials>,
}

impl StaticCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, device: IpAddr, credentials: Credentials) {
        self.entries.insert(device, credentials);
    }

    pub fn with(mut self, device: IpAddr, credentials: Credentials) -> Self {
        self.insert(device, credentials);
        self
    }
}

impl CredentialStore for StaticCredentialStore {
    fn credentials(&self, device: IpAddr) -> Option<Credentials> {
        self.entries.get(&device).cloned()
    }
}

/// Device endpoint and credentials for one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSession {
    pub device: IpAddr,
    pub credentials: Credentials,
}

impl DeviceSession {
    pub fn new(device: IpAddr, credentials: Credentials) -> Self {
        Self {
            device,
            credentials,
        }
    }

    pub fn resolve(store: &dyn CredentialStore, device: IpAddr) -> Result<Self> {
        let credentials = store
            .credentials(device)
            .ok_or(BindError::CredentialsNotFound { device })?;
        Ok(Self::new(device, credentials))
    }
}

#[derive(Debug, Clone)]
pub struct OperationContext {
    pub request_id: String,
    pub tenant_id: String,
    pub session: DeviceSession,
}

impl OperationContext {
    pub fn new(tenant_id: impl Into<String>, session: DeviceSession) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.into(),
            session,
        }
    }

    /// Resolve the device session from the credential store and build a
    /// context for one request.
    pub fn for_device(
        tenant_id: impl Into<String>,
        store: &dyn CredentialStore,
        device: IpAddr,
    ) -> Result<Self> {
        Ok(Self::new(tenant_id, DeviceSession::resolve(store, device)?))
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }
}
