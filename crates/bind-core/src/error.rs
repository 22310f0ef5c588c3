//! Error taxonomy for binding operations

use std::net::IpAddr;

use netbind_shared_types::{BindingKind, SharedTypeError};
use thiserror::Error;

/// Coarse classification every [`BindError`] maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    LimitExceeded,
    InvalidInput,
    BadRequest,
    RemoteUnavailable,
    RemoteRejected,
    Internal,
}

/// Failure reported by the remote device or one of its collaborators.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("device unavailable during {operation}: {message}")]
    Unavailable { operation: String, message: String },

    #[error("device rejected {operation}: {message}")]
    Rejected { operation: String, message: String },
}

impl RemoteError {
    pub fn unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError::Unavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BindError {
    #[error("Network {net_id} could not be found")]
    NetworkNotFound { net_id: String },

    #[error("Port {port_id} could not be found on network {net_id}")]
    PortNotFound { net_id: String, port_id: String },

    #[error("No {kind} binding for {key}")]
    BindingNotFound { kind: BindingKind, key: String },

    #[error("No credentials configured for device {device}")]
    CredentialsNotFound { device: IpAddr },

    #[error("Unable to complete operation on port {port_id} for network {net_id}: attachment {att_id} is plugged in")]
    PortInUse {
        net_id: String,
        port_id: String,
        att_id: String,
    },

    #[error("Network {net_id} still has {ports} port(s)")]
    NetworkInUse { net_id: String, ports: usize },

    #[error("{resource} {id} already exists")]
    AlreadyExists { resource: String, id: String },

    #[error("Port profile limit of {max} reached, cannot create port {port_id} on network {net_id}")]
    ProfileLimitExceeded {
        net_id: String,
        port_id: String,
        max: usize,
    },

    #[error("Unsupported port state: {state}")]
    InvalidState { state: String },

    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Binding storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

impl BindError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BindError::NetworkNotFound { .. }
            | BindError::PortNotFound { .. }
            | BindError::BindingNotFound { .. }
            | BindError::CredentialsNotFound { .. } => ErrorKind::NotFound,
            BindError::PortInUse { .. }
            | BindError::NetworkInUse { .. }
            | BindError::AlreadyExists { .. } => ErrorKind::Conflict,
            BindError::ProfileLimitExceeded { .. } => ErrorKind::LimitExceeded,
            BindError::InvalidState { .. } | BindError::InvalidInput { .. } => {
                ErrorKind::InvalidInput
            }
            BindError::BadRequest { .. } => ErrorKind::BadRequest,
            BindError::Remote(RemoteError::Unavailable { .. }) => ErrorKind::RemoteUnavailable,
            BindError::Remote(RemoteError::Rejected { .. }) => ErrorKind::RemoteRejected,
            BindError::Storage(_) | BindError::Serialization(_) | BindError::Config(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        BindError::BadRequest {
            message: message.into(),
        }
    }

    pub fn binding_not_found(kind: BindingKind, key: impl ToString) -> Self {
        BindError::BindingNotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BindError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<SharedTypeError> for BindError {
    fn from(err: SharedTypeError) -> Self {
        match err {
            SharedTypeError::UnknownValue { field, value } if field == "port_state" => {
                BindError::InvalidState { state: value }
            }
            SharedTypeError::UnknownValue { field, value } => BindError::InvalidInput {
                field: field.to_string(),
                reason: format!("unsupported value '{}'", value),
            },
        }
    }
}
