//! netbind core
//!
//! Everything the entity managers share: the error taxonomy, driver
//! configuration, the per-call device session, the binding store and network
//! registry, and the contracts of the remote device and its collaborators.

pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod locks;
pub mod registry;
pub mod remote;
pub mod store;
pub mod topology;

pub use completion::{CompletedEntity, CompletionNotifier, EventBusNotifier};
pub use config::{CredentialEntry, DriverConfig, EdgeConfig, FabricConfig, StorageConfig};
pub use context::{
    CredentialStore, Credentials, DeviceSession, OperationContext, StaticCredentialStore,
};
pub use error::{BindError, ErrorKind, RemoteError};
pub use locks::KeyedLocks;
pub use registry::NetworkRegistry;
pub use remote::{BladeInventory, EdgeLbClient, FabricClient, RemoteResult};
pub use store::{BindingStore, BindingTable, BindingTables, StoredBinding};
pub use topology::{FloatingIpTarget, NetworkInfo, NetworkTopology, RouterInfo};

/// Result type for binding operations
pub type Result<T> = std::result::Result<T, BindError>;
