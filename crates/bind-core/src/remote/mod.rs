//! Contracts of the remote device and its collaborators.
//!
//! Every call takes the per-request [`DeviceSession`](crate::DeviceSession)
//! and reports failure as a [`RemoteError`]. Calls are idempotent at the
//! remote-object level only; managers never retry them.

pub mod edge;
pub mod fabric;

pub use edge::*;
pub use fabric::{BladeInventory, FabricClient};

use crate::error::RemoteError;

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;
