//! Port profile naming and the live-profile cap.

use std::sync::atomic::{AtomicUsize, Ordering};

use netbind_core::{BindError, FabricConfig, Result};

/// Hands out slots under the configured profile cap. A slot is taken before
/// the device is asked to create a profile and returned once the profile is
/// gone, so concurrent creations are rejected rather than racing past the cap.
#[derive(Debug)]
pub struct ProfileAllocator {
    prefix: String,
    max: usize,
    live: AtomicUsize,
}

impl ProfileAllocator {
    pub fn new(config: &FabricConfig) -> Self {
        Self {
            prefix: config.profile_name_prefix.clone(),
            max: config.max_port_profiles,
            live: AtomicUsize::new(0),
        }
    }

    /// Profile name for a port: the prefix plus the first 16 hex digits of
    /// the md5 of the port id.
    pub fn profile_name(&self, port_id: &str) -> String {
        let digest = format!("{:x}", md5::compute(port_id.as_bytes()));
        format!("{}{}", self.prefix, &digest[..16])
    }

    pub fn acquire(&self, net_id: &str, port_id: &str) -> Result<()> {
        self.live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| {
                (live < self.max).then_some(live + 1)
            })
            .map(|_| ())
            .map_err(|_| BindError::ProfileLimitExceeded {
                net_id: net_id.to_string(),
                port_id: port_id.to_string(),
                max: self.max,
            })
    }

    pub fn release(&self) {
        if self
            .live
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |live| live.checked_sub(1))
            .is_err()
        {
            log::warn!("Port profile counter released below zero, ignoring");
        }
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}
