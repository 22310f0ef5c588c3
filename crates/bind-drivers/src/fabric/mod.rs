//! Fabric interconnect manager
//!
//! Networks are VLANs on the interconnect; every port owns a port profile
//! that points at the default VLAN until an interface is plugged in and at
//! the network's VLAN afterwards.

mod profiles;

#[cfg(test)]
mod tests;

pub use profiles::ProfileAllocator;

use std::sync::Arc;

use netbind_core::{
    BindError, BladeInventory, CompletedEntity, CompletionNotifier, FabricClient, FabricConfig,
    NetworkRegistry, OperationContext, Result,
};
use netbind_shared_types::{Network, Port, PortPlacement, PortProfile, PortState};

pub struct FabricManager {
    client: Arc<dyn FabricClient>,
    inventory: Arc<dyn BladeInventory>,
    registry: Arc<NetworkRegistry>,
    notifier: Arc<dyn CompletionNotifier>,
    profiles: ProfileAllocator,
    config: FabricConfig,
}

impl FabricManager {
    pub fn new(
        client: Arc<dyn FabricClient>,
        inventory: Arc<dyn BladeInventory>,
        registry: Arc<NetworkRegistry>,
        notifier: Arc<dyn CompletionNotifier>,
        config: FabricConfig,
    ) -> Self {
        Self {
            client,
            inventory,
            registry,
            notifier,
            profiles: ProfileAllocator::new(&config),
            config,
        }
    }

    pub fn profiles(&self) -> &ProfileAllocator {
        &self.profiles
    }

    pub async fn get_all_networks(&self, _ctx: &OperationContext) -> Vec<Network> {
        self.registry.list().await
    }

    pub async fn create_network(
        &self,
        ctx: &OperationContext,
        net_name: &str,
        net_id: &str,
        vlan_name: &str,
        vlan_id: u16,
    ) -> Result<Network> {
        log::info!("Creating network {} on VLAN {} ({})", net_id, vlan_name, vlan_id);

        if vlan_id == 0 || vlan_id > 4094 {
            return Err(BindError::invalid_input(
                "vlan_id",
                format!("{} is outside 1..=4094", vlan_id),
            ));
        }

        let _guard = self.registry.lock_network(net_id).await;
        if self.registry.contains(net_id).await {
            return Err(BindError::AlreadyExists {
                resource: "network".to_string(),
                id: net_id.to_string(),
            });
        }

        self.client
            .create_vlan(ctx.session(), vlan_name, vlan_id)
            .await?;

        let network = Network::new(net_id, net_name, vlan_name, vlan_id);
        self.registry.insert(network.clone()).await?;

        log::info!("Created network {}", net_id);
        self.complete(ctx, CompletedEntity::Network(network.clone()), false)
            .await;
        Ok(network)
    }

    /// Deleting a network that still has ports is refused; the caller has to
    /// delete the ports first.
    pub async fn delete_network(&self, ctx: &OperationContext, net_id: &str) -> Result<Network> {
        log::info!("Deleting network {}", net_id);

        let _guard = self.registry.lock_network(net_id).await;
        let network = self.registry.get(net_id).await?;
        if !network.ports.is_empty() {
            return Err(BindError::NetworkInUse {
                net_id: net_id.to_string(),
                ports: network.ports.len(),
            });
        }

        self.client
            .delete_vlan(ctx.session(), &network.vlan_name)
            .await?;
        let network = self.registry.remove(net_id).await?;

        log::info!("Deleted network {}", net_id);
        self.complete(ctx, CompletedEntity::Network(network.clone()), true)
            .await;
        Ok(network)
    }

    pub async fn get_network_details(
        &self,
        _ctx: &OperationContext,
        net_id: &str,
    ) -> Result<Network> {
        self.registry.get(net_id).await
    }

    pub async fn rename_network(
        &self,
        ctx: &OperationContext,
        net_id: &str,
        new_name: &str,
    ) -> Result<Network> {
        let network = self
            .registry
            .with_network_mut(net_id, |network| {
                network.name = new_name.to_string();
                Ok(network.clone())
            })
            .await?;

        log::info!("Renamed network {} to {}", net_id, new_name);
        self.complete(ctx, CompletedEntity::Network(network.clone()), false)
            .await;
        Ok(network)
    }

    pub async fn get_all_ports(&self, _ctx: &OperationContext, net_id: &str) -> Result<Vec<Port>> {
        let network = self.registry.get(net_id).await?;
        Ok(network.ports.into_values().collect())
    }

    pub async fn get_port_details(
        &self,
        _ctx: &OperationContext,
        net_id: &str,
        port_id: &str,
    ) -> Result<Port> {
        let network = self.registry.get(net_id).await?;
        find_port(&network, port_id).cloned()
    }

    /// Create a port: take a profile slot, create the profile on the default
    /// VLAN, reserve a blade interface, then register the port as UP.
    pub async fn create_port(
        &self,
        ctx: &OperationContext,
        net_id: &str,
        port_id: &str,
        placement: &PortPlacement,
    ) -> Result<Port> {
        log::info!(
            "Creating port {} on network {} (chassis {}, blade {})",
            port_id,
            net_id,
            placement.chassis_id,
            placement.blade_id
        );

        let _guard = self.registry.lock_network(net_id).await;
        let network = self.registry.get(net_id).await?;
        if network.ports.contains_key(port_id) {
            return Err(BindError::AlreadyExists {
                resource: "port".to_string(),
                id: port_id.to_string(),
            });
        }

        self.profiles.acquire(net_id, port_id)?;

        let profile = PortProfile {
            name: self.profiles.profile_name(port_id),
            vlan_name: self.config.default_vlan_name.clone(),
            vlan_id: self.config.default_vlan_id,
        };

        if let Err(e) = self
            .client
            .create_profile(ctx.session(), &profile.name, &profile.vlan_name)
            .await
        {
            self.profiles.release();
            return Err(e.into());
        }

        let reservation = match self
            .inventory
            .reserve_interface(ctx.session(), placement, &ctx.tenant_id, port_id, &profile.name)
            .await
        {
            Ok(reservation) => reservation,
            Err(e) => {
                self.discard_profile(ctx, &profile.name).await;
                return Err(e.into());
            }
        };

        let port = Port {
            id: port_id.to_string(),
            state: PortState::Up,
            attachment: None,
            profile,
            reservation: Some(reservation),
        };

        let inserted = port.clone();
        self.registry
            .with_network_mut(net_id, move |network| {
                network.ports.insert(inserted.id.clone(), inserted);
                Ok(())
            })
            .await?;

        log::info!(
            "Created port {} with profile {} ({} of {} profiles in use)",
            port_id,
            port.profile.name,
            self.profiles.live(),
            self.profiles.max()
        );
        self.complete_port(ctx, net_id, &port, false).await;
        Ok(port)
    }

    /// Delete a port: its profile goes first, then the port, then the blade
    /// interface reservation. A failed unreserve is logged and the delete
    /// still completes.
    pub async fn delete_port(
        &self,
        ctx: &OperationContext,
        net_id: &str,
        port_id: &str,
    ) -> Result<Port> {
        log::info!("Deleting port {} on network {}", port_id, net_id);

        let _guard = self.registry.lock_network(net_id).await;
        let network = self.registry.get(net_id).await?;
        let port = find_port(&network, port_id)?.clone();
        if let Some(att_id) = &port.attachment {
            return Err(BindError::PortInUse {
                net_id: net_id.to_string(),
                port_id: port_id.to_string(),
                att_id: att_id.clone(),
            });
        }

        self.client
            .delete_profile(ctx.session(), &port.profile.name)
            .await?;
        self.profiles.release();

        self.registry
            .with_network_mut(net_id, |network| {
                network.ports.shift_remove(port_id);
                Ok(())
            })
            .await?;

        if let Some(reservation) = &port.reservation {
            if let Err(e) = self
                .inventory
                .unreserve_interface(ctx.session(), reservation)
                .await
            {
                // The port and its profile are gone; the stale reservation is
                // left for the inventory to reclaim.
                log::warn!(
                    "Port {} deleted but interface {} on chassis {} blade {} is still reserved: {}",
                    port_id,
                    reservation.interface_dn,
                    reservation.chassis_id,
                    reservation.blade_id,
                    e
                );
            }
        }

        log::info!("Deleted port {}", port_id);
        self.complete_port(ctx, net_id, &port, true).await;
        Ok(port)
    }

    pub async fn update_port(
        &self,
        ctx: &OperationContext,
        net_id: &str,
        port_id: &str,
        port_state: &str,
    ) -> Result<Port> {
        let port = self
            .registry
            .with_network_mut(net_id, |network| {
                let port = network
                    .ports
                    .get_mut(port_id)
                    .ok_or_else(|| port_not_found(net_id, port_id))?;
                port.state = port_state.parse::<PortState>()?;
                Ok(port.clone())
            })
            .await?;

        log::info!("Port {} on network {} is now {}", port_id, net_id, port.state);
        self.complete_port(ctx, net_id, &port, false).await;
        Ok(port)
    }

    /// Attach a remote interface and move the port's profile onto the VLAN of
    /// `net_id`. An interface can be attached to at most one port of a
    /// network.
    pub async fn plug_interface(
        &self,
        ctx: &OperationContext,
        net_id: &str,
        port_id: &str,
        remote_interface_id: &str,
    ) -> Result<Port> {
        log::info!(
            "Plugging interface {} into port {} on network {}",
            remote_interface_id,
            port_id,
            net_id
        );

        let _guard = self.registry.lock_network(net_id).await;
        let network = self.registry.get(net_id).await?;

        if let Some(holder) = network.port_with_attachment(remote_interface_id) {
            log::warn!(
                "Interface {} already attached to port {} on network {}",
                remote_interface_id,
                holder.id,
                net_id
            );
            return Err(BindError::PortInUse {
                net_id: net_id.to_string(),
                port_id: port_id.to_string(),
                att_id: remote_interface_id.to_string(),
            });
        }

        let port = find_port(&network, port_id)?;
        if let Some(att_id) = &port.attachment {
            return Err(BindError::PortInUse {
                net_id: net_id.to_string(),
                port_id: port_id.to_string(),
                att_id: att_id.clone(),
            });
        }

        self.client
            .change_vlan_in_profile(
                ctx.session(),
                &port.profile.name,
                &port.profile.vlan_name,
                &network.vlan_name,
            )
            .await?;

        let port = self
            .registry
            .with_network_mut(net_id, |network| {
                let (vlan_name, vlan_id) = (network.vlan_name.clone(), network.vlan_id);
                let port = network
                    .ports
                    .get_mut(port_id)
                    .ok_or_else(|| port_not_found(net_id, port_id))?;
                port.attachment = Some(remote_interface_id.to_string());
                port.profile.vlan_name = vlan_name;
                port.profile.vlan_id = vlan_id;
                Ok(port.clone())
            })
            .await?;

        self.complete_port(ctx, net_id, &port, false).await;
        Ok(port)
    }

    /// Detach whatever is plugged into the port and park its profile on the
    /// default VLAN.
    pub async fn unplug_interface(
        &self,
        ctx: &OperationContext,
        net_id: &str,
        port_id: &str,
    ) -> Result<Port> {
        log::info!("Unplugging port {} on network {}", port_id, net_id);

        let _guard = self.registry.lock_network(net_id).await;
        let network = self.registry.get(net_id).await?;
        let port = find_port(&network, port_id)?;

        self.client
            .change_vlan_in_profile(
                ctx.session(),
                &port.profile.name,
                &port.profile.vlan_name,
                &self.config.default_vlan_name,
            )
            .await?;

        let port = self
            .registry
            .with_network_mut(net_id, |network| {
                let port = network
                    .ports
                    .get_mut(port_id)
                    .ok_or_else(|| port_not_found(net_id, port_id))?;
                port.attachment = None;
                port.profile.vlan_name = self.config.default_vlan_name.clone();
                port.profile.vlan_id = self.config.default_vlan_id;
                Ok(port.clone())
            })
            .await?;

        self.complete_port(ctx, net_id, &port, false).await;
        Ok(port)
    }

    async fn discard_profile(&self, ctx: &OperationContext, profile_name: &str) {
        match self.client.delete_profile(ctx.session(), profile_name).await {
            Ok(()) => self.profiles.release(),
            // The profile still exists on the device, so its slot stays taken.
            Err(e) => log::error!("Failed to roll back port profile {}: {}", profile_name, e),
        }
    }

    async fn complete(&self, ctx: &OperationContext, entity: CompletedEntity, delete: bool) {
        self.notifier
            .successful_completion(ctx, &entity, delete)
            .await;
    }

    async fn complete_port(&self, ctx: &OperationContext, net_id: &str, port: &Port, delete: bool) {
        let entity = CompletedEntity::Port {
            net_id: net_id.to_string(),
            port: port.clone(),
        };
        self.complete(ctx, entity, delete).await;
    }
}

fn port_not_found(net_id: &str, port_id: &str) -> BindError {
    BindError::PortNotFound {
        net_id: net_id.to_string(),
        port_id: port_id.to_string(),
    }
}

fn find_port<'a>(network: &'a Network, port_id: &str) -> Result<&'a Port> {
    network
        .ports
        .get(port_id)
        .ok_or_else(|| port_not_found(&network.id, port_id))
}
