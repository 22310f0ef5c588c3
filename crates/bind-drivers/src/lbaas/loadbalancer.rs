use netbind_core::{BindError, CompletedEntity, OperationContext, Result};
use netbind_shared_types::{LoadBalancer, LoadBalancerBinding, OperatingStatuses};

use super::{LbaasServices, StatusReconciler};

/// The edge service backing a loadbalancer is provisioned lazily by the first
/// member, so create and update touch nothing on the device.
pub struct LoadBalancerManager {
    services: LbaasServices,
    status: StatusReconciler,
}

impl LoadBalancerManager {
    pub fn new(services: LbaasServices) -> Self {
        Self {
            status: StatusReconciler::new(services.clone()),
            services,
        }
    }

    pub async fn create(&self, ctx: &OperationContext, lb: &LoadBalancer) -> Result<()> {
        log::info!("Creating loadbalancer {} on subnet {}", lb.id, lb.vip_subnet_id);

        self.validate_vip_subnet(lb).await?;

        self.services
            .complete(ctx, CompletedEntity::LoadBalancer(lb.clone()), false)
            .await;
        Ok(())
    }

    pub async fn update(
        &self,
        ctx: &OperationContext,
        _old: &LoadBalancer,
        new: &LoadBalancer,
    ) -> Result<()> {
        self.services
            .complete(ctx, CompletedEntity::LoadBalancer(new.clone()), false)
            .await;
        Ok(())
    }

    /// Drop the edge service once nothing is attached to it, then the
    /// binding. A service still carrying virtual servers is left in place.
    pub async fn delete(&self, ctx: &OperationContext, lb: &LoadBalancer) -> Result<()> {
        log::info!("Deleting loadbalancer {}", lb.id);

        let store = &self.services.store;
        let key = lb.id.clone();
        let _guard = store.lock_entry::<LoadBalancerBinding>(&key).await;

        if let Some(binding) = store.get_opt::<LoadBalancerBinding>(&key).await {
            let client = &self.services.client;
            let service = client
                .get_service(ctx.session(), &binding.lb_service_id)
                .await?;

            if service.virtual_server_ids.is_empty() {
                client
                    .delete_service(ctx.session(), &binding.lb_service_id)
                    .await?;
                log::info!(
                    "Deleted edge service {} of loadbalancer {}",
                    binding.lb_service_id,
                    lb.id
                );
            } else {
                log::info!(
                    "Edge service {} still has {} virtual server(s), keeping it",
                    binding.lb_service_id,
                    service.virtual_server_ids.len()
                );
            }

            store.delete::<LoadBalancerBinding>(&key).await?;
        }

        self.services
            .complete(ctx, CompletedEntity::LoadBalancer(lb.clone()), true)
            .await;
        Ok(())
    }

    pub async fn get_operating_status(
        &self,
        ctx: &OperationContext,
        loadbalancer_id: &str,
    ) -> Result<OperatingStatuses> {
        self.status.get_operating_status(ctx, loadbalancer_id).await
    }

    /// The VIP has to be reachable from the edge: either on an external
    /// network or on a network attached to a router.
    async fn validate_vip_subnet(&self, lb: &LoadBalancer) -> Result<()> {
        let topology = &self.services.topology;
        let network = topology.network_for_subnet(&lb.vip_subnet_id).await?;
        if network.external {
            return Ok(());
        }

        if topology.router_for_network(&network.id).await?.is_none() {
            return Err(BindError::bad_request(format!(
                "VIP subnet {} of loadbalancer {} is neither external nor attached to a router",
                lb.vip_subnet_id, lb.id
            )));
        }
        Ok(())
    }
}
