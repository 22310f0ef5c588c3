//! Remote status -> logical operating status

use netbind_core::{OperationContext, Result};
use netbind_shared_types::{EntityStatus, LoadBalancerBinding, OperatingStatus, OperatingStatuses};

use super::LbaasServices;

/// Walks one loadbalancer's edge service status and maps every remote object
/// back to its logical entity through the binding tables. Objects without a
/// binding are skipped.
#[derive(Clone)]
pub struct StatusReconciler {
    services: LbaasServices,
}

impl StatusReconciler {
    pub fn new(services: LbaasServices) -> Self {
        Self { services }
    }

    pub async fn get_operating_status(
        &self,
        ctx: &OperationContext,
        loadbalancer_id: &str,
    ) -> Result<OperatingStatuses> {
        let store = &self.services.store;
        let client = &self.services.client;

        let Some(binding) = store
            .get_opt::<LoadBalancerBinding>(&loadbalancer_id.to_string())
            .await
        else {
            log::debug!("Loadbalancer {} has no edge service yet", loadbalancer_id);
            return Ok(OperatingStatuses::default());
        };

        let service = client
            .get_service_status(ctx.session(), &binding.lb_service_id)
            .await?;
        let virtual_servers = client
            .get_virtual_servers_status(ctx.session(), &binding.lb_service_id)
            .await?;

        let mut statuses = OperatingStatuses::default();
        statuses.loadbalancers.push(EntityStatus::new(
            loadbalancer_id,
            OperatingStatus::from_remote(&service.service_status),
        ));

        for pool in &service.pools {
            let Some(pool_binding) = store.pool_by_lb_pool_id(loadbalancer_id, &pool.pool_id).await
            else {
                log::debug!("Edge pool {} has no pool binding", pool.pool_id);
                continue;
            };
            statuses.pools.push(EntityStatus::new(
                pool_binding.pool_id,
                OperatingStatus::from_remote(&pool.status),
            ));

            for member in &pool.members {
                if let Some(member_binding) = store
                    .member_by_remote(loadbalancer_id, &pool.pool_id, member.ip_address, member.port)
                    .await
                {
                    statuses.members.push(EntityStatus::new(
                        member_binding.member_id,
                        OperatingStatus::from_remote(&member.status),
                    ));
                }
            }
        }

        for vs in &virtual_servers.results {
            if let Some(listener_binding) = store
                .listener_by_vs_id(loadbalancer_id, &vs.virtual_server_id)
                .await
            {
                statuses.listeners.push(EntityStatus::new(
                    listener_binding.listener_id,
                    OperatingStatus::from_remote(&vs.status),
                ));
            }
        }

        Ok(statuses)
    }
}
