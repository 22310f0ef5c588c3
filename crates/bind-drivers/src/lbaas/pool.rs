use netbind_core::remote::PoolSpec;
use netbind_core::{CompletedEntity, OperationContext, Result};
use netbind_shared_types::{LbAlgorithm, ListenerBinding, ListenerKey, Pool, PoolBinding, PoolKey};

use super::LbaasServices;

fn remote_algorithm(algorithm: LbAlgorithm) -> &'static str {
    match algorithm {
        LbAlgorithm::RoundRobin => "ROUND_ROBIN",
        LbAlgorithm::LeastConnections => "LEAST_CONNECTION",
        LbAlgorithm::SourceIp => "IP_HASH",
    }
}

pub struct PoolManager {
    services: LbaasServices,
}

impl PoolManager {
    pub fn new(services: LbaasServices) -> Self {
        Self { services }
    }

    fn spec(&self, pool: &Pool) -> PoolSpec {
        PoolSpec {
            display_name: self.services.display_name(&pool.name, "pool", &pool.id),
            description: pool.description.clone(),
            algorithm: remote_algorithm(pool.lb_algorithm).to_string(),
            enabled: pool.admin_state_up,
        }
    }

    /// Create the edge pool and bind it; if the pool belongs to a bound
    /// listener it becomes that virtual server's default pool.
    pub async fn create(&self, ctx: &OperationContext, pool: &Pool) -> Result<()> {
        log::info!("Creating pool {} ({})", pool.id, pool.lb_algorithm);

        let store = &self.services.store;
        let client = &self.services.client;
        let session = ctx.session();
        let lb_id = pool.loadbalancer_id();
        let key = PoolKey::new(lb_id, &pool.id);
        let _guard = store.lock_entry::<PoolBinding>(&key).await;
        self.services.ensure_unbound::<PoolBinding>(&key).await?;

        let lb_pool_id = client.create_pool(session, &self.spec(pool)).await?;
        let mut binding = PoolBinding {
            loadbalancer_id: lb_id.to_string(),
            pool_id: pool.id.clone(),
            lb_pool_id: lb_pool_id.clone(),
            lb_vs_id: None,
        };
        if let Err(e) = store.add(binding.clone()).await {
            self.discard_pool(ctx, &lb_pool_id).await;
            return Err(e);
        }

        let listener_binding = match &pool.listener {
            Some(listener) => {
                store
                    .get_opt::<ListenerBinding>(&ListenerKey::new(lb_id, &listener.id))
                    .await
            }
            None => None,
        };

        if let Some(listener_binding) = listener_binding {
            let vs_id = listener_binding.lb_vs_id;
            if let Err(e) = client
                .set_virtual_server_pool(session, &vs_id, Some(&lb_pool_id))
                .await
            {
                log::error!("Failed to attach pool {} to virtual server {}: {}", pool.id, vs_id, e);
                self.discard_pool(ctx, &lb_pool_id).await;
                if let Err(err) = store.delete::<PoolBinding>(&key).await {
                    log::warn!("Rollback: failed to drop pool binding {}: {}", key, err);
                }
                return Err(e.into());
            }

            binding.lb_vs_id = Some(vs_id);
            store.update(binding).await?;
        }

        self.services
            .complete(ctx, CompletedEntity::Pool(pool.clone()), false)
            .await;
        Ok(())
    }

    pub async fn update(&self, ctx: &OperationContext, _old: &Pool, new: &Pool) -> Result<()> {
        log::info!("Updating pool {}", new.id);

        let key = PoolKey::new(new.loadbalancer_id(), &new.id);
        let _guard = self.services.store.lock_entry::<PoolBinding>(&key).await;
        let binding = self.services.store.get::<PoolBinding>(&key).await?;

        self.services
            .client
            .update_pool(ctx.session(), &binding.lb_pool_id, &self.spec(new))
            .await?;

        self.services
            .complete(ctx, CompletedEntity::Pool(new.clone()), false)
            .await;
        Ok(())
    }

    pub async fn delete(&self, ctx: &OperationContext, pool: &Pool) -> Result<()> {
        log::info!("Deleting pool {}", pool.id);

        let store = &self.services.store;
        let client = &self.services.client;
        let key = PoolKey::new(pool.loadbalancer_id(), &pool.id);
        let _guard = store.lock_entry::<PoolBinding>(&key).await;

        if let Some(binding) = store.get_opt::<PoolBinding>(&key).await {
            if let Some(vs_id) = &binding.lb_vs_id {
                client
                    .set_virtual_server_pool(ctx.session(), vs_id, None)
                    .await?;
            }
            client.delete_pool(ctx.session(), &binding.lb_pool_id).await?;
            store.delete::<PoolBinding>(&key).await?;
        }

        self.services
            .complete(ctx, CompletedEntity::Pool(pool.clone()), true)
            .await;
        Ok(())
    }

    async fn discard_pool(&self, ctx: &OperationContext, lb_pool_id: &str) {
        if let Err(e) = self.services.client.delete_pool(ctx.session(), lb_pool_id).await {
            log::warn!("Rollback: failed to delete edge pool {}: {}", lb_pool_id, e);
        }
    }
}
