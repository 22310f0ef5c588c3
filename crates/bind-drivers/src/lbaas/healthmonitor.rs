use netbind_core::remote::{MonitorResourceType, MonitorSpec};
use netbind_core::{BindError, CompletedEntity, OperationContext, Result};
use netbind_shared_types::{HealthMonitor, MonitorBinding, MonitorKey, MonitorType, PoolBinding, PoolKey};

use super::LbaasServices;

/// Parse an expected-codes expression: a single code ("200"), a list
/// ("200,202") or an inclusive range ("200-204").
pub fn parse_expected_codes(expected: &str) -> Result<Vec<u16>> {
    let invalid = |reason: String| BindError::invalid_input("expected_codes", reason);
    let code = |s: &str| -> Result<u16> {
        let value: u16 = s
            .trim()
            .parse()
            .map_err(|_| invalid(format!("'{}' is not a status code", s.trim())))?;
        if !(100..=599).contains(&value) {
            return Err(invalid(format!("{} is not an HTTP status code", value)));
        }
        Ok(value)
    };

    let mut codes = Vec::new();
    for part in expected.split(',') {
        match part.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (code(start)?, code(end)?);
                if start > end {
                    return Err(invalid(format!("empty range {}-{}", start, end)));
                }
                codes.extend(start..=end);
            }
            None => codes.push(code(part)?),
        }
    }
    Ok(codes)
}

fn resource_type(monitor_type: MonitorType) -> MonitorResourceType {
    match monitor_type {
        MonitorType::Ping => MonitorResourceType::LbIcmpMonitor,
        MonitorType::Tcp => MonitorResourceType::LbTcpMonitor,
        MonitorType::Http => MonitorResourceType::LbHttpMonitor,
        MonitorType::Https => MonitorResourceType::LbHttpsMonitor,
    }
}

pub struct HealthMonitorManager {
    services: LbaasServices,
}

impl HealthMonitorManager {
    pub fn new(services: LbaasServices) -> Self {
        Self { services }
    }

    fn spec(&self, hm: &HealthMonitor) -> Result<MonitorSpec> {
        let resource_type = resource_type(hm.monitor_type);
        let mut spec = MonitorSpec {
            resource_type,
            display_name: self.services.display_name(&hm.name, "hm", &hm.id),
            fall_count: hm.max_retries,
            interval: hm.delay,
            timeout: hm.timeout,
            request_method: None,
            request_url: None,
            response_status_codes: None,
        };

        if resource_type.is_http() {
            spec.request_method = hm.http_method.clone();
            spec.request_url = hm.url_path.clone();
            spec.response_status_codes = hm
                .expected_codes
                .as_deref()
                .map(parse_expected_codes)
                .transpose()?;
        }
        Ok(spec)
    }

    pub async fn create(&self, ctx: &OperationContext, hm: &HealthMonitor) -> Result<()> {
        log::info!("Creating {} health monitor {}", hm.monitor_type, hm.id);

        let store = &self.services.store;
        let client = &self.services.client;
        let session = ctx.session();
        let lb_id = hm.loadbalancer_id();
        let key = MonitorKey::new(lb_id, &hm.pool.id, &hm.id);
        let _guard = store.lock_entry::<MonitorBinding>(&key).await;
        self.services.ensure_unbound::<MonitorBinding>(&key).await?;

        let spec = self.spec(hm)?;
        let pool_binding = store
            .get::<PoolBinding>(&PoolKey::new(lb_id, &hm.pool.id))
            .await?;

        let monitor_id = client.create_monitor(session, &spec).await?;
        if let Err(e) = client
            .add_monitor_to_pool(session, &pool_binding.lb_pool_id, &monitor_id)
            .await
        {
            log::error!("Failed to attach monitor {} to pool {}: {}", hm.id, hm.pool.id, e);
            if let Err(err) = client.delete_monitor(session, &monitor_id).await {
                log::warn!("Rollback: failed to delete edge monitor {}: {}", monitor_id, err);
            }
            return Err(e.into());
        }

        store
            .add(MonitorBinding {
                loadbalancer_id: lb_id.to_string(),
                pool_id: hm.pool.id.clone(),
                hm_id: hm.id.clone(),
                lb_monitor_id: monitor_id,
                lb_pool_id: pool_binding.lb_pool_id,
            })
            .await?;

        self.services
            .complete(ctx, CompletedEntity::HealthMonitor(hm.clone()), false)
            .await;
        Ok(())
    }

    pub async fn update(
        &self,
        ctx: &OperationContext,
        _old: &HealthMonitor,
        new: &HealthMonitor,
    ) -> Result<()> {
        log::info!("Updating health monitor {}", new.id);

        let store = &self.services.store;
        let key = MonitorKey::new(new.loadbalancer_id(), &new.pool.id, &new.id);
        let _guard = store.lock_entry::<MonitorBinding>(&key).await;
        let binding = store.get::<MonitorBinding>(&key).await?;

        let spec = self.spec(new)?;
        self.services
            .client
            .update_monitor(ctx.session(), &binding.lb_monitor_id, &spec)
            .await?;

        self.services
            .complete(ctx, CompletedEntity::HealthMonitor(new.clone()), false)
            .await;
        Ok(())
    }

    pub async fn delete(&self, ctx: &OperationContext, hm: &HealthMonitor) -> Result<()> {
        log::info!("Deleting health monitor {}", hm.id);

        let store = &self.services.store;
        let client = &self.services.client;
        let key = MonitorKey::new(hm.loadbalancer_id(), &hm.pool.id, &hm.id);
        let _guard = store.lock_entry::<MonitorBinding>(&key).await;

        if let Some(binding) = store.get_opt::<MonitorBinding>(&key).await {
            client
                .remove_monitor_from_pool(ctx.session(), &binding.lb_pool_id, &binding.lb_monitor_id)
                .await?;
            client
                .delete_monitor(ctx.session(), &binding.lb_monitor_id)
                .await?;
            store.delete::<MonitorBinding>(&key).await?;
        }

        self.services
            .complete(ctx, CompletedEntity::HealthMonitor(hm.clone()), true)
            .await;
        Ok(())
    }
}
