use std::net::IpAddr;

use netbind_core::remote::{
    AppProfileSpec, AppProfileType, CertificateSpec, ClientSslBinding, VirtualServerSpec,
};
use netbind_core::{BindError, CompletedEntity, OperationContext, Result};
use netbind_shared_types::{
    Listener, ListenerBinding, ListenerKey, ListenerProtocol, LoadBalancer, LoadBalancerBinding,
    PoolBinding, PoolKey,
};

use super::LbaasServices;

/// Remote objects created so far by one listener creation, deleted again in
/// reverse order if a later step fails.
#[derive(Default)]
struct CreatedObjects {
    certificate_id: Option<String>,
    app_profile_id: Option<String>,
    vs_id: Option<String>,
    service_id: Option<String>,
}

pub struct ListenerManager {
    services: LbaasServices,
}

impl ListenerManager {
    pub fn new(services: LbaasServices) -> Self {
        Self { services }
    }

    pub async fn create(&self, ctx: &OperationContext, listener: &Listener) -> Result<()> {
        log::info!(
            "Creating {} listener {} on port {}",
            listener.protocol,
            listener.id,
            listener.protocol_port
        );

        let lb_id = listener.loadbalancer_id();
        let key = ListenerKey::new(lb_id, &listener.id);
        let _guard = self.services.store.lock_entry::<ListenerBinding>(&key).await;
        self.services.ensure_unbound::<ListenerBinding>(&key).await?;
        // Held until the binding is stored so a concurrent first member
        // cannot bind the loadbalancer service between lookup and attach.
        let _lb_guard = self
            .services
            .store
            .lock_entry::<LoadBalancerBinding>(&lb_id.to_string())
            .await;

        if listener.protocol == ListenerProtocol::TerminatedHttps
            && listener.default_tls_certificate.is_none()
        {
            return Err(BindError::bad_request(format!(
                "TERMINATED_HTTPS listener {} has no default TLS certificate",
                listener.id
            )));
        }

        let mut created = CreatedObjects::default();
        match self.create_remote(ctx, listener, &mut created).await {
            Ok(binding) => {
                if let Err(e) = self.services.store.add(binding).await {
                    self.roll_back(ctx, created).await;
                    return Err(e);
                }
            }
            Err(e) => {
                log::error!("Failed to create listener {}: {}", listener.id, e);
                self.roll_back(ctx, created).await;
                return Err(e);
            }
        }

        self.services
            .complete(ctx, CompletedEntity::Listener(listener.clone()), false)
            .await;
        Ok(())
    }

    async fn create_remote(
        &self,
        ctx: &OperationContext,
        listener: &Listener,
        created: &mut CreatedObjects,
    ) -> Result<ListenerBinding> {
        let client = &self.services.client;
        let session = ctx.session();
        let lb_id = listener.loadbalancer_id();

        let ip_address = self.virtual_ip(&listener.loadbalancer).await?;
        let pool_id = self.default_lb_pool_id(listener).await;

        if let Some(cert) = &listener.default_tls_certificate {
            let spec = CertificateSpec {
                display_name: self.services.display_name("", "cert", &cert.id),
                pem_encoded: cert.certificate.clone(),
                private_key: cert.private_key.clone(),
                passphrase: cert.passphrase.clone(),
            };
            created.certificate_id = Some(client.create_certificate(session, &spec).await?);
        }

        let app_profile_id = client
            .create_app_profile(session, &self.app_profile_spec(listener))
            .await?;
        created.app_profile_id = Some(app_profile_id.clone());

        let mut spec = self.virtual_server_spec(listener, ip_address, &app_profile_id);
        spec.pool_id = pool_id;
        spec.client_ssl_profile_binding =
            created
                .certificate_id
                .clone()
                .map(|default_certificate_id| ClientSslBinding {
                    default_certificate_id,
                });
        let vs_id = client.create_virtual_server(session, &spec).await?;
        created.vs_id = Some(vs_id.clone());

        if let Some(lb_binding) = self
            .services
            .store
            .get_opt::<LoadBalancerBinding>(&lb_id.to_string())
            .await
        {
            client
                .add_virtual_server(session, &lb_binding.lb_service_id, &vs_id)
                .await?;
            created.service_id = Some(lb_binding.lb_service_id);
        }

        Ok(ListenerBinding {
            loadbalancer_id: lb_id.to_string(),
            listener_id: listener.id.clone(),
            app_profile_id,
            lb_vs_id: vs_id,
        })
    }

    async fn roll_back(&self, ctx: &OperationContext, created: CreatedObjects) {
        let client = &self.services.client;
        let session = ctx.session();

        if let (Some(service_id), Some(vs_id)) = (&created.service_id, &created.vs_id) {
            if let Err(e) = client.remove_virtual_server(session, service_id, vs_id).await {
                log::warn!("Rollback: failed to detach virtual server {}: {}", vs_id, e);
            }
        }
        if let Some(vs_id) = &created.vs_id {
            if let Err(e) = client.delete_virtual_server(session, vs_id).await {
                log::warn!("Rollback: failed to delete virtual server {}: {}", vs_id, e);
            }
        }
        if let Some(profile_id) = &created.app_profile_id {
            if let Err(e) = client.delete_app_profile(session, profile_id).await {
                log::warn!("Rollback: failed to delete app profile {}: {}", profile_id, e);
            }
        }
        if let Some(cert_id) = &created.certificate_id {
            if let Err(e) = client.delete_certificate(session, cert_id).await {
                log::warn!("Rollback: failed to delete certificate {}: {}", cert_id, e);
            }
        }
    }

    pub async fn update(
        &self,
        ctx: &OperationContext,
        _old: &Listener,
        new: &Listener,
    ) -> Result<()> {
        log::info!("Updating listener {}", new.id);

        let key = ListenerKey::new(new.loadbalancer_id(), &new.id);
        let _guard = self.services.store.lock_entry::<ListenerBinding>(&key).await;
        let binding = self.services.store.get::<ListenerBinding>(&key).await?;

        let client = &self.services.client;
        let ip_address = self.virtual_ip(&new.loadbalancer).await?;
        let mut spec = self.virtual_server_spec(new, ip_address, &binding.app_profile_id);
        spec.pool_id = self.default_lb_pool_id(new).await;

        client
            .update_virtual_server(ctx.session(), &binding.lb_vs_id, &spec)
            .await?;
        client
            .update_app_profile(ctx.session(), &binding.app_profile_id, &self.app_profile_spec(new))
            .await?;

        self.services
            .complete(ctx, CompletedEntity::Listener(new.clone()), false)
            .await;
        Ok(())
    }

    pub async fn delete(&self, ctx: &OperationContext, listener: &Listener) -> Result<()> {
        log::info!("Deleting listener {}", listener.id);

        let lb_id = listener.loadbalancer_id();
        let store = &self.services.store;
        let key = ListenerKey::new(lb_id, &listener.id);
        let _guard = store.lock_entry::<ListenerBinding>(&key).await;

        if let Some(binding) = store.get_opt::<ListenerBinding>(&key).await {
            let client = &self.services.client;
            let session = ctx.session();

            if let Some(lb_binding) = store
                .get_opt::<LoadBalancerBinding>(&lb_id.to_string())
                .await
            {
                let service = client.get_service(session, &lb_binding.lb_service_id).await?;
                if service.virtual_server_ids.contains(&binding.lb_vs_id) {
                    client
                        .remove_virtual_server(session, &lb_binding.lb_service_id, &binding.lb_vs_id)
                        .await?;
                }
            }

            let vs = client.get_virtual_server(session, &binding.lb_vs_id).await?;
            client.delete_virtual_server(session, &binding.lb_vs_id).await?;
            store.delete::<ListenerBinding>(&key).await?;

            // The binding is gone with its virtual server; what fails from here
            // on is left behind on the device.
            if let Some(cert_id) = &vs.default_certificate_id {
                if let Err(e) = client.delete_certificate(session, cert_id).await {
                    log::warn!(
                        "Listener {} deleted, orphaned certificate {}: {}",
                        listener.id,
                        cert_id,
                        e
                    );
                }
            }
            if let Err(e) = client
                .delete_app_profile(session, &binding.app_profile_id)
                .await
            {
                log::warn!(
                    "Listener {} deleted, orphaned app profile {}: {}",
                    listener.id,
                    binding.app_profile_id,
                    e
                );
            }
        }

        self.services
            .complete(ctx, CompletedEntity::Listener(listener.clone()), true)
            .await;
        Ok(())
    }

    /// Virtual servers listen on the VIP's floating IP when it has one.
    async fn virtual_ip(&self, lb: &LoadBalancer) -> Result<IpAddr> {
        let floating = self
            .services
            .topology
            .floating_ip_for_port(&lb.vip_port_id)
            .await?;
        Ok(floating.unwrap_or(lb.vip_address))
    }

    async fn default_lb_pool_id(&self, listener: &Listener) -> Option<String> {
        let pool_id = listener.default_pool_id.as_deref()?;
        let key = PoolKey::new(listener.loadbalancer_id(), pool_id);
        let binding = self.services.store.get_opt::<PoolBinding>(&key).await;
        if binding.is_none() {
            log::debug!("Default pool {} of listener {} is not bound yet", pool_id, listener.id);
        }
        binding.map(|b| b.lb_pool_id)
    }

    fn app_profile_spec(&self, listener: &Listener) -> AppProfileSpec {
        let resource_type = match listener.protocol {
            ListenerProtocol::Http | ListenerProtocol::TerminatedHttps => {
                AppProfileType::LbHttpProfile
            }
            ListenerProtocol::Tcp | ListenerProtocol::Https => AppProfileType::LbFastTcpProfile,
        };
        AppProfileSpec {
            resource_type,
            display_name: self
                .services
                .display_name(&listener.name, "listener", &listener.id),
            description: listener.description.clone(),
        }
    }

    fn virtual_server_spec(
        &self,
        listener: &Listener,
        ip_address: IpAddr,
        app_profile_id: &str,
    ) -> VirtualServerSpec {
        VirtualServerSpec {
            display_name: self
                .services
                .display_name(&listener.name, "listener", &listener.id),
            description: listener.description.clone(),
            enabled: listener.admin_state_up,
            ip_address,
            port: listener.protocol_port,
            ip_protocol: "TCP".to_string(),
            application_profile_id: app_profile_id.to_string(),
            pool_id: None,
            max_concurrent_connections: (listener.connection_limit != -1)
                .then_some(listener.connection_limit),
            client_ssl_profile_binding: None,
        }
    }
}
