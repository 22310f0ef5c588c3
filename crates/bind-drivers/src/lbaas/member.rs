//! Pool members
//!
//! The edge has no member objects: a pool carries its member list and every
//! change rewrites that list. The first member of a loadbalancer also decides
//! which router, and therefore which edge service, the loadbalancer lives on.

use std::net::IpAddr;

use netbind_core::remote::{AdvertisementRule, RemoteMember, RuleFilter, ServiceSpec};
use netbind_core::{BindError, CompletedEntity, OperationContext, Result};
use netbind_shared_types::{
    LoadBalancer, LoadBalancerBinding, Member, MemberBinding, MemberKey, PoolBinding, PoolKey,
};

use super::LbaasServices;

/// Where a member lands on the device.
struct MemberTarget {
    ip_address: IpAddr,
    router_id: String,
    device_router_id: String,
}

pub struct MemberManager {
    services: LbaasServices,
}

impl MemberManager {
    pub fn new(services: LbaasServices) -> Self {
        Self { services }
    }

    pub async fn create(&self, ctx: &OperationContext, member: &Member) -> Result<()> {
        log::info!(
            "Creating member {} ({}:{}) in pool {}",
            member.id,
            member.address,
            member.protocol_port,
            member.pool.id
        );

        let store = &self.services.store;
        let client = &self.services.client;
        let session = ctx.session();
        let lb = &member.pool.loadbalancer;

        // Members of one loadbalancer share the edge service and may create
        // its binding, so they are serialized on the loadbalancer.
        let _guard = store.lock_entry::<LoadBalancerBinding>(&lb.id).await;

        let key = MemberKey::new(&lb.id, &member.pool.id, &member.id);
        self.services.ensure_unbound::<MemberBinding>(&key).await?;

        let target = self.resolve_target(member).await?;
        let pool_binding = store
            .get::<PoolBinding>(&PoolKey::new(&lb.id, &member.pool.id))
            .await?;

        let lb_binding = match store.get_opt::<LoadBalancerBinding>(&lb.id).await {
            Some(binding) => {
                check_router(&binding, member, &target)?;
                binding
            }
            None => {
                let service_id = self.ensure_service(ctx, lb, &target).await?;
                let binding = LoadBalancerBinding {
                    loadbalancer_id: lb.id.clone(),
                    lb_service_id: service_id,
                    lb_router_id: target.device_router_id.clone(),
                    vip_address: lb.vip_address,
                };
                store.add(binding.clone()).await?;
                binding
            }
        };

        if let Some(vs_id) = &pool_binding.lb_vs_id {
            client
                .add_virtual_server(session, &lb_binding.lb_service_id, vs_id)
                .await?;
        }

        let lb_pool = client.get_pool(session, &pool_binding.lb_pool_id).await?;
        let mut members: Vec<RemoteMember> = lb_pool
            .members
            .into_iter()
            .filter(|m| !(m.ip_address == target.ip_address && m.port == member.protocol_port))
            .collect();
        members.push(RemoteMember {
            display_name: self.services.display_name(&member.name, "member", &member.id),
            weight: member.weight,
            ip_address: target.ip_address,
            port: member.protocol_port,
            admin_state: (!member.admin_state_up).then(|| "DISABLED".to_string()),
        });
        client
            .update_pool_with_members(session, &pool_binding.lb_pool_id, &members)
            .await?;

        store
            .add(MemberBinding {
                loadbalancer_id: lb.id.clone(),
                pool_id: member.pool.id.clone(),
                member_id: member.id.clone(),
                lb_pool_id: pool_binding.lb_pool_id.clone(),
                ip_address: target.ip_address,
                port: member.protocol_port,
            })
            .await?;

        self.services
            .complete(ctx, CompletedEntity::Member(member.clone()), false)
            .await;
        Ok(())
    }

    pub async fn update(&self, ctx: &OperationContext, _old: &Member, new: &Member) -> Result<()> {
        log::info!("Updating member {}", new.id);

        let store = &self.services.store;
        let client = &self.services.client;
        let session = ctx.session();
        let lb_id = new.loadbalancer_id();
        let _guard = store.lock_entry::<LoadBalancerBinding>(&lb_id.to_string()).await;

        let binding = store
            .get::<MemberBinding>(&MemberKey::new(lb_id, &new.pool.id, &new.id))
            .await?;
        self.check_anchor(new).await?;

        let mut lb_pool = client.get_pool(session, &binding.lb_pool_id).await?;
        match lb_pool
            .members
            .iter_mut()
            .find(|m| m.ip_address == binding.ip_address && m.port == binding.port)
        {
            Some(remote) => {
                remote.display_name = self.services.display_name(&new.name, "member", &new.id);
                remote.weight = new.weight;
                remote.admin_state = Some(
                    if new.admin_state_up { "ENABLED" } else { "DISABLED" }.to_string(),
                );
            }
            None => log::warn!(
                "Member {} ({}:{}) is missing from edge pool {}",
                new.id,
                binding.ip_address,
                binding.port,
                binding.lb_pool_id
            ),
        }
        client
            .update_pool_with_members(session, &binding.lb_pool_id, &lb_pool.members)
            .await?;

        self.services
            .complete(ctx, CompletedEntity::Member(new.clone()), false)
            .await;
        Ok(())
    }

    pub async fn delete(&self, ctx: &OperationContext, member: &Member) -> Result<()> {
        log::info!("Deleting member {}", member.id);

        let store = &self.services.store;
        let client = &self.services.client;
        let session = ctx.session();
        let lb_id = member.loadbalancer_id();
        let _guard = store.lock_entry::<LoadBalancerBinding>(&lb_id.to_string()).await;

        let key = MemberKey::new(lb_id, &member.pool.id, &member.id);
        if let Some(binding) = store.get_opt::<MemberBinding>(&key).await {
            self.check_anchor(member).await?;

            let lb_pool = client.get_pool(session, &binding.lb_pool_id).await?;
            let members: Vec<RemoteMember> = lb_pool
                .members
                .into_iter()
                .filter(|m| !(m.ip_address == binding.ip_address && m.port == binding.port))
                .collect();
            client
                .update_pool_with_members(session, &binding.lb_pool_id, &members)
                .await?;

            store.delete::<MemberBinding>(&key).await?;
        }

        self.services
            .complete(ctx, CompletedEntity::Member(member.clone()), true)
            .await;
        Ok(())
    }

    /// Resolve the address and router of a member. Members on an external
    /// network are reached through their floating IP's fixed address.
    async fn resolve_target(&self, member: &Member) -> Result<MemberTarget> {
        let topology = &self.services.topology;
        let network = topology.network_for_subnet(&member.subnet_id).await?;

        let (ip_address, router_id) = if network.external {
            let target = topology
                .floating_ip_target(member.address)
                .await?
                .ok_or_else(|| {
                    BindError::bad_request(format!(
                        "Member {} address {} on external network {} is not a floating IP",
                        member.id, member.address, network.id
                    ))
                })?;
            (target.fixed_ip, Some(target.router_id))
        } else {
            (member.address, topology.router_for_network(&network.id).await?)
        };

        let router_id = router_id.ok_or_else(|| {
            BindError::bad_request(format!(
                "Member {} subnet {} is not attached to a router",
                member.id, member.subnet_id
            ))
        })?;

        let device_router_id = topology.device_router_id(&router_id).await?.ok_or_else(|| {
            BindError::bad_request(format!("Router {} has no edge counterpart", router_id))
        })?;

        Ok(MemberTarget {
            ip_address,
            router_id,
            device_router_id,
        })
    }

    async fn check_anchor(&self, member: &Member) -> Result<()> {
        let target = self.resolve_target(member).await?;
        if let Some(binding) = self
            .services
            .store
            .get_opt::<LoadBalancerBinding>(&member.loadbalancer_id().to_string())
            .await
        {
            check_router(&binding, member, &target)?;
        }
        Ok(())
    }

    /// Edge service of the member's router, provisioned on first use. The
    /// router needs an external gateway; its gateway subnets get the VIP
    /// advertisement rule.
    async fn ensure_service(
        &self,
        ctx: &OperationContext,
        lb: &LoadBalancer,
        target: &MemberTarget,
    ) -> Result<String> {
        let client = &self.services.client;
        let session = ctx.session();

        if let Some(service) = client
            .get_router_service(session, &target.device_router_id)
            .await?
        {
            log::debug!(
                "Loadbalancer {} joins edge service {} of router {}",
                lb.id,
                service.id,
                target.router_id
            );
            return Ok(service.id);
        }

        let router = self.services.topology.router(&target.router_id).await?;
        if !router.has_gateway {
            return Err(BindError::bad_request(format!(
                "Router {} has no external gateway, cannot host loadbalancer {}",
                router.id, lb.id
            )));
        }

        let config = &self.services.config;
        let spec = ServiceSpec {
            display_name: self.services.display_name(&router.name, "router", &router.id),
            description: format!("Loadbalancer service of router {}", router.id),
            router_id: target.device_router_id.clone(),
            size: config.service_size.clone(),
        };
        let service = client.create_service(session, &spec).await?;
        log::info!(
            "Created edge service {} on router {} for loadbalancer {}",
            service.id,
            router.id,
            lb.id
        );

        if !router.gateway_cidrs.is_empty() {
            let rule = AdvertisementRule {
                networks: router.gateway_cidrs.clone(),
                display_name: config.advertisement_rule_name.clone(),
                rule_filter: RuleFilter {
                    match_route_types: vec!["T1_LB_VIP".to_string()],
                    prefix_operator: "EQ".to_string(),
                },
                action: "ALLOW".to_string(),
            };
            client
                .update_advertisement_rules(
                    session,
                    &target.device_router_id,
                    &[rule],
                    &config.advertisement_rule_name,
                )
                .await?;
        }

        Ok(service.id)
    }
}

fn check_router(binding: &LoadBalancerBinding, member: &Member, target: &MemberTarget) -> Result<()> {
    if binding.lb_router_id != target.device_router_id {
        return Err(BindError::bad_request(format!(
            "Member {} is behind router {} but loadbalancer {} is on router {}",
            member.id, target.device_router_id, binding.loadbalancer_id, binding.lb_router_id
        )));
    }
    Ok(())
}
