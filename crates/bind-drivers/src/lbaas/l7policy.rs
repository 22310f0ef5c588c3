use netbind_core::{CompletedEntity, OperationContext, Result};
use netbind_shared_types::{L7Policy, L7PolicyBinding, ListenerBinding, ListenerKey};

use super::rule_body::{policy_body, position_rule};
use super::LbaasServices;

/// An L7 policy is one edge rule placed in its listener's virtual server
/// rule list at the policy's position.
pub struct L7PolicyManager {
    services: LbaasServices,
}

impl L7PolicyManager {
    pub fn new(services: LbaasServices) -> Self {
        Self { services }
    }

    pub async fn create(&self, ctx: &OperationContext, policy: &L7Policy) -> Result<()> {
        log::info!(
            "Creating L7 policy {} ({}) at position {}",
            policy.id,
            policy.action,
            policy.position
        );

        let store = &self.services.store;
        let client = &self.services.client;
        let session = ctx.session();
        let _guard = store.lock_entry::<L7PolicyBinding>(&policy.id).await;
        self.services
            .ensure_unbound::<L7PolicyBinding>(&policy.id)
            .await?;

        let listener_key = ListenerKey::new(policy.loadbalancer_id(), &policy.listener.id);
        let listener_binding = store.get::<ListenerBinding>(&listener_key).await?;
        let body = policy_body(store, policy, &policy.rules).await?;

        let display_name = self
            .services
            .display_name(&policy.name, "policy", &policy.id);
        let rule_id = client.create_rule(session, &display_name, &body).await?;

        let vs_id = listener_binding.lb_vs_id;
        let placed = async {
            let vs = client.get_virtual_server(session, &vs_id).await?;
            let rule_ids = position_rule(&vs.rule_ids, &rule_id, policy.position);
            client.set_virtual_server_rules(session, &vs_id, &rule_ids).await
        };
        if let Err(e) = placed.await {
            log::error!("Failed to place rule {} on virtual server {}: {}", rule_id, vs_id, e);
            if let Err(err) = client.delete_rule(session, &rule_id).await {
                log::warn!("Rollback: failed to delete edge rule {}: {}", rule_id, err);
            }
            return Err(e.into());
        }

        store
            .add(L7PolicyBinding {
                l7policy_id: policy.id.clone(),
                lb_rule_id: rule_id,
                lb_vs_id: vs_id,
            })
            .await?;

        self.services
            .complete(ctx, CompletedEntity::L7Policy(policy.clone()), false)
            .await;
        Ok(())
    }

    /// Rewrite the rule body and move the rule to the new position; the
    /// other rules of the virtual server keep their order.
    pub async fn update(
        &self,
        ctx: &OperationContext,
        _old: &L7Policy,
        new: &L7Policy,
    ) -> Result<()> {
        log::info!("Updating L7 policy {}", new.id);

        let store = &self.services.store;
        let client = &self.services.client;
        let session = ctx.session();
        let _guard = store.lock_entry::<L7PolicyBinding>(&new.id).await;
        let binding = store.get::<L7PolicyBinding>(&new.id).await?;

        let body = policy_body(store, new, &new.rules).await?;
        client
            .update_rule(session, &binding.lb_rule_id, &body)
            .await?;

        let vs = client.get_virtual_server(session, &binding.lb_vs_id).await?;
        let rule_ids = position_rule(&vs.rule_ids, &binding.lb_rule_id, new.position);
        client
            .set_virtual_server_rules(session, &binding.lb_vs_id, &rule_ids)
            .await?;

        self.services
            .complete(ctx, CompletedEntity::L7Policy(new.clone()), false)
            .await;
        Ok(())
    }

    pub async fn delete(&self, ctx: &OperationContext, policy: &L7Policy) -> Result<()> {
        log::info!("Deleting L7 policy {}", policy.id);

        let store = &self.services.store;
        let client = &self.services.client;
        let _guard = store.lock_entry::<L7PolicyBinding>(&policy.id).await;

        if let Some(binding) = store.get_opt::<L7PolicyBinding>(&policy.id).await {
            client
                .remove_rule(ctx.session(), &binding.lb_vs_id, &binding.lb_rule_id)
                .await?;
            client
                .delete_rule(ctx.session(), &binding.lb_rule_id)
                .await?;
            store.delete::<L7PolicyBinding>(&policy.id).await?;
        }

        self.services
            .complete(ctx, CompletedEntity::L7Policy(policy.clone()), true)
            .await;
        Ok(())
    }
}
