use netbind_core::{BindError, CompletedEntity, OperationContext, Result};
use netbind_shared_types::{L7Policy, L7PolicyBinding, L7Rule};

use super::rule_body::policy_body;
use super::LbaasServices;

/// L7 rules have no remote object of their own. Every change rewrites the
/// body of the owning policy's edge rule from the policy's rule set.
pub struct L7RuleManager {
    services: LbaasServices,
}

impl L7RuleManager {
    pub fn new(services: LbaasServices) -> Self {
        Self { services }
    }

    pub async fn create(&self, ctx: &OperationContext, rule: &L7Rule) -> Result<()> {
        log::info!("Creating L7 rule {} ({} {})", rule.id, rule.rule_type, rule.compare_type);
        self.rewrite(ctx, rule, false).await
    }

    pub async fn update(&self, ctx: &OperationContext, _old: &L7Rule, new: &L7Rule) -> Result<()> {
        log::info!("Updating L7 rule {}", new.id);
        self.rewrite(ctx, new, false).await
    }

    pub async fn delete(&self, ctx: &OperationContext, rule: &L7Rule) -> Result<()> {
        log::info!("Deleting L7 rule {}", rule.id);
        self.rewrite(ctx, rule, true).await
    }

    async fn rewrite(&self, ctx: &OperationContext, rule: &L7Rule, delete: bool) -> Result<()> {
        let policy = rule.policy.as_deref().ok_or_else(|| {
            BindError::bad_request(format!("L7 rule {} carries no policy", rule.id))
        })?;

        let store = &self.services.store;
        let _guard = store.lock_entry::<L7PolicyBinding>(&policy.id).await;
        let binding = store.get::<L7PolicyBinding>(&policy.id).await?;

        let rules = rule_set(policy, rule, delete);
        let body = policy_body(store, policy, &rules).await?;
        self.services
            .client
            .update_rule(ctx.session(), &binding.lb_rule_id, &body)
            .await?;

        self.services
            .complete(ctx, CompletedEntity::L7Rule(rule.clone()), delete)
            .await;
        Ok(())
    }
}

/// Rules of `policy` with `rule` applied: replaced in place or appended, or
/// dropped when deleting.
fn rule_set(policy: &L7Policy, rule: &L7Rule, delete: bool) -> Vec<L7Rule> {
    let mut rules: Vec<L7Rule> = policy
        .rules
        .iter()
        .filter(|r| !delete || r.id != rule.id)
        .cloned()
        .collect();

    if !delete {
        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule.detached(),
            None => rules.push(rule.detached()),
        }
    }
    rules
}
