//! L7 policy/rule translation into edge rule bodies.

use netbind_core::remote::{LbRuleBody, MatchCondition, MatchType, RuleAction};
use netbind_core::{BindError, BindingStore, Result};
use netbind_shared_types::{
    L7CompareType, L7Policy, L7PolicyAction, L7Rule, L7RuleType, PoolBinding, PoolKey,
};

const PHASE: &str = "HTTP_FORWARDING";
const MATCH_STRATEGY: &str = "ALL";
const REDIRECT_STATUS: &str = "302";
const REJECT_STATUS: &str = "403";

/// Body of the edge rule standing for `policy` when it holds `rules`.
pub(crate) async fn policy_body(
    store: &BindingStore,
    policy: &L7Policy,
    rules: &[L7Rule],
) -> Result<LbRuleBody> {
    let match_conditions = rules
        .iter()
        .map(match_condition)
        .collect::<Result<Vec<_>>>()?;

    Ok(LbRuleBody {
        match_conditions,
        actions: vec![policy_action(store, policy).await?],
        phase: PHASE.to_string(),
        match_strategy: MATCH_STRATEGY.to_string(),
    })
}

async fn policy_action(store: &BindingStore, policy: &L7Policy) -> Result<RuleAction> {
    match policy.action {
        L7PolicyAction::RedirectToPool => {
            let pool_id = policy.redirect_pool_id.as_deref().ok_or_else(|| {
                BindError::invalid_input("redirect_pool_id", "required for REDIRECT_TO_POOL")
            })?;
            let key = PoolKey::new(policy.loadbalancer_id(), pool_id);
            let binding = store.get::<PoolBinding>(&key).await?;
            Ok(RuleAction::LbSelectPoolAction {
                pool_id: binding.lb_pool_id,
            })
        }
        L7PolicyAction::RedirectToUrl => {
            let url = policy.redirect_url.clone().ok_or_else(|| {
                BindError::invalid_input("redirect_url", "required for REDIRECT_TO_URL")
            })?;
            Ok(RuleAction::LbHttpRedirectAction {
                redirect_status: REDIRECT_STATUS.to_string(),
                redirect_url: url,
            })
        }
        L7PolicyAction::Reject => Ok(RuleAction::LbHttpRejectAction {
            reply_status: REJECT_STATUS.to_string(),
        }),
    }
}

fn match_type(compare: L7CompareType) -> MatchType {
    match compare {
        L7CompareType::EqualTo => MatchType::Equals,
        L7CompareType::StartsWith => MatchType::StartsWith,
        L7CompareType::EndsWith => MatchType::EndsWith,
        L7CompareType::Contains => MatchType::Contains,
        L7CompareType::Regex => MatchType::Regex,
    }
}

fn required_key(rule: &L7Rule) -> Result<&str> {
    rule.key.as_deref().ok_or_else(|| {
        BindError::invalid_input("key", format!("required for {} rule {}", rule.rule_type, rule.id))
    })
}

fn match_condition(rule: &L7Rule) -> Result<MatchCondition> {
    // The device conditions carry no negation; `invert` is not sent.
    let match_type = match_type(rule.compare_type);

    let header = |name: &str, value: String| MatchCondition::LbHttpRequestHeaderCondition {
        match_type,
        header_name: name.to_string(),
        header_value: value,
    };

    let condition = match rule.rule_type {
        L7RuleType::HostName => header("Host", rule.value.clone()),
        L7RuleType::Header => header(required_key(rule)?, rule.value.clone()),
        L7RuleType::Cookie => header(
            "Cookie",
            format!("{}={}", required_key(rule)?, rule.value),
        ),
        L7RuleType::Path => MatchCondition::LbHttpRequestUriCondition {
            match_type,
            uri: rule.value.clone(),
        },
        L7RuleType::FileType => MatchCondition::LbHttpRequestUriCondition {
            match_type,
            uri: format!("*.{}", rule.value),
        },
    };
    Ok(condition)
}

/// Move `rule_id` to the 1-based `position` of a virtual server's rule list.
/// The other rules keep their relative order; positions past the end append.
pub fn position_rule(rule_ids: &[String], rule_id: &str, position: u32) -> Vec<String> {
    let mut ordered: Vec<String> = rule_ids
        .iter()
        .filter(|id| id.as_str() != rule_id)
        .cloned()
        .collect();

    let index = (position.max(1) as usize - 1).min(ordered.len());
    ordered.insert(index, rule_id.to_string());
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_position_rule_moves_without_resorting() {
        let rules = ids(&["lb-rule-xx", "abc", "xyz"]);
        assert_eq!(
            position_rule(&rules, "lb-rule-xx", 2),
            ids(&["abc", "lb-rule-xx", "xyz"])
        );
        assert_eq!(
            position_rule(&rules, "lb-rule-xx", 1),
            ids(&["lb-rule-xx", "abc", "xyz"])
        );
    }

    #[test]
    fn test_position_rule_clamps() {
        let rules = ids(&["abc", "xyz"]);
        assert_eq!(position_rule(&rules, "new", 0), ids(&["new", "abc", "xyz"]));
        assert_eq!(position_rule(&rules, "new", 99), ids(&["abc", "xyz", "new"]));
        assert_eq!(position_rule(&[], "new", 3), ids(&["new"]));
    }

    fn rule(rule_type: L7RuleType, compare_type: L7CompareType, key: Option<&str>, value: &str) -> L7Rule {
        L7Rule {
            id: "l7rule-111".to_string(),
            tenant_id: "t".to_string(),
            l7policy_id: "l7policy-xxx".to_string(),
            rule_type,
            compare_type,
            invert: false,
            key: key.map(str::to_string),
            value: value.to_string(),
            admin_state_up: true,
            policy: None,
        }
    }

    #[test]
    fn test_conditions_per_rule_type() {
        let host = match_condition(&rule(L7RuleType::HostName, L7CompareType::EndsWith, None, "example.org")).unwrap();
        assert_eq!(
            host,
            MatchCondition::LbHttpRequestHeaderCondition {
                match_type: MatchType::EndsWith,
                header_name: "Host".to_string(),
                header_value: "example.org".to_string(),
            }
        );

        let file = match_condition(&rule(L7RuleType::FileType, L7CompareType::EqualTo, None, "png")).unwrap();
        assert_eq!(
            file,
            MatchCondition::LbHttpRequestUriCondition {
                match_type: MatchType::Equals,
                uri: "*.png".to_string(),
            }
        );

        let mut path = rule(L7RuleType::Path, L7CompareType::Regex, None, "^/api");
        path.invert = true;
        assert_eq!(
            match_condition(&path).unwrap(),
            MatchCondition::LbHttpRequestUriCondition {
                match_type: MatchType::Regex,
                uri: "^/api".to_string(),
            }
        );
    }

    #[test]
    fn test_header_rule_needs_key() {
        let err = match_condition(&rule(L7RuleType::Header, L7CompareType::EqualTo, None, "v")).unwrap_err();
        assert_eq!(err.kind(), netbind_core::ErrorKind::InvalidInput);
    }
}
