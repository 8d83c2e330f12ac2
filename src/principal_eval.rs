//! Principal-policy evaluation: rules scoped to one specific principal,
//! which take precedence over resource policies when they produce a
//! decision.

use crate::catalog::CatalogSnapshot;
use crate::expr::{EvalContext, Engine};
use crate::policy::{action_matches_any, matches_glob};
use crate::scope::Scope;
use crate::types::{PolicyId, Resource};
use tracing::warn;

/// The outcome of evaluating one action against a policy layer.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Decided {
        allow: bool,
        policy: PolicyId,
        reason: String,
    },
    NoDecision,
}

/// Evaluates every principal-policy rule that matches `action`, combining
/// results with deny-override: if any matching rule denies, the outcome is
/// deny regardless of allow rules also matching.
pub fn evaluate(
    snapshot: &CatalogSnapshot,
    principal_id: &str,
    scope: &Scope,
    resource: &Resource,
    action: &str,
    ctx: &EvalContext,
    engine: &Engine,
) -> ActionOutcome {
    let policies = snapshot.principal_policies_for(principal_id, scope);

    let mut allow_match: Option<(PolicyId, String)> = None;
    let mut deny_match: Option<(PolicyId, String)> = None;

    for policy in policies {
        for rule in &policy.rules {
            if !matches_glob(&rule.resource, &resource.kind) {
                continue;
            }
            if !action_matches_any(&rule.actions, action) {
                continue;
            }
            if let Some(condition) = &rule.condition {
                match engine.evaluate_boolean(condition, ctx) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => {
                        warn!(policy = %policy.name, error = %err, "principal rule condition failed to evaluate; rule skipped");
                        continue;
                    }
                }
            }

            let reason = format!("principal policy '{}' rule matched action '{action}'", policy.name);
            if rule.effect.is_allow() {
                allow_match.get_or_insert((policy.name.clone(), reason));
            } else {
                deny_match.get_or_insert((policy.name.clone(), reason));
            }
        }
    }

    if let Some((policy, reason)) = deny_match {
        return ActionOutcome::Decided { allow: false, policy, reason };
    }
    if let Some((policy, reason)) = allow_match {
        return ActionOutcome::Decided { allow: true, policy, reason };
    }
    ActionOutcome::NoDecision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PolicyCatalog;
    use crate::policy::parse_document;
    use crate::types::Resource;

    fn catalog_with(yaml: &str) -> PolicyCatalog {
        let catalog = PolicyCatalog::new();
        let doc = parse_document(yaml).unwrap();
        catalog.replace_all(&[doc], &Engine::new()).unwrap();
        catalog
    }

    #[test]
    fn allow_rule_grants_matching_action() {
        let yaml = r#"
apiVersion: authz/v1
kind: PrincipalPolicy
metadata:
  name: alice-overrides
spec:
  principal: "user:alice"
  rules:
    - resource: "document"
      actions: ["view"]
      effect: allow
"#;
        let catalog = catalog_with(yaml);
        let snapshot = catalog.current();
        let outcome = evaluate(
            &snapshot,
            "user:alice",
            &Scope::root(),
            &Resource::new("document", "1"),
            "view",
            &EvalContext::new(),
            &Engine::new(),
        );
        assert_eq!(
            outcome,
            ActionOutcome::Decided {
                allow: true,
                policy: "alice-overrides".to_string(),
                reason: "principal policy 'alice-overrides' rule matched action 'view'".to_string(),
            }
        );
    }

    #[test]
    fn deny_rule_overrides_allow_rule_in_another_policy() {
        let allow_yaml = r#"
apiVersion: authz/v1
kind: PrincipalPolicy
metadata:
  name: allow-policy
spec:
  principal: "user:bob"
  rules:
    - resource: "document"
      actions: ["view"]
      effect: allow
"#;
        let deny_yaml = r#"
apiVersion: authz/v1
kind: PrincipalPolicy
metadata:
  name: deny-policy
spec:
  principal: "user:bob"
  rules:
    - resource: "document"
      actions: ["view"]
      effect: deny
"#;
        let catalog = PolicyCatalog::new();
        let engine = Engine::new();
        let docs = vec![parse_document(allow_yaml).unwrap(), parse_document(deny_yaml).unwrap()];
        catalog.replace_all(&docs, &engine).unwrap();

        let snapshot = catalog.current();
        let outcome = evaluate(
            &snapshot,
            "user:bob",
            &Scope::root(),
            &Resource::new("document", "1"),
            "view",
            &EvalContext::new(),
            &engine,
        );
        assert!(matches!(outcome, ActionOutcome::Decided { allow: false, .. }));
    }

    #[test]
    fn no_matching_rule_yields_no_decision() {
        let yaml = r#"
apiVersion: authz/v1
kind: PrincipalPolicy
metadata:
  name: alice-overrides
spec:
  principal: "user:alice"
  rules:
    - resource: "document"
      actions: ["view"]
      effect: allow
"#;
        let catalog = catalog_with(yaml);
        let snapshot = catalog.current();
        let outcome = evaluate(
            &snapshot,
            "user:alice",
            &Scope::root(),
            &Resource::new("document", "1"),
            "delete",
            &EvalContext::new(),
            &Engine::new(),
        );
        assert_eq!(outcome, ActionOutcome::NoDecision);
    }
}
