//! Resource-policy evaluation: rules attached to a resource kind, gated by
//! action, role membership, and an optional condition.

use crate::catalog::CatalogSnapshot;
use crate::expr::{EvalContext, Engine};
use crate::policy::{action_matches_any, matches_glob};
use crate::principal_eval::ActionOutcome;
use crate::scope::Scope;
use crate::types::PolicyId;
use tracing::warn;

/// Evaluates every resource-policy rule that matches `action` and the
/// principal's resolved roles, combining results with deny-override.
pub fn evaluate(
    snapshot: &CatalogSnapshot,
    resource_kind: &str,
    scope: &Scope,
    resolved_roles: &[String],
    action: &str,
    ctx: &EvalContext,
    engine: &Engine,
) -> ActionOutcome {
    let policies = snapshot.resource_policies_for(resource_kind, scope);

    let mut allow_match: Option<(PolicyId, String)> = None;
    let mut deny_match: Option<(PolicyId, String)> = None;

    for policy in policies {
        for rule in &policy.rules {
            if !action_matches_any(&rule.actions, action) {
                continue;
            }
            let role_gate_present = !rule.roles.is_empty() || !rule.derived_roles.is_empty();
            if role_gate_present
                && !role_matches_any(&rule.roles, resolved_roles)
                && !role_matches_any(&rule.derived_roles, resolved_roles)
            {
                continue;
            }
            if let Some(condition) = &rule.condition {
                match engine.evaluate_boolean(condition, ctx) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(err) => {
                        warn!(policy = %policy.name, error = %err, "resource rule condition failed to evaluate; rule skipped");
                        continue;
                    }
                }
            }

            let reason = format!("resource policy '{}' rule matched action '{action}'", policy.name);
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

fn role_matches_any(patterns: &[String], resolved_roles: &[String]) -> bool {
    patterns
        .iter()
        .any(|pattern| resolved_roles.iter().any(|role| matches_glob(pattern, role)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PolicyCatalog;
    use crate::policy::parse_document;

    fn catalog_with(yaml: &str) -> PolicyCatalog {
        let catalog = PolicyCatalog::new();
        let doc = parse_document(yaml).unwrap();
        catalog.replace_all(&[doc], &Engine::new()).unwrap();
        catalog
    }

    #[test]
    fn role_gated_rule_requires_matching_role() {
        let yaml = r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: doc-policy
spec:
  resource: document
  rules:
    - actions: ["delete"]
      effect: allow
      roles: ["owner"]
"#;
        let catalog = catalog_with(yaml);
        let snapshot = catalog.current();
        let engine = Engine::new();

        let without_role = evaluate(
            &snapshot,
            "document",
            &Scope::root(),
            &[],
            "delete",
            &EvalContext::new(),
            &engine,
        );
        assert_eq!(without_role, ActionOutcome::NoDecision);

        let with_role = evaluate(
            &snapshot,
            "document",
            &Scope::root(),
            &["owner".to_string()],
            "delete",
            &EvalContext::new(),
            &engine,
        );
        assert!(matches!(with_role, ActionOutcome::Decided { allow: true, .. }));
    }

    #[test]
    fn condition_gates_rule_activation() {
        let yaml = r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: owner-only
spec:
  resource: document
  rules:
    - actions: ["edit"]
      effect: allow
      condition: "R.attributes.ownerId == P.id"
"#;
        let catalog = catalog_with(yaml);
        let snapshot = catalog.current();
        let engine = Engine::new();

        let principal = crate::types::Principal::new("user:alice");
        let resource = crate::types::Resource::new("document", "1").with_attribute("ownerId", "user:alice");
        let ctx = EvalContext::new().with_principal(&principal).with_resource(&resource);

        let outcome = evaluate(&snapshot, "document", &Scope::root(), &[], "edit", &ctx, &engine);
        assert!(matches!(outcome, ActionOutcome::Decided { allow: true, .. }));

        let other_resource = crate::types::Resource::new("document", "1").with_attribute("ownerId", "user:bob");
        let other_ctx = EvalContext::new().with_principal(&principal).with_resource(&other_resource);
        let denied = evaluate(&snapshot, "document", &Scope::root(), &[], "edit", &other_ctx, &engine);
        assert_eq!(denied, ActionOutcome::NoDecision);
    }

    #[test]
    fn deny_rule_overrides_allow_rule_for_same_action() {
        let yaml = r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: mixed-policy
spec:
  resource: document
  rules:
    - actions: ["view"]
      effect: allow
    - actions: ["view"]
      effect: deny
      roles: ["suspended"]
"#;
        let catalog = catalog_with(yaml);
        let snapshot = catalog.current();
        let engine = Engine::new();

        let outcome = evaluate(
            &snapshot,
            "document",
            &Scope::root(),
            &["suspended".to_string()],
            "view",
            &EvalContext::new(),
            &engine,
        );
        assert!(matches!(outcome, ActionOutcome::Decided { allow: false, .. }));
    }
}
