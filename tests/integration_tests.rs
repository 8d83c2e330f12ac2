//! End-to-end seed scenarios and quantified-invariant checks against the
//! full `DecisionEngine::check` pipeline.

use authz_core::catalog::PolicyCatalog;
use authz_core::engine::{DecisionEngine, EngineConfig};
use authz_core::expr::Engine as ExprEngine;
use authz_core::policy::parse_document;
use authz_core::types::{Attributes, CheckRequest, Principal, Resource};
use std::sync::Arc;

fn engine_from(yaml_docs: &[&str]) -> DecisionEngine {
    let catalog = Arc::new(PolicyCatalog::new());
    let expr_engine = ExprEngine::new();
    let docs: Vec<_> = yaml_docs.iter().map(|y| parse_document(y).unwrap()).collect();
    catalog.replace_all(&docs, &expr_engine).unwrap();
    DecisionEngine::new(EngineConfig::default(), catalog)
}

fn request(principal: Principal, resource: Resource, actions: &[&str]) -> CheckRequest {
    CheckRequest {
        request_id: "req".to_string(),
        principal,
        resource,
        actions: actions.iter().map(|a| a.to_string()).collect(),
        aux_data: Attributes::new(),
    }
}

const OWNER_RESOURCE_POLICY: &str = r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: document-owner-policy
spec:
  resource: document
  rules:
    - actions: ["delete"]
      effect: allow
      derivedRoles: ["owner"]
"#;

fn owner_docs() -> [&'static str; 2] {
    [
        r#"
apiVersion: authz/v1
kind: DerivedRoles
metadata:
  name: owner-roles
spec:
  definitions:
    - name: owner
      parentRoles: ["user"]
      condition: "R.attributes.ownerId == P.id"
"#,
        OWNER_RESOURCE_POLICY,
    ]
}

#[tokio::test]
async fn scenario_owner_can_delete_own_document() {
    let engine = engine_from(&owner_docs());

    let req = request(
        Principal::new("u1").with_role("user"),
        Resource::new("document", "d1").with_attribute("ownerId", "u1"),
        &["delete"],
    );

    let response = engine.check(&req).await.unwrap();
    assert!(response.results["delete"].effect.is_allow());
}

#[tokio::test]
async fn scenario_non_owner_is_denied() {
    let engine = engine_from(&owner_docs());

    let req = request(
        Principal::new("u1").with_role("user"),
        Resource::new("document", "d1").with_attribute("ownerId", "u2"),
        &["delete"],
    );

    let response = engine.check(&req).await.unwrap();
    assert!(!response.results["delete"].effect.is_allow());
}

#[tokio::test]
async fn scenario_principal_policy_overrides_resource_allow() {
    let resource_allow = r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: doc-view
spec:
  resource: document
  rules:
    - actions: ["view"]
      effect: allow
"#;
    let principal_deny = r#"
apiVersion: authz/v1
kind: PrincipalPolicy
metadata:
  name: u1-restrictions
spec:
  principal: "u1"
  rules:
    - resource: document
      actions: ["view"]
      effect: deny
"#;

    let engine = engine_from(&[resource_allow, principal_deny]);
    let req = request(Principal::new("u1"), Resource::new("document", "d1"), &["view"]);

    let response = engine.check(&req).await.unwrap();
    assert!(!response.results["view"].effect.is_allow());
}

#[tokio::test]
async fn scenario_wildcard_prefix_role_matches_by_prefix_not_unrelated_name() {
    let roles_doc = r#"
apiVersion: authz/v1
kind: DerivedRoles
metadata:
  name: admin-roles
spec:
  definitions:
    - name: any_admin
      parentRoles: ["admin:*"]
"#;
    let resource_doc = r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: manage-policy
spec:
  resource: document
  rules:
    - actions: ["manage"]
      effect: allow
      derivedRoles: ["any_admin"]
"#;
    let engine = engine_from(&[roles_doc, resource_doc]);

    let admin_read = request(
        Principal::new("u1").with_role("admin:read"),
        Resource::new("document", "d1"),
        &["manage"],
    );
    let allowed = engine.check(&admin_read).await.unwrap();
    assert!(allowed.results["manage"].effect.is_allow());

    let administrator = request(
        Principal::new("u2").with_role("administrator"),
        Resource::new("document", "d1"),
        &["manage"],
    );
    let denied = engine.check(&administrator).await.unwrap();
    assert!(!denied.results["manage"].effect.is_allow());
}

#[tokio::test]
async fn scenario_cycle_is_rejected_at_load_and_prior_catalog_is_unchanged() {
    let catalog = Arc::new(PolicyCatalog::new());
    let expr_engine = ExprEngine::new();

    let good = vec![parse_document(&owner_docs()[1]).unwrap()];
    catalog.replace_all(&good, &expr_engine).unwrap();
    let version_before = catalog.current().version();

    let cyclic = r#"
apiVersion: authz/v1
kind: DerivedRoles
metadata:
  name: cyclic-roles
spec:
  definitions:
    - name: a
      parentRoles: ["b"]
    - name: b
      parentRoles: ["a"]
"#;
    let bad = vec![parse_document(cyclic).unwrap()];
    let result = catalog.replace_all(&bad, &expr_engine);

    assert!(result.is_err());
    assert_eq!(catalog.current().version(), version_before);
}

#[tokio::test]
async fn scenario_concurrent_identical_requests_coalesce_to_one_evaluation() {
    let engine = Arc::new(engine_from(&[OWNER_RESOURCE_POLICY]));
    let req = request(Principal::new("u1"), Resource::new("document", "d1"), &["view"]);

    let mut handles = Vec::new();
    for _ in 0..100 {
        let engine = Arc::clone(&engine);
        let req = req.clone();
        handles.push(tokio::spawn(async move { engine.check(&req).await.unwrap() }));
    }

    let mut responses = Vec::new();
    for handle in handles {
        responses.push(handle.await.unwrap());
    }

    let first = &responses[0];
    for response in &responses[1..] {
        assert_eq!(response.results["view"].effect, first.results["view"].effect);
    }
}

#[tokio::test]
async fn invariant_implicit_deny_when_no_rule_matches() {
    let engine = engine_from(&[OWNER_RESOURCE_POLICY]);
    let req = request(Principal::new("u1"), Resource::new("document", "d1"), &["publish"]);

    let response = engine.check(&req).await.unwrap();
    assert!(!response.results["publish"].effect.is_allow());
}

#[tokio::test]
async fn invariant_deny_overrides_allow_across_matching_rules() {
    let mixed = r#"
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
      roles: ["banned"]
"#;
    let engine = engine_from(&[mixed]);
    let req = request(
        Principal::new("u1").with_role("banned"),
        Resource::new("document", "d1"),
        &["view"],
    );

    let response = engine.check(&req).await.unwrap();
    assert!(!response.results["view"].effect.is_allow());
}

#[tokio::test]
async fn invariant_wildcard_action_matches_every_action() {
    let wildcard = r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: catch-all
spec:
  resource: document
  rules:
    - actions: ["*"]
      effect: allow
"#;
    let engine = engine_from(&[wildcard]);
    let req = request(Principal::new("u1"), Resource::new("document", "d1"), &["view", "edit", "delete"]);

    let response = engine.check(&req).await.unwrap();
    for action in ["view", "edit", "delete"] {
        assert!(response.results[action].effect.is_allow());
    }
}

#[tokio::test]
async fn boundary_empty_actions_list_yields_empty_results() {
    let engine = engine_from(&[OWNER_RESOURCE_POLICY]);
    let req = request(Principal::new("u1"), Resource::new("document", "d1"), &[]);

    let response = engine.check(&req).await.unwrap();
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn boundary_rule_requiring_roles_does_not_match_roleless_principal() {
    let role_gated = r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: role-gated
spec:
  resource: document
  rules:
    - actions: ["archive"]
      effect: allow
      roles: ["curator"]
"#;
    let engine = engine_from(&[role_gated]);
    let req = request(Principal::new("u1"), Resource::new("document", "d1"), &["archive"]);

    let response = engine.check(&req).await.unwrap();
    assert!(!response.results["archive"].effect.is_allow());
}

#[tokio::test]
async fn scope_monotonicity_parent_scope_policy_applies_to_descendant_scope_request() {
    let scoped = r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: corp-wide-policy
  scope: acme.corp
spec:
  resource: document
  rules:
    - actions: ["view"]
      effect: allow
"#;
    let engine = engine_from(&[scoped]);

    let mut resource = Resource::new("document", "d1");
    resource.scope = "acme.corp.eng".to_string();
    let req = request(Principal::new("u1"), resource, &["view"]);

    let response = engine.check(&req).await.unwrap();
    assert!(response.results["view"].effect.is_allow());
}
