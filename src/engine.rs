//! Decision engine: orchestrates cache lookup, role resolution, and policy
//! evaluation into a single multi-action `check` call.
//!
//! Each requested action is evaluated independently against the same
//! resolved role set (cache → roles → scope → policies → decision),
//! isolating one action's evaluation error from the rest of the request.

use crate::cache::{CacheConfig, DecisionCache};
use crate::catalog::PolicyCatalog;
use crate::error::Result;
use crate::expr::{EvalContext, Engine as ExprEngine};
use crate::metrics::MetricsCollector;
use crate::principal_eval::{self, ActionOutcome};
use crate::resource_eval;
use crate::scope::Scope;
use crate::types::{CheckRequest, CheckResponse, Decision};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub enable_cache: bool,
    pub cache_config: CacheConfig,
    pub enable_metrics: bool,
    /// Budget for evaluating a single action. An action that exceeds it is
    /// denied rather than left unresolved — a request is never allowed to
    /// hang waiting on one slow condition.
    pub action_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_config: CacheConfig::default(),
            enable_metrics: true,
            action_timeout: Duration::from_millis(50),
        }
    }
}

pub struct DecisionEngine {
    catalog: Arc<PolicyCatalog>,
    expr_engine: Arc<ExprEngine>,
    cache: Option<Arc<DecisionCache>>,
    metrics: Option<Arc<MetricsCollector>>,
    config: EngineConfig,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig, catalog: Arc<PolicyCatalog>) -> Self {
        let cache = if config.enable_cache {
            Some(Arc::new(DecisionCache::new(config.cache_config.clone())))
        } else {
            None
        };
        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        Self {
            catalog,
            expr_engine: Arc::new(ExprEngine::new()),
            cache,
            metrics,
            config,
        }
    }

    pub fn metrics(&self) -> Option<Arc<MetricsCollector>> {
        self.metrics.clone()
    }

    pub fn invalidate_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Evaluates every action in `request` and returns one decision per
    /// action. A per-action evaluation failure (condition error, timeout)
    /// resolves to a deny with an explanatory reason rather than failing the
    /// whole request — only a structurally invalid request (unparseable
    /// scope) returns `Err`.
    pub async fn check(&self, request: &CheckRequest) -> Result<CheckResponse> {
        let start = Instant::now();

        Scope::parse(&request.principal.scope)?;
        Scope::parse(&request.resource.scope)?;

        if let Some(cache) = &self.cache {
            let fingerprint = DecisionCache::fingerprint(request);
            let was_cached = cache.get(&fingerprint).is_some();

            let response = cache.get_or_build(request, || self.evaluate(request)).await;

            if let Some(m) = &self.metrics {
                if was_cached {
                    m.record_cache_hit().await;
                } else {
                    m.record_cache_miss().await;
                }
                m.record_latency(start.elapsed()).await;
            }
            return Ok(response);
        }

        let response = self.evaluate(request).await;
        if let Some(m) = &self.metrics {
            m.record_latency(start.elapsed()).await;
        }
        Ok(response)
    }

    async fn evaluate(&self, request: &CheckRequest) -> CheckResponse {
        let snapshot = self.catalog.current();
        let resource_scope = Scope::parse(&request.resource.scope).unwrap_or_else(|_| Scope::root());

        let role_ctx = EvalContext::new().with_principal(&request.principal);
        let resolved_roles = snapshot.role_resolver().resolve_roles(
            &request.principal.roles,
            &role_ctx,
            &self.expr_engine,
        );

        let mut results = HashMap::with_capacity(request.actions.len());

        for action in &request.actions {
            let ctx = EvalContext::new()
                .with_principal(&request.principal)
                .with_resource(&request.resource)
                .with_request(action, request.aux_data.clone())
                .with_aux_data(request.aux_data.clone());

            let decision = match tokio::time::timeout(
                self.config.action_timeout,
                self.decide_action(&snapshot, request, &resolved_roles, &resource_scope, action, &ctx),
            )
            .await
            {
                Ok(decision) => decision,
                Err(_) => {
                    warn!(action = %action, "action evaluation exceeded its deadline; denying");
                    Decision::deny(action.clone(), None, "evaluation exceeded its deadline", resolved_roles.clone())
                }
            };

            if let Some(m) = &self.metrics {
                m.record_decision(decision.effect.is_allow()).await;
            }

            results.insert(action.clone(), decision);
        }

        CheckResponse {
            request_id: request.request_id.clone(),
            results,
        }
    }

    async fn decide_action(
        &self,
        snapshot: &crate::catalog::CatalogSnapshot,
        request: &CheckRequest,
        resolved_roles: &[String],
        resource_scope: &Scope,
        action: &str,
        ctx: &EvalContext,
    ) -> Decision {
        let principal_outcome = principal_eval::evaluate(
            snapshot,
            &request.principal.id,
            resource_scope,
            &request.resource,
            action,
            ctx,
            &self.expr_engine,
        );

        if let ActionOutcome::Decided { allow, policy, reason } = principal_outcome {
            debug!(action, policy = %policy, allow, "principal policy decided");
            return to_decision(action, allow, Some(policy), reason, resolved_roles);
        }

        let resource_outcome = resource_eval::evaluate(
            snapshot,
            &request.resource.kind,
            resource_scope,
            resolved_roles,
            action,
            ctx,
            &self.expr_engine,
        );

        if let ActionOutcome::Decided { allow, policy, reason } = resource_outcome {
            debug!(action, policy = %policy, allow, "resource policy decided");
            return to_decision(action, allow, Some(policy), reason, resolved_roles);
        }

        Decision::deny(action, None, "no policy matched; implicit deny", resolved_roles.to_vec())
    }
}

fn to_decision(
    action: &str,
    allow: bool,
    policy: Option<String>,
    reason: String,
    resolved_roles: &[String],
) -> Decision {
    if allow {
        Decision::allow(action, policy, reason, resolved_roles.to_vec())
    } else {
        Decision::deny(action, policy, reason, resolved_roles.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::parse_document;
    use crate::types::{Principal, Resource};

    fn engine_with(yaml: &str) -> DecisionEngine {
        let catalog = Arc::new(PolicyCatalog::new());
        let expr_engine = ExprEngine::new();
        let doc = parse_document(yaml).unwrap();
        catalog.replace_all(&[doc], &expr_engine).unwrap();
        DecisionEngine::new(EngineConfig::default(), catalog)
    }

    #[tokio::test]
    async fn owner_can_delete_own_document() {
        let engine = engine_with(
            r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: doc-policy
spec:
  resource: document
  rules:
    - actions: ["delete"]
      effect: allow
      condition: "R.attributes.ownerId == P.id"
"#,
        );

        let request = CheckRequest {
            request_id: "req-1".to_string(),
            principal: Principal::new("user:alice"),
            resource: Resource::new("document", "1").with_attribute("ownerId", "user:alice"),
            actions: vec!["delete".to_string()],
            aux_data: Default::default(),
        };

        let response = engine.check(&request).await.unwrap();
        assert!(response.results["delete"].effect.is_allow());
    }

    #[tokio::test]
    async fn non_owner_is_denied_by_implicit_default() {
        let engine = engine_with(
            r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: doc-policy
spec:
  resource: document
  rules:
    - actions: ["delete"]
      effect: allow
      condition: "R.attributes.ownerId == P.id"
"#,
        );

        let request = CheckRequest {
            request_id: "req-2".to_string(),
            principal: Principal::new("user:bob"),
            resource: Resource::new("document", "1").with_attribute("ownerId", "user:alice"),
            actions: vec!["delete".to_string()],
            aux_data: Default::default(),
        };

        let response = engine.check(&request).await.unwrap();
        assert!(!response.results["delete"].effect.is_allow());
    }

    #[tokio::test]
    async fn unparseable_scope_is_a_structural_error() {
        let engine = engine_with(
            r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: doc-policy
spec:
  resource: document
  rules:
    - actions: ["view"]
      effect: allow
"#,
        );

        let mut request = CheckRequest {
            request_id: "req-3".to_string(),
            principal: Principal::new("user:alice"),
            resource: Resource::new("document", "1"),
            actions: vec!["view".to_string()],
            aux_data: Default::default(),
        };
        request.resource.scope = "Invalid Scope".to_string();

        assert!(engine.check(&request).await.is_err());
    }

    #[tokio::test]
    async fn repeated_identical_requests_are_served_from_cache() {
        let engine = engine_with(
            r#"
apiVersion: authz/v1
kind: ResourcePolicy
metadata:
  name: doc-policy
spec:
  resource: document
  rules:
    - actions: ["view"]
      effect: allow
"#,
        );

        let request = CheckRequest {
            request_id: "req-4".to_string(),
            principal: Principal::new("user:alice"),
            resource: Resource::new("document", "1"),
            actions: vec!["view".to_string()],
            aux_data: Default::default(),
        };

        let first = engine.check(&request).await.unwrap();
        let second = engine.check(&request).await.unwrap();
        assert_eq!(first.results["view"].effect, second.results["view"].effect);
        assert!(engine.metrics().unwrap().get_metrics().await.cache_hits >= 1);
    }
}
