//! Role resolver: expands a principal's base roles into the full set of
//! derived roles it additionally holds for one request.
//!
//! Resolution walks derived roles in the dependency graph's topological
//! order so a derived role that depends on another derived role always sees
//! it already resolved. A derived role's condition can read request-specific
//! attributes (e.g. resource ownership), so a resolved-role set is only
//! valid for the request it was computed for; the per-call work is already a
//! single linear pass over the evaluation order, so there is nothing further
//! to amortize across requests by caching it.

use super::graph::{DependencyGraphBuilder, GraphError};
use super::types::DerivedRole;
use crate::error::{AuthzError, Result};
use crate::expr::{Engine, EvalContext};
use std::sync::Arc;
use tracing::{debug, warn};

/// A resolver built from a fixed, validated set of derived roles. Rebuilding
/// (`RoleResolver::new` from a fresh role list) is how the catalog's
/// copy-on-write reload applies new derived-role definitions.
#[derive(Clone)]
pub struct RoleResolver {
    derived_roles: Arc<Vec<DerivedRole>>,
    evaluation_order: Arc<Vec<String>>,
}

impl Default for RoleResolver {
    fn default() -> Self {
        Self::new(Vec::new()).expect("empty role set cannot fail validation")
    }
}

impl RoleResolver {
    /// Builds a resolver from a full derived-role set, validating every role
    /// and rejecting the whole set if a cycle exists among them.
    pub fn new(roles: Vec<DerivedRole>) -> Result<Self> {
        let evaluation_order = Self::build_evaluation_order(&roles)?;
        Ok(Self {
            derived_roles: Arc::new(roles),
            evaluation_order: Arc::new(evaluation_order),
        })
    }

    fn build_evaluation_order(roles: &[DerivedRole]) -> Result<Vec<String>> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = DependencyGraphBuilder::new();
        for role in roles {
            builder.add_role(role.clone()).map_err(map_graph_error)?;
        }
        let graph = builder.build().map_err(map_graph_error)?;
        graph.resolve_order().map_err(map_graph_error)
    }

    /// Resolves the full role set (base roles plus every derived role whose
    /// parent-role requirement and condition are satisfied) for one request.
    ///
    /// `ctx` must already carry the principal (`P`) and any resource/request
    /// bindings a derived-role condition might reference; this function only
    /// adds the evolving `current_roles` is not re-injected into `ctx`
    /// automatically, so conditions that need the expanding role set should
    /// be written against `P.roles` as captured at request time — derived
    /// roles activate on parent-role membership, not on other derived
    /// roles' conditions.
    pub fn resolve_roles(
        &self,
        principal_roles: &[String],
        ctx: &EvalContext,
        engine: &Engine,
    ) -> Vec<String> {
        let mut current_roles: Vec<String> = principal_roles.to_vec();

        for role_name in self.evaluation_order.iter() {
            let Some(derived_role) = self.derived_roles.iter().find(|r| &r.name == role_name) else {
                continue;
            };

            if !derived_role.parent_roles_match(&current_roles) {
                continue;
            }

            let activates = match &derived_role.condition {
                None => true,
                Some(condition) => match engine.evaluate_boolean(condition, ctx) {
                    Ok(result) => result,
                    Err(err) => {
                        warn!(role = %derived_role.name, error = %err, "derived role condition failed to evaluate; role not granted");
                        false
                    }
                },
            };

            if activates && !current_roles.contains(&derived_role.name) {
                debug!(role = %derived_role.name, "derived role activated");
                current_roles.push(derived_role.name.clone());
            }
        }

        current_roles
    }

    pub fn role_count(&self) -> usize {
        self.derived_roles.len()
    }

    pub fn role_names(&self) -> Vec<String> {
        self.derived_roles.iter().map(|r| r.name.clone()).collect()
    }
}

fn map_graph_error(e: GraphError) -> AuthzError {
    match e {
        GraphError::CircularDependency(msg) => {
            AuthzError::InvalidPolicy(format!("circular dependency in derived roles: {msg}"))
        }
        GraphError::DuplicateRole(name) => {
            AuthzError::InvalidPolicy(format!("duplicate derived role: {name}"))
        }
        GraphError::InvalidRole(msg) => AuthzError::InvalidPolicy(msg),
    }
}
