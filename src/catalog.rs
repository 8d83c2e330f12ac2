//! Policy catalog: a hot-reloadable, scope-indexed store of validated
//! policies.
//!
//! The catalog is a copy-on-write snapshot behind a `RwLock<Arc<_>>`: readers
//! take a cheap `Arc` clone of the current snapshot and never block a
//! concurrent reload, and a reload that fails validation never touches the
//! snapshot readers are already holding.

use crate::derived_roles::RoleResolver;
use crate::error::Result;
use crate::expr::Engine as ExprEngine;
use crate::policy::{matches_glob, Policy, PolicyDocument, PolicyValidator, PrincipalPolicy, ResourcePolicy};
use crate::scope::Scope;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// An immutable, fully-indexed view of the loaded policies. Replacing the
/// catalog's contents means building a brand new snapshot and swapping the
/// pointer — existing snapshots already in a reader's hands stay valid.
pub struct CatalogSnapshot {
    /// Resource policies indexed by resource kind, each entry sorted
    /// most-specific-scope-first so a lookup can take the first match.
    resource_policies: HashMap<String, Vec<ResourcePolicy>>,
    /// Principal policies indexed by exact principal id.
    principal_policies: HashMap<String, Vec<PrincipalPolicy>>,
    /// Principal policies whose `principal` field is a wildcard pattern
    /// (e.g. `"user:*"`, `"*"`); scanned linearly since they can't be
    /// indexed by exact key.
    wildcard_principal_policies: Vec<PrincipalPolicy>,
    /// A single resolver built from the union of every loaded derived-role
    /// definition; construction fails (and so does the reload) if any two
    /// documents define roles with a circular dependency between them.
    role_resolver: Arc<RoleResolver>,
    version: u64,
}

impl CatalogSnapshot {
    fn empty() -> Self {
        Self {
            resource_policies: HashMap::new(),
            principal_policies: HashMap::new(),
            wildcard_principal_policies: Vec::new(),
            role_resolver: Arc::new(RoleResolver::default()),
            version: 0,
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn role_resolver(&self) -> &Arc<RoleResolver> {
        &self.role_resolver
    }

    /// Resource policies for `kind`, ordered from most to least specific
    /// scope relative to `scope`. Only policies whose own scope is an
    /// ancestor of (or equal to) `scope` are eligible.
    pub fn resource_policies_for(&self, kind: &str, scope: &Scope) -> Vec<&ResourcePolicy> {
        let mut matches: Vec<&ResourcePolicy> = self
            .resource_policies
            .get(kind)
            .into_iter()
            .flatten()
            .filter(|policy| policy_scope_applies(&policy.scope, scope))
            .collect();
        matches.sort_by_key(|policy| std::cmp::Reverse(scope_depth(&policy.scope)));
        matches
    }

    /// Principal policies that apply to `principal_id`: an exact-key lookup
    /// plus a linear scan of wildcard-principal policies (`"user:*"`, `"*"`),
    /// matched under the same pattern rules as role matching.
    pub fn principal_policies_for(&self, principal_id: &str, scope: &Scope) -> Vec<&PrincipalPolicy> {
        let exact = self.principal_policies.get(principal_id).into_iter().flatten();
        let wildcard = self
            .wildcard_principal_policies
            .iter()
            .filter(|policy| matches_glob(&policy.principal, principal_id));

        let mut matches: Vec<&PrincipalPolicy> = exact
            .chain(wildcard)
            .filter(|policy| policy_scope_applies(&policy.scope, scope))
            .collect();
        matches.sort_by_key(|policy| std::cmp::Reverse(scope_depth(&policy.scope)));
        matches
    }
}

fn scope_depth(raw: &str) -> usize {
    if raw.is_empty() {
        0
    } else {
        raw.split('.').count()
    }
}

fn policy_scope_applies(policy_scope: &str, request_scope: &Scope) -> bool {
    if policy_scope.is_empty() {
        return true;
    }
    match Scope::parse(policy_scope) {
        Ok(scope) => scope.is_ancestor_or_equal(request_scope),
        Err(_) => false,
    }
}

/// Owns the current catalog snapshot and performs validated, atomic
/// reloads.
pub struct PolicyCatalog {
    snapshot: RwLock<Arc<CatalogSnapshot>>,
}

impl Default for PolicyCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyCatalog {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(CatalogSnapshot::empty())),
        }
    }

    pub fn current(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.snapshot.read().expect("catalog lock poisoned"))
    }

    /// Validates and indexes every document, then atomically swaps the
    /// snapshot in. On any validation failure the previous snapshot is left
    /// untouched and the whole batch is rejected — there is no partial
    /// reload.
    pub fn replace_all(&self, documents: &[PolicyDocument], expr_engine: &ExprEngine) -> Result<()> {
        let mut resource_policies: HashMap<String, Vec<ResourcePolicy>> = HashMap::new();
        let mut principal_policies: HashMap<String, Vec<PrincipalPolicy>> = HashMap::new();
        let mut wildcard_principal_policies: Vec<PrincipalPolicy> = Vec::new();
        let mut derived_roles = Vec::new();

        for document in documents {
            match PolicyValidator::validate(document, expr_engine)? {
                Policy::Resource(policy) => {
                    resource_policies
                        .entry(policy.resource.clone())
                        .or_default()
                        .push(policy);
                }
                Policy::Principal(policy) => {
                    if policy.principal.contains('*') {
                        wildcard_principal_policies.push(policy);
                    } else {
                        principal_policies
                            .entry(policy.principal.clone())
                            .or_default()
                            .push(policy);
                    }
                }
                Policy::DerivedRoles(policy) => {
                    derived_roles.extend(policy.definitions);
                }
            }
        }

        let role_resolver = RoleResolver::new(derived_roles)?;

        let next_version = self.current().version + 1;
        let snapshot = Arc::new(CatalogSnapshot {
            resource_policies,
            principal_policies,
            wildcard_principal_policies,
            role_resolver: Arc::new(role_resolver),
            version: next_version,
        });

        let mut guard = self.snapshot.write().expect("catalog lock poisoned");
        info!(version = next_version, "policy catalog reloaded");
        *guard = snapshot;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.current().version == 0
    }
}
