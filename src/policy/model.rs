//! Policy document shapes: the administrative YAML/JSON format and the
//! validated, tagged in-memory representation derived from it.

use crate::derived_roles::DerivedRole;
use crate::types::Effect;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The raw administrative document shape, matching the wire format: a
/// `kind`-tagged envelope with `metadata` and a kind-specific `spec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: PolicyMetadata,
    pub spec: serde_yaml::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyMetadata {
    pub name: String,
    #[serde(default)]
    pub scope: String,
}

/// A validated policy, tagged by kind. Replaces the duck-typed document
/// shape once `PolicyValidator` has checked it.
#[derive(Debug, Clone)]
pub enum Policy {
    Resource(ResourcePolicy),
    Principal(PrincipalPolicy),
    DerivedRoles(DerivedRolesPolicy),
}

impl Policy {
    pub fn name(&self) -> &str {
        match self {
            Policy::Resource(p) => &p.name,
            Policy::Principal(p) => &p.name,
            Policy::DerivedRoles(p) => &p.name,
        }
    }

    pub fn scope(&self) -> &str {
        match self {
            Policy::Resource(p) => &p.scope,
            Policy::Principal(p) => &p.scope,
            Policy::DerivedRoles(_) => "",
        }
    }
}

/// One rule within a resource policy: which actions it covers, the effect
/// it produces, and an optional role/derived-role gate and condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRule {
    pub actions: Vec<String>,
    pub effect: Effect,
    /// Base-role gate: if non-empty (together with `derived_roles`), the
    /// principal's effective role set must intersect this list.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Derived-role gate, matched against the same effective role set as
    /// `roles` — derived roles resolve into the same name space as base
    /// roles, so the two lists are checked identically at evaluation time.
    #[serde(default, rename = "derivedRoles")]
    pub derived_roles: Vec<String>,
    #[serde(default)]
    pub condition: Option<String>,
}

/// A resource policy: applies to resources of a given `kind`, at a given
/// scope, and combines its rules with deny-override.
#[derive(Debug, Clone)]
pub struct ResourcePolicy {
    pub name: String,
    pub scope: String,
    pub resource: String,
    pub rules: Vec<ResourceRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResourcePolicySpec {
    resource: String,
    rules: Vec<ResourceRule>,
}

/// One rule within a principal policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRule {
    /// Resource-kind pattern this rule applies to (`*` allowed).
    pub resource: String,
    pub actions: Vec<String>,
    pub effect: Effect,
    #[serde(default)]
    pub condition: Option<String>,
}

/// A principal policy: rules scoped to one specific principal, evaluated
/// ahead of, and with precedence over, resource policies.
#[derive(Debug, Clone)]
pub struct PrincipalPolicy {
    pub name: String,
    pub scope: String,
    pub principal: String,
    pub rules: Vec<PrincipalRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrincipalPolicySpec {
    principal: String,
    rules: Vec<PrincipalRule>,
}

/// A set of derived-role definitions, addressable as their own catalog
/// entry so multiple resource policies can reference them.
#[derive(Debug, Clone)]
pub struct DerivedRolesPolicy {
    pub name: String,
    pub definitions: Vec<DerivedRole>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DerivedRolesSpec {
    definitions: Vec<DerivedRole>,
}

impl ResourcePolicySpec {
    pub fn from_yaml(spec: &serde_yaml::Value) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_value(spec.clone())
    }
}

impl PrincipalPolicySpec {
    pub fn from_yaml(spec: &serde_yaml::Value) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_value(spec.clone())
    }
}

impl DerivedRolesSpec {
    pub fn from_yaml(spec: &serde_yaml::Value) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_value(spec.clone())
    }
}

pub(crate) fn resource_spec(doc: &PolicyDocument) -> Result<(String, Vec<ResourceRule>), serde_yaml::Error> {
    let spec = ResourcePolicySpec::from_yaml(&doc.spec)?;
    Ok((spec.resource, spec.rules))
}

pub(crate) fn principal_spec(doc: &PolicyDocument) -> Result<(String, Vec<PrincipalRule>), serde_yaml::Error> {
    let spec = PrincipalPolicySpec::from_yaml(&doc.spec)?;
    Ok((spec.principal, spec.rules))
}

pub(crate) fn derived_roles_spec(doc: &PolicyDocument) -> Result<Vec<DerivedRole>, serde_yaml::Error> {
    let spec = DerivedRolesSpec::from_yaml(&doc.spec)?;
    Ok(spec.definitions)
}

/// Matches an action or role name against a pattern using only `*` as a
/// wildcard — never a full regex engine, so policy authors can't smuggle in
/// catastrophic-backtracking patterns through an action or role field.
pub fn matches_glob(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if !pattern.contains('*') {
        return pattern == value;
    }
    let mut regex_str = String::from("^");
    for part in pattern.split('*') {
        regex_str.push_str(&regex::escape(part));
        regex_str.push_str(".*");
    }
    regex_str.truncate(regex_str.len() - 2);
    regex_str.push('$');
    Regex::new(&regex_str).map(|re| re.is_match(value)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_wildcard_matches_any_value() {
        assert!(matches_glob("*", "anything"));
    }

    #[test]
    fn glob_exact_requires_equality() {
        assert!(matches_glob("read", "read"));
        assert!(!matches_glob("read", "write"));
    }

    #[test]
    fn glob_prefix_pattern_matches_by_prefix() {
        assert!(matches_glob("admin:*", "admin:full"));
        assert!(!matches_glob("admin:*", "administrator"));
    }
}
