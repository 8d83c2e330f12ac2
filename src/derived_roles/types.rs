//! Derived role type definitions.

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};

/// A derived role: a role a principal gains dynamically when it already
/// holds one of a set of parent roles and an optional condition evaluates
/// to true.
///
/// Parent-role matching is a **disjunction**: the principal needs only one
/// of `parent_roles` to match, not all of them. An empty `parent_roles`
/// list matches unconditionally (a "public" derived role available to every
/// principal, subject only to its condition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedRole {
    pub name: String,
    #[serde(default, rename = "parentRoles")]
    pub parent_roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl DerivedRole {
    pub fn new(name: impl Into<String>, parent_roles: Vec<String>) -> Self {
        Self {
            name: name.into(),
            parent_roles,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(AuthzError::InvalidInput(
                "derived role name cannot be empty".to_string(),
            ));
        }

        for parent in &self.parent_roles {
            if parent.is_empty() {
                return Err(AuthzError::InvalidInput(format!(
                    "derived role '{}' has an empty parent role entry",
                    self.name
                )));
            }
        }

        for parent in &self.parent_roles {
            if parent == &self.name {
                return Err(AuthzError::InvalidInput(format!(
                    "derived role '{}' cannot reference itself as a parent role",
                    self.name
                )));
            }
        }

        Ok(())
    }

    /// Returns true if `principal_roles` satisfies this role's parent-role
    /// requirement: an empty `parent_roles` list matches unconditionally;
    /// otherwise any single entry matching is enough (disjunction across
    /// entries, and across the principal's roles for each entry).
    pub fn parent_roles_match(&self, principal_roles: &[String]) -> bool {
        if self.parent_roles.is_empty() {
            return true;
        }

        self.parent_roles.iter().any(|parent_pattern| {
            principal_roles
                .iter()
                .any(|role| Self::matches_pattern(role, parent_pattern))
        })
    }

    /// Matches a single held role against a single `parentRoles` pattern:
    /// `"*"` matches any role, `"x:*"` matches by prefix, and anything else
    /// must match exactly.
    fn matches_pattern(role: &str, pattern: &str) -> bool {
        if pattern == "*" {
            return true;
        }

        if let Some(prefix) = pattern.strip_suffix(":*") {
            return role.starts_with(&format!("{}:", prefix));
        }

        if let Some(suffix) = pattern.strip_prefix("*:") {
            return role.ends_with(&format!(":{}", suffix));
        }

        role == pattern
    }
}
