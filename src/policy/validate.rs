//! Structural and semantic validation of policy documents.
//!
//! Validation compiles every embedded condition through the expression
//! engine at load time, so a malformed condition fails the document's
//! admission rather than surfacing as a runtime evaluation error on the
//! first request that happens to hit it.

use super::model::{
    derived_roles_spec, matches_glob, principal_spec, resource_spec, DerivedRolesPolicy, Policy,
    PolicyDocument, PrincipalPolicy, ResourcePolicy,
};
use crate::error::{AuthzError, Result};
use crate::expr::Engine;
use crate::scope::Scope;

pub struct PolicyValidator;

impl PolicyValidator {
    /// Validates one document end to end: required fields, scope syntax,
    /// kind-specific structural checks, and every embedded condition's
    /// compileability.
    pub fn validate(doc: &PolicyDocument, engine: &Engine) -> Result<Policy> {
        if doc.metadata.name.trim().is_empty() {
            return Err(AuthzError::Schema("metadata.name is required".to_string()));
        }

        match doc.kind.as_str() {
            "ResourcePolicy" => Self::validate_resource(doc, engine),
            "PrincipalPolicy" => Self::validate_principal(doc, engine),
            "DerivedRoles" => Self::validate_derived_roles(doc),
            other => Err(AuthzError::Schema(format!("unknown policy kind: {other}"))),
        }
    }

    fn validate_resource(doc: &PolicyDocument, engine: &Engine) -> Result<Policy> {
        if !doc.metadata.scope.is_empty() {
            Scope::parse(&doc.metadata.scope)?;
        }

        let (resource, rules) = resource_spec(doc)
            .map_err(|e| AuthzError::Schema(format!("resource policy '{}': {e}", doc.metadata.name)))?;

        if resource.trim().is_empty() {
            return Err(AuthzError::Schema(format!(
                "resource policy '{}' must name a resource kind",
                doc.metadata.name
            )));
        }
        if rules.is_empty() {
            return Err(AuthzError::Schema(format!(
                "resource policy '{}' has no rules",
                doc.metadata.name
            )));
        }

        for rule in &rules {
            if rule.actions.is_empty() {
                return Err(AuthzError::Schema(format!(
                    "resource policy '{}' has a rule with no actions",
                    doc.metadata.name
                )));
            }
            validate_patterns(&rule.actions, &format!("resource policy '{}' action", doc.metadata.name))?;
            validate_patterns(&rule.roles, &format!("resource policy '{}' role", doc.metadata.name))?;
            validate_patterns(
                &rule.derived_roles,
                &format!("resource policy '{}' derivedRoles entry", doc.metadata.name),
            )?;
            if let Some(condition) = &rule.condition {
                engine.compile(condition).map_err(|e| {
                    AuthzError::Schema(format!(
                        "resource policy '{}' rule condition failed to compile: {e}",
                        doc.metadata.name
                    ))
                })?;
            }
        }

        Ok(Policy::Resource(ResourcePolicy {
            name: doc.metadata.name.clone(),
            scope: doc.metadata.scope.clone(),
            resource,
            rules,
        }))
    }

    fn validate_principal(doc: &PolicyDocument, engine: &Engine) -> Result<Policy> {
        if !doc.metadata.scope.is_empty() {
            Scope::parse(&doc.metadata.scope)?;
        }

        let (principal, rules) = principal_spec(doc)
            .map_err(|e| AuthzError::Schema(format!("principal policy '{}': {e}", doc.metadata.name)))?;

        if principal.trim().is_empty() {
            return Err(AuthzError::Schema(format!(
                "principal policy '{}' must name a principal",
                doc.metadata.name
            )));
        }
        if rules.is_empty() {
            return Err(AuthzError::Schema(format!(
                "principal policy '{}' has no rules",
                doc.metadata.name
            )));
        }

        for rule in &rules {
            if rule.actions.is_empty() {
                return Err(AuthzError::Schema(format!(
                    "principal policy '{}' has a rule with no actions",
                    doc.metadata.name
                )));
            }
            validate_patterns(&rule.actions, &format!("principal policy '{}' action", doc.metadata.name))?;
            if let Some(condition) = &rule.condition {
                engine.compile(condition).map_err(|e| {
                    AuthzError::Schema(format!(
                        "principal policy '{}' rule condition failed to compile: {e}",
                        doc.metadata.name
                    ))
                })?;
            }
        }

        Ok(Policy::Principal(PrincipalPolicy {
            name: doc.metadata.name.clone(),
            scope: doc.metadata.scope.clone(),
            principal,
            rules,
        }))
    }

    fn validate_derived_roles(doc: &PolicyDocument) -> Result<Policy> {
        let definitions = derived_roles_spec(doc)
            .map_err(|e| AuthzError::Schema(format!("derived roles '{}': {e}", doc.metadata.name)))?;

        if definitions.is_empty() {
            return Err(AuthzError::Schema(format!(
                "derived roles document '{}' defines no roles",
                doc.metadata.name
            )));
        }

        for role in &definitions {
            role.validate()?;
        }

        Ok(Policy::DerivedRoles(DerivedRolesPolicy {
            name: doc.metadata.name.clone(),
            definitions,
        }))
    }
}

/// Returns true if `action` is covered by any entry in `patterns`.
pub fn action_matches_any(patterns: &[String], action: &str) -> bool {
    patterns.iter().any(|p| matches_glob(p, action))
}

/// Rejects empty pattern strings. `*` is the only wildcard character
/// `matches_glob` treats specially — every other character, including other
/// glob metacharacters, is matched literally — so there is no other
/// "disallowed position" to check beyond non-emptiness.
fn validate_patterns(patterns: &[String], context: &str) -> Result<()> {
    for pattern in patterns {
        if pattern.trim().is_empty() {
            return Err(AuthzError::Schema(format!("{context} must not be empty")));
        }
    }
    Ok(())
}
