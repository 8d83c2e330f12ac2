//! Administrative policy documents and their validated in-memory form.
//!
//! A document is parsed as YAML into a [`PolicyDocument`] envelope, then
//! checked by [`PolicyValidator`] into a tagged [`Policy`]. The catalog only
//! ever stores validated policies; a document that fails validation never
//! enters the catalog and the previous snapshot is left untouched.

pub mod model;
pub mod validate;

pub use model::{
    matches_glob, DerivedRolesPolicy, Policy, PolicyDocument, PolicyMetadata, PrincipalPolicy,
    PrincipalRule, ResourcePolicy, ResourceRule,
};
pub use validate::{action_matches_any, PolicyValidator};

use crate::error::{AuthzError, Result};

/// Parses a single YAML document into its administrative envelope shape.
/// Does not validate; call [`PolicyValidator::validate`] on the result.
pub fn parse_document(source: &str) -> Result<PolicyDocument> {
    serde_yaml::from_str(source).map_err(AuthzError::Yaml)
}
