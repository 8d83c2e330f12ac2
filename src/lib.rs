//! # Policy Decision Core
//!
//! A policy decision point: given a principal, a resource, and one or more
//! actions, resolves the principal's effective roles (base roles plus any
//! derived roles they activate) and evaluates the loaded principal- and
//! resource-scoped policies to produce an `allow`/`deny` decision per
//! action.
//!
//! ## Example
//!
//! ```rust
//! use authz_core::{DecisionEngine, EngineConfig, PolicyCatalog};
//! use authz_core::expr::Engine as ExprEngine;
//! use authz_core::policy::parse_document;
//! use authz_core::types::{CheckRequest, Principal, Resource};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Arc::new(PolicyCatalog::new());
//! let expr_engine = ExprEngine::new();
//! let doc = parse_document(
//!     "apiVersion: authz/v1\nkind: ResourcePolicy\nmetadata:\n  name: docs\nspec:\n  resource: document\n  rules:\n    - actions: [\"view\"]\n      effect: allow\n",
//! )?;
//! catalog.replace_all(&[doc], &expr_engine)?;
//!
//! let engine = DecisionEngine::new(EngineConfig::default(), catalog);
//! let request = CheckRequest {
//!     request_id: "req-1".to_string(),
//!     principal: Principal::new("user:alice"),
//!     resource: Resource::new("document", "123"),
//!     actions: vec!["view".to_string()],
//!     aux_data: Default::default(),
//! };
//!
//! let response = engine.check(&request).await?;
//! assert!(response.results["view"].effect.is_allow());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod derived_roles;
pub mod engine;
pub mod error;
pub mod expr;
pub mod metrics;
pub mod policy;
pub mod principal_eval;
pub mod resource_eval;
pub mod scope;
pub mod types;

pub use cache::{CacheConfig, DecisionCache};
pub use catalog::{CatalogSnapshot, PolicyCatalog};
pub use engine::{DecisionEngine, EngineConfig};
pub use error::{AuthzError, Result};
pub use metrics::{EngineMetrics, MetricsCollector};
pub use types::{CheckRequest, CheckResponse, Decision, Principal, Resource};

/// Library version, as published in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
