//! Derived roles: dynamic role grants based on a principal's existing roles
//! and a condition expression.
//!
//! - **Pattern matching**: `*`, `prefix:*`, and exact parent-role patterns,
//!   disjunctively combined across a role's `parentRoles` list.
//! - **Dependency resolution**: Kahn's algorithm gives the topological order
//!   one derived role must be evaluated relative to another it depends on.
//! - **Cycle detection**: DFS with a three-color visit state rejects the
//!   whole set at load time if any cycle exists.

pub mod graph;
pub mod resolver;
pub mod types;

pub use graph::{DependencyGraph, DependencyGraphBuilder, GraphError};
pub use resolver::RoleResolver;
pub use types::DerivedRole;
