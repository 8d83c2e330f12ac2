//! Sandboxed expression evaluator used by policy conditions and derived-role
//! activation rules.
//!
//! The language is intentionally small: booleans, arithmetic, string and
//! collection predicates, and a fixed function allow-list (see
//! [`functions`]). There is no mutation, no loops, and no way to reach
//! anything outside the evaluation context passed in — the same sandboxing
//! goal CEL-style engines pursue, implemented directly here instead of
//! through an external interpreter so failure modes (undefined-vs-false,
//! overflow, recursion limits) are exactly the ones this crate's contracts
//! require.

mod ast;
mod context;
mod error;
mod eval;
mod functions;
mod parser;

pub use ast::Expr;
pub use context::EvalContext;
pub use error::{ExprError, Result};
pub use eval::{Engine, DEFAULT_MAX_DEPTH};
pub use parser::parse;
