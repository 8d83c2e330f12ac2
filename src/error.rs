//! Crate-wide error taxonomy.
//!
//! Leaf components (the expression evaluator, the scope parser) define
//! their own focused error enum; `AuthzError` aggregates them so callers at
//! the catalog/engine boundary have one error type to match on.

use crate::expr::ExprError;
use crate::scope::ScopeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("policy not found: {0}")]
    PolicyNotFound(String),

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("policy document failed validation: {0}")]
    Schema(String),

    #[error("invalid scope: {0}")]
    Scope(#[from] ScopeError),

    #[error("expression error: {0}")]
    Expr(#[from] ExprError),

    #[error("policy evaluation failed: {0}")]
    EvaluationError(String),

    #[error("decision cache error: {0}")]
    Cache(String),

    #[error("request exceeded its deadline")]
    Timeout,

    #[error("internal engine error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse policy document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, AuthzError>;
