//! Error taxonomy for the expression evaluator.

use thiserror::Error;

/// Errors produced while parsing or evaluating an expression.
///
/// Variants map directly onto the evaluator's documented failure modes:
/// a malformed expression never reaches evaluation (`Parse`), a well-formed
/// one can still fail at runtime because of a type mismatch, a missing
/// field, an arithmetic overflow, or exceeding the configured recursion
/// depth.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("parse error at position {pos}: {message}")]
    Parse { pos: usize, message: String },

    #[error("type error: {message}")]
    Type { message: String },

    #[error("undefined: {path}")]
    Undefined { path: String },

    #[error("arithmetic error: {message}")]
    Arithmetic { message: String },

    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    #[error("resource exhausted: {message}")]
    ResourceExhausted { message: String },
}

pub type Result<T> = std::result::Result<T, ExprError>;
