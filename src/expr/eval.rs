//! Tree-walking evaluator and the compiled-expression cache.

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::context::EvalContext;
use super::error::{ExprError, Result};
use super::functions::{builtins, Function};
use super::parser;
use crate::types::Value;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Default recursion depth the evaluator will walk before failing with
/// `ResourceExhausted`, matching the parser's default nesting budget.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// A compiling, caching expression engine.
///
/// Source strings are parsed once and the resulting AST is cached behind an
/// `Arc` so repeated evaluations of the same condition (the common case —
/// the same policy rule is evaluated on every matching request) skip
/// re-parsing.
pub struct Engine {
    cache: DashMap<String, Arc<Expr>>,
    functions: HashMap<&'static str, Function>,
    max_depth: usize,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
            functions: builtins(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Registers an additional pure function, extending the allow-list.
    /// Must be called before the engine is shared across threads for
    /// evaluation; the table itself is immutable afterwards.
    pub fn register_function(&mut self, name: &'static str, f: Function) {
        self.functions.insert(name, f);
    }

    /// Parses `source`, populating the compiled-expression cache.
    pub fn compile(&self, source: &str) -> Result<Arc<Expr>> {
        if let Some(cached) = self.cache.get(source) {
            return Ok(Arc::clone(&cached));
        }
        let expr = Arc::new(parser::parse_with_depth(source, self.max_depth)?);
        self.cache.insert(source.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    /// Evaluates a previously compiled expression against a context.
    pub fn evaluate(&self, expr: &Expr, ctx: &EvalContext) -> Result<Value> {
        self.eval(expr, ctx, 0)
    }

    /// Compiles and evaluates `source` in one call.
    pub fn evaluate_expression(&self, source: &str, ctx: &EvalContext) -> Result<Value> {
        let expr = self.compile(source)?;
        self.evaluate(&expr, ctx)
    }

    /// Convenience wrapper requiring a boolean result, the shape every
    /// policy condition must evaluate to.
    pub fn evaluate_boolean(&self, source: &str, ctx: &EvalContext) -> Result<bool> {
        match self.evaluate_expression(source, ctx)? {
            Value::Bool(b) => Ok(b),
            other => Err(ExprError::Type {
                message: format!("condition must evaluate to bool, got {}", other.type_name()),
            }),
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            Err(ExprError::ResourceExhausted {
                message: format!("evaluation nesting exceeds max depth {}", self.max_depth),
            })
        } else {
            Ok(())
        }
    }

    fn eval(&self, expr: &Expr, ctx: &EvalContext, depth: usize) -> Result<Value> {
        self.check_depth(depth)?;
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Ident(name) => ctx
                .get(name)
                .cloned()
                .ok_or_else(|| ExprError::Undefined { path: name.clone() }),
            Expr::Field(base, field) => {
                let base_val = self.eval(base, ctx, depth + 1)?;
                match &base_val {
                    Value::Object(map) => map.get(field).cloned().ok_or_else(|| ExprError::Undefined {
                        path: format!("{}.{}", describe(base), field),
                    }),
                    Value::Null => Err(ExprError::Undefined {
                        path: format!("{}.{}", describe(base), field),
                    }),
                    other => Err(ExprError::Type {
                        message: format!("cannot access field '{field}' on {}", other.type_name()),
                    }),
                }
            }
            Expr::Index(base, index) => {
                let base_val = self.eval(base, ctx, depth + 1)?;
                let index_val = self.eval(index, ctx, depth + 1)?;
                match (&base_val, &index_val) {
                    (Value::Array(items), Value::Int(i)) => {
                        let idx = usize::try_from(*i).ok();
                        idx.and_then(|idx| items.get(idx)).cloned().ok_or_else(|| {
                            ExprError::Undefined {
                                path: format!("{}[{}]", describe(base), i),
                            }
                        })
                    }
                    (Value::Object(map), Value::String(key)) => {
                        map.get(key).cloned().ok_or_else(|| ExprError::Undefined {
                            path: format!("{}[{}]", describe(base), key),
                        })
                    }
                    (Value::Null, _) => Err(ExprError::Undefined {
                        path: describe(base),
                    }),
                    (other, _) => Err(ExprError::Type {
                        message: format!("cannot index into {}", other.type_name()),
                    }),
                }
            }
            Expr::Call(name, arg_exprs) => {
                let f = self
                    .functions
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| ExprError::UnknownFunction { name: name.clone() })?;
                let mut args = Vec::with_capacity(arg_exprs.len());
                for arg in arg_exprs {
                    args.push(self.eval(arg, ctx, depth + 1)?);
                }
                f(&args)
            }
            Expr::Unary(op, inner) => {
                let val = self.eval(inner, ctx, depth + 1)?;
                match (op, &val) {
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (UnaryOp::Neg, Value::Int(i)) => i
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| ExprError::Arithmetic {
                            message: "integer negation overflow".into(),
                        }),
                    (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                    (op, other) => Err(ExprError::Type {
                        message: format!("cannot apply {op:?} to {}", other.type_name()),
                    }),
                }
            }
            Expr::Binary(BinaryOp::And, left, right) => {
                if !self.eval_bool(left, ctx, depth + 1)? {
                    Ok(Value::Bool(false))
                } else {
                    Ok(Value::Bool(self.eval_bool(right, ctx, depth + 1)?))
                }
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                if self.eval_bool(left, ctx, depth + 1)? {
                    Ok(Value::Bool(true))
                } else {
                    Ok(Value::Bool(self.eval_bool(right, ctx, depth + 1)?))
                }
            }
            Expr::Binary(op, left, right) => {
                let l = self.eval(left, ctx, depth + 1)?;
                let r = self.eval(right, ctx, depth + 1)?;
                eval_binary(*op, l, r)
            }
            Expr::Ternary(cond, then_branch, else_branch) => {
                if self.eval_bool(cond, ctx, depth + 1)? {
                    self.eval(then_branch, ctx, depth + 1)
                } else {
                    self.eval(else_branch, ctx, depth + 1)
                }
            }
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, ctx, depth + 1)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Map(entries) => {
                let mut map = HashMap::with_capacity(entries.len());
                for (key, value_expr) in entries {
                    map.insert(key.clone(), self.eval(value_expr, ctx, depth + 1)?);
                }
                Ok(Value::Object(map))
            }
        }
    }

    fn eval_bool(&self, expr: &Expr, ctx: &EvalContext, depth: usize) -> Result<bool> {
        match self.eval(expr, ctx, depth)? {
            Value::Bool(b) => Ok(b),
            other => Err(ExprError::Type {
                message: format!("expected bool, got {}", other.type_name()),
            }),
        }
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Field(base, field) => format!("{}.{}", describe(base), field),
        _ => "<expr>".to_string(),
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Eq => Ok(Value::Bool(values_equal(&l, &r)?)),
        Ne => Ok(Value::Bool(!values_equal(&l, &r)?)),
        In => match r {
            Value::Array(items) => {
                Ok(Value::Bool(items.iter().any(|item| values_equal(item, &l).unwrap_or(false))))
            }
            other => Err(ExprError::Type {
                message: format!("right-hand side of 'in' must be an array, got {}", other.type_name()),
            }),
        },
        Lt | Le | Gt | Ge => compare(op, &l, &r),
        Add | Sub | Mul | Div | Mod => arithmetic(op, &l, &r),
        And | Or => unreachable!("handled by short-circuit evaluation"),
    }
}

/// Implicit conversions are forbidden: equality across mismatched types is a
/// `TypeError`, not a silent `false`, except for the Int/Float widening
/// numeric literals already get everywhere else.
fn values_equal(l: &Value, r: &Value) -> Result<bool> {
    match (l, r) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => Ok((*a as f64) == *b),
        _ if std::mem::discriminant(l) == std::mem::discriminant(r) => Ok(l == r),
        _ => Err(ExprError::Type {
            message: format!("cannot compare {} and {}", l.type_name(), r.type_name()),
        }),
    }
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    use BinaryOp::*;
    let ordering = match (l, r) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => {
            let (a, b) = match (as_f64(l), as_f64(r)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(ExprError::Type {
                        message: format!(
                            "cannot compare {} and {}",
                            l.type_name(),
                            r.type_name()
                        ),
                    })
                }
            };
            a.partial_cmp(&b).ok_or_else(|| ExprError::Arithmetic {
                message: "comparison produced NaN".into(),
            })?
        }
    };
    let result = match op {
        Lt => ordering.is_lt(),
        Le => ordering.is_le(),
        Gt => ordering.is_gt(),
        Ge => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    use BinaryOp::*;
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                Add => a.checked_add(*b),
                Sub => a.checked_sub(*b),
                Mul => a.checked_mul(*b),
                Div => {
                    if *b == 0 {
                        return Err(ExprError::Arithmetic {
                            message: "division by zero".into(),
                        });
                    }
                    a.checked_div(*b)
                }
                Mod => {
                    if *b == 0 {
                        return Err(ExprError::Arithmetic {
                            message: "modulo by zero".into(),
                        });
                    }
                    a.checked_rem(*b)
                }
                _ => unreachable!(),
            };
            result.map(Value::Int).ok_or_else(|| ExprError::Arithmetic {
                message: format!("integer overflow evaluating {a} {op:?} {b}"),
            })
        }
        (Value::String(a), Value::String(b)) if op == Add => Ok(Value::String(format!("{a}{b}"))),
        _ => {
            let a = as_f64(l).ok_or_else(|| ExprError::Type {
                message: format!("cannot apply arithmetic to {}", l.type_name()),
            })?;
            let b = as_f64(r).ok_or_else(|| ExprError::Type {
                message: format!("cannot apply arithmetic to {}", r.type_name()),
            })?;
            let result = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                Mod => a % b,
                _ => unreachable!(),
            };
            Ok(Value::Float(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Principal;

    fn ctx_with_principal(principal: &Principal) -> EvalContext {
        EvalContext::new().with_principal(principal)
    }

    #[test]
    fn evaluates_simple_comparison() {
        let engine = Engine::new();
        let ctx = EvalContext::new();
        assert_eq!(engine.evaluate_boolean("1 + 2 == 3", &ctx).unwrap(), true);
    }

    #[test]
    fn short_circuits_and_without_evaluating_right_side() {
        let engine = Engine::new();
        let ctx = EvalContext::new();
        // `undefined_var` is never touched because the left side is false.
        assert_eq!(engine.evaluate_boolean("false && undefined_var", &ctx).unwrap(), false);
    }

    #[test]
    fn undefined_field_access_is_an_error_not_false() {
        let engine = Engine::new();
        let principal = Principal::new("user:alice");
        let ctx = ctx_with_principal(&principal);
        let err = engine.evaluate_expression("P.attributes.missing", &ctx).unwrap_err();
        assert!(matches!(err, ExprError::Undefined { .. }));
    }

    #[test]
    fn integer_overflow_is_an_arithmetic_error() {
        let engine = Engine::new();
        let ctx = EvalContext::new();
        let source = format!("{} + 1", i64::MAX);
        let err = engine.evaluate_expression(&source, &ctx).unwrap_err();
        assert!(matches!(err, ExprError::Arithmetic { .. }));
    }

    #[test]
    fn int_and_float_compare_by_widening() {
        let engine = Engine::new();
        let ctx = EvalContext::new();
        assert_eq!(engine.evaluate_boolean("1 < 1.5", &ctx).unwrap(), true);
    }

    #[test]
    fn cross_type_equality_is_a_type_error_not_false() {
        let engine = Engine::new();
        let ctx = EvalContext::new();
        let err = engine.evaluate_expression("1 == \"1\"", &ctx).unwrap_err();
        assert!(matches!(err, ExprError::Type { .. }));
    }

    #[test]
    fn cross_type_inequality_is_a_type_error_not_true() {
        let engine = Engine::new();
        let ctx = EvalContext::new();
        let err = engine.evaluate_expression("1 != \"1\"", &ctx).unwrap_err();
        assert!(matches!(err, ExprError::Type { .. }));
    }

    #[test]
    fn compiled_expressions_are_cached() {
        let engine = Engine::new();
        let ctx = EvalContext::new();
        engine.evaluate_expression("1 == 1", &ctx).unwrap();
        engine.evaluate_expression("1 == 1", &ctx).unwrap();
        assert_eq!(engine.cache_len(), 1);
    }

    #[test]
    fn in_operator_checks_array_membership() {
        let engine = Engine::new();
        let ctx = EvalContext::new();
        assert_eq!(engine.evaluate_boolean("\"b\" in [\"a\", \"b\"]", &ctx).unwrap(), true);
    }

    #[test]
    fn non_boolean_result_is_rejected_by_evaluate_boolean() {
        let engine = Engine::new();
        let ctx = EvalContext::new();
        let err = engine.evaluate_boolean("1 + 1", &ctx).unwrap_err();
        assert!(matches!(err, ExprError::Type { .. }));
    }
}
