//! Built-in function allow-list.
//!
//! Every function usable from a policy condition is listed here explicitly;
//! there is no reflection or dynamic dispatch into host code beyond this
//! table, so a condition can never reach anything the allow-list doesn't
//! name. Hosts may extend the table at construction time with their own
//! pure functions of the same signature.

use super::error::{ExprError, Result};
use crate::types::Value;
use regex::Regex;
use std::collections::HashMap;
use std::net::IpAddr;

pub type Function = fn(&[Value]) -> Result<Value>;

pub fn builtins() -> HashMap<&'static str, Function> {
    let mut table: HashMap<&'static str, Function> = HashMap::new();
    table.insert("size", size);
    table.insert("startsWith", starts_with);
    table.insert("endsWith", ends_with);
    table.insert("contains", contains);
    table.insert("matches", matches);
    table.insert("timestamp", timestamp);
    table.insert("duration", duration);
    table.insert("inIPRange", in_ip_range);
    table.insert("now", now);
    table.insert("hierarchy", hierarchy);
    table.insert("hasPermission", has_permission);
    table
}

fn arity_error(name: &str, expected: usize, got: usize) -> ExprError {
    ExprError::Type {
        message: format!("{name}() expects {expected} argument(s), got {got}"),
    }
}

fn type_error(name: &str, expected: &str, got: &Value) -> ExprError {
    ExprError::Type {
        message: format!("{name}() expects {expected}, got {}", got.type_name()),
    }
}

fn size(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(arity_error("size", 1, args.len()));
    }
    let n = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::Array(a) => a.len(),
        Value::Object(m) => m.len(),
        other => return Err(type_error("size", "string, array, or object", other)),
    };
    Ok(Value::Int(n as i64))
}

fn as_string<'a>(name: &str, v: &'a Value) -> Result<&'a str> {
    v.as_str().ok_or_else(|| type_error(name, "string", v))
}

fn starts_with(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(arity_error("startsWith", 2, args.len()));
    }
    let s = as_string("startsWith", &args[0])?;
    let prefix = as_string("startsWith", &args[1])?;
    Ok(Value::Bool(s.starts_with(prefix)))
}

fn ends_with(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(arity_error("endsWith", 2, args.len()));
    }
    let s = as_string("endsWith", &args[0])?;
    let suffix = as_string("endsWith", &args[1])?;
    Ok(Value::Bool(s.ends_with(suffix)))
}

fn contains(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(arity_error("contains", 2, args.len()));
    }
    match (&args[0], &args[1]) {
        (Value::String(s), Value::String(needle)) => Ok(Value::Bool(s.contains(needle.as_str()))),
        (Value::Array(items), needle) => Ok(Value::Bool(items.contains(needle))),
        (other, _) => Err(type_error("contains", "string or array", other)),
    }
}

fn matches(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(arity_error("matches", 2, args.len()));
    }
    let s = as_string("matches", &args[0])?;
    let pattern = as_string("matches", &args[1])?;
    // `regex` compiles to a guaranteed-linear-time automaton: policy authors
    // cannot construct a catastrophic-backtracking pattern here.
    let re = Regex::new(pattern).map_err(|e| ExprError::Type {
        message: format!("invalid regex pattern: {e}"),
    })?;
    Ok(Value::Bool(re.is_match(s)))
}

fn timestamp(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(arity_error("timestamp", 1, args.len()));
    }
    let s = as_string("timestamp", &args[0])?;
    let parsed = chrono::DateTime::parse_from_rfc3339(s).map_err(|e| ExprError::Type {
        message: format!("invalid RFC3339 timestamp '{s}': {e}"),
    })?;
    Ok(Value::Int(parsed.timestamp_millis()))
}

fn duration(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(arity_error("duration", 1, args.len()));
    }
    let s = as_string("duration", &args[0])?;
    parse_duration_secs(s)
        .map(Value::Int)
        .ok_or_else(|| ExprError::Type {
            message: format!("invalid duration literal '{s}'"),
        })
}

/// Parses a Go-style duration string such as `"1h30m"` or `"45s"` into
/// whole seconds.
fn parse_duration_secs(s: &str) -> Option<i64> {
    let mut total: i64 = 0;
    let mut num = String::new();
    let mut chars = s.chars().peekable();
    let mut saw_unit = false;
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            num.push(c);
            chars.next();
        } else {
            let unit_secs = match c {
                'h' => 3600,
                'm' => 60,
                's' => 1,
                _ => return None,
            };
            chars.next();
            let n: i64 = num.parse().ok()?;
            num.clear();
            total = total.checked_add(n.checked_mul(unit_secs)?)?;
            saw_unit = true;
        }
    }
    if !num.is_empty() || !saw_unit {
        return None;
    }
    Some(total)
}

fn in_ip_range(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(arity_error("inIPRange", 2, args.len()));
    }
    let ip_str = as_string("inIPRange", &args[0])?;
    let cidr = as_string("inIPRange", &args[1])?;
    let ip: IpAddr = ip_str.parse().map_err(|_| ExprError::Type {
        message: format!("invalid IP address '{ip_str}'"),
    })?;
    let (network, prefix_len) = cidr.split_once('/').ok_or_else(|| ExprError::Type {
        message: format!("invalid CIDR range '{cidr}'"),
    })?;
    let network: IpAddr = network.parse().map_err(|_| ExprError::Type {
        message: format!("invalid CIDR network '{network}'"),
    })?;
    let prefix_len: u32 = prefix_len.parse().map_err(|_| ExprError::Type {
        message: format!("invalid CIDR prefix '{prefix_len}'"),
    })?;
    Ok(Value::Bool(ip_in_range(ip, network, prefix_len)))
}

fn ip_in_range(ip: IpAddr, network: IpAddr, prefix_len: u32) -> bool {
    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
            (u32::from(ip) & mask) == (u32::from(net) & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) => {
            if prefix_len > 128 {
                return false;
            }
            let mask = if prefix_len == 0 { 0 } else { u128::MAX << (128 - prefix_len) };
            (u128::from(ip) & mask) == (u128::from(net) & mask)
        }
        _ => false,
    }
}

fn now(args: &[Value]) -> Result<Value> {
    if !args.is_empty() {
        return Err(arity_error("now", 0, args.len()));
    }
    Ok(Value::Int(chrono::Utc::now().timestamp_millis()))
}

/// Returns the dot-separated ancestor chain of a scope string, from the
/// root down to the scope itself, e.g. `"acme.corp.eng"` ->
/// `["acme", "acme.corp", "acme.corp.eng"]`.
fn hierarchy(args: &[Value]) -> Result<Value> {
    if args.len() != 1 {
        return Err(arity_error("hierarchy", 1, args.len()));
    }
    let scope = as_string("hierarchy", &args[0])?;
    if scope.is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    let segments: Vec<&str> = scope.split('.').collect();
    let chain = (1..=segments.len())
        .map(|n| Value::String(segments[..n].join(".")))
        .collect();
    Ok(Value::Array(chain))
}

/// Checks whether `permission` appears in a principal's `permissions`
/// attribute list, the simplest allow-list membership test a condition can
/// express without reaching into the policy catalog itself.
fn has_permission(args: &[Value]) -> Result<Value> {
    if args.len() != 2 {
        return Err(arity_error("hasPermission", 2, args.len()));
    }
    let permission = as_string("hasPermission", &args[1])?;
    match &args[0] {
        Value::Array(items) => Ok(Value::Bool(
            items.iter().any(|v| v.as_str() == Some(permission)),
        )),
        other => Err(type_error("hasPermission", "array of permission names", other)),
    }
}
