//! Core data model: principals, resources, requests, decisions, and the
//! structured attribute value type shared by the evaluator and the policy
//! model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique policy identifier (the `metadata.name` of the document it came
/// from, qualified by kind).
pub type PolicyId = String;

/// A derived or base role name.
pub type RoleId = String;

/// A single attribute or context value.
///
/// Policy documents and requests carry loosely-typed JSON-ish data; rather
/// than threading `serde_json::Value` through the evaluator directly, we use
/// our own sum type so the evaluator's type errors are defined independently
/// of `serde_json`'s representation choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(m) => {
                Value::Object(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::from(i),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(a) => serde_json::Value::Array(a.into_iter().map(Into::into).collect()),
            Value::Object(m) => {
                serde_json::Value::Object(m.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// A map of string-keyed attribute values, the shape carried by principals,
/// resources, and request auxiliary data.
pub type Attributes = HashMap<String, Value>;

/// The principal making a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub attributes: Attributes,
    /// Dot-separated hierarchical scope, e.g. `"acme.corp.eng"`.
    #[serde(default)]
    pub scope: String,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            attributes: Attributes::new(),
            scope: String::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

/// The resource a request targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub scope: String,
}

impl Resource {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            attributes: Attributes::new(),
            scope: String::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

/// A decision request: one principal, one resource, and one or more actions
/// to check in a single call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(rename = "requestId", default)]
    pub request_id: String,
    pub principal: Principal,
    pub resource: Resource,
    pub actions: Vec<String>,
    #[serde(rename = "auxData", default)]
    pub aux_data: Attributes,
}

/// Effect of a decision: canonical spelling is lower-case `allow`/`deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

impl Effect {
    pub fn is_allow(self) -> bool {
        matches!(self, Effect::Allow)
    }
}

/// Metadata explaining how a single action's decision was reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionMeta {
    /// Identifier of the policy that produced the effect, if any matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyId>,
    /// Roles (base + derived) the principal held for this decision.
    pub resolved_roles: Vec<RoleId>,
    /// Human-readable explanation of why the effect was chosen.
    pub reason: String,
}

/// The outcome for a single action within a `CheckRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: String,
    pub effect: Effect,
    pub meta: DecisionMeta,
}

impl Decision {
    pub fn allow(action: impl Into<String>, policy: Option<PolicyId>, reason: impl Into<String>, resolved_roles: Vec<RoleId>) -> Self {
        Self {
            action: action.into(),
            effect: Effect::Allow,
            meta: DecisionMeta {
                policy,
                resolved_roles,
                reason: reason.into(),
            },
        }
    }

    pub fn deny(action: impl Into<String>, policy: Option<PolicyId>, reason: impl Into<String>, resolved_roles: Vec<RoleId>) -> Self {
        Self {
            action: action.into(),
            effect: Effect::Deny,
            meta: DecisionMeta {
                policy,
                resolved_roles,
                reason: reason.into(),
            },
        }
    }
}

/// The response to a `CheckRequest`: one decision per requested action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub results: HashMap<String, Decision>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_builder_roundtrips_attributes() {
        let principal = Principal::new("user:alice")
            .with_role("employee")
            .with_attribute("department", "engineering")
            .with_scope("acme.corp.eng");

        assert_eq!(principal.id, "user:alice");
        assert_eq!(principal.roles, vec!["employee".to_string()]);
        assert_eq!(
            principal.attributes.get("department"),
            Some(&Value::String("engineering".to_string()))
        );
        assert_eq!(principal.scope, "acme.corp.eng");
    }

    #[test]
    fn resource_builder_sets_kind_and_id() {
        let resource = Resource::new("document", "123").with_attribute("ownerId", "alice");
        assert_eq!(resource.kind, "document");
        assert_eq!(resource.id, "123");
        assert_eq!(
            resource.attributes.get("ownerId"),
            Some(&Value::String("alice".to_string()))
        );
    }

    #[test]
    fn value_json_roundtrip_preserves_shape() {
        let json = serde_json::json!({"a": 1, "b": [true, null, "x"]});
        let value: Value = json.clone().into();
        let back: serde_json::Value = value.into();
        assert_eq!(json, back);
    }

    #[test]
    fn decision_effect_serializes_lowercase() {
        let decision = Decision::allow("read", Some("policy-1".to_string()), "matched rule", vec![]);
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["effect"], "allow");
    }
}
