//! Evaluation context: the variable bindings visible to a condition
//! expression.
//!
//! Mirrors the principal/resource/request/variables/auxData aliasing that
//! policy conditions are written against: `P` and `principal` both resolve
//! to the requesting principal, `R`/`resource` to the target resource, and
//! so on, so policy authors can use either the short or the descriptive
//! spelling.

use crate::types::{Attributes, Principal, Resource, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    variables: HashMap<String, Value>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self {
            variables: HashMap::new(),
        }
    }

    pub fn with_principal(mut self, principal: &Principal) -> Self {
        let value = principal_value(principal);
        self.variables.insert("P".into(), value.clone());
        self.variables.insert("principal".into(), value);
        self
    }

    pub fn with_resource(mut self, resource: &Resource) -> Self {
        let value = resource_value(resource);
        self.variables.insert("R".into(), value.clone());
        self.variables.insert("resource".into(), value);
        self
    }

    pub fn with_request(mut self, action: &str, extra: Attributes) -> Self {
        let mut map = HashMap::new();
        map.insert("action".to_string(), Value::String(action.to_string()));
        for (k, v) in extra {
            map.insert(k, v);
        }
        self.variables.insert("request".into(), Value::Object(map));
        self
    }

    pub fn with_aux_data(mut self, aux_data: Attributes) -> Self {
        let value = Value::Object(aux_data);
        self.variables.insert("A".into(), value.clone());
        self.variables.insert("auxData".into(), value);
        self
    }

    pub fn with_variables(mut self, variables: Attributes) -> Self {
        let value = Value::Object(variables);
        self.variables.insert("V".into(), value.clone());
        self.variables.insert("variables".into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

fn principal_value(principal: &Principal) -> Value {
    let mut map = HashMap::new();
    map.insert("id".to_string(), Value::String(principal.id.clone()));
    map.insert(
        "roles".to_string(),
        Value::Array(principal.roles.iter().cloned().map(Value::String).collect()),
    );
    map.insert(
        "attributes".to_string(),
        Value::Object(principal.attributes.clone()),
    );
    map.insert("scope".to_string(), Value::String(principal.scope.clone()));
    Value::Object(map)
}

fn resource_value(resource: &Resource) -> Value {
    let mut map = HashMap::new();
    map.insert("kind".to_string(), Value::String(resource.kind.clone()));
    map.insert("id".to_string(), Value::String(resource.id.clone()));
    map.insert(
        "attributes".to_string(),
        Value::Object(resource.attributes.clone()),
    );
    map.insert("scope".to_string(), Value::String(resource.scope.clone()));
    Value::Object(map)
}
