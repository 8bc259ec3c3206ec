//! Opaque search predicates.
//!
//! A `Domain` is a predicate in the remote store's own expression language,
//! carried as JSON and passed through to the transport unexamined. The engine
//! builds only the equality conjunctions it needs for schema discovery;
//! anything richer is composed by the caller (or a dedicated expression
//! builder) and handed over as-is.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Opaque domain expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(Value);

impl Domain {
    /// Wraps a raw expression. The value is not validated; the remote store
    /// is the sole interpreter.
    #[must_use]
    pub fn new(expr: Value) -> Self {
        Self(expr)
    }

    /// `field = value` predicate.
    #[must_use]
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self(json!([[field, "=", value.into()]]))
    }

    /// `field in values` predicate.
    #[must_use]
    pub fn r#in(field: &str, values: impl IntoIterator<Item = impl Into<Value>>) -> Self {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Self(json!([[field, "in", values]]))
    }

    /// Conjunction of several domains (clause lists are concatenated, which
    /// is the store's implicit AND).
    #[must_use]
    pub fn and(domains: impl IntoIterator<Item = Self>) -> Self {
        let mut clauses = Vec::new();
        for domain in domains {
            match domain.0 {
                Value::Array(items) => clauses.extend(items),
                other => clauses.push(other),
            }
        }
        Self(Value::Array(clauses))
    }

    /// The underlying JSON expression.
    #[must_use]
    pub const fn as_json(&self) -> &Value {
        &self.0
    }
}

impl From<Domain> for Value {
    fn from(domain: Domain) -> Self {
        domain.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_shape() {
        let domain = Domain::eq("model", "res.partner");
        assert_eq!(domain.as_json(), &json!([["model", "=", "res.partner"]]));
    }

    #[test]
    fn test_and_concatenates_clauses() {
        let domain = Domain::and([Domain::eq("a", 1), Domain::eq("b", 2)]);
        assert_eq!(domain.as_json(), &json!([["a", "=", 1], ["b", "=", 2]]));
    }

    #[test]
    fn test_in_shape() {
        let domain = Domain::r#in("id", [1, 2, 3]);
        assert_eq!(domain.as_json(), &json!([["id", "in", [1, 2, 3]]]));
    }

    #[test]
    fn test_opaque_passthrough() {
        let raw = json!([["name", "like", "Alice%"], ["active", "=", true]]);
        let domain = Domain::new(raw.clone());
        assert_eq!(domain.as_json(), &raw);
    }
}
