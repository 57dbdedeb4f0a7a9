//! Destructuring patterns and the unifier contract.
//!
//! The runtime never matches patterns itself: signatures and assignments
//! hand a `(pattern, value)` pair to a [`Unifier`] and thread the returned
//! bindings into a binding table. [`StructuralUnifier`] is the default
//! implementation installed in every new execution context.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::UnifyError;
use crate::value::Value;

/// Variable bindings produced by a successful unification, in first
/// occurrence order.
pub type Bindings = Vec<(String, Value)>;

#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches anything, binds nothing.
    Wildcard,
    /// Matches anything and binds it to the name.
    Variable(String),
    /// Matches values `equals_to` the literal.
    Literal(Value),
    /// Matches a list element-wise; with `rest`, the remaining tail is
    /// unified against it as a list.
    List {
        items: Vec<Pattern>,
        rest: Option<Box<Pattern>>,
    },
    /// Matches a map containing every listed key. Extra keys are allowed.
    Map { entries: Vec<(String, Pattern)> },
}

impl Pattern {
    pub fn var(name: impl Into<String>) -> Pattern {
        Pattern::Variable(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Pattern {
        Pattern::Literal(value.into())
    }

    /// Variables bound by this pattern, deduplicated, in first occurrence
    /// order.
    pub fn variables(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        self.collect_variables(&mut seen, &mut out);
        out
    }

    fn collect_variables(&self, seen: &mut BTreeSet<String>, out: &mut Vec<String>) {
        match self {
            Pattern::Wildcard | Pattern::Literal(_) => {}
            Pattern::Variable(name) => {
                if seen.insert(name.clone()) {
                    out.push(name.clone());
                }
            }
            Pattern::List { items, rest } => {
                for item in items {
                    item.collect_variables(seen, out);
                }
                if let Some(rest) = rest {
                    rest.collect_variables(seen, out);
                }
            }
            Pattern::Map { entries } => {
                for (_, p) in entries {
                    p.collect_variables(seen, out);
                }
            }
        }
    }

    /// Structural equivalence up to variable renaming. A variable and a
    /// wildcard accept the same values and are considered equivalent.
    pub fn same_shape(&self, other: &Pattern) -> bool {
        match (self, other) {
            (
                Pattern::Wildcard | Pattern::Variable(_),
                Pattern::Wildcard | Pattern::Variable(_),
            ) => true,
            (Pattern::Literal(a), Pattern::Literal(b)) => a.equals_to(b),
            (
                Pattern::List { items: a, rest: ra },
                Pattern::List { items: b, rest: rb },
            ) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(p, q)| p.same_shape(q))
                    && match (ra, rb) {
                        (None, None) => true,
                        (Some(p), Some(q)) => p.same_shape(q),
                        _ => false,
                    }
            }
            (Pattern::Map { entries: a }, Pattern::Map { entries: b }) => {
                a.len() == b.len()
                    && a.iter().all(|(k, p)| {
                        b.iter()
                            .find(|(j, _)| j == k)
                            .is_some_and(|(_, q)| p.same_shape(q))
                    })
            }
            _ => false,
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Wildcard => f.write_str("_"),
            Pattern::Variable(name) => f.write_str(name),
            Pattern::Literal(value) => write!(f, "{}", value),
            Pattern::List { items, rest } => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if let Some(rest) = rest {
                    write!(f, " | {}", rest)?;
                }
                f.write_str("]")
            }
            Pattern::Map { entries } => {
                f.write_str("{")?;
                for (i, (key, p)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "\"{}\": {}", key, p)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Pattern-vs-value matching.
pub trait Unifier: fmt::Debug {
    fn unify(&self, pattern: &Pattern, value: &Value) -> Result<Bindings, UnifyError>;
}

/// One-sided structural unification: patterns may contain variables,
/// values are ground. A variable seen twice must bind equal values.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralUnifier;

impl Unifier for StructuralUnifier {
    fn unify(&self, pattern: &Pattern, value: &Value) -> Result<Bindings, UnifyError> {
        let mut bindings = Vec::new();
        unify_into(pattern, value, &mut bindings)?;
        Ok(bindings)
    }
}

fn unify_into(pattern: &Pattern, value: &Value, bindings: &mut Bindings) -> Result<(), UnifyError> {
    let value = value.unwrap_json();
    match pattern {
        Pattern::Wildcard => Ok(()),

        Pattern::Variable(name) => bind(name, value, bindings),

        Pattern::Literal(expected) => {
            if expected.equals_to(value) {
                Ok(())
            } else {
                Err(UnifyError::new(format!(
                    "literal {} does not match {}",
                    expected, value
                )))
            }
        }

        Pattern::List { items, rest } => {
            let elements = match value {
                Value::List(list) => list.borrow().clone(),
                other => {
                    return Err(UnifyError::new(format!(
                        "expected a list, got {}",
                        other.type_name()
                    )))
                }
            };
            let fits = match rest {
                Some(_) => elements.len() >= items.len(),
                None => elements.len() == items.len(),
            };
            if !fits {
                return Err(UnifyError::new(format!(
                    "list of {} element(s) does not match pattern {}",
                    elements.len(),
                    pattern
                )));
            }
            for (p, v) in items.iter().zip(elements.iter()) {
                unify_into(p, v, bindings)?;
            }
            if let Some(rest) = rest {
                let tail = Value::list(elements[items.len()..].to_vec());
                unify_into(rest, &tail, bindings)?;
            }
            Ok(())
        }

        Pattern::Map { entries } => {
            let map = match value {
                Value::Map(map) => map.borrow().clone(),
                other => {
                    return Err(UnifyError::new(format!(
                        "expected a map, got {}",
                        other.type_name()
                    )))
                }
            };
            for (key, p) in entries {
                let v = map
                    .get(key)
                    .ok_or_else(|| UnifyError::new(format!("missing key '{}'", key)))?;
                unify_into(p, v, bindings)?;
            }
            Ok(())
        }
    }
}

fn bind(name: &str, value: &Value, bindings: &mut Bindings) -> Result<(), UnifyError> {
    match bindings.iter().find(|(n, _)| n == name) {
        Some((_, existing)) if existing.equals_to(value) => Ok(()),
        Some((_, existing)) => Err(UnifyError::new(format!(
            "variable '{}' is bound to {} and cannot also be {}",
            name, existing, value
        ))),
        None => {
            bindings.push((name.to_string(), value.clone()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unify(pattern: &Pattern, value: &Value) -> Result<Bindings, UnifyError> {
        StructuralUnifier.unify(pattern, value)
    }

    #[test]
    fn variable_binds_unwrapped_value() {
        let value = Value::Numeric(5.0).as_json().unwrap();
        let bindings = unify(&Pattern::var("x"), &value).unwrap();
        assert_eq!(bindings.len(), 1);
        assert!(matches!(bindings[0].1, Value::Numeric(n) if n == 5.0));
    }

    #[test]
    fn list_with_rest() {
        let pattern = Pattern::List {
            items: vec![Pattern::var("head")],
            rest: Some(Box::new(Pattern::var("tail"))),
        };
        let bindings = unify(&pattern, &Value::from_json(&json!([1, 2, 3]))).unwrap();
        assert_eq!(bindings[0], ("head".to_string(), Value::from(1)));
        assert_eq!(
            bindings[1],
            ("tail".to_string(), Value::from_json(&json!([2, 3])))
        );
        assert!(unify(&pattern, &Value::from_json(&json!([]))).is_err());
    }

    #[test]
    fn map_pattern_requires_listed_keys_only() {
        let pattern = Pattern::Map {
            entries: vec![
                ("kind".to_string(), Pattern::literal("circle")),
                ("r".to_string(), Pattern::var("r")),
            ],
        };
        let circle = Value::from_json(&json!({"kind": "circle", "r": 2, "color": "red"}));
        let bindings = unify(&pattern, &circle).unwrap();
        assert_eq!(bindings, vec![("r".to_string(), Value::from(2))]);

        let square = Value::from_json(&json!({"kind": "square", "side": 2}));
        assert!(unify(&pattern, &square).is_err());
    }

    #[test]
    fn repeated_variable_must_agree() {
        let pattern = Pattern::List {
            items: vec![Pattern::var("x"), Pattern::var("x")],
            rest: None,
        };
        assert!(unify(&pattern, &Value::from_json(&json!([4, 4]))).is_ok());
        let err = unify(&pattern, &Value::from_json(&json!([4, 5]))).unwrap_err();
        assert!(err.message.contains("variable 'x'"));
    }

    #[test]
    fn variables_are_deduplicated_in_order() {
        let pattern = Pattern::List {
            items: vec![Pattern::var("b"), Pattern::Wildcard, Pattern::var("a")],
            rest: Some(Box::new(Pattern::var("b"))),
        };
        assert_eq!(pattern.variables(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(pattern.to_string(), "[b, _, a | b]");
    }

    #[test]
    fn shape_ignores_variable_names() {
        assert!(Pattern::var("n").same_shape(&Pattern::var("m")));
        assert!(Pattern::var("n").same_shape(&Pattern::Wildcard));
        assert!(!Pattern::var("n").same_shape(&Pattern::literal(0)));
        assert!(Pattern::literal(0).same_shape(&Pattern::literal(0)));
    }
}
