//! Formal parameters, signatures and argument binding.
//!
//! A [`Signature`] turns a vector of actual values into a fresh
//! [`SignatureContextMap`]: each formal's pattern is unified against its
//! actual, every bound variable is coerced to the formal's [`Type`], and a
//! variadic signature captures the remaining actuals under
//! [`VARARGS_KEY`].

use std::fmt;

use crate::binding::{SignatureContextMap, VARARGS_KEY};
use crate::error::{EvalError, UnifyError};
use crate::unify::{Pattern, Unifier};
use crate::value::Value;

// ──────────────────────────────────────────────
// Coercion types
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Any,
    Boolean,
    Numeric,
    String,
    List,
    Map,
    Json,
    Graph,
}

impl Type {
    pub fn name(self) -> &'static str {
        match self {
            Type::Any => "ANY",
            Type::Boolean => "BOOLEAN",
            Type::Numeric => "NUMERIC",
            Type::String => "STRING",
            Type::List => "LIST",
            Type::Map => "MAP",
            Type::Json => "JSON",
            Type::Graph => "GRAPH",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Type> {
        let ty = match name.to_ascii_uppercase().as_str() {
            "ANY" => Type::Any,
            "BOOLEAN" => Type::Boolean,
            "NUMERIC" => Type::Numeric,
            "STRING" => Type::String,
            "LIST" => Type::List,
            "MAP" => Type::Map,
            "JSON" => Type::Json,
            "GRAPH" => Type::Graph,
            _ => return None,
        };
        Some(ty)
    }

    /// Whether an actual value of this kind may be passed to a formal of
    /// this type. Json wrappers are looked through.
    pub fn accepts(self, value: &Value) -> bool {
        let value = value.unwrap_json();
        match self {
            Type::Any => true,
            Type::Boolean => matches!(value, Value::Boolean(_)),
            Type::Numeric => matches!(value, Value::Numeric(_)),
            Type::String => matches!(value, Value::String(_)),
            Type::List => matches!(value, Value::List(_)),
            Type::Map => matches!(value, Value::Map(_)),
            Type::Json => value.is_json_capable(),
            Type::Graph => matches!(value, Value::Graph(_)),
        }
    }

    pub fn coerce(self, value: &Value) -> Result<Value, EvalError> {
        let coerced = match self {
            Type::Any => value.clone(),
            Type::Boolean => Value::Boolean(value.as_boolean()),
            Type::Numeric => Value::Numeric(value.as_numeric()),
            Type::String if value.is_null() => Value::String(None),
            Type::String => Value::string(value.as_string()),
            Type::List => Value::List(value.as_list()),
            Type::Map => Value::Map(value.as_map()),
            Type::Json => value.as_json()?,
            Type::Graph => Value::Graph(value.as_graph()),
        };
        Ok(coerced)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ──────────────────────────────────────────────
// Formal parameters
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FormalParameter {
    pub ty: Type,
    pub pattern: Pattern,
}

impl FormalParameter {
    pub fn new(ty: Type, pattern: Pattern) -> Self {
        FormalParameter { ty, pattern }
    }

    /// A typed parameter bound to a single variable.
    pub fn named(ty: Type, name: impl Into<String>) -> Self {
        FormalParameter::new(ty, Pattern::var(name))
    }

    pub fn describe(&self) -> String {
        match self.ty {
            Type::Any => self.pattern.to_string(),
            ty => format!("{} {}", ty, self.pattern),
        }
    }
}

// ──────────────────────────────────────────────
// Signature
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Signature {
    params: Vec<FormalParameter>,
    variadic: bool,
}

impl Signature {
    pub fn new(params: Vec<FormalParameter>) -> Self {
        Signature {
            params,
            variadic: false,
        }
    }

    /// Fixed prefix followed by a captured tail of any length.
    pub fn varargs(params: Vec<FormalParameter>) -> Self {
        Signature {
            params,
            variadic: true,
        }
    }

    pub fn empty() -> Self {
        Signature::default()
    }

    pub fn params(&self) -> &[FormalParameter] {
        &self.params
    }

    /// Number of fixed formals.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Bind `values` to a fresh table. The fixed prefix is unified first,
    /// then the tail is captured; any failure discards the whole table.
    pub fn unify(
        &self,
        unifier: &dyn Unifier,
        values: &[Value],
    ) -> Result<SignatureContextMap, EvalError> {
        let fits = if self.variadic {
            values.len() >= self.params.len()
        } else {
            values.len() == self.params.len()
        };
        if !fits {
            return Err(EvalError::ArityMismatch {
                expected: self.params.len(),
                got: values.len(),
                variadic: self.variadic,
            });
        }

        let mut table = SignatureContextMap::new();
        for (index, (param, value)) in self.params.iter().zip(values).enumerate() {
            if !param.ty.accepts(value) {
                return Err(EvalError::ParameterType {
                    index,
                    expected: param.ty.name().to_string(),
                    got: value.type_name().to_string(),
                });
            }
            for (name, bound) in unifier.unify(&param.pattern, value)? {
                let coerced = param.ty.coerce(&bound)?;
                match table.get(&name) {
                    Some(existing) if !existing.equals_to(&coerced) => {
                        return Err(EvalError::Unification(UnifyError::new(format!(
                            "variable '{}' is bound to {} and cannot also be {}",
                            name, existing, coerced
                        ))));
                    }
                    Some(_) => {}
                    None => table.add(name, coerced, false)?,
                }
            }
        }

        if self.variadic {
            let tail = values[self.params.len()..].to_vec();
            table.add(VARARGS_KEY, Value::list(tail), true)?;
        }
        Ok(table)
    }

    /// Every name a successful [`Signature::unify`] binds.
    pub fn variables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for param in &self.params {
            for name in param.pattern.variables() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        if self.variadic {
            names.push(VARARGS_KEY.to_string());
        }
        names
    }

    /// Same calling convention: formal types and pattern shapes match
    /// position by position. Variable names are not significant.
    pub fn same_as(&self, other: &Signature) -> bool {
        self.variadic == other.variadic
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a.ty == b.ty && a.pattern.same_shape(&b.pattern))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&param.describe())?;
        }
        if self.variadic {
            if !self.params.is_empty() {
                f.write_str(", ")?;
            }
            f.write_str("...")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unify::StructuralUnifier;
    use serde_json::json;

    fn numeric_n() -> Signature {
        Signature::new(vec![FormalParameter::named(Type::Numeric, "n")])
    }

    #[test]
    fn typed_formal_rejects_other_kinds() {
        let err = numeric_n()
            .unify(&StructuralUnifier, &[Value::Boolean(true)])
            .unwrap_err();
        assert_eq!(
            err,
            EvalError::ParameterType {
                index: 0,
                expected: "NUMERIC".to_string(),
                got: "boolean".to_string(),
            }
        );
    }

    #[test]
    fn arity_is_checked_before_unification() {
        let err = numeric_n().unify(&StructuralUnifier, &[]).unwrap_err();
        assert!(matches!(err, EvalError::ArityMismatch { expected: 1, got: 0, .. }));
    }

    #[test]
    fn json_wrapped_actual_is_accepted_and_coerced() {
        let wrapped = Value::Numeric(3.0).as_json().unwrap();
        let table = numeric_n().unify(&StructuralUnifier, &[wrapped]).unwrap();
        assert!(matches!(table.get("n"), Some(Value::Numeric(n)) if *n == 3.0));
    }

    #[test]
    fn varargs_capture_tail() {
        let sig = Signature::varargs(vec![FormalParameter::named(Type::Any, "first")]);
        let args = [Value::from(1), Value::from(2), Value::from(3)];
        let table = sig.unify(&StructuralUnifier, &args).unwrap();
        assert_eq!(table.get("first"), Some(&Value::from(1)));
        assert_eq!(table.varargs(), vec![Value::from(2), Value::from(3)]);

        let err = sig.unify(&StructuralUnifier, &[]).unwrap_err();
        assert_eq!(err.to_string(), "expected at least 1 argument(s), got 0");
    }

    #[test]
    fn empty_varargs_binds_empty_list() {
        let sig = Signature::varargs(Vec::new());
        let table = sig.unify(&StructuralUnifier, &[]).unwrap();
        assert!(table.contains(VARARGS_KEY));
        assert!(table.varargs().is_empty());
    }

    #[test]
    fn repeated_variable_across_formals_must_agree() {
        let sig = Signature::new(vec![
            FormalParameter::named(Type::Any, "x"),
            FormalParameter::named(Type::Any, "x"),
        ]);
        assert!(sig
            .unify(&StructuralUnifier, &[Value::from(1), Value::from(1)])
            .is_ok());
        let err = sig
            .unify(&StructuralUnifier, &[Value::from(1), Value::from(2)])
            .unwrap_err();
        assert!(matches!(err, EvalError::Unification(_)));
    }

    #[test]
    fn destructuring_formal() {
        let sig = Signature::new(vec![FormalParameter::new(
            Type::Any,
            Pattern::List {
                items: vec![Pattern::var("h")],
                rest: Some(Box::new(Pattern::var("t"))),
            },
        )]);
        let table = sig
            .unify(&StructuralUnifier, &[Value::from_json(&json!(["a", "b"]))])
            .unwrap();
        assert_eq!(table.string_at(0).unwrap(), "a");
        assert_eq!(table.get("t"), Some(&Value::from_json(&json!(["b"]))));
    }

    #[test]
    fn same_as_ignores_names_but_not_types() {
        let other = Signature::new(vec![FormalParameter::named(Type::Numeric, "m")]);
        assert!(numeric_n().same_as(&other));
        let string = Signature::new(vec![FormalParameter::named(Type::String, "n")]);
        assert!(!numeric_n().same_as(&string));
        assert!(!numeric_n().same_as(&Signature::varargs(vec![FormalParameter::named(
            Type::Numeric,
            "n"
        )])));
    }

    #[test]
    fn display_lists_formals() {
        let sig = Signature::varargs(vec![
            FormalParameter::named(Type::Numeric, "n"),
            FormalParameter::named(Type::Any, "rest"),
        ]);
        assert_eq!(sig.to_string(), "(NUMERIC n, rest, ...)");
        assert_eq!(Signature::varargs(Vec::new()).to_string(), "(...)");
        assert_eq!(sig.variables(), vec!["n", "rest", VARARGS_KEY]);
    }
}
