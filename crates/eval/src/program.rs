//! Program interchange: loading predicates and a main sequence from JSON.
//!
//! Bundle shape:
//!
//! ```json
//! {
//!   "predicates": [
//!     { "name": "double",
//!       "params": [{ "type": "NUMERIC", "pattern": "n" }],
//!       "varargs": false,
//!       "modifiers": ["deletable", "overridable", "overloadable"],
//!       "body": [{ "invoke": "Mul", "args": [{ "var": "n" }, 2] }] }
//!   ],
//!   "main": [{ "invoke": "double", "args": [21] }]
//! }
//! ```
//!
//! Operations are objects keyed by their kind (`literal`, `var`,
//! `previous`, `invoke`, `quote`, `ref`, `assign`, `if`, `for`, `block`,
//! `enqueue`, `dequeue`, `graph`). Any non-object JSON value is a constant.
//!
//! Patterns: `"_"` is the wildcard, any other string a variable, arrays
//! are list patterns; objects are `{"list": [..], "rest": p}`,
//! `{"map": {..}}` or `{"literal": v}`; other scalars are literals.

use std::rc::Rc;

use crate::assign::AssignmentOperation;
use crate::context::Modifiers;
use crate::control::{ForOperation, IfOperation};
use crate::error::EvalError;
use crate::invocable::Invocable;
use crate::invoke::InvokeOperation;
use crate::operation::{
    Block, Constant, Dequeue, Enqueue, InvocableRef, MakeInvocation, OperationRef,
    OperationSequence, PreviousResult, Variable,
};
use crate::signature::{FormalParameter, Signature, Type};
use crate::unify::Pattern;
use crate::value::{Graph, Value};

type Json = serde_json::Value;

/// One predicate declaration from a bundle.
#[derive(Debug, Clone)]
pub struct PredicateDecl {
    pub name: String,
    pub signature: Signature,
    pub modifiers: Modifiers,
    pub body: Rc<OperationSequence>,
}

impl PredicateDecl {
    pub fn to_invocable(&self) -> Rc<Invocable> {
        Rc::new(Invocable::sequence(
            self.name.clone(),
            self.signature.clone(),
            Rc::clone(&self.body),
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Program {
    pub predicates: Vec<PredicateDecl>,
    pub main: OperationSequence,
}

impl Program {
    /// Parse bundle text.
    pub fn parse(text: &str) -> Result<Program, EvalError> {
        let json: Json = serde_json::from_str(text)
            .map_err(|e| EvalError::load(format!("invalid JSON: {}", e)))?;
        Program::from_json(&json)
    }

    pub fn from_json(v: &Json) -> Result<Program, EvalError> {
        let obj = v
            .as_object()
            .ok_or_else(|| EvalError::load("program must be a JSON object"))?;

        let predicates = match obj.get("predicates") {
            Some(list) => list
                .as_array()
                .ok_or_else(|| EvalError::load("'predicates' must be an array"))?
                .iter()
                .map(parse_predicate)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let main = match obj.get("main") {
            Some(ops) => parse_sequence(ops, "main")?,
            None => OperationSequence::default(),
        };
        Ok(Program { predicates, main })
    }
}

// ──────────────────────────────────────────────
// Predicates and signatures
// ──────────────────────────────────────────────

fn parse_predicate(v: &Json) -> Result<PredicateDecl, EvalError> {
    let obj = v
        .as_object()
        .ok_or_else(|| EvalError::load(format!("predicate must be an object: {}", v)))?;
    let name = obj
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| EvalError::load("predicate is missing a 'name' string"))?
        .to_string();

    let params = match obj.get("params") {
        Some(Json::Array(items)) => items
            .iter()
            .map(|p| parse_param(&name, p))
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(EvalError::load(format!(
                "'params' of '{}' must be an array, got {}",
                name, other
            )))
        }
        None => Vec::new(),
    };
    let variadic = obj.get("varargs").and_then(Json::as_bool).unwrap_or(false);
    let signature = if variadic {
        Signature::varargs(params)
    } else {
        Signature::new(params)
    };

    let modifiers = match obj.get("modifiers") {
        Some(Json::Array(names)) => {
            let names: Vec<&str> = names.iter().filter_map(Json::as_str).collect();
            Modifiers::from_names(names.iter().copied()).ok_or_else(|| {
                EvalError::load(format!("unknown modifier in {:?} of '{}'", names, name))
            })?
        }
        Some(other) => {
            return Err(EvalError::load(format!(
                "'modifiers' of '{}' must be an array, got {}",
                name, other
            )))
        }
        None => Modifiers::user_default(),
    };

    let body = match obj.get("body") {
        Some(ops) => parse_sequence(ops, &name)?,
        None => OperationSequence::default(),
    };

    Ok(PredicateDecl {
        name,
        signature,
        modifiers,
        body: Rc::new(body),
    })
}

fn parse_param(predicate: &str, v: &Json) -> Result<FormalParameter, EvalError> {
    match v {
        Json::String(name) => Ok(FormalParameter::new(Type::Any, variable_or_wildcard(name))),
        Json::Object(obj) => {
            let ty = match obj.get("type").and_then(Json::as_str) {
                Some(name) => Type::from_name(name).ok_or_else(|| {
                    EvalError::load(format!("unknown type '{}' in '{}'", name, predicate))
                })?,
                None => Type::Any,
            };
            let pattern = obj
                .get("pattern")
                .ok_or_else(|| EvalError::load(format!("parameter of '{}' has no pattern", predicate)))?;
            Ok(FormalParameter::new(ty, parse_pattern(pattern)?))
        }
        other => Err(EvalError::load(format!(
            "parameter of '{}' must be a name or an object, got {}",
            predicate, other
        ))),
    }
}

// ──────────────────────────────────────────────
// Patterns
// ──────────────────────────────────────────────

fn variable_or_wildcard(name: &str) -> Pattern {
    if name == "_" {
        Pattern::Wildcard
    } else {
        Pattern::var(name)
    }
}

pub fn parse_pattern(v: &Json) -> Result<Pattern, EvalError> {
    match v {
        Json::String(name) => Ok(variable_or_wildcard(name)),
        Json::Array(items) => Ok(Pattern::List {
            items: items.iter().map(parse_pattern).collect::<Result<_, _>>()?,
            rest: None,
        }),
        Json::Object(obj) => {
            if let Some(literal) = obj.get("literal") {
                return Ok(Pattern::Literal(Value::from_json(literal)));
            }
            if let Some(items) = obj.get("list") {
                let items = items
                    .as_array()
                    .ok_or_else(|| EvalError::load("'list' pattern must be an array"))?
                    .iter()
                    .map(parse_pattern)
                    .collect::<Result<_, _>>()?;
                let rest = match obj.get("rest") {
                    Some(rest) => Some(Box::new(parse_pattern(rest)?)),
                    None => None,
                };
                return Ok(Pattern::List { items, rest });
            }
            if let Some(entries) = obj.get("map") {
                let entries = entries
                    .as_object()
                    .ok_or_else(|| EvalError::load("'map' pattern must be an object"))?
                    .iter()
                    .map(|(k, p)| Ok((k.clone(), parse_pattern(p)?)))
                    .collect::<Result<_, EvalError>>()?;
                return Ok(Pattern::Map { entries });
            }
            Err(EvalError::load(format!("unrecognised pattern: {}", v)))
        }
        scalar => Ok(Pattern::Literal(Value::from_json(scalar))),
    }
}

// ──────────────────────────────────────────────
// Operations
// ──────────────────────────────────────────────

fn parse_sequence(v: &Json, owner: &str) -> Result<OperationSequence, EvalError> {
    let ops = v
        .as_array()
        .ok_or_else(|| EvalError::load(format!("body of '{}' must be an array", owner)))?;
    let ops = ops
        .iter()
        .map(parse_operation)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(OperationSequence::new(ops))
}

fn parse_arguments(v: Option<&Json>) -> Result<Vec<OperationRef>, EvalError> {
    match v {
        Some(Json::Array(args)) => args.iter().map(parse_operation).collect(),
        Some(other) => Err(EvalError::load(format!("'args' must be an array, got {}", other))),
        None => Ok(Vec::new()),
    }
}

fn required_str<'a>(obj: &'a serde_json::Map<String, Json>, key: &str) -> Result<&'a str, EvalError> {
    obj.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| EvalError::load(format!("'{}' must be a string", key)))
}

pub fn parse_operation(v: &Json) -> Result<OperationRef, EvalError> {
    let obj = match v {
        Json::Object(obj) => obj,
        constant => return Ok(Rc::new(Constant::new(Value::from_json(constant)))),
    };

    if let Some(literal) = obj.get("literal") {
        return Ok(Rc::new(Constant::new(Value::from_json(literal))));
    }
    if obj.contains_key("var") {
        return Ok(Rc::new(Variable::new(required_str(obj, "var")?)));
    }
    if obj.contains_key("previous") {
        return Ok(Rc::new(PreviousResult));
    }
    if obj.contains_key("invoke") {
        let target = required_str(obj, "invoke")?;
        let arguments = parse_arguments(obj.get("args"))?;
        let destination = match obj.get("into") {
            Some(Json::String(name)) => Some(name.clone()),
            Some(other) => {
                return Err(EvalError::load(format!("'into' must be a string, got {}", other)))
            }
            None => None,
        };
        return Ok(Rc::new(InvokeOperation::new(target, arguments, destination)));
    }
    if obj.contains_key("quote") {
        return Ok(Rc::new(MakeInvocation {
            target: required_str(obj, "quote")?.to_string(),
            arguments: parse_arguments(obj.get("args"))?,
        }));
    }
    if obj.contains_key("ref") {
        return Ok(Rc::new(InvocableRef {
            name: required_str(obj, "ref")?.to_string(),
        }));
    }
    if let Some(pattern) = obj.get("assign") {
        let source = match obj.get("from") {
            Some(source) => Some(parse_operation(source)?),
            None => None,
        };
        return Ok(Rc::new(AssignmentOperation::new(parse_pattern(pattern)?, source)));
    }
    if let Some(condition) = obj.get("if") {
        let condition = parse_operation(condition)?;
        let then_branch = match obj.get("then") {
            Some(ops) => Some(parse_sequence(ops, "then")?),
            None => None,
        };
        let else_branch = match obj.get("else") {
            Some(ops) => Some(parse_sequence(ops, "else")?),
            None => None,
        };
        return Ok(Rc::new(IfOperation {
            condition,
            then_branch,
            else_branch,
        }));
    }
    if obj.contains_key("for") {
        let variable = required_str(obj, "for")?.to_string();
        let source = obj
            .get("in")
            .ok_or_else(|| EvalError::load(format!("'for {}' has no 'in' source", variable)))?;
        let body = match obj.get("do") {
            Some(ops) => parse_sequence(ops, "for")?,
            None => OperationSequence::default(),
        };
        return Ok(Rc::new(ForOperation {
            variable,
            source: parse_operation(source)?,
            body,
        }));
    }
    if let Some(ops) = obj.get("block") {
        return Ok(Rc::new(Block::new(parse_sequence(ops, "block")?)));
    }
    if let Some(source) = obj.get("enqueue") {
        return Ok(Rc::new(Enqueue {
            source: parse_operation(source)?,
        }));
    }
    if obj.contains_key("dequeue") {
        return Ok(Rc::new(Dequeue));
    }
    if let Some(encoded) = obj.get("graph") {
        return Ok(Rc::new(Constant::new(Value::graph(Graph::from_json(encoded)?))));
    }

    Err(EvalError::load(format!("unrecognised operation: {}", v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_predicates_and_main() {
        let program = Program::from_json(&json!({
            "predicates": [{
                "name": "double",
                "params": [{"type": "numeric", "pattern": "n"}],
                "body": [{"invoke": "Mul", "args": [{"var": "n"}, 2]}]
            }],
            "main": [{"invoke": "double", "args": [21], "into": "r"}]
        }))
        .unwrap();
        assert_eq!(program.predicates.len(), 1);
        let decl = &program.predicates[0];
        assert_eq!(decl.signature.to_string(), "(NUMERIC n)");
        assert_eq!(decl.modifiers, Modifiers::user_default());
        assert_eq!(program.main.describe(), "{ double(21) -> r }");
    }

    #[test]
    fn pattern_forms() {
        let p = parse_pattern(&json!({"list": ["h", "_"], "rest": "t"})).unwrap();
        assert_eq!(p.to_string(), "[h, _ | t]");
        let p = parse_pattern(&json!({"map": {"k": {"literal": "v"}}})).unwrap();
        assert_eq!(p.to_string(), "{\"k\": \"v\"}");
        assert!(matches!(parse_pattern(&json!(3)).unwrap(), Pattern::Literal(_)));
        assert!(parse_pattern(&json!({"what": 1})).is_err());
    }

    #[test]
    fn varargs_and_modifiers() {
        let program = Program::from_json(&json!({
            "predicates": [{
                "name": "g", "params": ["_"], "varargs": true, "modifiers": ["native"]
            }]
        }))
        .unwrap();
        let decl = &program.predicates[0];
        assert!(decl.signature.is_variadic());
        assert_eq!(decl.modifiers, Modifiers::NATIVE);
    }

    #[test]
    fn malformed_input_is_a_load_error() {
        for bad in [
            json!([]),
            json!({"predicates": [{"params": []}]}),
            json!({"predicates": [{"name": "f", "params": [{"type": "DATE", "pattern": "d"}]}]}),
            json!({"predicates": [{"name": "f", "modifiers": ["frozen"]}]}),
            json!({"main": [{"unknown": 1}]}),
            json!({"main": [{"invoke": 3}]}),
        ] {
            let err = Program::from_json(&bad).unwrap_err();
            assert!(matches!(err, EvalError::Load { .. }), "{} gave {:?}", bad, err);
        }
    }

    #[test]
    fn scalars_and_arrays_are_constants() {
        let seq = parse_sequence(&json!([1, "text", [1, 2], {"literal": {"a": 1}}]), "t").unwrap();
        assert_eq!(seq.describe(), "{ 1; \"text\"; [1,2]; {\"a\":1} }");
    }
}
