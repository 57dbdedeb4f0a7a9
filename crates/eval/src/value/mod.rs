//! The polymorphic runtime value and its coercions.
//!
//! `Value` is a closed sum type: every kind implements every coercion via
//! exhaustive matches. Coercions are total; the only fallible conversions
//! are JSON rendering and deep cloning of the invocable kinds.
//!
//! Lists, maps and graphs are reference-mutable containers shared through
//! `Rc<RefCell<..>>`. Cloning a `Value` shares the container; use
//! [`Value::clone_value`] for a structurally independent copy.

pub mod graph;

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::EvalError;
use crate::invocable::Invocable;
use crate::invoke::InvokeOperation;

pub use graph::{Graph, Triple};

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<BTreeMap<String, Value>>>;
pub type GraphRef = Rc<RefCell<Graph>>;

pub const NULL: Value = Value::Null;
pub const TRUE: Value = Value::Boolean(true);
pub const FALSE: Value = Value::Boolean(false);

// Cross-kind comparisons coerce both sides to the higher-ranked kind.
const RANK_BOOLEAN: u8 = 1;
const RANK_NUMERIC: u8 = 2;
const RANK_STRING: u8 = 3;
const RANK_LIST: u8 = 4;
const RANK_MAP: u8 = 5;
const RANK_GRAPH: u8 = 6;

/// Runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Numeric(f64),
    /// String with a nullable payload; `String(None)` behaves like `Null`.
    String(Option<Rc<str>>),
    List(ListRef),
    Map(MapRef),
    /// Wrapper over a JSON-capable kind. Never wraps another `Json`.
    Json(Box<Value>),
    Graph(GraphRef),
    Invocable(Rc<Invocable>),
    Invocation(Rc<InvokeOperation>),
}

// ──────────────────────────────────────────────
// Construction
// ──────────────────────────────────────────────

impl Value {
    pub fn numeric(n: f64) -> Value {
        Value::Numeric(n)
    }

    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Some(Rc::from(s.as_ref())))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn graph(graph: Graph) -> Value {
        Value::Graph(Rc::new(RefCell::new(graph)))
    }

    /// Build a value tree from parsed JSON. Objects become maps and arrays
    /// become lists; the result is not Json-wrapped.
    pub fn from_json(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Numeric(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(obj) => Value::map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Parse JSON text into a value tree.
    pub fn parse_json(text: &str) -> Result<Value, EvalError> {
        let parsed: serde_json::Value =
            serde_json::from_str(text).map_err(|e| EvalError::invocation(format!("invalid JSON: {}", e)))?;
        Ok(Value::from_json(&parsed))
    }
}

// ──────────────────────────────────────────────
// Kind inspection
// ──────────────────────────────────────────────

impl Value {
    /// Name of the value's kind, as used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Numeric(_) => "numeric",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Json(_) => "json",
            Value::Graph(_) => "graph",
            Value::Invocable(_) => "invocable",
            Value::Invocation(_) => "invocation",
        }
    }

    /// The wrapped value for `Json`, `self` otherwise.
    pub fn unwrap_json(&self) -> &Value {
        match self {
            Value::Json(inner) => inner,
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.unwrap_json(), Value::Null | Value::String(None))
    }

    /// True for the kinds that have a native JSON form.
    pub fn is_json_capable(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Boolean(_)
                | Value::Numeric(_)
                | Value::String(_)
                | Value::List(_)
                | Value::Map(_)
                | Value::Json(_)
        )
    }

    pub fn is_integer(&self) -> bool {
        match self.unwrap_json() {
            Value::Numeric(n) => n.is_finite() && n.fract() == 0.0,
            _ => false,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self.unwrap_json(), Value::Numeric(n) if n.is_nan())
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self.unwrap_json(), Value::Numeric(n) if n.is_infinite())
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null | Value::Invocable(_) | Value::Invocation(_) => 0,
            Value::Boolean(_) => RANK_BOOLEAN,
            Value::Numeric(_) => RANK_NUMERIC,
            Value::String(_) => RANK_STRING,
            Value::List(_) => RANK_LIST,
            Value::Map(_) => RANK_MAP,
            Value::Graph(_) => RANK_GRAPH,
            Value::Json(inner) => inner.rank(),
        }
    }
}

// ──────────────────────────────────────────────
// Coercions
// ──────────────────────────────────────────────

impl Value {
    pub fn as_string(&self) -> String {
        match self {
            Value::Null | Value::String(None) => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Numeric(n) => format_numeric(*n),
            Value::String(Some(s)) => s.to_string(),
            Value::Json(inner) => inner.as_string(),
            Value::List(_) | Value::Map(_) | Value::Graph(_) => match self.render_json(false) {
                Ok(v) => v.to_string(),
                Err(_) => String::new(),
            },
            Value::Invocable(inv) => inv.describe(),
            Value::Invocation(call) => call.describe_call(),
        }
    }

    pub fn as_numeric(&self) -> f64 {
        match self {
            Value::Null | Value::String(None) => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Numeric(n) => *n,
            Value::String(Some(s)) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            Value::List(items) => items.borrow().len() as f64,
            Value::Map(entries) => entries.borrow().len() as f64,
            Value::Json(inner) => inner.as_numeric(),
            Value::Graph(g) => g.borrow().node_count() as f64,
            Value::Invocable(_) | Value::Invocation(_) => f64::NAN,
        }
    }

    pub fn as_boolean(&self) -> bool {
        match self {
            Value::Null | Value::String(None) => false,
            Value::Boolean(b) => *b,
            Value::Numeric(n) => *n != 0.0 && !n.is_nan(),
            Value::String(Some(s)) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("false") {
                    false
                } else {
                    s.parse::<f64>().map_or(true, |n| n != 0.0 && !n.is_nan())
                }
            }
            Value::List(items) => !items.borrow().is_empty(),
            Value::Map(entries) => !entries.borrow().is_empty(),
            Value::Json(inner) => inner.as_boolean(),
            Value::Graph(g) => !g.borrow().is_empty(),
            Value::Invocable(_) | Value::Invocation(_) => true,
        }
    }

    /// List view. A list returns its own (shared) storage; maps flatten to
    /// `[k1, v1, k2, v2, ...]`; graphs list their triples; scalars become a
    /// one-element list.
    pub fn as_list(&self) -> ListRef {
        match self {
            Value::List(items) => items.clone(),
            Value::Json(inner) => inner.as_list(),
            Value::Null | Value::String(None) => Rc::new(RefCell::new(Vec::new())),
            Value::Map(entries) => {
                let mut flat = Vec::with_capacity(entries.borrow().len() * 2);
                for (k, v) in entries.borrow().iter() {
                    flat.push(Value::string(k));
                    flat.push(v.clone());
                }
                Rc::new(RefCell::new(flat))
            }
            Value::Graph(g) => Rc::new(RefCell::new(g.borrow().to_list())),
            other => Rc::new(RefCell::new(vec![other.clone()])),
        }
    }

    /// Map view. Lists pair up alternating elements (a trailing key maps to
    /// `Null`), so `as_list().as_map()` and `as_map()` agree. Graphs give
    /// their adjacency map; scalars become `{as_string(): null}`.
    pub fn as_map(&self) -> MapRef {
        match self {
            Value::Map(entries) => entries.clone(),
            Value::Json(inner) => inner.as_map(),
            Value::Null | Value::String(None) => Rc::new(RefCell::new(BTreeMap::new())),
            Value::List(items) => {
                let items = items.borrow();
                let mut map = BTreeMap::new();
                for pair in items.chunks(2) {
                    let value = pair.get(1).cloned().unwrap_or(Value::Null);
                    map.insert(pair[0].as_string(), value);
                }
                Rc::new(RefCell::new(map))
            }
            Value::Graph(g) => Rc::new(RefCell::new(g.borrow().adjacency())),
            other => {
                let mut map = BTreeMap::new();
                map.insert(other.as_string(), Value::Null);
                Rc::new(RefCell::new(map))
            }
        }
    }

    /// Graph view. See [`Graph::from_values`] for how lists are read.
    pub fn as_graph(&self) -> GraphRef {
        match self {
            Value::Graph(g) => g.clone(),
            Value::Json(inner) => inner.as_graph(),
            Value::Null | Value::String(None) => Rc::new(RefCell::new(Graph::new())),
            Value::List(items) => Rc::new(RefCell::new(Graph::from_values(&items.borrow()))),
            Value::Map(entries) => Rc::new(RefCell::new(Graph::from_adjacency(&entries.borrow()))),
            other => {
                let mut graph = Graph::new();
                graph.add_node(other.clone());
                Rc::new(RefCell::new(graph))
            }
        }
    }

    /// Json view. Idempotent: a `Json` value is returned unchanged. Graphs
    /// are wrapped through their node/label/triple encoding.
    pub fn as_json(&self) -> Result<Value, EvalError> {
        match self {
            Value::Json(_) => Ok(self.clone()),
            Value::Graph(g) => {
                let encoded = g.borrow().to_json()?;
                Ok(Value::Json(Box::new(Value::from_json(&encoded))))
            }
            Value::Invocable(_) | Value::Invocation(_) => {
                Err(EvalError::unsupported("as_json", self.type_name()))
            }
            other => Ok(Value::Json(Box::new(other.clone()))),
        }
    }

    /// Map lookup through [`Value::as_map`]. A missing key reads as `Null`.
    pub fn get(&self, key: &str) -> Value {
        self.as_map().borrow().get(key).cloned().unwrap_or(Value::Null)
    }
}

// ──────────────────────────────────────────────
// Equality and ordering
// ──────────────────────────────────────────────

impl Value {
    /// Structural equality across coerced forms. Mixed scalar kinds are
    /// compared in the form of the higher-ranked kind (boolean, numeric,
    /// string, list, map, graph), so the relation is only transitive among
    /// values compared in the same form.
    pub fn equals_to(&self, other: &Value) -> bool {
        let (a, b) = (self.unwrap_json(), other.unwrap_json());
        match (a, b) {
            (Value::Invocable(x), Value::Invocable(y)) => {
                Rc::ptr_eq(x, y)
                    || (x.name() == y.name() && x.signature().same_as(y.signature()))
            }
            (Value::Invocation(x), Value::Invocation(y)) => Rc::ptr_eq(x, y),
            (Value::Invocable(_) | Value::Invocation(_), _)
            | (_, Value::Invocable(_) | Value::Invocation(_)) => false,
            _ if a.is_null() || b.is_null() => a.is_null() && b.is_null(),
            _ => match a.rank().max(b.rank()) {
                RANK_BOOLEAN => a.as_boolean() == b.as_boolean(),
                RANK_NUMERIC => numeric_eq(a.as_numeric(), b.as_numeric()),
                RANK_STRING => a.as_string() == b.as_string(),
                RANK_LIST => {
                    let (x, y) = (a.as_list(), b.as_list());
                    if Rc::ptr_eq(&x, &y) {
                        return true;
                    }
                    let (x, y) = (x.borrow(), y.borrow());
                    x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| p.equals_to(q))
                }
                RANK_MAP => {
                    let (x, y) = (a.as_map(), b.as_map());
                    if Rc::ptr_eq(&x, &y) {
                        return true;
                    }
                    let (x, y) = (x.borrow(), y.borrow());
                    x.len() == y.len()
                        && x.iter().all(|(k, v)| y.get(k).is_some_and(|w| v.equals_to(w)))
                }
                _ => {
                    let (x, y) = (a.as_graph(), b.as_graph());
                    Rc::ptr_eq(&x, &y) || x.borrow().equals(&y.borrow())
                }
            },
        }
    }

    /// Ordering used by relational natives. Never used for map ordering.
    pub fn compare(&self, other: &Value) -> Ordering {
        let (a, b) = (self.unwrap_json(), other.unwrap_json());
        match (a, b) {
            (Value::Invocable(_) | Value::Invocation(_), _)
            | (_, Value::Invocable(_) | Value::Invocation(_)) => a.as_string().cmp(&b.as_string()),
            _ if a.is_null() || b.is_null() => b.is_null().cmp(&a.is_null()),
            _ => match a.rank().max(b.rank()) {
                RANK_BOOLEAN => a.as_boolean().cmp(&b.as_boolean()),
                RANK_NUMERIC => numeric_cmp(a.as_numeric(), b.as_numeric()),
                RANK_STRING => a.as_string().cmp(&b.as_string()),
                RANK_LIST => {
                    let (x, y) = (a.as_list(), b.as_list());
                    let (x, y) = (x.borrow(), y.borrow());
                    for (p, q) in x.iter().zip(y.iter()) {
                        let ord = p.compare(q);
                        if ord != Ordering::Equal {
                            return ord;
                        }
                    }
                    x.len().cmp(&y.len())
                }
                RANK_MAP => {
                    let (x, y) = (a.as_map(), b.as_map());
                    let (x, y) = (x.borrow(), y.borrow());
                    x.len().cmp(&y.len()).then_with(|| {
                        for ((ka, va), (kb, vb)) in x.iter().zip(y.iter()) {
                            let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                            if ord != Ordering::Equal {
                                return ord;
                            }
                        }
                        Ordering::Equal
                    })
                }
                _ => {
                    let (x, y) = (a.as_graph(), b.as_graph());
                    let (x, y) = (x.borrow(), y.borrow());
                    x.node_count()
                        .cmp(&y.node_count())
                        .then(x.arc_count().cmp(&y.arc_count()))
                }
            },
        }
    }

    /// Comparator result as a Numeric value (-1, 0 or 1).
    pub fn compares_to(&self, other: &Value) -> Value {
        Value::Numeric(match self.compare(other) {
            Ordering::Less => -1.0,
            Ordering::Equal => 0.0,
            Ordering::Greater => 1.0,
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.equals_to(other)
    }
}

fn numeric_eq(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

fn numeric_cmp(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

// ──────────────────────────────────────────────
// Deep clone and JSON rendering
// ──────────────────────────────────────────────

impl Value {
    /// Structurally independent deep copy. Invocables and invocations
    /// have no copy semantics and are rejected.
    pub fn clone_value(&self) -> Result<Value, EvalError> {
        match self {
            Value::Null | Value::Boolean(_) | Value::Numeric(_) | Value::String(_) => {
                Ok(self.clone())
            }
            Value::List(items) => {
                let copied: Result<Vec<Value>, EvalError> =
                    items.borrow().iter().map(Value::clone_value).collect();
                Ok(Value::list(copied?))
            }
            Value::Map(entries) => {
                let mut copied = BTreeMap::new();
                for (k, v) in entries.borrow().iter() {
                    copied.insert(k.clone(), v.clone_value()?);
                }
                Ok(Value::map(copied))
            }
            Value::Json(inner) => Ok(Value::Json(Box::new(inner.clone_value()?))),
            Value::Graph(g) => Ok(Value::graph(g.borrow().deep_clone()?)),
            Value::Invocable(_) | Value::Invocation(_) => {
                Err(EvalError::unsupported("clone", self.type_name()))
            }
        }
    }

    /// Canonical JSON form. Graphs use their node/label/triple encoding;
    /// invocables and invocations have no JSON form.
    pub fn to_json(&self) -> Result<serde_json::Value, EvalError> {
        self.render_json(true)
    }

    /// Canonical JSON text, optionally pretty-printed.
    pub fn to_json_string(&self, pretty: bool) -> Result<String, EvalError> {
        let json = self.to_json()?;
        let text = if pretty {
            serde_json::to_string_pretty(&json)
        } else {
            serde_json::to_string(&json)
        };
        text.map_err(|e| EvalError::invocation(format!("cannot render JSON: {}", e)))
    }

    // In lenient mode invocables render as their description string.
    fn render_json(&self, strict: bool) -> Result<serde_json::Value, EvalError> {
        match self {
            Value::Null | Value::String(None) => Ok(serde_json::Value::Null),
            Value::Boolean(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Numeric(n) => Ok(numeric_to_json(*n)),
            Value::String(Some(s)) => Ok(serde_json::Value::String(s.to_string())),
            Value::List(items) => {
                let rendered: Result<Vec<serde_json::Value>, EvalError> = items
                    .borrow()
                    .iter()
                    .map(|v| v.render_json(strict))
                    .collect();
                Ok(serde_json::Value::Array(rendered?))
            }
            Value::Map(entries) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in entries.borrow().iter() {
                    obj.insert(k.clone(), v.render_json(strict)?);
                }
                Ok(serde_json::Value::Object(obj))
            }
            Value::Json(inner) => inner.render_json(strict),
            Value::Graph(g) => g.borrow().encode(|v| v.render_json(strict)),
            Value::Invocable(_) | Value::Invocation(_) => {
                if strict {
                    Err(EvalError::unsupported("to_json", self.type_name()))
                } else {
                    Ok(serde_json::Value::String(self.as_string()))
                }
            }
        }
    }
}

/// Integral values render without a fractional part; NaN and infinities
/// have no JSON form and render as `null`.
fn numeric_to_json(n: f64) -> serde_json::Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    }
}

fn format_numeric(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(Some(s)) => write!(f, "\"{}\"", s),
            other => f.write_str(&other.as_string()),
        }
    }
}

// ──────────────────────────────────────────────
// Conversions from host types
// ──────────────────────────────────────────────

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Numeric(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Numeric(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Numeric(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
