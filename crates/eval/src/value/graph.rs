//! Labeled multigraph over values.
//!
//! Nodes and labels are interned in insertion order; arcs are stored as
//! index triples. The JSON encoding mirrors that layout:
//!
//! ```json
//! { "nodes": [..], "labels": [..], "triples": [[from, label, to], ..] }
//! ```

use std::collections::BTreeMap;

use super::Value;
use crate::error::EvalError;

/// One labeled arc, as indices into the node and label tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Triple {
    pub from: usize,
    pub label: usize,
    pub to: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Value>,
    labels: Vec<Value>,
    triples: Vec<Triple>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn arc_count(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Value] {
        &self.nodes
    }

    pub fn labels(&self) -> &[Value] {
        &self.labels
    }

    pub fn triples(&self) -> &[Triple] {
        &self.triples
    }

    fn node_index(&self, node: &Value) -> Option<usize> {
        self.nodes.iter().position(|n| n.equals_to(node))
    }

    fn label_index(&self, label: &Value) -> Option<usize> {
        self.labels.iter().position(|l| l.equals_to(label))
    }

    /// Add a node if no equal node exists; returns its index either way.
    pub fn add_node(&mut self, node: Value) -> usize {
        match self.node_index(&node) {
            Some(i) => i,
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn add_label(&mut self, label: Value) -> usize {
        match self.label_index(&label) {
            Some(i) => i,
            None => {
                self.labels.push(label);
                self.labels.len() - 1
            }
        }
    }

    /// Add the arc `from --label--> to`. Returns false if it already existed.
    pub fn add_arc(&mut self, from: Value, label: Value, to: Value) -> bool {
        let triple = Triple {
            from: self.add_node(from),
            label: self.add_label(label),
            to: self.add_node(to),
        };
        if self.triples.contains(&triple) {
            return false;
        }
        self.triples.push(triple);
        true
    }

    pub fn contains_arc(&self, from: &Value, label: &Value, to: &Value) -> bool {
        match (
            self.node_index(from),
            self.label_index(label),
            self.node_index(to),
        ) {
            (Some(from), Some(label), Some(to)) => {
                self.triples.contains(&Triple { from, label, to })
            }
            _ => false,
        }
    }

    /// Iterate arcs as `(from, label, to)` value references.
    pub fn arcs(&self) -> impl Iterator<Item = (&Value, &Value, &Value)> + '_ {
        self.triples
            .iter()
            .map(|t| (&self.nodes[t.from], &self.labels[t.label], &self.nodes[t.to]))
    }

    /// Outgoing `(label, target)` pairs of `node`.
    pub fn successors(&self, node: &Value) -> Vec<(Value, Value)> {
        let Some(from) = self.node_index(node) else {
            return Vec::new();
        };
        self.triples
            .iter()
            .filter(|t| t.from == from)
            .map(|t| (self.labels[t.label].clone(), self.nodes[t.to].clone()))
            .collect()
    }

    /// Same node set and same arc set, independent of insertion order.
    pub fn equals(&self, other: &Graph) -> bool {
        self.node_count() == other.node_count()
            && self.arc_count() == other.arc_count()
            && self.nodes.iter().all(|n| other.node_index(n).is_some())
            && self.arcs().all(|(f, l, t)| other.contains_arc(f, l, t))
    }

    pub fn deep_clone(&self) -> Result<Graph, EvalError> {
        let nodes: Result<Vec<Value>, EvalError> =
            self.nodes.iter().map(Value::clone_value).collect();
        let labels: Result<Vec<Value>, EvalError> =
            self.labels.iter().map(Value::clone_value).collect();
        Ok(Graph {
            nodes: nodes?,
            labels: labels?,
            triples: self.triples.clone(),
        })
    }

    // ──────────────────────────────────────────────
    // List and map views
    // ──────────────────────────────────────────────

    /// Every arc as a `[from, label, to]` list, followed by each node that
    /// takes part in no arc as a one-element `[node]` list.
    pub fn to_list(&self) -> Vec<Value> {
        let mut items: Vec<Value> = self
            .arcs()
            .map(|(f, l, t)| Value::list(vec![f.clone(), l.clone(), t.clone()]))
            .collect();
        for (i, node) in self.nodes.iter().enumerate() {
            let connected = self.triples.iter().any(|t| t.from == i || t.to == i);
            if !connected {
                items.push(Value::list(vec![node.clone()]));
            }
        }
        items
    }

    /// Inverse of [`Graph::to_list`]: three-element lists are arcs,
    /// one-element lists are nodes, any other element is itself a node.
    pub fn from_values(items: &[Value]) -> Graph {
        let mut graph = Graph::new();
        for item in items {
            match item.unwrap_json() {
                Value::List(parts) => {
                    let parts = parts.borrow();
                    match parts.len() {
                        3 => {
                            graph.add_arc(parts[0].clone(), parts[1].clone(), parts[2].clone());
                        }
                        1 => {
                            graph.add_node(parts[0].clone());
                        }
                        _ => {
                            graph.add_node(item.clone());
                        }
                    }
                }
                other => {
                    graph.add_node(other.clone());
                }
            }
        }
        graph
    }

    /// Adjacency view keyed by the node's string form:
    /// `{ node: [[label, target], ..] }`.
    pub fn adjacency(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        for node in &self.nodes {
            let out = self
                .successors(node)
                .into_iter()
                .map(|(label, target)| Value::list(vec![label, target]))
                .collect();
            map.insert(node.as_string(), Value::list(out));
        }
        map
    }

    /// Inverse of [`Graph::adjacency`]. Keys become string nodes; values
    /// that are not lists of `[label, target]` pairs are ignored.
    pub fn from_adjacency(map: &BTreeMap<String, Value>) -> Graph {
        let mut graph = Graph::new();
        for (key, out) in map {
            let from = Value::string(key);
            graph.add_node(from.clone());
            if let Value::List(pairs) = out.unwrap_json() {
                for pair in pairs.borrow().iter() {
                    if let Value::List(parts) = pair.unwrap_json() {
                        let parts = parts.borrow();
                        if parts.len() == 2 {
                            graph.add_arc(from.clone(), parts[0].clone(), parts[1].clone());
                        }
                    }
                }
            }
        }
        graph
    }

    // ──────────────────────────────────────────────
    // JSON encoding
    // ──────────────────────────────────────────────

    pub fn to_json(&self) -> Result<serde_json::Value, EvalError> {
        self.encode(Value::to_json)
    }

    pub(crate) fn encode<F>(&self, render: F) -> Result<serde_json::Value, EvalError>
    where
        F: Fn(&Value) -> Result<serde_json::Value, EvalError>,
    {
        let nodes: Result<Vec<serde_json::Value>, EvalError> =
            self.nodes.iter().map(&render).collect();
        let labels: Result<Vec<serde_json::Value>, EvalError> =
            self.labels.iter().map(&render).collect();
        let triples: Vec<serde_json::Value> = self
            .triples
            .iter()
            .map(|t| serde_json::json!([t.from, t.label, t.to]))
            .collect();
        Ok(serde_json::json!({
            "nodes": nodes?,
            "labels": labels?,
            "triples": triples,
        }))
    }

    /// Load a graph from its node/label/triple encoding.
    pub fn from_json(v: &serde_json::Value) -> Result<Graph, EvalError> {
        let table = |field: &str| -> Result<Vec<Value>, EvalError> {
            v.get(field)
                .and_then(|t| t.as_array())
                .map(|items| items.iter().map(Value::from_json).collect())
                .ok_or_else(|| EvalError::load(format!("graph encoding missing '{}' array", field)))
        };
        let nodes = table("nodes")?;
        let labels = table("labels")?;
        let raw_triples = v
            .get("triples")
            .and_then(|t| t.as_array())
            .ok_or_else(|| EvalError::load("graph encoding missing 'triples' array"))?;

        let mut graph = Graph::new();
        for node in &nodes {
            graph.add_node(node.clone());
        }
        for raw in raw_triples {
            let idx = raw
                .as_array()
                .filter(|parts| parts.len() == 3)
                .ok_or_else(|| EvalError::load(format!("malformed triple: {}", raw)))?;
            let index = |i: usize, table: &[Value]| -> Result<Value, EvalError> {
                idx[i]
                    .as_u64()
                    .and_then(|n| table.get(n as usize))
                    .cloned()
                    .ok_or_else(|| EvalError::load(format!("triple index out of range: {}", raw)))
            };
            graph.add_arc(index(0, &nodes)?, index(1, &labels)?, index(2, &nodes)?);
        }
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Graph {
        let mut g = Graph::new();
        g.add_arc(Value::string("a"), Value::string("knows"), Value::string("b"));
        g.add_arc(Value::string("b"), Value::string("knows"), Value::string("c"));
        g.add_arc(Value::string("a"), Value::string("likes"), Value::Numeric(1.0));
        g.add_node(Value::string("lonely"));
        g
    }

    #[test]
    fn duplicate_arcs_are_ignored() {
        let mut g = sample();
        assert!(!g.add_arc(Value::string("a"), Value::string("knows"), Value::string("b")));
        assert_eq!(g.arc_count(), 3);
        assert_eq!(g.node_count(), 5);
    }

    #[test]
    fn json_encoding_round_trip() {
        let g = sample();
        let encoded = g.to_json().unwrap();
        assert_eq!(encoded["triples"][0], json!([0, 0, 1]));
        let loaded = Graph::from_json(&encoded).unwrap();
        assert!(loaded.equals(&g));
        assert!(loaded.contains_arc(
            &Value::string("b"),
            &Value::string("knows"),
            &Value::string("c")
        ));
    }

    #[test]
    fn loader_rejects_out_of_range_index() {
        let bad = json!({"nodes": ["a"], "labels": ["l"], "triples": [[0, 0, 5]]});
        assert!(matches!(Graph::from_json(&bad), Err(EvalError::Load { .. })));
    }

    #[test]
    fn list_view_round_trip_keeps_isolated_nodes() {
        let g = sample();
        let back = Graph::from_values(&g.to_list());
        assert!(back.equals(&g));
    }

    #[test]
    fn adjacency_round_trip_for_string_nodes() {
        let mut g = Graph::new();
        g.add_arc(Value::string("x"), Value::string("to"), Value::string("y"));
        let back = Graph::from_adjacency(&g.adjacency());
        assert!(back.equals(&g));
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let mut a = Graph::new();
        a.add_arc(Value::string("p"), Value::Null, Value::string("q"));
        a.add_arc(Value::string("q"), Value::Null, Value::string("p"));
        let mut b = Graph::new();
        b.add_arc(Value::string("q"), Value::Null, Value::string("p"));
        b.add_arc(Value::string("p"), Value::Null, Value::string("q"));
        assert!(a.equals(&b));
    }
}
