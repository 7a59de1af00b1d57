use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::expr::Expression;
use crate::graph::{FlowEdge, FlowGraph, FlowNode, NodeKind, MAX_DEPTH, RESULT_NODE_ID};

/// Rebuild the rule by walking backward from the result node.
///
/// Never fails: a canvas with nothing wired into the result node reduces to
/// `{}`, dangling ids and start nodes to `null`, and constant text that is not
/// JSON to the raw text as a string. Operators nested deeper than
/// [`MAX_DEPTH`] reduce to `null`.
pub fn reduce(graph: &FlowGraph) -> Expression {
    let Some(root) = graph.result_edge() else {
        return Expression::empty();
    };
    let reducer = Reducer::new(graph);
    let mut path = HashSet::new();
    reducer.resolve(&root.source, &mut path)
}

struct Reducer<'a> {
    nodes: HashMap<&'a str, &'a FlowNode>,
    incoming: HashMap<&'a str, Vec<&'a FlowEdge>>,
}

impl<'a> Reducer<'a> {
    fn new(graph: &'a FlowGraph) -> Self {
        let nodes = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut incoming: HashMap<&str, Vec<&FlowEdge>> = HashMap::new();
        for edge in &graph.edges {
            if edge.target != RESULT_NODE_ID {
                incoming.entry(edge.target.as_str()).or_default().push(edge);
            }
        }
        Self { nodes, incoming }
    }

    fn resolve(&self, id: &'a str, path: &mut HashSet<&'a str>) -> Expression {
        let Some(node) = self.nodes.get(id) else {
            return Expression::Literal(Value::Null);
        };
        match &node.kind {
            NodeKind::Variable { name } => Expression::var(name.clone()),
            NodeKind::Constant { raw_text } => Expression::Literal(parse_literal(raw_text)),
            NodeKind::Operator { operator_symbol } => {
                if path.len() >= MAX_DEPTH {
                    tracing::warn!(node = id, limit = MAX_DEPTH, "operator nested too deep, reducing it to null");
                    return Expression::Literal(Value::Null);
                }
                if !path.insert(id) {
                    tracing::warn!(node = id, "cycle through operator node, reducing it to null");
                    return Expression::Literal(Value::Null);
                }
                let args = self
                    .ordered_inputs(id)
                    .into_iter()
                    .map(|e| self.resolve(&e.source, path))
                    .collect();
                path.remove(id);
                Expression::operator(operator_symbol.clone(), args)
            }
            NodeKind::Result | NodeKind::Start => Expression::Literal(Value::Null),
        }
    }

    /// Indexed inputs in ascending slot order; equal slots keep collection order
    /// and edges without a slot are left out.
    fn ordered_inputs(&self, id: &str) -> Vec<&'a FlowEdge> {
        let mut edges: Vec<(u32, &FlowEdge)> = self
            .incoming
            .get(id)
            .map(|v| v.iter().filter_map(|e| e.arg_index().map(|i| (i, *e))).collect())
            .unwrap_or_default();
        edges.sort_by_key(|(i, _)| *i);
        edges.into_iter().map(|(_, e)| e).collect()
    }
}

/// Constant text as JSON, or the text itself when it does not parse.
pub fn parse_literal(raw_text: &str) -> Value {
    serde_json::from_str(raw_text).unwrap_or_else(|_| Value::String(raw_text.to_string()))
}
