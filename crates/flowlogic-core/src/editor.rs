use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

use crate::error::{EditError, ImportError};
use crate::expand::{expand, IdGen, LayoutCursor};
use crate::expr::Expression;
use crate::graph::{FlowEdge, FlowGraph, FlowNode, NodeKind, RESULT_NODE_ID};
use crate::reduce::reduce;
use crate::settings::Settings;
use crate::validate::{validate_connection, Rejection};
use crate::RuleEvaluator;

/// Kind of node a user can drop onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NewNode {
    Operator,
    Variable,
    Constant,
    Start,
}

impl NewNode {
    fn default_kind(self) -> NodeKind {
        match self {
            NewNode::Operator => NodeKind::Operator {
                operator_symbol: "==".to_string(),
            },
            NewNode::Variable => NodeKind::Variable {
                name: "x".to_string(),
            },
            NewNode::Constant => NodeKind::Constant {
                raw_text: "0".to_string(),
            },
            NewNode::Start => NodeKind::Start,
        }
    }
}

/// One editing session: the canvas, the rule text kept in sync with it, and
/// the id and placement state that must not leak between sessions.
#[derive(Debug, Clone)]
pub struct EditorSession {
    graph: FlowGraph,
    ids: IdGen,
    cursor: LayoutCursor,
    settings: Settings,
    source_text: String,
}

impl EditorSession {
    /// An empty canvas holding only the result node.
    pub fn new(settings: Settings) -> Self {
        let cursor = LayoutCursor::new(settings.layout);
        let mut session = Self {
            graph: FlowGraph::with_result(cursor.result_position()),
            ids: IdGen::new(),
            cursor,
            settings,
            source_text: String::new(),
        };
        session.sync_text();
        session
    }

    pub fn from_rule(rule: &Value, settings: Settings) -> Self {
        let mut session = Self::new(settings);
        session.import_rule(rule);
        session
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // --- Import ---

    /// Replace the whole canvas with the expansion of `rule`.
    pub fn import_rule(&mut self, rule: &Value) {
        let expr = Expression::from_value(rule);
        self.cursor = LayoutCursor::new(self.settings.layout);
        self.graph = expand(&expr, &mut self.ids, &mut self.cursor);
        tracing::info!(
            nodes = self.graph.nodes.len(),
            edges = self.graph.edges.len(),
            "imported rule"
        );
        self.sync_text();
    }

    /// Parse `text` and import it. All-or-nothing: on a parse error neither
    /// the canvas nor the text buffer changes.
    pub fn import_text(&mut self, text: &str) -> Result<(), ImportError> {
        let rule: Value = serde_json::from_str(text)?;
        self.import_rule(&rule);
        Ok(())
    }

    // --- Text buffer ---

    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Edit the text buffer without touching the canvas.
    pub fn set_source_text(&mut self, text: impl Into<String>) {
        self.source_text = text.into();
    }

    pub fn source_is_valid(&self) -> bool {
        serde_json::from_str::<Value>(&self.source_text).is_ok()
    }

    /// Import whatever the text buffer currently holds.
    pub fn import_source(&mut self) -> Result<(), ImportError> {
        let text = self.source_text.clone();
        self.import_text(&text)
    }

    fn sync_text(&mut self) {
        self.source_text = self.rule_text(self.settings.pretty_print);
    }

    // --- Derived rule ---

    pub fn rule(&self) -> Expression {
        reduce(&self.graph)
    }

    pub fn rule_value(&self) -> Value {
        self.rule().to_value()
    }

    /// The rule as JSON text, as written to an exported `rule.json`.
    pub fn rule_text(&self, pretty: bool) -> String {
        let value = self.rule_value();
        let text = if pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        text.unwrap_or_else(|_| "{}".to_string())
    }

    /// Hand the current rule to an external evaluator together with `data`.
    pub fn evaluate_with<E: RuleEvaluator>(&self, evaluator: &E, data: &Value) -> Result<Value, E::Error> {
        evaluator.evaluate(&self.rule_value(), data)
    }

    // --- Nodes ---

    /// Drop a new node with default attributes; returns its id.
    pub fn add_node(&mut self, node: NewNode) -> String {
        let kind = node.default_kind();
        let id = self.ids.next(&kind);
        let position = self.cursor.place();
        self.graph.nodes.push(FlowNode::new(id.clone(), kind, position));
        tracing::debug!(node = %id, "added node");
        self.sync_text();
        id
    }

    /// Remove nodes and every edge touching them. The result node stays.
    /// Returns how many nodes were removed.
    pub fn delete_nodes(&mut self, ids: &[String]) -> usize {
        let doomed: HashSet<&str> = ids
            .iter()
            .map(String::as_str)
            .filter(|id| *id != RESULT_NODE_ID)
            .collect();
        let before = self.graph.nodes.len();
        self.graph.nodes.retain(|n| !doomed.contains(n.id.as_str()));
        self.graph
            .edges
            .retain(|e| !doomed.contains(e.source.as_str()) && !doomed.contains(e.target.as_str()));
        let removed = before - self.graph.nodes.len();
        self.sync_text();
        removed
    }

    /// Remove edges by id. Returns how many were removed.
    pub fn delete_edges(&mut self, ids: &[String]) -> usize {
        let doomed: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let before = self.graph.edges.len();
        self.graph.edges.retain(|e| !doomed.contains(e.id.as_str()));
        let removed = before - self.graph.edges.len();
        self.sync_text();
        removed
    }

    // --- Edges ---

    /// Draw `source -> target` if the connection rules allow it.
    /// Returns the new edge id, or `None` when the connection was refused.
    pub fn connect(&mut self, source: &str, target: &str) -> Option<String> {
        match self.try_connect(source, target) {
            Ok(id) => Some(id),
            Err(reason) => {
                tracing::debug!(source, target, %reason, "connection refused");
                None
            }
        }
    }

    /// Like [`connect`](Self::connect), but says why a connection was refused.
    pub fn try_connect(&mut self, source: &str, target: &str) -> Result<String, Rejection> {
        let slot = validate_connection(&self.graph, source, target)?;
        let edge = FlowEdge::new(source, target, slot);
        let id = edge.id.clone();
        self.graph.edges.push(edge);
        self.sync_text();
        Ok(id)
    }

    /// Argument slots in use on an operator, for drawing its input handles.
    pub fn used_arg_indices(&self, id: &str) -> BTreeSet<u32> {
        self.graph.used_arg_indices(id)
    }

    // --- Attribute edits ---

    /// Change an operator's symbol. If the new symbol allows fewer arguments
    /// than are wired, the inputs in the highest slots are disconnected.
    /// Returns the ids of the edges that were removed.
    pub fn set_operator(&mut self, id: &str, symbol: &str) -> Result<Vec<String>, EditError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Operator { operator_symbol } => *operator_symbol = symbol.to_string(),
            other => return Err(wrong_kind(id, "operator", other)),
        }
        let pruned = self.prune_excess_inputs(id, symbol);
        if !pruned.is_empty() {
            tracing::debug!(node = id, symbol, pruned = pruned.len(), "dropped inputs beyond arity");
        }
        self.sync_text();
        Ok(pruned)
    }

    pub fn set_variable_name(&mut self, id: &str, name: &str) -> Result<(), EditError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Variable { name: current } => *current = name.to_string(),
            other => return Err(wrong_kind(id, "variable", other)),
        }
        self.sync_text();
        Ok(())
    }

    /// Store constant text as typed; it is only interpreted on reduction.
    pub fn set_constant_text(&mut self, id: &str, raw: &str) -> Result<(), EditError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Constant { raw_text } => *raw_text = raw.to_string(),
            other => return Err(wrong_kind(id, "constant", other)),
        }
        self.sync_text();
        Ok(())
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut FlowNode, EditError> {
        self.graph
            .node_mut(id)
            .ok_or_else(|| EditError::NotFound(id.to_string()))
    }

    fn prune_excess_inputs(&mut self, id: &str, symbol: &str) -> Vec<String> {
        let Some(limit) = crate::Arity::of(symbol).limit() else {
            return Vec::new();
        };
        let mut pruned = Vec::new();
        while self.graph.used_arg_indices(id).len() > limit {
            // Highest slot first; among equal slots the later edge goes.
            let victim = self
                .graph
                .edges
                .iter()
                .enumerate()
                .filter(|(_, e)| e.target == id)
                .filter_map(|(pos, e)| e.arg_index().map(|i| (i, pos)))
                .max();
            let Some((_, pos)) = victim else { break };
            pruned.push(self.graph.edges.remove(pos).id);
        }
        pruned
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

fn wrong_kind(id: &str, expected: &'static str, actual: &NodeKind) -> EditError {
    EditError::WrongKind {
        id: id.to_string(),
        expected,
        actual: actual.type_name(),
    }
}
