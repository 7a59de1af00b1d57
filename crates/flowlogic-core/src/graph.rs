use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

/// Fixed id of the single sink node.
pub const RESULT_NODE_ID: &str = "result";

/// Most operators a single input chain may nest.
///
/// A rule this deep serializes within serde_json's recursion limit when its
/// leaves are flat, so exported text can always be imported again.
pub const MAX_DEPTH: usize = 63;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, schemars::JsonSchema)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// What a node is, with the attributes that kind carries.
///
/// Serialized adjacently as `"type"` + `"data"`, the shape canvas libraries use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum NodeKind {
    Operator {
        #[serde(rename = "operatorSymbol", default)]
        operator_symbol: String,
    },
    Variable {
        #[serde(default)]
        name: String,
    },
    Constant {
        /// Unparsed literal text, re-read as JSON on every reduction.
        #[serde(rename = "rawText", default)]
        raw_text: String,
    },
    Result,
    Start,
}

impl NodeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Operator { .. } => "operator",
            NodeKind::Variable { .. } => "variable",
            NodeKind::Constant { .. } => "constant",
            NodeKind::Result => "result",
            NodeKind::Start => "start",
        }
    }

    /// Nodes that never consume another node's output.
    pub fn accepts_inputs(&self) -> bool {
        matches!(self, NodeKind::Operator { .. } | NodeKind::Result)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowNode {
    pub id: String,
    #[serde(default)]
    pub position: Position,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, position: Position) -> Self {
        Self {
            id: id.into(),
            position,
            kind,
        }
    }

    pub fn result(position: Position) -> Self {
        Self::new(RESULT_NODE_ID, NodeKind::Result, position)
    }

    pub fn is_result(&self) -> bool {
        matches!(self.kind, NodeKind::Result)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdgeData {
    /// Position of this edge among the target operator's arguments.
    #[serde(
        default,
        deserialize_with = "lenient_index",
        skip_serializing_if = "Option::is_none"
    )]
    pub arg_index: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<FlowEdgeData>,
}

impl FlowEdge {
    pub fn new(source: &str, target: &str, arg_index: Option<u32>) -> Self {
        Self {
            id: make_edge_id(source, target, arg_index),
            source: source.to_string(),
            target: target.to_string(),
            data: arg_index.map(|i| FlowEdgeData { arg_index: Some(i) }),
        }
    }

    pub fn arg_index(&self) -> Option<u32> {
        self.data.as_ref().and_then(|d| d.arg_index)
    }
}

/// Generate an edge ID from its endpoints and, for operator inputs, its argument slot.
pub fn make_edge_id(source: &str, target: &str, arg_index: Option<u32>) -> String {
    match arg_index {
        Some(i) => format!("edge-{}-{}-{}", source, target, i),
        None => format!("edge-{}-{}", source, target),
    }
}

/// Accept anything a canvas might have stored as `argIndex`; only a
/// non-negative whole number counts as an assigned slot.
fn lenient_index<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
            .and_then(|i| u32::try_from(i).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    /// A canvas holding only the result node.
    pub fn with_result(position: Position) -> Self {
        Self {
            nodes: vec![FlowNode::result(position)],
            edges: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut FlowNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&FlowEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Edges landing on `id`, in collection order.
    pub fn incoming<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// The first edge into the result node, if any.
    pub fn result_edge(&self) -> Option<&FlowEdge> {
        self.incoming(RESULT_NODE_ID).next()
    }

    /// Distinct argument slots already taken on an operator node.
    pub fn used_arg_indices(&self, id: &str) -> BTreeSet<u32> {
        self.incoming(id).filter_map(FlowEdge::arg_index).collect()
    }

    /// Whether following edges forward from `from` reaches `to`.
    pub fn feeds(&self, from: &str, to: &str) -> bool {
        let mut stack = vec![from];
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            stack.extend(
                self.edges
                    .iter()
                    .filter(|e| e.source == id)
                    .map(|e| e.target.as_str()),
            );
        }
        false
    }

    /// Operators on the longest chain ending at each node (`upstream`) and
    /// starting at each node (`downstream`), counting the node itself.
    ///
    /// Relaxed round by round and capped at `MAX_DEPTH + 1`, so a canvas
    /// loaded with a cycle still terminates. Edges to unknown ids are skipped.
    pub fn operator_depths(&self) -> (HashMap<&str, usize>, HashMap<&str, usize>) {
        let cap = MAX_DEPTH + 1;
        let weight: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.id.as_str(), usize::from(matches!(n.kind, NodeKind::Operator { .. }))))
            .collect();
        let mut upstream = weight.clone();
        let mut downstream = weight.clone();

        for _ in 0..cap {
            let mut changed = false;
            for edge in &self.edges {
                let (s, t) = (edge.source.as_str(), edge.target.as_str());
                let (Some(&ws), Some(&wt)) = (weight.get(s), weight.get(t)) else {
                    continue;
                };
                let up = (upstream[s] + wt).min(cap);
                if up > upstream[t] {
                    upstream.insert(t, up);
                    changed = true;
                }
                let down = (downstream[t] + ws).min(cap);
                if down > downstream[s] {
                    downstream.insert(s, down);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        (upstream, downstream)
    }
}
