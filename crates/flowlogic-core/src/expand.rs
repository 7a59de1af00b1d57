use serde_json::Value;

use crate::expr::Expression;
use crate::graph::{FlowEdge, FlowGraph, FlowNode, NodeKind, Position, RESULT_NODE_ID};
use crate::settings::LayoutSettings;

/// Per-session node id counters: `operator-1`, `variable-1`, `constant-1`, `start-1`, ...
///
/// Counters only ever grow, so ids stay unique across re-imports within one
/// session even though the graph itself is rebuilt.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    operator: u64,
    variable: u64,
    constant: u64,
    start: u64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for a node of the given kind. The result node has a fixed id.
    pub fn next(&mut self, kind: &NodeKind) -> String {
        let (prefix, seq) = match kind {
            NodeKind::Operator { .. } => ("operator", &mut self.operator),
            NodeKind::Variable { .. } => ("variable", &mut self.variable),
            NodeKind::Constant { .. } => ("constant", &mut self.constant),
            NodeKind::Start => ("start", &mut self.start),
            NodeKind::Result => return RESULT_NODE_ID.to_string(),
        };
        *seq += 1;
        format!("{}-{}", prefix, seq)
    }
}

/// Monotonic vertical placement in a single column.
#[derive(Debug, Clone)]
pub struct LayoutCursor {
    layout: LayoutSettings,
    y: f64,
}

impl LayoutCursor {
    pub fn new(layout: LayoutSettings) -> Self {
        Self {
            y: layout.start_y,
            layout,
        }
    }

    pub fn place(&mut self) -> Position {
        let p = Position {
            x: self.layout.column_x,
            y: self.y,
        };
        self.y += self.layout.step_y;
        p
    }

    pub fn result_position(&self) -> Position {
        Position {
            x: self.layout.result_x,
            y: self.layout.result_y,
        }
    }
}

/// Unfold a rule into a canvas: one node per sub-expression, argument edges
/// carrying their position, and a final unordered edge into the result node.
///
/// Recurses once per nesting level. Rules parsed by serde_json stay under its
/// recursion limit; a hand-built [`Expression`] nested past
/// [`MAX_DEPTH`](crate::graph::MAX_DEPTH) operators expands fully but reduces
/// back cut off at that depth.
pub fn expand(expr: &Expression, ids: &mut IdGen, cursor: &mut LayoutCursor) -> FlowGraph {
    let mut graph = FlowGraph::with_result(cursor.result_position());
    let root = build(expr, &mut graph, ids, cursor);
    graph.edges.push(FlowEdge::new(&root, RESULT_NODE_ID, None));
    graph
}

fn build(
    expr: &Expression,
    graph: &mut FlowGraph,
    ids: &mut IdGen,
    cursor: &mut LayoutCursor,
) -> String {
    let kind = match expr {
        Expression::Operator { name, .. } => NodeKind::Operator {
            operator_symbol: name.clone(),
        },
        Expression::Var { name } => NodeKind::Variable { name: name.clone() },
        Expression::Literal(value) => NodeKind::Constant {
            raw_text: canonical_text(value),
        },
    };
    let id = ids.next(&kind);
    graph.nodes.push(FlowNode::new(id.clone(), kind, cursor.place()));

    if let Expression::Operator { args, .. } = expr {
        for (i, arg) in args.iter().enumerate() {
            let child = build(arg, graph, ids, cursor);
            let index = u32::try_from(i).unwrap_or(u32::MAX);
            graph.edges.push(FlowEdge::new(&child, &id, Some(index)));
        }
    }
    id
}

fn canonical_text(value: &Value) -> String {
    // Serializing a Value cannot fail: map keys are always strings.
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expand_value(value: Value) -> FlowGraph {
        let mut ids = IdGen::new();
        let mut cursor = LayoutCursor::new(LayoutSettings::default());
        expand(&Expression::from_value(&value), &mut ids, &mut cursor)
    }

    #[test]
    fn literal_becomes_constant_wired_to_result() {
        let graph = expand_value(json!("hello"));
        assert_eq!(graph.nodes.len(), 2);
        let constant = graph.node("constant-1").unwrap();
        assert_eq!(
            constant.kind,
            NodeKind::Constant {
                raw_text: "\"hello\"".to_string()
            }
        );
        assert_eq!(graph.edges, vec![FlowEdge::new("constant-1", RESULT_NODE_ID, None)]);
    }

    #[test]
    fn operator_arguments_are_indexed_in_order() {
        let graph = expand_value(json!({"if": [{"var": "a"}, "yes", "no"]}));
        let into_op: Vec<(String, Option<u32>)> = graph
            .incoming("operator-1")
            .map(|e| (e.source.clone(), e.arg_index()))
            .collect();
        assert_eq!(
            into_op,
            vec![
                ("variable-1".to_string(), Some(0)),
                ("constant-1".to_string(), Some(1)),
                ("constant-2".to_string(), Some(2)),
            ]
        );
        assert_eq!(graph.result_edge().unwrap().source, "operator-1");
        assert_eq!(graph.result_edge().unwrap().arg_index(), None);
    }

    #[test]
    fn nodes_are_placed_down_one_column() {
        let graph = expand_value(json!({"and": [true, false]}));
        let ys: Vec<f64> = graph
            .nodes
            .iter()
            .filter(|n| !n.is_result())
            .map(|n| n.position.y)
            .collect();
        assert_eq!(ys, vec![120.0, 240.0, 360.0]);
        assert!(graph.nodes.iter().filter(|n| !n.is_result()).all(|n| n.position.x == 320.0));
        assert_eq!(graph.node(RESULT_NODE_ID).unwrap().position, Position { x: 860.0, y: 240.0 });
    }

    #[test]
    fn id_counters_survive_across_expansions() {
        let mut ids = IdGen::new();
        let mut cursor = LayoutCursor::new(LayoutSettings::default());
        let rule = Expression::from_value(&json!({"!": [{"var": "x"}]}));
        expand(&rule, &mut ids, &mut cursor);
        let second = expand(&rule, &mut ids, &mut cursor);
        assert!(second.node("operator-2").is_some());
        assert!(second.node("variable-2").is_some());
        assert!(second.node("operator-1").is_none());
    }

    #[test]
    fn separate_generators_do_not_share_counters() {
        let mut a = IdGen::new();
        let mut b = IdGen::new();
        let kind = NodeKind::Variable { name: "x".into() };
        assert_eq!(a.next(&kind), "variable-1");
        assert_eq!(a.next(&kind), "variable-2");
        assert_eq!(b.next(&kind), "variable-1");
    }
}
