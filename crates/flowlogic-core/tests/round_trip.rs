use flowlogic_core::{
    expand, reduce, EditorSession, Expression, FlowGraph, IdGen, LayoutCursor, LayoutSettings,
    NewNode, NodeKind, Settings, MAX_DEPTH, RESULT_NODE_ID,
};
use serde_json::{json, Value};

fn round_trip(rule: Value) -> Value {
    let mut ids = IdGen::new();
    let mut cursor = LayoutCursor::new(LayoutSettings::default());
    let graph = expand(&Expression::from_value(&rule), &mut ids, &mut cursor);
    reduce(&graph).to_value()
}

#[test]
fn well_formed_rules_survive_expand_then_reduce() {
    let rules = [
        json!({"==": [{"var": "temperature"}, 22]}),
        json!({"-": [{"var": "a"}, 5]}),
        json!({"and": [{"<": [{"var": "x"}, 10]}, {"!": [{"var": "y"}]}, true]}),
        json!({"if": [{"var": "c"}, "yes", {"+": [1, 2, 3, 4]}]}),
        json!({"in": ["a", ["a", "b"]]}),
        json!({"merge": [{"a": 1, "b": 2}, null]}),
        json!(42),
        json!("plain"),
        json!(null),
        json!([1, {"var": "x"}]),
        json!({"var": ""}),
        json!({"now": []}),
    ];
    for rule in rules {
        assert_eq!(round_trip(rule.clone()), rule, "round trip of {rule}");
    }
}

#[test]
fn single_operand_round_trips_in_normalized_form() {
    assert_eq!(round_trip(json!({"!": true})), json!({"!": [true]}));
}

#[test]
fn argument_order_is_preserved() {
    assert_eq!(
        round_trip(json!({"-": [{"var": "a"}, 5]})),
        json!({"-": [{"var": "a"}, 5]})
    );
}

fn kinds_of<'a>(graph: &'a FlowGraph, type_name: &str) -> Vec<&'a NodeKind> {
    graph
        .nodes
        .iter()
        .map(|n| &n.kind)
        .filter(|k| k.type_name() == type_name)
        .collect()
}

#[test]
fn temperature_scenario() {
    let session = EditorSession::from_rule(
        &json!({"==": [{"var": "temperature"}, 22]}),
        Settings::default(),
    );
    let graph = session.graph();

    let of_type = |t: &str| kinds_of(graph, t);
    assert_eq!(
        of_type("variable"),
        vec![&NodeKind::Variable {
            name: "temperature".into()
        }]
    );
    assert_eq!(
        of_type("constant"),
        vec![&NodeKind::Constant {
            raw_text: "22".into()
        }]
    );
    assert_eq!(
        of_type("operator"),
        vec![&NodeKind::Operator {
            operator_symbol: "==".into()
        }]
    );
    assert_eq!(of_type("result").len(), 1);

    let op = graph
        .nodes
        .iter()
        .find(|n| n.kind.type_name() == "operator")
        .unwrap();
    let mut slots: Vec<u32> = graph.incoming(&op.id).filter_map(|e| e.arg_index()).collect();
    slots.sort_unstable();
    assert_eq!(slots, vec![0, 1]);
    let outgoing: Vec<_> = graph.edges.iter().filter(|e| e.source == op.id).collect();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].target, RESULT_NODE_ID);

    assert_eq!(
        session.rule_text(false),
        r#"{"==":[{"var":"temperature"},22]}"#
    );
}

#[test]
fn fourth_input_to_binary_operator_is_refused() {
    let mut session = EditorSession::from_rule(&json!({"==": [1, 2]}), Settings::default());
    let extra = session.add_node(NewNode::Constant);
    assert_eq!(session.connect(&extra, "operator-1"), None);
    let another = session.add_node(NewNode::Variable);
    assert_eq!(session.connect(&another, "operator-1"), None);
    assert_eq!(session.used_arg_indices("operator-1").len(), 2);
    assert_eq!(session.rule_value(), json!({"==": [1, 2]}));
}

#[test]
fn variadic_operator_grows() {
    let mut session = EditorSession::default();
    let and = session.add_node(NewNode::Operator);
    session.set_operator(&and, "and").unwrap();
    let mut inputs = Vec::new();
    for name in ["x", "y", "z"] {
        let v = session.add_node(NewNode::Variable);
        session.set_variable_name(&v, name).unwrap();
        inputs.push(v);
    }
    for v in &inputs {
        assert!(session.connect(v, &and).is_some());
    }
    session.connect(&and, RESULT_NODE_ID).unwrap();
    assert_eq!(
        session.rule_value(),
        json!({"and": [{"var": "x"}, {"var": "y"}, {"var": "z"}]})
    );
}

#[test]
fn second_result_edge_is_refused() {
    let mut session = EditorSession::from_rule(&json!({"var": "a"}), Settings::default());
    let before = session.graph().result_edge().cloned();
    let other = session.add_node(NewNode::Constant);
    assert_eq!(session.connect(&other, RESULT_NODE_ID), None);
    assert_eq!(session.graph().result_edge().cloned(), before);
    assert_eq!(session.graph().incoming(RESULT_NODE_ID).count(), 1);
}

#[test]
fn leaves_refuse_inputs() {
    let mut session = EditorSession::from_rule(&json!({"==": [{"var": "a"}, 1]}), Settings::default());
    let edges_before = session.graph().edges.len();
    let op = session.add_node(NewNode::Operator);
    assert_eq!(session.connect(&op, "variable-1"), None);
    assert_eq!(session.connect(&op, "constant-1"), None);
    assert_eq!(session.graph().edges.len(), edges_before);
}

#[test]
fn malformed_constant_reduces_to_string() {
    let mut session = EditorSession::from_rule(&json!(1), Settings::default());
    session.set_constant_text("constant-1", "abc").unwrap();
    assert_eq!(session.rule_value(), json!("abc"));
}

#[test]
fn empty_graph_reduces_to_empty_object() {
    let graph = FlowGraph::with_result(Default::default());
    assert_eq!(reduce(&graph).to_value(), json!({}));
    assert_eq!(reduce(&graph), reduce(&graph));
}

#[test]
fn graph_json_round_trips_through_serde() {
    let session = EditorSession::from_rule(
        &json!({"if": [{"var": "a"}, "x", "y"]}),
        Settings::default(),
    );
    let text = serde_json::to_string(session.graph()).unwrap();
    let back: FlowGraph = serde_json::from_str(&text).unwrap();
    assert_eq!(&back, session.graph());
    assert_eq!(reduce(&back).to_value(), json!({"if": [{"var": "a"}, "x", "y"]}));
}

#[test]
fn canvas_saved_by_a_browser_reduces() {
    let graph: FlowGraph = serde_json::from_value(json!({
        "nodes": [
            {"id": "result", "type": "result", "position": {"x": 860, "y": 240}},
            {"id": "op", "type": "operator", "position": {"x": 0, "y": 0}, "data": {"operatorSymbol": "<"}},
            {"id": "v", "type": "variable", "position": {"x": 0, "y": 0}, "data": {"name": "n"}},
            {"id": "c", "type": "constant", "position": {"x": 0, "y": 0}, "data": {"rawText": "3"}}
        ],
        "edges": [
            {"id": "e1", "source": "c", "target": "op", "data": {"argIndex": 1}},
            {"id": "e2", "source": "v", "target": "op", "data": {"argIndex": 0}},
            {"id": "e3", "source": "op", "target": "result"}
        ]
    }))
    .unwrap();
    assert_eq!(reduce(&graph).to_value(), json!({"<": [{"var": "n"}, 3]}));
}

#[test]
fn operator_chain_stops_at_depth_limit_and_reimports() {
    let mut session = EditorSession::default();
    let mut top = session.add_node(NewNode::Variable);
    let mut accepted = 0;
    for _ in 0..MAX_DEPTH + 10 {
        let op = session.add_node(NewNode::Operator);
        session.set_operator(&op, "!").unwrap();
        if session.connect(&top, &op).is_some() {
            top = op;
            accepted += 1;
        }
    }
    assert_eq!(accepted, MAX_DEPTH);
    assert!(session.connect(&top, RESULT_NODE_ID).is_some());

    let rule = session.rule_value();
    let text = session.rule_text(true);
    session.import_text(&text).unwrap();
    assert_eq!(session.rule_value(), rule);
}
