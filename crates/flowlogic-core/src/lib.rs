pub mod arity;
pub mod editor;
pub mod error;
pub mod expand;
pub mod expr;
pub mod graph;
pub mod reduce;
pub mod rules;
pub mod settings;
pub mod validate;

use serde_json::Value;

pub use arity::Arity;
pub use editor::{EditorSession, NewNode};
pub use error::{EditError, ImportError, SettingsError};
pub use expand::{expand, IdGen, LayoutCursor};
pub use expr::Expression;
pub use graph::{
    make_edge_id, FlowEdge, FlowEdgeData, FlowGraph, FlowNode, NodeKind, Position, MAX_DEPTH,
    RESULT_NODE_ID,
};
pub use reduce::{parse_literal, reduce};
pub use settings::{read_settings, write_settings, LayoutSettings, Settings};
pub use validate::{validate_connection, Rejection};

/// A rules engine that can run a reduced rule against a data context.
///
/// The editor only produces syntactically valid rules; what an operator means
/// is entirely up to the implementation behind this trait.
pub trait RuleEvaluator {
    type Error;

    fn evaluate(&self, rule: &Value, data: &Value) -> Result<Value, Self::Error>;
}
