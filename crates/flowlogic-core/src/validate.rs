//! Connection rules checked when an edge is drawn. Every accepted edge keeps
//! the canvas reducible to a single well-formed rule.

use thiserror::Error;

use crate::arity::Arity;
use crate::graph::{FlowGraph, NodeKind, MAX_DEPTH};

/// Why a drawn edge was not added. Rejection is routine; callers log it and move on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("node '{0}' does not exist")]
    MissingNode(String),

    #[error("the result node has no outputs")]
    SourceIsResult,

    #[error("{kind} node '{id}' accepts no inputs")]
    TargetAcceptsNoInputs { id: String, kind: &'static str },

    #[error("the result node already has an input")]
    ResultOccupied,

    #[error("operator '{symbol}' on '{id}' already has {arity} argument(s)")]
    ArityExhausted {
        id: String,
        symbol: String,
        arity: Arity,
    },

    #[error("'{to}' already feeds '{from}'")]
    WouldCycle { from: String, to: String },

    #[error("connecting '{from}' to '{to}' would nest more than {limit} operators")]
    TooDeep {
        from: String,
        to: String,
        limit: usize,
    },
}

/// Decide whether `source -> target` may be added.
///
/// On success returns the argument slot the new edge must carry: the smallest
/// free slot when the target is an operator, `None` when it is the result node.
pub fn validate_connection(
    graph: &FlowGraph,
    source: &str,
    target: &str,
) -> Result<Option<u32>, Rejection> {
    let source_node = graph
        .node(source)
        .ok_or_else(|| Rejection::MissingNode(source.to_string()))?;
    let target_node = graph
        .node(target)
        .ok_or_else(|| Rejection::MissingNode(target.to_string()))?;

    if source_node.is_result() {
        return Err(Rejection::SourceIsResult);
    }
    if !target_node.kind.accepts_inputs() {
        return Err(Rejection::TargetAcceptsNoInputs {
            id: target.to_string(),
            kind: target_node.kind.type_name(),
        });
    }

    let slot = match &target_node.kind {
        NodeKind::Result => {
            if graph.result_edge().is_some() {
                return Err(Rejection::ResultOccupied);
            }
            None
        }
        NodeKind::Operator { operator_symbol } => {
            let arity = Arity::of(operator_symbol);
            let used = graph.used_arg_indices(target);
            let exhausted = || Rejection::ArityExhausted {
                id: target.to_string(),
                symbol: operator_symbol.clone(),
                arity,
            };
            if !arity.admits(used.len()) {
                return Err(exhausted());
            }
            let limit = arity.limit().map_or(u32::MAX, |n| u32::try_from(n).unwrap_or(u32::MAX));
            let free = (0..limit).find(|i| !used.contains(i)).ok_or_else(exhausted)?;
            Some(free)
        }
        _ => None,
    };

    if graph.feeds(target, source) {
        return Err(Rejection::WouldCycle {
            from: source.to_string(),
            to: target.to_string(),
        });
    }

    let (upstream, downstream) = graph.operator_depths();
    let depth = upstream.get(source).copied().unwrap_or(0)
        + downstream.get(target).copied().unwrap_or(0);
    if depth > MAX_DEPTH {
        return Err(Rejection::TooDeep {
            from: source.to_string(),
            to: target.to_string(),
            limit: MAX_DEPTH,
        });
    }

    Ok(slot)
}
