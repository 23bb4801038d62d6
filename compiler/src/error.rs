// error.rs — Errors raised by graph mutation and the reduction engine
//
// Front-end problems (lexing, parsing, name resolution) are reported as
// accumulated `Diagnostic`s instead; see `diag`.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors produced while reducing or mutating a graph.
///
/// None of these are expected on a well-formed input graph with monotonic
/// reductions; each one names a broken precondition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A control-input walk from `node` never reached a `region` or `start`.
    ///
    /// Raised for dangling chains (a node with no control input) and for
    /// cycles that never pass through a block head.
    #[error("malformed control graph: control chain above {node} never reaches a region or start")]
    MalformedControlGraph {
        /// The node the walk started from
        node: NodeId,
    },

    /// The engine gave up after `limit` reduction steps.
    ///
    /// A reduction that keeps reporting changes is not monotonic; the step
    /// ceiling turns the resulting livelock into an error.
    #[error("fixpoint not reached: pass `{pass}` exceeded {limit} reduction steps")]
    FixpointNotReached {
        /// Name of the reduction being run
        pass: &'static str,
        /// The step ceiling that was hit
        limit: usize,
    },

    /// `node` cannot be removed while a live node still reads its value.
    #[error("cannot remove {node}: its value is still used by {user}")]
    NodeHasDataUses {
        /// The node that was asked to be removed
        node: NodeId,
        /// A live data consumer of `node`
        user: NodeId,
    },

    /// `node` was already removed from the graph.
    #[error("{node} has already been removed")]
    RemovedNode {
        /// The removed node
        node: NodeId,
    },
}

/// Result alias for graph and engine operations.
pub type Result<T> = std::result::Result<T, Error>;
