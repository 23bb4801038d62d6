// bce.rs — Redundant bounds-check elimination
//
// Removes `checkIndex(array, index)` when the facts left by range analysis
// prove `0 <= index < loadArrayLength(array)` inside the check's region: the
// index range has a non-negative lower bound and the region carries the limit
// `index < loadArrayLength(array)` for the very same array.
//
// Preconditions: `facts` holds the converged result of `RangeAndLimit` over
//                the same graph.
// Postconditions: every removed check satisfied both conditions and had no
//                 data consumers; every other node is untouched.
// Failure modes: `MalformedControlGraph` if the control chain above a check
//                never reaches a `region` or `start`.
// Side effects: removes nodes through the engine.

use std::collections::HashSet;

use crate::engine::{ReduceHandle, Reduction};
use crate::error::{Error, Result};
use crate::facts::{Bound, Facts, LimitKind};
use crate::graph::{Graph, NodeId, Opcode};

/// Bounds-check elimination over previously computed facts.
pub struct EliminateChecks<'f> {
    facts: &'f Facts,
}

impl<'f> EliminateChecks<'f> {
    pub fn new(facts: &'f Facts) -> Self {
        EliminateChecks { facts }
    }
}

impl Reduction for EliminateChecks<'_> {
    fn name(&self) -> &'static str {
        "check-elimination"
    }

    fn reduce(&mut self, node: NodeId, graph: &Graph, handle: &mut ReduceHandle) -> Result<()> {
        if graph.opcode(node) != &Opcode::CheckIndex {
            return Ok(());
        }
        if is_redundant(node, graph, self.facts)? {
            handle.remove(node);
        }
        Ok(())
    }
}

/// Walk control inputs from `node` up to the nearest `region` or `start`.
pub fn enclosing_region(graph: &Graph, node: NodeId) -> Result<NodeId> {
    let mut seen = HashSet::new();
    let mut current = node;
    loop {
        let Some(&above) = graph.control(current).first() else {
            return Err(Error::MalformedControlGraph { node });
        };
        if graph.opcode(above).is_block_head() {
            return Ok(above);
        }
        if !seen.insert(above) {
            return Err(Error::MalformedControlGraph { node });
        }
        current = above;
    }
}

fn is_redundant(node: NodeId, graph: &Graph, facts: &Facts) -> Result<bool> {
    let region = enclosing_region(graph, node)?;
    let [array, index, ..] = *graph.inputs(node) else {
        return Ok(false);
    };
    // A check whose value is consumed stays; removal only splices control.
    if graph.data_uses(node).iter().any(|&user| !graph.is_removed(user)) {
        return Ok(false);
    }

    let Some(limit) = facts.limit(region, index) else {
        return Ok(false);
    };

    // Negative indices are never in bounds.
    let range = facts.range(index);
    if range.from < Bound::Int(0) {
        return Ok(false);
    }

    if limit.kind != LimitKind::Less {
        return Ok(false);
    }
    let Some(bound) = limit.bound else {
        return Ok(false);
    };
    let bounded_by_length = graph.opcode(bound) == &Opcode::LoadArrayLength
        && graph.inputs(bound).first() == Some(&array);
    if bounded_by_length {
        log::trace!("{node}: index {index} in [{}, {bound}) in {region}", range.from);
    }
    Ok(bounded_by_length)
}
