// limit.rs — Limit propagation from conditional branches
//
// For `if (cmp "<" X Y)` the true successor learns `X < Y` and the false
// successor learns `X >= Y`. Limits are recorded only on the two direct
// branch targets; nothing is merged across regions.
//
// Preconditions: among the branch's control uses, the first block head is
//                its true successor and the second its false successor.
// Postconditions: at most two limits change per `if`.
// Failure modes: none; other comparisons and missing successors are ignored.
// Side effects: writes limit facts; notifies the engine with the region.

use crate::engine::{ReduceHandle, Reduction};
use crate::error::Result;
use crate::facts::{Facts, LimitKind};
use crate::graph::{Graph, Literal, NodeId, Opcode};

/// Limit propagation on its own, without range analysis.
pub struct LimitPropagation<'f> {
    facts: &'f mut Facts,
}

impl<'f> LimitPropagation<'f> {
    pub fn new(facts: &'f mut Facts) -> Self {
        LimitPropagation { facts }
    }
}

impl Reduction for LimitPropagation<'_> {
    fn name(&self) -> &'static str {
        "limit-propagation"
    }

    fn reduce(&mut self, node: NodeId, graph: &Graph, handle: &mut ReduceHandle) -> Result<()> {
        if graph.opcode(node) == &Opcode::If {
            reduce_if(node, graph, self.facts, handle);
        }
        Ok(())
    }
}

/// Record the branch condition of `node` on its successor regions.
pub fn reduce_if(node: NodeId, graph: &Graph, facts: &mut Facts, handle: &mut ReduceHandle) {
    let Some(&test) = graph.inputs(node).first() else {
        return;
    };
    if graph.opcode(test) != &Opcode::Cmp {
        return;
    }
    if graph.literals(test).first().and_then(Literal::as_str) != Some("<") {
        return;
    }
    let [left, right, ..] = *graph.inputs(test) else {
        return;
    };

    // Instructions may also hang off the branch; only block heads are targets.
    let mut successors = graph
        .control_uses(node)
        .iter()
        .map(|u| u.node)
        .filter(|&n| graph.opcode(n).is_block_head());
    for kind in [LimitKind::Less, LimitKind::GreaterEq] {
        let Some(target) = successors.next() else {
            break;
        };
        if facts.update_limit(target, left, kind, Some(right)) {
            handle.change(target);
        }
    }
}
