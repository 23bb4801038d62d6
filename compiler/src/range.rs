// range.rs — Integer range analysis
//
// A `Reduction` that assigns every value-producing node an integer interval
// and a coarse type. Literals are exact points, phis join their operands and
// the `phi = phi + positive constant` counter idiom is widened to
// `[initial, +inf]`. `if` nodes are handed to limit propagation so both fact
// stores converge in a single engine run.
//
// Preconditions: `facts` is empty or holds facts from a previous run over the
//                same graph.
// Postconditions: at fixpoint, every literal holds `[v, v]` and every counter
//                 phi/add pair holds `[initial, +inf]`.
// Failure modes: none; nodes with unexpected arity are left untouched.
// Side effects: writes range and limit facts; notifies the engine on change.

use crate::engine::{ReduceHandle, Reduction};
use crate::error::Result;
use crate::facts::{Bound, Facts, Range, RangeType};
use crate::graph::{Graph, Literal, NodeId, Opcode};
use crate::limit;

/// Range analysis with limit propagation.
pub struct RangeAndLimit<'f> {
    facts: &'f mut Facts,
}

impl<'f> RangeAndLimit<'f> {
    pub fn new(facts: &'f mut Facts) -> Self {
        RangeAndLimit { facts }
    }
}

impl Reduction for RangeAndLimit<'_> {
    fn name(&self) -> &'static str {
        "range-analysis"
    }

    fn reduce(&mut self, node: NodeId, graph: &Graph, handle: &mut ReduceHandle) -> Result<()> {
        match graph.opcode(node) {
            Opcode::Literal => reduce_literal(node, graph, self.facts, handle),
            Opcode::Phi => reduce_phi(node, graph, self.facts, handle),
            Opcode::Add => reduce_add(node, graph, self.facts, handle),
            Opcode::If => limit::reduce_if(node, graph, self.facts, handle),
            // Not handled by this pass; stays `any`.
            _ => {}
        }
        Ok(())
    }
}

// ── Update helpers ──────────────────────────────────────────────────────────

fn update_range(facts: &mut Facts, handle: &mut ReduceHandle, node: NodeId, from: Bound, to: Bound) {
    if facts.update_range(node, from, to) {
        handle.change(node);
    }
}

fn update_type(facts: &mut Facts, handle: &mut ReduceHandle, node: NodeId, ty: RangeType) {
    if facts.update_type(node, ty) {
        handle.change(node);
    }
}

fn binary_operands(graph: &Graph, node: NodeId) -> Option<(NodeId, NodeId)> {
    match graph.inputs(node) {
        [left, right, ..] => Some((*left, *right)),
        _ => None,
    }
}

// ── Per-opcode reductions ───────────────────────────────────────────────────

fn reduce_literal(node: NodeId, graph: &Graph, facts: &mut Facts, handle: &mut ReduceHandle) {
    if let Some(value) = graph.literals(node).first().and_then(Literal::as_int) {
        update_range(facts, handle, node, Bound::Int(value), Bound::Int(value));
    }
}

/// Shared none/int propagation for two-operand nodes. Returns true when both
/// operands are `int` and the caller may refine the interval.
fn reduce_binary(
    node: NodeId,
    left: Range,
    right: Range,
    facts: &mut Facts,
    handle: &mut ReduceHandle,
) -> bool {
    if left.ty == RangeType::None || right.ty == RangeType::None {
        update_type(facts, handle, node, RangeType::None);
        return false;
    }
    if left.ty == RangeType::Int || right.ty == RangeType::Int {
        update_type(facts, handle, node, RangeType::Int);
    }
    left.ty == RangeType::Int && right.ty == RangeType::Int
}

fn reduce_phi(node: NodeId, graph: &Graph, facts: &mut Facts, handle: &mut ReduceHandle) {
    let Some((a, b)) = binary_operands(graph, node) else {
        return;
    };
    let left = facts.range(a);
    let right = facts.range(b);
    if !reduce_binary(node, left, right, facts, handle) {
        return;
    }

    // Only the loop-header shape: exact initial value, incremented back-edge.
    if graph.opcode(b) != &Opcode::Add || left.point().is_none() {
        return;
    }
    let from = left.from.min(right.from);
    let to = left.to.max(right.to);
    update_range(facts, handle, node, from, to);
}

fn reduce_add(node: NodeId, graph: &Graph, facts: &mut Facts, handle: &mut ReduceHandle) {
    let Some((phi, step)) = binary_operands(graph, node) else {
        return;
    };
    let left = facts.range(phi);
    let right = facts.range(step);
    if !reduce_binary(node, left, right, facts, handle) {
        return;
    }

    if graph.opcode(phi) != &Opcode::Phi {
        return;
    }
    let Some(Bound::Int(step)) = right.point() else {
        return;
    };
    if step <= 0 || graph.inputs(phi).get(1) != Some(&node) {
        return;
    }
    let Some(&init) = graph.inputs(phi).first() else {
        return;
    };
    let initial = facts.range(init);
    if initial.ty != RangeType::Int {
        return;
    }
    update_range(facts, handle, node, initial.from, Bound::PosInf);
}
