// engine.rs — Fixpoint reduction engine
//
// Drives a `Reduction` over every live node of a graph until no node reports
// a change. The worklist starts with all nodes in index order; when a node's
// fact changes its consumers are re-queued, and removed nodes are spliced out
// of the graph with their rewired consumers re-queued.
//
// Preconditions: the reduction is monotonic over a finite-height lattice.
// Postconditions: on `Ok`, re-running the same reduction reports no changes.
// Failure modes: `FixpointNotReached` once the step ceiling is exceeded;
//                reduction and graph errors are propagated unchanged.
// Side effects: `remove` requests mutate the graph topology.

use std::collections::{HashSet, VecDeque};

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};

/// Default step ceiling per arena node when `EngineConfig::max_steps` is unset.
pub const DEFAULT_STEPS_PER_NODE: usize = 64;

// ── Public types ────────────────────────────────────────────────────────────

/// A per-node reduction run to fixpoint by `run`.
pub trait Reduction {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Inspect `node` and report fact changes or removals through `handle`.
    fn reduce(&mut self, node: NodeId, graph: &Graph, handle: &mut ReduceHandle) -> Result<()>;
}

/// Requests a reduction makes while visiting one node.
#[derive(Debug, Default)]
pub struct ReduceHandle {
    changed: Vec<NodeId>,
    removed: Vec<NodeId>,
}

impl ReduceHandle {
    /// The recorded fact of `node` changed; its consumers must be revisited.
    pub fn change(&mut self, node: NodeId) {
        self.changed.push(node);
    }

    /// Delete `node` from the graph once the current visit returns.
    pub fn remove(&mut self, node: NodeId) {
        self.removed.push(node);
    }
}

/// Engine knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Absolute ceiling on node visits per run. `None` means
    /// `graph.len() * DEFAULT_STEPS_PER_NODE`.
    pub max_steps: Option<usize>,
}

impl EngineConfig {
    pub fn step_limit(&self, graph: &Graph) -> usize {
        self.max_steps
            .unwrap_or_else(|| graph.len().max(1).saturating_mul(DEFAULT_STEPS_PER_NODE))
    }
}

/// Counters for one engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceStats {
    pub visited: usize,
    pub changes: usize,
    pub removals: usize,
}

// ── Worklist ────────────────────────────────────────────────────────────────

/// FIFO queue with a membership set; pushing a queued node is a no-op.
struct Worklist {
    queue: VecDeque<NodeId>,
    queued: HashSet<NodeId>,
}

impl Worklist {
    fn seeded(graph: &Graph) -> Self {
        let mut queue = VecDeque::with_capacity(graph.len());
        let mut queued = HashSet::with_capacity(graph.len());
        for id in graph.node_ids() {
            queue.push_back(id);
            queued.insert(id);
        }
        Worklist { queue, queued }
    }

    fn pop(&mut self) -> Option<NodeId> {
        let id = self.queue.pop_front()?;
        self.queued.remove(&id);
        Some(id)
    }

    fn push(&mut self, id: NodeId) {
        if self.queued.insert(id) {
            self.queue.push_back(id);
        }
    }
}

// ── Driver ──────────────────────────────────────────────────────────────────

/// Run `reduction` over `graph` until the worklist drains.
pub fn run<R: Reduction + ?Sized>(
    graph: &mut Graph,
    reduction: &mut R,
    config: &EngineConfig,
) -> Result<ReduceStats> {
    let limit = config.step_limit(graph);
    let mut worklist = Worklist::seeded(graph);
    let mut stats = ReduceStats::default();
    let mut handle = ReduceHandle::default();

    log::debug!(
        "engine: {} over {} nodes (limit {limit})",
        reduction.name(),
        graph.live_count()
    );

    while let Some(node) = worklist.pop() {
        if graph.is_removed(node) {
            continue;
        }
        if stats.visited == limit {
            return Err(Error::FixpointNotReached {
                pass: reduction.name(),
                limit,
            });
        }
        stats.visited += 1;
        log::trace!("visit {node} ({})", graph.opcode(node));

        reduction.reduce(node, graph, &mut handle)?;

        for changed in handle.changed.drain(..) {
            stats.changes += 1;
            for user in graph.uses(changed) {
                worklist.push(user);
            }
        }
        for removed in handle.removed.drain(..) {
            if graph.is_removed(removed) {
                continue;
            }
            let rewired = graph.remove(removed)?;
            stats.removals += 1;
            log::debug!("{}: removed {removed}", reduction.name());
            for user in rewired {
                worklist.push(user);
            }
        }
    }

    log::debug!(
        "engine: {} converged after {} visits ({} changes, {} removals)",
        reduction.name(),
        stats.visited,
        stats.changes,
        stats.removals
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Opcode;

    /// Records visit order; changes each node listed in `bumps` once.
    struct Recorder {
        order: Vec<NodeId>,
        bumps: Vec<NodeId>,
        removals: Vec<NodeId>,
    }

    impl Recorder {
        fn new() -> Self {
            Recorder {
                order: Vec::new(),
                bumps: Vec::new(),
                removals: Vec::new(),
            }
        }
    }

    impl Reduction for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn reduce(&mut self, node: NodeId, _: &Graph, handle: &mut ReduceHandle) -> Result<()> {
            self.order.push(node);
            if let Some(pos) = self.bumps.iter().position(|&n| n == node) {
                self.bumps.remove(pos);
                handle.change(node);
            }
            if let Some(pos) = self.removals.iter().position(|&n| n == node) {
                self.removals.remove(pos);
                handle.remove(node);
            }
            Ok(())
        }
    }

    /// Changes every node on every visit.
    struct Restless;

    impl Reduction for Restless {
        fn name(&self) -> &'static str {
            "restless"
        }

        fn reduce(&mut self, node: NodeId, _: &Graph, handle: &mut ReduceHandle) -> Result<()> {
            handle.change(node);
            Ok(())
        }
    }

    /// a <- b <- c (data), plus d controlled by c.
    fn line() -> (Graph, [NodeId; 4]) {
        let mut g = Graph::new();
        let a = g.add_node(Opcode::Literal, vec![]);
        let b = g.add_node(Opcode::Add, vec![]);
        let c = g.add_node(Opcode::CheckIndex, vec![]);
        let d = g.add_node(Opcode::Load, vec![]);
        g.push_input(b, a);
        g.push_input(c, b);
        g.push_control(d, c);
        (g, [a, b, c, d])
    }

    #[test]
    fn seeds_every_node_in_index_order() {
        let (mut g, ids) = line();
        let mut r = Recorder::new();
        let stats = run(&mut g, &mut r, &EngineConfig::default()).unwrap();
        assert_eq!(r.order, ids.to_vec());
        assert_eq!(stats.visited, 4);
        assert_eq!(stats.changes, 0);
    }

    #[test]
    fn change_requeues_consumers() {
        let mut g = Graph::new();
        // `phi` reads `add`, which sits later in index order.
        let phi = g.add_node(Opcode::Phi, vec![]);
        let add = g.add_node(Opcode::Add, vec![]);
        g.push_input(phi, add);
        let mut r = Recorder::new();
        r.bumps = vec![add];
        let stats = run(&mut g, &mut r, &EngineConfig::default()).unwrap();
        assert_eq!(r.order, vec![phi, add, phi]);
        assert_eq!(stats.changes, 1);
        assert_eq!(stats.visited, 3);
    }

    #[test]
    fn pending_nodes_are_not_queued_twice() {
        let (mut g, [a, b, c, d]) = line();
        let mut r = Recorder::new();
        // b, c and d are still pending when their producers change.
        r.bumps = vec![a, b, c];
        let stats = run(&mut g, &mut r, &EngineConfig::default()).unwrap();
        assert_eq!(r.order, vec![a, b, c, d]);
        assert_eq!(stats.changes, 3);
    }

    #[test]
    fn removal_splices_and_skips_removed_nodes() {
        let mut g = Graph::new();
        let start = g.add_node(Opcode::Start, vec![]);
        let check = g.add_node(Opcode::CheckIndex, vec![]);
        let load = g.add_node(Opcode::Load, vec![]);
        g.push_control(check, start);
        g.push_control(load, check);
        let mut r = Recorder::new();
        r.removals = vec![check];
        let stats = run(&mut g, &mut r, &EngineConfig::default()).unwrap();
        assert_eq!(stats.removals, 1);
        assert!(g.is_removed(check));
        assert_eq!(g.control(load), &[start]);
        // load was still pending; it is visited exactly once.
        assert_eq!(r.order, vec![start, check, load]);
    }

    #[test]
    fn removal_requeues_visited_consumers() {
        let mut g = Graph::new();
        let start = g.add_node(Opcode::Start, vec![]);
        let load = g.add_node(Opcode::Load, vec![]);
        let check = g.add_node(Opcode::CheckIndex, vec![]);
        g.push_control(check, start);
        g.push_control(load, check);
        let mut r = Recorder::new();
        r.removals = vec![check];
        run(&mut g, &mut r, &EngineConfig::default()).unwrap();
        assert_eq!(r.order, vec![start, load, check, load]);
    }

    #[test]
    fn non_monotonic_reduction_hits_ceiling() {
        let mut g = Graph::new();
        let a = g.add_node(Opcode::Phi, vec![]);
        let b = g.add_node(Opcode::Add, vec![]);
        g.push_input(a, b);
        g.push_input(b, a);
        let config = EngineConfig {
            max_steps: Some(10),
        };
        assert_eq!(
            run(&mut g, &mut Restless, &config),
            Err(Error::FixpointNotReached {
                pass: "restless",
                limit: 10
            })
        );
    }

    #[test]
    fn default_ceiling_scales_with_graph() {
        let (g, _) = line();
        assert_eq!(
            EngineConfig::default().step_limit(&g),
            4 * DEFAULT_STEPS_PER_NODE
        );
        assert_eq!(
            EngineConfig::default().step_limit(&Graph::new()),
            DEFAULT_STEPS_PER_NODE
        );
    }

    #[test]
    fn removing_a_value_still_in_use_fails() {
        let (mut g, [a, ..]) = line();
        let mut r = Recorder::new();
        r.removals = vec![a];
        let err = run(&mut g, &mut r, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, Error::NodeHasDataUses { node, .. } if node == a));
    }
}
