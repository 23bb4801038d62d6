// schedule.rs — Linearize an optimized graph back into basic blocks
//
// Places every live non-block node in a block, in creation order, and
// recovers block successors from the control uses of each block's last
// instruction. Names are reindexed: blocks `b0..`, instructions `i0..` in
// schedule order.
//
// Preconditions: `graph` is a (possibly reduced) CFG-mode graph; block heads
//                are `start`/`region` nodes.
// Postconditions: every live node appears exactly once, either as a block
//                 head or as an instruction; see `verify_schedule`.
// Failure modes: none; nodes with no reachable block fall into the entry
//                block.
// Side effects: none.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::graph::{Graph, NodeId};
use crate::pass::StageCert;

// ── Public types ────────────────────────────────────────────────────────────

/// One basic block of the scheduled program.
#[derive(Debug, Clone)]
pub struct ScheduledBlock {
    pub head: NodeId,
    pub instrs: Vec<NodeId>,
    /// Successor block heads, in the terminator's control-use order.
    pub successors: Vec<NodeId>,
}

impl ScheduledBlock {
    pub fn terminator(&self) -> Option<NodeId> {
        self.instrs.last().copied()
    }
}

/// Blocks in order plus the reindexed printable names.
#[derive(Debug, Clone, Default)]
pub struct ScheduledProgram {
    pub blocks: Vec<ScheduledBlock>,
    names: HashMap<NodeId, String>,
}

impl ScheduledProgram {
    /// Reindexed name of a scheduled node (`b2`, `i7`).
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn instr_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instrs.len()).sum()
    }
}

// ── Scheduling ──────────────────────────────────────────────────────────────

/// Schedule `graph` into blocks.
pub fn schedule(graph: &Graph) -> ScheduledProgram {
    let heads: Vec<NodeId> = graph
        .node_ids()
        .filter(|&id| graph.opcode(id).is_block_head())
        .collect();
    let Some(&entry) = heads.first() else {
        return ScheduledProgram::default();
    };

    let index: HashMap<NodeId, usize> = heads.iter().enumerate().map(|(i, &h)| (h, i)).collect();
    let mut blocks: Vec<ScheduledBlock> = heads
        .iter()
        .map(|&head| ScheduledBlock {
            head,
            instrs: Vec::new(),
            successors: Vec::new(),
        })
        .collect();

    for id in graph.node_ids() {
        if index.contains_key(&id) {
            continue;
        }
        let home = home_block(graph, id, &index).unwrap_or(entry);
        blocks[index[&home]].instrs.push(id);
    }

    for block in &mut blocks {
        if let Some(term) = block.terminator() {
            block.successors = graph
                .control_uses(term)
                .iter()
                .map(|u| u.node)
                .filter(|n| index.contains_key(n))
                .collect();
        }
    }

    let mut names = HashMap::new();
    let mut next_instr = 0;
    for (i, block) in blocks.iter().enumerate() {
        names.insert(block.head, format!("b{i}"));
        for &id in &block.instrs {
            names.insert(id, format!("i{next_instr}"));
            next_instr += 1;
        }
    }

    log::debug!(
        "schedule: {} blocks, {} instructions",
        blocks.len(),
        next_instr
    );
    ScheduledProgram { blocks, names }
}

/// The declared block if it is still live, else the block of the nearest
/// control ancestor.
fn home_block(graph: &Graph, id: NodeId, index: &HashMap<NodeId, usize>) -> Option<NodeId> {
    if let Some(block) = graph.node(id).block {
        if index.contains_key(&block) {
            return Some(block);
        }
    }
    let mut seen = HashSet::new();
    let mut current = id;
    while let Some(&above) = graph.control(current).first() {
        if index.contains_key(&above) {
            return Some(above);
        }
        if let Some(block) = graph.node(above).block.filter(|b| index.contains_key(b)) {
            return Some(block);
        }
        if !seen.insert(above) {
            break;
        }
        current = above;
    }
    None
}

// ── Verification ────────────────────────────────────────────────────────────

/// Machine-checkable evidence for schedule postconditions.
#[derive(Debug, Clone)]
pub struct ScheduleCert {
    /// S1: every live graph node is scheduled exactly once.
    pub s1_all_nodes_placed: bool,
    /// S2: every recorded successor is a scheduled block head.
    pub s2_successors_are_blocks: bool,
}

impl StageCert for ScheduleCert {
    fn all_pass(&self) -> bool {
        self.s1_all_nodes_placed && self.s2_successors_are_blocks
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("S1_all_nodes_placed", self.s1_all_nodes_placed),
            ("S2_successors_are_blocks", self.s2_successors_are_blocks),
        ]
    }
}

pub fn verify_schedule(schedule: &ScheduledProgram, graph: &Graph) -> ScheduleCert {
    let mut seen = HashSet::new();
    let mut unique = true;
    for block in &schedule.blocks {
        for &id in std::iter::once(&block.head).chain(&block.instrs) {
            unique &= seen.insert(id);
        }
    }
    let s1 = unique && seen.len() == graph.live_count() && graph.node_ids().all(|id| seen.contains(&id));

    let heads: HashSet<NodeId> = schedule.blocks.iter().map(|b| b.head).collect();
    let s2 = schedule
        .blocks
        .iter()
        .flat_map(|b| &b.successors)
        .all(|s| heads.contains(s));

    ScheduleCert {
        s1_all_nodes_placed: s1,
        s2_successors_are_blocks: s2,
    }
}

// ── Display ─────────────────────────────────────────────────────────────────

impl fmt::Display for ScheduledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ScheduledProgram ({} blocks)", self.blocks.len())?;
        for block in &self.blocks {
            let name = |id: NodeId| self.name(id).unwrap_or("?").to_string();
            let instrs: Vec<String> = block.instrs.iter().map(|&i| name(i)).collect();
            let succs: Vec<String> = block.successors.iter().map(|&s| name(s)).collect();
            writeln!(
                f,
                "  {}: [{}] -> [{}]",
                name(block.head),
                instrs.join(", "),
                succs.join(", ")
            )?;
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
