// graph.rs — Arena-based SSA graph for pipeline programs
//
// Nodes live in an arena addressed by stable `NodeId`. Each node carries an
// opcode, ordered data inputs, ordered control inputs and literal operands.
// Reverse edges (data uses and control uses) are kept in per-node indices that
// every mutation updates, so consumers can be found without a scan.
//
// Preconditions: none; graphs are built incrementally via `add_node`,
//                `push_input` and `push_control`.
// Postconditions: use indices mirror the forward edges of all live nodes.
// Failure modes: `remove` rejects nodes whose value is still read, and nodes
//                that are already removed (`error::Error`).
// Side effects: none.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};

// ── Public types ────────────────────────────────────────────────────────────

/// Stable identifier of a node within a `Graph`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("n{}", self.0))
    }
}

/// The operation a node performs.
///
/// Only the opcodes the analyses inspect get their own variant; everything
/// else is carried through as `Other` with its textual name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    Start,
    Region,
    Literal,
    Phi,
    Add,
    Cmp,
    If,
    Jump,
    Exit,
    Array,
    Load,
    LoadArrayLength,
    CheckIndex,
    Other(String),
}

impl Opcode {
    /// Map a textual opcode (`ssa:phi`, `checkIndex`, ...) to its variant.
    pub fn parse(name: &str) -> Self {
        match name {
            "start" => Opcode::Start,
            "region" => Opcode::Region,
            "literal" => Opcode::Literal,
            "ssa:phi" => Opcode::Phi,
            "add" => Opcode::Add,
            "cmp" => Opcode::Cmp,
            "if" => Opcode::If,
            "jump" => Opcode::Jump,
            "exit" => Opcode::Exit,
            "array" => Opcode::Array,
            "load" => Opcode::Load,
            "loadArrayLength" => Opcode::LoadArrayLength,
            "checkIndex" => Opcode::CheckIndex,
            other => Opcode::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Opcode::Start => "start",
            Opcode::Region => "region",
            Opcode::Literal => "literal",
            Opcode::Phi => "ssa:phi",
            Opcode::Add => "add",
            Opcode::Cmp => "cmp",
            Opcode::If => "if",
            Opcode::Jump => "jump",
            Opcode::Exit => "exit",
            Opcode::Array => "array",
            Opcode::Load => "load",
            Opcode::LoadArrayLength => "loadArrayLength",
            Opcode::CheckIndex => "checkIndex",
            Opcode::Other(name) => name,
        }
    }

    /// `start` and `region` open a block; limits are recorded against them.
    pub fn is_block_head(&self) -> bool {
        matches!(self, Opcode::Start | Opcode::Region)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A literal operand attached to a node (`literal 5`, `cmp "<"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i64),
    Str(String),
}

impl Literal {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(v) => Some(*v),
            Literal::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(s) => Some(s),
            Literal::Int(_) => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

/// One consumer of a node's control output: `node.control[slot]` points back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlUse {
    pub node: NodeId,
    pub slot: usize,
}

/// A node in the graph.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub opcode: Opcode,
    pub inputs: Vec<NodeId>,
    pub control: Vec<NodeId>,
    pub literals: Vec<Literal>,
    /// Block head (`start`/`region`) the node was declared in. Block heads
    /// point at themselves.
    pub block: Option<NodeId>,
    /// Source name (`i6`, `b1`), if the node came from printable input.
    pub name: Option<String>,
    removed: bool,
}

impl Node {
    pub fn is_removed(&self) -> bool {
        self.removed
    }
}

/// An SSA graph with data and control edges.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    /// Data consumers per node, one entry per consuming input slot.
    data_uses: Vec<Vec<NodeId>>,
    /// Control consumers per node, in the order the edges were added.
    control_uses: Vec<Vec<ControlUse>>,
}

// ── Construction ────────────────────────────────────────────────────────────

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node with no inputs.
    pub fn add_node(&mut self, opcode: Opcode, literals: Vec<Literal>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            opcode,
            inputs: Vec::new(),
            control: Vec::new(),
            literals,
            block: None,
            name: None,
            removed: false,
        });
        self.data_uses.push(Vec::new());
        self.control_uses.push(Vec::new());
        id
    }

    /// Append a data input to `node`.
    pub fn push_input(&mut self, node: NodeId, input: NodeId) {
        self.nodes[node.index()].inputs.push(input);
        self.data_uses[input.index()].push(node);
    }

    /// Append a control input to `node`.
    pub fn push_control(&mut self, node: NodeId, control: NodeId) {
        let slot = self.nodes[node.index()].control.len();
        self.nodes[node.index()].control.push(control);
        self.control_uses[control.index()].push(ControlUse { node, slot });
    }

    pub fn set_block(&mut self, node: NodeId, block: NodeId) {
        self.nodes[node.index()].block = Some(block);
    }

    pub fn set_name(&mut self, node: NodeId, name: impl Into<String>) {
        self.nodes[node.index()].name = Some(name.into());
    }
}

// ── Queries ─────────────────────────────────────────────────────────────────

impl Graph {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn opcode(&self, id: NodeId) -> &Opcode {
        &self.nodes[id.index()].opcode
    }

    pub fn inputs(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].inputs
    }

    pub fn control(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].control
    }

    pub fn literals(&self, id: NodeId) -> &[Literal] {
        &self.nodes[id.index()].literals
    }

    pub fn is_removed(&self, id: NodeId) -> bool {
        self.nodes[id.index()].removed
    }

    /// Nodes reading `id` as data, one entry per input slot.
    pub fn data_uses(&self, id: NodeId) -> &[NodeId] {
        &self.data_uses[id.index()]
    }

    /// Nodes reading `id` as control, in edge insertion order.
    pub fn control_uses(&self, id: NodeId) -> &[ControlUse] {
        &self.control_uses[id.index()]
    }

    /// All consumers of `id` (data or control), deduplicated, ascending.
    pub fn uses(&self, id: NodeId) -> Vec<NodeId> {
        let mut uses: Vec<NodeId> = self.data_uses[id.index()]
            .iter()
            .copied()
            .chain(self.control_uses[id.index()].iter().map(|u| u.node))
            .collect();
        uses.sort_unstable();
        uses.dedup();
        uses
    }

    /// Live node ids in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().filter(|n| !n.removed).map(|n| n.id)
    }

    /// Live nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().filter(|n| !n.removed)
    }

    /// Arena size, including removed nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.removed).count()
    }

    /// Find a live node by its source name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes()
            .find(|n| n.name.as_deref() == Some(name))
            .map(|n| n.id)
    }
}

// ── Mutation ────────────────────────────────────────────────────────────────

impl Graph {
    /// Detach `id` from the graph.
    ///
    /// Every control consumer of `id` is rewired to `id`'s first control
    /// input, so the chain `pred -> id -> succ` becomes `pred -> succ`. When
    /// `id` has no control input the consumer's slot is dropped instead.
    /// Returns the rewired consumers, ascending and deduplicated.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        if self.nodes[id.index()].removed {
            return Err(Error::RemovedNode { node: id });
        }
        if let Some(&user) = self.data_uses[id.index()]
            .iter()
            .find(|u| !self.nodes[u.index()].removed)
        {
            return Err(Error::NodeHasDataUses { node: id, user });
        }

        // Unhook `id` from the use lists of its own inputs.
        let inputs = self.nodes[id.index()].inputs.clone();
        for input in inputs {
            self.data_uses[input.index()].retain(|&u| u != id);
        }
        let controls = self.nodes[id.index()].control.clone();
        for control in &controls {
            self.control_uses[control.index()].retain(|u| u.node != id);
        }

        let replacement = controls.first().copied();
        let mut consumers = std::mem::take(&mut self.control_uses[id.index()]);
        // Dropping slots shifts later ones, so visit high slots first.
        consumers.sort_by(|a, b| b.slot.cmp(&a.slot));

        let mut rewired = Vec::with_capacity(consumers.len());
        for ControlUse { node, slot } in consumers {
            match replacement {
                Some(pred) => {
                    self.nodes[node.index()].control[slot] = pred;
                    self.control_uses[pred.index()].push(ControlUse { node, slot });
                }
                None => self.drop_control_slot(node, slot),
            }
            rewired.push(node);
        }
        rewired.sort_unstable();
        rewired.dedup();

        self.data_uses[id.index()].clear();
        self.nodes[id.index()].removed = true;
        Ok(rewired)
    }

    fn drop_control_slot(&mut self, node: NodeId, slot: usize) {
        let control = self.nodes[node.index()].control.remove(slot);
        debug_assert!(self.is_removed(control) || self.control_uses[control.index()].is_empty());
        for (later, &pred) in self.nodes[node.index()].control.iter().enumerate().skip(slot) {
            for u in self.control_uses[pred.index()].iter_mut() {
                if u.node == node && u.slot == later + 1 {
                    u.slot = later;
                }
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
