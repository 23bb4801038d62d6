// pass.rs — Pass descriptors and dependency resolution
//
// Declares the optimizer's passes (parse is outside the runner), their
// dependency edges and the artifacts they produce. The pipeline runner uses
// `required_passes` to run the minimal prefix for each `--emit` target.

use std::collections::HashSet;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each pass (parse excluded, handled before the runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    BuildGraph,
    RangeAnalysis,
    CheckElimination,
    Schedule,
}

/// Artifacts held by the compilation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Graph,     // Graph
    Facts,     // Facts
    Reduced,   // Graph after check removal
    Scheduled, // ScheduledProgram
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics/verbose output.
    pub name: &'static str,
    /// Passes whose outputs this pass consumes.
    pub inputs: &'static [PassId],
    /// Artifacts this pass produces.
    pub outputs: &'static [ArtifactId],
    /// Pre/post conditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::BuildGraph => PassDescriptor {
            name: "build_graph",
            inputs: &[],
            outputs: &[ArtifactId::Graph],
            invariants: "every name resolved, block edges wired in declaration order",
        },
        PassId::RangeAnalysis => PassDescriptor {
            name: "range_analysis",
            inputs: &[PassId::BuildGraph],
            outputs: &[ArtifactId::Facts],
            invariants: "ranges and limits at fixpoint",
        },
        PassId::CheckElimination => PassDescriptor {
            name: "check_elimination",
            inputs: &[PassId::RangeAnalysis],
            outputs: &[ArtifactId::Reduced],
            invariants: "only provably in-bounds checks removed",
        },
        PassId::Schedule => PassDescriptor {
            name: "schedule",
            inputs: &[PassId::CheckElimination],
            outputs: &[ArtifactId::Scheduled],
            invariants: "every live node placed exactly once",
        },
    }
}

// ── Verification ───────────────────────────────────────────────────────────

/// Evidence that a pass met its postconditions.
pub trait StageCert {
    fn all_pass(&self) -> bool;
    /// Named obligations and whether each holds.
    fn obligations(&self) -> Vec<(&'static str, bool)>;
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order.
pub const ALL_PASSES: [PassId; 4] = [
    PassId::BuildGraph,
    PassId::RangeAnalysis,
    PassId::CheckElimination,
    PassId::Schedule,
];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────
