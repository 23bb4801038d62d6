// dot.rs — Graphviz DOT output for SSA graphs
//
// One cluster per block. Data edges are solid and point from producer to
// consumer; control edges are dashed blue. Removed nodes never appear.
//
// Preconditions: `schedule` was produced from `graph`.
// Postconditions: returns a valid DOT string using the scheduled names.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::graph::{Graph, NodeId};
use crate::schedule::ScheduledProgram;

/// Emit the scheduled graph as a Graphviz DOT string.
pub fn emit_dot(graph: &Graph, schedule: &ScheduledProgram) -> String {
    let mut buf = String::new();
    writeln!(buf, "digraph rangeopt {{").unwrap();
    writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10, shape=box];").unwrap();
    writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];").unwrap();

    for block in &schedule.blocks {
        let block_name = display_name(schedule, block.head);
        writeln!(buf).unwrap();
        writeln!(buf, "    subgraph cluster_{block_name} {{").unwrap();
        writeln!(buf, "        label=\"{block_name}\";").unwrap();
        writeln!(buf, "        style=rounded;").unwrap();
        writeln!(buf, "        color=gray50;").unwrap();
        for &id in std::iter::once(&block.head).chain(&block.instrs) {
            writeln!(
                buf,
                "        n{} [label=\"{}\"];",
                id.0,
                escape(&node_label(graph, schedule, id))
            )
            .unwrap();
        }
        writeln!(buf, "    }}").unwrap();
    }

    writeln!(buf).unwrap();
    for block in &schedule.blocks {
        for &id in std::iter::once(&block.head).chain(&block.instrs) {
            for &input in graph.inputs(id) {
                writeln!(buf, "    n{} -> n{};", input.0, id.0).unwrap();
            }
            for &control in graph.control(id) {
                writeln!(
                    buf,
                    "    n{} -> n{} [style=dashed, color=blue];",
                    control.0, id.0
                )
                .unwrap();
            }
        }
    }

    writeln!(buf, "}}").unwrap();
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn display_name(schedule: &ScheduledProgram, id: NodeId) -> String {
    schedule
        .name(id)
        .map(str::to_string)
        .unwrap_or_else(|| id.to_string())
}

fn node_label(graph: &Graph, schedule: &ScheduledProgram, id: NodeId) -> String {
    let mut label = format!("{} = {}", display_name(schedule, id), graph.opcode(id));
    for lit in graph.literals(id) {
        write!(label, " {lit}").unwrap();
    }
    label
}

/// Escape a label for a double-quoted DOT string.
fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::graph_from_source;
    use crate::schedule::schedule;

    const SRC: &str = "pipeline {
  b0 {
    i0 = array
    i1 = literal 0
    i2 = checkIndex ^b0, i0, i1
    i3 = cmp \"<\", i1, i1
  }
}";

    #[test]
    fn one_cluster_per_block() {
        let g = graph_from_source(SRC).unwrap();
        let dot = emit_dot(&g, &schedule(&g));
        assert!(dot.starts_with("digraph rangeopt {\n"));
        assert_eq!(dot.matches("subgraph cluster_").count(), 1);
        assert!(dot.contains("subgraph cluster_b0 {"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn data_and_control_edges_are_distinguished() {
        let g = graph_from_source(SRC).unwrap();
        let dot = emit_dot(&g, &schedule(&g));
        let [b0, arr, check] = ["b0", "i0", "i2"].map(|n| g.find(n).unwrap().0);
        assert!(dot.contains(&format!("    n{arr} -> n{check};\n")));
        assert!(dot.contains(&format!(
            "    n{b0} -> n{check} [style=dashed, color=blue];\n"
        )));
    }

    #[test]
    fn labels_escape_string_literals() {
        let g = graph_from_source(SRC).unwrap();
        let dot = emit_dot(&g, &schedule(&g));
        assert!(dot.contains("[label=\"i3 = cmp \\\"<\\\"\"];"));
    }

    #[test]
    fn removed_nodes_are_omitted() {
        let mut g = graph_from_source(SRC).unwrap();
        let check = g.find("i2").unwrap();
        g.remove(check).unwrap();
        let dot = emit_dot(&g, &schedule(&g));
        assert!(!dot.contains(&format!("n{} ", check.0)));
        assert!(!dot.contains(&format!("n{};", check.0)));
    }
}
