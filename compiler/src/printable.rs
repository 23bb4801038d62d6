// printable.rs — Render a scheduled program in printable pipeline notation
//
// Output parses back with `parser::parse` into an equivalent graph:
// control inputs first (`^b1`, `^i5`), then literal operands, then data
// inputs, comma-separated; block edges follow each block.
//
// Preconditions: `schedule` was produced from `graph`.
// Postconditions: one instruction per line, names as reindexed by the
//                 scheduler.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::fmt::Write;

use crate::facts::Facts;
use crate::graph::{Graph, NodeId};
use crate::schedule::ScheduledProgram;

/// Render the scheduled program.
pub fn render(graph: &Graph, schedule: &ScheduledProgram) -> String {
    let name = |id: NodeId| -> String {
        schedule
            .name(id)
            .map(str::to_string)
            .unwrap_or_else(|| id.to_string())
    };

    let mut buf = String::new();
    writeln!(buf, "pipeline {{").unwrap();
    for block in &schedule.blocks {
        writeln!(buf, "  {} {{", name(block.head)).unwrap();
        for &id in &block.instrs {
            let mut args: Vec<String> = Vec::new();
            args.extend(graph.control(id).iter().map(|&c| format!("^{}", name(c))));
            args.extend(graph.literals(id).iter().map(ToString::to_string));
            args.extend(graph.inputs(id).iter().map(|&i| name(i)));

            write!(buf, "    {} = {}", name(id), graph.opcode(id)).unwrap();
            if !args.is_empty() {
                write!(buf, " {}", args.join(", ")).unwrap();
            }
            writeln!(buf).unwrap();
        }
        writeln!(buf, "  }}").unwrap();
        if !block.successors.is_empty() {
            let succs: Vec<String> = block.successors.iter().map(|&s| name(s)).collect();
            writeln!(buf, "  {} -> {}", name(block.head), succs.join(", ")).unwrap();
        }
    }
    writeln!(buf, "}}").unwrap();
    buf
}

/// One line per live node of the unscheduled graph, with its source name,
/// recorded range and, for block heads, the limits recorded there.
pub fn summary(graph: &Graph, facts: &Facts) -> String {
    let name = |id: NodeId| -> String {
        graph
            .node(id)
            .name
            .clone()
            .unwrap_or_else(|| id.to_string())
    };

    let mut buf = String::new();
    for id in graph.node_ids() {
        write!(buf, "{id:<4} {:<6} {}", name(id), graph.opcode(id)).unwrap();
        let range = facts.range(id);
        if range != Default::default() {
            write!(buf, "  : {range}").unwrap();
        }
        writeln!(buf).unwrap();
        for (value, limit) in facts.limits_in(id) {
            let bound = limit.bound.map(&name).unwrap_or_else(|| "-".to_string());
            writeln!(buf, "       limit {} {} {}", name(value), limit.kind, bound).unwrap();
        }
    }
    buf
}
