// build.rs — Printable AST → SSA graph (CFG mode)
//
// Turns a parsed `pipeline { ... }` program into a `Graph`. The first block
// becomes `start`, every other block a `region`. Block edges `bX -> bY, bZ`
// append the terminator (last instruction) of `bX` to the control inputs of
// `bY` and `bZ`, in that order, so a branch's control uses follow edge order.
//
// Preconditions: `program` is a complete AST from `parser::parse`.
// Postconditions: every block and instruction has a node named after it;
//                 every resolvable operand is wired as a data or control edge.
// Failure modes: unknown names, duplicate definitions and malformed edges are
//                reported as `Diagnostic`s; the graph is still returned with
//                the offending edges left out.
// Side effects: none.

use std::collections::HashMap;

use crate::ast::{Block, Ident, Instr, Operand, Program, Span};
use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::graph::{Graph, Literal, NodeId, Opcode};

// ── Public API ──────────────────────────────────────────────────────────────

/// Result of graph construction.
#[derive(Debug)]
pub struct BuildResult {
    pub graph: Graph,
    pub diagnostics: Vec<Diagnostic>,
}

/// Build the SSA graph for a printable program.
pub fn build_graph(program: &Program) -> BuildResult {
    let mut builder = GraphBuilder::default();
    builder.allocate(program);
    let instrs = program.blocks().flat_map(|block| block.instrs.iter());
    for (instr, id) in instrs.zip(std::mem::take(&mut builder.instrs)) {
        builder.wire_instr(instr, id);
    }
    for edge in program.edges() {
        builder.wire_edge(&edge.from, &edge.to);
    }
    log::debug!(
        "build: {} nodes from {} blocks",
        builder.graph.len(),
        builder.blocks.len()
    );

    BuildResult {
        graph: builder.graph,
        diagnostics: builder.diagnostics,
    }
}

/// Parse and build in one step. Fails with every diagnostic when any of them
/// is an error; warnings alone are dropped.
pub fn graph_from_source(source: &str) -> Result<Graph, Vec<Diagnostic>> {
    let parsed = crate::parser::parse(source);
    let mut diagnostics: Vec<Diagnostic> = parsed
        .errors
        .iter()
        .map(Diagnostic::from_parse_error)
        .collect();
    let Some(program) = parsed.program else {
        return Err(diagnostics);
    };
    let built = build_graph(&program);
    diagnostics.extend(built.diagnostics);
    if diagnostics.iter().any(Diagnostic::is_error) {
        return Err(diagnostics);
    }
    Ok(built.graph)
}

// ── Builder ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Definition {
    id: NodeId,
    span: Span,
}

#[derive(Default)]
struct GraphBuilder {
    graph: Graph,
    names: HashMap<String, Definition>,
    /// Block head → terminator (last instruction), if the block has one.
    blocks: HashMap<NodeId, Option<NodeId>>,
    /// Instruction nodes in source order, for wiring in the second phase.
    instrs: Vec<NodeId>,
    diagnostics: Vec<Diagnostic>,
}

impl GraphBuilder {
    /// Phase 1: one node per block header and instruction, in source order.
    fn allocate(&mut self, program: &Program) {
        for (index, block) in program.blocks().enumerate() {
            let opcode = if index == 0 {
                Opcode::Start
            } else {
                Opcode::Region
            };
            let head = self.graph.add_node(opcode, Vec::new());
            self.graph.set_block(head, head);
            self.define(&block.name, head);
            self.allocate_instrs(block, head);
        }
    }

    fn allocate_instrs(&mut self, block: &Block, head: NodeId) {
        let mut terminator = None;
        for instr in &block.instrs {
            let literals = instr
                .operands
                .iter()
                .filter_map(|op| match op {
                    Operand::Int(v, _) => Some(Literal::Int(*v)),
                    Operand::Str(s, _) => Some(Literal::Str(s.clone())),
                    Operand::Value(_) => None,
                })
                .collect();
            let id = self
                .graph
                .add_node(Opcode::parse(&instr.opcode.name), literals);
            self.graph.set_block(id, head);
            self.define(&instr.name, id);
            self.instrs.push(id);
            terminator = Some(id);
        }
        self.blocks.insert(head, terminator);
    }

    fn define(&mut self, name: &Ident, id: NodeId) {
        self.graph.set_name(id, name.name.clone());
        if let Some(prev) = self.names.get(&name.name) {
            self.diagnostics.push(
                Diagnostic::error(
                    name.span,
                    format!("duplicate definition of `{}`", name.name),
                )
                .with_code(codes::E0101)
                .with_related(prev.span, "first defined here"),
            );
            return;
        }
        self.names.insert(
            name.name.clone(),
            Definition {
                id,
                span: name.span,
            },
        );
    }

    fn lookup(&mut self, name: &Ident, what: &str) -> Option<NodeId> {
        match self.names.get(&name.name) {
            Some(def) => Some(def.id),
            None => {
                self.diagnostics.push(
                    Diagnostic::error(
                        name.span,
                        format!("unknown {what} `{}`", name.name),
                    )
                    .with_code(codes::E0100),
                );
                None
            }
        }
    }

    /// Phase 2: resolve control inputs, then data operands.
    fn wire_instr(&mut self, instr: &Instr, id: NodeId) {
        for control in &instr.control {
            if let Some(target) = self.lookup(control, "control input") {
                self.graph.push_control(id, target);
            }
        }
        for operand in &instr.operands {
            if let Operand::Value(name) = operand {
                if let Some(input) = self.lookup(name, "value") {
                    self.graph.push_input(id, input);
                }
            }
        }
    }

    fn wire_edge(&mut self, from: &Ident, to: &[Ident]) {
        let Some(source) = self.lookup_block(from) else {
            return;
        };
        let Some(terminator) = self.blocks.get(&source).copied().flatten() else {
            self.diagnostics.push(
                Diagnostic::error(
                    from.span,
                    format!("block `{}` has no terminator to branch from", from.name),
                )
                .with_code(codes::E0102)
                .with_hint("end the block with a `jump` or `if` instruction"),
            );
            return;
        };
        for target in to {
            if let Some(head) = self.lookup_block(target) {
                if self.graph.opcode(head) == &Opcode::Start {
                    self.diagnostics.push(
                        Diagnostic::new(
                            DiagLevel::Warning,
                            target.span,
                            format!("edge into entry block `{}`", target.name),
                        )
                        .with_code(codes::W0001),
                    );
                }
                self.graph.push_control(head, terminator);
            }
        }
    }

    fn lookup_block(&mut self, name: &Ident) -> Option<NodeId> {
        let id = self.lookup(name, "block")?;
        if self.blocks.contains_key(&id) {
            return Some(id);
        }
        self.diagnostics.push(
            Diagnostic::error(name.span, format!("`{}` is not a block", name.name))
                .with_code(codes::E0103),
        );
        None
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn build(source: &str) -> BuildResult {
        let parsed = parse(source);
        assert!(parsed.errors.is_empty(), "parse errors: {:?}", parsed.errors);
        build_graph(&parsed.program.expect("program"))
    }

    fn build_ok(source: &str) -> Graph {
        let result = build(source);
        assert!(
            result.diagnostics.is_empty(),
            "unexpected diagnostics: {:#?}",
            result.diagnostics
        );
        result.graph
    }

    const LOOP: &str = "pipeline {
  b0 {
    i0 = literal 0
    i1 = jump ^b0
  }
  b0 -> b1
  b1 {
    i2 = ssa:phi ^b1 i0, i4
    i3 = literal 1
    i4 = add i2, i3
    i5 = cmp \"<\", i2, i3
    i6 = if ^i2, i5
  }
  b1 -> b2, b1
  b2 {
    i7 = exit ^b2
  }
}";

    #[test]
    fn first_block_is_start_others_are_regions() {
        let g = build_ok(LOOP);
        assert_eq!(g.opcode(g.find("b0").unwrap()), &Opcode::Start);
        assert_eq!(g.opcode(g.find("b1").unwrap()), &Opcode::Region);
        assert_eq!(g.opcode(g.find("b2").unwrap()), &Opcode::Region);
    }

    #[test]
    fn forward_references_resolve() {
        let g = build_ok(LOOP);
        let phi = g.find("i2").unwrap();
        assert_eq!(
            g.inputs(phi),
            &[g.find("i0").unwrap(), g.find("i4").unwrap()]
        );
        assert_eq!(g.control(phi), &[g.find("b1").unwrap()]);
    }

    #[test]
    fn literals_and_inputs_are_split() {
        let g = build_ok(LOOP);
        let cmp = g.find("i5").unwrap();
        assert_eq!(g.literals(cmp), &[Literal::Str("<".to_string())]);
        assert_eq!(g.inputs(cmp).len(), 2);
        assert_eq!(
            g.literals(g.find("i3").unwrap()),
            &[Literal::Int(1)]
        );
    }

    #[test]
    fn edges_follow_declaration_order() {
        let g = build_ok(LOOP);
        let b1 = g.find("b1").unwrap();
        let b2 = g.find("b2").unwrap();
        let branch = g.find("i6").unwrap();
        // b1 is entered from b0's jump first, then from its own branch.
        assert_eq!(g.control(b1), &[g.find("i1").unwrap(), branch]);
        let successors: Vec<_> = g.control_uses(branch).iter().map(|u| u.node).collect();
        assert_eq!(successors, vec![b2, b1]);
    }

    #[test]
    fn nodes_remember_their_block() {
        let g = build_ok(LOOP);
        let b1 = g.find("b1").unwrap();
        assert_eq!(g.node(g.find("i4").unwrap()).block, Some(b1));
        assert_eq!(g.node(b1).block, Some(b1));
    }

    #[test]
    fn unknown_value_is_reported() {
        let result = build("pipeline {\n  b0 {\n    i0 = add i1, i2\n  }\n}");
        let messages: Vec<_> = result
            .diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(messages, vec!["unknown value `i1`", "unknown value `i2`"]);
        assert!(result
            .diagnostics
            .iter()
            .all(|d| d.code == Some(codes::E0100)));
    }

    #[test]
    fn duplicate_definition_is_reported() {
        let result =
            build("pipeline {\n  b0 {\n    i0 = literal 0\n    i0 = literal 1\n  }\n}");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, Some(codes::E0101));
        assert_eq!(result.diagnostics[0].related_spans.len(), 1);
    }

    #[test]
    fn edge_from_empty_block_is_reported() {
        let result = build("pipeline {\n  b0 {\n  }\n  b1 {\n  }\n  b0 -> b1\n}");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, Some(codes::E0102));
    }

    #[test]
    fn edge_to_instruction_is_reported() {
        let result = build("pipeline {\n  b0 {\n    i0 = jump ^b0\n  }\n  b0 -> i0\n}");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, Some(codes::E0103));
    }

    #[test]
    fn graph_from_source_collects_parse_and_build_errors() {
        let errors = graph_from_source("pipeline {\n  b0 {\n    i0 = add i9\n  }\n}")
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, Some(codes::E0100));

        let errors = graph_from_source("pipeline {").unwrap_err();
        assert!(errors.iter().all(|d| d.code == Some(codes::E0001)));
        assert!(!errors.is_empty());

        assert!(graph_from_source(LOOP).is_ok());
    }

    #[test]
    fn edge_into_entry_block_warns() {
        let result = build("pipeline {\n  b0 {\n    i0 = jump ^b0\n  }\n  b0 -> b0\n}");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].level, DiagLevel::Warning);
        let b0 = result.graph.find("b0").unwrap();
        assert_eq!(result.graph.control(b0), &[result.graph.find("i0").unwrap()]);
    }
}
