// Property-based tests for the analysis and elimination passes.
//
// Three categories:
// 1. Elimination decision: a generated counted loop loses its check exactly
//    when the counter starts non-negative, strictly increases, and the guard
//    is `<` against the length of the checked array
// 2. Type monotonicity: no reduction ever moves a value back up the lattice
// 3. Idempotence: a second run over the fixpoint changes nothing
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use proptest::prelude::*;

use rangeopt::bce::EliminateChecks;
use rangeopt::engine::{run, EngineConfig, ReduceHandle, Reduction};
use rangeopt::facts::{Facts, Range, RangeType};
use rangeopt::graph::{Graph, NodeId, Opcode};
use rangeopt::range::RangeAndLimit;

// ── Loop generator ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CountedLoop {
    init: i64,
    step: i64,
    same_array: bool,
    op: &'static str,
}

impl CountedLoop {
    fn source(&self) -> String {
        let guard = if self.same_array { "i1" } else { "i2" };
        format!(
            "pipeline {{
  b0 {{
    i0 = literal {init}
    i1 = array
    i2 = array
    i3 = jump ^b0
  }}
  b0 -> b1
  b1 {{
    i4 = ssa:phi ^b1, i0, i10
    i5 = loadArrayLength {guard}
    i6 = cmp \"{op}\", i4, i5
    i7 = if ^i4, i6
  }}
  b1 -> b2, b3
  b2 {{
    i8 = checkIndex ^b2, i1, i4
    i9 = literal {step}
    i10 = add i4, i9
    i11 = jump ^i8
  }}
  b2 -> b1
  b3 {{
    i12 = exit ^b3
  }}
}}
",
            init = self.init,
            step = self.step,
            op = self.op,
        )
    }

    fn check_is_redundant(&self) -> bool {
        self.init >= 0 && self.step > 0 && self.same_array && self.op == "<"
    }
}

fn arb_loop() -> impl Strategy<Value = CountedLoop> {
    (
        -3i64..3,
        -2i64..3,
        any::<bool>(),
        prop_oneof![Just("<"), Just("<=")],
    )
        .prop_map(|(init, step, same_array, op)| CountedLoop {
            init,
            step,
            same_array,
            op,
        })
}

fn build(source: &str) -> Graph {
    rangeopt::build::graph_from_source(source).expect("generated source builds")
}

fn live_checks(graph: &Graph) -> usize {
    graph
        .node_ids()
        .filter(|&n| graph.opcode(n) == &Opcode::CheckIndex)
        .count()
}

// ── Observing wrapper ───────────────────────────────────────────────────────

fn rank(ty: RangeType) -> u8 {
    match ty {
        RangeType::None => 0,
        RangeType::Int => 1,
        RangeType::Any => 2,
    }
}

/// Runs range analysis and records every type transition it makes.
#[derive(Default)]
struct Observed {
    facts: Facts,
    raised: Vec<(NodeId, Range, Range)>,
}

impl Reduction for Observed {
    fn name(&self) -> &'static str {
        "observed-range-analysis"
    }

    fn reduce(
        &mut self,
        node: NodeId,
        graph: &Graph,
        handle: &mut ReduceHandle,
    ) -> rangeopt::error::Result<()> {
        let before: Vec<(NodeId, Range)> = graph
            .node_ids()
            .map(|n| (n, self.facts.range(n)))
            .collect();
        RangeAndLimit::new(&mut self.facts).reduce(node, graph, handle)?;
        for (n, old) in before {
            let new = self.facts.range(n);
            if rank(new.ty) > rank(old.ty) {
                self.raised.push((n, old, new));
            }
        }
        Ok(())
    }
}

// ── Properties ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn check_removed_iff_counter_is_guarded(shape in arb_loop()) {
        let mut graph = build(&shape.source());
        let config = EngineConfig::default();
        let mut facts = Facts::new();
        run(&mut graph, &mut RangeAndLimit::new(&mut facts), &config).unwrap();
        let stats = run(&mut graph, &mut EliminateChecks::new(&facts), &config).unwrap();

        let expected = shape.check_is_redundant();
        prop_assert_eq!(stats.removals == 1, expected, "{:?}", shape);
        prop_assert_eq!(live_checks(&graph), usize::from(!expected));
    }

    #[test]
    fn types_only_descend(shape in arb_loop()) {
        let mut graph = build(&shape.source());
        let mut observed = Observed::default();
        run(&mut graph, &mut observed, &EngineConfig::default()).unwrap();
        prop_assert!(observed.raised.is_empty(), "{:?}: {:?}", shape, observed.raised);
    }

    #[test]
    fn analysis_is_idempotent(shape in arb_loop()) {
        let mut graph = build(&shape.source());
        let config = EngineConfig::default();
        let mut facts = Facts::new();
        run(&mut graph, &mut RangeAndLimit::new(&mut facts), &config).unwrap();
        let report = serde_json::to_string(&facts.report(&graph)).unwrap();

        let again = run(&mut graph, &mut RangeAndLimit::new(&mut facts), &config).unwrap();
        prop_assert_eq!(again.changes, 0);
        prop_assert_eq!(serde_json::to_string(&facts.report(&graph)).unwrap(), report);
    }

    #[test]
    fn induction_lower_bound_is_the_initial_value(init in 0i64..1000, step in 1i64..16) {
        let shape = CountedLoop { init, step, same_array: true, op: "<" };
        let mut graph = build(&shape.source());
        let mut facts = Facts::new();
        run(&mut graph, &mut RangeAndLimit::new(&mut facts), &EngineConfig::default()).unwrap();
        let index = facts.range(graph.find("i4").unwrap());
        prop_assert_eq!(index.ty, RangeType::Int);
        prop_assert_eq!(index.from, rangeopt::facts::Bound::Int(init));
        prop_assert_eq!(index.to, rangeopt::facts::Bound::PosInf);
    }
}
