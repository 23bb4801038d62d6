// pipeline.rs — Compilation state and pass orchestration
//
// Holds every pass artifact and runs the minimal set of passes for a given
// terminal PassId: build the graph, run range analysis to fixpoint, run check
// elimination to fixpoint over the facts it left, then schedule.
//
// Preconditions: `CompilationState::new` received a parsed Program.
// Postconditions: artifacts for all required passes are populated, or
//                 `has_error` is set and `run_pipeline` returned the failing pass.
// Failure modes: error-level build diagnostics; engine errors
//                (`FixpointNotReached`, `MalformedControlGraph`, ...).
// Side effects: calls `on_pass_complete` after each pass; prints timing to
//               stderr in verbose mode.

use std::time::{Duration, Instant};

use crate::ast::Program;
use crate::bce::EliminateChecks;
use crate::diag::{DiagLevel, Diagnostic};
use crate::engine::{run, EngineConfig, ReduceStats};
use crate::error::Error;
use crate::facts::Facts;
use crate::graph::Graph;
use crate::pass::{descriptor, required_passes, PassId, StageCert};
use crate::range::RangeAndLimit;
use crate::schedule::ScheduledProgram;

// ── Options and artifacts ──────────────────────────────────────────────────

/// Knobs for a pipeline run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub engine: EngineConfig,
    /// When false, `CheckElimination` runs as a no-op.
    pub eliminate_checks: bool,
    /// Print per-pass timing to stderr.
    pub verbose: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            engine: EngineConfig::default(),
            eliminate_checks: true,
            verbose: false,
        }
    }
}

/// Per-pass measurements.
#[derive(Debug, Clone, Copy)]
pub struct PassStats {
    pub pass: PassId,
    /// Engine counters, for the passes that run the reduction engine.
    pub reduce: Option<ReduceStats>,
    pub elapsed: Duration,
}

/// Holds all artifacts and accumulated diagnostics.
pub struct CompilationState {
    pub program: Program,
    pub graph: Option<Graph>,
    pub facts: Option<Facts>,
    pub schedule: Option<ScheduledProgram>,
    pub stats: Vec<PassStats>,
    pub diagnostics: Vec<Diagnostic>,
    pub has_error: bool,
}

impl CompilationState {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            graph: None,
            facts: None,
            schedule: None,
            stats: Vec::new(),
            diagnostics: Vec::new(),
            has_error: false,
        }
    }

    /// Engine counters recorded for `pass`, if it ran the engine.
    pub fn reduce_stats(&self, pass: PassId) -> Option<ReduceStats> {
        self.stats
            .iter()
            .find(|s| s.pass == pass)
            .and_then(|s| s.reduce)
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed. Build failures leave their diagnostics in
/// `CompilationState.diagnostics`; analysis failures carry the engine error.
#[derive(Debug, thiserror::Error)]
#[error("pass `{}` failed", pass_name(.failing_pass))]
pub struct PipelineError {
    /// The pass that failed.
    pub failing_pass: PassId,
    #[source]
    pub source: Option<Error>,
}

fn pass_name(id: &PassId) -> &'static str {
    descriptor(*id).name
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn has_error_diags(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| d.level == DiagLevel::Error)
}

fn report_timing(pass_id: PassId, elapsed: Duration, verbose: bool) {
    log::debug!("{} finished in {:?}", descriptor(pass_id).name, elapsed);
    if verbose {
        eprintln!(
            "rangeopt: {} complete, {:.1}ms",
            descriptor(pass_id).name,
            elapsed.as_secs_f64() * 1000.0
        );
    }
}

/// Per-pass post-processing: callback, accumulate, record, verbose, error check.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    reduce: Option<ReduceStats>,
    elapsed: Duration,
    verbose: bool,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_error_diags(&diags);
    state.diagnostics.extend(diags);
    state.stats.push(PassStats {
        pass: pass_id,
        reduce,
        elapsed,
    });
    report_timing(pass_id, elapsed, verbose);
    if is_err {
        state.has_error = true;
        return Err(PipelineError {
            failing_pass: pass_id,
            source: None,
        });
    }
    Ok(())
}

fn fail(state: &mut CompilationState, pass_id: PassId, error: Error) -> PipelineError {
    log::debug!("{} failed: {error}", descriptor(pass_id).name);
    state.has_error = true;
    PipelineError {
        failing_pass: pass_id,
        source: Some(error),
    }
}

/// Artifact missing although its producing pass is required first.
fn missing(state: &mut CompilationState, pass_id: PassId) -> PipelineError {
    state.has_error = true;
    PipelineError {
        failing_pass: pass_id,
        source: None,
    }
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → verbose → error check.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    options: &PipelineOptions,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    for pass_id in required_passes(terminal) {
        log::debug!("running {}", descriptor(pass_id).name);
        let t = Instant::now();
        match pass_id {
            PassId::BuildGraph => {
                let result = crate::build::build_graph(&state.program);
                state.graph = Some(result.graph);
                finish_pass(
                    state,
                    pass_id,
                    result.diagnostics,
                    None,
                    t.elapsed(),
                    options.verbose,
                    &mut on_pass_complete,
                )?;
            }
            PassId::RangeAnalysis => {
                let Some(graph) = state.graph.as_mut() else {
                    return Err(missing(state, pass_id));
                };
                let mut facts = Facts::new();
                let outcome = run(graph, &mut RangeAndLimit::new(&mut facts), &options.engine);
                state.facts = Some(facts);
                let stats = outcome.map_err(|e| fail(state, pass_id, e))?;
                finish_pass(
                    state,
                    pass_id,
                    Vec::new(),
                    Some(stats),
                    t.elapsed(),
                    options.verbose,
                    &mut on_pass_complete,
                )?;
            }
            PassId::CheckElimination => {
                let (Some(graph), Some(facts)) = (state.graph.as_mut(), state.facts.as_ref()) else {
                    return Err(missing(state, pass_id));
                };
                let stats = if options.eliminate_checks {
                    let outcome = run(graph, &mut EliminateChecks::new(facts), &options.engine);
                    Some(outcome.map_err(|e| fail(state, pass_id, e))?)
                } else {
                    log::debug!("check elimination disabled");
                    None
                };
                finish_pass(
                    state,
                    pass_id,
                    Vec::new(),
                    stats,
                    t.elapsed(),
                    options.verbose,
                    &mut on_pass_complete,
                )?;
            }
            PassId::Schedule => {
                let Some(graph) = state.graph.as_ref() else {
                    return Err(missing(state, pass_id));
                };
                let scheduled = crate::schedule::schedule(graph);
                let cert = crate::schedule::verify_schedule(&scheduled, graph);
                let mut diags = Vec::new();
                if !cert.all_pass() {
                    let failed: Vec<_> = cert
                        .obligations()
                        .into_iter()
                        .filter(|(_, ok)| !ok)
                        .map(|(name, _)| name)
                        .collect();
                    diags.push(Diagnostic::error(
                        state.program.span,
                        format!("schedule verification failed: {}", failed.join(", ")),
                    ));
                }
                state.schedule = Some(scheduled);
                finish_pass(
                    state,
                    pass_id,
                    diags,
                    None,
                    t.elapsed(),
                    options.verbose,
                    &mut on_pass_complete,
                )?;
            }
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────
