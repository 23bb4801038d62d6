use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use rangeopt::engine::EngineConfig;
use rangeopt::pass::PassId;
use rangeopt::pipeline::{run_pipeline, CompilationState, PipelineOptions};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitStage {
    /// Optimized program in printable notation
    Printable,
    /// Optimized program as a Graphviz digraph
    Dot,
    /// Range and limit facts as JSON
    Facts,
    /// Unscheduled graph with facts, one node per line
    Graph,
}

#[derive(Parser, Debug)]
#[command(
    name = "rangeopt",
    version,
    about = "Range analysis and bounds-check elimination for printable SSA pipelines"
)]
struct Cli {
    /// Input source in printable pipeline notation
    source: PathBuf,

    /// Write output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output stage
    #[arg(long, value_enum, default_value_t = EmitStage::Printable)]
    emit: EmitStage,

    /// Reduction step ceiling per engine run (default: 64 per node)
    #[arg(long)]
    max_steps: Option<usize>,

    /// Skip bounds-check elimination
    #[arg(long)]
    no_bce: bool,

    /// Print phases, timing and debug logs
    #[arg(long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_module("rangeopt", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    if cli.verbose {
        eprintln!("rangeopt: source = {}", cli.source.display());
        eprintln!("rangeopt: emit   = {:?}", cli.emit);
    }

    // ── Read and parse source ──
    let source = match std::fs::read_to_string(&cli.source) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("rangeopt: error: {}: {}", cli.source.display(), e);
            std::process::exit(2);
        }
    };
    let path = cli.source.display().to_string();

    let t = std::time::Instant::now();
    let parse_result = rangeopt::parser::parse(&source);
    if !parse_result.errors.is_empty() {
        for err in &parse_result.errors {
            let diag = rangeopt::diag::Diagnostic::from_parse_error(err);
            eprintln!("{}", diag.render(&path, &source));
        }
        std::process::exit(1);
    }
    let Some(program) = parse_result.program else {
        eprintln!("rangeopt: parse failed with no output");
        std::process::exit(1);
    };
    if cli.verbose {
        eprintln!(
            "rangeopt: parse complete, {:.1}ms",
            t.elapsed().as_secs_f64() * 1000.0
        );
    }

    // ── Passes ──
    let terminal = match cli.emit {
        EmitStage::Printable | EmitStage::Dot => PassId::Schedule,
        EmitStage::Facts | EmitStage::Graph => PassId::CheckElimination,
    };
    let options = PipelineOptions {
        engine: EngineConfig {
            max_steps: cli.max_steps,
        },
        eliminate_checks: !cli.no_bce,
        verbose: cli.verbose,
    };

    let mut state = CompilationState::new(program);
    let result = run_pipeline(&mut state, terminal, &options, |_, diags| {
        for diag in diags {
            eprintln!("{}", diag.render(&path, &source));
        }
    });
    if let Err(err) = result {
        match &err.source {
            Some(cause) => eprintln!("rangeopt: error: {err}: {cause}"),
            None => eprintln!("rangeopt: error: {err}"),
        }
        std::process::exit(1);
    }

    if cli.verbose {
        for stats in &state.stats {
            if let Some(reduce) = stats.reduce {
                eprintln!(
                    "rangeopt: {:?}: {} visits, {} changes, {} removals",
                    stats.pass, reduce.visited, reduce.changes, reduce.removals
                );
            }
        }
    }

    // ── Emit ──
    let graph = state.graph.as_ref().context("graph was not built")?;
    let text = match cli.emit {
        EmitStage::Printable => {
            let schedule = state.schedule.as_ref().context("schedule was not built")?;
            rangeopt::printable::render(graph, schedule)
        }
        EmitStage::Dot => {
            let schedule = state.schedule.as_ref().context("schedule was not built")?;
            rangeopt::dot::emit_dot(graph, schedule)
        }
        EmitStage::Facts => {
            let facts = state.facts.as_ref().context("facts were not computed")?;
            let mut json = serde_json::to_string_pretty(&facts.report(graph))?;
            json.push('\n');
            json
        }
        EmitStage::Graph => {
            let facts = state.facts.as_ref().context("facts were not computed")?;
            rangeopt::printable::summary(graph, facts)
        }
    };

    match &cli.output {
        Some(out) => {
            if let Err(e) = std::fs::write(out, &text) {
                eprintln!("rangeopt: error: {}: {}", out.display(), e);
                std::process::exit(2);
            }
        }
        None => print!("{text}"),
    }
    Ok(())
}
