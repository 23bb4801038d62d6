// rangeopt — Range analysis and bounds-check elimination for SSA graphs
//
// Library root. Front end (lexer, parser, build), the fixpoint engine and its
// reductions (range, limit, bce), then scheduling and rendering.

pub mod ast;
pub mod bce;
pub mod build;
pub mod diag;
pub mod dot;
pub mod engine;
pub mod error;
pub mod facts;
pub mod graph;
pub mod lexer;
pub mod limit;
pub mod parser;
pub mod pass;
pub mod pipeline;
pub mod printable;
pub mod range;
pub mod schedule;
