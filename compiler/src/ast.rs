// AST node types for printable pipeline graphs.
//
// Mirrors the textual notation one-to-one: blocks, instructions and block
// edges. Names are kept as written; resolution to graph nodes happens in
// `build`. Every node carries a `SimpleSpan` for error reporting.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// A complete `pipeline { ... }` program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Item>,
    pub span: Span,
}

impl Program {
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.items.iter().filter_map(|item| match item {
            Item::Block(block) => Some(block),
            Item::Edge(_) => None,
        })
    }

    pub fn edges(&self) -> impl Iterator<Item = &BlockEdge> {
        self.items.iter().filter_map(|item| match item {
            Item::Edge(edge) => Some(edge),
            Item::Block(_) => None,
        })
    }
}

/// Top-level item inside `pipeline { ... }`.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Block(Block),
    Edge(BlockEdge),
}

/// `b0 { instr* }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: Ident,
    pub instrs: Vec<Instr>,
    pub span: Span,
}

/// `name = opcode ^ctrl, operand, ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub name: Ident,
    pub opcode: Ident,
    pub control: Vec<Ident>,
    pub operands: Vec<Operand>,
    pub span: Span,
}

/// An instruction operand. Identifiers are data inputs; numbers and strings
/// are literal operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Ident),
    Int(i64, Span),
    Str(String, Span),
}

/// `b0 -> b1, b2`
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEdge {
    pub from: Ident,
    pub to: Vec<Ident>,
    pub span: Span,
}

/// An identifier with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}
