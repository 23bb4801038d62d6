// Parser for printable pipeline graphs.
//
// Parses a token stream (from the lexer) into an AST. Uses chumsky
// combinators.
//
//   program  := 'pipeline' '{' (item NL)* '}'
//   item     := block | edge
//   block    := IDENT '{' (instr NL)* '}'
//   edge     := IDENT '->' IDENT (',' IDENT)*
//   instr    := IDENT '=' opcode (arg ','?)*
//   opcode   := IDENT (':' IDENT)?
//   arg      := '^' IDENT | IDENT | INT | STRING
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub program: Option<Program>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a printable pipeline source string. Lexes then parses.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = program_parser(source);
    let (program, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        program,
        errors: all_errors,
    }
}

/// Instruction argument before it is split into control inputs and operands.
#[derive(Debug, Clone)]
enum InstrArg {
    Control(Ident),
    Operand(Operand),
}

// ── Main parser builder ──
//
// All grammar rules are built inside `program_parser` so that the `source`
// reference is captured once and shared by all combinators.

fn program_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Program, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Newlines ──

    let nl = just(Token::Newline).repeated().ignored();
    let separator = just(Token::Newline).repeated().at_least(1);

    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Opcode: `add`, `ssa:phi` ──

    let opcode = ident
        .clone()
        .then(just(Token::Colon).ignore_then(ident.clone()).or_not())
        .map_with(|(head, tail), e| match tail {
            Some(tail) => Ident {
                name: format!("{}:{}", head.name, tail.name),
                span: e.span(),
            },
            None => head,
        });

    // ── Instruction arguments ──

    let arg = {
        let control = just(Token::Caret)
            .ignore_then(ident.clone())
            .map(InstrArg::Control);
        let literal = select! {
            Token::Int(n) = e => Operand::Int(n, e.span()),
            Token::StringLit(s) = e => Operand::Str(s, e.span()),
        };
        let value = ident.clone().map(Operand::Value);
        control.or(literal.or(value).map(InstrArg::Operand))
    };

    // ── Instruction ──

    let instr = ident
        .clone()
        .then_ignore(just(Token::Equals))
        .then(opcode)
        .then(
            arg.separated_by(just(Token::Comma).or_not())
                .collect::<Vec<_>>(),
        )
        .map_with(|((name, opcode), args), e| {
            let mut control = Vec::new();
            let mut operands = Vec::new();
            for arg in args {
                match arg {
                    InstrArg::Control(id) => control.push(id),
                    InstrArg::Operand(op) => operands.push(op),
                }
            }
            Instr {
                name,
                opcode,
                control,
                operands,
                span: e.span(),
            }
        });

    // ── Block: IDENT '{' instrs '}' ──

    let block_body = nl
        .clone()
        .ignore_then(
            instr
                .separated_by(separator.clone())
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl.clone());

    let block = ident
        .clone()
        .then(block_body.delimited_by(just(Token::LBrace), just(Token::RBrace)))
        .map_with(|(name, instrs), e| {
            Item::Block(Block {
                name,
                instrs,
                span: e.span(),
            })
        });

    // ── Edge: IDENT '->' IDENT (',' IDENT)* ──

    let edge = ident
        .clone()
        .then_ignore(just(Token::Arrow))
        .then(
            ident
                .clone()
                .separated_by(just(Token::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map_with(|(from, to), e| {
            Item::Edge(BlockEdge {
                from,
                to,
                span: e.span(),
            })
        });

    // ── Program ──

    let items = nl
        .clone()
        .ignore_then(
            choice((block, edge))
                .separated_by(separator)
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl.clone());

    nl.clone()
        .ignore_then(just(Token::Pipeline))
        .ignore_then(items.delimited_by(just(Token::LBrace), just(Token::RBrace)))
        .then_ignore(nl)
        .map_with(|items, e| Program {
            items,
            span: e.span(),
        })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Program {
        let result = parse(source);
        assert!(
            result.errors.is_empty(),
            "unexpected errors: {:#?}",
            result.errors
        );
        result.program.expect("expected program")
    }

    fn single_instr(source: &str) -> Instr {
        let prog = parse_ok(&format!("pipeline {{\n  b0 {{\n    {source}\n  }}\n}}"));
        let block = prog.blocks().next().expect("expected a block");
        assert_eq!(block.instrs.len(), 1);
        block.instrs[0].clone()
    }

    #[test]
    fn empty_pipeline() {
        let prog = parse_ok("pipeline {\n}");
        assert!(prog.items.is_empty());
    }

    #[test]
    fn leading_and_trailing_newlines() {
        let prog = parse_ok("\n\npipeline {\n\n  b0 {\n  }\n\n}\n\n");
        assert_eq!(prog.blocks().count(), 1);
    }

    #[test]
    fn literal_instruction() {
        let instr = single_instr("i0 = literal 5");
        assert_eq!(instr.name.name, "i0");
        assert_eq!(instr.opcode.name, "literal");
        assert!(instr.control.is_empty());
        assert!(matches!(instr.operands[..], [Operand::Int(5, _)]));
    }

    #[test]
    fn phi_opcode_with_control_and_inputs() {
        let instr = single_instr("i5 = ssa:phi ^b1 i0, i12");
        assert_eq!(instr.opcode.name, "ssa:phi");
        assert_eq!(instr.control.len(), 1);
        assert_eq!(instr.control[0].name, "b1");
        let names: Vec<_> = instr
            .operands
            .iter()
            .map(|op| match op {
                Operand::Value(id) => id.name.as_str(),
                _ => panic!("expected value operand"),
            })
            .collect();
        assert_eq!(names, vec!["i0", "i12"]);
    }

    #[test]
    fn comma_after_control_is_optional() {
        let with = single_instr("i9 = if ^i6, i8");
        let without = single_instr("i9 = if ^i6 i8");
        assert_eq!(with.control.len(), 1);
        assert_eq!(with.operands.len(), 1);
        assert_eq!(without.control.len(), 1);
        assert_eq!(without.operands.len(), 1);
    }

    #[test]
    fn string_literal_operand() {
        let instr = single_instr(r#"i8 = cmp "<", i6, i7"#);
        assert!(matches!(&instr.operands[0], Operand::Str(s, _) if s == "<"));
        assert!(matches!(&instr.operands[1], Operand::Value(id) if id.name == "i6"));
        assert!(matches!(&instr.operands[2], Operand::Value(id) if id.name == "i7"));
    }

    #[test]
    fn operand_free_instructions_end_at_newline() {
        let prog = parse_ok("pipeline {\n  b0 {\n    i3 = array\n    i4 = jump ^b0\n  }\n}");
        let block = prog.blocks().next().unwrap();
        assert_eq!(block.instrs.len(), 2);
        assert!(block.instrs[0].operands.is_empty());
        assert_eq!(block.instrs[1].control[0].name, "b0");
    }

    #[test]
    fn block_edges() {
        let prog = parse_ok("pipeline {\n  b0 {\n  }\n  b0 -> b1, b2\n}");
        let edge = prog.edges().next().expect("expected edge");
        assert_eq!(edge.from.name, "b0");
        let targets: Vec<_> = edge.to.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(targets, vec!["b1", "b2"]);
    }

    #[test]
    fn missing_closing_brace_is_an_error() {
        let result = parse("pipeline {\n  b0 {\n    i0 = literal 0\n");
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn missing_pipeline_keyword_is_an_error() {
        let result = parse("b0 {\n}");
        assert!(result.program.is_none());
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn lex_errors_are_merged() {
        let result = parse("pipeline {\n  b0 {\n    i0 = literal 0 $\n  }\n}");
        assert!(result
            .errors
            .iter()
            .any(|e| e.to_string().contains("unexpected character")));
    }
}
