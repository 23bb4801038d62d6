// Lexer for printable pipeline graphs.
//
// Tokenizes the textual graph notation (`pipeline { b0 { i0 = literal 0 } }`).
// Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters produce `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Pipeline token types.
///
/// Identifiers carry no value; use the span to retrieve the text from the
/// source. Opcodes such as `ssa:phi` lex as `Ident Colon Ident`.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+|#[^\n]*|//[^\n]*")]
pub enum Token {
    // ── Keywords ──
    #[token("pipeline")]
    Pipeline,

    // ── Symbols ──
    #[token("->")]
    Arrow,
    #[token("^")]
    Caret,
    #[token(":")]
    Colon,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token("=")]
    Equals,

    // ── Literals ──
    /// Integer literal (optionally negative).
    #[regex(r"-?[0-9]+", parse_int)]
    Int(i64),

    /// String literal with `\"` and `\\` escapes.
    #[regex(r#""([^"\\]|\\.)*""#, parse_string)]
    StringLit(String),

    // ── Identifier ──
    /// Identifier: `[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,

    // ── Structure ──
    /// One or more newlines (significant: instruction terminator).
    #[regex(r"\n+")]
    Newline,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Pipeline => write!(f, "pipeline"),
            Token::Arrow => write!(f, "->"),
            Token::Caret => write!(f, "^"),
            Token::Colon => write!(f, ":"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Equals => write!(f, "="),
            Token::Int(v) => write!(f, "{v}"),
            Token::StringLit(s) => write!(f, "\"{s}\""),
            Token::Ident => write!(f, "<ident>"),
            Token::Newline => write!(f, "<newline>"),
        }
    }
}

// ── Callbacks ──

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn parse_string(lex: &mut logos::Lexer<'_, Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1]; // strip quotes
    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                '"' => result.push('"'),
                '\\' => result.push('\\'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

// ── Public API ──

/// Lex a printable pipeline into tokens.
///
/// Lexing is non-fatal: errors are collected and the lexer continues past
/// bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected character: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keyword_vs_ident() {
        let tokens = lex_ok("pipeline pipelines");
        assert_eq!(tokens, vec![Token::Pipeline, Token::Ident]);
    }

    #[test]
    fn symbols() {
        let tokens = lex_ok("-> ^ : { } , =");
        assert_eq!(
            tokens,
            vec![
                Token::Arrow,
                Token::Caret,
                Token::Colon,
                Token::LBrace,
                Token::RBrace,
                Token::Comma,
                Token::Equals,
            ]
        );
    }

    #[test]
    fn phi_opcode_splits_on_colon() {
        let tokens = lex_ok("ssa:phi");
        assert_eq!(tokens, vec![Token::Ident, Token::Colon, Token::Ident]);
    }

    #[test]
    fn integers() {
        assert_eq!(lex_ok("42"), vec![Token::Int(42)]);
        assert_eq!(lex_ok("-7"), vec![Token::Int(-7)]);
    }

    #[test]
    fn arrow_is_not_negative_number() {
        let tokens = lex_ok("b0 -> b1");
        assert_eq!(tokens, vec![Token::Ident, Token::Arrow, Token::Ident]);
    }

    #[test]
    fn string_with_escapes() {
        let tokens = lex_ok(r#""<" "a\"b""#);
        assert_eq!(
            tokens,
            vec![
                Token::StringLit("<".to_string()),
                Token::StringLit("a\"b".to_string()),
            ]
        );
    }

    #[test]
    fn comments_and_newlines() {
        let tokens = lex_ok("i0 = literal 0 # seed\n\n// next\ni1 = array");
        assert_eq!(
            tokens,
            vec![
                Token::Ident,
                Token::Equals,
                Token::Ident,
                Token::Int(0),
                Token::Newline,
                Token::Newline,
                Token::Ident,
                Token::Equals,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn spans_are_byte_offsets() {
        let result = lex("i12 = add");
        assert_eq!(result.tokens[0].1, Span { start: 0, end: 3 });
        assert_eq!(result.tokens[2].1, Span { start: 6, end: 9 });
    }

    #[test]
    fn unknown_character_is_reported_and_skipped() {
        let result = lex("i0 = literal 0 $");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.tokens.len(), 4);
        assert!(result.errors[0].message.contains('$'));
    }
}
