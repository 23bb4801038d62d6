// diag.rs — Diagnostics for the printable front end
//
// Lexing, parsing and graph construction accumulate `Diagnostic`s instead of
// stopping at the first problem. The analyses themselves report through
// `error::Error`.
//
// Preconditions: none (types only).
// Postconditions: `render` maps byte spans to 1-based line:column positions.
// Failure modes: none.
// Side effects: none.

use std::fmt;

use chumsky::error::Rich;
use chumsky::span::Span as _;

use crate::ast::Span;
use crate::lexer::Token;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Codes emitted by the front end. A code keeps its meaning once assigned.
pub mod codes {
    use super::DiagCode;

    /// Lexer or parser syntax error.
    pub const E0001: DiagCode = DiagCode("E0001");
    /// Reference to an undefined value or block.
    pub const E0100: DiagCode = DiagCode("E0100");
    /// Name defined more than once.
    pub const E0101: DiagCode = DiagCode("E0101");
    /// Edge leaves a block that has no terminator instruction.
    pub const E0102: DiagCode = DiagCode("E0102");
    /// Edge endpoint is not a block.
    pub const E0103: DiagCode = DiagCode("E0103");
    /// Edge targets the entry block.
    pub const W0001: DiagCode = DiagCode("W0001");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related span ─────────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A front-end diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
    pub related_spans: Vec<RelatedSpan>,
}

impl Diagnostic {
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
            related_spans: Vec::new(),
        }
    }

    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, span, message)
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related_spans.push(RelatedSpan {
            span,
            label: label.into(),
        });
        self
    }

    /// Convert a chumsky parse error.
    pub fn from_parse_error(err: &Rich<'static, Token, Span>) -> Self {
        Self::error(*err.span(), err.to_string()).with_code(codes::E0001)
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }

    /// Render as `path:line:col: level[code]: message`, plus hint and
    /// related locations on following lines.
    pub fn render(&self, path: &str, source: &str) -> String {
        let (line, col) = line_col(source, self.span.start());
        let mut out = format!("{path}:{line}:{col}: {self}");
        for related in &self.related_spans {
            let (line, col) = line_col(source, related.span.start());
            out.push_str(&format!("\n  {path}:{line}:{col}: note: {}", related.label));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// 1-based line and column of byte `offset` in `source`.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let col = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, col)
}
