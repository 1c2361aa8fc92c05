#![forbid(unsafe_code)]
#![allow(missing_docs)]

use serde_json::{json, Value};
use thiserror::Error;

use crate::diagnostics::{CodedError, Span};

/// Failures while reading a grammar, building its table or binding its rules.
///
/// These surface once at startup. A query never triggers them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrammarBuildError {
    /// The grammar text held no productions.
    #[error("grammar has no productions")]
    EmptyGrammar,
    /// A line was not of the form `KEY -> notation...`.
    #[error("line {line}: malformed production '{text}'")]
    MalformedProduction { line: usize, text: String },
    /// A production key was not an upper-case name.
    #[error("line {line}: '{key}' is not a valid production key")]
    InvalidKey { line: usize, key: String },
    /// A non-terminal was referenced but never defined.
    #[error("non-terminal '{name}' has no production")]
    UndefinedNonTerminal { name: String },
    /// Two actions landed on the same cell and the policy rejected it.
    #[error("conflict in state {state} on '{lookahead}': {existing} vs {incoming}")]
    Conflict {
        state: usize,
        lookahead: String,
        existing: String,
        incoming: String,
    },
    /// A rule binding named a production that does not exist.
    #[error("no production '{text}' to bind")]
    UnknownProduction { text: String },
    /// A production was bound twice.
    #[error("production '{text}' is already bound")]
    DuplicateBinding { text: String },
    /// A production was left without a builder.
    #[error("production '{text}' has no builder bound")]
    MissingBinding { text: String },
    /// A binding selected a child position the production does not have.
    #[error("production '{text}' has no argument {index}")]
    ArgumentOutOfRange { text: String, index: usize },
    /// Printed table text could not be read back.
    #[error("syntax table line {line}: {message}")]
    TableFormat { line: usize, message: String },
}

/// Errors raised while parsing a token stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrammarError {
    /// A token arrived that no action accepts in the current state.
    #[error("unexpected token '{token}', expected one of: {}", expected.join(" "))]
    UnexpectedToken {
        /// Source text of the offending token.
        token: String,
        /// Terminals that would have been accepted.
        expected: Vec<String>,
        /// Span of the offending token.
        span: Span,
    },
    /// Input ended while the parser still expected more.
    #[error("unexpected end of input, expected one of: {}", expected.join(" "))]
    UnexpectedEof {
        /// Terminals that would have been accepted.
        expected: Vec<String>,
        /// Offset of the end of input.
        offset: usize,
    },
    /// A rule builder received children of an unexpected shape.
    #[error("internal: rule '{production}' received unexpected node {found}")]
    RuleMismatch {
        /// Production being reduced.
        production: String,
        /// Kind of node found.
        found: &'static str,
        /// Span of the reduction.
        span: Span,
    },
    /// A collection literal names the same value twice.
    #[error("collection item '{value}' is duplicated")]
    DuplicatedCollectionItem {
        /// Repeated value.
        value: String,
        /// Span of the repeated item.
        span: Span,
    },
}

impl CodedError for GrammarError {
    fn code(&self) -> u32 {
        match self {
            GrammarError::UnexpectedToken { .. } => 2001,
            GrammarError::UnexpectedEof { .. } => 2002,
            GrammarError::RuleMismatch { .. } => 2003,
            GrammarError::DuplicatedCollectionItem { .. } => 2004,
        }
    }

    fn span(&self) -> Span {
        match self {
            GrammarError::UnexpectedToken { span, .. }
            | GrammarError::RuleMismatch { span, .. }
            | GrammarError::DuplicatedCollectionItem { span, .. } => *span,
            GrammarError::UnexpectedEof { offset, .. } => Span::at(*offset),
        }
    }

    fn payload(&self) -> Value {
        match self {
            GrammarError::UnexpectedToken {
                token, expected, ..
            } => json!({ "token": token, "expected": expected }),
            GrammarError::UnexpectedEof { expected, .. } => json!({ "expected": expected }),
            GrammarError::RuleMismatch { production, .. } => json!({ "production": production }),
            GrammarError::DuplicatedCollectionItem { value, .. } => json!({ "value": value }),
        }
    }
}
