//! Diagnostics shared by every compiler stage.
//!
//! Each stage reports problems through its own `thiserror` enum. The enums
//! implement [`CodedError`] so callers can flatten them into uniform
//! [`Diagnostic`] records for display or JSON transport.

#![forbid(unsafe_code)]

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Half-open `[begin, end)` range of character offsets in the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    /// First character covered.
    pub begin: usize,
    /// One past the last character covered.
    pub end: usize,
}

impl Span {
    /// Creates a span covering `[begin, end)`.
    pub fn new(begin: usize, end: usize) -> Self {
        Self { begin, end }
    }

    /// Creates a one-character span at `offset`.
    pub fn at(offset: usize) -> Self {
        Self {
            begin: offset,
            end: offset + 1,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Self {
        Self {
            begin: self.begin.min(other.begin),
            end: self.end.max(other.end),
        }
    }

    /// Whether an editing cursor at `cursor` touches this span, ends included.
    pub fn touches(&self, cursor: usize) -> bool {
        self.begin <= cursor && cursor <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.begin, self.end)
    }
}

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Attached to the result; never blocks output.
    Warning,
    /// Aborts the stage; no result is produced.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// An error type with a stable numeric code, a source span and a payload.
pub trait CodedError: std::error::Error {
    /// Stable numeric code. Codes are grouped by stage: 1xxx lexical,
    /// 2xxx grammar, 3xxx semantic, 4xxx translator.
    fn code(&self) -> u32;

    /// Source span the diagnostic points at.
    fn span(&self) -> Span;

    /// Structured details for tooling.
    fn payload(&self) -> Value {
        Value::Null
    }
}

/// Uniform diagnostic record produced from any [`CodedError`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    /// Stable numeric code.
    pub code: u32,
    /// Warning or error.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
    /// Start offset of the span.
    pub begin: usize,
    /// End offset of the span.
    pub end: usize,
    /// Structured payload, `null` when the error carries none.
    pub payload: Value,
}

impl Diagnostic {
    /// Flattens a coded error into a diagnostic record.
    pub fn from_error<E: CodedError + ?Sized>(severity: Severity, error: &E) -> Self {
        let span = error.span();
        Self {
            code: error.code(),
            severity,
            message: error.to_string(),
            begin: span.begin,
            end: span.end,
            payload: error.payload(),
        }
    }

    /// Span of the diagnostic.
    pub fn span(&self) -> Span {
        Span::new(self.begin, self.end)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {} ({}..{})",
            self.severity, self.code, self.message, self.begin, self.end
        )
    }
}

/// Result of one analysis stage: an optional value plus diagnostics.
///
/// `result` is `None` whenever `errors` is non-empty. It may also be `None`
/// without errors when the stage had nothing to analyze (an empty query).
#[derive(Debug, Clone)]
pub struct AnalysisResult<T, E> {
    /// Stage output, absent on failure.
    pub result: Option<T>,
    /// Non-fatal diagnostics.
    pub warnings: Vec<E>,
    /// Fatal diagnostics.
    pub errors: Vec<E>,
}

impl<T, E> AnalysisResult<T, E> {
    /// Successful result carrying `warnings`.
    pub fn ok(result: T, warnings: Vec<E>) -> Self {
        Self {
            result: Some(result),
            warnings,
            errors: Vec::new(),
        }
    }

    /// Failed result.
    pub fn failed(warnings: Vec<E>, errors: Vec<E>) -> Self {
        Self {
            result: None,
            warnings,
            errors,
        }
    }

    /// True when the stage reported at least one error.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl<T, E: CodedError> AnalysisResult<T, E> {
    /// Flattens warnings and errors into diagnostic records, warnings first.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.warnings
            .iter()
            .map(|w| Diagnostic::from_error(Severity::Warning, w))
            .chain(
                self.errors
                    .iter()
                    .map(|e| Diagnostic::from_error(Severity::Error, e)),
            )
            .collect()
    }
}

/// Accumulates warnings and errors while a stage runs.
#[derive(Debug)]
pub struct ErrorCollector<E> {
    warnings: Vec<E>,
    errors: Vec<E>,
}

impl<E> Default for ErrorCollector<E> {
    fn default() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<E> ErrorCollector<E> {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a warning.
    pub fn warning(&mut self, warning: E) {
        self.warnings.push(warning);
    }

    /// Records an error.
    pub fn error(&mut self, error: E) {
        self.errors.push(error);
    }

    /// True when at least one error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[E] {
        &self.warnings
    }

    /// Errors recorded so far.
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    /// Moves everything from `other` into this collector.
    pub fn collect(&mut self, other: ErrorCollector<E>) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }

    /// Finishes the stage. The value is dropped when any error was recorded.
    pub fn finish<T>(self, value: Option<T>) -> AnalysisResult<T, E> {
        if self.errors.is_empty() {
            AnalysisResult {
                result: value,
                warnings: self.warnings,
                errors: self.errors,
            }
        } else {
            AnalysisResult::failed(self.warnings, self.errors)
        }
    }
}
