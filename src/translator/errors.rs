use serde_json::{json, Value};
use thiserror::Error;

use crate::diagnostics::{CodedError, Span};

/// Warnings raised while resolving a plan against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslatorError {
    /// No entity matched any item of an element.
    #[error("nothing matches {}", items.join(" | "))]
    WholeElementMatchesNone {
        /// Element items as query text.
        items: Vec<String>,
        /// Element span.
        span: Span,
    },
    /// An element resolved to many entities.
    #[error("{} match {limit} or more entities", items.join(" | "))]
    NumberOfUnionItemExceed {
        /// Element items as query text.
        items: Vec<String>,
        /// Configured limit.
        limit: usize,
        /// Element span.
        span: Span,
    },
    /// The query joins many resolved elements.
    #[error("the query joins {limit} or more elements")]
    NumberOfIntersectItemExceed {
        /// Configured limit.
        limit: usize,
        /// Whole query.
        span: Span,
    },
}

impl CodedError for TranslatorError {
    fn code(&self) -> u32 {
        match self {
            TranslatorError::WholeElementMatchesNone { .. } => 4001,
            TranslatorError::NumberOfUnionItemExceed { .. } => 4002,
            TranslatorError::NumberOfIntersectItemExceed { .. } => 4003,
        }
    }

    fn span(&self) -> Span {
        match self {
            TranslatorError::WholeElementMatchesNone { span, .. }
            | TranslatorError::NumberOfUnionItemExceed { span, .. }
            | TranslatorError::NumberOfIntersectItemExceed { span, .. } => *span,
        }
    }

    fn payload(&self) -> Value {
        match self {
            TranslatorError::WholeElementMatchesNone { items, .. } => json!({ "items": items }),
            TranslatorError::NumberOfUnionItemExceed { items, limit, .. } => {
                json!({ "items": items, "limit": limit })
            }
            TranslatorError::NumberOfIntersectItemExceed { limit, .. } => json!({ "limit": limit }),
        }
    }
}
