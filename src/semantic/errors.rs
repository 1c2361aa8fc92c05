#![forbid(unsafe_code)]

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::diagnostics::{CodedError, Span};

/// Shape of a predicative that a field or element refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// `{a, b}`.
    Collection,
    /// `[a, b)`.
    Range,
    /// `a,-b`.
    SortList,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValueType::Collection => "collection",
            ValueType::Range => "range",
            ValueType::SortList => "sort list",
        })
    }
}

/// Target type of a failed value conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CastType {
    /// Integer, ratio or pattern number.
    Number,
    /// Byte size or duration.
    Size,
    /// Calendar date.
    Date,
}

impl fmt::Display for CastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CastType::Number => "number",
            CastType::Size => "size",
            CastType::Date => "date",
        })
    }
}

/// Query structure a dialect has no generator for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    /// Plain element.
    Element,
    /// Element written with `^`.
    ElementWithSource,
    /// `[...]` comment.
    Comment,
}

impl fmt::Display for StructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StructureKind::Element => "element",
            StructureKind::ElementWithSource => "source element",
            StructureKind::Comment => "comment",
        })
    }
}

/// Errors and warnings of the semantic pass. Only `DuplicatedSortItem` is a
/// warning; everything else discards the plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum SemanticError {
    #[error("filter {field}: relation and value are required")]
    FilterValueRequired { field: &'static str, span: Span },
    #[error("filter {field}: relation and value are not allowed")]
    FilterValueNotRequired { field: &'static str, span: Span },
    #[error("filter {field}: {value_type} is not supported")]
    UnsupportedFilterValueType {
        field: &'static str,
        value_type: ValueType,
        span: Span,
    },
    #[error("filter {field}: {value_type} is not supported with '{symbol}'")]
    UnsupportedFilterValueTypeOfRelation {
        field: &'static str,
        value_type: ValueType,
        symbol: &'static str,
        span: Span,
    },
    #[error("filter {field}: relation '{symbol}' is not supported")]
    UnsupportedFilterRelationSymbol {
        field: &'static str,
        symbol: &'static str,
        span: Span,
    },
    #[error("invalid meta tag for '{symbol}'")]
    InvalidMetaTagForThisPrefix { symbol: String, span: Span },
    #[error("{element} element: prefix is not allowed")]
    ElementPrefixNotRequired { element: &'static str, span: Span },
    #[error("{element} element: relation and value are not allowed")]
    ElementValueNotRequired { element: &'static str, span: Span },
    #[error("{element} element: {value_type} is not supported")]
    UnsupportedElementValueType {
        element: &'static str,
        value_type: ValueType,
        span: Span,
    },
    #[error("{element} element: {value_type} is not supported with '{symbol}'")]
    UnsupportedElementValueTypeOfRelation {
        element: &'static str,
        value_type: ValueType,
        symbol: &'static str,
        span: Span,
    },
    #[error("{element} element: relation '{symbol}' is not supported")]
    UnsupportedElementRelationSymbol {
        element: &'static str,
        symbol: &'static str,
        span: Span,
    },
    #[error("sort: relation and value are required")]
    SortValueRequired { span: Span },
    #[error("sort: value must be a sort list")]
    SortValueMustBeSortList { span: Span },
    #[error("sort: '{value}' is not a sort item, expected one of: {}", expected.join(", "))]
    InvalidSortItem {
        value: String,
        expected: Vec<String>,
        span: Span,
    },
    #[error("sort must stand alone: no '-', '^' or '|'")]
    SortIsIndependent { span: Span },
    #[error("sort: '{value}' is duplicated")]
    DuplicatedSortItem { value: String, span: Span },
    #[error("value cannot be an address")]
    ValueCannotBeAddress { span: Span },
    #[error("value cannot be a pattern in a comparison or range")]
    ValueCannotBePatternInComparison { span: Span },
    #[error("'{value}' cannot be read as a {target}")]
    TypeCastError {
        value: String,
        target: CastType,
        span: Span,
    },
    #[error("'{value}' is not a {type_name}, expected one of: {}", expected.join(", "))]
    EnumTypeCastError {
        value: String,
        type_name: &'static str,
        expected: Vec<String>,
        span: Span,
    },
    #[error("{structure} is not supported here")]
    UnsupportedSemanticStructure { structure: StructureKind, span: Span },
    #[error("keywords and elements cannot be mixed in one item")]
    IdentifiesAndElementsCannotBeMixed { span: Span },
    #[error("keyword {key} cannot have '^'")]
    ThisIdentifyCannotHaveSourceFlag { key: String, span: Span },
    #[error("keyword {key} must have '^'")]
    ThisIdentifyMustHaveSourceFlag { key: String, span: Span },
    #[error("comment cannot have '^'")]
    CommentCannotHaveSourceFlag { span: Span },
    #[error("meta type designators cannot be mixed in one element")]
    MetaTypeDesignatorsCannotBeMixed { span: Span },
}

impl CodedError for SemanticError {
    fn code(&self) -> u32 {
        use SemanticError::*;
        match self {
            FilterValueRequired { .. } => 3001,
            FilterValueNotRequired { .. } => 3002,
            UnsupportedFilterValueType { .. } => 3003,
            UnsupportedFilterValueTypeOfRelation { .. } => 3004,
            UnsupportedFilterRelationSymbol { .. } => 3005,
            InvalidMetaTagForThisPrefix { .. } => 3006,
            ElementPrefixNotRequired { .. } => 3007,
            ElementValueNotRequired { .. } => 3008,
            UnsupportedElementValueType { .. } => 3009,
            UnsupportedElementValueTypeOfRelation { .. } => 3010,
            UnsupportedElementRelationSymbol { .. } => 3011,
            SortValueRequired { .. } => 3012,
            SortValueMustBeSortList { .. } => 3013,
            InvalidSortItem { .. } => 3014,
            SortIsIndependent { .. } => 3015,
            DuplicatedSortItem { .. } => 3016,
            ValueCannotBeAddress { .. } => 3017,
            ValueCannotBePatternInComparison { .. } => 3018,
            TypeCastError { .. } => 3019,
            EnumTypeCastError { .. } => 3020,
            UnsupportedSemanticStructure { .. } => 3021,
            IdentifiesAndElementsCannotBeMixed { .. } => 3022,
            ThisIdentifyCannotHaveSourceFlag { .. } => 3023,
            ThisIdentifyMustHaveSourceFlag { .. } => 3024,
            CommentCannotHaveSourceFlag { .. } => 3025,
            MetaTypeDesignatorsCannotBeMixed { .. } => 3026,
        }
    }

    fn span(&self) -> Span {
        use SemanticError::*;
        match self {
            FilterValueRequired { span, .. }
            | FilterValueNotRequired { span, .. }
            | UnsupportedFilterValueType { span, .. }
            | UnsupportedFilterValueTypeOfRelation { span, .. }
            | UnsupportedFilterRelationSymbol { span, .. }
            | InvalidMetaTagForThisPrefix { span, .. }
            | ElementPrefixNotRequired { span, .. }
            | ElementValueNotRequired { span, .. }
            | UnsupportedElementValueType { span, .. }
            | UnsupportedElementValueTypeOfRelation { span, .. }
            | UnsupportedElementRelationSymbol { span, .. }
            | SortValueRequired { span }
            | SortValueMustBeSortList { span }
            | InvalidSortItem { span, .. }
            | SortIsIndependent { span }
            | DuplicatedSortItem { span, .. }
            | ValueCannotBeAddress { span }
            | ValueCannotBePatternInComparison { span }
            | TypeCastError { span, .. }
            | EnumTypeCastError { span, .. }
            | UnsupportedSemanticStructure { span, .. }
            | IdentifiesAndElementsCannotBeMixed { span }
            | ThisIdentifyCannotHaveSourceFlag { span, .. }
            | ThisIdentifyMustHaveSourceFlag { span, .. }
            | CommentCannotHaveSourceFlag { span }
            | MetaTypeDesignatorsCannotBeMixed { span } => *span,
        }
    }

    fn payload(&self) -> Value {
        use SemanticError::*;
        match self {
            FilterValueRequired { field, .. } | FilterValueNotRequired { field, .. } => {
                json!({ "field": field })
            }
            UnsupportedFilterValueType {
                field, value_type, ..
            } => json!({ "field": field, "value_type": value_type }),
            UnsupportedFilterValueTypeOfRelation {
                field,
                value_type,
                symbol,
                ..
            } => json!({ "field": field, "value_type": value_type, "symbol": symbol }),
            UnsupportedFilterRelationSymbol { field, symbol, .. } => {
                json!({ "field": field, "symbol": symbol })
            }
            InvalidMetaTagForThisPrefix { symbol, .. } => json!({ "symbol": symbol }),
            ElementPrefixNotRequired { element, .. } | ElementValueNotRequired { element, .. } => {
                json!({ "element": element })
            }
            UnsupportedElementValueType {
                element,
                value_type,
                ..
            } => json!({ "element": element, "value_type": value_type }),
            UnsupportedElementValueTypeOfRelation {
                element,
                value_type,
                symbol,
                ..
            } => json!({ "element": element, "value_type": value_type, "symbol": symbol }),
            UnsupportedElementRelationSymbol {
                element, symbol, ..
            } => json!({ "element": element, "symbol": symbol }),
            InvalidSortItem {
                value, expected, ..
            } => json!({ "value": value, "expected": expected }),
            DuplicatedSortItem { value, .. } => json!({ "value": value }),
            TypeCastError { value, target, .. } => json!({ "value": value, "type": target }),
            EnumTypeCastError {
                value,
                type_name,
                expected,
                ..
            } => json!({ "value": value, "type": type_name, "expected": expected }),
            UnsupportedSemanticStructure { structure, .. } => json!({ "structure": structure }),
            ThisIdentifyCannotHaveSourceFlag { key, .. }
            | ThisIdentifyMustHaveSourceFlag { key, .. } => json!({ "key": key }),
            SortValueRequired { .. }
            | SortValueMustBeSortList { .. }
            | SortIsIndependent { .. }
            | ValueCannotBeAddress { .. }
            | ValueCannotBePatternInComparison { .. }
            | IdentifiesAndElementsCannotBeMixed { .. }
            | CommentCannotHaveSourceFlag { .. }
            | MetaTypeDesignatorsCannotBeMixed { .. } => Value::Null,
        }
    }
}
