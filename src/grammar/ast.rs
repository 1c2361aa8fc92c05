//! Immutable syntax tree produced by the parser.
//!
//! Nodes are created by rule builders during reduction and never change
//! afterwards. Every node carries the character span it was parsed from.

use serde::Serialize;

use crate::diagnostics::Span;
use crate::lexical::StrKind;

/// A string token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Str {
    /// Unescaped value.
    pub value: String,
    /// Quoting style.
    pub kind: StrKind,
    /// Source span.
    pub span: Span,
}

impl Str {
    /// True for backticked strings, which the semantic layer matches exactly.
    pub fn is_precise(&self) -> bool {
        self.kind == StrKind::Backticks
    }

    /// True for unquoted strings.
    pub fn is_restricted(&self) -> bool {
        self.kind == StrKind::Restricted
    }
}

/// Dotted address `a.b.c`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrList {
    /// Segments, at least one.
    pub items: Vec<Str>,
    /// Source span.
    pub span: Span,
}

impl StrList {
    /// The only segment, if there is exactly one.
    pub fn single(&self) -> Option<&Str> {
        match self.items.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// Set literal `{a, b}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Col {
    /// Items in source order; may be empty.
    pub items: Vec<Str>,
    /// Source span.
    pub span: Span,
}

/// Range literal `[a, b)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Range {
    /// Lower bound.
    pub from: Str,
    /// Upper bound.
    pub to: Str,
    /// `[` rather than `(`.
    pub include_from: bool,
    /// `]` rather than `)`.
    pub include_to: bool,
    /// Source span.
    pub span: Span,
}

/// Requested direction of one sort item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// `+item`.
    Asc,
    /// `-item`.
    Desc,
    /// No sign given.
    Default,
}

/// One entry of a sort list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortItem {
    /// Sort key as written.
    pub value: Str,
    /// Written as `^key`.
    pub source: bool,
    /// Sign.
    pub direction: SortDirection,
    /// Source span, sign included.
    pub span: Span,
}

/// Comma separated sort items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortList {
    /// Items in source order.
    pub items: Vec<SortItem>,
    /// Source span.
    pub span: Span,
}

/// Right-hand side of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicative {
    /// A string or dotted address.
    StrList(StrList),
    /// A set literal.
    Col(Col),
    /// A range literal.
    Range(Range),
    /// A sort list.
    SortList(SortList),
}

impl Predicative {
    /// Source span.
    pub fn span(&self) -> Span {
        match self {
            Predicative::StrList(n) => n.span,
            Predicative::Col(n) => n.span,
            Predicative::Range(n) => n.span,
            Predicative::SortList(n) => n.span,
        }
    }
}

/// Relation symbol: `:`, `>`, `>=`, `<`, `<=`, `~`, `~+` or `~-`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Family {
    /// The symbol.
    pub symbol: &'static str,
    /// Source span.
    pub span: Span,
}

/// Element prefix: `@`, `#` or `$`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prefix {
    /// The symbol.
    pub symbol: &'static str,
    /// Source span.
    pub span: Span,
}

/// Subject, family, predicative: the basic `field relation value` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sfp {
    /// Left-hand address.
    pub subject: StrList,
    /// Relation, if any.
    pub family: Option<Family>,
    /// Right-hand side, only present with a binary family.
    pub predicative: Option<Predicative>,
    /// Source span.
    pub span: Span,
}

/// `|` or `/` separated clauses with an optional prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Element {
    /// `@`, `#` or `$`.
    pub prefix: Option<Prefix>,
    /// Alternatives.
    pub items: Vec<Sfp>,
    /// Source span.
    pub span: Span,
}

/// `[free text]` comment element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bracket {
    /// Strings inside the brackets.
    pub items: Vec<Str>,
    /// Source span.
    pub span: Span,
}

/// Body of a sequence item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequenceBody {
    /// Clauses.
    Element(Element),
    /// Comment.
    Bracket(Bracket),
}

impl SequenceBody {
    /// Source span.
    pub fn span(&self) -> Span {
        match self {
            SequenceBody::Element(e) => e.span,
            SequenceBody::Bracket(b) => b.span,
        }
    }
}

/// One top-level item of the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceItem {
    /// Written with a leading `-`.
    pub minus: bool,
    /// Written with a leading `^`.
    pub source: bool,
    /// Content.
    pub body: SequenceBody,
    /// Source span, signs included.
    pub span: Span,
}

/// Root of a parsed query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SemanticRoot {
    /// Items joined by juxtaposition or `&`.
    pub items: Vec<SequenceItem>,
    /// Source span.
    pub span: Span,
}
