//! Registration table mapping each production to the function that builds
//! its node, plus the builders of the query language.
//!
//! Bindings are made by production text, e.g.
//! `rules.bind("SFP -> SUBJECT FAMILY PREDICATIVE", &[0, 1, 2], sfp_relation)`.
//! The index list picks which children of the reduction reach the builder.

use crate::diagnostics::{ErrorCollector, Span};
use crate::lexical::StrKind;

use super::ast::{
    Bracket, Col, Element, Family, Predicative, Prefix, Range, SemanticRoot, SequenceBody,
    SequenceItem, Sfp, SortDirection, SortItem, SortList, Str, StrList,
};
use super::definition::Grammar;
use super::errors::{GrammarBuildError, GrammarError};

/// A symbol token on the parse stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Mark {
    pub symbol: &'static str,
    pub span: Span,
}

/// Accumulating list used while a left-recursive production reduces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListBuilder<T> {
    items: Vec<T>,
    span: Span,
}

impl<T> ListBuilder<T> {
    fn start(item: T, span: Span) -> Self {
        Self {
            items: vec![item],
            span,
        }
    }

    fn push(&mut self, item: T, span: Span) {
        self.items.push(item);
        self.span = self.span.join(span);
    }

    fn items(&self) -> &[T] {
        &self.items
    }

    fn freeze(self) -> (Vec<T>, Span) {
        (self.items, self.span)
    }
}

/// Semantic value on the parse stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Symbol(Mark),
    Str(Str),
    Strings(ListBuilder<Str>),
    Subject(StrList),
    Family(Family),
    Prefix(Prefix),
    Predicative(Predicative),
    Col(Col),
    Range(Range),
    SortItem(SortItem),
    SortList(ListBuilder<SortItem>),
    Sfp(Sfp),
    Sfps(ListBuilder<Sfp>),
    Element(Element),
    Bracket(Bracket),
    Body(SequenceBody),
    Item(SequenceItem),
    Sequence(ListBuilder<SequenceItem>),
}

impl Node {
    pub(crate) fn span(&self) -> Span {
        match self {
            Node::Symbol(n) => n.span,
            Node::Str(n) => n.span,
            Node::Strings(n) => n.span,
            Node::Subject(n) => n.span,
            Node::Family(n) => n.span,
            Node::Prefix(n) => n.span,
            Node::Predicative(n) => n.span(),
            Node::Col(n) => n.span,
            Node::Range(n) => n.span,
            Node::SortItem(n) => n.span,
            Node::SortList(n) => n.span,
            Node::Sfp(n) => n.span,
            Node::Sfps(n) => n.span,
            Node::Element(n) => n.span,
            Node::Bracket(n) => n.span,
            Node::Body(n) => n.span(),
            Node::Item(n) => n.span,
            Node::Sequence(n) => n.span,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Node::Symbol(_) => "symbol",
            Node::Str(_) => "str",
            Node::Strings(_) => "strings",
            Node::Subject(_) => "subject",
            Node::Family(_) => "family",
            Node::Prefix(_) => "prefix",
            Node::Predicative(_) => "predicative",
            Node::Col(_) => "collection",
            Node::Range(_) => "range",
            Node::SortItem(_) => "sort item",
            Node::SortList(_) => "sort list",
            Node::Sfp(_) => "sfp",
            Node::Sfps(_) => "element items",
            Node::Element(_) => "element",
            Node::Bracket(_) => "bracket",
            Node::Body(_) => "sequence body",
            Node::Item(_) => "sequence item",
            Node::Sequence(_) => "sequence",
        }
    }

    /// Freezes the value left after accepting into the tree root.
    pub(crate) fn into_root(self) -> Option<SemanticRoot> {
        match self {
            Node::Sequence(list) => {
                let (items, span) = list.freeze();
                Some(SemanticRoot { items, span })
            }
            _ => None,
        }
    }
}

/// Children selected for one reduction.
pub(crate) struct RuleArgs<'a> {
    nodes: Vec<Option<Node>>,
    production: &'a str,
    span: Span,
}

macro_rules! node_getters {
    ($($name:ident => $variant:ident($ty:ty);)*) => {
        impl RuleArgs<'_> {
            $(
                fn $name(&mut self, index: usize) -> Result<$ty, GrammarError> {
                    match self.take(index)? {
                        Node::$variant(value) => Ok(value),
                        other => Err(self.mismatch(other.kind())),
                    }
                }
            )*
        }
    };
}

node_getters! {
    mark => Symbol(Mark);
    str => Str(Str);
    strings => Strings(ListBuilder<Str>);
    subject => Subject(StrList);
    family => Family(Family);
    prefix => Prefix(Prefix);
    predicative => Predicative(Predicative);
    col => Col(Col);
    range => Range(Range);
    sort_item => SortItem(SortItem);
    sort_list => SortList(ListBuilder<SortItem>);
    sfp => Sfp(Sfp);
    sfps => Sfps(ListBuilder<Sfp>);
    element => Element(Element);
    bracket => Bracket(Bracket);
    body => Body(SequenceBody);
    item => Item(SequenceItem);
    sequence => Sequence(ListBuilder<SequenceItem>);
}

impl<'a> RuleArgs<'a> {
    pub(crate) fn new(nodes: Vec<Node>, production: &'a str, span: Span) -> Self {
        Self {
            nodes: nodes.into_iter().map(Some).collect(),
            production,
            span,
        }
    }

    fn take(&mut self, index: usize) -> Result<Node, GrammarError> {
        self.nodes
            .get_mut(index)
            .and_then(Option::take)
            .ok_or_else(|| self.mismatch("nothing"))
    }

    fn mismatch(&self, found: &'static str) -> GrammarError {
        GrammarError::RuleMismatch {
            production: self.production.to_owned(),
            found,
            span: self.span,
        }
    }
}

/// Shared state handed to every builder.
pub(crate) struct RuleContext<'a> {
    /// Span of the whole reduction.
    pub span: Span,
    collector: &'a mut ErrorCollector<GrammarError>,
}

impl<'a> RuleContext<'a> {
    pub(crate) fn new(span: Span, collector: &'a mut ErrorCollector<GrammarError>) -> Self {
        Self { span, collector }
    }

    fn warning(&mut self, warning: GrammarError) {
        self.collector.warning(warning);
    }
}

pub(crate) type RuleFn = fn(&mut RuleArgs<'_>, &mut RuleContext<'_>) -> Result<Node, GrammarError>;

/// One bound production.
pub(crate) struct Rule {
    pub text: String,
    pub arguments: Vec<usize>,
    pub build: RuleFn,
}

/// Builders indexed by production number.
pub(crate) struct RuleTable {
    rules: Vec<Option<Rule>>,
}

impl RuleTable {
    fn new(grammar: &Grammar) -> Self {
        Self {
            rules: (0..grammar.productions().len()).map(|_| None).collect(),
        }
    }

    /// Binds `text` to `build`, passing the children at `arguments`.
    pub(crate) fn bind(
        &mut self,
        grammar: &Grammar,
        text: &str,
        arguments: &[usize],
        build: RuleFn,
    ) -> Result<&mut Self, GrammarBuildError> {
        let index = grammar
            .find_production(text)
            .ok_or_else(|| GrammarBuildError::UnknownProduction { text: text.to_owned() })?;
        let text = grammar.production_text(index).unwrap_or_default();
        let arity = grammar.production(index).map_or(0, |p| p.sequence.len());
        if let Some(&index) = arguments.iter().find(|&&i| i >= arity) {
            return Err(GrammarBuildError::ArgumentOutOfRange { text, index });
        }
        let slot = &mut self.rules[index];
        if slot.is_some() {
            return Err(GrammarBuildError::DuplicateBinding { text });
        }
        *slot = Some(Rule {
            text,
            arguments: arguments.to_vec(),
            build,
        });
        Ok(self)
    }

    /// Checks every user production has a builder.
    fn finish(self, grammar: &Grammar) -> Result<Self, GrammarBuildError> {
        for (index, rule) in self.rules.iter().enumerate().skip(1) {
            if rule.is_none() {
                return Err(GrammarBuildError::MissingBinding {
                    text: grammar.production_text(index).unwrap_or_default(),
                });
            }
        }
        Ok(self)
    }

    pub(crate) fn get(&self, production: usize) -> Option<&Rule> {
        self.rules.get(production).and_then(Option::as_ref)
    }
}

/// Builds the registration table of the query language.
pub(crate) fn query_rules(grammar: &Grammar) -> Result<RuleTable, GrammarBuildError> {
    let mut rules = RuleTable::new(grammar);
    rules
        .bind(grammar, "SEQUENCE -> SEQUENCE_ITEM", &[0], sequence_start)?
        .bind(grammar, "SEQUENCE -> SEQUENCE SEQUENCE_ITEM", &[0, 1], sequence_append)?
        .bind(grammar, "SEQUENCE -> SEQUENCE & SEQUENCE_ITEM", &[0, 2], sequence_append)?
        .bind(grammar, "SEQUENCE_ITEM -> SEQUENCE_BODY", &[0], |a, c| {
            sequence_item(a, c, false, false)
        })?
        .bind(grammar, "SEQUENCE_ITEM -> ^ SEQUENCE_BODY", &[1], |a, c| {
            sequence_item(a, c, false, true)
        })?
        .bind(grammar, "SEQUENCE_ITEM -> - SEQUENCE_BODY", &[1], |a, c| {
            sequence_item(a, c, true, false)
        })?
        .bind(grammar, "SEQUENCE_ITEM -> - ^ SEQUENCE_BODY", &[2], |a, c| {
            sequence_item(a, c, true, true)
        })?
        .bind(grammar, "SEQUENCE_BODY -> ELEMENT", &[0], |a, _| {
            Ok(Node::Body(SequenceBody::Element(a.element(0)?)))
        })?
        .bind(grammar, "SEQUENCE_BODY -> BRACKET", &[0], |a, _| {
            Ok(Node::Body(SequenceBody::Bracket(a.bracket(0)?)))
        })?
        .bind(grammar, "ELEMENT -> ELEMENT_ITEM", &[0], |a, c| {
            let (items, _) = a.sfps(0)?.freeze();
            Ok(Node::Element(Element {
                prefix: None,
                items,
                span: c.span,
            }))
        })?
        .bind(grammar, "ELEMENT -> ELEMENT_PREFIX ELEMENT_ITEM", &[0, 1], |a, c| {
            let prefix = a.prefix(0)?;
            let (items, _) = a.sfps(1)?.freeze();
            Ok(Node::Element(Element {
                prefix: Some(prefix),
                items,
                span: c.span,
            }))
        })?;
    for prefix in ["@", "#", "$"] {
        rules.bind(grammar, &format!("ELEMENT_PREFIX -> {prefix}"), &[0], |a, _| {
            let mark = a.mark(0)?;
            Ok(Node::Prefix(Prefix {
                symbol: mark.symbol,
                span: mark.span,
            }))
        })?;
    }
    rules
        .bind(grammar, "BRACKET -> [ BRACKET_ITEM ]", &[1], |a, c| {
            let (items, _) = a.strings(0)?.freeze();
            Ok(Node::Bracket(Bracket {
                items,
                span: c.span,
            }))
        })?
        .bind(grammar, "BRACKET_ITEM -> str", &[0], strings_start)?
        .bind(grammar, "BRACKET_ITEM -> BRACKET_ITEM str", &[0, 1], strings_append)?
        .bind(grammar, "ELEMENT_ITEM -> SFP", &[0], |a, c| {
            Ok(Node::Sfps(ListBuilder::start(a.sfp(0)?, c.span)))
        })?
        .bind(grammar, "ELEMENT_ITEM -> ELEMENT_ITEM | SFP", &[0, 2], sfps_append)?
        .bind(grammar, "ELEMENT_ITEM -> ELEMENT_ITEM / SFP", &[0, 2], sfps_append)?
        .bind(grammar, "SFP -> SUBJECT", &[0], |a, c| {
            Ok(Node::Sfp(Sfp {
                subject: a.subject(0)?,
                family: None,
                predicative: None,
                span: c.span,
            }))
        })?
        .bind(grammar, "SFP -> SUBJECT UNARY_FAMILY", &[0, 1], |a, c| {
            Ok(Node::Sfp(Sfp {
                subject: a.subject(0)?,
                family: Some(a.family(1)?),
                predicative: None,
                span: c.span,
            }))
        })?
        .bind(grammar, "SFP -> SUBJECT FAMILY PREDICATIVE", &[0, 1, 2], |a, c| {
            Ok(Node::Sfp(Sfp {
                subject: a.subject(0)?,
                family: Some(a.family(1)?),
                predicative: Some(a.predicative(2)?),
                span: c.span,
            }))
        })?
        .bind(grammar, "SUBJECT -> STRING", &[0], |a, _| {
            Ok(Node::Subject(freeze_str_list(a.strings(0)?)))
        })?;
    for family in ["~+", "~-"] {
        rules.bind(grammar, &format!("UNARY_FAMILY -> {family}"), &[0], family_of)?;
    }
    for family in [":", ">", ">=", "<", "<=", "~"] {
        rules.bind(grammar, &format!("FAMILY -> {family}"), &[0], family_of)?;
    }
    rules
        .bind(grammar, "PREDICATIVE -> STRING", &[0], |a, _| {
            Ok(Node::Predicative(Predicative::StrList(freeze_str_list(
                a.strings(0)?,
            ))))
        })?
        .bind(grammar, "PREDICATIVE -> COLLECTION", &[0], |a, _| {
            Ok(Node::Predicative(Predicative::Col(a.col(0)?)))
        })?
        .bind(grammar, "PREDICATIVE -> RANGE", &[0], |a, _| {
            Ok(Node::Predicative(Predicative::Range(a.range(0)?)))
        })?
        .bind(grammar, "PREDICATIVE -> SORT_LIST", &[0], |a, _| {
            let (items, span) = a.sort_list(0)?.freeze();
            Ok(Node::Predicative(Predicative::SortList(SortList { items, span })))
        })?
        .bind(grammar, "STRING -> str", &[0], strings_start)?
        .bind(grammar, "STRING -> STRING . str", &[0, 2], strings_append)?
        .bind(grammar, "COLLECTION -> { }", &[], |_, c| {
            Ok(Node::Col(Col {
                items: Vec::new(),
                span: c.span,
            }))
        })?
        .bind(grammar, "COLLECTION -> { COLLECTION_ITEM }", &[1], |a, c| {
            let (items, _) = a.strings(0)?.freeze();
            Ok(Node::Col(Col {
                items,
                span: c.span,
            }))
        })?
        .bind(grammar, "COLLECTION_ITEM -> str", &[0], strings_start)?
        .bind(grammar, "COLLECTION_ITEM -> COLLECTION_ITEM , str", &[0, 2], collection_append)?
        .bind(
            grammar,
            "RANGE -> RANGE_BEGIN str , str RANGE_END",
            &[0, 1, 3, 4],
            |a, c| {
                let begin = a.mark(0)?;
                let from = a.str(1)?;
                let to = a.str(2)?;
                let end = a.mark(3)?;
                Ok(Node::Range(Range {
                    from,
                    to,
                    include_from: begin.symbol == "[",
                    include_to: end.symbol == "]",
                    span: c.span,
                }))
            },
        )?;
    for bound in ["RANGE_BEGIN -> [", "RANGE_BEGIN -> (", "RANGE_END -> ]", "RANGE_END -> )"] {
        rules.bind(grammar, bound, &[0], |a, _| Ok(Node::Symbol(a.mark(0)?)))?;
    }
    rules
        .bind(grammar, "SORT_LIST -> ORDERED_SORT_ITEM", &[0], |a, c| {
            Ok(Node::SortList(ListBuilder::start(a.sort_item(0)?, c.span)))
        })?
        .bind(grammar, "SORT_LIST -> SORT_LIST , ORDERED_SORT_ITEM", &[0, 2], |a, _| {
            let mut list = a.sort_list(0)?;
            let item = a.sort_item(1)?;
            let span = item.span;
            list.push(item, span);
            Ok(Node::SortList(list))
        })?
        .bind(grammar, "ORDERED_SORT_ITEM -> SORT_ITEM", &[0], |a, c| {
            ordered_sort_item(a, c, SortDirection::Default)
        })?
        .bind(grammar, "ORDERED_SORT_ITEM -> + SORT_ITEM", &[1], |a, c| {
            ordered_sort_item(a, c, SortDirection::Asc)
        })?
        .bind(grammar, "ORDERED_SORT_ITEM -> - SORT_ITEM", &[1], |a, c| {
            ordered_sort_item(a, c, SortDirection::Desc)
        })?
        .bind(grammar, "SORT_ITEM -> str", &[0], |a, c| sort_item(a, c, false))?
        .bind(grammar, "SORT_ITEM -> ^ str", &[1], |a, c| sort_item(a, c, true))?;
    rules.finish(grammar)
}

fn sequence_start(a: &mut RuleArgs<'_>, c: &mut RuleContext<'_>) -> Result<Node, GrammarError> {
    Ok(Node::Sequence(ListBuilder::start(a.item(0)?, c.span)))
}

fn sequence_append(a: &mut RuleArgs<'_>, _: &mut RuleContext<'_>) -> Result<Node, GrammarError> {
    let mut list = a.sequence(0)?;
    let item = a.item(1)?;
    let span = item.span;
    list.push(item, span);
    Ok(Node::Sequence(list))
}

fn sequence_item(
    a: &mut RuleArgs<'_>,
    c: &mut RuleContext<'_>,
    minus: bool,
    source: bool,
) -> Result<Node, GrammarError> {
    Ok(Node::Item(SequenceItem {
        minus,
        source,
        body: a.body(0)?,
        span: c.span,
    }))
}

fn strings_start(a: &mut RuleArgs<'_>, c: &mut RuleContext<'_>) -> Result<Node, GrammarError> {
    Ok(Node::Strings(ListBuilder::start(a.str(0)?, c.span)))
}

fn strings_append(a: &mut RuleArgs<'_>, _: &mut RuleContext<'_>) -> Result<Node, GrammarError> {
    let mut list = a.strings(0)?;
    let item = a.str(1)?;
    let span = item.span;
    list.push(item, span);
    Ok(Node::Strings(list))
}

fn collection_append(a: &mut RuleArgs<'_>, c: &mut RuleContext<'_>) -> Result<Node, GrammarError> {
    let mut list = a.strings(0)?;
    let item = a.str(1)?;
    if list.items().iter().any(|existing| existing.value == item.value) {
        c.warning(GrammarError::DuplicatedCollectionItem {
            value: item.value.clone(),
            span: item.span,
        });
    }
    let span = item.span;
    list.push(item, span);
    Ok(Node::Strings(list))
}

fn sfps_append(a: &mut RuleArgs<'_>, _: &mut RuleContext<'_>) -> Result<Node, GrammarError> {
    let mut list = a.sfps(0)?;
    let item = a.sfp(1)?;
    let span = item.span;
    list.push(item, span);
    Ok(Node::Sfps(list))
}

fn family_of(a: &mut RuleArgs<'_>, _: &mut RuleContext<'_>) -> Result<Node, GrammarError> {
    let mark = a.mark(0)?;
    Ok(Node::Family(Family {
        symbol: mark.symbol,
        span: mark.span,
    }))
}

fn ordered_sort_item(
    a: &mut RuleArgs<'_>,
    c: &mut RuleContext<'_>,
    direction: SortDirection,
) -> Result<Node, GrammarError> {
    let mut item = a.sort_item(0)?;
    item.direction = direction;
    item.span = c.span;
    Ok(Node::SortItem(item))
}

fn sort_item(a: &mut RuleArgs<'_>, c: &mut RuleContext<'_>, source: bool) -> Result<Node, GrammarError> {
    Ok(Node::SortItem(SortItem {
        value: a.str(0)?,
        source,
        direction: SortDirection::Default,
        span: c.span,
    }))
}

fn freeze_str_list(list: ListBuilder<Str>) -> StrList {
    let (items, span) = list.freeze();
    StrList { items, span }
}

/// Converts a string token into its stack node.
pub(crate) fn string_node(kind: StrKind, value: String, span: Span) -> Node {
    Node::Str(Str { value, kind, span })
}
