//! Query plan: the validated output of the semantic pass.
//!
//! A plan is a list of sorts, an intersection of union filter groups and a
//! list of connective elements. Meta values render back to query text so a
//! plan can be shown to the user in the same language it was typed in.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use time::Date;

use crate::diagnostics::Span;
use crate::lexical::{self, quote_string, StrKind, Token};
use crate::options::LexicalOptions;

use super::dialect::DialectKind;
use super::elements::is_designator;

/// One segment of a meta address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MetaString {
    /// Segment text.
    pub value: String,
    /// Written in backticks: matched exactly, never fuzzily.
    pub precise: bool,
}

impl MetaString {
    /// A fuzzy segment.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            precise: false,
        }
    }

    /// An exact segment.
    pub fn precise(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            precise: true,
        }
    }

    /// Query text for this segment: bare when it scans back as one bare word,
    /// double-quoted otherwise, backticked when precise.
    pub fn render(&self) -> String {
        if self.precise {
            return quote_string(&self.value, '`');
        }
        let scanned = lexical::analyze(&self.value, &LexicalOptions::default());
        let bare = scanned.warnings.is_empty()
            && matches!(
                scanned.result.as_deref(),
                Some([item]) if item.token == Token::string(StrKind::Restricted, self.value.as_str())
            );
        if bare {
            self.value.clone()
        } else {
            quote_string(&self.value, '"')
        }
    }

    /// Query text for this segment as the whole subject of a clause. A bare
    /// word that would be read as a keyword or designator is double-quoted.
    pub fn render_subject(&self) -> String {
        if !self.precise && is_reserved(&self.value) {
            quote_string(&self.value, '"')
        } else {
            self.render()
        }
    }
}

/// Words the analyzer reads as a keyword or designator at the start of a clause.
fn is_reserved(value: &str) -> bool {
    let name = value.to_lowercase();
    is_designator(&name)
        || [DialectKind::Illust, DialectKind::Meta]
            .iter()
            .any(|kind| kind.dialect().is_keyword(&name))
}

impl fmt::Display for MetaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Dotted address `a.b.c` into the tag tree.
pub type MetaAddress = Vec<MetaString>;

/// Renders an address with `.` between segments.
pub fn render_address(address: &[MetaString]) -> String {
    address
        .iter()
        .map(MetaString::render)
        .collect::<Vec<_>>()
        .join(".")
}

/// Renders an address in subject position. Only a one-segment subject can
/// be taken for a keyword, so only that case is checked.
pub fn render_subject(address: &[MetaString]) -> String {
    match address {
        [only] => only.render_subject(),
        _ => render_address(address),
    }
}

/// A meta tag reference, from the narrowest form to sequential group selectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetaValue {
    /// One bare segment: may name an author, topic or tag.
    Single {
        /// The segment.
        value: MetaString,
    },
    /// A multi-segment address: names a topic or tag.
    Simple {
        /// The address.
        address: MetaAddress,
    },
    /// Members of a sequential group picked by name: `group:{a, b}`.
    SequentialOfCollection {
        /// Group address.
        tag: MetaAddress,
        /// Picked members.
        values: Vec<MetaString>,
    },
    /// Members of a sequential group between two members.
    SequentialOfRange {
        /// Group address.
        tag: MetaAddress,
        /// Lower member, unbounded when absent.
        begin: Option<MetaString>,
        /// Upper member, unbounded when absent.
        end: Option<MetaString>,
        /// Lower member included.
        include_begin: bool,
        /// Upper member included.
        include_end: bool,
    },
    /// Members of a group from one member to another: `group.a~b`.
    SequentialItemToOther {
        /// Starting member address.
        tag: MetaAddress,
        /// Ending member.
        other: MetaString,
    },
    /// Members of a group from one member to either end: `group.a~+`.
    SequentialItemToDirection {
        /// Starting member address.
        tag: MetaAddress,
        /// Towards the start of the group.
        descending: bool,
    },
}

impl MetaValue {
    /// Address the value is anchored at.
    pub fn address(&self) -> MetaAddress {
        match self {
            MetaValue::Single { value } => vec![value.clone()],
            MetaValue::Simple { address } => address.clone(),
            MetaValue::SequentialOfCollection { tag, .. }
            | MetaValue::SequentialOfRange { tag, .. }
            | MetaValue::SequentialItemToOther { tag, .. }
            | MetaValue::SequentialItemToDirection { tag, .. } => tag.clone(),
        }
    }

    /// Query text that parses back to this value.
    pub fn render(&self) -> String {
        match self {
            MetaValue::Single { value } => value.render_subject(),
            MetaValue::Simple { address } => render_subject(address),
            MetaValue::SequentialOfCollection { tag, values } => match values.as_slice() {
                [only] => format!("{}:{}", render_subject(tag), only.render()),
                _ => format!(
                    "{}:{{{}}}",
                    render_subject(tag),
                    values
                        .iter()
                        .map(MetaString::render)
                        .collect::<Vec<_>>()
                        .join(",")
                ),
            },
            MetaValue::SequentialOfRange {
                tag,
                begin,
                end,
                include_begin,
                include_end,
            } => {
                let tag = render_subject(tag);
                match (begin, end) {
                    (Some(b), None) => {
                        format!("{tag}{}{}", if *include_begin { ">=" } else { ">" }, b.render())
                    }
                    (None, Some(e)) => {
                        format!("{tag}{}{}", if *include_end { "<=" } else { "<" }, e.render())
                    }
                    (Some(b), Some(e)) => format!(
                        "{tag}:{}{},{}{}",
                        if *include_begin { '[' } else { '(' },
                        b.render(),
                        e.render(),
                        if *include_end { ']' } else { ')' }
                    ),
                    (None, None) => tag,
                }
            }
            MetaValue::SequentialItemToOther { tag, other } => {
                format!("{}~{}", render_subject(tag), other.render())
            }
            MetaValue::SequentialItemToDirection { tag, descending } => {
                format!("{}~{}", render_subject(tag), if *descending { '-' } else { '+' })
            }
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Kind of meta tag an element refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaType {
    /// `@`, `author:`.
    Author,
    /// `#`, `topic:`.
    Topic,
    /// `$`, `tag:`.
    Tag,
}

impl MetaType {
    /// Lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            MetaType::Author => "author",
            MetaType::Topic => "topic",
            MetaType::Tag => "tag",
        }
    }
}

/// Items of a meta-tag element, stored at the narrowest kind that fits them all.
///
/// Author items are single segments, topic items are plain addresses, and tag
/// items may be any meta value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", content = "items", rename_all = "lowercase")]
pub enum MetaTagItems {
    /// Every item is a single segment.
    Author(Vec<MetaString>),
    /// Every item is a plain address.
    Topic(Vec<MetaAddress>),
    /// Anything else.
    Tag(Vec<MetaValue>),
}

impl MetaTagItems {
    /// Classifies `values` into the narrowest kind.
    pub fn narrowest(values: Vec<MetaValue>) -> Self {
        if values.iter().all(|v| matches!(v, MetaValue::Single { .. })) {
            MetaTagItems::Author(
                values
                    .into_iter()
                    .filter_map(|v| match v {
                        MetaValue::Single { value } => Some(value),
                        _ => None,
                    })
                    .collect(),
            )
        } else if values
            .iter()
            .all(|v| matches!(v, MetaValue::Single { .. } | MetaValue::Simple { .. }))
        {
            MetaTagItems::Topic(values.iter().map(MetaValue::address).collect())
        } else {
            MetaTagItems::Tag(values)
        }
    }

    /// The narrowest kind as a meta type.
    pub fn class(&self) -> MetaType {
        match self {
            MetaTagItems::Author(_) => MetaType::Author,
            MetaTagItems::Topic(_) => MetaType::Topic,
            MetaTagItems::Tag(_) => MetaType::Tag,
        }
    }

    /// Whether items of this kind can be read as `meta_type`.
    pub fn fits(&self, meta_type: MetaType) -> bool {
        match meta_type {
            MetaType::Tag => true,
            MetaType::Topic => !matches!(self, MetaTagItems::Tag(_)),
            MetaType::Author => matches!(self, MetaTagItems::Author(_)),
        }
    }

    /// Items as tag values.
    pub fn tag_values(&self) -> Vec<MetaValue> {
        match self {
            MetaTagItems::Author(items) => items
                .iter()
                .map(|value| MetaValue::Single {
                    value: value.clone(),
                })
                .collect(),
            MetaTagItems::Topic(items) => items
                .iter()
                .map(|address| match address.as_slice() {
                    [only] => MetaValue::Single {
                        value: only.clone(),
                    },
                    _ => MetaValue::Simple {
                        address: address.clone(),
                    },
                })
                .collect(),
            MetaTagItems::Tag(items) => items.clone(),
        }
    }

    /// Items as topic addresses, when they fit.
    pub fn topic_addresses(&self) -> Option<Vec<MetaAddress>> {
        match self {
            MetaTagItems::Author(items) => Some(items.iter().map(|s| vec![s.clone()]).collect()),
            MetaTagItems::Topic(items) => Some(items.clone()),
            MetaTagItems::Tag(_) => None,
        }
    }

    /// Items as author names, when they fit.
    pub fn author_names(&self) -> Option<&[MetaString]> {
        match self {
            MetaTagItems::Author(items) => Some(items),
            _ => None,
        }
    }

    /// Query text of each item.
    pub fn rendered(&self) -> Vec<String> {
        match self {
            MetaTagItems::Author(items) => items.iter().map(MetaString::render_subject).collect(),
            MetaTagItems::Topic(items) => items.iter().map(|a| render_subject(a)).collect(),
            MetaTagItems::Tag(items) => items.iter().map(MetaValue::render).collect(),
        }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        match self {
            MetaTagItems::Author(items) => items.len(),
            MetaTagItems::Topic(items) => items.len(),
            MetaTagItems::Tag(items) => items.len(),
        }
    }

    /// True without items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An author, topic or tag reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaTagElement {
    /// Union items.
    pub items: MetaTagItems,
    /// Kind fixed by a prefix or designator; `None` leaves it to the translator.
    pub meta_type: Option<MetaType>,
    /// Written with `-`.
    pub exclude: bool,
    /// Source span of the sequence item.
    pub span: Span,
}

/// Plain name match, used by dialects that list meta tags themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameElement {
    /// Union items.
    pub items: Vec<MetaString>,
    /// Written with `-`.
    pub exclude: bool,
    /// Source span.
    pub span: Span,
}

/// `[free text]` match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentElement {
    /// Union items.
    pub items: Vec<MetaString>,
    /// Written with `-`.
    pub exclude: bool,
    /// Source span.
    pub span: Span,
}

/// `^site.tag` reference to a tag imported from a source site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceTagElement {
    /// Union items.
    pub items: Vec<MetaAddress>,
    /// Written with `-`.
    pub exclude: bool,
    /// Source span.
    pub span: Span,
}

/// A connective element of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Element {
    /// Name match.
    Name(NameElement),
    /// Comment match.
    Comment(CommentElement),
    /// Author, topic or tag reference.
    MetaTag(MetaTagElement),
    /// Source tag reference.
    SourceTag(SourceTagElement),
}

impl Element {
    /// Group name used by the visual plan.
    pub fn type_name(&self) -> &'static str {
        match self {
            Element::Name(_) => "name",
            Element::Comment(_) => "comment",
            Element::MetaTag(_) => "meta-tag",
            Element::SourceTag(_) => "source-tag",
        }
    }

    /// Written with `-`.
    pub fn exclude(&self) -> bool {
        match self {
            Element::Name(e) => e.exclude,
            Element::Comment(e) => e.exclude,
            Element::MetaTag(e) => e.exclude,
            Element::SourceTag(e) => e.exclude,
        }
    }

    /// Source span.
    pub fn span(&self) -> Span {
        match self {
            Element::Name(e) => e.span,
            Element::Comment(e) => e.span,
            Element::MetaTag(e) => e.span,
            Element::SourceTag(e) => e.span,
        }
    }

    /// Query text that analyzes back to this element, span aside.
    pub fn render(&self) -> String {
        let (body, exclude) = match self {
            Element::Name(e) => (
                e.items.iter().map(MetaString::render_subject).collect::<Vec<_>>().join("|"),
                e.exclude,
            ),
            Element::Comment(e) => (
                format!(
                    "[{}]",
                    e.items.iter().map(MetaString::render).collect::<Vec<_>>().join(" ")
                ),
                e.exclude,
            ),
            Element::MetaTag(e) => {
                let prefix = match e.meta_type {
                    Some(MetaType::Author) => "@",
                    Some(MetaType::Topic) => "#",
                    Some(MetaType::Tag) => "$",
                    None => "",
                };
                (format!("{prefix}{}", e.items.rendered().join("|")), e.exclude)
            }
            Element::SourceTag(e) => (
                format!(
                    "^{}",
                    e.items.iter().map(|a| render_subject(a)).collect::<Vec<_>>().join("|")
                ),
                e.exclude,
            ),
        };
        if exclude {
            format!("-{body}")
        } else {
            body
        }
    }
}

fn serialize_date<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(date)
}

/// A typed filter operand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    /// Text or enum member.
    String(String),
    /// Integer.
    Number(i64),
    /// Ratio.
    Float(f64),
    /// Bytes or milliseconds.
    Size(i64),
    /// Calendar date, serialized as `yyyy-MM-dd`.
    Date(#[serde(serialize_with = "serialize_date")] Date),
    /// A number pattern with `*` or `?`.
    Pattern(String),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::String(s) | FilterValue::Pattern(s) => f.write_str(s),
            FilterValue::Number(n) | FilterValue::Size(n) => write!(f, "{n}"),
            FilterValue::Float(x) => write!(f, "{x}"),
            FilterValue::Date(d) => write!(f, "{d}"),
        }
    }
}

/// One filter on one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "relation", rename_all = "snake_case")]
pub enum Filter {
    /// Field equals any of the values.
    Equal {
        /// Field key.
        field: &'static str,
        /// Accepted values.
        values: Vec<FilterValue>,
    },
    /// Field set equals the given composition.
    Composition {
        /// Field key.
        field: &'static str,
        /// Members; may be empty.
        values: Vec<FilterValue>,
    },
    /// Field matches any of the patterns.
    Match {
        /// Field key.
        field: &'static str,
        /// Patterns.
        values: Vec<FilterValue>,
        /// Whole-value match rather than substring.
        exact: bool,
    },
    /// Field lies in a range; a missing bound is unbounded.
    Range {
        /// Field key.
        field: &'static str,
        /// Lower bound.
        begin: Option<FilterValue>,
        /// Upper bound.
        end: Option<FilterValue>,
        /// Lower bound included.
        include_begin: bool,
        /// Upper bound included.
        include_end: bool,
    },
    /// Boolean field is set.
    Flag {
        /// Field key.
        field: &'static str,
    },
}

impl Filter {
    /// Field key.
    pub fn field(&self) -> &'static str {
        match self {
            Filter::Equal { field, .. }
            | Filter::Composition { field, .. }
            | Filter::Match { field, .. }
            | Filter::Range { field, .. }
            | Filter::Flag { field } => *field,
        }
    }
}

/// Filters joined by `|`: a match on any of them satisfies the group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionFilters {
    /// Written with `-`.
    pub exclude: bool,
    /// Alternatives, never empty.
    pub filters: Vec<Filter>,
}

/// One sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Sort {
    /// Canonical sort item name.
    pub field: &'static str,
    /// Descending order.
    pub descending: bool,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.descending { '-' } else { '+' }, self.field)
    }
}

/// Output of the semantic pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QueryPlan {
    /// Sort keys in priority order.
    pub sorts: Vec<Sort>,
    /// Intersection of union groups.
    pub filters: Vec<UnionFilters>,
    /// Connective elements, intersected.
    pub elements: Vec<Element>,
}

impl QueryPlan {
    /// True for a plan with no sorts, filters or elements.
    pub fn is_empty(&self) -> bool {
        self.sorts.is_empty() && self.filters.is_empty() && self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(parts: &[&str]) -> MetaAddress {
        parts.iter().map(|p| MetaString::new(*p)).collect()
    }

    #[test]
    fn strings_quote_only_when_needed() {
        assert_eq!(MetaString::new("rem").render(), "rem");
        assert_eq!(MetaString::new("two words").render(), "\"two words\"");
        assert_eq!(MetaString::new("a.b").render(), "\"a.b\"");
        assert_eq!(MetaString::precise("rem").render(), "`rem`");
    }

    #[test]
    fn sequential_values_render() {
        let range = MetaValue::SequentialOfRange {
            tag: address(&["season", "arc"]),
            begin: Some(MetaString::new("1")),
            end: Some(MetaString::new("5")),
            include_begin: true,
            include_end: false,
        };
        assert_eq!(range.render(), "season.arc:[1,5)");

        let upper = MetaValue::SequentialOfRange {
            tag: address(&["s"]),
            begin: None,
            end: Some(MetaString::new("3")),
            include_begin: false,
            include_end: true,
        };
        assert_eq!(upper.render(), "s<=3");

        let set = MetaValue::SequentialOfCollection {
            tag: address(&["s"]),
            values: vec![MetaString::new("a"), MetaString::precise("b")],
        };
        assert_eq!(set.render(), "s:{a,`b`}");

        let direction = MetaValue::SequentialItemToDirection {
            tag: address(&["s", "a"]),
            descending: true,
        };
        assert_eq!(direction.render(), "s.a~-");
    }

    #[test]
    fn narrowest_item_class() {
        let single = MetaValue::Single {
            value: MetaString::new("a"),
        };
        let simple = MetaValue::Simple {
            address: address(&["a", "b"]),
        };
        assert_eq!(MetaTagItems::narrowest(vec![single.clone()]).class(), MetaType::Author);
        let topic = MetaTagItems::narrowest(vec![single, simple]);
        assert_eq!(topic.class(), MetaType::Topic);
        assert!(topic.fits(MetaType::Tag));
        assert!(!topic.fits(MetaType::Author));
        assert_eq!(topic.rendered(), ["a", "a.b"]);
    }

    #[test]
    fn date_values_serialize_as_iso_dates() {
        let value = FilterValue::Date(time::macros::date!(2021 - 03 - 09));
        let json = serde_json::to_value(&value).expect("json");
        assert_eq!(json["value"], "2021-03-09");
    }
}
