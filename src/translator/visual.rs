//! Visual query plan: the resolved, display-ready form of a query.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Span;
use crate::semantic::FilterValue;

/// A tag from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTag {
    /// Catalog id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Alternative names.
    #[serde(default)]
    pub other_names: Vec<String>,
    /// Name of the parent tag; members of a group share their parent.
    #[serde(default)]
    pub parent: Option<String>,
    /// Display colour.
    #[serde(default)]
    pub color: Option<String>,
}

/// A topic from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTopic {
    /// Catalog id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Alternative names.
    #[serde(default)]
    pub other_names: Vec<String>,
    /// Name of the parent topic.
    #[serde(default)]
    pub parent: Option<String>,
    /// Display colour.
    #[serde(default)]
    pub color: Option<String>,
}

/// An author from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementAuthor {
    /// Catalog id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Alternative names.
    #[serde(default)]
    pub other_names: Vec<String>,
    /// Display colour.
    #[serde(default)]
    pub color: Option<String>,
}

/// A tag imported from a source site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSourceTag {
    /// Catalog id.
    pub id: u64,
    /// Source site.
    pub site: String,
    /// Tag code on the site.
    pub name: String,
    /// Name shown by the site.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Translated name.
    #[serde(default)]
    pub other_name: Option<String>,
}

/// A plain string item of a name or comment element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementString {
    /// Text.
    pub value: String,
    /// Matched exactly.
    pub precise: bool,
}

/// One resolved union item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ElementValue {
    /// Name or comment text.
    String(ElementString),
    /// Tag.
    Tag(ElementTag),
    /// Topic.
    Topic(ElementTopic),
    /// Author.
    Author(ElementAuthor),
    /// Source tag.
    SourceTag(ElementSourceTag),
}

/// One element of the query after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementItem {
    /// Written with `-`.
    pub exclude: bool,
    /// Resolved alternatives.
    pub union_items: Vec<ElementValue>,
}

/// Elements of one type, intersected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualElement {
    /// `name`, `comment`, `meta-tag` or `source-tag`.
    #[serde(rename = "type")]
    pub element_type: &'static str,
    /// Elements in query order.
    pub intersect_items: Vec<ElementItem>,
}

/// One value condition of a filter field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VisualFilterValue {
    /// Equality.
    Equal {
        /// Value.
        value: FilterValue,
    },
    /// Pattern match.
    Match {
        /// Pattern.
        value: FilterValue,
    },
    /// Interval.
    Range {
        /// Lower bound.
        begin: Option<FilterValue>,
        /// Upper bound.
        end: Option<FilterValue>,
        /// Lower bound included.
        include_begin: bool,
        /// Upper bound included.
        include_end: bool,
    },
}

/// Conditions on one field inside a union group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOfOneField {
    /// Field key.
    pub name: &'static str,
    /// Conditions; empty for a flag.
    pub values: Vec<VisualFilterValue>,
}

/// A union filter group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterItem {
    /// Written with `-`.
    pub exclude: bool,
    /// Fields in order of first appearance.
    pub fields: Vec<FilterOfOneField>,
}

/// The display form of a compiled query.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VisualQueryPlan {
    /// `+field` / `-field`.
    pub sorts: Vec<String>,
    /// Element groups in order of first appearance.
    pub elements: Vec<VisualElement>,
    /// Union filter groups.
    pub filters: Vec<FilterItem>,
}

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Text to insert.
    pub name: String,
    /// Other names the candidate is known by.
    pub aliases: Vec<String>,
    /// Parent or site, when the candidate has one.
    pub context: Option<String>,
}

/// Completion result for a cursor position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualForecast {
    /// `keyword`, `meta-tag`, `source-tag`, `sort` or `filter`.
    pub kind: &'static str,
    /// Text typed so far.
    pub partial: String,
    /// Ranked candidates.
    pub suggestions: Vec<Suggestion>,
    /// Span a chosen suggestion replaces.
    pub span: Span,
}
