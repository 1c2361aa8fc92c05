//! Dialects: the keyword tables a query is analyzed against.

use serde::{Deserialize, Serialize};

use super::elements::ElementGenerator;
use super::fields::{EquableValue, FieldDef, FieldKind};
use super::parsers::{EnumTable, Scalar};
use super::sort::{SortDef, SortItemDef, SORT_KEYWORDS};

/// Built-in dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    /// Images: meta tags, source tags and media fields.
    Illust,
    /// Author, topic and tag listings matched by name.
    Meta,
}

impl DialectKind {
    /// The dialect's tables.
    pub fn dialect(self) -> &'static Dialect {
        match self {
            DialectKind::Illust => &ILLUST,
            DialectKind::Meta => &META,
        }
    }
}

/// Keyword fields, sort items and element generators of one query target.
#[derive(Debug)]
pub struct Dialect {
    /// Name used in logs.
    pub name: &'static str,
    /// Keyword filter fields.
    pub fields: &'static [FieldDef],
    /// Sortable items, if the target sorts.
    pub sort: Option<&'static SortDef>,
    /// Generator for plain elements.
    pub elements: ElementGenerator,
    /// Generator for `^` elements, if the target has source data.
    pub source_elements: Option<ElementGenerator>,
}

impl Dialect {
    /// Field selected by a lower-case alias, `^` included.
    pub fn field(&self, alias: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.aliases.contains(&alias))
    }

    /// True when `name` is a keyword with or without `^`.
    pub fn is_keyword(&self, name: &str) -> bool {
        SORT_KEYWORDS.contains(&name)
            || self
                .fields
                .iter()
                .flat_map(|f| f.aliases.iter().copied())
                .any(|a| a.strip_prefix('^').unwrap_or(a) == name)
    }

    /// Aliases of every keyword, sort first.
    pub fn keywords(&self) -> Vec<Vec<String>> {
        let sort: Option<Vec<String>> = self
            .sort
            .map(|_| SORT_KEYWORDS.iter().map(|k| (*k).to_owned()).collect());
        sort.into_iter()
            .chain(
                self.fields
                    .iter()
                    .map(|f| f.aliases.iter().map(|a| (*a).to_owned()).collect()),
            )
            .collect()
    }
}

static TAGME: EnumTable = EnumTable {
    type_name: "tagme",
    items: &[("TAG", &[]), ("AUTHOR", &[]), ("TOPIC", &[]), ("SOURCE", &[])],
};

static META_TYPE: EnumTable = EnumTable {
    type_name: "meta type",
    items: &[
        ("COPYRIGHT", &["ip"]),
        ("WORK", &[]),
        ("CHARACTER", &["chara"]),
        ("ARTIST", &[]),
        ("STUDIO", &[]),
        ("PUBLISH", &["publisher"]),
    ],
};

static ILLUST_SORT: SortDef = SortDef {
    items: &[
        SortItemDef { key: "id", aliases: &["id"] },
        SortItemDef { key: "score", aliases: &["score", "s"] },
        SortItemDef { key: "ordinal", aliases: &["ordinal", "ord"] },
        SortItemDef { key: "partition", aliases: &["partition", "pt"] },
        SortItemDef { key: "create-time", aliases: &["create-time", "create", "ct"] },
        SortItemDef { key: "update-time", aliases: &["update-time", "update", "ut"] },
        SortItemDef { key: "source-id", aliases: &["^id", "source-id"] },
        SortItemDef { key: "source-site", aliases: &["^site", "source-site"] },
    ],
};

const fn field(key: &'static str, aliases: &'static [&'static str], kind: FieldKind) -> FieldDef {
    FieldDef { key, aliases, kind }
}

static ILLUST_FIELDS: [FieldDef; 17] = [
    field("favorite", &["favorite", "f"], FieldKind::Flag),
    field("book-member", &["book-member", "bm"], FieldKind::Flag),
    field("id", &["id"], FieldKind::NumberPattern),
    field("score", &["score"], FieldKind::Comparable(Scalar::Number)),
    field("partition", &["partition", "pt"], FieldKind::Date),
    field("ordinal", &["ordinal", "ord"], FieldKind::DateTime),
    field("create-time", &["create-time", "create", "ct"], FieldKind::DateTime),
    field("update-time", &["update-time", "update", "ut"], FieldKind::DateTime),
    field("description", &["description", "desc"], FieldKind::Matchable { exact: false }),
    field("extension", &["extension", "ext"], FieldKind::Equable(EquableValue::Text)),
    field("filesize", &["filesize", "size"], FieldKind::Comparable(Scalar::ByteSize)),
    field("source-id", &["^id", "source-id"], FieldKind::NumberPattern),
    field("source-page", &["^page", "source-page"], FieldKind::NumberPattern),
    field(
        "source-page-name",
        &["^page-name", "^pn", "source-page-name"],
        FieldKind::Equable(EquableValue::Text),
    ),
    field("source-site", &["^site", "source-site"], FieldKind::Equable(EquableValue::Text)),
    field(
        "source-description",
        &["^description", "^desc", "source-description", "source-desc"],
        FieldKind::Matchable { exact: false },
    ),
    field(
        "tagme",
        &["tagme"],
        FieldKind::Composition {
            table: &TAGME,
            allow_flag_mode: true,
        },
    ),
];

static ILLUST: Dialect = Dialect {
    name: "illust",
    fields: &ILLUST_FIELDS,
    sort: Some(&ILLUST_SORT),
    elements: ElementGenerator::MetaTag,
    source_elements: Some(ElementGenerator::SourceTag),
};

static META_SORT: SortDef = SortDef {
    items: &[
        SortItemDef { key: "id", aliases: &["id"] },
        SortItemDef { key: "name", aliases: &["name"] },
        SortItemDef { key: "score", aliases: &["score", "s"] },
        SortItemDef { key: "create-time", aliases: &["create-time", "create", "ct"] },
        SortItemDef { key: "update-time", aliases: &["update-time", "update", "ut"] },
    ],
};

static META_FIELDS: [FieldDef; 6] = [
    field("favorite", &["favorite", "f"], FieldKind::Flag),
    field("score", &["score"], FieldKind::Comparable(Scalar::Number)),
    field("create-time", &["create-time", "create", "ct"], FieldKind::DateTime),
    field("update-time", &["update-time", "update", "ut"], FieldKind::DateTime),
    field("count", &["count"], FieldKind::Comparable(Scalar::Number)),
    field("type", &["type"], FieldKind::Equable(EquableValue::Enum(&META_TYPE))),
];

static META: Dialect = Dialect {
    name: "meta",
    fields: &META_FIELDS,
    sort: Some(&META_SORT),
    elements: ElementGenerator::Name,
    source_elements: None,
};
