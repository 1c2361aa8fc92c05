#![allow(missing_docs)]

use std::sync::Arc;

use tagql::semantic::{DialectKind, Filter, FilterValue, Sort, UnionFilters};
use tagql::translator::memory::{BuildCall, Catalog, InMemoryQueryer, RecordingBuilder};
use tagql::translator::{
    BuildError, ElementAuthor, ElementTag, ElementTopic, ElementValue, ExecuteBuilder,
};
use tagql::{CompilerOptions, QueryCompiler, QueryManager, Severity};

const CATALOG: &str = r#"{
    "tags": [
        {"id": 1, "name": "landscape", "other_names": ["scenery"]},
        {"id": 2, "name": "season"},
        {"id": 3, "name": "spring", "parent": "season"},
        {"id": 4, "name": "summer", "parent": "season"},
        {"id": 5, "name": "autumn", "parent": "season"},
        {"id": 6, "name": "winter", "parent": "season"}
    ],
    "topics": [
        {"id": 10, "name": "renaissance"},
        {"id": 11, "name": "mona lisa", "parent": "renaissance"}
    ],
    "authors": [
        {"id": 20, "name": "leonardo"},
        {"id": 21, "name": "monet"}
    ],
    "source_tags": [
        {"id": 30, "site": "pixiv", "name": "風景", "display_name": "landscape"}
    ]
}"#;

fn queryer() -> InMemoryQueryer {
    InMemoryQueryer::new(serde_json::from_str::<Catalog>(CATALOG).expect("catalog"))
}

fn compiler() -> QueryCompiler {
    QueryCompiler::new(CompilerOptions::default()).expect("compiler")
}

/// Renders the query as a WHERE clause over an illustrations table.
#[derive(Default)]
struct SqlBuilder {
    order: Vec<String>,
    conditions: Vec<String>,
}

fn sql_value(value: &FilterValue) -> String {
    match value {
        FilterValue::String(s) | FilterValue::Pattern(s) => format!("'{s}'"),
        FilterValue::Date(d) => format!("'{d}'"),
        other => other.to_string(),
    }
}

fn sql_filter(filter: &Filter) -> String {
    match filter {
        Filter::Equal { field, values } | Filter::Composition { field, values } => {
            let values: Vec<String> = values.iter().map(sql_value).collect();
            format!("{field} IN ({})", values.join(", "))
        }
        Filter::Match { field, values, .. } => values
            .iter()
            .map(|v| format!("{field} LIKE {}", sql_value(v)))
            .collect::<Vec<_>>()
            .join(" OR "),
        Filter::Range {
            field,
            begin,
            end,
            include_begin,
            include_end,
        } => {
            let mut parts = Vec::new();
            if let Some(begin) = begin {
                let op = if *include_begin { ">=" } else { ">" };
                parts.push(format!("{field} {op} {}", sql_value(begin)));
            }
            if let Some(end) = end {
                let op = if *include_end { "<=" } else { "<" };
                parts.push(format!("{field} {op} {}", sql_value(end)));
            }
            parts.join(" AND ")
        }
        Filter::Flag { field } => field.to_string(),
    }
}

fn ids(ids: impl Iterator<Item = u64>) -> String {
    ids.map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

impl SqlBuilder {
    fn push(&mut self, condition: String, exclude: bool) {
        if exclude {
            self.conditions.push(format!("NOT ({condition})"));
        } else {
            self.conditions.push(condition);
        }
    }
}

impl ExecuteBuilder for SqlBuilder {
    type Output = String;

    fn map_sorts(&mut self, sorts: &[Sort]) -> Result<(), BuildError> {
        self.order = sorts
            .iter()
            .map(|s| format!("{} {}", s.field, if s.descending { "DESC" } else { "ASC" }))
            .collect();
        Ok(())
    }

    fn map_filter(&mut self, filters: &UnionFilters, exclude: bool) -> Result<(), BuildError> {
        let union: Vec<String> = filters.filters.iter().map(sql_filter).collect();
        self.push(union.join(" OR "), exclude);
        Ok(())
    }

    fn map_tag_element(&mut self, items: &[ElementTag], exclude: bool) -> Result<(), BuildError> {
        self.push(format!("tag IN ({})", ids(items.iter().map(|t| t.id))), exclude);
        Ok(())
    }

    fn map_topic_element(&mut self, items: &[ElementTopic], exclude: bool) -> Result<(), BuildError> {
        self.push(format!("topic IN ({})", ids(items.iter().map(|t| t.id))), exclude);
        Ok(())
    }

    fn map_author_element(&mut self, items: &[ElementAuthor], exclude: bool) -> Result<(), BuildError> {
        self.push(format!("author IN ({})", ids(items.iter().map(|t| t.id))), exclude);
        Ok(())
    }

    fn build(self) -> String {
        let mut sql = String::from("SELECT * FROM illust");
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order.join(", "));
        }
        sql
    }
}

#[test]
fn custom_builder_sees_the_whole_query() {
    let mut builder = SqlBuilder::default();
    let schema = compiler()
        .compile(
            "@leonardo -#renaissance.`mona lisa` score>=4 ext:{jpg, png} sort:-score,id",
            &queryer(),
            &mut builder,
        )
        .expect("compiled");
    assert!(!schema.has_errors(), "{:?}", schema.errors);
    assert!(schema.warnings.is_empty(), "{:?}", schema.warnings);
    assert_eq!(
        builder.build(),
        "SELECT * FROM illust WHERE score >= 4 AND extension IN ('jpg', 'png') \
         AND author IN (20) AND NOT (topic IN (11)) ORDER BY score DESC, id ASC"
    );
}

#[test]
fn untyped_elements_try_tags_first() {
    let mut builder = RecordingBuilder::default();
    let schema = compiler()
        .compile("scenery season.summer~+", &queryer(), &mut builder)
        .expect("compiled");
    assert!(!schema.has_errors());
    assert_eq!(
        builder.build(),
        [
            BuildCall::Tag {
                ids: vec![1],
                exclude: false
            },
            BuildCall::Tag {
                ids: vec![4, 5, 6],
                exclude: false
            },
        ]
    );
    let plan = schema.plan.expect("plan");
    let first = &plan.elements[0].intersect_items[0].union_items[0];
    assert!(matches!(first, ElementValue::Tag(ElementTag { name, .. }) if name == "landscape"));
}

#[test]
fn source_tags_resolve_by_site() {
    let mut builder = RecordingBuilder::default();
    let schema = compiler()
        .compile("^pixiv.landscape", &queryer(), &mut builder)
        .expect("compiled");
    assert!(schema.warnings.is_empty(), "{:?}", schema.warnings);
    assert_eq!(
        builder.build(),
        [BuildCall::SourceTag {
            ids: vec![30],
            exclude: false
        }]
    );
}

#[test]
fn unknown_references_warn_but_compile() {
    let mut builder = RecordingBuilder::default();
    let schema = compiler()
        .compile("@nobody", &queryer(), &mut builder)
        .expect("compiled");
    assert!(schema.plan.is_some());
    assert_eq!(schema.warnings.len(), 1);
    let warning = &schema.warnings[0];
    assert_eq!(warning.code, 4001);
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!((warning.begin, warning.end), (0, 7));
}

#[test]
fn lexical_warnings_survive_semantic_errors() {
    let mut builder = RecordingBuilder::default();
    let schema = compiler()
        .compile("score:x %", &queryer(), &mut builder)
        .expect("compiled");
    assert_eq!(schema.warnings[0].code, 1004);
    assert_eq!(schema.errors[0].code, 3019);
    assert!(schema.plan.is_none());
}

#[test]
fn semantic_errors_report_every_item() {
    let mut builder = RecordingBuilder::default();
    let schema = compiler()
        .compile("score:x -sort:id ^[note]", &queryer(), &mut builder)
        .expect("compiled");
    let codes: Vec<u32> = schema.errors.iter().map(|d| d.code).collect();
    assert_eq!(codes, [3019, 3015, 3025]);
    assert!(schema.plan.is_none());
    assert!(builder.build().is_empty());
}

#[test]
fn meta_dialect_builds_name_elements() {
    let options = CompilerOptions {
        dialect: DialectKind::Meta,
        ..CompilerOptions::default()
    };
    let compiler = QueryCompiler::new(options).expect("compiler");
    let mut builder = RecordingBuilder::default();
    let schema = compiler
        .compile("leo|\"da vinci\"", &queryer(), &mut builder)
        .expect("compiled");
    assert!(!schema.has_errors(), "{:?}", schema.errors);
    let calls = builder.build();
    assert!(matches!(&calls[0], BuildCall::Name { items, exclude: false } if items.len() == 2));
}

#[test]
fn fullwidth_punctuation_is_reflected() {
    let mut options = CompilerOptions::default();
    options.lexical.chinese_symbol_reflect = true;
    let compiler = QueryCompiler::new(options).expect("compiler");
    let mut builder = RecordingBuilder::default();
    let schema = compiler
        .compile("score＞=4 ｜ favorite", &queryer(), &mut builder)
        .expect("compiled");
    assert!(!schema.has_errors(), "{:?}", schema.errors);
    assert_eq!(schema.plan.expect("plan").filters.len(), 1);
}

#[test]
fn manager_reuses_compiled_queries() {
    let manager: QueryManager<_, RecordingBuilder> = QueryManager::new(compiler(), queryer());
    let first = manager.query("landscape").expect("compiled");
    assert_eq!(
        first.output,
        [BuildCall::Tag {
            ids: vec![1],
            exclude: false
        }]
    );
    assert!(Arc::ptr_eq(&first, &manager.query("landscape").expect("cached")));
    manager.query("monet").expect("compiled");
    assert_eq!(manager.cached(), 2);
    manager.flush();
    assert_eq!(manager.cached(), 0);
}

#[test]
fn manager_evicts_least_recent() {
    let options = CompilerOptions {
        cache_capacity: 1,
        ..CompilerOptions::default()
    };
    let compiler = QueryCompiler::new(options).expect("compiler");
    let manager: QueryManager<_, RecordingBuilder> = QueryManager::new(compiler, queryer());
    let first = manager.query("landscape").expect("compiled");
    manager.query("monet").expect("compiled");
    assert_eq!(manager.cached(), 1);
    assert!(!Arc::ptr_eq(&first, &manager.query("landscape").expect("compiled")));
}

#[test]
fn forecast_completes_live_names() {
    let forecast = compiler()
        .forecast("@leo", None, &queryer())
        .expect("forecast");
    assert_eq!(forecast.kind, "meta-tag");
    assert_eq!(forecast.partial, "leo");
    assert_eq!(forecast.suggestions[0].name, "leonardo");

    let forecast = compiler()
        .forecast("sort:cr score>1", Some(7), &queryer())
        .expect("forecast");
    assert_eq!(forecast.kind, "sort");
    assert_eq!(forecast.suggestions[0].name, "create-time");
}
