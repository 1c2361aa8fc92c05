//! Semantic analysis: syntax tree to a validated [`QueryPlan`].
//!
//! Each top-level item is either a group of keyword clauses, which become
//! sorts or union filters, or an element, which the dialect's element
//! generator turns into a meta tag, source tag, name or comment reference.

#![forbid(unsafe_code)]

mod dialect;
mod elements;
mod errors;
mod fields;
mod forecast;
mod parsers;
pub mod plan;
mod sort;

use tracing::debug;

use crate::diagnostics::{AnalysisResult, ErrorCollector};
use crate::grammar::ast::{SemanticRoot, SequenceBody, SequenceItem, Sfp};

pub use dialect::{Dialect, DialectKind};
pub use elements::ElementGenerator;
pub use errors::{CastType, SemanticError, StructureKind, ValueType};
pub use fields::{EquableValue, FieldDef, FieldKind};
pub use forecast::{forecast, Forecast, ForecastKind};
pub use parsers::{current_year, Complex, EnumTable, Scalar};
pub use plan::{
    Element, Filter, FilterValue, MetaAddress, MetaString, MetaTagItems, MetaType, MetaValue,
    QueryPlan, Sort, UnionFilters,
};
pub use sort::{SortDef, SortItemDef, SORT_KEYWORDS};

/// Analyzes a syntax tree against a dialect, with the current year for dates
/// written without one.
pub fn analyze(root: &SemanticRoot, kind: DialectKind) -> AnalysisResult<QueryPlan, SemanticError> {
    analyze_in_year(root, kind, current_year())
}

enum Keyword {
    Sort,
    Field(&'static FieldDef),
}

/// Analyzes a syntax tree, completing year-less dates with `year`.
pub fn analyze_in_year(
    root: &SemanticRoot,
    kind: DialectKind,
    year: i32,
) -> AnalysisResult<QueryPlan, SemanticError> {
    let mut analyzer = Analyzer {
        dialect: kind.dialect(),
        year,
        plan: QueryPlan::default(),
        errors: ErrorCollector::new(),
    };
    for item in &root.items {
        analyzer.item(item);
    }
    let Analyzer { plan, errors, .. } = analyzer;
    debug!(
        dialect = ?kind,
        sorts = plan.sorts.len(),
        filters = plan.filters.len(),
        elements = plan.elements.len(),
        errors = errors.errors().len(),
        "semantic analysis finished"
    );
    errors.finish(Some(plan))
}

struct Analyzer {
    dialect: &'static Dialect,
    year: i32,
    plan: QueryPlan,
    errors: ErrorCollector<SemanticError>,
}

impl Analyzer {
    fn item(&mut self, item: &SequenceItem) {
        match &item.body {
            SequenceBody::Bracket(bracket) => {
                if item.source {
                    self.errors
                        .error(SemanticError::CommentCannotHaveSourceFlag { span: item.span });
                } else {
                    self.plan
                        .elements
                        .push(elements::comment(bracket, item.minus, item.span));
                }
            }
            SequenceBody::Element(element) => {
                let keywords: Vec<Option<Result<Keyword, SemanticError>>> = element
                    .items
                    .iter()
                    .map(|sfp| self.keyword(sfp, item.source, element.prefix.is_some()))
                    .collect();
                let count = keywords.iter().filter(|k| k.is_some()).count();
                if count == 0 {
                    let generator = if item.source {
                        self.dialect.source_elements
                    } else {
                        Some(self.dialect.elements)
                    };
                    let Some(generator) = generator else {
                        self.errors.error(SemanticError::UnsupportedSemanticStructure {
                            structure: StructureKind::ElementWithSource,
                            span: item.span,
                        });
                        return;
                    };
                    if let Some(generated) =
                        generator.generate(element, item.minus, item.span, &mut self.errors)
                    {
                        self.plan.elements.push(generated);
                    }
                } else if count < keywords.len() {
                    self.errors
                        .error(SemanticError::IdentifiesAndElementsCannotBeMixed { span: element.span });
                } else {
                    let keywords = keywords.into_iter().flatten();
                    let resolved: Vec<Keyword> = keywords
                        .filter_map(|k| k.map_err(|e| self.errors.error(e)).ok())
                        .collect();
                    if resolved.len() == element.items.len() {
                        self.keywords(item, &element.items, resolved);
                    }
                }
            }
        }
    }

    /// Classifies a clause. `None` means the clause is not a keyword.
    fn keyword(&self, sfp: &Sfp, source: bool, prefixed: bool) -> Option<Result<Keyword, SemanticError>> {
        if prefixed {
            return None;
        }
        let str = sfp.subject.single().filter(|s| s.is_restricted())?;
        let name = str.value.to_lowercase();
        if SORT_KEYWORDS.contains(&name.as_str()) && self.dialect.sort.is_some() {
            return Some(if source {
                Err(SemanticError::ThisIdentifyCannotHaveSourceFlag {
                    key: name,
                    span: sfp.subject.span,
                })
            } else {
                Ok(Keyword::Sort)
            });
        }
        if !self.dialect.is_keyword(&name) {
            return None;
        }
        let alias = if source { format!("^{name}") } else { name.clone() };
        Some(match self.dialect.field(&alias) {
            Some(field) => Ok(Keyword::Field(field)),
            None if source => Err(SemanticError::ThisIdentifyCannotHaveSourceFlag {
                key: name,
                span: sfp.subject.span,
            }),
            None => Err(SemanticError::ThisIdentifyMustHaveSourceFlag {
                key: name,
                span: sfp.subject.span,
            }),
        })
    }

    fn keywords(&mut self, item: &SequenceItem, clauses: &[Sfp], keywords: Vec<Keyword>) {
        if keywords.iter().any(|k| matches!(k, Keyword::Sort)) {
            let (Some(sort), [sfp]) = (self.dialect.sort, clauses) else {
                self.errors
                    .error(SemanticError::SortIsIndependent { span: item.span });
                return;
            };
            if item.minus {
                self.errors
                    .error(SemanticError::SortIsIndependent { span: item.span });
                return;
            }
            match sort.generate(sfp) {
                Ok(sorts) => {
                    for generated in sorts {
                        if self.plan.sorts.iter().any(|s| s.field == generated.field) {
                            self.errors.warning(SemanticError::DuplicatedSortItem {
                                value: generated.field.to_owned(),
                                span: item.body.span(),
                            });
                        } else {
                            self.plan.sorts.push(generated);
                        }
                    }
                }
                Err(e) => self.errors.error(e),
            }
            return;
        }

        let mut filters = Vec::new();
        for (sfp, keyword) in clauses.iter().zip(keywords) {
            let Keyword::Field(field) = keyword else {
                continue;
            };
            match field.generate(sfp, self.year) {
                Ok(generated) => filters.extend(generated),
                Err(e) => self.errors.error(e),
            }
        }
        if !filters.is_empty() {
            self.plan.filters.push(UnionFilters {
                exclude: item.minus,
                filters,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CodedError, Span};
    use crate::grammar::QueryGrammar;
    use crate::lexical;
    use crate::options::LexicalOptions;

    fn analyze_text(text: &str, kind: DialectKind) -> AnalysisResult<QueryPlan, SemanticError> {
        let tokens = lexical::analyze(text, &LexicalOptions::default())
            .result
            .expect("tokens");
        let root = QueryGrammar::shared()
            .expect("grammar")
            .parse(&tokens)
            .result
            .expect("tree");
        analyze_in_year(&root, kind, 2022)
    }

    fn error_codes(text: &str, kind: DialectKind) -> Vec<u32> {
        analyze_text(text, kind)
            .errors
            .iter()
            .map(CodedError::code)
            .collect()
    }

    #[test]
    fn mixed_query_plan() {
        let result = analyze_text(
            "author:leonardo score>=4 -tag:nsfw sort:-score,+id",
            DialectKind::Illust,
        );
        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let plan = result.result.expect("plan");
        let sorts: Vec<String> = plan.sorts.iter().map(ToString::to_string).collect();
        assert_eq!(sorts, ["-score", "+id"]);
        assert_eq!(
            plan.filters,
            [UnionFilters {
                exclude: false,
                filters: vec![Filter::Range {
                    field: "score",
                    begin: Some(FilterValue::Number(4)),
                    end: None,
                    include_begin: true,
                    include_end: false,
                }],
            }]
        );
        assert_eq!(plan.elements.len(), 2);
        let Element::MetaTag(tag) = &plan.elements[1] else {
            panic!("meta tag expected");
        };
        assert!(tag.exclude);
        assert_eq!(tag.meta_type, Some(MetaType::Tag));
    }

    #[test]
    fn union_of_keywords() {
        let plan = analyze_text("-ext:jpg|size<1MiB|f", DialectKind::Illust)
            .result
            .expect("plan");
        assert_eq!(plan.filters.len(), 1);
        assert!(plan.filters[0].exclude);
        let fields: Vec<&str> = plan.filters[0].filters.iter().map(Filter::field).collect();
        assert_eq!(fields, ["extension", "filesize", "favorite"]);
    }

    #[test]
    fn empty_collections_are_dropped() {
        let plan = analyze_text("ext:{}", DialectKind::Illust)
            .result
            .expect("plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn source_flags_on_keywords() {
        let plan = analyze_text("^site:pixiv ^pixiv.tag", DialectKind::Illust)
            .result
            .expect("plan");
        assert_eq!(plan.filters[0].filters[0].field(), "source-site");
        assert_eq!(plan.elements[0].type_name(), "source-tag");

        assert_eq!(error_codes("^score:1", DialectKind::Illust), [3023]);
        assert_eq!(error_codes("page:1", DialectKind::Illust), [3024]);
        assert_eq!(error_codes("^sort:id", DialectKind::Illust), [3023]);
    }

    #[test]
    fn structural_errors() {
        assert_eq!(error_codes("score:1|tag", DialectKind::Illust), [3022]);
        assert_eq!(error_codes("sort:id|score:1", DialectKind::Illust), [3015]);
        assert_eq!(error_codes("-sort:id", DialectKind::Illust), [3015]);
        assert_eq!(error_codes("^[note]", DialectKind::Illust), [3025]);
        assert_eq!(error_codes("^name", DialectKind::Meta), [3021]);
        assert_eq!(
            error_codes("score:x ext:[a, b] ^pixiv:{a}", DialectKind::Illust),
            [3019, 3003, 3009]
        );
    }

    #[test]
    fn duplicated_sort_items_warn() {
        let result = analyze_text("sort:score,id sort:-s", DialectKind::Illust);
        let plan = result.result.expect("plan");
        assert_eq!(plan.sorts.len(), 2);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].code(), 3016);
        assert_eq!(result.warnings[0].span(), Span::new(14, 21));
    }

    #[test]
    fn meta_dialect_names() {
        let plan = analyze_text("leonardo|`da vinci` type:{artist} [renaissance]", DialectKind::Meta)
            .result
            .expect("plan");
        assert_eq!(plan.elements.len(), 2);
        assert_eq!(plan.elements[0].type_name(), "name");
        assert_eq!(plan.elements[1].type_name(), "comment");
        assert_eq!(
            plan.filters[0].filters,
            [Filter::Equal {
                field: "type",
                values: vec![FilterValue::String("ARTIST".into())],
            }]
        );
    }

    fn strings(values: &[&str]) -> Vec<MetaString> {
        values.iter().map(|v| MetaString::new(*v)).collect()
    }

    fn reanalyzed(element: &Element, kind: DialectKind) -> Element {
        let text = element.render();
        let result = analyze_text(&text, kind);
        assert!(result.errors.is_empty(), "{text}: {:?}", result.errors);
        let plan = result.result.expect("plan");
        assert!(plan.filters.is_empty() && plan.sorts.is_empty(), "{text}: {plan:?}");
        let [found] = <[Element; 1]>::try_from(plan.elements).expect("one element");
        found
    }

    fn with_span(element: Element, span: Span) -> Element {
        match element {
            Element::Name(e) => Element::Name(plan::NameElement { span, ..e }),
            Element::Comment(e) => Element::Comment(plan::CommentElement { span, ..e }),
            Element::MetaTag(e) => Element::MetaTag(plan::MetaTagElement { span, ..e }),
            Element::SourceTag(e) => Element::SourceTag(plan::SourceTagElement { span, ..e }),
        }
    }

    fn meta_tag(values: Vec<MetaValue>, meta_type: Option<MetaType>, exclude: bool) -> Element {
        Element::MetaTag(plan::MetaTagElement {
            items: MetaTagItems::narrowest(values),
            meta_type,
            exclude,
            span: Span::default(),
        })
    }

    #[test]
    fn keyword_subjects_are_quoted() {
        let single = |value: &str| MetaValue::Single {
            value: MetaString::new(value),
        };
        let collection = |tag: &str| MetaValue::SequentialOfCollection {
            tag: strings(&[tag]),
            values: strings(&["x"]),
        };
        assert_eq!(meta_tag(vec![single("f")], None, false).render(), r#""f""#);
        assert_eq!(meta_tag(vec![single("score")], None, false).render(), r#""score""#);
        assert_eq!(
            meta_tag(vec![collection("author")], Some(MetaType::Tag), false).render(),
            r#"$"author":x"#
        );
        assert_eq!(
            meta_tag(vec![collection("score")], Some(MetaType::Tag), false).render(),
            r#"$"score":x"#
        );
        assert_eq!(meta_tag(vec![single("rem")], Some(MetaType::Author), true).render(), "-@rem");
    }

    #[test]
    fn rendered_elements_analyze_back() {
        let illust = [
            meta_tag(vec![MetaValue::Single { value: MetaString::new("f") }], None, false),
            meta_tag(
                vec![
                    MetaValue::Single { value: MetaString::new("Score") },
                    MetaValue::Single { value: MetaString::precise("F") },
                ],
                Some(MetaType::Author),
                true,
            ),
            meta_tag(
                vec![MetaValue::SequentialOfCollection {
                    tag: strings(&["author"]),
                    values: strings(&["x"]),
                }],
                Some(MetaType::Tag),
                false,
            ),
            meta_tag(
                vec![MetaValue::SequentialOfCollection {
                    tag: strings(&["score"]),
                    values: strings(&["x"]),
                }],
                Some(MetaType::Tag),
                false,
            ),
            meta_tag(
                vec![MetaValue::SequentialOfCollection {
                    tag: strings(&["sort"]),
                    values: strings(&["a", "two words"]),
                }],
                None,
                false,
            ),
            meta_tag(
                vec![
                    MetaValue::Simple {
                        address: strings(&["renaissance", "mona lisa"]),
                    },
                    MetaValue::Single { value: MetaString::new("order") },
                ],
                Some(MetaType::Topic),
                false,
            ),
            meta_tag(
                vec![
                    MetaValue::SequentialOfRange {
                        tag: strings(&["ext"]),
                        begin: Some(MetaString::new("a")),
                        end: Some(MetaString::new("b")),
                        include_begin: true,
                        include_end: false,
                    },
                    MetaValue::SequentialOfRange {
                        tag: strings(&["season"]),
                        begin: None,
                        end: Some(MetaString::new("c")),
                        include_begin: false,
                        include_end: true,
                    },
                    MetaValue::SequentialOfRange {
                        tag: strings(&["season"]),
                        begin: Some(MetaString::new("a.b")),
                        end: None,
                        include_begin: false,
                        include_end: false,
                    },
                ],
                None,
                false,
            ),
            meta_tag(
                vec![
                    MetaValue::SequentialItemToOther {
                        tag: strings(&["season", "spring"]),
                        other: MetaString::new("autumn"),
                    },
                    MetaValue::SequentialItemToDirection {
                        tag: strings(&["Tag"]),
                        descending: true,
                    },
                ],
                None,
                true,
            ),
            Element::SourceTag(plan::SourceTagElement {
                items: vec![strings(&["pixiv", "風景"]), strings(&["site"])],
                exclude: true,
                span: Span::default(),
            }),
            Element::Comment(plan::CommentElement {
                items: strings(&["note", "two words", "]"]),
                exclude: false,
                span: Span::default(),
            }),
        ];
        for element in illust {
            let found = reanalyzed(&element, DialectKind::Illust);
            assert_eq!(with_span(found, Span::default()), element, "{}", element.render());
        }

        let name = Element::Name(plan::NameElement {
            items: vec![
                MetaString::new("type"),
                MetaString::precise("da vinci"),
                MetaString::new("leonardo"),
            ],
            exclude: false,
            span: Span::default(),
        });
        let found = reanalyzed(&name, DialectKind::Meta);
        assert_eq!(with_span(found, Span::default()), name);
    }
}
