//! Translation: a validated plan to its visual form and executable query.
//!
//! Filters and sorts pass straight to the [`ExecuteBuilder`]. Meta tag and
//! source tag elements are first resolved against the [`Queryer`]; an element
//! with no fixed meta type is tried as tags, then topics, then authors, and
//! the first kind that finds anything, or the last kind its items can be,
//! wins.

#![forbid(unsafe_code)]

mod errors;
pub mod memory;
mod queryer;
pub mod visual;

use tracing::debug;

use crate::diagnostics::{AnalysisResult, ErrorCollector, Span};
use crate::options::TranslatorOptions;
use crate::semantic::{
    Element, Filter, Forecast, ForecastKind, MetaTagItems, MetaType, QueryPlan, UnionFilters,
};

pub use errors::TranslatorError;
pub use queryer::{BuildError, ExecuteBuilder, Queryer};
pub use visual::{
    ElementAuthor, ElementItem, ElementSourceTag, ElementString, ElementTag, ElementTopic,
    ElementValue, FilterItem, FilterOfOneField, Suggestion, VisualElement, VisualFilterValue,
    VisualForecast, VisualQueryPlan,
};

enum Resolved {
    Tag(Vec<ElementTag>),
    Topic(Vec<ElementTopic>),
    Author(Vec<ElementAuthor>),
}

impl Resolved {
    fn len(&self) -> usize {
        match self {
            Resolved::Tag(items) => items.len(),
            Resolved::Topic(items) => items.len(),
            Resolved::Author(items) => items.len(),
        }
    }

    fn map<B: ExecuteBuilder>(&self, builder: &mut B, exclude: bool) -> Result<(), BuildError> {
        match self {
            Resolved::Tag(items) => builder.map_tag_element(items, exclude),
            Resolved::Topic(items) => builder.map_topic_element(items, exclude),
            Resolved::Author(items) => builder.map_author_element(items, exclude),
        }
    }

    fn into_values(self) -> Vec<ElementValue> {
        match self {
            Resolved::Tag(items) => items.into_iter().map(ElementValue::Tag).collect(),
            Resolved::Topic(items) => items.into_iter().map(ElementValue::Topic).collect(),
            Resolved::Author(items) => items.into_iter().map(ElementValue::Author).collect(),
        }
    }
}

struct Translation<'a, Q: ?Sized, B> {
    queryer: &'a Q,
    builder: &'a mut B,
    options: &'a TranslatorOptions,
    errors: ErrorCollector<TranslatorError>,
    join_depth: usize,
}

/// Translates `plan`, feeding `builder` along the way.
///
/// `query_span` covers the whole query and locates the join depth warning.
/// A builder callback failure aborts the translation.
pub fn translate<Q, B>(
    plan: &QueryPlan,
    queryer: &Q,
    builder: &mut B,
    options: &TranslatorOptions,
    query_span: Span,
) -> Result<AnalysisResult<VisualQueryPlan, TranslatorError>, BuildError>
where
    Q: Queryer + ?Sized,
    B: ExecuteBuilder,
{
    let mut translation = Translation {
        queryer,
        builder,
        options,
        errors: ErrorCollector::new(),
        join_depth: 0,
    };

    if !plan.sorts.is_empty() {
        translation.builder.map_sorts(&plan.sorts)?;
    }
    let sorts = plan.sorts.iter().map(ToString::to_string).collect();

    let mut filters = Vec::with_capacity(plan.filters.len());
    for union in &plan.filters {
        translation.builder.map_filter(union, union.exclude)?;
        filters.push(visual_filter(union));
    }

    let mut elements: Vec<VisualElement> = Vec::new();
    for element in &plan.elements {
        let item = translation.element(element)?;
        match elements
            .iter_mut()
            .find(|e| e.element_type == element.type_name())
        {
            Some(group) => group.intersect_items.push(item),
            None => elements.push(VisualElement {
                element_type: element.type_name(),
                intersect_items: vec![item],
            }),
        }
    }

    let limit = options.warning_limit_of_intersect_items;
    if translation.join_depth >= limit {
        translation
            .errors
            .warning(TranslatorError::NumberOfIntersectItemExceed {
                limit,
                span: query_span,
            });
    }
    debug!(
        join_depth = translation.join_depth,
        warnings = translation.errors.warnings().len(),
        "plan translated"
    );
    Ok(translation.errors.finish(Some(VisualQueryPlan {
        sorts,
        elements,
        filters,
    })))
}

fn visual_filter(union: &UnionFilters) -> FilterItem {
    let mut fields: Vec<FilterOfOneField> = Vec::new();
    for filter in &union.filters {
        let values: Vec<VisualFilterValue> = match filter {
            Filter::Equal { values, .. } | Filter::Composition { values, .. } => values
                .iter()
                .map(|v| VisualFilterValue::Equal { value: v.clone() })
                .collect(),
            Filter::Match { values, .. } => values
                .iter()
                .map(|v| VisualFilterValue::Match { value: v.clone() })
                .collect(),
            Filter::Range {
                begin,
                end,
                include_begin,
                include_end,
                ..
            } => vec![VisualFilterValue::Range {
                begin: begin.clone(),
                end: end.clone(),
                include_begin: *include_begin,
                include_end: *include_end,
            }],
            Filter::Flag { .. } => Vec::new(),
        };
        match fields.iter_mut().find(|f| f.name == filter.field()) {
            Some(field) => field.values.extend(values),
            None => fields.push(FilterOfOneField {
                name: filter.field(),
                values,
            }),
        }
    }
    FilterItem {
        exclude: union.exclude,
        fields,
    }
}

impl<Q: Queryer + ?Sized, B: ExecuteBuilder> Translation<'_, Q, B> {
    fn element(&mut self, element: &Element) -> Result<ElementItem, BuildError> {
        let exclude = element.exclude();
        let union_items = match element {
            Element::Name(name) => {
                let items = strings(&name.items);
                self.builder.map_name_element(&items, exclude)?;
                items.into_iter().map(ElementValue::String).collect()
            }
            Element::Comment(comment) => {
                let items = strings(&comment.items);
                self.builder.map_comment_element(&items, exclude)?;
                items.into_iter().map(ElementValue::String).collect()
            }
            Element::SourceTag(source) => {
                let found: Vec<ElementSourceTag> = source
                    .items
                    .iter()
                    .flat_map(|address| self.queryer.find_source_tag(address, &mut self.errors))
                    .collect();
                let rendered = || {
                    source
                        .items
                        .iter()
                        .map(|a| crate::semantic::plan::render_address(a))
                        .collect()
                };
                self.check_size(found.len(), rendered, source.span);
                self.join_depth += 1;
                self.builder.map_source_tag_element(&found, exclude)?;
                found.into_iter().map(ElementValue::SourceTag).collect()
            }
            Element::MetaTag(meta) => {
                let resolved = self.resolve(&meta.items, meta.meta_type);
                self.check_size(resolved.len(), || meta.items.rendered(), meta.span);
                self.join_depth += 1;
                resolved.map(&mut *self.builder, exclude)?;
                resolved.into_values()
            }
        };
        Ok(ElementItem {
            exclude,
            union_items,
        })
    }

    fn check_size(&mut self, found: usize, rendered: impl FnOnce() -> Vec<String>, span: Span) {
        let limit = self.options.warning_limit_of_union_items;
        if found == 0 {
            self.errors.warning(TranslatorError::WholeElementMatchesNone {
                items: rendered(),
                span,
            });
        } else if found >= limit {
            self.errors.warning(TranslatorError::NumberOfUnionItemExceed {
                items: rendered(),
                limit,
                span,
            });
        }
    }

    fn resolve(&mut self, items: &MetaTagItems, meta_type: Option<MetaType>) -> Resolved {
        match meta_type {
            Some(MetaType::Tag) => Resolved::Tag(self.find_tags(items, None)),
            Some(MetaType::Topic) => Resolved::Topic(self.find_topics(items, None)),
            Some(MetaType::Author) => Resolved::Author(self.find_authors(items, None)),
            None => {
                let class = items.class();
                let mut attempt = ErrorCollector::new();
                let tags = self.find_tags(items, Some(&mut attempt));
                if !tags.is_empty() || class == MetaType::Tag {
                    debug!(found = tags.len(), "meta tag resolved as tags");
                    self.errors.collect(attempt);
                    return Resolved::Tag(tags);
                }
                let mut attempt = ErrorCollector::new();
                let topics = self.find_topics(items, Some(&mut attempt));
                if !topics.is_empty() || class != MetaType::Author {
                    debug!(found = topics.len(), "meta tag resolved as topics");
                    self.errors.collect(attempt);
                    return Resolved::Topic(topics);
                }
                let mut attempt = ErrorCollector::new();
                let authors = self.find_authors(items, Some(&mut attempt));
                debug!(found = authors.len(), "meta tag resolved as authors");
                self.errors.collect(attempt);
                Resolved::Author(authors)
            }
        }
    }

    fn find_tags(
        &mut self,
        items: &MetaTagItems,
        attempt: Option<&mut ErrorCollector<TranslatorError>>,
    ) -> Vec<ElementTag> {
        let collector = attempt.unwrap_or(&mut self.errors);
        let found = items
            .tag_values()
            .iter()
            .flat_map(|value| self.queryer.find_tag(value, collector))
            .collect();
        self.queryer.flat_union_tag(found)
    }

    fn find_topics(
        &mut self,
        items: &MetaTagItems,
        attempt: Option<&mut ErrorCollector<TranslatorError>>,
    ) -> Vec<ElementTopic> {
        let collector = attempt.unwrap_or(&mut self.errors);
        let found = items
            .topic_addresses()
            .unwrap_or_default()
            .iter()
            .flat_map(|address| self.queryer.find_topic(address, collector))
            .collect();
        self.queryer.flat_union_topic(found)
    }

    fn find_authors(
        &mut self,
        items: &MetaTagItems,
        attempt: Option<&mut ErrorCollector<TranslatorError>>,
    ) -> Vec<ElementAuthor> {
        let collector = attempt.unwrap_or(&mut self.errors);
        items
            .author_names()
            .unwrap_or_default()
            .iter()
            .flat_map(|name| self.queryer.find_author(name, collector))
            .collect()
    }
}

fn strings(items: &[crate::semantic::MetaString]) -> Vec<ElementString> {
    items
        .iter()
        .map(|s| ElementString {
            value: s.value.clone(),
            precise: s.precise,
        })
        .collect()
}

/// Ranking of a candidate against the typed text: exact, prefix, substring.
fn rank(partial: &str, names: &[&str]) -> Option<u8> {
    let partial = partial.to_lowercase();
    names
        .iter()
        .filter_map(|name| {
            let name = name.to_lowercase();
            if name == partial {
                Some(0)
            } else if name.starts_with(&partial) {
                Some(1)
            } else if name.contains(&partial) {
                Some(2)
            } else {
                None
            }
        })
        .min()
}

fn ranked(partial: &str, candidates: Vec<Suggestion>, keep_unmatched: bool) -> Vec<Suggestion> {
    let mut scored: Vec<(u8, Suggestion)> = candidates
        .into_iter()
        .filter_map(|s| {
            let names: Vec<&str> = std::iter::once(s.name.as_str())
                .chain(s.aliases.iter().map(String::as_str))
                .collect();
            let score = rank(partial, &names).or(keep_unmatched.then_some(3))?;
            Some((score, s))
        })
        .collect();
    scored.sort_by_key(|(score, _)| *score);
    scored.into_iter().map(|(_, s)| s).collect()
}

fn table(aliases: &[Vec<String>]) -> Vec<Suggestion> {
    aliases
        .iter()
        .filter_map(|names| {
            let (name, aliases) = names.split_first()?;
            Some(Suggestion {
                name: name.clone(),
                aliases: aliases.to_vec(),
                context: None,
            })
        })
        .collect()
}

fn tag_suggestion(tag: ElementTag) -> Suggestion {
    Suggestion {
        name: tag.name,
        aliases: tag.other_names,
        context: tag.parent,
    }
}

fn topic_suggestion(topic: ElementTopic) -> Suggestion {
    Suggestion {
        name: topic.name,
        aliases: topic.other_names,
        context: topic.parent,
    }
}

fn author_suggestion(author: ElementAuthor) -> Suggestion {
    Suggestion {
        name: author.name,
        aliases: author.other_names,
        context: None,
    }
}

fn keyword_suggestion(name: String) -> Suggestion {
    Suggestion {
        name,
        aliases: Vec::new(),
        context: None,
    }
}

/// Builds ranked suggestions for a located forecast request.
pub fn forecast<Q: Queryer + ?Sized>(forecast: &Forecast, queryer: &Q) -> VisualForecast {
    let partial = forecast.partial.as_str();
    let (kind, suggestions) = match &forecast.kind {
        ForecastKind::Keyword { keywords } => ("keyword", ranked(partial, table(keywords), false)),
        ForecastKind::Sort { items } => ("sort", ranked(partial, table(items), false)),
        ForecastKind::Filter { values, .. } => ("filter", ranked(partial, table(values), false)),
        ForecastKind::SourceTag => {
            let found = queryer
                .forecast_source_tag(partial)
                .into_iter()
                .map(|tag| Suggestion {
                    name: tag.name,
                    aliases: tag.display_name.into_iter().chain(tag.other_name).collect(),
                    context: Some(tag.site),
                })
                .collect();
            ("source-tag", ranked(partial, found, true))
        }
        ForecastKind::MetaTag { meta_type } => {
            let wanted = |t: MetaType| meta_type.map_or(true, |m| m == t);
            let mut found = Vec::new();
            if wanted(MetaType::Tag) {
                found.extend(queryer.forecast_tag(partial).into_iter().map(tag_suggestion));
            }
            if wanted(MetaType::Topic) {
                found.extend(queryer.forecast_topic(partial).into_iter().map(topic_suggestion));
            }
            if wanted(MetaType::Author) {
                found.extend(queryer.forecast_author(partial).into_iter().map(author_suggestion));
            }
            found.extend(
                queryer
                    .forecast_keyword(partial, meta_type.unwrap_or(MetaType::Tag))
                    .into_iter()
                    .map(keyword_suggestion),
            );
            ("meta-tag", ranked(partial, found, true))
        }
    };
    VisualForecast {
        kind,
        partial: forecast.partial.clone(),
        suggestions,
        span: forecast.span,
    }
}
