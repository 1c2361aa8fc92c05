//! Cursor forecast: what the user is typing and which table can complete it.

use serde::Serialize;

use crate::diagnostics::Span;
use crate::grammar::ast::{Predicative, SemanticRoot, SequenceBody, Sfp, Str};

use super::dialect::DialectKind;
use super::elements::{designator, ElementGenerator};
use super::plan::MetaType;
use super::sort::SORT_KEYWORDS;

/// Suggestion source for the text under the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ForecastKind {
    /// A keyword subject.
    Keyword {
        /// Aliases of every keyword.
        keywords: Vec<Vec<String>>,
    },
    /// A meta tag segment.
    MetaTag {
        /// Kind fixed by a prefix or designator.
        meta_type: Option<MetaType>,
    },
    /// A segment of a `^` element.
    SourceTag,
    /// A sort item.
    Sort {
        /// Aliases of every sort item.
        items: Vec<Vec<String>>,
    },
    /// A value of an enum field.
    Filter {
        /// Field key.
        field: &'static str,
        /// Aliases of every member.
        values: Vec<Vec<String>>,
    },
}

/// A completion request located in the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forecast {
    /// Text typed so far.
    pub partial: String,
    /// Span a chosen suggestion replaces.
    pub span: Span,
    /// Suggestion source.
    #[serde(flatten)]
    pub kind: ForecastKind,
}

fn segment_at(sfp: &Sfp, cursor: usize) -> Option<&Str> {
    let predicative: Vec<&Str> = match &sfp.predicative {
        Some(Predicative::StrList(list)) => list.items.iter().collect(),
        Some(Predicative::Col(col)) => col.items.iter().collect(),
        Some(Predicative::Range(range)) => vec![&range.from, &range.to],
        _ => Vec::new(),
    };
    sfp.subject
        .items
        .iter()
        .chain(predicative)
        .find(|s| s.span.touches(cursor))
}

fn in_predicative(sfp: &Sfp, cursor: usize) -> bool {
    sfp.predicative
        .as_ref()
        .is_some_and(|p| p.span().touches(cursor))
}

/// Finds what can be suggested at `cursor`, a character offset into the query.
pub fn forecast(root: &SemanticRoot, cursor: usize, kind: DialectKind) -> Option<Forecast> {
    let dialect = kind.dialect();
    let item = root.items.iter().find(|i| i.span.touches(cursor))?;
    let SequenceBody::Element(element) = &item.body else {
        return None;
    };
    let sfp = element.items.iter().find(|s| s.span.touches(cursor))?;
    let keyword = |str: &Str| Forecast {
        partial: str.value.clone(),
        span: str.span,
        kind: ForecastKind::Keyword {
            keywords: dialect.keywords(),
        },
    };

    let subject = sfp
        .subject
        .single()
        .filter(|s| s.is_restricted() && element.prefix.is_none());
    if let Some(str) = subject {
        let name = str.value.to_lowercase();
        if dialect.is_keyword(&name) {
            if str.span.touches(cursor) {
                return Some(keyword(str));
            }
            if SORT_KEYWORDS.contains(&name.as_str()) {
                return dialect.sort?.forecast(sfp, cursor);
            }
            let alias = if item.source { format!("^{name}") } else { name };
            return dialect.field(&alias)?.forecast(sfp, cursor);
        }
        if str.span.touches(cursor) && sfp.family.is_some() && designator(&sfp.subject).is_none() {
            return Some(keyword(str));
        }
    }

    let segment = segment_at(sfp, cursor)?;
    let kind = if item.source {
        ForecastKind::SourceTag
    } else if dialect.elements == ElementGenerator::MetaTag {
        let prefixed = element.prefix.as_ref().and_then(|p| match p.symbol {
            "@" => Some(MetaType::Author),
            "#" => Some(MetaType::Topic),
            "$" => Some(MetaType::Tag),
            _ => None,
        });
        let designated = designator(&sfp.subject).filter(|_| in_predicative(sfp, cursor));
        ForecastKind::MetaTag {
            meta_type: prefixed.or(designated),
        }
    } else {
        return None;
    };
    Some(Forecast {
        partial: segment.value.clone(),
        span: segment.span,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::QueryGrammar;
    use crate::lexical;
    use crate::options::LexicalOptions;

    fn at(text: &str, cursor: usize) -> Option<Forecast> {
        let tokens = lexical::analyze(text, &LexicalOptions::default())
            .result
            .expect("tokens");
        let root = QueryGrammar::shared()
            .expect("grammar")
            .parse(&tokens)
            .result
            .expect("tree");
        forecast(&root, cursor, DialectKind::Illust)
    }

    #[test]
    fn keywords_and_unknown_subjects() {
        let forecast = at("score>3 tagm", 12).expect("forecast");
        assert_eq!(forecast.partial, "tagm");
        assert!(matches!(forecast.kind, ForecastKind::MetaTag { meta_type: None }));

        let forecast = at("sco>3", 2).expect("forecast");
        assert_eq!(forecast.partial, "sco");
        assert!(matches!(forecast.kind, ForecastKind::Keyword { .. }));

        let forecast = at("tagme:{tag}", 3).expect("forecast");
        assert!(matches!(forecast.kind, ForecastKind::Keyword { .. }));
    }

    #[test]
    fn values_of_keywords() {
        let forecast = at("sort:-sc", 8).expect("forecast");
        assert!(matches!(forecast.kind, ForecastKind::Sort { .. }));
        assert_eq!(forecast.span, Span::new(6, 8));

        let forecast = at("tagme:au", 8).expect("forecast");
        assert!(matches!(forecast.kind, ForecastKind::Filter { field: "tagme", .. }));
        assert!(at("score:3", 7).is_none());
    }

    #[test]
    fn element_segments() {
        let forecast = at("@leo", 4).expect("forecast");
        assert_eq!(forecast.partial, "leo");
        assert!(matches!(
            forecast.kind,
            ForecastKind::MetaTag {
                meta_type: Some(MetaType::Author)
            }
        ));

        let forecast = at("author:leo", 9).expect("forecast");
        assert!(matches!(
            forecast.kind,
            ForecastKind::MetaTag {
                meta_type: Some(MetaType::Author)
            }
        ));

        let forecast = at("^pixiv.ab", 9).expect("forecast");
        assert_eq!(forecast.partial, "ab");
        assert_eq!(forecast.kind, ForecastKind::SourceTag);
        assert!(at("[note]", 3).is_none());
    }
}
