//! Element generators: turn the clauses of a non-keyword item into a plan element.

use crate::diagnostics::{ErrorCollector, Span};
use crate::grammar::ast::{self, Bracket, Predicative, Sfp, Str, StrList};

use super::errors::{SemanticError, ValueType};
use super::plan::{
    CommentElement, Element, MetaAddress, MetaString, MetaTagElement, MetaTagItems, MetaType,
    MetaValue, NameElement, SourceTagElement,
};

/// Element kinds a dialect can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementGenerator {
    /// Author, topic and tag references.
    MetaTag,
    /// Source site tags, written with `^`.
    SourceTag,
    /// Plain names.
    Name,
}

impl ElementGenerator {
    /// Builds one element. Errors go to `errors`; `None` is returned when any
    /// clause failed.
    pub fn generate(
        self,
        element: &ast::Element,
        exclude: bool,
        span: Span,
        errors: &mut ErrorCollector<SemanticError>,
    ) -> Option<Element> {
        let result = match self {
            ElementGenerator::MetaTag => meta_tag(element, exclude, span).map(Element::MetaTag),
            ElementGenerator::SourceTag => {
                source_tag(element, exclude, span).map(Element::SourceTag)
            }
            ElementGenerator::Name => name(element, exclude, span).map(Element::Name),
        };
        match result {
            Ok(element) => Some(element),
            Err(failures) => {
                failures.into_iter().for_each(|e| errors.error(e));
                None
            }
        }
    }
}

/// Builds the comment element of a `[...]` item.
pub fn comment(bracket: &Bracket, exclude: bool, span: Span) -> Element {
    Element::Comment(CommentElement {
        items: bracket.items.iter().map(meta_string).collect(),
        exclude,
        span,
    })
}

pub(crate) fn meta_string(str: &Str) -> MetaString {
    MetaString {
        value: str.value.clone(),
        precise: str.is_precise(),
    }
}

fn address(list: &StrList) -> MetaAddress {
    list.items.iter().map(meta_string).collect()
}

/// Runs `f` over every clause, keeping either all values or all errors.
fn each_clause<T>(
    element: &ast::Element,
    mut f: impl FnMut(&Sfp) -> Result<T, SemanticError>,
) -> Result<Vec<T>, Vec<SemanticError>> {
    let mut values = Vec::with_capacity(element.items.len());
    let mut errors = Vec::new();
    for sfp in &element.items {
        match f(sfp) {
            Ok(value) => values.push(value),
            Err(e) => errors.push(e),
        }
    }
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

const DESIGNATORS: [(&str, MetaType); 3] = [
    ("author", MetaType::Author),
    ("topic", MetaType::Topic),
    ("tag", MetaType::Tag),
];

/// Whether `name` is one of the `author`, `topic` or `tag` designators.
pub(crate) fn is_designator(name: &str) -> bool {
    DESIGNATORS.iter().any(|(designator, _)| name.eq_ignore_ascii_case(designator))
}

/// Meta type designated by a keyword subject such as `author`.
pub(crate) fn designator(subject: &StrList) -> Option<MetaType> {
    let str = subject.single().filter(|s| s.is_restricted())?;
    DESIGNATORS
        .iter()
        .find(|(name, _)| str.value.eq_ignore_ascii_case(name))
        .map(|(_, meta_type)| *meta_type)
}

/// A designator clause: `author:x` or `topic:{a, b}`.
fn designated(sfp: &Sfp) -> Option<MetaType> {
    let meta_type = designator(&sfp.subject)?;
    match (&sfp.family, &sfp.predicative) {
        (Some(family), Some(Predicative::StrList(_) | Predicative::Col(_))) if family.symbol == ":" => {
            Some(meta_type)
        }
        _ => None,
    }
}

fn designator_values(sfp: &Sfp) -> Vec<MetaValue> {
    match &sfp.predicative {
        Some(Predicative::StrList(list)) => vec![match list.single() {
            Some(str) => MetaValue::Single {
                value: meta_string(str),
            },
            None => MetaValue::Simple {
                address: address(list),
            },
        }],
        Some(Predicative::Col(col)) => col
            .items
            .iter()
            .map(|str| MetaValue::Single {
                value: meta_string(str),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn meta_tag(
    element: &ast::Element,
    exclude: bool,
    span: Span,
) -> Result<MetaTagElement, Vec<SemanticError>> {
    let designators: Vec<Option<MetaType>> = if element.prefix.is_none() {
        element.items.iter().map(designated).collect()
    } else {
        vec![None; element.items.len()]
    };

    let (values, meta_type, symbol) = if designators.iter().any(Option::is_some) {
        let first = designators[0];
        if designators.iter().any(|d| *d != first) {
            return Err(vec![SemanticError::MetaTypeDesignatorsCannotBeMixed {
                span: element.span,
            }]);
        }
        let values = element.items.iter().flat_map(designator_values).collect();
        (values, first, first.map(|t| format!("{}:", t.name())))
    } else {
        let values = each_clause(element, meta_value)?;
        let meta_type = element.prefix.as_ref().and_then(|p| match p.symbol {
            "@" => Some(MetaType::Author),
            "#" => Some(MetaType::Topic),
            "$" => Some(MetaType::Tag),
            _ => None,
        });
        let symbol = element.prefix.as_ref().map(|p| p.symbol.to_owned());
        (values, meta_type, symbol)
    };

    let items = MetaTagItems::narrowest(values);
    if let (Some(meta_type), Some(symbol)) = (meta_type, symbol) {
        if !items.fits(meta_type) {
            return Err(vec![SemanticError::InvalidMetaTagForThisPrefix {
                symbol,
                span: element.span,
            }]);
        }
    }
    Ok(MetaTagElement {
        items,
        meta_type,
        exclude,
        span,
    })
}

const META_TAG: &str = "meta-tag";

fn single_value(list: &StrList) -> Result<MetaString, SemanticError> {
    list.single()
        .map(meta_string)
        .ok_or(SemanticError::ValueCannotBeAddress { span: list.span })
}

fn meta_value(sfp: &Sfp) -> Result<MetaValue, SemanticError> {
    let tag = address(&sfp.subject);
    let Some(family) = &sfp.family else {
        return Ok(match sfp.subject.single() {
            Some(str) => MetaValue::Single {
                value: meta_string(str),
            },
            None => MetaValue::Simple { address: tag },
        });
    };
    let symbol = family.symbol;
    let unsupported_with = |value_type, span| SemanticError::UnsupportedElementValueTypeOfRelation {
        element: META_TAG,
        value_type,
        symbol,
        span,
    };
    match (symbol, &sfp.predicative) {
        ("~+", _) | ("~-", _) => Ok(MetaValue::SequentialItemToDirection {
            tag,
            descending: symbol == "~-",
        }),
        (_, Some(Predicative::SortList(list))) => Err(SemanticError::UnsupportedElementValueType {
            element: META_TAG,
            value_type: ValueType::SortList,
            span: list.span,
        }),
        (":", Some(Predicative::StrList(list))) => Ok(MetaValue::SequentialOfCollection {
            tag,
            values: vec![single_value(list)?],
        }),
        (":", Some(Predicative::Col(col))) => Ok(MetaValue::SequentialOfCollection {
            tag,
            values: col.items.iter().map(meta_string).collect(),
        }),
        (":", Some(Predicative::Range(range))) => Ok(MetaValue::SequentialOfRange {
            tag,
            begin: Some(meta_string(&range.from)),
            end: Some(meta_string(&range.to)),
            include_begin: range.include_from,
            include_end: range.include_to,
        }),
        ("~", Some(Predicative::StrList(list))) => Ok(MetaValue::SequentialItemToOther {
            tag,
            other: single_value(list)?,
        }),
        (">" | ">=" | "<" | "<=", Some(Predicative::StrList(list))) => {
            let value = Some(single_value(list)?);
            let (begin, end, include_begin, include_end) = match symbol {
                ">" => (value, None, false, false),
                ">=" => (value, None, true, false),
                "<" => (None, value, false, false),
                _ => (None, value, false, true),
            };
            Ok(MetaValue::SequentialOfRange {
                tag,
                begin,
                end,
                include_begin,
                include_end,
            })
        }
        (_, Some(Predicative::Col(col))) => Err(unsupported_with(ValueType::Collection, col.span)),
        (_, Some(Predicative::Range(range))) => Err(unsupported_with(ValueType::Range, range.span)),
        _ => Err(SemanticError::UnsupportedElementRelationSymbol {
            element: META_TAG,
            symbol,
            span: family.span,
        }),
    }
}

const SOURCE_TAG: &str = "source-tag";

fn source_tag(
    element: &ast::Element,
    exclude: bool,
    span: Span,
) -> Result<SourceTagElement, Vec<SemanticError>> {
    if let Some(prefix) = &element.prefix {
        return Err(vec![SemanticError::ElementPrefixNotRequired {
            element: SOURCE_TAG,
            span: prefix.span,
        }]);
    }
    let items = each_clause(element, |sfp| {
        let mut items = address(&sfp.subject);
        let Some(family) = &sfp.family else {
            return Ok(items);
        };
        if family.symbol != ":" {
            return Err(SemanticError::UnsupportedElementRelationSymbol {
                element: SOURCE_TAG,
                symbol: family.symbol,
                span: family.span,
            });
        }
        let (value_type, span) = match &sfp.predicative {
            Some(Predicative::StrList(list)) => {
                items.extend(address(list));
                return Ok(items);
            }
            Some(Predicative::Col(col)) => (ValueType::Collection, col.span),
            Some(Predicative::Range(range)) => (ValueType::Range, range.span),
            Some(Predicative::SortList(list)) => (ValueType::SortList, list.span),
            None => return Ok(items),
        };
        Err(SemanticError::UnsupportedElementValueType {
            element: SOURCE_TAG,
            value_type,
            span,
        })
    })?;
    Ok(SourceTagElement {
        items,
        exclude,
        span,
    })
}

fn name(element: &ast::Element, exclude: bool, span: Span) -> Result<NameElement, Vec<SemanticError>> {
    const NAME: &str = "name";
    if let Some(prefix) = &element.prefix {
        return Err(vec![SemanticError::ElementPrefixNotRequired {
            element: NAME,
            span: prefix.span,
        }]);
    }
    let items = each_clause(element, |sfp| {
        if sfp.family.is_some() || sfp.predicative.is_some() {
            return Err(SemanticError::ElementValueNotRequired {
                element: NAME,
                span: sfp.span,
            });
        }
        single_value(&sfp.subject)
    })?;
    Ok(NameElement {
        items,
        exclude,
        span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CodedError;
    use crate::grammar::ast::SequenceBody;
    use crate::grammar::QueryGrammar;
    use crate::lexical;
    use crate::options::LexicalOptions;

    fn element(text: &str) -> ast::Element {
        let tokens = lexical::analyze(text, &LexicalOptions::default())
            .result
            .expect("tokens");
        let root = QueryGrammar::shared()
            .expect("grammar")
            .parse(&tokens)
            .result
            .expect("tree");
        match root.items.into_iter().next().map(|i| i.body) {
            Some(SequenceBody::Element(element)) => element,
            other => panic!("element expected, got {other:?}"),
        }
    }

    fn generate(generator: ElementGenerator, text: &str) -> Result<Element, Vec<u32>> {
        let mut errors = ErrorCollector::new();
        let element = element(text);
        let span = element.span;
        generator
            .generate(&element, false, span, &mut errors)
            .ok_or_else(|| errors.errors().iter().map(CodedError::code).collect())
    }

    fn meta_tag_of(text: &str) -> MetaTagElement {
        match generate(ElementGenerator::MetaTag, text) {
            Ok(Element::MetaTag(element)) => element,
            other => panic!("meta tag expected, got {other:?}"),
        }
    }

    #[test]
    fn untyped_items_take_the_narrowest_class() {
        let authors = meta_tag_of("a|`b`");
        assert_eq!(authors.meta_type, None);
        assert_eq!(
            authors.items,
            MetaTagItems::Author(vec![MetaString::new("a"), MetaString::precise("b")])
        );
        assert_eq!(meta_tag_of("a.b|c").items.class(), MetaType::Topic);

        let tag = meta_tag_of("rank~+|rank:[b, d)");
        assert_eq!(tag.items.class(), MetaType::Tag);
        assert_eq!(tag.items.rendered(), ["rank~+", "rank:[b,d)"]);
    }

    #[test]
    fn comparisons_become_one_sided_ranges() {
        let tag = meta_tag_of("rank<=c");
        assert_eq!(
            tag.items,
            MetaTagItems::Tag(vec![MetaValue::SequentialOfRange {
                tag: vec![MetaString::new("rank")],
                begin: None,
                end: Some(MetaString::new("c")),
                include_begin: false,
                include_end: true,
            }])
        );
    }

    #[test]
    fn prefixes_fix_the_type() {
        assert_eq!(meta_tag_of("@a|b").meta_type, Some(MetaType::Author));
        assert_eq!(meta_tag_of("#a.b").meta_type, Some(MetaType::Topic));
        assert_eq!(meta_tag_of("$a~b").meta_type, Some(MetaType::Tag));
        assert_eq!(generate(ElementGenerator::MetaTag, "@a.b"), Err(vec![3006]));
        assert_eq!(generate(ElementGenerator::MetaTag, "#a:{x}"), Err(vec![3006]));
    }

    #[test]
    fn designators() {
        let author = meta_tag_of("author:leonardo");
        assert_eq!(author.meta_type, Some(MetaType::Author));
        assert_eq!(author.items, MetaTagItems::Author(vec![MetaString::new("leonardo")]));

        let topics = meta_tag_of("TOPIC:{a, b}|topic:c.d");
        assert_eq!(topics.meta_type, Some(MetaType::Topic));
        assert_eq!(topics.items.len(), 3);

        assert_eq!(generate(ElementGenerator::MetaTag, "author:a.b"), Err(vec![3006]));
        assert_eq!(generate(ElementGenerator::MetaTag, "author:a|tag:b"), Err(vec![3026]));
        assert_eq!(generate(ElementGenerator::MetaTag, "author:a|b"), Err(vec![3026]));

        let quoted = meta_tag_of("`tag`:x");
        assert_eq!(quoted.meta_type, None);
        assert_eq!(quoted.items.class(), MetaType::Tag);
    }

    #[test]
    fn meta_tag_errors_are_collected_per_clause() {
        assert_eq!(
            generate(ElementGenerator::MetaTag, "a>{b}|c:d,e|f:g.h"),
            Err(vec![3010, 3009, 3017])
        );
    }

    #[test]
    fn source_tags() {
        let Ok(Element::SourceTag(element)) = generate(ElementGenerator::SourceTag, "site.a|site:b.c")
        else {
            panic!("source tag expected");
        };
        assert_eq!(
            element.items,
            vec![
                vec![MetaString::new("site"), MetaString::new("a")],
                vec![MetaString::new("site"), MetaString::new("b"), MetaString::new("c")],
            ]
        );
        assert_eq!(generate(ElementGenerator::SourceTag, "@a"), Err(vec![3007]));
        assert_eq!(generate(ElementGenerator::SourceTag, "a:{b}"), Err(vec![3009]));
        assert_eq!(generate(ElementGenerator::SourceTag, "a>b"), Err(vec![3011]));
    }

    #[test]
    fn names() {
        let Ok(Element::Name(element)) = generate(ElementGenerator::Name, "a|`b`") else {
            panic!("name expected");
        };
        assert_eq!(element.items, [MetaString::new("a"), MetaString::precise("b")]);
        assert_eq!(generate(ElementGenerator::Name, "#a"), Err(vec![3007]));
        assert_eq!(generate(ElementGenerator::Name, "a:b"), Err(vec![3008]));
        assert_eq!(generate(ElementGenerator::Name, "a.b"), Err(vec![3017]));
    }
}
