//! Keyword filter fields.
//!
//! A field turns one `keyword relation value` clause into zero or more filters.
//! [`FieldKind`] decides which relations and value shapes the field accepts.

use crate::grammar::ast::{Col, Family, Predicative, Range, Sfp, Str, StrList};

use super::errors::{SemanticError, ValueType};
use super::forecast::{Forecast, ForecastKind};
use super::parsers::{parse_date, parse_datetime, parse_pattern_number, Complex, EnumTable, Scalar};
use super::plan::{Filter, FilterValue};

/// How an equality-only field reads its values.
#[derive(Debug, Clone, Copy)]
pub enum EquableValue {
    /// Any text.
    Text,
    /// A member of the table.
    Enum(&'static EnumTable),
}

impl EquableValue {
    fn parse(self, str: &Str) -> Result<FilterValue, SemanticError> {
        match self {
            EquableValue::Text => Ok(FilterValue::String(str.value.clone())),
            EquableValue::Enum(table) => table.parse(str),
        }
    }
}

/// Behaviour of a keyword field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Bare keyword, no relation or value.
    Flag,
    /// `:` with a value or set.
    Equable(EquableValue),
    /// `:` with a value, set or range, and the four comparisons.
    Comparable(Scalar),
    /// Fuzzy text: backticked values are equalities, others are matches.
    Matchable {
        /// Match whole values rather than substrings.
        exact: bool,
    },
    /// A set of enum members compared as a whole.
    Composition {
        /// Members.
        table: &'static EnumTable,
        /// A bare keyword means the empty set.
        allow_flag_mode: bool,
    },
    /// Numbers with `*` and `?` patterns.
    NumberPattern,
    /// Dates that may stand for a whole month or year.
    Date,
    /// Timestamps compared at day granularity.
    DateTime,
}

/// A keyword field of a dialect.
#[derive(Debug)]
pub struct FieldDef {
    /// Canonical name, used as the filter's field.
    pub key: &'static str,
    /// Keywords selecting the field, lower-case. A leading `^` marks a source keyword.
    pub aliases: &'static [&'static str],
    /// Behaviour.
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Copy)]
enum Compare {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Compare {
    fn of(symbol: &str) -> Option<Self> {
        match symbol {
            ">" => Some(Compare::Greater),
            ">=" => Some(Compare::GreaterOrEqual),
            "<" => Some(Compare::Less),
            "<=" => Some(Compare::LessOrEqual),
            _ => None,
        }
    }

    fn filter(self, field: &'static str, value: FilterValue) -> Filter {
        let (begin, end, include_begin, include_end) = match self {
            Compare::Greater => (Some(value), None, false, false),
            Compare::GreaterOrEqual => (Some(value), None, true, false),
            Compare::Less => (None, Some(value), false, false),
            Compare::LessOrEqual => (None, Some(value), false, true),
        };
        Filter::Range {
            field,
            begin,
            end,
            include_begin,
            include_end,
        }
    }

    /// Comparison against a value that stands for `[begin, end)`.
    fn filter_span(self, field: &'static str, begin: FilterValue, end: FilterValue) -> Filter {
        let (begin, end, include_begin) = match self {
            Compare::Greater => (Some(end), None, true),
            Compare::GreaterOrEqual => (Some(begin), None, true),
            Compare::Less => (None, Some(begin), false),
            Compare::LessOrEqual => (None, Some(end), false),
        };
        Filter::Range {
            field,
            begin,
            end,
            include_begin,
            include_end: false,
        }
    }
}

fn single(list: &StrList) -> Result<&Str, SemanticError> {
    match list.items.as_slice() {
        [only] => Ok(only),
        _ => Err(SemanticError::ValueCannotBeAddress { span: list.span }),
    }
}

fn half_open(field: &'static str, begin: FilterValue, end: FilterValue) -> Filter {
    Filter::Range {
        field,
        begin: Some(begin),
        end: Some(end),
        include_begin: true,
        include_end: false,
    }
}

impl FieldDef {
    /// Generates the filters of one clause. A clause may yield nothing, as
    /// `field:{}` does.
    pub fn generate(&self, sfp: &Sfp, year: i32) -> Result<Vec<Filter>, SemanticError> {
        let field = self.key;
        match self.kind {
            FieldKind::Flag => {
                if sfp.family.is_some() || sfp.predicative.is_some() {
                    return Err(SemanticError::FilterValueNotRequired {
                        field,
                        span: sfp.span,
                    });
                }
                return Ok(vec![Filter::Flag { field }]);
            }
            FieldKind::Composition {
                allow_flag_mode: true,
                ..
            } if sfp.family.is_none() && sfp.predicative.is_none() => {
                return Ok(vec![Filter::Composition {
                    field,
                    values: Vec::new(),
                }]);
            }
            _ => {}
        }

        let (Some(family), Some(predicative)) = (&sfp.family, &sfp.predicative) else {
            return Err(SemanticError::FilterValueRequired {
                field,
                span: sfp.span,
            });
        };

        if family.symbol == ":" {
            return match predicative {
                Predicative::StrList(list) => self.on_value(single(list)?, year),
                Predicative::Col(col) => self.on_col(col, year),
                Predicative::Range(range) => self.on_range(range, year),
                Predicative::SortList(list) => Err(SemanticError::UnsupportedFilterValueType {
                    field,
                    value_type: ValueType::SortList,
                    span: list.span,
                }),
            };
        }

        match (Compare::of(family.symbol), self.comparable()) {
            (Some(compare), true) => match predicative {
                Predicative::StrList(list) => self.on_compare(compare, single(list)?, year),
                Predicative::Col(col) => Err(SemanticError::UnsupportedFilterValueTypeOfRelation {
                    field,
                    value_type: ValueType::Collection,
                    symbol: family.symbol,
                    span: col.span,
                }),
                Predicative::Range(range) => {
                    Err(SemanticError::UnsupportedFilterValueTypeOfRelation {
                        field,
                        value_type: ValueType::Range,
                        symbol: family.symbol,
                        span: range.span,
                    })
                }
                Predicative::SortList(list) => Err(SemanticError::UnsupportedFilterValueType {
                    field,
                    value_type: ValueType::SortList,
                    span: list.span,
                }),
            },
            _ => Err(self.unsupported_relation(family)),
        }
    }

    fn comparable(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Comparable(_) | FieldKind::NumberPattern | FieldKind::Date | FieldKind::DateTime
        )
    }

    fn unsupported_relation(&self, family: &Family) -> SemanticError {
        SemanticError::UnsupportedFilterRelationSymbol {
            field: self.key,
            symbol: family.symbol,
            span: family.span,
        }
    }

    fn complex(&self, str: &Str, year: i32) -> Result<Complex, SemanticError> {
        match self.kind {
            FieldKind::DateTime => parse_datetime(str, year),
            FieldKind::NumberPattern => parse_pattern_number(str),
            _ => parse_date(str, year),
        }
    }

    fn on_value(&self, str: &Str, year: i32) -> Result<Vec<Filter>, SemanticError> {
        let field = self.key;
        let filter = match self.kind {
            FieldKind::Equable(parser) => Filter::Equal {
                field,
                values: vec![parser.parse(str)?],
            },
            FieldKind::Composition { table, .. } => Filter::Composition {
                field,
                values: vec![table.parse(str)?],
            },
            FieldKind::Comparable(scalar) => Filter::Equal {
                field,
                values: vec![scalar.parse(str)?],
            },
            FieldKind::Matchable { exact } => {
                let values = vec![FilterValue::String(str.value.clone())];
                if str.is_precise() {
                    Filter::Equal { field, values }
                } else {
                    Filter::Match {
                        field,
                        values,
                        exact,
                    }
                }
            }
            FieldKind::NumberPattern | FieldKind::Date | FieldKind::DateTime => {
                match self.complex(str, year)? {
                    Complex::Value(value @ FilterValue::Pattern(_)) => Filter::Match {
                        field,
                        values: vec![value],
                        exact: true,
                    },
                    Complex::Value(value) => Filter::Equal {
                        field,
                        values: vec![value],
                    },
                    Complex::Range(begin, end) => half_open(field, begin, end),
                }
            }
            FieldKind::Flag => return Ok(vec![Filter::Flag { field }]),
        };
        Ok(vec![filter])
    }

    fn on_col(&self, col: &Col, year: i32) -> Result<Vec<Filter>, SemanticError> {
        let field = self.key;
        if col.items.is_empty() {
            return Ok(Vec::new());
        }
        match self.kind {
            FieldKind::Equable(parser) => Ok(vec![Filter::Equal {
                field,
                values: col
                    .items
                    .iter()
                    .map(|s| parser.parse(s))
                    .collect::<Result<_, _>>()?,
            }]),
            FieldKind::Composition { table, .. } => Ok(vec![Filter::Composition {
                field,
                values: col
                    .items
                    .iter()
                    .map(|s| table.parse(s))
                    .collect::<Result<_, _>>()?,
            }]),
            FieldKind::Comparable(scalar) => Ok(vec![Filter::Equal {
                field,
                values: col
                    .items
                    .iter()
                    .map(|s| scalar.parse(s))
                    .collect::<Result<_, _>>()?,
            }]),
            FieldKind::Matchable { exact } => {
                let (precise, fuzzy): (Vec<&Str>, Vec<&Str>) =
                    col.items.iter().partition(|s| s.is_precise());
                let strings =
                    |items: Vec<&Str>| items.iter().map(|s| FilterValue::String(s.value.clone())).collect();
                let mut filters = Vec::new();
                if !precise.is_empty() {
                    filters.push(Filter::Equal {
                        field,
                        values: strings(precise),
                    });
                }
                if !fuzzy.is_empty() {
                    filters.push(Filter::Match {
                        field,
                        values: strings(fuzzy),
                        exact,
                    });
                }
                Ok(filters)
            }
            FieldKind::NumberPattern | FieldKind::Date | FieldKind::DateTime => {
                let mut equal = Vec::new();
                let mut patterns = Vec::new();
                let mut ranges = Vec::new();
                for str in &col.items {
                    match self.complex(str, year)? {
                        Complex::Value(value @ FilterValue::Pattern(_)) => patterns.push(value),
                        Complex::Value(value) => equal.push(value),
                        Complex::Range(begin, end) => ranges.push(half_open(field, begin, end)),
                    }
                }
                let mut filters = Vec::new();
                if !equal.is_empty() {
                    filters.push(Filter::Equal {
                        field,
                        values: equal,
                    });
                }
                if !patterns.is_empty() {
                    filters.push(Filter::Match {
                        field,
                        values: patterns,
                        exact: true,
                    });
                }
                filters.extend(ranges);
                Ok(filters)
            }
            FieldKind::Flag => Ok(vec![Filter::Flag { field }]),
        }
    }

    fn on_range(&self, range: &Range, year: i32) -> Result<Vec<Filter>, SemanticError> {
        let field = self.key;
        let (begin, end, include_begin, include_end) = match self.kind {
            FieldKind::Comparable(scalar) => (
                scalar.parse(&range.from)?,
                scalar.parse(&range.to)?,
                range.include_from,
                range.include_to,
            ),
            FieldKind::NumberPattern => (
                plain_number(&range.from)?,
                plain_number(&range.to)?,
                range.include_from,
                range.include_to,
            ),
            FieldKind::Date | FieldKind::DateTime => {
                let (begin, include_begin) = match self.complex(&range.from, year)? {
                    Complex::Value(value) => (value, range.include_from),
                    Complex::Range(b, e) => (if range.include_from { b } else { e }, true),
                };
                let (end, include_end) = match self.complex(&range.to, year)? {
                    Complex::Value(value) => (value, range.include_to),
                    Complex::Range(b, e) => (if range.include_to { e } else { b }, false),
                };
                (begin, end, include_begin, include_end)
            }
            _ => {
                return Err(SemanticError::UnsupportedFilterValueType {
                    field,
                    value_type: ValueType::Range,
                    span: range.span,
                })
            }
        };
        Ok(vec![Filter::Range {
            field,
            begin: Some(begin),
            end: Some(end),
            include_begin,
            include_end,
        }])
    }

    fn on_compare(&self, compare: Compare, str: &Str, year: i32) -> Result<Vec<Filter>, SemanticError> {
        let field = self.key;
        let filter = match self.kind {
            FieldKind::Comparable(scalar) => compare.filter(field, scalar.parse(str)?),
            FieldKind::NumberPattern => compare.filter(field, plain_number(str)?),
            _ => match self.complex(str, year)? {
                Complex::Value(value) => compare.filter(field, value),
                Complex::Range(begin, end) => compare.filter_span(field, begin, end),
            },
        };
        Ok(vec![filter])
    }

    /// Offers enum members while the cursor sits on a value of an enum field.
    pub fn forecast(&self, sfp: &Sfp, cursor: usize) -> Option<Forecast> {
        let table = match self.kind {
            FieldKind::Equable(EquableValue::Enum(table)) | FieldKind::Composition { table, .. } => {
                table
            }
            _ => return None,
        };
        let predicative = sfp.predicative.as_ref()?;
        if !predicative.span().touches(cursor) {
            return None;
        }
        let item = match predicative {
            Predicative::StrList(list) => single(list).ok().filter(|s| s.span.touches(cursor))?,
            Predicative::Col(col) => col.items.iter().find(|s| s.span.touches(cursor))?,
            _ => return None,
        };
        Some(Forecast {
            partial: item.value.clone(),
            span: item.span,
            kind: ForecastKind::Filter {
                field: self.key,
                values: table.aliases(),
            },
        })
    }
}

/// A number-pattern operand inside a comparison or range must be a plain number.
fn plain_number(str: &Str) -> Result<FilterValue, SemanticError> {
    match parse_pattern_number(str)? {
        Complex::Value(value @ FilterValue::Number(_)) => Ok(value),
        _ => Err(SemanticError::ValueCannotBePatternInComparison { span: str.span }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CodedError, Span};
    use crate::grammar::ast::SequenceBody;
    use crate::grammar::QueryGrammar;
    use crate::lexical;
    use crate::options::LexicalOptions;
    use time::macros::date;

    static TAGME: EnumTable = EnumTable {
        type_name: "tagme",
        items: &[("TAG", &[]), ("AUTHOR", &[]), ("TOPIC", &[]), ("SOURCE", &[])],
    };

    fn sfp(text: &str) -> Sfp {
        let tokens = lexical::analyze(text, &LexicalOptions::default())
            .result
            .expect("tokens");
        let root = QueryGrammar::shared()
            .expect("grammar")
            .parse(&tokens)
            .result
            .expect("tree");
        match root.items.into_iter().next().map(|i| i.body) {
            Some(SequenceBody::Element(element)) => element.items.into_iter().next().expect("sfp"),
            other => panic!("element expected, got {other:?}"),
        }
    }

    fn field(kind: FieldKind) -> FieldDef {
        FieldDef {
            key: "x",
            aliases: &["x"],
            kind,
        }
    }

    fn code(result: Result<Vec<Filter>, SemanticError>) -> u32 {
        result.expect_err("error expected").code()
    }

    #[test]
    fn comparable_relations() {
        let score = field(FieldKind::Comparable(Scalar::Number));
        assert_eq!(
            score.generate(&sfp("x<=4"), 2000),
            Ok(vec![Filter::Range {
                field: "x",
                begin: None,
                end: Some(FilterValue::Number(4)),
                include_begin: false,
                include_end: true,
            }])
        );
        assert_eq!(
            score.generate(&sfp("x:(1, 3]"), 2000),
            Ok(vec![Filter::Range {
                field: "x",
                begin: Some(FilterValue::Number(1)),
                end: Some(FilterValue::Number(3)),
                include_begin: false,
                include_end: true,
            }])
        );
        assert_eq!(score.generate(&sfp("x:{}"), 2000), Ok(vec![]));
        assert_eq!(code(score.generate(&sfp("x>{1, 2}"), 2000)), 3004);
        assert_eq!(code(score.generate(&sfp("x~2"), 2000)), 3005);
        assert_eq!(code(score.generate(&sfp("x"), 2000)), 3001);
        assert_eq!(code(score.generate(&sfp("x:a.b"), 2000)), 3017);
        assert_eq!(code(score.generate(&sfp("x:four"), 2000)), 3019);
    }

    #[test]
    fn equable_and_flag() {
        let ext = field(FieldKind::Equable(EquableValue::Text));
        assert_eq!(
            ext.generate(&sfp("x:{jpg, png}"), 2000),
            Ok(vec![Filter::Equal {
                field: "x",
                values: vec![FilterValue::String("jpg".into()), FilterValue::String("png".into())],
            }])
        );
        assert_eq!(code(ext.generate(&sfp("x:[a, b]"), 2000)), 3003);
        assert_eq!(code(ext.generate(&sfp("x>a"), 2000)), 3005);

        let flag = field(FieldKind::Flag);
        assert_eq!(flag.generate(&sfp("x"), 2000), Ok(vec![Filter::Flag { field: "x" }]));
        let err = flag.generate(&sfp("x:1"), 2000).expect_err("value not allowed");
        assert_eq!(err.code(), 3002);
        assert_eq!(err.span(), Span::new(0, 3));
    }

    #[test]
    fn matchable_splits_precise_values() {
        let desc = field(FieldKind::Matchable { exact: false });
        assert_eq!(
            desc.generate(&sfp("x:{`a`, b}"), 2000),
            Ok(vec![
                Filter::Equal {
                    field: "x",
                    values: vec![FilterValue::String("a".into())],
                },
                Filter::Match {
                    field: "x",
                    values: vec![FilterValue::String("b".into())],
                    exact: false,
                },
            ])
        );
    }

    #[test]
    fn number_patterns() {
        let id = field(FieldKind::NumberPattern);
        assert_eq!(
            id.generate(&sfp("x:{5, 1*, 12??}"), 2000),
            Ok(vec![
                Filter::Equal {
                    field: "x",
                    values: vec![FilterValue::Number(5)],
                },
                Filter::Match {
                    field: "x",
                    values: vec![FilterValue::Pattern("1*".into())],
                    exact: true,
                },
                Filter::Range {
                    field: "x",
                    begin: Some(FilterValue::Number(1200)),
                    end: Some(FilterValue::Number(1300)),
                    include_begin: true,
                    include_end: false,
                },
            ])
        );
        assert_eq!(code(id.generate(&sfp("x>1?"), 2000)), 3018);
        assert_eq!(code(id.generate(&sfp("x:[1, 2*]"), 2000)), 3018);
    }

    #[test]
    fn dates_compare_against_whole_months() {
        let pt = field(FieldKind::Date);
        assert_eq!(
            pt.generate(&sfp("x>\"2021-03\""), 2000),
            Ok(vec![Filter::Range {
                field: "x",
                begin: Some(FilterValue::Date(date!(2021 - 04 - 01))),
                end: None,
                include_begin: true,
                include_end: false,
            }])
        );
        assert_eq!(
            pt.generate(&sfp("x:[2020, \"2021-03\"]"), 2000),
            Ok(vec![Filter::Range {
                field: "x",
                begin: Some(FilterValue::Date(date!(2020 - 01 - 01))),
                end: Some(FilterValue::Date(date!(2021 - 04 - 01))),
                include_begin: true,
                include_end: false,
            }])
        );
        let ct = field(FieldKind::DateTime);
        assert_eq!(
            ct.generate(&sfp("x:\"2021-03-09\""), 2000),
            Ok(vec![Filter::Range {
                field: "x",
                begin: Some(FilterValue::Date(date!(2021 - 03 - 09))),
                end: Some(FilterValue::Date(date!(2021 - 03 - 10))),
                include_begin: true,
                include_end: false,
            }])
        );
    }

    #[test]
    fn composition_flag_mode_and_forecast() {
        let tagme = field(FieldKind::Composition {
            table: &TAGME,
            allow_flag_mode: true,
        });
        assert_eq!(
            tagme.generate(&sfp("x"), 2000),
            Ok(vec![Filter::Composition {
                field: "x",
                values: vec![],
            }])
        );
        assert_eq!(
            tagme.generate(&sfp("x:{tag, Author}"), 2000),
            Ok(vec![Filter::Composition {
                field: "x",
                values: vec![
                    FilterValue::String("TAG".into()),
                    FilterValue::String("AUTHOR".into())
                ],
            }])
        );
        assert_eq!(code(tagme.generate(&sfp("x:site"), 2000)), 3020);

        let forecast = tagme.forecast(&sfp("x:{tag, au}"), 10).expect("forecast");
        assert_eq!(forecast.partial, "au");
        assert_eq!(forecast.span, Span::new(8, 10));
        assert!(matches!(forecast.kind, ForecastKind::Filter { field: "x", .. }));
        assert!(tagme.forecast(&sfp("x:{tag, au}"), 1).is_none());
    }
}
