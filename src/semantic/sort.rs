//! The `sort` keyword.

use crate::diagnostics::Span;
use crate::grammar::ast::{Predicative, Sfp, SortDirection};

use super::errors::SemanticError;
use super::forecast::{Forecast, ForecastKind};
use super::plan::Sort;

/// Keywords selecting the sort clause.
pub const SORT_KEYWORDS: [&str; 2] = ["sort", "order"];

/// One sortable item.
#[derive(Debug)]
pub struct SortItemDef {
    /// Canonical name.
    pub key: &'static str,
    /// Lower-case aliases, canonical name included. A leading `^` marks a source alias.
    pub aliases: &'static [&'static str],
}

/// Sort items of a dialect.
#[derive(Debug)]
pub struct SortDef {
    /// Items in display order.
    pub items: &'static [SortItemDef],
}

impl SortDef {
    /// Aliases of every item.
    pub fn aliases(&self) -> Vec<Vec<String>> {
        self.items
            .iter()
            .map(|item| item.aliases.iter().map(|a| (*a).to_owned()).collect())
            .collect()
    }

    fn find(&self, name: &str, source: bool) -> Option<&'static str> {
        let wanted = if source {
            format!("^{}", name.to_lowercase())
        } else {
            name.to_lowercase()
        };
        self.items
            .iter()
            .find(|item| item.aliases.contains(&wanted.as_str()))
            .map(|item| item.key)
    }

    /// Reads `sort:a,-b` into sort keys. A single bare value is one ascending key.
    pub fn generate(&self, sfp: &Sfp) -> Result<Vec<Sort>, SemanticError> {
        let (Some(family), Some(predicative)) = (&sfp.family, &sfp.predicative) else {
            return Err(SemanticError::SortValueRequired {
                span: sfp.subject.span,
            });
        };
        if family.symbol != ":" {
            return Err(SemanticError::SortValueMustBeSortList {
                span: sfp.subject.span.join(predicative.span()),
            });
        }
        let invalid = |value: &str, span: Span| SemanticError::InvalidSortItem {
            value: value.to_owned(),
            expected: self.aliases().into_iter().flatten().collect(),
            span,
        };
        match predicative {
            Predicative::StrList(list) => {
                let str = list
                    .single()
                    .ok_or(SemanticError::SortValueMustBeSortList { span: list.span })?;
                let field = self
                    .find(&str.value, false)
                    .ok_or_else(|| invalid(&str.value, str.span))?;
                Ok(vec![Sort {
                    field,
                    descending: false,
                }])
            }
            Predicative::SortList(list) => list
                .items
                .iter()
                .map(|item| {
                    let field = self
                        .find(&item.value.value, item.source)
                        .ok_or_else(|| invalid(&item.value.value, item.span))?;
                    Ok(Sort {
                        field,
                        descending: item.direction == SortDirection::Desc,
                    })
                })
                .collect(),
            other => Err(SemanticError::SortValueMustBeSortList { span: other.span() }),
        }
    }

    /// Offers sort items while the cursor sits on one.
    pub fn forecast(&self, sfp: &Sfp, cursor: usize) -> Option<Forecast> {
        let (partial, span) = match sfp.predicative.as_ref()? {
            Predicative::StrList(list) => {
                let str = list.single().filter(|s| s.span.touches(cursor))?;
                (str.value.clone(), str.span)
            }
            Predicative::SortList(list) => {
                let item = list.items.iter().find(|i| i.span.touches(cursor))?;
                let signed = item.direction != SortDirection::Default;
                let partial = if item.source {
                    format!("^{}", item.value.value)
                } else {
                    item.value.value.clone()
                };
                (partial, Span::new(item.span.begin + usize::from(signed), item.span.end))
            }
            _ => return None,
        };
        Some(Forecast {
            partial,
            span,
            kind: ForecastKind::Sort {
                items: self.aliases(),
            },
        })
    }
}
