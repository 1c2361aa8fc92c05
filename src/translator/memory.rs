//! In-memory collaborators: a catalog loaded from JSON and a builder that
//! records every call it receives. The CLI compiles against them, and so do
//! the tests.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diagnostics::ErrorCollector;
use crate::options::ConfigError;
use crate::semantic::{MetaAddress, MetaString, MetaType, MetaValue, Sort, UnionFilters};

use super::errors::TranslatorError;
use super::queryer::{BuildError, ExecuteBuilder, Queryer};
use super::visual::{ElementAuthor, ElementSourceTag, ElementString, ElementTag, ElementTopic};

/// A free keyword known for one meta type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    /// Meta type the keyword belongs to.
    pub meta_type: MetaType,
    /// Keyword text.
    pub name: String,
}

/// Entities known to an [`InMemoryQueryer`]. Tags of one group are listed in
/// group order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    /// Tags.
    pub tags: Vec<ElementTag>,
    /// Topics.
    pub topics: Vec<ElementTopic>,
    /// Authors.
    pub authors: Vec<ElementAuthor>,
    /// Source tags.
    pub source_tags: Vec<ElementSourceTag>,
    /// Free keywords.
    pub keywords: Vec<Keyword>,
}

impl Catalog {
    /// Reads a catalog from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Catalog {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Precise segments match exactly, others ignore case.
fn matches(segment: &MetaString, name: &str) -> bool {
    if segment.precise {
        segment.value == name
    } else {
        segment.value.to_lowercase() == name.to_lowercase()
    }
}

fn matches_any<'a>(segment: &MetaString, names: impl IntoIterator<Item = &'a str>) -> bool {
    names.into_iter().any(|name| matches(segment, name))
}

fn contains_ignore_case<'a>(partial: &str, names: impl IntoIterator<Item = &'a str>) -> bool {
    let partial = partial.to_lowercase();
    names
        .into_iter()
        .any(|name| name.to_lowercase().contains(&partial))
}

/// Inclusive slice bounds from `from` to `to`, in either order.
fn span_between(from: usize, to: usize) -> (usize, usize) {
    (from.min(to), from.max(to))
}

/// [`Queryer`] over a [`Catalog`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueryer {
    catalog: Catalog,
}

impl InMemoryQueryer {
    /// Wraps a catalog.
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    fn tag_names(tag: &ElementTag) -> impl Iterator<Item = &str> {
        std::iter::once(tag.name.as_str()).chain(tag.other_names.iter().map(String::as_str))
    }

    /// Tags at `address`: the last segment names the tag and the one before
    /// it, if any, names its parent.
    fn tags_at<'a>(&'a self, address: &'a [MetaString]) -> impl Iterator<Item = &'a ElementTag> + 'a {
        let (last, parents) = match address.split_last() {
            Some((last, parents)) => (Some(last), parents),
            None => (None, address),
        };
        self.catalog.tags.iter().filter(move |tag| {
            let Some(last) = last else {
                return false;
            };
            matches_any(last, Self::tag_names(tag))
                && match (parents.last(), &tag.parent) {
                    (None, _) => true,
                    (Some(parent), Some(name)) => matches(parent, name),
                    (Some(_), None) => false,
                }
        })
    }

    fn members(&self, group: &ElementTag) -> Vec<&ElementTag> {
        self.catalog
            .tags
            .iter()
            .filter(|tag| tag.parent.as_deref() == Some(group.name.as_str()))
            .collect()
    }

    fn position(members: &[&ElementTag], member: &MetaString) -> Option<usize> {
        members
            .iter()
            .position(|tag| matches_any(member, Self::tag_names(tag)))
    }

    fn sequential(&self, value: &MetaValue) -> Vec<ElementTag> {
        let mut found = Vec::new();
        match value {
            MetaValue::Single { .. } | MetaValue::Simple { .. } => {
                found.extend(self.tags_at(&value.address()).cloned());
            }
            MetaValue::SequentialOfCollection { tag, values } => {
                for group in self.tags_at(tag) {
                    found.extend(
                        self.members(group)
                            .into_iter()
                            .filter(|member| values.iter().any(|v| matches_any(v, Self::tag_names(member))))
                            .cloned(),
                    );
                }
            }
            MetaValue::SequentialOfRange {
                tag,
                begin,
                end,
                include_begin,
                include_end,
            } => {
                for group in self.tags_at(tag) {
                    let members = self.members(group);
                    let from = match begin {
                        Some(b) => match Self::position(&members, b) {
                            Some(i) if *include_begin => i,
                            Some(i) => i + 1,
                            None => continue,
                        },
                        None => 0,
                    };
                    let to = match end {
                        Some(e) => match Self::position(&members, e) {
                            Some(i) if *include_end => i + 1,
                            Some(i) => i,
                            None => continue,
                        },
                        None => members.len(),
                    };
                    if from < to {
                        found.extend(members[from..to].iter().map(|t| (*t).clone()));
                    }
                }
            }
            MetaValue::SequentialItemToOther { tag, other } => {
                for item in self.tags_at(tag) {
                    let Some(group) = self.parent_of(item) else {
                        continue;
                    };
                    let members = self.members(group);
                    let (Some(from), Some(to)) = (
                        members.iter().position(|t| t.id == item.id),
                        Self::position(&members, other),
                    ) else {
                        continue;
                    };
                    let (low, high) = span_between(from, to);
                    found.extend(members[low..=high].iter().map(|t| (*t).clone()));
                }
            }
            MetaValue::SequentialItemToDirection { tag, descending } => {
                for item in self.tags_at(tag) {
                    let Some(group) = self.parent_of(item) else {
                        continue;
                    };
                    let members = self.members(group);
                    let Some(at) = members.iter().position(|t| t.id == item.id) else {
                        continue;
                    };
                    let slice = if *descending {
                        &members[..=at]
                    } else {
                        &members[at..]
                    };
                    found.extend(slice.iter().map(|t| (*t).clone()));
                }
            }
        }
        found
    }

    fn parent_of(&self, tag: &ElementTag) -> Option<&ElementTag> {
        let parent = tag.parent.as_deref()?;
        self.catalog.tags.iter().find(|t| t.name == parent)
    }
}

impl Queryer for InMemoryQueryer {
    fn find_tag(&self, value: &MetaValue, _: &mut ErrorCollector<TranslatorError>) -> Vec<ElementTag> {
        let found = self.sequential(value);
        debug!(value = %value, found = found.len(), "tag lookup");
        found
    }

    fn find_topic(
        &self,
        address: &MetaAddress,
        _: &mut ErrorCollector<TranslatorError>,
    ) -> Vec<ElementTopic> {
        let Some((last, parents)) = address.split_last() else {
            return Vec::new();
        };
        self.catalog
            .topics
            .iter()
            .filter(|topic| {
                let names = std::iter::once(topic.name.as_str())
                    .chain(topic.other_names.iter().map(String::as_str));
                matches_any(last, names)
                    && match (parents.last(), &topic.parent) {
                        (None, _) => true,
                        (Some(parent), Some(name)) => matches(parent, name),
                        (Some(_), None) => false,
                    }
            })
            .cloned()
            .collect()
    }

    fn find_author(
        &self,
        name: &MetaString,
        _: &mut ErrorCollector<TranslatorError>,
    ) -> Vec<ElementAuthor> {
        self.catalog
            .authors
            .iter()
            .filter(|author| {
                matches_any(
                    name,
                    std::iter::once(author.name.as_str())
                        .chain(author.other_names.iter().map(String::as_str)),
                )
            })
            .cloned()
            .collect()
    }

    fn find_source_tag(
        &self,
        address: &MetaAddress,
        _: &mut ErrorCollector<TranslatorError>,
    ) -> Vec<ElementSourceTag> {
        let (site, name) = match address.as_slice() {
            [name] => (None, name),
            [site, name] => (Some(site), name),
            _ => return Vec::new(),
        };
        self.catalog
            .source_tags
            .iter()
            .filter(|tag| {
                site.map_or(true, |site| matches(site, &tag.site))
                    && matches_any(
                        name,
                        std::iter::once(tag.name.as_str()).chain(tag.display_name.as_deref()),
                    )
            })
            .cloned()
            .collect()
    }

    fn forecast_tag(&self, partial: &str) -> Vec<ElementTag> {
        self.catalog
            .tags
            .iter()
            .filter(|tag| contains_ignore_case(partial, Self::tag_names(tag)))
            .cloned()
            .collect()
    }

    fn forecast_topic(&self, partial: &str) -> Vec<ElementTopic> {
        self.catalog
            .topics
            .iter()
            .filter(|topic| {
                contains_ignore_case(
                    partial,
                    std::iter::once(topic.name.as_str())
                        .chain(topic.other_names.iter().map(String::as_str)),
                )
            })
            .cloned()
            .collect()
    }

    fn forecast_author(&self, partial: &str) -> Vec<ElementAuthor> {
        self.catalog
            .authors
            .iter()
            .filter(|author| {
                contains_ignore_case(
                    partial,
                    std::iter::once(author.name.as_str())
                        .chain(author.other_names.iter().map(String::as_str)),
                )
            })
            .cloned()
            .collect()
    }

    fn forecast_source_tag(&self, partial: &str) -> Vec<ElementSourceTag> {
        self.catalog
            .source_tags
            .iter()
            .filter(|tag| {
                contains_ignore_case(
                    partial,
                    std::iter::once(tag.name.as_str()).chain(tag.display_name.as_deref()),
                )
            })
            .cloned()
            .collect()
    }

    fn forecast_keyword(&self, partial: &str, meta_type: MetaType) -> Vec<String> {
        self.catalog
            .keywords
            .iter()
            .filter(|k| k.meta_type == meta_type && contains_ignore_case(partial, [k.name.as_str()]))
            .map(|k| k.name.clone())
            .collect()
    }
}

/// One call received by a [`RecordingBuilder`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum BuildCall {
    /// `map_sorts`.
    Sorts {
        /// Rendered sort keys.
        sorts: Vec<String>,
    },
    /// `map_filter`.
    Filter {
        /// The union group.
        filters: UnionFilters,
        /// Negated.
        exclude: bool,
    },
    /// `map_name_element`.
    Name {
        /// Names.
        items: Vec<ElementString>,
        /// Negated.
        exclude: bool,
    },
    /// `map_comment_element`.
    Comment {
        /// Comment strings.
        items: Vec<ElementString>,
        /// Negated.
        exclude: bool,
    },
    /// `map_source_tag_element`.
    SourceTag {
        /// Resolved ids.
        ids: Vec<u64>,
        /// Negated.
        exclude: bool,
    },
    /// `map_tag_element`.
    Tag {
        /// Resolved ids.
        ids: Vec<u64>,
        /// Negated.
        exclude: bool,
    },
    /// `map_topic_element`.
    Topic {
        /// Resolved ids.
        ids: Vec<u64>,
        /// Negated.
        exclude: bool,
    },
    /// `map_author_element`.
    Author {
        /// Resolved ids.
        ids: Vec<u64>,
        /// Negated.
        exclude: bool,
    },
}

/// [`ExecuteBuilder`] that keeps every call, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingBuilder {
    calls: Vec<BuildCall>,
}

impl ExecuteBuilder for RecordingBuilder {
    type Output = Vec<BuildCall>;

    fn map_sorts(&mut self, sorts: &[Sort]) -> Result<(), BuildError> {
        self.calls.push(BuildCall::Sorts {
            sorts: sorts.iter().map(ToString::to_string).collect(),
        });
        Ok(())
    }

    fn map_filter(&mut self, filters: &UnionFilters, exclude: bool) -> Result<(), BuildError> {
        self.calls.push(BuildCall::Filter {
            filters: filters.clone(),
            exclude,
        });
        Ok(())
    }

    fn map_name_element(&mut self, items: &[ElementString], exclude: bool) -> Result<(), BuildError> {
        self.calls.push(BuildCall::Name {
            items: items.to_vec(),
            exclude,
        });
        Ok(())
    }

    fn map_comment_element(&mut self, items: &[ElementString], exclude: bool) -> Result<(), BuildError> {
        self.calls.push(BuildCall::Comment {
            items: items.to_vec(),
            exclude,
        });
        Ok(())
    }

    fn map_source_tag_element(
        &mut self,
        items: &[ElementSourceTag],
        exclude: bool,
    ) -> Result<(), BuildError> {
        self.calls.push(BuildCall::SourceTag {
            ids: items.iter().map(|t| t.id).collect(),
            exclude,
        });
        Ok(())
    }

    fn map_tag_element(&mut self, items: &[ElementTag], exclude: bool) -> Result<(), BuildError> {
        self.calls.push(BuildCall::Tag {
            ids: items.iter().map(|t| t.id).collect(),
            exclude,
        });
        Ok(())
    }

    fn map_topic_element(&mut self, items: &[ElementTopic], exclude: bool) -> Result<(), BuildError> {
        self.calls.push(BuildCall::Topic {
            ids: items.iter().map(|t| t.id).collect(),
            exclude,
        });
        Ok(())
    }

    fn map_author_element(&mut self, items: &[ElementAuthor], exclude: bool) -> Result<(), BuildError> {
        self.calls.push(BuildCall::Author {
            ids: items.iter().map(|t| t.id).collect(),
            exclude,
        });
        Ok(())
    }

    fn build(self) -> Self::Output {
        self.calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> InMemoryQueryer {
        let tag = |id: u64, name: &str, parent: Option<&str>| ElementTag {
            id,
            name: name.to_owned(),
            other_names: Vec::new(),
            parent: parent.map(str::to_owned),
            color: None,
        };
        InMemoryQueryer::new(Catalog {
            tags: vec![
                tag(1, "rank", None),
                tag(2, "a", Some("rank")),
                tag(3, "b", Some("rank")),
                tag(4, "c", Some("rank")),
                tag(5, "d", Some("rank")),
            ],
            ..Catalog::default()
        })
    }

    fn ids(value: MetaValue) -> Vec<u64> {
        group()
            .find_tag(&value, &mut ErrorCollector::new())
            .iter()
            .map(|t| t.id)
            .collect()
    }

    fn s(value: &str) -> MetaString {
        MetaString::new(value)
    }

    #[test]
    fn group_selectors() {
        assert_eq!(
            ids(MetaValue::SequentialOfCollection {
                tag: vec![s("rank")],
                values: vec![s("D"), s("a")],
            }),
            [2, 5]
        );
        assert_eq!(
            ids(MetaValue::SequentialOfRange {
                tag: vec![s("rank")],
                begin: Some(s("a")),
                end: Some(s("c")),
                include_begin: false,
                include_end: true,
            }),
            [3, 4]
        );
        assert_eq!(
            ids(MetaValue::SequentialOfRange {
                tag: vec![s("rank")],
                begin: None,
                end: Some(s("b")),
                include_begin: false,
                include_end: false,
            }),
            [2]
        );
        assert_eq!(
            ids(MetaValue::SequentialItemToOther {
                tag: vec![s("rank"), s("d")],
                other: s("b"),
            }),
            [3, 4, 5]
        );
        assert_eq!(
            ids(MetaValue::SequentialItemToDirection {
                tag: vec![s("c")],
                descending: true,
            }),
            [2, 3, 4]
        );
    }

    #[test]
    fn precise_segments_keep_case() {
        assert_eq!(ids(MetaValue::Single { value: s("RANK") }), [1]);
        assert!(ids(MetaValue::Single {
            value: MetaString::precise("RANK")
        })
        .is_empty());
    }

    #[test]
    fn recording_builder_keeps_order() {
        let mut builder = RecordingBuilder::default();
        builder
            .map_sorts(&[Sort {
                field: "id",
                descending: true,
            }])
            .expect("sorts");
        builder.map_tag_element(&[], true).expect("tags");
        assert_eq!(
            builder.build(),
            [
                BuildCall::Sorts {
                    sorts: vec!["-id".into()]
                },
                BuildCall::Tag {
                    ids: vec![],
                    exclude: true
                },
            ]
        );
    }
}
