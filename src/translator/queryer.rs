//! Collaborators of the translator: the catalog it resolves references against
//! and the sink that receives the executable form of the query.

use thiserror::Error;

use crate::diagnostics::ErrorCollector;
use crate::semantic::{MetaAddress, MetaString, MetaType, MetaValue, Sort, UnionFilters};

use super::errors::TranslatorError;
use super::visual::{ElementAuthor, ElementSourceTag, ElementString, ElementTag, ElementTopic};

/// Read-only catalog lookups.
///
/// Lookups never fail; a catalog that wants to report a problem pushes a
/// warning into `collector`.
pub trait Queryer {
    /// Tags matching one meta value.
    fn find_tag(&self, value: &MetaValue, collector: &mut ErrorCollector<TranslatorError>) -> Vec<ElementTag>;
    /// Topics matching one address.
    fn find_topic(
        &self,
        address: &MetaAddress,
        collector: &mut ErrorCollector<TranslatorError>,
    ) -> Vec<ElementTopic>;
    /// Authors matching one name.
    fn find_author(
        &self,
        name: &MetaString,
        collector: &mut ErrorCollector<TranslatorError>,
    ) -> Vec<ElementAuthor>;
    /// Source tags matching one `site.tag` address.
    fn find_source_tag(
        &self,
        address: &MetaAddress,
        collector: &mut ErrorCollector<TranslatorError>,
    ) -> Vec<ElementSourceTag>;

    /// Folds the tags matched by all items of one element. Drops repeats by default.
    fn flat_union_tag(&self, tags: Vec<ElementTag>) -> Vec<ElementTag> {
        dedup_by_id(tags, |t| t.id)
    }

    /// Folds the topics matched by all items of one element. Drops repeats by default.
    fn flat_union_topic(&self, topics: Vec<ElementTopic>) -> Vec<ElementTopic> {
        dedup_by_id(topics, |t| t.id)
    }

    /// Tags whose names contain `partial`.
    fn forecast_tag(&self, _partial: &str) -> Vec<ElementTag> {
        Vec::new()
    }

    /// Topics whose names contain `partial`.
    fn forecast_topic(&self, _partial: &str) -> Vec<ElementTopic> {
        Vec::new()
    }

    /// Authors whose names contain `partial`.
    fn forecast_author(&self, _partial: &str) -> Vec<ElementAuthor> {
        Vec::new()
    }

    /// Source tags whose names contain `partial`.
    fn forecast_source_tag(&self, _partial: &str) -> Vec<ElementSourceTag> {
        Vec::new()
    }

    /// Free keywords used with meta tags of `meta_type`.
    fn forecast_keyword(&self, _partial: &str, _meta_type: MetaType) -> Vec<String> {
        Vec::new()
    }
}

fn dedup_by_id<T>(items: Vec<T>, id: impl Fn(&T) -> u64) -> Vec<T> {
    let mut seen = rustc_hash::FxHashSet::default();
    items.into_iter().filter(|item| seen.insert(id(item))).collect()
}

/// A builder callback could not accept its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// The builder has no support for this element kind.
    #[error("{0} elements are not supported by this builder")]
    Unsupported(&'static str),
    /// The builder rejected the input.
    #[error("builder failed: {0}")]
    Failed(String),
}

/// Receives the plan piece by piece and assembles an executable query.
///
/// Element callbacks default to [`BuildError::Unsupported`] so a builder only
/// implements the kinds its target has.
pub trait ExecuteBuilder {
    /// Finished product.
    type Output;

    /// Sort keys, called once and only when there are any.
    fn map_sorts(&mut self, sorts: &[Sort]) -> Result<(), BuildError>;

    /// One union filter group.
    fn map_filter(&mut self, filters: &UnionFilters, exclude: bool) -> Result<(), BuildError>;

    /// One name element.
    fn map_name_element(&mut self, _items: &[ElementString], _exclude: bool) -> Result<(), BuildError> {
        Err(BuildError::Unsupported("name"))
    }

    /// One comment element.
    fn map_comment_element(&mut self, _items: &[ElementString], _exclude: bool) -> Result<(), BuildError> {
        Err(BuildError::Unsupported("comment"))
    }

    /// One source tag element.
    fn map_source_tag_element(
        &mut self,
        _items: &[ElementSourceTag],
        _exclude: bool,
    ) -> Result<(), BuildError> {
        Err(BuildError::Unsupported("source-tag"))
    }

    /// One meta tag element resolved as tags.
    fn map_tag_element(&mut self, _items: &[ElementTag], _exclude: bool) -> Result<(), BuildError> {
        Err(BuildError::Unsupported("tag"))
    }

    /// One meta tag element resolved as topics.
    fn map_topic_element(&mut self, _items: &[ElementTopic], _exclude: bool) -> Result<(), BuildError> {
        Err(BuildError::Unsupported("topic"))
    }

    /// One meta tag element resolved as authors.
    fn map_author_element(&mut self, _items: &[ElementAuthor], _exclude: bool) -> Result<(), BuildError> {
        Err(BuildError::Unsupported("author"))
    }

    /// Finishes the executable query.
    fn build(self) -> Self::Output;
}
