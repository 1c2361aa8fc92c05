//! Pipeline facade: query text in, visual plan and diagnostics out.
//!
//! [`QueryCompiler`] runs the four stages in order and flattens every stage's
//! diagnostics into one [`QuerySchema`]. [`QueryManager`] adds an LRU cache of
//! compiled queries keyed by query text.

#![forbid(unsafe_code)]

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::diagnostics::{AnalysisResult, CodedError, Diagnostic, Severity};
use crate::grammar::{GrammarBuildError, QueryGrammar};
use crate::lexical;
use crate::options::CompilerOptions;
use crate::semantic;
use crate::translator::{self, BuildError, ExecuteBuilder, Queryer, VisualForecast, VisualQueryPlan};

/// Outcome of compiling one query.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QuerySchema {
    /// Visual plan, absent when any stage reported an error.
    pub plan: Option<VisualQueryPlan>,
    /// Warnings of every stage, in stage order.
    pub warnings: Vec<Diagnostic>,
    /// Errors of the stage that stopped the pipeline.
    pub errors: Vec<Diagnostic>,
}

impl QuerySchema {
    /// True when the query did not compile.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn absorb<T, E: CodedError>(&mut self, stage: AnalysisResult<T, E>) -> Option<T> {
        self.warnings.extend(
            stage
                .warnings
                .iter()
                .map(|w| Diagnostic::from_error(Severity::Warning, w)),
        );
        self.errors.extend(
            stage
                .errors
                .iter()
                .map(|e| Diagnostic::from_error(Severity::Error, e)),
        );
        stage.result
    }
}

/// Runs lexing, parsing, semantic analysis and translation with one set of
/// options.
#[derive(Clone)]
pub struct QueryCompiler {
    grammar: &'static QueryGrammar,
    options: CompilerOptions,
}

impl QueryCompiler {
    /// Creates a compiler over the shared built-in grammar.
    pub fn new(options: CompilerOptions) -> Result<Self, GrammarBuildError> {
        Ok(Self {
            grammar: QueryGrammar::shared()?,
            options,
        })
    }

    /// Options in use.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compiles `text`, feeding `builder` as the plan is translated.
    ///
    /// Parse and semantic errors stop the pipeline with no builder calls. Only
    /// a failing builder callback is returned as `Err`.
    pub fn compile<Q, B>(&self, text: &str, queryer: &Q, builder: &mut B) -> Result<QuerySchema, BuildError>
    where
        Q: Queryer + ?Sized,
        B: ExecuteBuilder,
    {
        let mut schema = QuerySchema::default();
        let tokens = schema
            .absorb(lexical::analyze(text, &self.options.lexical))
            .unwrap_or_default();

        let root = schema.absorb(self.grammar.parse(&tokens));
        if schema.has_errors() {
            debug!(errors = schema.errors.len(), "query failed to parse");
            return Ok(schema);
        }
        let Some(root) = root else {
            schema.plan = Some(VisualQueryPlan::default());
            return Ok(schema);
        };

        let plan = schema.absorb(semantic::analyze(&root, self.options.dialect));
        let Some(plan) = plan else {
            debug!(errors = schema.errors.len(), "query failed semantic analysis");
            return Ok(schema);
        };

        let translated = translator::translate(&plan, queryer, builder, &self.options.translator, root.span)?;
        schema.plan = schema.absorb(translated);
        Ok(schema)
    }

    /// Suggestions for the cursor position, a character offset that defaults
    /// to the end of `text`. Text that does not parse has none.
    pub fn forecast<Q>(&self, text: &str, cursor: Option<usize>, queryer: &Q) -> Option<VisualForecast>
    where
        Q: Queryer + ?Sized,
    {
        let cursor = cursor.unwrap_or_else(|| text.chars().count());
        let tokens = lexical::analyze(text, &self.options.lexical).result?;
        let root = self.grammar.parse(&tokens).result?;
        let request = semantic::forecast(&root, cursor, self.options.dialect)?;
        Some(translator::forecast(&request, queryer))
    }
}

/// A cached compilation: the schema and what the builder produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery<T> {
    /// Plan and diagnostics.
    pub schema: QuerySchema,
    /// Builder output. The builder sees no calls when the schema has errors.
    pub output: T,
}

/// A compiler bound to one catalog, caching compiled queries by text.
pub struct QueryManager<Q, B: ExecuteBuilder> {
    compiler: QueryCompiler,
    queryer: Q,
    cache: Mutex<LruCache<String, Arc<CompiledQuery<B::Output>>>>,
}

impl<Q, B> QueryManager<Q, B>
where
    Q: Queryer,
    B: ExecuteBuilder + Default,
{
    /// Creates a manager holding up to `cache_capacity` compiled queries.
    pub fn new(compiler: QueryCompiler, queryer: Q) -> Self {
        let capacity =
            NonZeroUsize::new(compiler.options().cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            compiler,
            queryer,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The wrapped compiler.
    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    /// Compiles `text` with a fresh builder, or returns the cached result.
    pub fn query(&self, text: &str) -> Result<Arc<CompiledQuery<B::Output>>, BuildError> {
        if let Some(hit) = self.cache.lock().get(text).cloned() {
            debug!(query = text, "query cache hit");
            return Ok(hit);
        }
        debug!(query = text, "query cache miss");

        let mut builder = B::default();
        let schema = self.compiler.compile(text, &self.queryer, &mut builder)?;
        let compiled = Arc::new(CompiledQuery {
            schema,
            output: builder.build(),
        });
        self.cache.lock().put(text.to_owned(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Suggestions against the manager's catalog; never cached.
    pub fn forecast(&self, text: &str, cursor: Option<usize>) -> Option<VisualForecast> {
        self.compiler.forecast(text, cursor, &self.queryer)
    }

    /// Number of cached queries.
    pub fn cached(&self) -> usize {
        self.cache.lock().len()
    }

    /// Drops every cached query, e.g. after the catalog changed.
    pub fn flush(&self) {
        self.cache.lock().clear();
    }
}
