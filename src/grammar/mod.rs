//! Grammar of the query language: definition, SLR table, rule bindings and parser.
//!
//! [`QueryGrammar`] bundles the three pieces built once at startup. The table
//! and rules are read-only afterwards, so one instance serves every request.

#![forbid(unsafe_code)]

pub mod ast;
pub mod definition;
mod errors;
pub mod family;
pub mod intern;
mod parser;
mod rules;
pub mod table;

use std::sync::OnceLock;

use tracing::info;

use crate::diagnostics::AnalysisResult;
use crate::lexical::LexicalItem;

pub use ast::SemanticRoot;
pub use definition::Grammar;
pub use errors::{GrammarBuildError, GrammarError};
pub use table::{ActionKind, AllowedConflict, ConflictPolicy, SyntaxTable};

use rules::RuleTable;

/// Reviewed conflict of the built-in grammar: a lone string after `:` stays a
/// string instead of becoming a one-item sort list.
const REVIEWED_CONFLICT: (&str, &str) = ("STRING -> str", "SORT_ITEM -> str");

static SHARED: OnceLock<Result<QueryGrammar, GrammarBuildError>> = OnceLock::new();

/// The query language grammar with its table and rule bindings.
pub struct QueryGrammar {
    grammar: Grammar,
    table: SyntaxTable,
    rules: RuleTable,
}

impl QueryGrammar {
    /// Builds the grammar, table and rules from scratch.
    pub fn build() -> Result<Self, GrammarBuildError> {
        let grammar = Grammar::builtin()?;
        let policy = Self::conflict_policy(&grammar);
        let table = SyntaxTable::build(&grammar, &policy)?;
        let rules = rules::query_rules(&grammar)?;
        info!(
            productions = grammar.productions().len() - 1,
            states = table.state_count(),
            "query grammar ready"
        );
        Ok(Self {
            grammar,
            table,
            rules,
        })
    }

    /// Process-wide instance, built on first use.
    pub fn shared() -> Result<&'static Self, GrammarBuildError> {
        SHARED.get_or_init(Self::build).as_ref().map_err(Clone::clone)
    }

    /// Conflict policy used for the built-in grammar.
    pub fn conflict_policy(grammar: &Grammar) -> ConflictPolicy {
        let (kept, discarded) = REVIEWED_CONFLICT;
        match (grammar.find_production(kept), grammar.find_production(discarded)) {
            (Some(kept), Some(discarded)) => ConflictPolicy::AllowListed(vec![AllowedConflict {
                kept: ActionKind::Reduce(kept),
                discarded: ActionKind::Reduce(discarded),
            }]),
            _ => ConflictPolicy::Strict,
        }
    }

    /// Parses a token stream. An input with only spaces yields no tree.
    pub fn parse(&self, tokens: &[LexicalItem]) -> AnalysisResult<SemanticRoot, GrammarError> {
        parser::parse(&self.grammar, &self.table, &self.rules, tokens)
    }

    /// The production list.
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// The SLR table.
    pub fn table(&self) -> &SyntaxTable {
        &self.table
    }
}
