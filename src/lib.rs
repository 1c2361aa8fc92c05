//! Compiler for a tag query language.
//!
//! A query such as `@leonardo -#renaissance score>=4 sort:-score` goes through
//! four stages, each reporting warnings and errors with stable codes:
//!
//! 1. [`lexical`] scans the text into tokens.
//! 2. [`grammar`] parses tokens with an SLR table into a syntax tree.
//! 3. [`semantic`] checks the tree against a dialect and builds a
//!    [`semantic::QueryPlan`].
//! 4. [`translator`] resolves references through a [`translator::Queryer`]
//!    and feeds an [`translator::ExecuteBuilder`].
//!
//! [`compiler::QueryCompiler`] runs them end to end and
//! [`compiler::QueryManager`] caches the results.

#![warn(missing_docs)]

pub mod compiler;
pub mod diagnostics;
pub mod grammar;
pub mod lexical;
pub mod options;
pub mod semantic;
pub mod translator;

pub use compiler::{CompiledQuery, QueryCompiler, QueryManager, QuerySchema};
pub use diagnostics::{AnalysisResult, CodedError, Diagnostic, ErrorCollector, Severity, Span};
pub use options::{CompilerOptions, ConfigError, LexicalOptions, TranslatorOptions};
