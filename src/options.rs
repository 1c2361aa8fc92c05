//! Compiler configuration: lexer and translator knobs plus the TOML loader.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::semantic::DialectKind;

/// Options applied by the lexical analyzer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalOptions {
    /// Translate `_` inside bare strings into a space.
    pub translate_underscore_to_space: bool,
    /// Accept full-width punctuation as its ASCII equivalent.
    pub chinese_symbol_reflect: bool,
}

/// Thresholds that make the translator emit size warnings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorOptions {
    /// A union clause resolving to at least this many entities is reported.
    pub warning_limit_of_union_items: usize,
    /// At least this many joined clauses in one query is reported.
    pub warning_limit_of_intersect_items: usize,
}

impl Default for TranslatorOptions {
    fn default() -> Self {
        Self {
            warning_limit_of_union_items: 20,
            warning_limit_of_intersect_items: 8,
        }
    }
}

/// Full compiler configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Lexer options.
    pub lexical: LexicalOptions,
    /// Translator thresholds.
    pub translator: TranslatorOptions,
    /// Keyword tables used by the semantic pass.
    pub dialect: DialectKind,
    /// Number of compiled queries kept by [`crate::compiler::QueryManager`].
    pub cache_capacity: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            lexical: LexicalOptions::default(),
            translator: TranslatorOptions::default(),
            dialect: DialectKind::Illust,
            cache_capacity: 100,
        }
    }
}

impl CompilerOptions {
    /// Parses options from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// Reads options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Serializes the options back to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|source| ConfigError::Serialize { source })
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path:?}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The TOML text was invalid.
    #[error("failed to parse config: {source}")]
    Parse {
        /// File that failed, if the text came from a file.
        path: Option<PathBuf>,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// A catalog file was not valid JSON.
    #[error("failed to parse catalog {path:?}: {source}")]
    Catalog {
        /// File that failed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// The options could not be rendered as TOML.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying TOML error.
        #[source]
        source: toml::ser::Error,
    },
}
