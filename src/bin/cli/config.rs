use std::path::PathBuf;

use tagql::options::{CompilerOptions, ConfigError};
use tagql::semantic::DialectKind;

/// Flags that override values read from the config file.
#[derive(Debug, Default, Clone, Copy)]
pub struct Overrides {
    pub dialect: Option<DialectKind>,
    pub underscore_space: bool,
    pub reflect_fullwidth: bool,
}

#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    loaded: bool,
    options: CompilerOptions,
}

impl CliConfig {
    /// Reads `explicit`, or the default config path when none is given. A
    /// missing file leaves every option at its default.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let (options, loaded) = match path.as_ref() {
            Some(config_path) if config_path.exists() => (CompilerOptions::load(config_path)?, true),
            _ => (CompilerOptions::default(), false),
        };
        Ok(Self {
            path,
            loaded,
            options,
        })
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.path.as_ref().filter(|_| self.loaded)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(dialect) = overrides.dialect {
            self.options.dialect = dialect;
        }
        if overrides.underscore_space {
            self.options.lexical.translate_underscore_to_space = true;
        }
        if overrides.reflect_fullwidth {
            self.options.lexical.chinese_symbol_reflect = true;
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("tagql").join("config.toml"))
}
