//! Grammar model and the text reader for `KEY -> a b c` production lists.

use std::fmt::Write as _;

use super::errors::GrammarBuildError;
use super::intern::{Interner, Symbol};

/// Terminal rendered for the end of input.
pub const EOF: &str = "∑";

/// Terminal matched by every string token.
pub const STRING_TERMINAL: &str = "str";

/// Key rendered for the synthetic augmented production.
const AUGMENTED_KEY: &str = "S'";

/// Productions of the query language.
pub const BUILTIN_GRAMMAR: &str = include_str!("query.grammar");

/// A grammar symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notation {
    /// Matched against a token notation.
    Terminal(Symbol),
    /// Expanded through productions.
    NonTerminal(Symbol),
}

impl Notation {
    /// Interned name.
    pub fn symbol(self) -> Symbol {
        match self {
            Notation::Terminal(s) | Notation::NonTerminal(s) => s,
        }
    }

    /// True for terminals.
    pub fn is_terminal(self) -> bool {
        matches!(self, Notation::Terminal(_))
    }
}

/// One production. Index 0 is the augmented `S' -> root` production and has
/// no key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    /// Position in the grammar, starting at 1 for user productions.
    pub index: usize,
    /// Left-hand side, absent for the augmented production.
    pub key: Option<Symbol>,
    /// Right-hand side.
    pub sequence: Vec<Notation>,
}

/// An augmented grammar with interned names.
#[derive(Debug, Clone)]
pub struct Grammar {
    interner: Interner,
    productions: Vec<Production>,
    root: Symbol,
    eof: Symbol,
}

/// Upper-case names are non-terminals.
pub fn is_non_terminal_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c == '_')
}

impl Grammar {
    /// Reads a grammar from text.
    ///
    /// Blank lines and lines starting with `#` are skipped. The key of the
    /// first production becomes the root.
    pub fn parse(text: &str) -> Result<Self, GrammarBuildError> {
        let mut interner = Interner::new();
        let eof = interner.intern(EOF);
        let mut productions = Vec::new();
        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, rhs) =
                line.split_once("->")
                    .ok_or_else(|| GrammarBuildError::MalformedProduction {
                        line: number + 1,
                        text: line.to_owned(),
                    })?;
            let key = key.trim();
            if !is_non_terminal_name(key) {
                return Err(GrammarBuildError::InvalidKey {
                    line: number + 1,
                    key: key.to_owned(),
                });
            }
            let key = interner.intern(key);
            let sequence = rhs
                .split_whitespace()
                .map(|name| {
                    let symbol = interner.intern(name);
                    if is_non_terminal_name(name) {
                        Notation::NonTerminal(symbol)
                    } else {
                        Notation::Terminal(symbol)
                    }
                })
                .collect();
            productions.push(Production {
                index: productions.len() + 1,
                key: Some(key),
                sequence,
            });
        }

        let root = productions
            .first()
            .and_then(|p: &Production| p.key)
            .ok_or(GrammarBuildError::EmptyGrammar)?;
        for production in &productions {
            for notation in &production.sequence {
                if let Notation::NonTerminal(symbol) = notation {
                    if !productions.iter().any(|p| p.key == Some(*symbol)) {
                        return Err(GrammarBuildError::UndefinedNonTerminal {
                            name: interner.resolve(*symbol).to_owned(),
                        });
                    }
                }
            }
        }
        productions.insert(
            0,
            Production {
                index: 0,
                key: None,
                sequence: vec![Notation::NonTerminal(root)],
            },
        );
        Ok(Self {
            interner,
            productions,
            root,
            eof,
        })
    }

    /// The query language grammar.
    pub fn builtin() -> Result<Self, GrammarBuildError> {
        Self::parse(BUILTIN_GRAMMAR)
    }

    /// All productions, the augmented one first.
    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    /// Production by index.
    pub fn production(&self, index: usize) -> Option<&Production> {
        self.productions.get(index)
    }

    /// Productions whose key is `key`, in grammar order.
    pub fn productions_of(&self, key: Symbol) -> impl Iterator<Item = &Production> + '_ {
        self.productions.iter().filter(move |p| p.key == Some(key))
    }

    /// Root non-terminal.
    pub fn root(&self) -> Symbol {
        self.root
    }

    /// End-of-input terminal.
    pub fn eof(&self) -> Symbol {
        self.eof
    }

    /// Name of an interned symbol.
    pub fn name(&self, symbol: Symbol) -> &str {
        self.interner.resolve(symbol)
    }

    /// Symbol for an existing name.
    pub fn symbol(&self, name: &str) -> Option<Symbol> {
        self.interner.get(name)
    }

    /// Terminals used by the grammar plus the end-of-input terminal, sorted by name.
    pub fn terminals(&self) -> Vec<Symbol> {
        let mut terminals = vec![self.eof];
        for notation in self.productions.iter().flat_map(|p| &p.sequence) {
            if let Notation::Terminal(symbol) = notation {
                if !terminals.contains(symbol) {
                    terminals.push(*symbol);
                }
            }
        }
        terminals.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
        terminals
    }

    /// Non-terminals, sorted by name.
    pub fn non_terminals(&self) -> Vec<Symbol> {
        let mut keys: Vec<Symbol> = Vec::new();
        for key in self.productions.iter().filter_map(|p| p.key) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys.sort_by(|a, b| self.name(*a).cmp(self.name(*b)));
        keys
    }

    /// Renders a production as `KEY -> a b c`, the form used for rule binding.
    pub fn production_text(&self, index: usize) -> Option<String> {
        let production = self.productions.get(index)?;
        let mut text = match production.key {
            Some(key) => self.name(key).to_owned(),
            None => AUGMENTED_KEY.to_owned(),
        };
        text.push_str(" ->");
        for notation in &production.sequence {
            let _ = write!(text, " {}", self.name(notation.symbol()));
        }
        Some(text)
    }

    /// Finds a production by its rendered text. Whitespace runs are normalised.
    pub fn find_production(&self, text: &str) -> Option<usize> {
        let wanted = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (1..self.productions.len()).find(|&i| self.production_text(i).as_deref() == Some(wanted.as_str()))
    }
}
