//! String interner for grammar notations.

use rustc_hash::FxHashMap;

/// Interned notation name. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Position of the name in the interner.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Maps names to [`Symbol`]s and back. Populated while a grammar is read,
/// then only read.
#[derive(Debug, Clone, Default)]
pub struct Interner {
    lookup: FxHashMap<Box<str>, Symbol>,
    names: Vec<Box<str>>,
}

impl Interner {
    /// Creates an empty interner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the symbol for `name`, allocating one on first sight.
    pub fn intern(&mut self, name: &str) -> Symbol {
        if let Some(symbol) = self.lookup.get(name) {
            return *symbol;
        }
        let symbol = Symbol(self.names.len() as u32);
        self.names.push(name.into());
        self.lookup.insert(name.into(), symbol);
        symbol
    }

    /// Looks up an existing symbol.
    pub fn get(&self, name: &str) -> Option<Symbol> {
        self.lookup.get(name).copied()
    }

    /// Name behind a symbol.
    pub fn resolve(&self, symbol: Symbol) -> &str {
        &self.names[symbol.index()]
    }

    /// Number of interned names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when nothing has been interned.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut interner = Interner::new();
        let a = interner.intern("SEQUENCE");
        let b = interner.intern("str");
        assert_eq!(interner.intern("SEQUENCE"), a);
        assert_ne!(a, b);
        assert_eq!(interner.resolve(b), "str");
        assert_eq!(interner.get("missing"), None);
        assert_eq!(interner.len(), 2);
    }
}
