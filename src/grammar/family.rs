//! LR(0) items and the canonical collection of item sets.
//!
//! Items inside a state keep insertion order and new states are appended in
//! breadth-first discovery order, so state numbering only depends on the
//! production list.

use rustc_hash::FxHashMap;

use super::definition::{Grammar, Notation};

/// A production with a dot position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    /// Production index.
    pub production: usize,
    /// Number of notations already matched.
    pub dot: usize,
}

impl Item {
    /// Creates an item.
    pub fn new(production: usize, dot: usize) -> Self {
        Self { production, dot }
    }
}

/// One parser state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSet {
    /// State number.
    pub index: usize,
    /// Items in insertion order.
    pub items: Vec<Item>,
    /// Outgoing transitions in the order they were discovered.
    pub transitions: Vec<(Notation, usize)>,
}

/// Builds closures, gotos and the canonical collection for one grammar.
pub struct FamilyBuilder<'g> {
    grammar: &'g Grammar,
}

impl<'g> FamilyBuilder<'g> {
    /// Creates a builder over `grammar`.
    pub fn new(grammar: &'g Grammar) -> Self {
        Self { grammar }
    }

    /// Notation right after the dot, if the item is not complete.
    pub fn next_notation(&self, item: Item) -> Option<Notation> {
        self.grammar
            .production(item.production)
            .and_then(|p| p.sequence.get(item.dot).copied())
    }

    /// Closes `kernel` under "dot before a non-terminal adds its productions".
    pub fn closure(&self, kernel: &[Item]) -> Vec<Item> {
        let mut items: Vec<Item> = Vec::with_capacity(kernel.len());
        for item in kernel {
            if !items.contains(item) {
                items.push(*item);
            }
        }
        loop {
            let mut keys = Vec::new();
            for item in &items {
                if let Some(Notation::NonTerminal(key)) = self.next_notation(*item) {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
            let mut added = false;
            for key in keys {
                for production in self.grammar.productions_of(key) {
                    let item = Item::new(production.index, 0);
                    if !items.contains(&item) {
                        items.push(item);
                        added = true;
                    }
                }
            }
            if !added {
                return items;
            }
        }
    }

    /// Advances every item expecting `notation` and closes the result.
    pub fn goto(&self, items: &[Item], notation: Notation) -> Vec<Item> {
        let advanced: Vec<Item> = items
            .iter()
            .filter(|item| self.next_notation(**item) == Some(notation))
            .map(|item| Item::new(item.production, item.dot + 1))
            .collect();
        self.closure(&advanced)
    }

    /// Builds the canonical collection starting from `closure({S' -> . root})`.
    pub fn build(&self) -> Vec<ItemSet> {
        let start = self.closure(&[Item::new(0, 0)]);
        let mut known: FxHashMap<Vec<Item>, usize> = FxHashMap::default();
        known.insert(set_key(&start), 0);
        let mut states = vec![ItemSet {
            index: 0,
            items: start,
            transitions: Vec::new(),
        }];

        let mut cursor = 0;
        while cursor < states.len() {
            let items = states[cursor].items.clone();
            let mut transitions: Vec<(Notation, usize)> = Vec::new();
            for item in &items {
                let Some(notation) = self.next_notation(*item) else {
                    continue;
                };
                if transitions.iter().any(|(n, _)| *n == notation) {
                    continue;
                }
                let target = self.goto(&items, notation);
                let key = set_key(&target);
                let index = match known.get(&key) {
                    Some(index) => *index,
                    None => {
                        let index = states.len();
                        known.insert(key, index);
                        states.push(ItemSet {
                            index,
                            items: target,
                            transitions: Vec::new(),
                        });
                        index
                    }
                };
                transitions.push((notation, index));
            }
            states[cursor].transitions = transitions;
            cursor += 1;
        }
        states
    }
}

/// Order-insensitive identity of an item set.
fn set_key(items: &[Item]) -> Vec<Item> {
    let mut key = items.to_vec();
    key.sort_unstable();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPRESSIONS: &str = "E -> E + T\nE -> T\nT -> T * F\nT -> F\nF -> ( E )\nF -> id";

    fn items(pairs: &[(usize, usize)]) -> Vec<Item> {
        pairs.iter().map(|&(p, d)| Item::new(p, d)).collect()
    }

    #[test]
    fn closure_follows_insertion_order() {
        let grammar = Grammar::parse(EXPRESSIONS).expect("grammar");
        let builder = FamilyBuilder::new(&grammar);
        assert_eq!(
            builder.closure(&[Item::new(0, 0)]),
            items(&[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0), (6, 0)])
        );
        assert_eq!(
            builder.closure(&[Item::new(1, 2)]),
            items(&[(1, 2), (3, 0), (4, 0), (5, 0), (6, 0)])
        );
    }

    #[test]
    fn goto_advances_matching_items() {
        let grammar = Grammar::parse(EXPRESSIONS).expect("grammar");
        let builder = FamilyBuilder::new(&grammar);
        let start = builder.closure(&[Item::new(0, 0)]);
        let e = grammar.symbol("E").expect("E");
        assert_eq!(
            builder.goto(&start, Notation::NonTerminal(e)),
            items(&[(0, 1), (1, 1)])
        );
        let t = grammar.symbol("T").expect("T");
        assert_eq!(
            builder.goto(&start, Notation::NonTerminal(t)),
            items(&[(2, 1), (3, 1)])
        );
    }

    #[test]
    fn canonical_collection_numbering() {
        let grammar = Grammar::parse(EXPRESSIONS).expect("grammar");
        let states = FamilyBuilder::new(&grammar).build();
        assert_eq!(states.len(), 12);
        assert_eq!(
            states[4].items,
            items(&[(5, 1), (1, 0), (2, 0), (3, 0), (4, 0), (5, 0), (6, 0)])
        );
        let names: Vec<(&str, usize)> = states[0]
            .transitions
            .iter()
            .map(|(n, target)| (grammar.name(n.symbol()), *target))
            .collect();
        assert_eq!(names, [("E", 1), ("T", 2), ("F", 3), ("(", 4), ("id", 5)]);
    }
}
