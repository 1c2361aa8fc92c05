//! FIRST/FOLLOW sets, action emission and the dense SLR(1) table.

use std::collections::BTreeSet;
use std::fmt;

use rustc_hash::FxHashMap;
use tracing::{info, warn};

use super::definition::{Grammar, Notation};
use super::errors::GrammarBuildError;
use super::family::FamilyBuilder;
use super::intern::Symbol;

/// Member of a FIRST set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum First {
    /// A terminal that can start the derivation.
    Terminal(Symbol),
    /// The derivation can be empty.
    Epsilon,
}

/// FIRST and FOLLOW sets of every non-terminal.
#[derive(Debug, Clone, Default)]
pub struct Lookahead {
    first: FxHashMap<Symbol, BTreeSet<First>>,
    follow: FxHashMap<Symbol, BTreeSet<Symbol>>,
}

impl Lookahead {
    /// Computes both sets as fixed points over the production list.
    pub fn compute(grammar: &Grammar) -> Self {
        let mut sets = Self::default();
        let user = &grammar.productions()[1..];

        loop {
            let mut changed = false;
            for production in user {
                let Some(key) = production.key else { continue };
                let (mut found, nullable) = sets.first_of_sequence(&production.sequence);
                if nullable {
                    found.insert(First::Epsilon);
                }
                let entry = sets.first.entry(key).or_default();
                let before = entry.len();
                entry.extend(found);
                changed |= entry.len() != before;
            }
            if !changed {
                break;
            }
        }

        for key in grammar.non_terminals() {
            sets.follow.entry(key).or_default();
        }
        sets.follow
            .entry(grammar.root())
            .or_default()
            .insert(grammar.eof());
        loop {
            let mut changed = false;
            for production in user {
                let Some(key) = production.key else { continue };
                for (position, notation) in production.sequence.iter().enumerate() {
                    let Notation::NonTerminal(target) = *notation else {
                        continue;
                    };
                    let (rest, nullable) =
                        sets.first_of_sequence(&production.sequence[position + 1..]);
                    let mut added: BTreeSet<Symbol> = rest
                        .into_iter()
                        .filter_map(|f| match f {
                            First::Terminal(t) => Some(t),
                            First::Epsilon => None,
                        })
                        .collect();
                    if nullable {
                        if let Some(follow) = sets.follow.get(&key) {
                            added.extend(follow.iter().copied());
                        }
                    }
                    let entry = sets.follow.entry(target).or_default();
                    let before = entry.len();
                    entry.extend(added);
                    changed |= entry.len() != before;
                }
            }
            if !changed {
                break;
            }
        }
        sets
    }

    /// FIRST of a sequence without epsilon, plus whether the sequence can be empty.
    fn first_of_sequence(&self, sequence: &[Notation]) -> (BTreeSet<First>, bool) {
        let mut found = BTreeSet::new();
        for notation in sequence {
            match *notation {
                Notation::Terminal(t) => {
                    found.insert(First::Terminal(t));
                    return (found, false);
                }
                Notation::NonTerminal(key) => {
                    let first = self.first.get(&key);
                    let mut nullable = false;
                    for f in first.into_iter().flatten() {
                        match f {
                            First::Epsilon => nullable = true,
                            terminal => {
                                found.insert(*terminal);
                            }
                        }
                    }
                    if !nullable {
                        return (found, false);
                    }
                }
            }
        }
        (found, true)
    }

    /// FIRST set of a non-terminal.
    pub fn first(&self, key: Symbol) -> Option<&BTreeSet<First>> {
        self.first.get(&key)
    }

    /// FOLLOW set of a non-terminal.
    pub fn follow(&self, key: Symbol) -> Option<&BTreeSet<Symbol>> {
        self.follow.get(&key)
    }

    /// FIRST set rendered as names, `ε` standing for epsilon, sorted.
    pub fn first_names(&self, grammar: &Grammar, key: &str) -> Vec<String> {
        let mut names: Vec<String> = grammar
            .symbol(key)
            .and_then(|s| self.first(s))
            .into_iter()
            .flatten()
            .map(|f| match f {
                First::Terminal(t) => grammar.name(*t).to_owned(),
                First::Epsilon => "ε".to_owned(),
            })
            .collect();
        names.sort();
        names
    }

    /// FOLLOW set rendered as names, sorted.
    pub fn follow_names(&self, grammar: &Grammar, key: &str) -> Vec<String> {
        let mut names: Vec<String> = grammar
            .symbol(key)
            .and_then(|s| self.follow(s))
            .into_iter()
            .flatten()
            .map(|t| grammar.name(*t).to_owned())
            .collect();
        names.sort();
        names
    }
}

/// Parser action stored in a table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Push the token and move to the state.
    Shift(usize),
    /// Reduce by the production.
    Reduce(usize),
    /// Input accepted.
    Accept,
}

impl Action {
    /// The action with its shift target erased, used to match allow-listed conflicts.
    pub fn kind(self) -> ActionKind {
        match self {
            Action::Shift(_) => ActionKind::Shift,
            Action::Reduce(p) => ActionKind::Reduce(p),
            Action::Accept => ActionKind::Accept,
        }
    }

    fn parse(cell: &str) -> Option<Option<Self>> {
        match cell {
            "_" => Some(None),
            "acc" => Some(Some(Action::Accept)),
            _ => {
                let mut chars = cell.chars();
                let tag = chars.next()?;
                let number = chars.as_str().parse().ok()?;
                match tag {
                    's' => Some(Some(Action::Shift(number))),
                    'r' => Some(Some(Action::Reduce(number))),
                    _ => None,
                }
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Shift(state) => write!(f, "s{state}"),
            Action::Reduce(production) => write!(f, "r{production}"),
            Action::Accept => write!(f, "acc"),
        }
    }
}

/// An action without its shift target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Any shift.
    Shift,
    /// Reduce by the production.
    Reduce(usize),
    /// Accept.
    Accept,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Shift => write!(f, "shift"),
            ActionKind::Reduce(production) => write!(f, "reduce {production}"),
            ActionKind::Accept => write!(f, "accept"),
        }
    }
}

/// A reviewed conflict: `kept` wins over `discarded` wherever they collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedConflict {
    /// Action established first.
    pub kept: ActionKind,
    /// Action asserted later and dropped.
    pub discarded: ActionKind,
}

/// What happens when a table cell receives a second, different action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Any conflict fails the build.
    #[default]
    Strict,
    /// Listed conflicts keep the first action; anything else fails.
    AllowListed(Vec<AllowedConflict>),
    /// Every conflict keeps the first action.
    KeepFirst,
}

impl ConflictPolicy {
    fn allows(&self, kept: ActionKind, discarded: ActionKind) -> bool {
        match self {
            ConflictPolicy::Strict => false,
            ConflictPolicy::KeepFirst => true,
            ConflictPolicy::AllowListed(allowed) => allowed
                .iter()
                .any(|a| a.kept == kept && a.discarded == discarded),
        }
    }
}

/// A conflict that was resolved by keeping the first action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// State of the cell.
    pub state: usize,
    /// Lookahead terminal of the cell.
    pub lookahead: String,
    /// Action kept in the cell.
    pub kept: Action,
    /// Action dropped.
    pub discarded: Action,
}

/// Dense ACTION/GOTO tables. Built once and only read afterwards.
#[derive(Debug, Clone)]
pub struct SyntaxTable {
    terminals: Vec<String>,
    non_terminals: Vec<String>,
    terminal_columns: FxHashMap<String, usize>,
    non_terminal_columns: FxHashMap<String, usize>,
    actions: Vec<Option<Action>>,
    gotos: Vec<Option<usize>>,
    state_count: usize,
    conflicts: Vec<Conflict>,
}

impl PartialEq for SyntaxTable {
    fn eq(&self, other: &Self) -> bool {
        self.terminals == other.terminals
            && self.non_terminals == other.non_terminals
            && self.actions == other.actions
            && self.gotos == other.gotos
            && self.state_count == other.state_count
    }
}

impl Eq for SyntaxTable {}

struct Emitter<'a> {
    policy: &'a ConflictPolicy,
    width: usize,
    columns: FxHashMap<Symbol, usize>,
    actions: Vec<Option<Action>>,
    conflicts: Vec<Conflict>,
    grammar: &'a Grammar,
}

impl Emitter<'_> {
    fn put(&mut self, state: usize, terminal: Symbol, action: Action) -> Result<(), GrammarBuildError> {
        let Some(column) = self.columns.get(&terminal) else {
            return Ok(());
        };
        let cell = &mut self.actions[state * self.width + column];
        match *cell {
            None => *cell = Some(action),
            Some(existing) if existing == action => {}
            Some(existing) => {
                let lookahead = self.grammar.name(terminal).to_owned();
                if !self.policy.allows(existing.kind(), action.kind()) {
                    return Err(GrammarBuildError::Conflict {
                        state,
                        lookahead,
                        existing: existing.to_string(),
                        incoming: action.to_string(),
                    });
                }
                warn!(
                    state,
                    lookahead = lookahead.as_str(),
                    kept = %existing,
                    discarded = %action,
                    "grammar conflict resolved by keeping the first action"
                );
                self.conflicts.push(Conflict {
                    state,
                    lookahead,
                    kept: existing,
                    discarded: action,
                });
            }
        }
        Ok(())
    }
}

impl SyntaxTable {
    /// Builds the SLR(1) table of `grammar` under `policy`.
    pub fn build(grammar: &Grammar, policy: &ConflictPolicy) -> Result<Self, GrammarBuildError> {
        let states = FamilyBuilder::new(grammar).build();
        let lookahead = Lookahead::compute(grammar);
        let terminals = grammar.terminals();
        let non_terminals = grammar.non_terminals();
        let goto_columns: FxHashMap<Symbol, usize> =
            non_terminals.iter().enumerate().map(|(i, s)| (*s, i)).collect();

        let mut emitter = Emitter {
            policy,
            width: terminals.len(),
            columns: terminals.iter().enumerate().map(|(i, s)| (*s, i)).collect(),
            actions: vec![None; states.len() * terminals.len()],
            conflicts: Vec::new(),
            grammar,
        };
        let mut gotos = vec![None; states.len() * non_terminals.len()];

        for state in &states {
            for (notation, target) in &state.transitions {
                match *notation {
                    Notation::Terminal(t) => emitter.put(state.index, t, Action::Shift(*target))?,
                    Notation::NonTerminal(key) => {
                        if let Some(column) = goto_columns.get(&key) {
                            gotos[state.index * non_terminals.len() + column] = Some(*target);
                        }
                    }
                }
            }
            let mut accepts = false;
            for item in &state.items {
                let Some(production) = grammar.production(item.production) else {
                    continue;
                };
                if item.dot != production.sequence.len() {
                    continue;
                }
                let Some(key) = production.key else {
                    accepts = true;
                    continue;
                };
                let mut follow: Vec<Symbol> = lookahead
                    .follow(key)
                    .map(|set| set.iter().copied().collect())
                    .unwrap_or_default();
                follow.sort_by(|a, b| grammar.name(*a).cmp(grammar.name(*b)));
                for terminal in follow {
                    emitter.put(state.index, terminal, Action::Reduce(production.index))?;
                }
            }
            if accepts {
                emitter.put(state.index, grammar.eof(), Action::Accept)?;
            }
        }

        info!(
            states = states.len(),
            conflicts = emitter.conflicts.len(),
            "syntax table built"
        );
        let terminals: Vec<String> = terminals.iter().map(|s| grammar.name(*s).to_owned()).collect();
        let non_terminals: Vec<String> = non_terminals
            .iter()
            .map(|s| grammar.name(*s).to_owned())
            .collect();
        Ok(Self::assemble(
            terminals,
            non_terminals,
            emitter.actions,
            gotos,
            states.len(),
            emitter.conflicts,
        ))
    }

    fn assemble(
        terminals: Vec<String>,
        non_terminals: Vec<String>,
        actions: Vec<Option<Action>>,
        gotos: Vec<Option<usize>>,
        state_count: usize,
        conflicts: Vec<Conflict>,
    ) -> Self {
        let terminal_columns = terminals.iter().cloned().enumerate().map(|(i, s)| (s, i)).collect();
        let non_terminal_columns = non_terminals
            .iter()
            .cloned()
            .enumerate()
            .map(|(i, s)| (s, i))
            .collect();
        Self {
            terminals,
            non_terminals,
            terminal_columns,
            non_terminal_columns,
            actions,
            gotos,
            state_count,
            conflicts,
        }
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.state_count
    }

    /// Action column names in column order.
    pub fn terminals(&self) -> &[String] {
        &self.terminals
    }

    /// Goto column names in column order.
    pub fn non_terminals(&self) -> &[String] {
        &self.non_terminals
    }

    /// Conflicts kept during the build.
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// ACTION cell. Unknown terminals have no action.
    pub fn action(&self, state: usize, terminal: &str) -> Option<Action> {
        let column = self.terminal_columns.get(terminal)?;
        self.actions
            .get(state * self.terminals.len() + column)
            .copied()
            .flatten()
    }

    /// GOTO cell.
    pub fn goto(&self, state: usize, non_terminal: &str) -> Option<usize> {
        let column = self.non_terminal_columns.get(non_terminal)?;
        self.gotos
            .get(state * self.non_terminals.len() + column)
            .copied()
            .flatten()
    }

    /// Terminals with an action in `state`, in column order.
    pub fn expected(&self, state: usize) -> Vec<&str> {
        let width = self.terminals.len();
        let start = state * width;
        self.actions
            .get(start..start + width)
            .into_iter()
            .flatten()
            .zip(&self.terminals)
            .filter(|(action, _)| action.is_some())
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// Reads a table printed by the `Display` impl.
    pub fn read(text: &str) -> Result<Self, GrammarBuildError> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        let (_, head) = lines.next().ok_or(GrammarBuildError::TableFormat {
            line: 1,
            message: "table text is empty".into(),
        })?;
        let head: Vec<&str> = head.split_whitespace().collect();
        let terminal_count: usize = head
            .first()
            .and_then(|n| n.parse().ok())
            .filter(|n| *n < head.len())
            .ok_or_else(|| GrammarBuildError::TableFormat {
                line: 1,
                message: "head must start with the terminal count".into(),
            })?;
        let terminals: Vec<String> = head[1..=terminal_count].iter().map(|s| (*s).to_owned()).collect();
        let non_terminals: Vec<String> = head[terminal_count + 1..]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();

        let mut actions = Vec::new();
        let mut gotos = Vec::new();
        let mut state_count = 0;
        for (number, line) in lines {
            let format_error = |message: String| GrammarBuildError::TableFormat {
                line: number + 1,
                message,
            };
            let cells: Vec<&str> = line.split_whitespace().collect();
            if cells.len() != head.len() {
                return Err(format_error(format!(
                    "expected {} cells, found {}",
                    head.len(),
                    cells.len()
                )));
            }
            for cell in &cells[1..=terminal_count] {
                let action =
                    Action::parse(cell).ok_or_else(|| format_error(format!("unknown action '{cell}'")))?;
                actions.push(action);
            }
            for cell in &cells[terminal_count + 1..] {
                let target = match *cell {
                    "_" => None,
                    n => Some(
                        n.parse::<usize>()
                            .map_err(|_| format_error(format!("invalid goto '{n}'")))?,
                    ),
                };
                gotos.push(target);
            }
            state_count += 1;
        }
        Ok(Self::assemble(
            terminals,
            non_terminals,
            actions,
            gotos,
            state_count,
            Vec::new(),
        ))
    }
}

impl fmt::Display for SyntaxTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action_cells: Vec<String> = self
            .actions
            .iter()
            .map(|a| a.map_or_else(|| "_".to_owned(), |a| a.to_string()))
            .collect();
        let goto_cells: Vec<String> = self
            .gotos
            .iter()
            .map(|g| g.map_or_else(|| "_".to_owned(), |g| g.to_string()))
            .collect();
        let width_of = |names: &[String], cells: &[String]| {
            names
                .iter()
                .chain(cells)
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(1)
        };
        let status_width = self
            .state_count
            .to_string()
            .len()
            .max(self.terminals.len().to_string().len());
        let action_width = width_of(&self.terminals, &action_cells);
        let goto_width = width_of(&self.non_terminals, &goto_cells);

        let write_row = |f: &mut fmt::Formatter<'_>,
                         first: String,
                         actions: &[String],
                         gotos: &[String]|
         -> fmt::Result {
            write!(f, "{first:<status_width$}")?;
            for cell in actions {
                write!(f, " {cell:<action_width$}")?;
            }
            for cell in gotos {
                write!(f, " {cell:<goto_width$}")?;
            }
            Ok(())
        };

        write_row(
            f,
            self.terminals.len().to_string(),
            &self.terminals,
            &self.non_terminals,
        )?;
        let terminal_width = self.terminals.len();
        let goto_row_width = self.non_terminals.len();
        for state in 0..self.state_count {
            writeln!(f)?;
            write_row(
                f,
                state.to_string(),
                &action_cells[state * terminal_width..(state + 1) * terminal_width],
                &goto_cells[state * goto_row_width..(state + 1) * goto_row_width],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPRESSIONS: &str = "E -> E + T\nE -> T\nT -> T * F\nT -> F\nF -> ( E )\nF -> id";

    const EXPRESSION_TABLE: &str = "\
6 ( ) * + id ∑ E F T
0 s4 _ _ _ s5 _ 1 3 2
1 _ _ _ s6 _ acc _ _ _
2 _ r2 s7 r2 _ r2 _ _ _
3 _ r4 r4 r4 _ r4 _ _ _
4 s4 _ _ _ s5 _ 8 3 2
5 _ r6 r6 r6 _ r6 _ _ _
6 s4 _ _ _ s5 _ _ 3 9
7 s4 _ _ _ s5 _ _ 10 _
8 _ s11 _ s6 _ _ _ _ _
9 _ r1 s7 r1 _ r1 _ _ _
10 _ r3 r3 r3 _ r3 _ _ _
11 _ r5 r5 r5 _ r5 _ _ _";

    fn squeeze(text: &str) -> String {
        text.lines()
            .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn first_and_follow_of_expression_grammar() {
        let grammar = Grammar::parse(EXPRESSIONS).expect("grammar");
        let sets = Lookahead::compute(&grammar);
        for key in ["E", "T", "F"] {
            assert_eq!(sets.first_names(&grammar, key), ["(", "id"]);
        }
        assert_eq!(sets.follow_names(&grammar, "E"), [")", "+", "∑"]);
        assert_eq!(sets.follow_names(&grammar, "T"), [")", "*", "+", "∑"]);
        assert_eq!(sets.follow_names(&grammar, "F"), [")", "*", "+", "∑"]);
    }

    #[test]
    fn nullable_productions_carry_epsilon() {
        let grammar = Grammar::parse("S -> A b\nA ->\nA -> a").expect("grammar");
        let sets = Lookahead::compute(&grammar);
        assert_eq!(sets.first_names(&grammar, "A"), ["a", "ε"]);
        assert_eq!(sets.first_names(&grammar, "S"), ["a", "b"]);
        assert_eq!(sets.follow_names(&grammar, "A"), ["b"]);
    }

    #[test]
    fn expression_table_matches_reference() {
        let grammar = Grammar::parse(EXPRESSIONS).expect("grammar");
        let table = SyntaxTable::build(&grammar, &ConflictPolicy::Strict).expect("table");
        assert_eq!(table.state_count(), 12);
        assert_eq!(squeeze(&table.to_string()), EXPRESSION_TABLE);
        assert_eq!(table.action(1, "∑"), Some(Action::Accept));
        assert_eq!(table.goto(7, "F"), Some(10));
        assert_eq!(table.expected(8), [")", "+"]);
    }

    #[test]
    fn printed_table_is_aligned_and_reads_back() {
        let grammar = Grammar::parse(EXPRESSIONS).expect("grammar");
        let table = SyntaxTable::build(&grammar, &ConflictPolicy::Strict).expect("table");
        let text = table.to_string();
        assert!(text.starts_with("6  (   )   *   +   id  ∑   E  F  T "));
        assert_eq!(SyntaxTable::read(&text).expect("read"), table);
        assert_eq!(SyntaxTable::read(EXPRESSION_TABLE).expect("read"), table);
    }

    #[test]
    fn shift_reduce_conflict_keeps_shift() {
        let grammar = Grammar::parse("S -> i S\nS -> i S e S\nS -> x").expect("grammar");
        let err = SyntaxTable::build(&grammar, &ConflictPolicy::Strict).unwrap_err();
        assert_eq!(
            err,
            GrammarBuildError::Conflict {
                state: 4,
                lookahead: "e".into(),
                existing: "s5".into(),
                incoming: "r1".into(),
            }
        );

        let first = SyntaxTable::build(&grammar, &ConflictPolicy::KeepFirst).expect("table");
        let second = SyntaxTable::build(&grammar, &ConflictPolicy::KeepFirst).expect("table");
        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(first.action(4, "e"), Some(Action::Shift(5)));
        assert_eq!(first.action(4, "∑"), Some(Action::Reduce(1)));
        assert_eq!(
            first.conflicts(),
            [Conflict {
                state: 4,
                lookahead: "e".into(),
                kept: Action::Shift(5),
                discarded: Action::Reduce(1),
            }]
        );

        let listed = ConflictPolicy::AllowListed(vec![AllowedConflict {
            kept: ActionKind::Shift,
            discarded: ActionKind::Reduce(1),
        }]);
        assert_eq!(SyntaxTable::build(&grammar, &listed).expect("table"), first);
    }

    #[test]
    fn read_rejects_garbage() {
        assert!(SyntaxTable::read("").is_err());
        assert!(matches!(
            SyntaxTable::read("1 a\n0 q1").unwrap_err(),
            GrammarBuildError::TableFormat { line: 2, .. }
        ));
        assert!(SyntaxTable::read("1 a B\n0 s1").is_err());
    }
}
