#![allow(missing_docs)]

use tagql::grammar::ast::{Predicative, SequenceBody};
use tagql::grammar::table::Action;
use tagql::grammar::{ConflictPolicy, Grammar, GrammarBuildError, GrammarError, QueryGrammar, SyntaxTable};
use tagql::lexical;
use tagql::{CodedError, LexicalOptions, Span};

fn tokens(text: &str) -> Vec<lexical::LexicalItem> {
    lexical::analyze(text, &LexicalOptions::default())
        .result
        .expect("tokens")
}

#[test]
fn builtin_table_prints_and_reads_back() {
    let grammar = QueryGrammar::shared().expect("grammar");
    let table = grammar.table();
    assert_eq!(table.state_count(), 79);
    let text = table.to_string();
    assert_eq!(&SyntaxTable::read(&text).expect("read"), table);
}

#[test]
fn builtin_conflicts_keep_the_string_reduction() {
    let grammar = QueryGrammar::shared().expect("grammar");
    let kept = grammar
        .grammar()
        .find_production("STRING -> str")
        .expect("production");
    let discarded = grammar
        .grammar()
        .find_production("SORT_ITEM -> str")
        .expect("production");
    let conflicts = grammar.table().conflicts();
    assert!(!conflicts.is_empty());
    for conflict in conflicts {
        assert_eq!(conflict.kept, Action::Reduce(kept));
        assert_eq!(conflict.discarded, Action::Reduce(discarded));
    }
}

#[test]
fn rebuilt_table_matches_shared_instance() {
    let rebuilt = QueryGrammar::build().expect("grammar");
    let shared = QueryGrammar::shared().expect("grammar");
    assert_eq!(rebuilt.table(), shared.table());
    assert_eq!(
        rebuilt.grammar().productions().len(),
        shared.grammar().productions().len()
    );
}

#[test]
fn every_builtin_production_renders_back() {
    let grammar = Grammar::builtin().expect("grammar");
    for index in 1..grammar.productions().len() {
        let text = grammar.production_text(index).expect("text");
        assert_eq!(grammar.find_production(&text), Some(index), "{text}");
    }
}

#[test]
fn custom_grammar_with_keep_first() {
    let grammar = Grammar::parse("S -> i S\nS -> i S e S\nS -> x").expect("grammar");
    assert!(matches!(
        SyntaxTable::build(&grammar, &ConflictPolicy::Strict),
        Err(GrammarBuildError::Conflict { .. })
    ));
    let table = SyntaxTable::build(&grammar, &ConflictPolicy::KeepFirst).expect("table");
    assert_eq!(table.conflicts().len(), 1);
    assert!(matches!(table.conflicts()[0].kept, Action::Shift(_)));
}

#[test]
fn parse_errors_name_expected_terminals() {
    let grammar = QueryGrammar::shared().expect("grammar");
    let result = grammar.parse(&tokens("a:]"));
    assert!(result.result.is_none());
    let error = &result.errors[0];
    assert_eq!(error.code(), 2001);
    assert_eq!(error.span(), Span::new(2, 3));
    let GrammarError::UnexpectedToken { token, expected, .. } = error else {
        panic!("unexpected token error expected, got {error:?}");
    };
    assert_eq!(token, "]");
    assert!(expected.iter().any(|t| t == "str"));

    let result = grammar.parse(&tokens("a:"));
    assert_eq!(result.errors[0].code(), 2002);
}

#[test]
fn recovery_reports_every_bad_item() {
    let grammar = QueryGrammar::shared().expect("grammar");
    let result = grammar.parse(&tokens("a:] b c:)"));
    assert!(result.result.is_none());
    assert!(result.errors.len() >= 2, "{:?}", result.errors);
    assert_eq!(result.errors[0].code(), 2001);
    assert_eq!(result.errors[1].span(), Span::new(8, 9));
}

#[test]
fn spans_follow_character_offsets() {
    let grammar = QueryGrammar::shared().expect("grammar");
    let root = grammar
        .parse(&tokens("風景:{春, 夏} -sort:^id"))
        .result
        .expect("tree");
    assert_eq!(root.span, Span::new(0, 19));
    assert_eq!(root.items.len(), 2);
    let SequenceBody::Element(element) = &root.items[0].body else {
        panic!("element expected");
    };
    let sfp = &element.items[0];
    assert_eq!(sfp.subject.span, Span::new(0, 2));
    assert!(matches!(sfp.predicative, Some(Predicative::Col(_))));
    assert!(root.items[1].minus);
    assert_eq!(root.items[1].span, Span::new(10, 19));
}

#[test]
fn duplicated_collection_items_warn() {
    let grammar = QueryGrammar::shared().expect("grammar");
    let result = grammar.parse(&tokens("a:{x, y, x}"));
    assert!(result.result.is_some());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].code(), 2004);
}
