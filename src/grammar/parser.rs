//! Table-driven shift/reduce driver.

use tracing::debug;

use crate::diagnostics::{AnalysisResult, ErrorCollector, Span};
use crate::lexical::{LexicalItem, Token};

use super::ast::SemanticRoot;
use super::definition::{Grammar, EOF};
use super::errors::GrammarError;
use super::rules::{string_node, Mark, Node, RuleArgs, RuleContext, RuleTable};
use super::table::{Action, SyntaxTable};

/// One parser input: a real token or the end marker.
struct Input<'t> {
    notation: &'static str,
    item: Option<&'t LexicalItem>,
    span: Span,
}

/// Drops spaces and appends the end marker after the last scanned character.
fn prepare(tokens: &[LexicalItem]) -> Vec<Input<'_>> {
    let end = tokens.last().map_or(0, |item| item.span.end);
    tokens
        .iter()
        .filter_map(|item| {
            item.token.notation().map(|notation| Input {
                notation,
                item: Some(item),
                span: item.span,
            })
        })
        .chain(std::iter::once(Input {
            notation: EOF,
            item: None,
            span: Span::new(end, end + 1),
        }))
        .collect()
}

fn shifted_node(input: &Input<'_>) -> Option<Node> {
    match &input.item?.token {
        Token::Symbol(symbol) => Some(Node::Symbol(Mark {
            symbol: *symbol,
            span: input.span,
        })),
        Token::CharString { kind, value } => Some(string_node(*kind, value.clone(), input.span)),
        Token::Space => None,
    }
}

/// Parses `tokens`. An input without any real token yields no tree and no error.
pub(crate) fn parse(
    grammar: &Grammar,
    table: &SyntaxTable,
    rules: &RuleTable,
    tokens: &[LexicalItem],
) -> AnalysisResult<SemanticRoot, GrammarError> {
    let mut collector = ErrorCollector::new();
    let input = prepare(tokens);
    if input.len() <= 1 {
        return collector.finish(None);
    }

    let mut states: Vec<usize> = vec![0];
    let mut nodes: Vec<Node> = Vec::new();
    let mut cursor = 0;
    loop {
        let current = &input[cursor];
        let state = states.last().copied().unwrap_or(0);
        match table.action(state, current.notation) {
            Some(Action::Shift(next)) => {
                if let Some(node) = shifted_node(current) {
                    nodes.push(node);
                }
                states.push(next);
                cursor += 1;
            }
            Some(Action::Reduce(index)) => {
                let (Some(production), Some(rule)) = (grammar.production(index), rules.get(index))
                else {
                    collector.error(GrammarError::RuleMismatch {
                        production: format!("#{index}"),
                        found: "unbound production",
                        span: current.span,
                    });
                    return collector.finish(None);
                };
                let arity = production.sequence.len();
                let children = nodes.split_off(nodes.len().saturating_sub(arity));
                states.truncate(states.len().saturating_sub(arity));
                let span = children
                    .iter()
                    .map(Node::span)
                    .reduce(Span::join)
                    .unwrap_or(Span::new(current.span.begin, current.span.begin));

                let mut children: Vec<Option<Node>> = children.into_iter().map(Some).collect();
                let selected: Vec<Node> = rule
                    .arguments
                    .iter()
                    .filter_map(|&i| children.get_mut(i).and_then(Option::take))
                    .collect();
                let mut args = RuleArgs::new(selected, &rule.text, span);
                let mut context = RuleContext::new(span, &mut collector);
                let built = (rule.build)(&mut args, &mut context);
                let node = match built {
                    Ok(node) => node,
                    Err(err) => {
                        collector.error(err);
                        return collector.finish(None);
                    }
                };

                let key = production.key.map(|k| grammar.name(k)).unwrap_or_default();
                let top = states.last().copied().unwrap_or(0);
                let Some(target) = table.goto(top, key) else {
                    collector.error(GrammarError::RuleMismatch {
                        production: rule.text.clone(),
                        found: "missing goto",
                        span,
                    });
                    return collector.finish(None);
                };
                nodes.push(node);
                states.push(target);
            }
            Some(Action::Accept) => {
                let root = nodes.pop().and_then(Node::into_root);
                return collector.finish(root);
            }
            None => {
                let expected: Vec<String> = table
                    .expected(state)
                    .into_iter()
                    .map(str::to_owned)
                    .collect();
                match current.item {
                    Some(item) => collector.error(GrammarError::UnexpectedToken {
                        token: item.token.render(),
                        expected,
                        span: current.span,
                    }),
                    None => collector.error(GrammarError::UnexpectedEof {
                        expected,
                        offset: current.span.begin,
                    }),
                }
                states.clear();
                states.push(0);
                nodes.clear();
                let resumed = loop {
                    cursor += 1;
                    let Some(next) = input.get(cursor) else {
                        break false;
                    };
                    if matches!(table.action(0, next.notation), Some(Action::Shift(_))) {
                        break true;
                    }
                };
                debug!(resumed, cursor, "parser recovered from syntax error");
                if !resumed {
                    return collector.finish(None);
                }
            }
        }
    }
}
