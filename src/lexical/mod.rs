//! Lexical analysis: query text to a token stream with character spans.
//!
//! Scanning never fails. Problems such as an unterminated quote or a stray
//! symbol are reported as warnings and the scanner keeps going, so every input
//! yields a best-effort token list.

#![forbid(unsafe_code)]

mod symbols;

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::diagnostics::{AnalysisResult, CodedError, ErrorCollector, Span};
use crate::options::LexicalOptions;

/// How a string token was written in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrKind {
    /// Bare word without quotes.
    Restricted,
    /// `'single quoted'`.
    Apostrophe,
    /// `"double quoted"`.
    DoubleQuotes,
    /// `` `backticked` ``, matched exactly by the semantic layer.
    Backticks,
}

impl StrKind {
    /// Quote character used when rendering, if any.
    pub fn quote(self) -> Option<char> {
        match self {
            StrKind::Restricted => None,
            StrKind::Apostrophe => Some('\''),
            StrKind::DoubleQuotes => Some('"'),
            StrKind::Backticks => Some('`'),
        }
    }
}

/// A lexical token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "t", content = "v")]
pub enum Token {
    /// A run of whitespace.
    Space,
    /// A registered one- or two-character symbol.
    Symbol(&'static str),
    /// A bare or quoted string with escapes resolved.
    CharString {
        /// Quoting style.
        kind: StrKind,
        /// Unescaped value.
        value: String,
    },
}

impl Token {
    /// Builds a string token.
    pub fn string(kind: StrKind, value: impl Into<String>) -> Self {
        Token::CharString {
            kind,
            value: value.into(),
        }
    }

    /// Grammar terminal this token feeds the parser as. Spaces have none.
    pub fn notation(&self) -> Option<&'static str> {
        match self {
            Token::Space => None,
            Token::Symbol(symbol) => Some(*symbol),
            Token::CharString { .. } => Some("str"),
        }
    }

    /// Renders the token back to query text that scans to the same token.
    pub fn render(&self) -> String {
        match self {
            Token::Space => " ".to_owned(),
            Token::Symbol(symbol) => (*symbol).to_owned(),
            Token::CharString { kind, value } => match kind.quote() {
                None => value.clone(),
                Some(quote) => quote_string(value, quote),
            },
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Wraps `value` in `quote`, escaping what the scanner would otherwise misread.
pub(crate) fn quote_string(value: &str, quote: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// A token paired with the character range it was scanned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LexicalItem {
    /// Scanned token.
    pub token: Token,
    /// Source range.
    pub span: Span,
}

impl LexicalItem {
    /// Pairs a token with `[begin, end)`.
    pub fn new(token: Token, begin: usize, end: usize) -> Self {
        Self {
            token,
            span: Span::new(begin, end),
        }
    }
}

/// Lexical warnings. The scanner never produces errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexicalError {
    /// `\c` where `c` has no escape meaning; the character is kept.
    #[error("character '{ch}' does not need to be escaped")]
    NormalCharacterEscaped {
        /// The escaped character.
        ch: char,
        /// Offset of the escaped character.
        offset: usize,
    },
    /// A backslash was the last character of the input.
    #[error("expected an escaped character but reached the end of input")]
    ExpectEscapedCharacterButEof {
        /// Offset where the character was expected.
        offset: usize,
    },
    /// A quoted string was never closed.
    #[error("expected closing quote {quote} but reached the end of input")]
    ExpectQuoteButEof {
        /// Missing closing quote.
        quote: char,
        /// Length of the input.
        offset: usize,
    },
    /// A character that cannot start any token was skipped.
    #[error("useless symbol '{ch}' was ignored")]
    UselessSymbol {
        /// Skipped character.
        ch: char,
        /// Offset of the character.
        offset: usize,
    },
}

impl CodedError for LexicalError {
    fn code(&self) -> u32 {
        match self {
            LexicalError::NormalCharacterEscaped { .. } => 1001,
            LexicalError::ExpectEscapedCharacterButEof { .. } => 1002,
            LexicalError::ExpectQuoteButEof { .. } => 1003,
            LexicalError::UselessSymbol { .. } => 1004,
        }
    }

    fn span(&self) -> Span {
        match self {
            LexicalError::NormalCharacterEscaped { offset, .. }
            | LexicalError::ExpectEscapedCharacterButEof { offset }
            | LexicalError::ExpectQuoteButEof { offset, .. }
            | LexicalError::UselessSymbol { offset, .. } => Span::at(*offset),
        }
    }

    fn payload(&self) -> Value {
        match self {
            LexicalError::NormalCharacterEscaped { ch, .. }
            | LexicalError::UselessSymbol { ch, .. } => json!({ "char": ch.to_string() }),
            LexicalError::ExpectQuoteButEof { quote, .. } => json!({ "quote": quote.to_string() }),
            LexicalError::ExpectEscapedCharacterButEof { .. } => Value::Null,
        }
    }
}

/// Scans `text` into tokens. The result is always present.
pub fn analyze(text: &str, options: &LexicalOptions) -> AnalysisResult<Vec<LexicalItem>, LexicalError> {
    Scanner::new(text, *options).run()
}

struct Scanner {
    chars: Vec<char>,
    options: LexicalOptions,
    collector: ErrorCollector<LexicalError>,
}

impl Scanner {
    fn new(text: &str, options: LexicalOptions) -> Self {
        Self {
            chars: text.chars().collect(),
            options,
            collector: ErrorCollector::new(),
        }
    }

    fn run(mut self) -> AnalysisResult<Vec<LexicalItem>, LexicalError> {
        let mut items = Vec::new();
        let mut index = 0;
        while index < self.chars.len() {
            let scanned = match self.space(index) {
                Some(found) => Some(found),
                None => match self.symbol(index) {
                    Some(found) => Some(found),
                    None => match self.quoted(index) {
                        Some(found) => Some(found),
                        None => self.restricted(index),
                    },
                },
            };
            match scanned {
                Some((token, end)) => {
                    items.push(LexicalItem::new(token, index, end));
                    index = end;
                }
                None => {
                    self.collector.warning(LexicalError::UselessSymbol {
                        ch: self.chars[index],
                        offset: index,
                    });
                    index += 1;
                }
            }
        }
        self.collector.finish(Some(items))
    }

    /// Character at `index` after optional full-width reflection.
    fn reflected(&self, index: usize) -> Option<char> {
        let c = *self.chars.get(index)?;
        if self.options.chinese_symbol_reflect {
            Some(symbols::reflect(c).unwrap_or(c))
        } else {
            Some(c)
        }
    }

    fn space(&self, index: usize) -> Option<(Token, usize)> {
        let mut end = index;
        while end < self.chars.len() && symbols::is_space(self.chars[end]) {
            end += 1;
        }
        (end > index).then_some((Token::Space, end))
    }

    fn symbol(&self, index: usize) -> Option<(Token, usize)> {
        let first = self.reflected(index)?;
        let single = symbols::single_symbol(first)?;
        if let Some(second) = self.reflected(index + 1) {
            if let Some(double) = symbols::double_symbol(first, second) {
                return Some((Token::Symbol(double), index + 2));
            }
        }
        Some((Token::Symbol(single), index + 1))
    }

    fn quoted(&mut self, index: usize) -> Option<(Token, usize)> {
        let (kind, close) =
            symbols::string_bound(self.chars[index], self.options.chinese_symbol_reflect)?;
        let mut value = String::new();
        let mut cursor = index + 1;
        loop {
            let Some(&c) = self.chars.get(cursor) else {
                self.collector.warning(LexicalError::ExpectQuoteButEof {
                    quote: close,
                    offset: self.chars.len(),
                });
                return Some((Token::string(kind, value), cursor));
            };
            if c == close {
                return Some((Token::string(kind, value), cursor + 1));
            }
            if c == '\\' {
                cursor += 1;
                match self.chars.get(cursor) {
                    None => {
                        self.collector
                            .warning(LexicalError::ExpectEscapedCharacterButEof { offset: cursor });
                        return Some((Token::string(kind, value), cursor));
                    }
                    Some(&escaped) => match symbols::escape(escaped) {
                        Some(resolved) => value.push(resolved),
                        None if escaped == close => value.push(escaped),
                        None => {
                            self.collector.warning(LexicalError::NormalCharacterEscaped {
                                ch: escaped,
                                offset: cursor,
                            });
                            value.push(escaped);
                        }
                    },
                }
            } else {
                value.push(c);
            }
            cursor += 1;
        }
    }

    fn restricted(&self, index: usize) -> Option<(Token, usize)> {
        let first = self.chars[index];
        if symbols::restricted_start_disabled(first) {
            return None;
        }
        let mut value = String::new();
        let mut end = index;
        while let Some(c) = self.chars.get(end).copied() {
            let reflected = self.reflected(end).unwrap_or(c);
            if symbols::is_space(c)
                || symbols::restricted_disabled(c)
                || symbols::restricted_disabled(reflected)
            {
                break;
            }
            if c == '_' && self.options.translate_underscore_to_space {
                value.push(' ');
            } else {
                value.push(c);
            }
            end += 1;
        }
        (end > index).then(|| (Token::string(StrKind::Restricted, value), end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(text: &str) -> AnalysisResult<Vec<LexicalItem>, LexicalError> {
        analyze(text, &LexicalOptions::default())
    }

    fn tokens(text: &str) -> Vec<Token> {
        scan(text)
            .result
            .expect("scanner always yields tokens")
            .into_iter()
            .map(|item| item.token)
            .collect()
    }

    #[test]
    fn unknown_escape_is_kept_with_warning() {
        let result = scan(r#""abc\qdef""#);
        let items = result.result.expect("tokens");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].token, Token::string(StrKind::DoubleQuotes, "abcqdef"));
        assert_eq!(items[0].span, Span::new(0, 10));
        assert_eq!(
            result.warnings,
            vec![LexicalError::NormalCharacterEscaped { ch: 'q', offset: 5 }]
        );
        assert_eq!(result.warnings[0].code(), 1001);
    }

    #[test]
    fn filter_expression_tokens() {
        assert_eq!(
            tokens("score>=4 -tag:nsfw"),
            vec![
                Token::string(StrKind::Restricted, "score"),
                Token::Symbol(">="),
                Token::string(StrKind::Restricted, "4"),
                Token::Space,
                Token::Symbol("-"),
                Token::string(StrKind::Restricted, "tag"),
                Token::Symbol(":"),
                Token::string(StrKind::Restricted, "nsfw"),
            ]
        );
    }

    #[test]
    fn restricted_strings_keep_middle_symbols() {
        assert_eq!(
            tokens("a-b_c!d.e"),
            vec![
                Token::string(StrKind::Restricted, "a-b_c!d"),
                Token::Symbol("."),
                Token::string(StrKind::Restricted, "e"),
            ]
        );
    }

    #[test]
    fn underscore_translation() {
        let options = LexicalOptions {
            translate_underscore_to_space: true,
            ..LexicalOptions::default()
        };
        let result = analyze("hello_world", &options);
        assert_eq!(
            result.result.expect("tokens")[0].token,
            Token::string(StrKind::Restricted, "hello world")
        );
    }

    #[test]
    fn unterminated_quote_ends_at_eof() {
        let result = scan("'abc");
        assert_eq!(
            result.result.expect("tokens")[0],
            LexicalItem::new(Token::string(StrKind::Apostrophe, "abc"), 0, 4)
        );
        assert_eq!(
            result.warnings,
            vec![LexicalError::ExpectQuoteButEof { quote: '\'', offset: 4 }]
        );
    }

    #[test]
    fn backslash_at_eof() {
        let result = scan("`ab\\");
        assert_eq!(
            result.warnings,
            vec![LexicalError::ExpectEscapedCharacterButEof { offset: 4 }]
        );
        assert_eq!(
            result.result.expect("tokens")[0].token,
            Token::string(StrKind::Backticks, "ab")
        );
    }

    #[test]
    fn useless_symbols_are_skipped() {
        let result = scan("a = b");
        assert_eq!(
            result.warnings,
            vec![LexicalError::UselessSymbol { ch: '=', offset: 2 }]
        );
        assert_eq!(result.result.expect("tokens").len(), 4);
    }

    #[test]
    fn fullwidth_symbols_reflect_when_enabled() {
        let options = LexicalOptions {
            chinese_symbol_reflect: true,
            ..LexicalOptions::default()
        };
        let items: Vec<Token> = analyze("标签：“值”～+", &options)
            .result
            .expect("tokens")
            .into_iter()
            .map(|item| item.token)
            .collect();
        assert_eq!(
            items,
            vec![
                Token::string(StrKind::Restricted, "标签"),
                Token::Symbol(":"),
                Token::string(StrKind::DoubleQuotes, "值"),
                Token::Symbol("~+"),
            ]
        );
        let plain = tokens("标签：x");
        assert_eq!(plain, vec![Token::string(StrKind::Restricted, "标签：x")]);
    }

    #[test]
    fn offsets_count_characters() {
        let items = scan("标签 x").result.expect("tokens");
        assert_eq!(items[2].span, Span::new(3, 4));
    }

    #[test]
    fn quoted_render_escapes() {
        let token = Token::string(StrKind::DoubleQuotes, "a\"b\\c\n");
        assert_eq!(token.render(), r#""a\"b\\c\n""#);
        assert_eq!(tokens(&token.render()), vec![token]);
    }
}
