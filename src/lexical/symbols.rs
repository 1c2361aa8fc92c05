//! Character classes recognised by the scanner.

use super::StrKind;

/// Every punctuation character the language knows about.
const ALL_SYMBOLS: &str = "~`!@#$%^&*()-=_+[]{};:'\",./\\|?<>";

/// Resolves a one-character symbol to its interned text.
pub(crate) fn single_symbol(c: char) -> Option<&'static str> {
    let symbol = match c {
        ':' => ":",
        '>' => ">",
        '<' => "<",
        '~' => "~",
        '|' => "|",
        '/' => "/",
        '&' => "&",
        '-' => "-",
        '+' => "+",
        '@' => "@",
        '#' => "#",
        '$' => "$",
        '^' => "^",
        '.' => ".",
        ',' => ",",
        '[' => "[",
        ']' => "]",
        '(' => "(",
        ')' => ")",
        '{' => "{",
        '}' => "}",
        _ => return None,
    };
    Some(symbol)
}

/// Resolves a two-character symbol. Every double symbol starts with a single symbol.
pub(crate) fn double_symbol(first: char, second: char) -> Option<&'static str> {
    let symbol = match (first, second) {
        ('>', '=') => ">=",
        ('<', '=') => "<=",
        ('~', '-') => "~-",
        ('~', '+') => "~+",
        _ => return None,
    };
    Some(symbol)
}

/// Maps full-width punctuation to the ASCII symbol it stands for.
pub(crate) fn reflect(c: char) -> Option<char> {
    let ascii = match c {
        '：' => ':',
        '＞' => '>',
        '＜' => '<',
        '～' => '~',
        '｜' => '|',
        '／' => '/',
        '＆' => '&',
        '－' => '-',
        '＋' => '+',
        '＠' => '@',
        '＃' => '#',
        '＄' => '$',
        '＾' | '…' => '^',
        '。' => '.',
        '，' => ',',
        '【' | '［' => '[',
        '】' | '］' => ']',
        '（' => '(',
        '）' => ')',
        '｛' => '{',
        '｝' => '}',
        _ => return None,
    };
    Some(ascii)
}

pub(crate) fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\n' | '\r' | '\t')
}

/// Opening quote → (string kind, closing quote).
pub(crate) fn string_bound(c: char, reflect_fullwidth: bool) -> Option<(StrKind, char)> {
    match c {
        '\'' => Some((StrKind::Apostrophe, '\'')),
        '"' => Some((StrKind::DoubleQuotes, '"')),
        '`' => Some((StrKind::Backticks, '`')),
        '“' if reflect_fullwidth => Some((StrKind::DoubleQuotes, '”')),
        '‘' if reflect_fullwidth => Some((StrKind::Apostrophe, '’')),
        _ => None,
    }
}

/// Character produced by `\c` inside a quoted string.
pub(crate) fn escape(c: char) -> Option<char> {
    match c {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '"' => Some('"'),
        '`' => Some('`'),
        '\'' => Some('\''),
        '\\' => Some('\\'),
        _ => None,
    }
}

fn is_symbol(c: char) -> bool {
    ALL_SYMBOLS.contains(c)
}

/// A bare string may not begin with this character.
pub(crate) fn restricted_start_disabled(c: char) -> bool {
    is_symbol(c)
        && string_bound(c, false).is_none()
        && single_symbol(c).is_none()
        && !matches!(c, '_' | '?' | '*')
}

/// A bare string stops before this character.
pub(crate) fn restricted_disabled(c: char) -> bool {
    is_symbol(c) && !matches!(c, '_' | '?' | '*' | '+' | '-' | '!')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restricted_classes() {
        assert!(!restricted_start_disabled('_'));
        assert!(!restricted_start_disabled('a'));
        assert!(restricted_start_disabled('!'));
        assert!(restricted_start_disabled('='));
        assert!(!restricted_disabled('-'));
        assert!(!restricted_disabled('!'));
        assert!(restricted_disabled('.'));
        assert!(restricted_disabled(':'));
        assert!(!restricted_disabled('中'));
    }

    #[test]
    fn double_symbols_extend_singles() {
        for (a, b) in [('>', '='), ('<', '='), ('~', '-'), ('~', '+')] {
            assert!(single_symbol(a).is_some());
            assert!(double_symbol(a, b).is_some());
        }
        assert_eq!(double_symbol(':', '='), None);
    }
}
