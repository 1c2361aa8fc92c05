//! Value parsers: turn a string operand into a typed [`FilterValue`].

use time::{Date, Month, OffsetDateTime};

use crate::grammar::ast::Str;

use super::errors::{CastType, SemanticError};
use super::plan::FilterValue;

/// A parsed operand that may stand for a single value or a half-open range.
#[derive(Debug, Clone, PartialEq)]
pub enum Complex {
    /// One value.
    Value(FilterValue),
    /// `[begin, end)`.
    Range(FilterValue, FilterValue),
}

fn cast_error(str: &Str, target: CastType) -> SemanticError {
    SemanticError::TypeCastError {
        value: str.value.clone(),
        target,
        span: str.span,
    }
}

/// Parsers for comparable scalar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar {
    /// Signed integer.
    Number,
    /// `a*b` or `axb`, read as the product.
    TimesNumber,
    /// Decimal or `a/b`, `a:b` ratio.
    Ratio,
    /// `{n}{unit}` with decimal (`kb`) or binary (`kib`) units, read as bytes.
    ByteSize,
    /// `{n}{unit}` with `s`, `min` or `h` style units, read as milliseconds.
    Duration,
}

impl Scalar {
    /// Parses `str` into a value of this type.
    pub fn parse(self, str: &Str) -> Result<FilterValue, SemanticError> {
        match self {
            Scalar::Number => parse_number(str).map(FilterValue::Number),
            Scalar::TimesNumber => parse_times_number(str).map(FilterValue::Number),
            Scalar::Ratio => parse_ratio(str).map(FilterValue::Float),
            Scalar::ByteSize => parse_unit(str, BYTE_UNITS).map(FilterValue::Size),
            Scalar::Duration => parse_unit(str, DURATION_UNITS).map(FilterValue::Size),
        }
    }
}

fn parse_number(str: &Str) -> Result<i64, SemanticError> {
    str.value
        .parse::<i64>()
        .map_err(|_| cast_error(str, CastType::Number))
}

fn parse_times_number(str: &Str) -> Result<i64, SemanticError> {
    let Some(at) = str.value.find(['x', 'X', '*']) else {
        return parse_number(str);
    };
    let first = str.value[..at].trim_end().parse::<i64>();
    let last = str.value[at + 1..].trim_start().parse::<i64>();
    match (first, last) {
        (Ok(a), Ok(b)) => a
            .checked_mul(b)
            .ok_or_else(|| cast_error(str, CastType::Number)),
        _ => Err(cast_error(str, CastType::Number)),
    }
}

fn parse_ratio(str: &Str) -> Result<f64, SemanticError> {
    let error = || cast_error(str, CastType::Number);
    let Some(at) = str.value.find([':', '/']) else {
        return str.value.parse::<f64>().map_err(|_| error());
    };
    let first = str.value[..at].trim_end().parse::<f64>().map_err(|_| error())?;
    let last = str.value[at + 1..].trim_start().parse::<f64>().map_err(|_| error())?;
    if last == 0.0 {
        return Err(error());
    }
    Ok(first / last)
}

const BYTE_UNITS: &[(&str, i64)] = &[
    ("b", 1),
    ("kb", 1_000),
    ("k", 1_000),
    ("mb", 1_000_000),
    ("m", 1_000_000),
    ("gb", 1_000_000_000),
    ("g", 1_000_000_000),
    ("tb", 1_000_000_000_000),
    ("t", 1_000_000_000_000),
    ("kib", 1 << 10),
    ("mib", 1 << 20),
    ("gib", 1 << 30),
    ("tib", 1 << 40),
];

const DURATION_UNITS: &[(&str, i64)] = &[
    ("s", 1_000),
    ("sec", 1_000),
    ("second", 1_000),
    ("seconds", 1_000),
    ("m", 60_000),
    ("min", 60_000),
    ("minute", 60_000),
    ("minutes", 60_000),
    ("h", 3_600_000),
    ("hour", 3_600_000),
    ("hours", 3_600_000),
];

/// Reads `{digits}{letters}` and scales the number by the unit.
fn parse_unit(str: &Str, units: &[(&str, i64)]) -> Result<i64, SemanticError> {
    let error = || cast_error(str, CastType::Size);
    let split = str
        .value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(error)?;
    let (digits, unit) = str.value.split_at(split);
    if digits.is_empty() || !unit.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(error());
    }
    let size = digits.parse::<i64>().map_err(|_| error())?;
    let unit = unit.to_ascii_lowercase();
    let scale = units
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, scale)| *scale)
        .ok_or_else(error)?;
    size.checked_mul(scale).ok_or_else(error)
}

/// Year used when a date omits it.
pub fn current_year() -> i32 {
    OffsetDateTime::now_utc().year()
}

/// Reads a date: `yyyy-MM-dd` is a day, `yyyy-MM` and `yyyy` are ranges, `MM-dd`
/// is a day and `MM` a month of `year_default`. `-`, `/` and `.` separate parts.
/// A leading part of 1000 or more is a year.
pub fn parse_date(str: &Str, year_default: i32) -> Result<Complex, SemanticError> {
    let error = || cast_error(str, CastType::Date);
    let parts = str
        .value
        .splitn(3, ['-', '/', '.'])
        .map(|p| p.parse::<i32>().map_err(|_| error()))
        .collect::<Result<Vec<i32>, _>>()?;
    let day = |y: i32, m: i32, d: i32| -> Result<Date, SemanticError> {
        let month = u8::try_from(m)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(error)?;
        let d = u8::try_from(d).map_err(|_| error())?;
        Date::from_calendar_date(y, month, d).map_err(|_| error())
    };
    let month_range = |begin: Date| -> Result<Complex, SemanticError> {
        let (year, month) = match begin.month() {
            Month::December => (begin.year() + 1, Month::January),
            m => (begin.year(), m.next()),
        };
        let end = Date::from_calendar_date(year, month, 1).map_err(|_| error())?;
        Ok(Complex::Range(FilterValue::Date(begin), FilterValue::Date(end)))
    };
    match parts.as_slice() {
        &[y, m, d] => Ok(Complex::Value(FilterValue::Date(day(y, m, d)?))),
        &[y, m] if y >= 1000 => month_range(day(y, m, 1)?),
        &[m, d] => Ok(Complex::Value(FilterValue::Date(day(year_default, m, d)?))),
        &[y] if y >= 1000 => {
            let begin = day(y, 1, 1)?;
            let end = day(y + 1, 1, 1)?;
            Ok(Complex::Range(FilterValue::Date(begin), FilterValue::Date(end)))
        }
        &[m] => month_range(day(year_default, m, 1)?),
        _ => Err(error()),
    }
}

/// Reads a date for a timestamp field. A single day becomes the range of
/// that day.
pub fn parse_datetime(str: &Str, year_default: i32) -> Result<Complex, SemanticError> {
    match parse_date(str, year_default)? {
        Complex::Value(FilterValue::Date(day)) => {
            let next = day
                .next_day()
                .ok_or_else(|| cast_error(str, CastType::Date))?;
            Ok(Complex::Range(FilterValue::Date(day), FilterValue::Date(next)))
        }
        other => Ok(other),
    }
}

/// Reads a number that may contain `*` (any digits) or `?` (one digit).
///
/// Digits followed only by `?` become a range, `12??` being `[1200, 1300)`.
/// Other patterns stay text.
pub fn parse_pattern_number(str: &Str) -> Result<Complex, SemanticError> {
    let value = str.value.as_str();
    let error = || cast_error(str, CastType::Number);
    let is_pattern = !value.is_empty()
        && value.chars().all(|c| c.is_ascii_digit() || c == '?' || c == '*')
        && value.contains(['?', '*']);
    if !is_pattern {
        return value
            .parse::<i64>()
            .map(|n| Complex::Value(FilterValue::Number(n)))
            .map_err(|_| error());
    }
    let digits = value.trim_end_matches('?');
    let suffix = value.len() - digits.len();
    if suffix > 0 && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        let prefix = digits.parse::<i64>().map_err(|_| error())?;
        let scale = u32::try_from(suffix)
            .ok()
            .and_then(|n| 10i64.checked_pow(n))
            .ok_or_else(error)?;
        let begin = prefix.checked_mul(scale).ok_or_else(error)?;
        let end = prefix
            .checked_add(1)
            .and_then(|p| p.checked_mul(scale))
            .ok_or_else(error)?;
        return Ok(Complex::Range(FilterValue::Number(begin), FilterValue::Number(end)));
    }
    Ok(Complex::Value(FilterValue::Pattern(value.to_owned())))
}

/// Enum members with their case-insensitive aliases.
#[derive(Debug)]
pub struct EnumTable {
    /// Type name reported in cast errors.
    pub type_name: &'static str,
    /// `(member, aliases)`; the member name is always an alias too.
    pub items: &'static [(&'static str, &'static [&'static str])],
}

impl EnumTable {
    /// Aliases of each member, member name first, lower-cased.
    pub fn aliases(&self) -> Vec<Vec<String>> {
        self.items
            .iter()
            .map(|(member, aliases)| {
                std::iter::once(*member)
                    .chain(aliases.iter().copied())
                    .map(str::to_lowercase)
                    .collect()
            })
            .collect()
    }

    /// Reads `str` as a member.
    pub fn parse(&self, str: &Str) -> Result<FilterValue, SemanticError> {
        let wanted = str.value.to_lowercase();
        self.items
            .iter()
            .find(|(member, aliases)| {
                member.eq_ignore_ascii_case(&wanted)
                    || aliases.iter().any(|a| a.to_lowercase() == wanted)
            })
            .map(|(member, _)| FilterValue::String((*member).to_owned()))
            .ok_or_else(|| SemanticError::EnumTypeCastError {
                value: str.value.clone(),
                type_name: self.type_name,
                expected: self.aliases().into_iter().flatten().collect(),
                span: str.span,
            })
    }
}
