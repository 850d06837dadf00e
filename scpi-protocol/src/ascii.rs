//! Numeric arrays transferred as separated ASCII text, e.g. `1.0,2.5,-3E-2`.
use std::{fmt::Display, sync::LazyLock};

use regex::Regex;

use crate::error::ConversionError;

/// Runs of commas and/or whitespace.
pub const DEFAULT_SEPARATOR_PATTERN: &str = r"[,\s]+";
const DEFAULT_JOIN: &str = ",";

static DEFAULT_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(DEFAULT_SEPARATOR_PATTERN).expect("default separator pattern is valid")
});

/// How values are separated in ASCII arrays.
///
/// Patterns only make sense for splitting. When writing, anything other than a
/// [`Separator::Literal`] joins values with a comma.
#[derive(Clone, Debug, Default)]
pub enum Separator {
    /// Split on [`DEFAULT_SEPARATOR_PATTERN`], join with `,`.
    #[default]
    Default,
    Literal(String),
    Pattern(Regex),
}

impl Separator {
    pub fn literal(separator: impl Into<String>) -> Separator {
        Separator::Literal(separator.into())
    }

    pub fn pattern(pattern: &str) -> Result<Separator, regex::Error> {
        Ok(Separator::Pattern(Regex::new(pattern)?))
    }

    /// Splits `text` into trimmed tokens.
    pub fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let tokens: Vec<&str> = match self {
            Separator::Default => DEFAULT_SEPARATOR.split(text).collect(),
            Separator::Literal(literal) if literal.is_empty() => vec![text],
            Separator::Literal(literal) => text.split(literal.as_str()).collect(),
            Separator::Pattern(regex) => regex.split(text).collect(),
        };
        tokens.into_iter().map(str::trim).collect()
    }

    /// The string placed between values when writing.
    pub fn join_str(&self) -> &str {
        match self {
            Separator::Literal(literal) => literal,
            Separator::Default | Separator::Pattern(_) => DEFAULT_JOIN,
        }
    }
}

/// Default token converter: decimal float, `None` for anything unparseable or NaN.
pub fn parse_float(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|value| !value.is_nan())
}

/// Splits `text` and converts every token with `convert`.
///
/// Tokens for which `convert` returns `Ok(None)` are dropped silently, so the output may
/// be shorter than the input. An `Err` aborts parsing with a [`ConversionError`] naming
/// the token.
pub fn parse_values_with<T, E, F>(
    text: &str,
    separator: &Separator,
    mut convert: F,
) -> Result<Vec<T>, ConversionError>
where
    E: Display,
    F: FnMut(&str) -> Result<Option<T>, E>,
{
    let mut values = Vec::new();
    for token in separator.split(text) {
        match convert(token) {
            Ok(Some(value)) => values.push(value),
            Ok(None) => {}
            Err(e) => {
                return Err(ConversionError {
                    token: token.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(values)
}

/// Splits `text` into floats, dropping tokens that are not numbers.
pub fn parse_values(text: &str, separator: &Separator) -> Vec<f64> {
    separator
        .split(text)
        .into_iter()
        .filter_map(parse_float)
        .collect()
}

/// Joins `values` using their [`Display`] representation.
pub fn format_values<T: Display>(values: &[T], separator: &Separator) -> String {
    format_values_with(values, separator, |value| value.to_string())
}

pub fn format_values_with<T>(
    values: &[T],
    separator: &Separator,
    format: impl FnMut(&T) -> String,
) -> String {
    values
        .iter()
        .map(format)
        .collect::<Vec<_>>()
        .join(separator.join_str())
}
