//! Text normalization shared by the stores, the search index and the query
//! engine.
//!
//! Every name predicate compares against a pre-normalized column, so the
//! same [`normalize`] must be applied both when a value is written and when
//! a query is built.

use std::cmp::Ordering;

/// Uppercase with `Ё` folded to `Е`.
pub fn normalize(text: &str) -> String {
    text.to_uppercase().replace('Ё', "Е")
}

/// Split a free-text query into normalized tokens.
///
/// Separators are whitespace, commas and periods; empty tokens are dropped.
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .filter(|part| !part.is_empty())
        .map(normalize)
        .collect()
}

fn is_boundary(c: char) -> bool {
    c == ' ' || c == ',' || c == '.'
}

/// Whether `token` occurs in `haystack` delimited on both sides by a word
/// boundary: space, comma, period, or the start/end of the string.
///
/// Both arguments are expected to be normalized already.
pub fn contains_word(haystack: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(token) {
        let start = from + pos;
        let end = start + token.len();
        let before_ok = haystack[..start].chars().next_back().map_or(true, is_boundary);
        let after_ok = haystack[end..].chars().next().map_or(true, is_boundary);
        if before_ok && after_ok {
            return true;
        }
        // Advance by one character, not one byte.
        from = start + haystack[start..].chars().next().map_or(1, char::len_utf8);
    }
    false
}

/// Sort key for house numbers: leading run of ASCII digits as an integer,
/// then the remainder of the string.
///
/// Numbers without a leading digit run sort after every numbered one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    number: Option<u64>,
    suffix: String,
}

impl NaturalKey {
    pub fn new(house_number: &str) -> Self {
        let trimmed = house_number.trim();
        let digits_end = trimmed
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(trimmed.len());
        let number = if digits_end == 0 {
            None
        } else {
            Some(trimmed[..digits_end].parse::<u64>().unwrap_or(u64::MAX))
        };
        Self {
            number,
            suffix: normalize(&trimmed[digits_end..]),
        }
    }
}

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_number = match (self.number, other.number) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_number.then_with(|| self.suffix.cmp(&other.suffix))
    }
}

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort house numbers in natural order, in place.
pub fn natural_sort(numbers: &mut [String]) {
    numbers.sort_by_cached_key(|n| NaturalKey::new(n));
}

/// Compare optional strings with `None` after every present value.
pub fn cmp_nulls_last(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
