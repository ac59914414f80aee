//! Hierarchical article codes (`FIGURA.GAMBO.SIZE`).
//!
//! Codes arrive typed by hand, pasted from PDFs or re-keyed from voice orders,
//! so separators and casing are unreliable. Everything is normalised to
//! upper-case segments joined by `.` before comparison.

use serde::{Deserialize, Serialize};

use depot_core::ValueObject;

/// A parsed, normalised article code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleCode {
    normalized: String,
    figura: String,
    gambo: Option<String>,
    size: Option<String>,
}

impl ValueObject for ArticleCode {}

fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '.' | '-' | '_' | '/' | ',')
}

/// Upper-case `raw` and collapse every separator run into a single `.`.
pub fn normalize_code(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    let mut pending_separator = false;

    for ch in raw.trim().chars() {
        if is_separator(ch) {
            pending_separator = !normalized.is_empty();
            continue;
        }
        if pending_separator {
            normalized.push('.');
            pending_separator = false;
        }
        normalized.extend(ch.to_uppercase());
    }

    normalized
}

/// Split `H129FSQ104023` into (`H129FSQ`, `104`, `023`).
///
/// Only applies when the segment ends in exactly six digits preceded by a letter.
fn split_compact(segment: &str) -> Option<(&str, &str, &str)> {
    let digits_start = segment
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;

    let (head, tail) = segment.split_at(digits_start);
    if tail.len() != 6 || !head.chars().last().is_some_and(char::is_alphabetic) {
        return None;
    }
    Some((head, &tail[..3], &tail[3..]))
}

impl ArticleCode {
    /// Parse a free-form code. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_code(raw);
        if normalized.is_empty() {
            return None;
        }

        let mut segments = normalized.split('.');
        let figura = segments.next()?.to_string();
        let gambo = segments.next().map(str::to_string);
        let rest: Vec<&str> = segments.collect();
        let size = (!rest.is_empty()).then(|| rest.join("."));

        if gambo.is_none() {
            if let Some((f, g, s)) = split_compact(&figura) {
                return Some(Self {
                    normalized: format!("{f}.{g}.{s}"),
                    figura: f.to_string(),
                    gambo: Some(g.to_string()),
                    size: Some(s.to_string()),
                });
            }
        }

        Some(Self {
            normalized,
            figura,
            gambo,
            size,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Shape family segment.
    pub fn figura(&self) -> &str {
        &self.figura
    }

    /// Stem / variant segment.
    pub fn gambo(&self) -> Option<&str> {
        self.gambo.as_deref()
    }

    /// Package-size suffix.
    pub fn size(&self) -> Option<&str> {
        self.size.as_deref()
    }

    /// `FIGURA.GAMBO` (or just the figura): the physical part regardless of pack.
    pub fn family(&self) -> String {
        match &self.gambo {
            Some(gambo) => format!("{}.{}", self.figura, gambo),
            None => self.figura.clone(),
        }
    }

    pub fn same_figura(&self, other: &ArticleCode) -> bool {
        self.figura == other.figura
    }

    pub fn same_family(&self, other: &ArticleCode) -> bool {
        self.figura == other.figura && self.gambo.is_some() && self.gambo == other.gambo
    }
}

impl core::fmt::Display for ArticleCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_three_segments() {
        let code = ArticleCode::parse("H129FSQ.104.023").unwrap();
        assert_eq!(code.figura(), "H129FSQ");
        assert_eq!(code.gambo(), Some("104"));
        assert_eq!(code.size(), Some("023"));
        assert_eq!(code.family(), "H129FSQ.104");
    }

    #[test]
    fn normalizes_case_and_separators() {
        let code = ArticleCode::parse("  h129fsq - 104 / 023 ").unwrap();
        assert_eq!(code.as_str(), "H129FSQ.104.023");
        assert_eq!(normalize_code("..801--314__014.."), "801.314.014");
    }

    #[test]
    fn splits_compact_codes() {
        let code = ArticleCode::parse("h129fsq104023").unwrap();
        assert_eq!(code.as_str(), "H129FSQ.104.023");
        assert_eq!(code.gambo(), Some("104"));
    }

    #[test]
    fn does_not_split_short_or_numeric_codes() {
        let code = ArticleCode::parse("H129FSQ10402").unwrap();
        assert_eq!(code.figura(), "H129FSQ10402");
        assert!(code.gambo().is_none());

        let numeric = ArticleCode::parse("801314014").unwrap();
        assert_eq!(numeric.figura(), "801314014");
    }

    #[test]
    fn extra_segments_stay_in_size() {
        let code = ArticleCode::parse("6830.314.016.A").unwrap();
        assert_eq!(code.size(), Some("016.A"));
    }

    #[test]
    fn blank_code_is_none() {
        assert!(ArticleCode::parse("  -- ").is_none());
        assert!(ArticleCode::parse("").is_none());
    }

    #[test]
    fn family_comparison_requires_gambo() {
        let a = ArticleCode::parse("H1").unwrap();
        let b = ArticleCode::parse("H1").unwrap();
        assert!(a.same_figura(&b));
        assert!(!a.same_family(&b));
    }
}
