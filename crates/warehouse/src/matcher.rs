//! Tiered article matching.
//!
//! A requested identifier is compared against every lot through an ordered
//! list of strategies. Each strategy owns a score band and the bands never
//! overlap, so a candidate's score alone orders it against every other tier:
//!
//! ```text
//! exact          100
//! figura-gambo   85..=95
//! figura         60..=75
//! description    1..=50   (fallback, only when no code tier is strong)
//! ```
//!
//! Lot state is deliberately not filtered: reserved and sold lots are returned
//! so operators can see that the part exists but is taken. Within a score,
//! available quantity ranks first, then raw quantity, then lot id.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use depot_core::LotId;

use crate::article::ArticleCode;
use crate::lot::WarehouseLot;

pub const EXACT_SCORE: u8 = 100;
pub const DEFAULT_STRONG_THRESHOLD: u8 = 80;
pub const DEFAULT_DESCRIPTION_THRESHOLD: f64 = 0.3;
const DESCRIPTION_BAND: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    FiguraGambo,
    Figura,
    Description,
}

/// One ranked lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub lot: WarehouseLot,
    pub tier: MatchTier,
    pub score: u8,
    pub reason: String,
}

/// Pre-processed query shared by all strategies.
#[derive(Debug, Clone)]
pub struct MatchQuery {
    code: Option<ArticleCode>,
    description_tokens: Vec<String>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

impl MatchQuery {
    /// `None` when the query is blank.
    ///
    /// The description defaults to the raw query so free-text identifiers
    /// ("fresa diamantata") still reach the description tier.
    pub fn new(query: &str, description: Option<&str>) -> Option<Self> {
        if query.trim().is_empty() {
            return None;
        }
        let text = description.filter(|d| !d.trim().is_empty()).unwrap_or(query);
        Some(Self {
            code: ArticleCode::parse(query),
            description_tokens: tokenize(text),
        })
    }

    pub fn code(&self) -> Option<&ArticleCode> {
        self.code.as_ref()
    }

    pub fn description_tokens(&self) -> &[String] {
        &self.description_tokens
    }
}

/// Common "try-match" capability of one tier.
pub trait MatchStrategy: Send + Sync {
    fn tier(&self) -> MatchTier;

    /// Fallback strategies only run when no primary candidate is strong.
    fn is_fallback(&self) -> bool {
        false
    }

    /// Score (inside this tier's band) and a human-readable reason.
    fn try_match(&self, query: &MatchQuery, lot: &WarehouseLot) -> Option<(u8, String)>;
}

/// Normalised query code equals the lot code.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactCode;

impl MatchStrategy for ExactCode {
    fn tier(&self) -> MatchTier {
        MatchTier::Exact
    }

    fn try_match(&self, query: &MatchQuery, lot: &WarehouseLot) -> Option<(u8, String)> {
        let wanted = query.code()?;
        let code = ArticleCode::parse(lot.article_code())?;
        (wanted.as_str() == code.as_str()).then(|| (EXACT_SCORE, format!("exact code {code}")))
    }
}

/// Same figura and gambo, different (or missing) package size.
#[derive(Debug, Default, Clone, Copy)]
pub struct FiguraGambo;

impl MatchStrategy for FiguraGambo {
    fn tier(&self) -> MatchTier {
        MatchTier::FiguraGambo
    }

    fn try_match(&self, query: &MatchQuery, lot: &WarehouseLot) -> Option<(u8, String)> {
        let wanted = query.code()?;
        let code = ArticleCode::parse(lot.article_code())?;
        if !wanted.same_family(&code) || wanted.as_str() == code.as_str() {
            return None;
        }
        let score = if wanted.size().is_some() && code.size().is_some() { 90 } else { 85 };
        Some((
            score,
            format!(
                "same part {}, package {} instead of {}",
                code.family(),
                code.size().unwrap_or("-"),
                wanted.size().unwrap_or("-")
            ),
        ))
    }
}

/// Same figura (shape family) only.
#[derive(Debug, Default, Clone, Copy)]
pub struct Figura;

impl MatchStrategy for Figura {
    fn tier(&self) -> MatchTier {
        MatchTier::Figura
    }

    fn try_match(&self, query: &MatchQuery, lot: &WarehouseLot) -> Option<(u8, String)> {
        let wanted = query.code()?;
        let code = ArticleCode::parse(lot.article_code())?;
        if !wanted.same_figura(&code)
            || wanted.same_family(&code)
            || wanted.as_str() == code.as_str()
        {
            return None;
        }
        let score = if wanted.gambo().is_none() { 75 } else { 70 };
        let gambo = code.gambo().unwrap_or("-");
        Some((score, format!("same figura {}, gambo {gambo}", code.figura())))
    }
}

/// Token / substring similarity between descriptions.
#[derive(Debug, Clone, Copy)]
pub struct DescriptionSimilarity {
    threshold: f64,
}

impl Default for DescriptionSimilarity {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_DESCRIPTION_THRESHOLD,
        }
    }
}

impl DescriptionSimilarity {
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    fn tokens_match(a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        let shortest = a.chars().count().min(b.chars().count());
        shortest >= 3 && (a.starts_with(b) || b.starts_with(a))
    }

    /// Fraction of query tokens found in the lot description (0.0..=1.0).
    pub fn similarity(query_tokens: &[String], description: &str) -> f64 {
        if query_tokens.is_empty() {
            return 0.0;
        }
        let lot_tokens = tokenize(description);
        if lot_tokens.is_empty() {
            return 0.0;
        }

        let query_text = query_tokens.join(" ");
        let lot_text = lot_tokens.join(" ");
        if query_text.chars().count() >= 3 && lot_text.contains(&query_text) {
            return 1.0;
        }

        let matched = query_tokens
            .iter()
            .filter(|q| lot_tokens.iter().any(|t| Self::tokens_match(q, t)))
            .count();
        matched as f64 / query_tokens.len() as f64
    }
}

impl MatchStrategy for DescriptionSimilarity {
    fn tier(&self) -> MatchTier {
        MatchTier::Description
    }

    fn is_fallback(&self) -> bool {
        true
    }

    fn try_match(&self, query: &MatchQuery, lot: &WarehouseLot) -> Option<(u8, String)> {
        let similarity = Self::similarity(query.description_tokens(), lot.description());
        if similarity <= 0.0 || similarity < self.threshold {
            return None;
        }
        let score = (similarity * DESCRIPTION_BAND).round().clamp(1.0, DESCRIPTION_BAND) as u8;
        Some((
            score,
            format!("description similarity {:.0}%", similarity * 100.0),
        ))
    }
}

/// Ordered strategy chain.
pub struct Matcher {
    strategies: Vec<Box<dyn MatchStrategy>>,
    strong_threshold: u8,
}

impl core::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let tiers: Vec<MatchTier> = self.strategies.iter().map(|s| s.tier()).collect();
        f.debug_struct("Matcher")
            .field("strategies", &tiers)
            .field("strong_threshold", &self.strong_threshold)
            .finish()
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(vec![
            Box::new(ExactCode),
            Box::new(FiguraGambo),
            Box::new(Figura),
            Box::new(DescriptionSimilarity::default()),
        ])
    }
}

impl Matcher {
    /// Strategies are evaluated in the given order; put the most specific first.
    pub fn new(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self {
            strategies,
            strong_threshold: DEFAULT_STRONG_THRESHOLD,
        }
    }

    pub fn with_strong_threshold(mut self, threshold: u8) -> Self {
        self.strong_threshold = threshold;
        self
    }

    pub fn strong_threshold(&self) -> u8 {
        self.strong_threshold
    }

    /// Rank `lots` against `query`, best first, at most `limit` entries.
    pub fn match_article<'a>(
        &self,
        lots: impl IntoIterator<Item = &'a WarehouseLot>,
        query: &str,
        description: Option<&str>,
        limit: usize,
        exclude: &[LotId],
    ) -> Vec<MatchCandidate> {
        if limit == 0 {
            return Vec::new();
        }
        let Some(query) = MatchQuery::new(query, description) else {
            return Vec::new();
        };

        let excluded: HashSet<&LotId> = exclude.iter().collect();
        let lots: Vec<&WarehouseLot> = lots
            .into_iter()
            .filter(|lot| !excluded.contains(lot.id_typed()))
            .collect();

        let mut matched: HashSet<&LotId> = HashSet::new();
        let mut candidates = Vec::new();

        let (primary, fallback): (Vec<&dyn MatchStrategy>, Vec<&dyn MatchStrategy>) = self
            .strategies
            .iter()
            .map(|s| s.as_ref())
            .partition(|s| !s.is_fallback());

        Self::run(&primary, &query, &lots, &mut matched, &mut candidates);

        let strong = candidates.iter().any(|c| c.score >= self.strong_threshold);
        if !strong {
            Self::run(&fallback, &query, &lots, &mut matched, &mut candidates);
        }

        candidates.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| available(&b.lot).cmp(&available(&a.lot)))
                .then_with(|| b.lot.quantity().cmp(&a.lot.quantity()))
                .then_with(|| a.lot.id_typed().cmp(b.lot.id_typed()))
        });
        candidates.truncate(limit);
        candidates
    }

    fn run<'a>(
        strategies: &[&dyn MatchStrategy],
        query: &MatchQuery,
        lots: &[&'a WarehouseLot],
        matched: &mut HashSet<&'a LotId>,
        candidates: &mut Vec<MatchCandidate>,
    ) {
        for strategy in strategies {
            for &lot in lots {
                if matched.contains(lot.id_typed()) {
                    continue;
                }
                if let Some((score, reason)) = strategy.try_match(query, lot) {
                    matched.insert(lot.id_typed());
                    candidates.push(MatchCandidate {
                        lot: lot.clone(),
                        tier: strategy.tier(),
                        score,
                        reason,
                    });
                }
            }
        }
    }
}

/// Units a caller could take right now; tagged lots count as zero.
fn available(lot: &WarehouseLot) -> u32 {
    if lot.state().is_available() {
        lot.quantity()
    } else {
        0
    }
}
