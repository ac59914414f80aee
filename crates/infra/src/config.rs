//! Configuration loading and representation.

use thiserror::Error;

use depot_fulfillment::VatPolicy;
use depot_warehouse::{DescriptionSimilarity, ExactCode, Figura, FiguraGambo, Matcher};

pub const ENV_MATCH_LIMIT: &str = "DEPOT_MATCH_LIMIT";
pub const ENV_STRONG_MATCH: &str = "DEPOT_STRONG_MATCH";
pub const ENV_DESCRIPTION_THRESHOLD: &str = "DEPOT_DESCRIPTION_THRESHOLD";
pub const ENV_DEFAULT_VAT_RATE: &str = "DEPOT_DEFAULT_VAT_RATE";
pub const ENV_VAT_TOLERANCE: &str = "DEPOT_VAT_TOLERANCE";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime settings for the catalog and order-line services.
#[derive(Debug, Clone, PartialEq)]
pub struct DepotConfig {
    /// Candidates returned by a match when the caller gives no limit.
    pub match_limit: usize,
    /// Code-tier score at which the description fallback is skipped.
    pub strong_match_threshold: u8,
    /// Minimum description similarity (0.0..=1.0) for a fallback candidate.
    pub description_threshold: f64,
    pub vat: VatPolicy,
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self {
            match_limit: 10,
            strong_match_threshold: 80,
            description_threshold: 0.3,
            vat: VatPolicy::default(),
        }
    }
}

impl DepotConfig {
    pub fn with_match_limit(mut self, limit: usize) -> Self {
        self.match_limit = limit;
        self
    }

    pub fn with_strong_match_threshold(mut self, threshold: u8) -> Self {
        self.strong_match_threshold = threshold;
        self
    }

    pub fn with_description_threshold(mut self, threshold: f64) -> Self {
        self.description_threshold = threshold;
        self
    }

    pub fn with_vat_policy(mut self, vat: VatPolicy) -> Self {
        self.vat = vat;
        self
    }

    /// Defaults overridden by `DEPOT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DepotConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_MATCH_LIMIT) {
            let limit: usize = parse(ENV_MATCH_LIMIT, &raw)?;
            if limit == 0 {
                return Err(invalid(ENV_MATCH_LIMIT, &raw, "must be positive"));
            }
            config.match_limit = limit;
        }

        if let Some(raw) = lookup(ENV_STRONG_MATCH) {
            let threshold: u8 = parse(ENV_STRONG_MATCH, &raw)?;
            if threshold > 100 {
                return Err(invalid(ENV_STRONG_MATCH, &raw, "must be between 0 and 100"));
            }
            config.strong_match_threshold = threshold;
        }

        if let Some(raw) = lookup(ENV_DESCRIPTION_THRESHOLD) {
            let threshold: f64 = parse(ENV_DESCRIPTION_THRESHOLD, &raw)?;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(invalid(ENV_DESCRIPTION_THRESHOLD, &raw, "must be between 0 and 1"));
            }
            config.description_threshold = threshold;
        }

        if let Some(raw) = lookup(ENV_DEFAULT_VAT_RATE) {
            let rate: u32 = parse(ENV_DEFAULT_VAT_RATE, &raw)?;
            if !config.vat.valid_rates.contains(&rate) {
                return Err(invalid(ENV_DEFAULT_VAT_RATE, &raw, "not a valid VAT rate"));
            }
            config.vat = config.vat.with_default_rate(rate);
        }

        if let Some(raw) = lookup(ENV_VAT_TOLERANCE) {
            let tolerance: f64 = parse(ENV_VAT_TOLERANCE, &raw)?;
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(invalid(ENV_VAT_TOLERANCE, &raw, "must be a non-negative number"));
            }
            config.vat = config.vat.with_tolerance(tolerance);
        }

        Ok(config)
    }

    /// Strategy chain in priority order, with the configured thresholds.
    pub fn matcher(&self) -> Matcher {
        Matcher::new(vec![
            Box::new(ExactCode),
            Box::new(FiguraGambo),
            Box::new(Figura),
            Box::new(DescriptionSimilarity::with_threshold(self.description_threshold)),
        ])
        .with_strong_threshold(self.strong_match_threshold)
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| invalid(key, raw, &e.to_string()))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
