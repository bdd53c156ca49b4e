//! Engine tunables, read from the environment.

use crate::error::ConfigError;
use std::time::Duration;

/// Which records the main pass revisits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalcScope {
    /// Non-blank records whose label is unset or `neutral-pending`.
    Pending,
    /// Every non-blank record.
    All,
}

/// Which scorer family backs the language router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerKind {
    Keywords,
    Enhanced,
}

#[derive(Debug, Clone)]
pub struct RecalcConfig {
    pub page_size: usize,
    /// Attempts per page fetch before the page is abandoned.
    pub fetch_attempts: u32,
    /// Backoff after the n-th failed attempt is `n * retry_base_delay`.
    pub retry_base_delay: Duration,
    pub batch_delay: Duration,
    /// Page budget. `None` derives it from the counted total.
    pub max_pages: Option<usize>,
    pub scope: RecalcScope,
    pub threshold: f64,
    pub analyzer: AnalyzerKind,
    pub max_text_chars: usize,
}

impl Default for RecalcConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            fetch_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            batch_delay: Duration::from_millis(500),
            max_pages: None,
            scope: RecalcScope::Pending,
            threshold: 0.2,
            analyzer: AnalyzerKind::Keywords,
            max_text_chars: 10_000,
        }
    }
}

impl RecalcConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup("RECALC_PAGE_SIZE") {
            cfg.page_size = parse_positive("RECALC_PAGE_SIZE", &v)?;
        }
        if let Some(v) = lookup("RECALC_FETCH_ATTEMPTS") {
            cfg.fetch_attempts = parse_attempts("RECALC_FETCH_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("RECALC_RETRY_DELAY_MS") {
            cfg.retry_base_delay = Duration::from_millis(parse_u64("RECALC_RETRY_DELAY_MS", &v)?);
        }
        if let Some(v) = lookup("RECALC_BATCH_DELAY_MS") {
            cfg.batch_delay = Duration::from_millis(parse_u64("RECALC_BATCH_DELAY_MS", &v)?);
        }
        if let Some(v) = lookup("RECALC_MAX_PAGES") {
            cfg.max_pages = Some(parse_positive("RECALC_MAX_PAGES", &v)?);
        }
        if let Some(v) = lookup("RECALC_SCOPE") {
            cfg.scope = match v.trim().to_lowercase().as_str() {
                "pending" => RecalcScope::Pending,
                "all" => RecalcScope::All,
                _ => return Err(invalid("RECALC_SCOPE", &v)),
            };
        }
        if let Some(v) = lookup("SENTIMENT_THRESHOLD") {
            let t: f64 = v.trim().parse().map_err(|_| invalid("SENTIMENT_THRESHOLD", &v))?;
            if !(0.0..1.0).contains(&t) {
                return Err(invalid("SENTIMENT_THRESHOLD", &v));
            }
            cfg.threshold = t;
        }
        if let Some(v) = lookup("SENTIMENT_ANALYZER") {
            cfg.analyzer = match v.trim().to_lowercase().as_str() {
                "keywords" => AnalyzerKind::Keywords,
                "enhanced" => AnalyzerKind::Enhanced,
                _ => return Err(invalid("SENTIMENT_ANALYZER", &v)),
            };
        }
        if let Some(v) = lookup("SENTIMENT_MAX_TEXT_CHARS") {
            cfg.max_text_chars = parse_positive("SENTIMENT_MAX_TEXT_CHARS", &v)?;
        }

        Ok(cfg)
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn parse_u64(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_positive(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(key, value)),
    }
}

fn parse_attempts(key: &'static str, value: &str) -> Result<u32, ConfigError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(invalid(key, value)),
    }
}
