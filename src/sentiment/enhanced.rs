//! Higher-fidelity scorer that reads the text token by token.
//!
//! Stands in for a transformer model behind the same [`Scorer`] interface: it
//! reuses the keyword tables but understands negation ("tidak bagus", "not
//! good") and intensifiers ("bagus banget", "very slow"), at a higher cost per
//! text than plain substring counting.

use crate::error::AnalysisError;
use crate::models::Method;
use crate::sentiment::keywords::{KeywordTable, ENGLISH, INDONESIAN};
use crate::sentiment::scorer::{label_for, Score, Scorer};
use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}'-]+").expect("valid token regex"));

const NEGATORS: &[&str] = &[
    "tidak", "gak", "ga", "nggak", "enggak", "bukan", "tak", "kurang", "not", "no", "never",
    "don't", "dont", "isn't", "isnt", "wasn't", "wasnt", "cannot", "can't", "cant", "hardly",
];

const INTENSIFIERS: &[&str] = &[
    "sangat", "banget", "sekali", "amat", "very", "really", "so", "extremely", "super", "totally",
];

/// How many tokens back a negator still applies.
const NEGATION_WINDOW: usize = 2;
const INTENSIFIER_WEIGHT: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone)]
pub struct EnhancedScorer {
    table: &'static KeywordTable,
    method: Method,
    max_chars: Option<usize>,
}

impl EnhancedScorer {
    pub fn indonesian() -> Self {
        Self {
            table: &INDONESIAN,
            method: Method::IndonesianEnhanced,
            max_chars: None,
        }
    }

    pub fn english() -> Self {
        Self {
            table: &ENGLISH,
            method: Method::EnglishEnhanced,
            max_chars: None,
        }
    }

    pub fn with_max_chars(mut self, max: usize) -> Self {
        self.max_chars = Some(max);
        self
    }

    /// Match a keyword starting at token `i`. Returns its polarity and the number of tokens consumed.
    fn match_at(&self, tokens: &[&str], i: usize) -> Option<(Polarity, usize)> {
        let lists = [
            (Polarity::Positive, self.table.positive),
            (Polarity::Negative, self.table.negative),
            (Polarity::Neutral, self.table.neutral),
        ];

        // Multi-word entries first so "tidak bisa" wins over a bare negator.
        if i + 1 < tokens.len() {
            let pair = format!("{} {}", tokens[i], tokens[i + 1]);
            for (polarity, words) in lists {
                if words.iter().any(|w| w.contains(' ') && pair.starts_with(w)) {
                    return Some((polarity, 2));
                }
            }
        }

        let token = tokens[i];
        for (polarity, words) in lists {
            if words.iter().any(|w| !w.contains(' ') && token.starts_with(w)) {
                return Some((polarity, 1));
            }
        }
        None
    }
}

impl Scorer for EnhancedScorer {
    fn method(&self) -> Method {
        self.method
    }

    fn score(&self, text: &str, threshold: f64) -> Result<Score, AnalysisError> {
        if let Some(max) = self.max_chars {
            let len = text.chars().count();
            if len > max {
                return Err(AnalysisError::TextTooLong { len, max });
            }
        }

        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = TOKEN_RE.find_iter(&lowered).map(|m| m.as_str()).collect();

        let (mut pos, mut neg, mut neu) = (0.0f64, 0.0f64, 0.0f64);
        let mut i = 0;
        while i < tokens.len() {
            let Some((polarity, consumed)) = self.match_at(&tokens, i) else {
                i += 1;
                continue;
            };

            let before = &tokens[i.saturating_sub(NEGATION_WINDOW)..i];
            let negated = before.iter().any(|t| NEGATORS.contains(t));
            let intensified = before.iter().any(|t| INTENSIFIERS.contains(t))
                || tokens
                    .get(i + consumed)
                    .map_or(false, |t| INTENSIFIERS.contains(t));
            let weight = if intensified { INTENSIFIER_WEIGHT } else { 1.0 };

            match (polarity, negated) {
                (Polarity::Positive, false) | (Polarity::Negative, true) => pos += weight,
                (Polarity::Negative, false) | (Polarity::Positive, true) => neg += weight,
                (Polarity::Neutral, _) => neu += weight,
            }
            i += consumed;
        }

        let total = pos + neg + neu;
        let score = if total > 0.0 { ((pos - neg) / total).clamp(-1.0, 1.0) } else { 0.0 };

        Ok(Score {
            label: label_for(score, threshold),
            score,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SentimentLabel;

    #[test]
    fn test_negation_flips_polarity() {
        let scorer = EnhancedScorer::indonesian();
        let s = scorer.score("aplikasinya tidak bagus", 0.2).unwrap();
        assert_eq!(s.label, SentimentLabel::Negative);

        let s = EnhancedScorer::english().score("not bad at all", 0.2).unwrap();
        assert_eq!(s.label, SentimentLabel::Positive);
    }

    #[test]
    fn test_intensifier_outweighs_plain_keyword() {
        // 1.5 positive vs 1.0 negative
        let s = EnhancedScorer::indonesian()
            .score("bagus banget walau agak mahal", 0.0)
            .unwrap();
        assert!((s.score - 0.2).abs() < 1e-9);
        assert_eq!(s.label, SentimentLabel::Positive);
    }

    #[test]
    fn test_multi_word_keyword_is_not_double_negated() {
        let s = EnhancedScorer::indonesian().score("tidak bisa login", 0.2).unwrap();
        assert_eq!(s.label, SentimentLabel::Negative);
        assert_eq!(s.score, -1.0);
    }

    #[test]
    fn test_empty_and_symbol_only_text() {
        let s = EnhancedScorer::english().score("", 0.2).unwrap();
        assert_eq!(s.score, 0.0);
        let s = EnhancedScorer::english().score("?!... 123", 0.2).unwrap();
        assert_eq!(s.label, SentimentLabel::Neutral);
    }
}
