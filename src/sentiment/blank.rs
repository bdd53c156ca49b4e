//! Sentiment for records without usable text, derived from the star rating.

use crate::models::{AnalysisResult, Method, SentimentLabel};

/// Language code attached to results that never went through language detection.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Rating-proxy policy for blank text.
///
/// | rating | label    | score |
/// |--------|----------|-------|
/// | 5      | positive | 0.7   |
/// | 4      | positive | 0.3   |
/// | 3      | neutral  | 0     |
/// | 2      | negative | -0.3  |
/// | 1      | negative | -0.7  |
///
/// Ratings are rounded and clamped into 1..=5 first.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankInputPolicy;

impl BlankInputPolicy {
    pub fn classify(rating: Option<f64>) -> AnalysisResult {
        let rating = match rating.filter(|r| r.is_finite()) {
            Some(r) => r.round().clamp(1.0, 5.0),
            None => return AnalysisResult::neutral(UNKNOWN_LANGUAGE, Method::DefaultNeutral),
        };

        let (label, score) = if rating >= 4.0 {
            (SentimentLabel::Positive, 0.3 + (rating - 4.0) * 0.4)
        } else if rating <= 2.0 {
            (SentimentLabel::Negative, -0.7 + (rating - 1.0) * 0.4)
        } else {
            (SentimentLabel::Neutral, 0.0)
        };

        AnalysisResult {
            label,
            score: round_score(score),
            language: UNKNOWN_LANGUAGE.to_string(),
            method: Method::RatingProxy,
        }
    }
}

/// Round to 4 decimals so table values like 0.3 + 0.4 come out exact.
pub(crate) fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_table() {
        let expected = [
            (1.0, SentimentLabel::Negative, -0.7),
            (2.0, SentimentLabel::Negative, -0.3),
            (3.0, SentimentLabel::Neutral, 0.0),
            (4.0, SentimentLabel::Positive, 0.3),
            (5.0, SentimentLabel::Positive, 0.7),
        ];
        for (rating, label, score) in expected {
            let result = BlankInputPolicy::classify(Some(rating));
            assert_eq!(result.label, label, "rating {}", rating);
            assert_eq!(result.score, score, "rating {}", rating);
            assert_eq!(result.method, Method::RatingProxy);
            assert_eq!(result.language, UNKNOWN_LANGUAGE);
        }
    }

    #[test]
    fn test_score_ranges_by_rating() {
        for r in 1..=5 {
            let s = BlankInputPolicy::classify(Some(r as f64)).score;
            match r {
                3 => assert_eq!(s, 0.0),
                4 | 5 => assert!((0.3..=0.7).contains(&s)),
                _ => assert!((-0.7..=-0.3).contains(&s)),
            }
            // Deterministic
            assert_eq!(BlankInputPolicy::classify(Some(r as f64)).score, s);
        }
    }

    #[test]
    fn test_no_rating_defaults_to_neutral() {
        let result = BlankInputPolicy::classify(None);
        assert_eq!(result.label, SentimentLabel::Neutral);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.method, Method::DefaultNeutral);

        let result = BlankInputPolicy::classify(Some(f64::NAN));
        assert_eq!(result.method, Method::DefaultNeutral);
    }

    #[test]
    fn test_out_of_range_ratings_are_clamped() {
        assert_eq!(BlankInputPolicy::classify(Some(9.0)).score, 0.7);
        assert_eq!(BlankInputPolicy::classify(Some(0.0)).score, -0.7);
        assert_eq!(BlankInputPolicy::classify(Some(-3.0)).label, SentimentLabel::Negative);
        assert_eq!(BlankInputPolicy::classify(Some(3.6)).score, 0.3);
        assert_eq!(BlankInputPolicy::classify(Some(2.4)).score, -0.3);
    }
}
