//! Heuristic language detection and per-language scorer dispatch.

use crate::sentiment::keywords::{KeywordTable, ENGLISH, INDONESIAN};
use crate::sentiment::scorer::Scorer;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+").expect("valid word regex"));

// Function words and app-review vocabulary that are strong Indonesian signals
static INDONESIAN_MARKERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "yang", "dan", "di", "ini", "itu", "tidak", "gak", "ga", "nggak", "enggak", "tak",
        "sangat", "banget", "sekali", "saya", "aku", "kami", "kita", "untuk", "dengan",
        "tapi", "karena", "sudah", "udah", "belum", "bisa", "ada", "aplikasi", "juga",
        "lagi", "masih", "kalau", "jadi", "mau", "dari", "ke", "pada", "lebih", "kurang",
        "aja", "sih", "dong", "deh", "nih", "tolong", "mohon", "terus", "kok", "pakai",
    ]
    .into_iter()
    .collect()
});

static ENGLISH_MARKERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    vec![
        "the", "and", "is", "are", "was", "were", "this", "that", "it", "not", "very",
        "i", "my", "we", "you", "for", "with", "but", "because", "have", "has", "app",
        "to", "of", "in", "on", "so", "too", "really", "please", "can", "would", "be",
        "when", "after", "every", "always", "just",
    ]
    .into_iter()
    .collect()
});

fn vocabulary(table: &'static KeywordTable) -> HashSet<&'static str> {
    table
        .positive
        .iter()
        .chain(table.negative)
        .chain(table.neutral)
        .copied()
        .filter(|w| !w.contains(' '))
        .collect()
}

// Sentiment vocabulary doubles as a language signal for short reviews like "mantap" or "jelek"
static INDONESIAN_VOCABULARY: Lazy<HashSet<&'static str>> = Lazy::new(|| vocabulary(&INDONESIAN));
static ENGLISH_VOCABULARY: Lazy<HashSet<&'static str>> = Lazy::new(|| vocabulary(&ENGLISH));

/// Languages the router distinguishes. Everything that is not recognisably
/// Indonesian lands in `Other` and is scored with the English tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Indonesian,
    Other,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::Indonesian => "id",
            Language::Other => "other",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Detect the dominant language of `text`.
///
/// Counts marker words and whole-word sentiment keywords for each language;
/// words ending in the Indonesian possessive suffix `-nya` also count as
/// Indonesian. A keyword shared by both tables counts for both. Ties go to `Other`.
pub fn detect(text: &str) -> Language {
    let lowered = text.to_lowercase();
    let mut indonesian = 0usize;
    let mut english = 0usize;

    for m in WORD_RE.find_iter(&lowered) {
        let word = m.as_str();
        if INDONESIAN_MARKERS.contains(word)
            || INDONESIAN_VOCABULARY.contains(word)
            || (word.len() > 5 && word.ends_with("nya"))
        {
            indonesian += 1;
        }
        if ENGLISH_MARKERS.contains(word) || ENGLISH_VOCABULARY.contains(word) {
            english += 1;
        }
    }

    if indonesian > english {
        Language::Indonesian
    } else {
        Language::Other
    }
}

/// Maps detected languages to scorers.
#[derive(Debug, Clone, Default)]
pub struct LanguageRouter {
    scorers: HashMap<Language, Arc<dyn Scorer>>,
}

impl LanguageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scorer(mut self, language: Language, scorer: Arc<dyn Scorer>) -> Self {
        self.scorers.insert(language, scorer);
        self
    }

    pub fn detect(&self, text: &str) -> Language {
        detect(text)
    }

    pub fn scorer_for(&self, language: Language) -> Option<Arc<dyn Scorer>> {
        self.scorers.get(&language).cloned()
    }
}
