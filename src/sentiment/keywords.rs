//! Curated keyword tables, one per supported language.
//!
//! Entries are lower-case and matched as substrings of the lower-cased text, so
//! stems such as `frustrat` or `kecewa` also catch their inflected forms.

/// Positive, negative and neutral vocabulary for one language.
#[derive(Debug)]
pub struct KeywordTable {
    pub positive: &'static [&'static str],
    pub negative: &'static [&'static str],
    pub neutral: &'static [&'static str],
}

/// Per-polarity occurrence counts for one text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordCounts {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

impl KeywordCounts {
    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }
}

impl KeywordTable {
    /// Count substring occurrences of every keyword. `lowered` must already be lower-case.
    pub fn count(&self, lowered: &str) -> KeywordCounts {
        KeywordCounts {
            positive: count_occurrences(lowered, self.positive),
            negative: count_occurrences(lowered, self.negative),
            neutral: count_occurrences(lowered, self.neutral),
        }
    }
}

fn count_occurrences(haystack: &str, words: &[&str]) -> usize {
    words.iter().map(|w| haystack.matches(w).count()).sum()
}

pub static INDONESIAN: KeywordTable = KeywordTable {
    positive: &[
        "bagus",
        "mantap",
        "keren",
        "puas",
        "suka",
        "senang",
        "membantu",
        "mudah",
        "cepat",
        "lancar",
        "terbaik",
        "rekomendasi",
        "hebat",
        "nyaman",
        "praktis",
        "berguna",
        "terima kasih",
        "makasih",
        "recommended",
        "sukses",
    ],
    negative: &[
        "jelek",
        "buruk",
        "lemot",
        "lelet",
        "lambat",
        "kecewa",
        "gagal",
        "error",
        "rusak",
        "susah",
        "sulit",
        "ribet",
        "parah",
        "crash",
        "payah",
        "mahal",
        "nyebelin",
        "tidak bisa",
        "gak bisa",
        "force close",
    ],
    neutral: &[
        "biasa",
        "lumayan",
        "cukup",
        "standar",
        "rata-rata",
        "netral",
        "sedang",
    ],
};

pub static ENGLISH: KeywordTable = KeywordTable {
    positive: &[
        "good",
        "great",
        "excellent",
        "amazing",
        "awesome",
        "love",
        "helpful",
        "easy",
        "fast",
        "perfect",
        "recommend",
        "nice",
        "useful",
        "smooth",
        "happy",
        "best",
        "wonderful",
        "fantastic",
        "reliable",
        "satisfied",
    ],
    negative: &[
        "bad",
        "terrible",
        "awful",
        "horrible",
        "poor",
        "worst",
        "hate",
        "slow",
        "crash",
        "broken",
        "error",
        "useless",
        "disappoint",
        "annoying",
        "frustrat",
        "laggy",
        "freeze",
        "expensive",
        "fail",
        "refund",
    ],
    neutral: &[
        "okay",
        "average",
        "fine",
        "decent",
        "ordinary",
        "so-so",
        "normal",
    ],
};

/// Small cross-language table used when the language-specific scorer fails.
pub static GENERIC: KeywordTable = KeywordTable {
    positive: &["good", "great", "love", "best", "bagus", "mantap", "suka", "puas"],
    negative: &["bad", "worst", "hate", "error", "jelek", "buruk", "kecewa", "lemot"],
    neutral: &["okay", "average", "biasa", "lumayan"],
};
