// Lexicon fuzzy matcher - offline detection of banned terms.
//
// Two disjoint term sets:
// - phrases: exact containment, then a sliding-window edit-distance scan
// - abbreviations: exact containment only (short strings fuzz into everything)
//
// The lexicon is injected at construction and never mutated afterwards, so a
// matcher can be shared behind an `Arc` across any number of tasks.

use super::normalizer::normalize;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default phrase list. Checked with fuzzy matching.
const DEFAULT_PHRASES: &[&str] = &[
    "fuck",
    "shit",
    "bitch",
    "asshole",
    "bastard",
    "motherfucker",
    "dickhead",
    "chutiya",
    "bhenchod",
    "behenchod",
    "madarchod",
    "bhosdike",
    "gandu",
    "harami",
];

/// Default abbreviation list. Checked with exact substring matching only.
const DEFAULT_ABBREVIATIONS: &[&str] = &["wtf", "stfu", "gtfo", "bsdk", "bkl", "mkc"];

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Banned terms, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    /// Terms matched exactly or fuzzily.
    #[serde(default)]
    pub phrases: Vec<String>,
    /// Short terms matched exactly, never fuzzed.
    #[serde(default)]
    pub abbreviations: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_PHRASES.iter().map(|s| s.to_string()).collect(),
            abbreviations: DEFAULT_ABBREVIATIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Lexicon {
    /// Load a lexicon from a JSON file shaped like
    /// `{ "phrases": [...], "abbreviations": [...] }`.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let lexicon: Lexicon = serde_json::from_str(&raw)?;
        Ok(lexicon)
    }
}

/// Tuning knobs for the sliding-window scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyConfig {
    /// Minimum similarity (inclusive) for a window to count as a match.
    pub similarity_threshold: f64,
    /// How many characters longer than the phrase each window is.
    pub window_padding: usize,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            window_padding: 2,
        }
    }
}

// ============================================================================
// RESULTS
// ============================================================================

/// How a lexicon term was found.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchKind {
    /// Normalized text contains a normalized abbreviation.
    Abbreviation,
    /// Normalized text contains a normalized phrase.
    Phrase,
    /// A window of the normalized text is close enough to a phrase.
    Fuzzy { similarity: f64 },
}

/// The first lexicon term found in a piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct LexiconHit {
    /// The term as written in the lexicon.
    pub term: String,
    pub kind: MatchKind,
}

// ============================================================================
// MATCHER
// ============================================================================

struct PreparedTerm {
    term: String,
    normalized: Vec<char>,
}

impl PreparedTerm {
    /// Normalize a lexicon entry, dropping entries that normalize to nothing.
    fn prepare(term: &str) -> Option<Self> {
        let normalized: Vec<char> = normalize(term).chars().collect();
        if normalized.is_empty() {
            tracing::warn!(term, "Ignoring lexicon entry that normalizes to an empty string");
            return None;
        }
        Some(Self {
            term: term.to_string(),
            normalized,
        })
    }
}

/// Checks text against an injected lexicon.
pub struct LexiconMatcher {
    phrases: Vec<PreparedTerm>,
    abbreviations: Vec<PreparedTerm>,
    config: FuzzyConfig,
}

impl LexiconMatcher {
    /// Build a matcher. Every lexicon entry is normalized once, up front.
    pub fn new(lexicon: Lexicon, config: FuzzyConfig) -> Self {
        Self {
            phrases: lexicon
                .phrases
                .iter()
                .filter_map(|p| PreparedTerm::prepare(p))
                .collect(),
            abbreviations: lexicon
                .abbreviations
                .iter()
                .filter_map(|a| PreparedTerm::prepare(a))
                .collect(),
            config,
        }
    }

    /// Find the first banned term in `text`, if any.
    ///
    /// Abbreviations are checked first, then phrases in lexicon order. The
    /// order only decides which term gets reported, never whether one does.
    pub fn match_bad_content(&self, text: &str) -> Option<LexiconHit> {
        let normalized: Vec<char> = normalize(text).chars().collect();
        if normalized.is_empty() {
            return None;
        }

        for abbreviation in &self.abbreviations {
            if contains(&normalized, &abbreviation.normalized) {
                return Some(LexiconHit {
                    term: abbreviation.term.clone(),
                    kind: MatchKind::Abbreviation,
                });
            }
        }

        for phrase in &self.phrases {
            if contains(&normalized, &phrase.normalized) {
                return Some(LexiconHit {
                    term: phrase.term.clone(),
                    kind: MatchKind::Phrase,
                });
            }

            if let Some(similarity) = self.best_window(&normalized, &phrase.normalized) {
                return Some(LexiconHit {
                    term: phrase.term.clone(),
                    kind: MatchKind::Fuzzy { similarity },
                });
            }
        }

        None
    }

    /// Slide a window of `len(phrase) + padding` over the text, starting at
    /// every offset. Returns the similarity of the first window that reaches
    /// the threshold.
    ///
    /// Windows near the end of the text are truncated. A truncated window is
    /// only scored when it is long enough to reach the threshold at all
    /// (`ceil(len(phrase) * threshold)`), and never when it is a plain
    /// fragment of the phrase: a trailing "hit" is not "shit".
    fn best_window(&self, text: &[char], phrase: &[char]) -> Option<f64> {
        let window_len = phrase.len() + self.config.window_padding;
        let min_len =
            ((phrase.len() as f64 * self.config.similarity_threshold).ceil() as usize).max(1);

        (0..text.len())
            .map(|start| &text[start..(start + window_len).min(text.len())])
            .take_while(|window| window.len() >= min_len)
            .filter(|window| window.len() >= phrase.len() || !contains(phrase, window))
            .map(|window| similarity_chars(window, phrase))
            .find(|score| *score >= self.config.similarity_threshold)
    }
}

// ============================================================================
// SIMILARITY
// ============================================================================

/// Similarity in [0, 1] between two strings.
///
/// Equal strings score 1.0. If one contains the other the score is 0.9 without
/// running the edit distance. Otherwise `1 - levenshtein / max_len`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    similarity_chars(&a, &b)
}

fn similarity_chars(a: &[char], b: &[char]) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if contains(a, b) || contains(b, a) {
        return 0.9;
    }

    let longest = a.len().max(b.len());
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

/// Unit-cost Levenshtein distance, two rows at a time.
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (curr[j] + 1).min(prev[j + 1] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn contains(haystack: &[char], needle: &[char]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
