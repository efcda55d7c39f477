//! Flesch Reading Ease and Flesch-Kincaid Grade using a vowel-group syllable heuristic.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::stats::{round_to, TextStatistics};

static WHITESPACE_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static SILENT_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[^laeiouy]es|ed|[^laeiouy]e)$").expect("valid silent suffix regex")
});
static VOWEL_GROUP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[aeiouy]{1,2}").expect("valid vowel group regex"));

/// Readability scores with a qualitative label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readability {
    pub flesch_reading_ease: f64,
    pub flesch_kincaid_grade: f64,
    pub interpretation: String,
}

impl Readability {
    pub fn compute(text: &str) -> Self {
        let stats = TextStatistics::compute(text);
        Self::from_parts(&stats, count_syllables(text))
    }

    /// Scores from precomputed statistics and a total syllable count.
    pub fn from_parts(stats: &TextStatistics, syllables: usize) -> Self {
        let words_per_sentence = stats.words as f64 / stats.sentences.max(1) as f64;
        let syllables_per_word = syllables as f64 / stats.words.max(1) as f64;

        let ease = round_to(
            206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word,
            0,
        );
        let grade = round_to(
            0.39 * words_per_sentence + 11.8 * syllables_per_word - 15.59,
            1,
        );

        Self {
            flesch_reading_ease: ease.clamp(0.0, 100.0),
            flesch_kincaid_grade: grade.max(0.0),
            interpretation: interpret(ease).to_string(),
        }
    }
}

/// Label for an (unclamped) reading-ease score.
pub fn interpret(ease: f64) -> &'static str {
    if ease >= 90.0 {
        "Very Easy - 5th grade level"
    } else if ease >= 80.0 {
        "Easy - 6th grade level"
    } else if ease >= 70.0 {
        "Fairly Easy - 7th grade level"
    } else if ease >= 60.0 {
        "Standard - 8th-9th grade level"
    } else if ease >= 50.0 {
        "Fairly Difficult - 10th-12th grade level"
    } else if ease >= 30.0 {
        "Difficult - College level"
    } else {
        "Very Difficult - Professional/Legal level"
    }
}

/// Sum of per-word syllables over the lowercased text.
///
/// Splitting keeps the empty segments produced by leading or trailing
/// whitespace, and each of those counts as one syllable.
pub fn count_syllables(text: &str) -> usize {
    let lower = text.to_lowercase();
    WHITESPACE_RUN_RE
        .split(&lower)
        .map(count_word_syllables)
        .sum()
}

pub fn count_word_syllables(word: &str) -> usize {
    let letters: String = word.chars().filter(|c| c.is_ascii_lowercase()).collect();
    if letters.len() <= 3 {
        return 1;
    }
    let stripped = SILENT_SUFFIX_RE.replace(&letters, "");
    let stripped = stripped.strip_prefix('y').unwrap_or(&stripped);
    match VOWEL_GROUP_RE.find_iter(stripped).count() {
        0 => 1,
        groups => groups,
    }
}
