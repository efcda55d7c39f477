//! Character, word, sentence and paragraph counts with derived timings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::AnalysisConfig;

static SENTENCE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+").expect("valid sentence regex"));
static PARAGRAPH_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph regex"));

/// Immutable counts derived from a block of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStatistics {
    pub characters: usize,
    pub characters_no_spaces: usize,
    pub words: usize,
    pub sentences: usize,
    pub paragraphs: usize,
    pub average_word_length: f64,
    pub average_sentence_length: f64,
    pub reading_time_minutes: usize,
    pub speaking_time_minutes: usize,
}

impl TextStatistics {
    /// Statistics using the default reading (200 wpm) and speaking (150 wpm) rates.
    pub fn compute(text: &str) -> Self {
        Self::compute_with(text, &AnalysisConfig::default())
    }

    pub fn compute_with(text: &str, config: &AnalysisConfig) -> Self {
        // Lengths are UTF-16 code units so counts line up with the web client.
        let characters = text.encode_utf16().count();
        let characters_no_spaces = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(char::len_utf16)
            .sum();
        let words = count_words(text);
        let sentences = count_sentences(text);
        let paragraphs = count_paragraphs(text);

        let average_word_length = if words > 0 {
            characters_no_spaces as f64 / words as f64
        } else {
            0.0
        };
        let average_sentence_length = if sentences > 0 {
            words as f64 / sentences as f64
        } else {
            0.0
        };

        Self {
            characters,
            characters_no_spaces,
            words,
            sentences,
            paragraphs,
            average_word_length: round_to(average_word_length, 1),
            average_sentence_length: round_to(average_sentence_length, 1),
            reading_time_minutes: minutes_at(words, config.reading_words_per_minute),
            speaking_time_minutes: minutes_at(words, config.speaking_words_per_minute),
        }
    }
}

pub(crate) fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

pub(crate) fn count_sentences(text: &str) -> usize {
    SENTENCE_BREAK_RE
        .split(text)
        .filter(|segment| !segment.trim().is_empty())
        .count()
}

pub(crate) fn count_paragraphs(text: &str) -> usize {
    PARAGRAPH_BREAK_RE
        .split(text)
        .filter(|segment| !segment.trim().is_empty())
        .count()
}

fn minutes_at(words: usize, per_minute: u32) -> usize {
    if words == 0 || per_minute == 0 {
        return 0;
    }
    let per_minute = per_minute as usize;
    (words + per_minute - 1) / per_minute
}

/// Rounds half toward positive infinity, matching the client's rounding of scores.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor + 0.5).floor() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_all_zero() {
        assert_eq!(TextStatistics::compute(""), TextStatistics::default());
    }

    #[test]
    fn whitespace_only_text_has_no_words() {
        let stats = TextStatistics::compute("  \n\n\t ");
        assert_eq!(stats.words, 0);
        assert_eq!(stats.sentences, 0);
        assert_eq!(stats.paragraphs, 0);
        assert_eq!(stats.characters_no_spaces, 0);
        assert_eq!(stats.characters, 6);
        assert_eq!(stats.reading_time_minutes, 0);
    }

    #[test]
    fn counts_short_sentences() {
        let stats = TextStatistics::compute("Hello world. Bye now.");
        assert_eq!(stats.words, 4);
        assert_eq!(stats.sentences, 2);
        assert_eq!(stats.average_sentence_length, 2.0);
        assert_eq!(stats.characters, 21);
        assert_eq!(stats.characters_no_spaces, 18);
        assert_eq!(stats.average_word_length, 4.5);
        assert_eq!(stats.reading_time_minutes, 1);
        assert_eq!(stats.speaking_time_minutes, 1);
    }

    #[test]
    fn punctuation_runs_count_as_one_break() {
        let stats = TextStatistics::compute("Really?! Yes... Done");
        assert_eq!(stats.sentences, 3);
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let text = "First paragraph.\n\nSecond one.\n   \nThird.\nStill third.";
        assert_eq!(TextStatistics::compute(text).paragraphs, 3);
    }

    #[test]
    fn reading_time_rounds_up() {
        let text = "word ".repeat(201);
        let stats = TextStatistics::compute(&text);
        assert_eq!(stats.words, 201);
        assert_eq!(stats.reading_time_minutes, 2);
        assert_eq!(stats.speaking_time_minutes, 2);
    }

    #[test]
    fn custom_rates_change_timings() {
        let config = AnalysisConfig {
            reading_words_per_minute: 2,
            speaking_words_per_minute: 1,
            ..AnalysisConfig::default()
        };
        let stats = TextStatistics::compute_with("one two three", &config);
        assert_eq!(stats.reading_time_minutes, 2);
        assert_eq!(stats.speaking_time_minutes, 3);
    }

    #[test]
    fn astral_characters_count_as_two_units() {
        let stats = TextStatistics::compute("a 😀");
        assert_eq!(stats.characters, 4);
        assert_eq!(stats.characters_no_spaces, 3);
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_to(2.25, 1), 2.3);
        assert_eq!(round_to(1.0 / 3.0, 1), 0.3);
        assert_eq!(round_to(-0.5, 0), 0.0);
    }
}
