//! Frequency-ranked keyword extraction over tagger output.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Function words never reported as keywords.
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "been", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "must", "shall", "this", "that",
    "these", "those", "it", "its", "they", "them", "their", "we", "us", "our", "you", "your",
    "he", "him", "his", "she", "her", "i", "me", "my", "not", "no", "yes", "if", "then", "else",
    "when", "where", "which", "who", "whom", "what", "how", "why", "all", "each", "every",
    "both", "few", "more", "most", "other", "some", "such", "only", "own", "same", "so", "than",
    "too", "very", "just", "also", "now", "here", "there", "any", "many", "much",
];

/// Prepositions that end a noun phrase in [`HeuristicTagger`] without being stopwords.
const PHRASE_BREAKERS: &[&str] = &[
    "over", "under", "into", "onto", "about", "after", "before", "between", "through",
    "during", "without", "within", "against", "upon", "per", "via",
];

/// Source of noun phrases and plain terms for a text.
pub trait TermTagger {
    fn nouns(&self, text: &str) -> Vec<String>;
    fn terms(&self, text: &str) -> Vec<String>;
}

/// Dictionary-free tagger: terms are Unicode words, noun phrases are runs
/// of content words between function words and punctuation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTagger;

impl TermTagger for HeuristicTagger {
    fn nouns(&self, text: &str) -> Vec<String> {
        let mut phrases = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        for segment in text.split_word_bounds() {
            if segment.chars().all(char::is_whitespace) {
                continue;
            }
            let is_word = segment.chars().any(char::is_alphabetic);
            let lower = segment.to_lowercase();
            let breaks = !is_word
                || STOPWORDS.contains(&lower.as_str())
                || PHRASE_BREAKERS.contains(&lower.as_str());
            if breaks {
                flush_phrase(&mut current, &mut phrases);
            } else {
                current.push(segment);
            }
        }
        flush_phrase(&mut current, &mut phrases);
        phrases
    }

    fn terms(&self, text: &str) -> Vec<String> {
        text.unicode_words().map(str::to_string).collect()
    }
}

fn flush_phrase(current: &mut Vec<&str>, phrases: &mut Vec<String>) {
    if !current.is_empty() {
        phrases.push(current.join(" "));
        current.clear();
    }
}

/// A ranked keyword with its share of all tagged tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub count: usize,
    pub frequency: f64,
}

#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    stopwords: HashSet<String>,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl KeywordExtractor {
    pub fn new(extra_stopwords: &[String]) -> Self {
        let mut stopwords: HashSet<String> = STOPWORDS.iter().map(|s| s.to_string()).collect();
        stopwords.extend(extra_stopwords.iter().map(|s| s.trim().to_lowercase()));
        Self { stopwords }
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    /// Top `limit` keywords by count; ties keep first-seen order.
    ///
    /// Frequencies are relative to every token the tagger returned,
    /// including the ones filtered out.
    pub fn extract(&self, tagger: &dyn TermTagger, text: &str, limit: usize) -> Vec<Keyword> {
        let mut tokens = tagger.nouns(text);
        tokens.extend(tagger.terms(text));
        let total = tokens.len();

        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for token in &tokens {
            let normalized = token.trim().to_lowercase();
            if normalized.encode_utf16().count() > 2 && !self.is_stopword(&normalized) {
                *counts.entry(normalized).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(limit);

        ranked
            .into_iter()
            .map(|(word, count)| Keyword {
                frequency: percentage(count, total),
                word,
                count,
            })
            .collect()
    }
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((count as f64 / total as f64) * 10000.0 + 0.5).floor() / 100.0
}

/// Keywords using the built-in tagger and the default stopword list.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<Keyword> {
    KeywordExtractor::default().extract(&HeuristicTagger, text, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTagger {
        nouns: Vec<&'static str>,
        terms: Vec<&'static str>,
    }

    impl TermTagger for FixedTagger {
        fn nouns(&self, _text: &str) -> Vec<String> {
            self.nouns.iter().map(|s| s.to_string()).collect()
        }

        fn terms(&self, _text: &str) -> Vec<String> {
            self.terms.iter().map(|s| s.to_string()).collect()
        }
    }

    #[test]
    fn ranks_repeated_nouns_first() {
        let keywords = extract_keywords(
            "The quick brown fox jumps over the lazy dog. The dog barks.",
            3,
        );
        assert_eq!(keywords.len(), 3);
        assert_eq!(keywords[0].word, "dog");
        assert_eq!(keywords[0].count, 2);
        assert!(keywords.iter().all(|k| k.word != "the"));
        assert!(keywords[1..].iter().all(|k| k.count == 1));
    }

    #[test]
    fn length_filter_counts_utf16_units() {
        let tagger = FixedTagger {
            nouns: vec!["\u{1D49C}\u{1D49C}", "ab"],
            terms: vec![],
        };
        let keywords = KeywordExtractor::default().extract(&tagger, "", 10);
        let words: Vec<&str> = keywords.iter().map(|k| k.word.as_str()).collect();
        assert_eq!(words, vec!["\u{1D49C}\u{1D49C}"]);
    }

    #[test]
    fn heuristic_tagger_splits_phrases_on_function_words() {
        let nouns = HeuristicTagger.nouns("The lazy dog sleeps over the mat, and the cat purrs.");
        assert_eq!(nouns, vec!["lazy dog sleeps", "mat", "cat purrs"]);
    }

    #[test]
    fn heuristic_terms_drop_punctuation() {
        let terms = HeuristicTagger.terms("Party A's obligations (see clause 4).");
        assert_eq!(terms, vec!["Party", "A's", "obligations", "see", "clause", "4"]);
    }

    #[test]
    fn frequency_uses_all_tagged_tokens() {
        let tagger = FixedTagger {
            nouns: vec!["Contract"],
            terms: vec!["the", "contract", "is", "void", "contract"],
        };
        let keywords = KeywordExtractor::default().extract(&tagger, "", 10);
        assert_eq!(keywords[0].word, "contract");
        assert_eq!(keywords[0].count, 3);
        assert_eq!(keywords[0].frequency, 50.0);
        assert_eq!(keywords[1].word, "void");
        assert_eq!(keywords[1].frequency, 16.67);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let tagger = FixedTagger {
            nouns: vec![],
            terms: vec!["zeta", "alpha", "mid", "alpha", "zeta"],
        };
        let words: Vec<String> = KeywordExtractor::default()
            .extract(&tagger, "", 10)
            .into_iter()
            .map(|k| k.word)
            .collect();
        assert_eq!(words, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn short_tokens_and_extra_stopwords_are_skipped() {
        let tagger = FixedTagger {
            nouns: vec![],
            terms: vec!["ab", "  Hereby  ", "party", "party"],
        };
        let extractor = KeywordExtractor::new(&["hereby".to_string()]);
        let keywords = extractor.extract(&tagger, "", 10);
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].word, "party");
    }

    #[test]
    fn empty_text_has_no_keywords() {
        assert!(extract_keywords("", 10).is_empty());
        assert!(extract_keywords("   ", 10).is_empty());
    }
}
