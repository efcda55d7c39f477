//! Aggregated document analysis and its Markdown rendering.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::keywords::{HeuristicTagger, Keyword, KeywordExtractor, TermTagger};
use crate::readability::{count_syllables, Readability};
use crate::stats::TextStatistics;
use crate::structure::DocumentStructure;
use crate::AnalysisConfig;

/// Everything the `/analyze-document` command reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub statistics: TextStatistics,
    pub readability: Readability,
    pub keywords: Vec<Keyword>,
    pub structure: DocumentStructure,
}

/// Runs the statistics, readability, keyword and structure passes with
/// one configuration and tagger.
pub struct TextAnalyzer {
    config: AnalysisConfig,
    keywords: KeywordExtractor,
    tagger: Box<dyn TermTagger + Send + Sync>,
}

impl Default for TextAnalyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl TextAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_tagger(config, HeuristicTagger)
    }

    /// Uses `tagger` for noun phrases and terms instead of the built-in heuristic.
    pub fn with_tagger(config: AnalysisConfig, tagger: impl TermTagger + Send + Sync + 'static) -> Self {
        let keywords = KeywordExtractor::new(&config.extra_stopwords);
        Self {
            config,
            keywords,
            tagger: Box::new(tagger),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn statistics(&self, text: &str) -> TextStatistics {
        TextStatistics::compute_with(text, &self.config)
    }

    pub fn readability(&self, text: &str) -> Readability {
        Readability::from_parts(&self.statistics(text), count_syllables(text))
    }

    pub fn keywords(&self, text: &str, limit: usize) -> Vec<Keyword> {
        self.keywords.extract(self.tagger.as_ref(), text, limit)
    }

    pub fn structure(&self, text: &str) -> DocumentStructure {
        DocumentStructure::detect_with_limit(text, self.config.max_detected_sections)
    }

    pub fn analyze(&self, text: &str) -> AnalysisReport {
        let statistics = self.statistics(text);
        let readability = Readability::from_parts(&statistics, count_syllables(text));
        AnalysisReport {
            statistics,
            readability,
            keywords: self.keywords(text, self.config.keyword_limit),
            structure: self.structure(text),
        }
    }

    pub fn format_report(&self, text: &str) -> String {
        render_markdown(&self.analyze(text), self.config.report_sections)
    }
}

/// Markdown summary used as the chat reply for `/analyze-document`.
pub fn render_markdown(report: &AnalysisReport, max_headings: usize) -> String {
    let stats = &report.statistics;
    let readability = &report.readability;
    let structure = &report.structure;

    let mut out = String::from("## Document Analysis Results\n\n");

    out.push_str("### Text Statistics\n");
    out.push_str("| Metric | Value |\n");
    out.push_str("|--------|-------|\n");
    let _ = writeln!(out, "| Words | {} |", group_thousands(stats.words));
    let _ = writeln!(out, "| Sentences | {} |", group_thousands(stats.sentences));
    let _ = writeln!(out, "| Paragraphs | {} |", group_thousands(stats.paragraphs));
    let _ = writeln!(out, "| Characters | {} |", group_thousands(stats.characters));
    let _ = writeln!(out, "| Avg. Word Length | {} chars |", stats.average_word_length);
    let _ = writeln!(
        out,
        "| Avg. Sentence Length | {} words |",
        stats.average_sentence_length
    );
    let _ = writeln!(out, "| Reading Time | ~{} min |", stats.reading_time_minutes);
    let _ = writeln!(out, "| Speaking Time | ~{} min |\n", stats.speaking_time_minutes);

    out.push_str("### Readability\n");
    let _ = writeln!(
        out,
        "- **Flesch Reading Ease:** {}/100",
        readability.flesch_reading_ease
    );
    let _ = writeln!(
        out,
        "- **Flesch-Kincaid Grade:** {}",
        readability.flesch_kincaid_grade
    );
    let _ = writeln!(out, "- **Interpretation:** {}\n", readability.interpretation);

    if !report.keywords.is_empty() {
        out.push_str("### Key Terms\n");
        out.push_str("| Term | Occurrences |\n");
        out.push_str("|------|-------------|\n");
        for keyword in &report.keywords {
            let _ = writeln!(out, "| {} | {} |", keyword.word, keyword.count);
        }
        out.push('\n');
    }

    out.push_str("### Document Structure\n");
    let features = structure.features();
    if features.is_empty() {
        out.push_str("No structured formatting detected.\n\n");
    } else {
        let _ = writeln!(out, "**Detected features:** {}\n", features.join(", "));
    }

    if !structure.detected_sections.is_empty() {
        out.push_str("**Section headings found:**\n");
        for section in structure.detected_sections.iter().take(max_headings) {
            let _ = writeln!(out, "- {section}");
        }
        out.push('\n');
    }

    out.push_str("---\n*Analyzed using local NLP processing (no AI service required)*");
    out
}

/// `1234567` -> `1,234,567`.
pub fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
