//! Junas core: local text analysis for legal documents and the branching
//! conversation tree behind the chat view.
//!
//! Analysis (statistics, readability, keywords, structure, citations) is
//! pure and deterministic. Conversation history is a persistent map of
//! messages keyed by id; every edit returns a new map that shares the
//! untouched nodes with the old one.

pub mod citations;
pub mod commands;
pub mod conversation;
pub mod entities;
pub mod error;
pub mod graph;
pub mod keywords;
pub mod readability;
pub mod report;
pub mod stats;
pub mod structure;
pub mod tree;

use serde::{Deserialize, Serialize};

pub use citations::{check_citations, CitationKind, ValidatedCitation, ValidationStatus};
pub use commands::{
    parse_command, process_local_command, resolve_command_string, CommandKind, CommandOutcome,
    CommandProcessor, ExternalCommands, ParsedCommand,
};
pub use conversation::{Artifact, ArtifactKind, Conversation, ConversationRecord, ConversationState};
pub use entities::{
    format_entity_report, EntityExtractor, EntityKind, EntityReport, EntityTagger,
    HeuristicEntityTagger,
};
pub use error::{CommandError, TreeError};
pub use graph::{generate_dot, generate_graph_description, GraphDescription};
pub use keywords::{HeuristicTagger, Keyword, KeywordExtractor, TermTagger};
pub use readability::Readability;
pub use report::{AnalysisReport, TextAnalyzer};
pub use stats::TextStatistics;
pub use structure::DocumentStructure;
pub use tree::{
    add_child, create_tree_from_linear, get_branch_siblings, get_linear_history, Message,
    NodeMap, Role,
};

/// Tunables for the text analysis passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub reading_words_per_minute: u32,
    pub speaking_words_per_minute: u32,
    pub keyword_limit: usize,
    /// Heading-like lines retained by structure detection.
    pub max_detected_sections: usize,
    /// Headings listed in the Markdown report.
    pub report_sections: usize,
    /// Added to the built-in stopword list (case-insensitive).
    pub extra_stopwords: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            reading_words_per_minute: 200,
            speaking_words_per_minute: 150,
            keyword_limit: 10,
            max_detected_sections: structure::MAX_DETECTED_SECTIONS,
            report_sections: 10,
            extra_stopwords: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Reject unknown parents, duplicate ids and cycles instead of
    /// inserting leniently.
    pub strict: bool,
    pub preview_chars: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            strict: false,
            preview_chars: graph::PREVIEW_CHARS,
        }
    }
}

/// Top-level configuration, usually read from `junas.yml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub tree: TreeConfig,
}

pub fn text_statistics(text: &str) -> TextStatistics {
    TextStatistics::compute(text)
}

pub fn readability(text: &str) -> Readability {
    Readability::compute(text)
}

pub fn extract_keywords(text: &str, limit: usize) -> Vec<Keyword> {
    keywords::extract_keywords(text, limit)
}

pub fn detect_structure(text: &str) -> DocumentStructure {
    DocumentStructure::detect(text)
}

pub fn extract_entities(text: &str) -> EntityReport {
    entities::extract_entities(text)
}

/// Markdown report with default settings, as shown for `/analyze-document`.
pub fn format_analysis_report(text: &str) -> String {
    TextAnalyzer::default().format_report(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_rates() {
        let cfg = Config::default();
        assert_eq!(cfg.analysis.reading_words_per_minute, 200);
        assert_eq!(cfg.analysis.speaking_words_per_minute, 150);
        assert_eq!(cfg.analysis.keyword_limit, 10);
        assert_eq!(cfg.analysis.max_detected_sections, 20);
        assert!(!cfg.tree.strict);
        assert_eq!(cfg.tree.preview_chars, 30);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "analysis:\n  reading_words_per_minute: 250\n  extra_stopwords: [hereby, whereas]\ntree:\n  strict: true\n",
        )
        .unwrap();
        assert_eq!(cfg.analysis.reading_words_per_minute, 250);
        assert_eq!(cfg.analysis.speaking_words_per_minute, 150);
        assert_eq!(cfg.analysis.extra_stopwords, vec!["hereby", "whereas"]);
        assert!(cfg.tree.strict);
        assert_eq!(cfg.tree.preview_chars, 30);
    }

    #[test]
    fn empty_yaml_is_default() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn convenience_functions_agree_with_analyzer() {
        let text = "The Tenant shall pay rent. The Landlord shall repair the roof.";
        let analyzer = TextAnalyzer::default();
        assert_eq!(text_statistics(text), analyzer.statistics(text));
        assert_eq!(readability(text), analyzer.readability(text));
        assert_eq!(extract_keywords(text, 5), analyzer.keywords(text, 5));
        assert_eq!(detect_structure(text), analyzer.structure(text));
        assert_eq!(format_analysis_report(text), analyzer.format_report(text));
    }
}
