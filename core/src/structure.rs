//! Line-level detection of legal document structure.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NUMBERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[0-9]+\.([0-9]+\.?)*\s+").expect("valid numbered regex"));
// Only the `(a)` form is anchored; a roman `(iv)` anywhere on the line counts.
static LETTERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\([a-z]\)|\([ivx]+\)").expect("valid lettered regex"));
static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-•*]\s+").expect("valid bullet regex"));
static DEFINITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"[^"]+"\s+(means|refers to|shall mean)"#).expect("valid definition regex")
});
static HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z][A-Z\s]+[A-Z]|[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s*$")
        .expect("valid heading regex")
});

/// Default cap on retained heading-like lines.
pub const MAX_DETECTED_SECTIONS: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStructure {
    pub has_numbered_sections: bool,
    pub has_letter_sections: bool,
    pub has_bullet_points: bool,
    pub has_definitions: bool,
    pub detected_sections: Vec<String>,
}

impl DocumentStructure {
    pub fn detect(text: &str) -> Self {
        Self::detect_with_limit(text, MAX_DETECTED_SECTIONS)
    }

    pub fn detect_with_limit(text: &str, max_sections: usize) -> Self {
        let lines: Vec<&str> = text.split('\n').collect();
        let detected_sections = lines
            .iter()
            .map(|line| line.trim())
            .filter(|line| is_heading_like(line))
            .take(max_sections)
            .map(str::to_string)
            .collect();

        Self {
            has_numbered_sections: lines.iter().any(|line| NUMBERED_RE.is_match(line)),
            has_letter_sections: lines.iter().any(|line| LETTERED_RE.is_match(line)),
            has_bullet_points: lines.iter().any(|line| BULLET_RE.is_match(line)),
            has_definitions: DEFINITION_RE.is_match(text),
            detected_sections,
        }
    }

    /// Human-readable names of the structural features present.
    pub fn features(&self) -> Vec<&'static str> {
        let mut features = Vec::new();
        if self.has_numbered_sections {
            features.push("Numbered sections");
        }
        if self.has_letter_sections {
            features.push("Letter/Roman sections");
        }
        if self.has_bullet_points {
            features.push("Bullet points");
        }
        if self.has_definitions {
            features.push("Definitions section");
        }
        features
    }
}

fn is_heading_like(trimmed: &str) -> bool {
    trimmed.encode_utf16().count() > 3 && HEADING_RE.is_match(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_numbered_sections() {
        let s = DocumentStructure::detect("1. Introduction\n2. Background\nBody text.");
        assert!(s.has_numbered_sections);
        assert!(!s.has_bullet_points);
    }

    #[test]
    fn nested_numbering_counts() {
        assert!(DocumentStructure::detect("  1.2.3 Scope of works").has_numbered_sections);
        assert!(!DocumentStructure::detect("1.Scope").has_numbered_sections);
        assert!(!DocumentStructure::detect("Version 1. Draft").has_numbered_sections);
    }

    #[test]
    fn detects_letter_and_roman_sections() {
        assert!(DocumentStructure::detect("(a) the Purchaser").has_letter_sections);
        assert!(DocumentStructure::detect("  (B) the Vendor").has_letter_sections);
        assert!(DocumentStructure::detect("subject to paragraph (iv) below").has_letter_sections);
        assert!(!DocumentStructure::detect("see (ab) below").has_letter_sections);
    }

    #[test]
    fn detects_bullets() {
        assert!(DocumentStructure::detect("- item").has_bullet_points);
        assert!(DocumentStructure::detect("  • item").has_bullet_points);
        assert!(DocumentStructure::detect("* item").has_bullet_points);
        assert!(!DocumentStructure::detect("-item").has_bullet_points);
    }

    #[test]
    fn detects_definitions() {
        let text = "In this Agreement, \"Business Day\" means a day other than a Saturday.";
        assert!(DocumentStructure::detect(text).has_definitions);
        assert!(DocumentStructure::detect("\"Goods\" SHALL MEAN the items.").has_definitions);
        assert!(!DocumentStructure::detect("Goods means the items.").has_definitions);
    }

    #[test]
    fn collects_heading_like_lines() {
        let text = "DEFINITIONS\nGoverning Law\nThe parties agree.\nTerm\nEnd\n  PAYMENT TERMS  ";
        let s = DocumentStructure::detect(text);
        assert_eq!(
            s.detected_sections,
            vec!["DEFINITIONS", "Governing Law", "Term", "PAYMENT TERMS"]
        );
    }

    #[test]
    fn heading_list_is_capped() {
        let text = (0..30).map(|_| "Schedule").collect::<Vec<_>>().join("\n");
        assert_eq!(DocumentStructure::detect(&text).detected_sections.len(), 20);
        assert_eq!(
            DocumentStructure::detect_with_limit(&text, 5).detected_sections.len(),
            5
        );
    }

    #[test]
    fn empty_text_has_no_structure() {
        assert_eq!(DocumentStructure::detect(""), DocumentStructure::default());
    }

    #[test]
    fn feature_names_follow_detection_order() {
        let s = DocumentStructure::detect("1. One\n- bullet\n\"X\" means y");
        assert_eq!(
            s.features(),
            vec!["Numbered sections", "Bullet points", "Definitions section"]
        );
    }
}
