//! Singapore case-law and statute citation extraction.
//!
//! Four neutral and reported case formats are recognized (`[2020] 2 SLR 123`,
//! `[1999] 1 SLR(R) 5`, `[2021] SGCA 5`, `[2019] SGHC 12`) plus statutes cited
//! by chapter, e.g. `Evidence Act (Cap. 97, 1997 Rev Ed)`. Offsets are byte
//! offsets into the scanned text.

use std::collections::HashSet;

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static SLR_R_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([0-9]{4})\]\s+([0-9]+)\s+SLR\(R\)\s+([0-9]+)").expect("valid slr(r) regex")
});
static SLR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([0-9]{4})\]\s+([0-9]+)\s+SLR\s+([0-9]+)").expect("valid slr regex")
});
static SGCA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([0-9]{4})\]\s+SGCA\s+([0-9]+)").expect("valid sgca regex"));
static SGHC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([0-9]{4})\]\s+SGHC\s+([0-9]+)").expect("valid sghc regex"));
static STATUTE_CAP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b([A-Z][A-Za-z0-9&'/-]*(?:\s+[A-Z][A-Za-z0-9&'/-]*)*\s+Act)\s*\((Cap\.?\s*[0-9A-Z]+(?:\s*,\s*[0-9]{4}\s+Rev\s+Ed)?)\)",
    )
    .expect("valid statute regex")
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static CAP_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^Cap\.?\s*").expect("valid cap prefix regex"));
static REV_ED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([0-9]{4})\s+rev\.?\s*ed").expect("valid rev ed regex"));
static SGCA_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bsgca\b").expect("valid sgca word regex"));
static SGHC_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bsghc\b").expect("valid sghc word regex"));

static SLR_R_FORMAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[[0-9]{4}\]\s+[0-9]+\s+SLR\(R\)\s+[0-9]+$").expect("valid slr(r) format")
});
static SLR_FORMAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[[0-9]{4}\]\s+[0-9]+\s+SLR\s+[0-9]+$").expect("valid slr format")
});
static SGCA_FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[[0-9]{4}\]\s+SGCA\s+[0-9]+$").expect("valid sgca format"));
static SGHC_FORMAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[[0-9]{4}\]\s+SGHC\s+[0-9]+$").expect("valid sghc format"));
static STATUTE_FORMAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^.+\s+\(Cap\.\s+[0-9A-Z]+(?:,\s*[0-9]{4}\s+Rev Ed)?\)$")
        .expect("valid statute format")
});

/// Earliest year accepted for a law report.
pub const MIN_REASONABLE_YEAR: i32 = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    SlrR,
    Slr,
    Sgca,
    Sghc,
    StatuteCap,
}

impl CitationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CitationKind::SlrR => "slr_r",
            CitationKind::Slr => "slr",
            CitationKind::Sgca => "sgca",
            CitationKind::Sghc => "sghc",
            CitationKind::StatuteCap => "statute_cap",
        }
    }
}

/// A citation as it appears in the text. Numeric parts too large to
/// represent are left empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedCitation {
    pub kind: CitationKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_or_decision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statute_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_number: Option<String>,
}

impl ExtractedCitation {
    fn new(kind: CitationKind, text: &str, start: usize) -> Self {
        Self {
            kind,
            text: text.to_string(),
            start,
            end: start + text.len(),
            year: None,
            volume: None,
            page_or_decision: None,
            statute_name: None,
            cap_number: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCitation {
    #[serde(flatten)]
    pub citation: ExtractedCitation,
    pub normalized_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Incomplete,
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Incomplete,
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub code: &'static str,
    pub message: &'static str,
    pub severity: IssueSeverity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedCitation {
    #[serde(flatten)]
    pub citation: NormalizedCitation,
    pub validation_status: ValidationStatus,
    pub validation_issues: Vec<ValidationIssue>,
    pub is_valid: bool,
}

/// Every citation found in `text`, ordered by position.
pub fn extract_citations(text: &str) -> Vec<ExtractedCitation> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut found = Vec::new();
    for (kind, re) in [
        (CitationKind::SlrR, &*SLR_R_RE),
        (CitationKind::Slr, &*SLR_RE),
        (CitationKind::Sgca, &*SGCA_RE),
        (CitationKind::Sghc, &*SGHC_RE),
    ] {
        for caps in re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let mut citation = ExtractedCitation::new(kind, whole.as_str(), whole.start());
            citation.year = number(caps.get(1));
            match kind {
                CitationKind::SlrR | CitationKind::Slr => {
                    citation.volume = number(caps.get(2));
                    citation.page_or_decision = number(caps.get(3));
                }
                _ => citation.page_or_decision = number(caps.get(2)),
            }
            found.push(citation);
        }
    }

    for caps in STATUTE_CAP_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let mut citation =
            ExtractedCitation::new(CitationKind::StatuteCap, whole.as_str(), whole.start());
        citation.statute_name = caps.get(1).map(|m| m.as_str().to_string());
        citation.cap_number = caps.get(2).map(|m| compact_whitespace(m.as_str()));
        found.push(citation);
    }

    let mut seen = HashSet::new();
    found.retain(|c| {
        seen.insert(format!(
            "{}:{}:{}:{}",
            c.kind.as_str(),
            c.start,
            c.end,
            c.text
        ))
    });
    found.sort_by_key(|c| c.start);
    tracing::debug!(count = found.len(), "extracted citations");
    found
}

fn number(m: Option<regex::Match<'_>>) -> Option<u32> {
    m.and_then(|m| m.as_str().parse().ok())
}

fn compact_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// Canonical spelling: `[2020] 2 SLR 123`, `[2021] SGCA 5`,
/// `Evidence Act (Cap. 97, 1997 Rev Ed)`.
pub fn normalize_citation(citation: ExtractedCitation) -> NormalizedCitation {
    let normalized_text = match citation.kind {
        CitationKind::SlrR | CitationKind::Slr => {
            let series = if citation.kind == CitationKind::SlrR {
                "SLR(R)"
            } else {
                "SLR"
            };
            match (citation.year, citation.volume, citation.page_or_decision) {
                (Some(year), Some(volume), Some(page)) => {
                    format!("[{year}] {volume} {series} {page}")
                }
                _ => compact_whitespace(&citation.text),
            }
        }
        CitationKind::Sgca | CitationKind::Sghc => {
            let (court, word_re) = if citation.kind == CitationKind::Sgca {
                ("SGCA", &*SGCA_WORD_RE)
            } else {
                ("SGHC", &*SGHC_WORD_RE)
            };
            match (citation.year, citation.page_or_decision) {
                (Some(year), Some(decision)) => format!("[{year}] {court} {decision}"),
                _ => word_re
                    .replace_all(&compact_whitespace(&citation.text), court)
                    .into_owned(),
            }
        }
        CitationKind::StatuteCap => {
            let name = compact_whitespace(
                citation
                    .statute_name
                    .as_deref()
                    .unwrap_or(citation.text.as_str()),
            );
            let cap = normalize_cap_number(citation.cap_number.as_deref().unwrap_or(""));
            format!("{name} ({cap})")
        }
    };

    NormalizedCitation {
        citation,
        normalized_text,
    }
}

fn normalize_cap_number(cap: &str) -> String {
    let compact = compact_whitespace(cap);
    let without_prefix = CAP_PREFIX_RE.replace(&compact, "");
    let rev_ed = REV_ED_RE.replace_all(&without_prefix, "$1 Rev Ed");
    format!("Cap. {rev_ed}")
}

pub fn normalize_citations(citations: Vec<ExtractedCitation>) -> Vec<NormalizedCitation> {
    citations.into_iter().map(normalize_citation).collect()
}

/// This year in UTC.
pub fn current_year() -> i32 {
    Utc::now().year()
}

fn present(value: Option<u32>) -> bool {
    value.is_some_and(|v| v != 0)
}

fn reasonable_year(year: u32, current_year: i32) -> bool {
    let year = i64::from(year);
    year >= i64::from(MIN_REASONABLE_YEAR) && year <= i64::from(current_year) + 1
}

const YEAR_OUT_OF_RANGE: ValidationIssue = ValidationIssue {
    code: "YEAR_OUT_OF_RANGE",
    message: "Citation year is outside the expected legal reporting range.",
    severity: IssueSeverity::Malformed,
};

/// Checks completeness, year range (up to next year) and canonical format.
pub fn validate_citation(citation: NormalizedCitation, current_year: i32) -> ValidatedCitation {
    let mut issues = Vec::new();
    let c = &citation.citation;

    let (missing, format_re, kind_issues) = match c.kind {
        CitationKind::SlrR => (
            !present(c.year) || !present(c.volume) || !present(c.page_or_decision),
            &*SLR_R_FORMAT_RE,
            issue_pair(
                "SLR_R_MISSING_FIELDS",
                "SLR(R) citation is missing year, volume, or page number.",
                "SLR_R_FORMAT_INVALID",
                "SLR(R) citation format is malformed.",
            ),
        ),
        CitationKind::Slr => (
            !present(c.year) || !present(c.volume) || !present(c.page_or_decision),
            &*SLR_FORMAT_RE,
            issue_pair(
                "SLR_MISSING_FIELDS",
                "SLR citation is missing year, volume, or page number.",
                "SLR_FORMAT_INVALID",
                "SLR citation format is malformed.",
            ),
        ),
        CitationKind::Sgca => (
            !present(c.year) || !present(c.page_or_decision),
            &*SGCA_FORMAT_RE,
            issue_pair(
                "SGCA_MISSING_FIELDS",
                "SGCA citation is missing year or decision number.",
                "SGCA_FORMAT_INVALID",
                "SGCA citation format is malformed.",
            ),
        ),
        CitationKind::Sghc => (
            !present(c.year) || !present(c.page_or_decision),
            &*SGHC_FORMAT_RE,
            issue_pair(
                "SGHC_MISSING_FIELDS",
                "SGHC citation is missing year or decision number.",
                "SGHC_FORMAT_INVALID",
                "SGHC citation format is malformed.",
            ),
        ),
        CitationKind::StatuteCap => (
            c.statute_name.as_deref().map_or(true, str::is_empty)
                || c.cap_number.as_deref().map_or(true, str::is_empty),
            &*STATUTE_FORMAT_RE,
            issue_pair(
                "STATUTE_MISSING_FIELDS",
                "Statute citation is missing statute name or cap number.",
                "STATUTE_CAP_FORMAT_INVALID",
                "Statute cap citation format is malformed.",
            ),
        ),
    };

    if missing {
        issues.push(kind_issues.0);
    }
    if c.kind != CitationKind::StatuteCap {
        if let Some(year) = c.year.filter(|y| *y != 0) {
            if !reasonable_year(year, current_year) {
                issues.push(YEAR_OUT_OF_RANGE);
            }
        }
    }
    if !format_re.is_match(&citation.normalized_text) {
        issues.push(kind_issues.1);
    }

    let validation_status = if issues.iter().any(|i| i.severity == IssueSeverity::Malformed) {
        ValidationStatus::Malformed
    } else if issues.is_empty() {
        ValidationStatus::Valid
    } else {
        ValidationStatus::Incomplete
    };

    ValidatedCitation {
        citation,
        validation_status,
        is_valid: validation_status == ValidationStatus::Valid,
        validation_issues: issues,
    }
}

fn issue_pair(
    missing_code: &'static str,
    missing_message: &'static str,
    format_code: &'static str,
    format_message: &'static str,
) -> (ValidationIssue, ValidationIssue) {
    (
        ValidationIssue {
            code: missing_code,
            message: missing_message,
            severity: IssueSeverity::Incomplete,
        },
        ValidationIssue {
            code: format_code,
            message: format_message,
            severity: IssueSeverity::Malformed,
        },
    )
}

pub fn validate_citations(
    citations: Vec<NormalizedCitation>,
    current_year: i32,
) -> Vec<ValidatedCitation> {
    citations
        .into_iter()
        .map(|c| validate_citation(c, current_year))
        .collect()
}

/// Extract, normalize and validate in one pass.
pub fn check_citations(text: &str, current_year: i32) -> Vec<ValidatedCitation> {
    validate_citations(normalize_citations(extract_citations(text)), current_year)
}
