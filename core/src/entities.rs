//! Named entities for `/extract-entities`.
//!
//! Contact details, URLs and legal citations come from fixed patterns.
//! People, organizations, places, dates and amounts come from an
//! [`EntityTagger`]; the built-in [`HeuristicEntityTagger`] works from
//! capitalization, honorifics and a small gazetteer.

use std::fmt::Write as _;

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::keywords::STOPWORDS;

const MONTHS: &str = "January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec";

const ORGANIZATION_SUFFIXES: &[&str] = &[
    "Pte", "Ltd", "Limited", "LLP", "LLC", "Inc", "Corporation", "Corp", "Holdings", "Group",
    "Bank", "Authority", "Council", "Board", "Agency", "University",
];

const PLACES: &[&str] = &[
    "Singapore", "Malaysia", "Indonesia", "Hong Kong", "China", "India", "Japan", "Australia",
    "United Kingdom", "England", "London", "United States", "New York", "Kuala Lumpur", "Johor",
    "Jurong", "Tampines", "Woodlands", "Changi", "Sentosa", "Orchard Road", "Raffles Place",
];

static LEGAL_CITATION_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)\[[0-9]{4}\]\s+[0-9]*\s*SLR\(R\)\s+[0-9]+",
        r"(?i)\[[0-9]{4}\]\s+[0-9]*\s*SLR\s+[0-9]+",
        r"(?i)\[[0-9]{4}\]\s+SGCA\s+[0-9]+",
        r"(?i)\[[0-9]{4}\]\s+SGHC\s+[0-9]+",
        r"(?i)\[[0-9]{4}\]\s+SGDC\s+[0-9]+",
        r"(?i)\[[0-9]{4}\]\s+SGMC\s+[0-9]+",
        r"(?i)Cap\.?\s+[0-9]+[A-Z]?",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid legal citation regex"))
    .collect()
});
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").expect("valid email regex")
});
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\+65\s?)?[689][0-9]{3}\s?[0-9]{4}").expect("valid phone regex"));
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("valid url regex"));

static HONORIFIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Mrs|Mr|Ms|Mdm|Miss|Dr|Prof|Justice|Judge)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*")
        .expect("valid honorific regex")
});
static PARTY_BEFORE_V_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,3})\s+v\.?\s").expect("valid party regex")
});
static PARTY_AFTER_V_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\sv\.?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+){1,3})\b").expect("valid party regex")
});
static ORGANIZATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:(?:[A-Z][A-Za-z0-9&'.-]*|&)\s+)*?[A-Z][A-Za-z0-9&'.-]*\s+(?:Pte\.?\s+Ltd|Private\s+Limited|Limited|Ltd|LLP|LLC|Inc|Corporation|Corp|Holdings|Group|Bank|Authority|Council|Board|Agency|University)\b",
    )
    .expect("valid organization regex")
});
static PLACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:{})\b", PLACES.join("|"))).expect("valid place regex")
});
static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b[0-9]{{1,2}}(?:st|nd|rd|th)?\s+(?:{MONTHS})\.?,?\s+[0-9]{{4}}\b|\b(?:{MONTHS})\.?\s+[0-9]{{1,2}}(?:st|nd|rd|th)?,?\s+[0-9]{{4}}\b|\b[0-9]{{4}}-[0-9]{{2}}-[0-9]{{2}}\b|\b[0-9]{{1,2}}/[0-9]{{1,2}}/[0-9]{{2,4}}\b"
    ))
    .expect("valid date regex")
});
static MONEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:S\$|US\$|SGD|USD|\$|£|€)\s?[0-9]+(?:,[0-9]{3})*(?:\.[0-9]+)?(?:\s?(?:million|billion|thousand|bn|m|k)\b)?|\b[0-9]+(?:,[0-9]{3})*(?:\.[0-9]+)?\s+(?:Singapore\s+)?dollars\b",
    )
    .expect("valid money regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    Organization,
    Place,
    Date,
    Money,
    LegalCitation,
    Email,
    Phone,
    Url,
}

impl EntityKind {
    /// Report order.
    pub const ALL: [EntityKind; 9] = [
        EntityKind::Person,
        EntityKind::Organization,
        EntityKind::Place,
        EntityKind::Date,
        EntityKind::Money,
        EntityKind::LegalCitation,
        EntityKind::Email,
        EntityKind::Phone,
        EntityKind::Url,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Person => "People",
            EntityKind::Organization => "Organizations",
            EntityKind::Place => "Places",
            EntityKind::Date => "Dates",
            EntityKind::Money => "Monetary Values",
            EntityKind::LegalCitation => "Legal Citations",
            EntityKind::Email => "Email Addresses",
            EntityKind::Phone => "Phone Numbers",
            EntityKind::Url => "URLs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub persons: usize,
    pub organizations: usize,
    pub places: usize,
    pub dates: usize,
    pub money: usize,
    pub legal_citations: usize,
    pub emails: usize,
    pub phones: usize,
    pub urls: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityReport {
    pub entities: Vec<Entity>,
    pub summary: EntitySummary,
}

impl EntityReport {
    fn from_entities(entities: Vec<Entity>) -> Self {
        let count = |kind: EntityKind| entities.iter().filter(|e| e.kind == kind).count();
        let summary = EntitySummary {
            persons: count(EntityKind::Person),
            organizations: count(EntityKind::Organization),
            places: count(EntityKind::Place),
            dates: count(EntityKind::Date),
            money: count(EntityKind::Money),
            legal_citations: count(EntityKind::LegalCitation),
            emails: count(EntityKind::Email),
            phones: count(EntityKind::Phone),
            urls: count(EntityKind::Url),
            total: entities.len(),
        };
        Self { entities, summary }
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }
}

/// Source of the entity kinds that need more than a fixed pattern.
pub trait EntityTagger {
    fn people(&self, text: &str) -> Vec<String>;
    fn organizations(&self, text: &str) -> Vec<String>;
    fn places(&self, text: &str) -> Vec<String>;
    fn dates(&self, text: &str) -> Vec<String>;
    fn money(&self, text: &str) -> Vec<String>;
}

/// Pattern-based tagger for Singapore legal text.
///
/// People are honorific-led names or individual parties in `A v B` case
/// names; organizations end in a corporate suffix; places come from a
/// fixed gazetteer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEntityTagger;

impl EntityTagger for HeuristicEntityTagger {
    fn people(&self, text: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = HONORIFIC_RE
            .find_iter(text)
            .map(|m| (m.start(), m.as_str().to_string()))
            .collect();
        for re in [&*PARTY_BEFORE_V_RE, &*PARTY_AFTER_V_RE] {
            for captures in re.captures_iter(text) {
                let Some(party) = captures.get(1) else { continue };
                let name = strip_function_words(party.as_str());
                let corporate = name
                    .rsplit(' ')
                    .next()
                    .is_some_and(|last| ORGANIZATION_SUFFIXES.contains(&last));
                if !name.is_empty() && !corporate {
                    found.push((party.start(), name));
                }
            }
        }
        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, name)| name).collect()
    }

    fn organizations(&self, text: &str) -> Vec<String> {
        ORGANIZATION_RE
            .find_iter(text)
            .map(|m| strip_function_words(m.as_str()))
            .filter(|name| !name.is_empty())
            .collect()
    }

    fn places(&self, text: &str) -> Vec<String> {
        matches(&PLACE_RE, text)
    }

    fn dates(&self, text: &str) -> Vec<String> {
        matches(&DATE_RE, text)
    }

    fn money(&self, text: &str) -> Vec<String> {
        matches(&MONEY_RE, text)
    }
}

fn matches(re: &Regex, text: &str) -> Vec<String> {
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

/// Drops leading function words picked up at sentence starts ("In", "The").
fn strip_function_words(name: &str) -> String {
    name.split_whitespace()
        .skip_while(|word| STOPWORDS.contains(&word.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct EntityExtractor {
    tagger: Box<dyn EntityTagger + Send + Sync>,
}

impl Default for EntityExtractor {
    fn default() -> Self {
        Self::new(HeuristicEntityTagger)
    }
}

impl EntityExtractor {
    pub fn new(tagger: impl EntityTagger + Send + Sync + 'static) -> Self {
        Self {
            tagger: Box::new(tagger),
        }
    }

    /// Entities in report order, each `(kind, text)` pair listed once.
    pub fn extract(&self, text: &str) -> EntityReport {
        let mut seen: IndexSet<(EntityKind, String)> = IndexSet::new();
        let tagged = [
            (EntityKind::Person, self.tagger.people(text)),
            (EntityKind::Organization, self.tagger.organizations(text)),
            (EntityKind::Place, self.tagger.places(text)),
            (EntityKind::Date, self.tagger.dates(text)),
            (EntityKind::Money, self.tagger.money(text)),
        ];
        for (kind, found) in tagged {
            seen.extend(found.into_iter().map(|t| (kind, t)));
        }
        for re in LEGAL_CITATION_RES.iter() {
            seen.extend(matches(re, text).into_iter().map(|t| (EntityKind::LegalCitation, t)));
        }
        seen.extend(matches(&EMAIL_RE, text).into_iter().map(|t| (EntityKind::Email, t)));
        seen.extend(matches(&PHONE_RE, text).into_iter().map(|t| (EntityKind::Phone, t)));
        seen.extend(matches(&URL_RE, text).into_iter().map(|t| (EntityKind::Url, t)));

        let entities = seen
            .into_iter()
            .map(|(kind, text)| Entity { text, kind })
            .collect();
        EntityReport::from_entities(entities)
    }
}

/// Markdown listing grouped by kind, as shown for `/extract-entities`.
pub fn format_entity_report(report: &EntityReport) -> String {
    if report.summary.total == 0 {
        return "No entities found in the provided text.".to_string();
    }

    let mut out = String::from("## Entity Extraction Results\n\n");
    let _ = write!(out, "**Total entities found: {}**\n\n", report.summary.total);
    for kind in EntityKind::ALL {
        let found: Vec<&Entity> = report.of_kind(kind).collect();
        if found.is_empty() {
            continue;
        }
        let _ = writeln!(out, "### {} ({})", kind.label(), found.len());
        for entity in found {
            let _ = writeln!(out, "- {}", entity.text);
        }
        out.push('\n');
    }
    out.push_str("---\n*Extracted using local NLP processing (no AI service required)*");
    out
}

pub fn extract_entities(text: &str) -> EntityReport {
    EntityExtractor::default().extract(text)
}
