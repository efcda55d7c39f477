//! Slash commands typed into the chat box.
//!
//! Commands are parsed from a message of the form `/command args`. A few
//! are answered locally (`/analyze-document`, `/extract-entities`,
//! `/generate-document`); the
//! ones that need a model or the network are handed to an
//! [`ExternalCommands`] implementation, and the rest go to the assistant.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::conversation::{Artifact, ArtifactKind};
use crate::entities::{format_entity_report, EntityExtractor};
use crate::error::CommandError;
use crate::report::TextAnalyzer;

static COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^/([a-z-]+)\s*(.*)").expect("valid command regex"));
static INLINE_COMMAND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*/([\w-]+)(?:\s+([^)]*))?\s*\)").expect("valid inline command regex")
});
static JSON_PAYLOAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(\{.*\})").expect("valid json payload regex"));
static HEADING_MARK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#+\s*").expect("valid heading mark regex"));

/// Nested `(/command ...)` expansions performed before giving up.
pub const MAX_RESOLVE_DEPTH: usize = 5;

const DEFAULT_DOCUMENT_TITLE: &str = "Generated Document";

static DEFAULT_ENTITIES: Lazy<EntityExtractor> = Lazy::new(EntityExtractor::default);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    ExtractEntities,
    AnalyzeDocument,
    SummarizeLocal,
    NerAdvanced,
    ClassifyText,
    SearchCaseLaw,
    ResearchStatute,
    AnalyzeContract,
    SummarizeDocument,
    DraftClause,
    CheckCompliance,
    DueDiligenceReview,
    GenerateDocument,
    FetchUrl,
    WebSearch,
}

impl CommandKind {
    /// Every command, in menu order.
    pub const ALL: [CommandKind; 15] = [
        CommandKind::ExtractEntities,
        CommandKind::AnalyzeDocument,
        CommandKind::SummarizeLocal,
        CommandKind::NerAdvanced,
        CommandKind::ClassifyText,
        CommandKind::SearchCaseLaw,
        CommandKind::ResearchStatute,
        CommandKind::AnalyzeContract,
        CommandKind::SummarizeDocument,
        CommandKind::DraftClause,
        CommandKind::CheckCompliance,
        CommandKind::DueDiligenceReview,
        CommandKind::GenerateDocument,
        CommandKind::FetchUrl,
        CommandKind::WebSearch,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            CommandKind::ExtractEntities => "extract-entities",
            CommandKind::AnalyzeDocument => "analyze-document",
            CommandKind::SummarizeLocal => "summarize-local",
            CommandKind::NerAdvanced => "ner-advanced",
            CommandKind::ClassifyText => "classify-text",
            CommandKind::SearchCaseLaw => "search-case-law",
            CommandKind::ResearchStatute => "research-statute",
            CommandKind::AnalyzeContract => "analyze-contract",
            CommandKind::SummarizeDocument => "summarize-document",
            CommandKind::DraftClause => "draft-clause",
            CommandKind::CheckCompliance => "check-compliance",
            CommandKind::DueDiligenceReview => "due-diligence-review",
            CommandKind::GenerateDocument => "generate-document",
            CommandKind::FetchUrl => "fetch-url",
            CommandKind::WebSearch => "web-search",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.id() == id)
    }

    pub fn description(&self) -> &'static str {
        match self {
            CommandKind::ExtractEntities => {
                "Identify persons, organizations, dates, and legal references (Local)"
            }
            CommandKind::AnalyzeDocument => {
                "Get document statistics, readability, and structure (Local)"
            }
            CommandKind::SummarizeLocal => {
                "Summarize text using local ONNX model (requires download)"
            }
            CommandKind::NerAdvanced => "Advanced NER using BERT model (requires download)",
            CommandKind::ClassifyText => {
                "Classify text sentiment using local model (requires download)"
            }
            CommandKind::SearchCaseLaw => "Search Singapore legal database for relevant cases",
            CommandKind::ResearchStatute => "Look up statutory provisions and interpretations",
            CommandKind::AnalyzeContract => {
                "Extract key terms, obligations, and risks from contract"
            }
            CommandKind::SummarizeDocument => "Generate concise summary of legal document",
            CommandKind::DraftClause => "Generate legal clause based on requirements",
            CommandKind::CheckCompliance => "Verify regulatory compliance for Singapore law",
            CommandKind::DueDiligenceReview => "Conduct legal due diligence checklist",
            CommandKind::GenerateDocument => "Generate a downloadable text or markdown document",
            CommandKind::FetchUrl => "Fetch and extract text content from a URL",
            CommandKind::WebSearch => "Search the web for information",
        }
    }

    /// Local commands never reach the assistant.
    pub fn is_local(&self) -> bool {
        !matches!(
            self,
            CommandKind::SearchCaseLaw
                | CommandKind::ResearchStatute
                | CommandKind::AnalyzeContract
                | CommandKind::SummarizeDocument
                | CommandKind::DraftClause
                | CommandKind::CheckCompliance
                | CommandKind::DueDiligenceReview
        )
    }

    /// Downloadable model a local command depends on.
    pub fn required_model(&self) -> Option<&'static str> {
        match self {
            CommandKind::SummarizeLocal => Some("summarization"),
            CommandKind::NerAdvanced => Some("ner"),
            CommandKind::ClassifyText => Some("text-classification"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedCommand {
    #[serde(rename = "command")]
    pub kind: CommandKind,
    pub args: String,
    pub is_local: bool,
}

impl ParsedCommand {
    pub fn new(kind: CommandKind, args: impl Into<String>) -> Self {
        Self {
            kind,
            args: args.into(),
            is_local: kind.is_local(),
        }
    }
}

/// Recognizes `/command args`. Unknown commands and plain messages yield `None`.
pub fn parse_command(message: &str) -> Option<ParsedCommand> {
    let captures = COMMAND_RE.captures(message.trim())?;
    let id = captures.get(1)?.as_str().to_lowercase();
    let kind = CommandKind::from_id(&id)?;
    let args = captures.get(2).map_or("", |m| m.as_str()).trim();
    Some(ParsedCommand::new(kind, args))
}

/// Document payload produced by `/generate-document`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub content: String,
}

impl GeneratedArtifact {
    pub fn into_artifact(
        self,
        id: impl Into<String>,
        message_id: impl Into<String>,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Artifact {
        Artifact {
            id: id.into(),
            kind: self.kind,
            title: self.title,
            content: self.content,
            created_at,
            message_id: message_id.into(),
        }
    }
}

/// Result of the synchronous local step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CommandOutcome {
    Completed {
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        artifact: Option<GeneratedArtifact>,
    },
    /// Needs a model or network access; run through [`ExternalCommands`].
    Deferred {
        #[serde(rename = "requiresModel", skip_serializing_if = "Option::is_none")]
        required_model: Option<&'static str>,
    },
    Failed {
        message: String,
    },
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, CommandOutcome::Failed { .. })
    }
}

/// Executes commands that need resources outside this crate.
pub trait ExternalCommands {
    fn execute(&self, command: &ParsedCommand) -> Result<String, CommandError>;
}

pub struct CommandProcessor<'a> {
    analyzer: &'a TextAnalyzer,
    entities: &'a EntityExtractor,
    external: Option<&'a dyn ExternalCommands>,
}

impl<'a> CommandProcessor<'a> {
    pub fn new(analyzer: &'a TextAnalyzer) -> Self {
        Self {
            analyzer,
            entities: &DEFAULT_ENTITIES,
            external: None,
        }
    }

    /// Uses `entities` for `/extract-entities` instead of the built-in tagger.
    pub fn with_entities(mut self, entities: &'a EntityExtractor) -> Self {
        self.entities = entities;
        self
    }

    pub fn with_external(mut self, external: &'a dyn ExternalCommands) -> Self {
        self.external = Some(external);
        self
    }

    pub fn process(&self, command: &ParsedCommand) -> CommandOutcome {
        self.outcome_for(command.kind.id(), &command.args)
    }

    /// Local step, then the external executor for deferred commands.
    pub fn execute(&self, command: &ParsedCommand) -> Result<String, String> {
        self.run(command.kind.id(), &command.args)
    }

    /// Replaces each `(/command args)` with its output, innermost text
    /// first, up to [`MAX_RESOLVE_DEPTH`] expansions. Failures are inlined
    /// as `[Error: ...]`.
    pub fn resolve(&self, text: &str) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_RESOLVE_DEPTH {
            let (range, id, args) = match INLINE_COMMAND_RE.captures(&current) {
                Some(captures) => {
                    let Some(whole) = captures.get(0) else { break };
                    let id = captures.get(1).map_or("", |m| m.as_str()).to_string();
                    let args = captures
                        .get(2)
                        .map_or("", |m| m.as_str())
                        .trim()
                        .to_string();
                    (whole.range(), id, args)
                }
                None => break,
            };

            tracing::debug!(command = %id, "resolving inline command");
            let replacement = match self.run(&id, &args) {
                Ok(content) => content,
                Err(message) => format!("[Error: {message}]"),
            };
            current.replace_range(range, &replacement);
        }
        current
    }

    fn run(&self, id: &str, args: &str) -> Result<String, String> {
        match self.outcome_for(id, args) {
            CommandOutcome::Completed { content, .. } => Ok(content),
            CommandOutcome::Failed { message } => Err(message),
            CommandOutcome::Deferred { .. } => {
                let Some(kind) = CommandKind::from_id(id) else {
                    return Err(format!("Command /{id} is not a local command."));
                };
                let external = self
                    .external
                    .ok_or_else(|| CommandError::Unavailable(id.to_string()).to_string())?;
                external
                    .execute(&ParsedCommand::new(kind, args))
                    .map_err(|err| err.to_string())
            }
        }
    }

    fn outcome_for(&self, id: &str, args: &str) -> CommandOutcome {
        if args.trim().is_empty() {
            return CommandOutcome::Failed {
                message: format!(
                    "Please provide text after the /{id} command.\n\nExample:\n`/{id} [your text here]`"
                ),
            };
        }

        match CommandKind::from_id(id) {
            Some(CommandKind::AnalyzeDocument) => CommandOutcome::Completed {
                content: self.analyzer.format_report(args),
                artifact: None,
            },
            Some(CommandKind::ExtractEntities) => CommandOutcome::Completed {
                content: format_entity_report(&self.entities.extract(args)),
                artifact: None,
            },
            Some(CommandKind::GenerateDocument) => {
                let artifact = generate_document(args);
                CommandOutcome::Completed {
                    content: format!(
                        "Document \"{}\" generated successfully. Check the Artifacts tab.",
                        artifact.title
                    ),
                    artifact: Some(artifact),
                }
            }
            Some(kind) if kind.is_local() => CommandOutcome::Deferred {
                required_model: kind.required_model(),
            },
            _ => CommandOutcome::Failed {
                message: format!("Command /{id} is not a local command."),
            },
        }
    }
}

/// Builds the artifact for `/generate-document`.
///
/// A `{...}` JSON payload may set `title`, `type` and `content`. Otherwise a
/// leading `#` line becomes the title and the whole input is the content.
pub fn generate_document(args: &str) -> GeneratedArtifact {
    let mut artifact = GeneratedArtifact {
        title: DEFAULT_DOCUMENT_TITLE.to_string(),
        kind: ArtifactKind::Markdown,
        content: args.to_string(),
    };

    if let Some(payload) = JSON_PAYLOAD_RE.captures(args).and_then(|c| c.get(1)) {
        match serde_json::from_str::<serde_json::Value>(payload.as_str()) {
            Ok(value) => {
                if let Some(title) = non_empty_str(&value, "title") {
                    artifact.title = title.to_string();
                }
                match non_empty_str(&value, "type") {
                    Some("text") => artifact.kind = ArtifactKind::Text,
                    Some("markdown") | None => {}
                    Some(other) => tracing::debug!(kind = other, "unknown document type"),
                }
                if let Some(content) = non_empty_str(&value, "content") {
                    artifact.content = content.to_string();
                }
            }
            Err(err) => tracing::warn!(%err, "generate-document payload is not valid JSON"),
        }
    } else if let Some(first) = args.split('\n').next().filter(|line| line.starts_with('#')) {
        artifact.title = HEADING_MARK_RE.replace(first, "").trim().to_string();
    }

    artifact
}

fn non_empty_str<'v>(value: &'v serde_json::Value, key: &str) -> Option<&'v str> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Local step with the default analyzer.
pub fn process_local_command(command: &ParsedCommand) -> CommandOutcome {
    CommandProcessor::new(&TextAnalyzer::default()).process(command)
}

/// Expands inline `(/command args)` calls with the default analyzer.
pub fn resolve_command_string(text: &str, external: Option<&dyn ExternalCommands>) -> String {
    let analyzer = TextAnalyzer::default();
    let mut processor = CommandProcessor::new(&analyzer);
    if let Some(external) = external {
        processor = processor.with_external(external);
    }
    processor.resolve(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Echo {
        calls: Cell<usize>,
        reply: fn(&ParsedCommand) -> Result<String, CommandError>,
    }

    impl Echo {
        fn new(reply: fn(&ParsedCommand) -> Result<String, CommandError>) -> Self {
            Self {
                calls: Cell::new(0),
                reply,
            }
        }
    }

    impl ExternalCommands for Echo {
        fn execute(&self, command: &ParsedCommand) -> Result<String, CommandError> {
            self.calls.set(self.calls.get() + 1);
            (self.reply)(command)
        }
    }

    #[test]
    fn parses_command_with_arguments() {
        assert_eq!(
            parse_command("/extract-entities John Tan v ABC Pte Ltd"),
            Some(ParsedCommand {
                kind: CommandKind::ExtractEntities,
                args: "John Tan v ABC Pte Ltd".to_string(),
                is_local: true,
            })
        );
    }

    #[test]
    fn unknown_or_plain_messages_are_not_commands() {
        assert_eq!(parse_command("/not-a-real-command something"), None);
        assert_eq!(parse_command("analyze-document text"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn parse_keeps_multiline_arguments_and_ignores_case() {
        let parsed = parse_command("  /Analyze-Document Clause 1\nClause 2\nClause 3  ").unwrap();
        assert_eq!(parsed.kind, CommandKind::AnalyzeDocument);
        assert_eq!(parsed.args, "Clause 1\nClause 2\nClause 3");

        let remote = parse_command("/draft-clause indemnity").unwrap();
        assert!(!remote.is_local);
    }

    #[test]
    fn catalog_ids_round_trip() {
        assert_eq!(CommandKind::ALL.len(), 15);
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_id(kind.id()), Some(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.id()));
        }
        assert_eq!(CommandKind::ALL.iter().filter(|k| k.is_local()).count(), 8);
    }

    #[test]
    fn empty_arguments_explain_usage() {
        let outcome = process_local_command(&ParsedCommand::new(CommandKind::AnalyzeDocument, ""));
        assert_eq!(
            outcome,
            CommandOutcome::Failed {
                message: "Please provide text after the /analyze-document command.\n\nExample:\n`/analyze-document [your text here]`".to_string()
            }
        );
    }

    #[test]
    fn analyze_document_runs_locally() {
        let outcome = process_local_command(&ParsedCommand::new(
            CommandKind::AnalyzeDocument,
            "The tenant shall pay rent.",
        ));
        match outcome {
            CommandOutcome::Completed { content, artifact } => {
                assert!(content.starts_with("## Document Analysis Results"));
                assert!(artifact.is_none());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn extract_entities_runs_locally() {
        let outcome = process_local_command(&ParsedCommand::new(
            CommandKind::ExtractEntities,
            "Mr John Tan sued ABC Pte Ltd in [2020] SGHC 5.",
        ));
        match outcome {
            CommandOutcome::Completed { content, artifact } => {
                assert!(content.starts_with("## Entity Extraction Results"));
                assert!(content.contains("### People (1)\n- Mr John Tan\n"));
                assert!(content.contains("### Organizations (1)\n- ABC Pte Ltd\n"));
                assert!(content.contains("### Legal Citations (1)\n- [2020] SGHC 5\n"));
                assert!(artifact.is_none());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            resolve_command_string("(/extract-entities no names here)", None),
            "No entities found in the provided text."
        );
    }

    #[test]
    fn generate_document_reads_json_payload() {
        let outcome = process_local_command(&ParsedCommand::new(
            CommandKind::GenerateDocument,
            r#"Here: {"title": "NDA", "type": "text", "content": "Terms"}"#,
        ));
        assert_eq!(
            outcome,
            CommandOutcome::Completed {
                content: "Document \"NDA\" generated successfully. Check the Artifacts tab."
                    .to_string(),
                artifact: Some(GeneratedArtifact {
                    title: "NDA".to_string(),
                    kind: ArtifactKind::Text,
                    content: "Terms".to_string(),
                }),
            }
        );
    }

    #[test]
    fn generate_document_uses_heading_as_title() {
        let artifact = generate_document("## Lease Summary\nThe lease runs for two years.");
        assert_eq!(artifact.title, "Lease Summary");
        assert_eq!(artifact.kind, ArtifactKind::Markdown);
        assert_eq!(artifact.content, "## Lease Summary\nThe lease runs for two years.");
    }

    #[test]
    fn generate_document_falls_back_on_bad_json() {
        let artifact = generate_document("{not json}");
        assert_eq!(artifact.title, "Generated Document");
        assert_eq!(artifact.content, "{not json}");
    }

    #[test]
    fn generated_artifact_attaches_to_message() {
        let created = chrono::Utc::now();
        let artifact = generate_document("# Memo\nbody").into_artifact("art-1", "m1", created);
        assert_eq!(artifact.title, "Memo");
        assert_eq!(artifact.message_id, "m1");
        assert_eq!(artifact.created_at, created);
    }

    #[test]
    fn model_commands_are_deferred() {
        let outcome =
            process_local_command(&ParsedCommand::new(CommandKind::NerAdvanced, "John Tan"));
        assert_eq!(
            outcome,
            CommandOutcome::Deferred {
                required_model: Some("ner")
            }
        );
        let outcome =
            process_local_command(&ParsedCommand::new(CommandKind::FetchUrl, "https://x.sg"));
        assert_eq!(
            outcome,
            CommandOutcome::Deferred {
                required_model: None
            }
        );
    }

    #[test]
    fn remote_commands_are_not_local() {
        let outcome =
            process_local_command(&ParsedCommand::new(CommandKind::DraftClause, "indemnity"));
        assert_eq!(
            outcome,
            CommandOutcome::Failed {
                message: "Command /draft-clause is not a local command.".to_string()
            }
        );
        assert!(!outcome.is_success());
    }

    #[test]
    fn resolves_inline_analysis() {
        let resolved = resolve_command_string("Before (/analyze-document Hello world.) after", None);
        assert!(resolved.starts_with("Before ## Document Analysis Results"));
        assert!(resolved.ends_with(" after"));
    }

    #[test]
    fn inline_failures_are_marked() {
        assert_eq!(
            resolve_command_string("x (/nope thing) y", None),
            "x [Error: Command /nope is not a local command.] y"
        );
        assert_eq!(
            resolve_command_string("(/web-search rust)", None),
            "[Error: command /web-search is not available]"
        );
    }

    #[test]
    fn deferred_commands_use_external_executor() {
        let echo = Echo::new(|command| Ok(format!("<{}:{}>", command.kind.id(), command.args)));
        let resolved = resolve_command_string("a (/web-search rust lang) b (/fetch-url x)", Some(&echo));
        assert_eq!(resolved, "a <web-search:rust lang> b <fetch-url:x>");
        assert_eq!(echo.calls.get(), 2);

        let failing = Echo::new(|command| {
            Err(CommandError::Failed {
                command: command.kind.id().to_string(),
                message: "offline".to_string(),
            })
        });
        assert_eq!(
            resolve_command_string("(/web-search q)", Some(&failing)),
            "[Error: command /web-search failed: offline]"
        );
    }

    #[test]
    fn resolution_stops_after_max_depth() {
        let recursive = Echo::new(|_| Ok("(/web-search again)".to_string()));
        let resolved = resolve_command_string("(/web-search start)", Some(&recursive));
        assert_eq!(resolved, "(/web-search again)");
        assert_eq!(recursive.calls.get(), MAX_RESOLVE_DEPTH);
    }

    #[test]
    fn text_without_commands_is_unchanged() {
        assert_eq!(resolve_command_string("plain (text) here", None), "plain (text) here");
    }
}
