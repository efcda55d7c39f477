use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use console::style;
use junas_core::{
    citations::{self, ValidationStatus},
    entities::{self, EntityKind},
    graph, tree, CommandOutcome, CommandProcessor, Config, Conversation, ConversationRecord,
    Message, Role, TextAnalyzer,
};
use serde::Deserialize;
use serde_yaml::Value as YamlValue;
use tracing_subscriber::EnvFilter;

/// Junas CLI entry point.
#[derive(Debug, Parser)]
#[command(
    name = "junas",
    about = "Analyze legal documents and inspect branching conversations."
)]
struct Cli {
    /// Path to config file (YAML). Defaults to junas.yml if present.
    #[arg(long, global = true, default_value = "junas.yml")]
    config: PathBuf,

    /// Emit JSON output for automation.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    json: bool,

    /// Set config overrides (repeatable as key=value). Example: --set analysis.keyword_limit=5
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    sets: Vec<String>,

    /// Increase log verbosity (-v debug, -vv trace). Otherwise JUNAS_LOG or RUST_LOG applies.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Full document analysis report (Markdown).
    Analyze(InputArgs),
    /// Word, sentence and paragraph counts with reading time.
    Stats(InputArgs),
    /// Most frequent key terms.
    Keywords {
        #[command(flatten)]
        input: InputArgs,
        /// Number of keywords (defaults to analysis.keyword_limit).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Numbering, bullets, definitions and headings.
    Structure(InputArgs),
    /// People, organizations, dates, amounts, citations and contact details.
    Entities(InputArgs),
    /// Extract and validate Singapore case and statute citations.
    Citations {
        #[command(flatten)]
        input: InputArgs,
        /// Latest plausible year is this plus one (defaults to the current year).
        #[arg(long)]
        year: Option<i32>,
    },
    /// Run a slash command such as `/analyze-document <text>`.
    Command {
        /// Message text, or `-` to read stdin.
        #[arg(value_name = "MESSAGE", default_value = "-")]
        message: String,
        /// Expand inline `(/command args)` calls instead of parsing a single command.
        #[arg(long, action = ArgAction::SetTrue)]
        resolve: bool,
    },
    /// Inspect or edit a stored conversation tree.
    #[command(subcommand)]
    Tree(TreeCommand),
}

#[derive(Debug, Args)]
struct InputArgs {
    /// File to analyze, or `-` for stdin.
    #[arg(value_name = "PATH", default_value = "-")]
    path: PathBuf,
}

#[derive(Debug, Subcommand)]
enum TreeCommand {
    /// Print the root-to-leaf history of the active (or given) branch.
    History {
        record: PathBuf,
        #[arg(long)]
        leaf: Option<String>,
    },
    /// List the alternatives sharing a node's parent.
    Siblings { record: PathBuf, node: String },
    /// Render the tree as Graphviz DOT.
    Graph {
        record: PathBuf,
        #[arg(long)]
        leaf: Option<String>,
        #[arg(long, action = ArgAction::SetTrue)]
        dark: bool,
    },
    /// Convert a flat message list (or legacy record) into a tree record.
    Import {
        input: PathBuf,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Add a message after the active leaf, or below `--parent` as a new branch.
    Append {
        record: PathBuf,
        #[arg(long, value_parser = parse_role, default_value = "user")]
        role: Role,
        #[arg(long)]
        content: String,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        id: Option<String>,
        /// Write the updated record back instead of printing it.
        #[arg(long, action = ArgAction::SetTrue)]
        in_place: bool,
    },
    /// Switch the active branch to the newest tip below a node.
    Switch {
        record: PathBuf,
        node: String,
        #[arg(long, action = ArgAction::SetTrue)]
        in_place: bool,
    },
    /// Report broken links and cycles. Exits non-zero when issues exist.
    Validate { record: PathBuf },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportInput {
    Record(ConversationRecord),
    Messages(Vec<Message>),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = load_config(&cli.config)?;
    apply_overrides(&mut cfg, &cli.sets)?;
    tracing::debug!(?cfg, "configuration loaded");

    let analyzer = TextAnalyzer::new(cfg.analysis.clone());
    match cli.command {
        Command::Analyze(input) => {
            let text = read_input(&input.path)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&analyzer.analyze(&text))?);
            } else {
                println!("{}", analyzer.format_report(&text));
            }
        }
        Command::Stats(input) => run_stats(&analyzer, &read_input(&input.path)?, cli.json)?,
        Command::Keywords { input, limit } => {
            let text = read_input(&input.path)?;
            let limit = limit.unwrap_or(cfg.analysis.keyword_limit);
            run_keywords(&analyzer, &text, limit, cli.json)?;
        }
        Command::Structure(input) => {
            run_structure(&analyzer, &read_input(&input.path)?, cli.json)?
        }
        Command::Entities(input) => run_entities(&read_input(&input.path)?, cli.json)?,
        Command::Citations { input, year } => {
            let text = read_input(&input.path)?;
            run_citations(&text, year.unwrap_or_else(citations::current_year), cli.json)?;
        }
        Command::Command { message, resolve } => {
            let text = if message == "-" {
                read_input(Path::new("-"))?
            } else {
                message
            };
            run_command(&analyzer, &text, resolve, cli.json)?;
        }
        Command::Tree(action) => run_tree(&cfg, action, cli.json)?,
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("JUNAS_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("junas=debug,junas_core=debug"),
        _ => EnvFilter::new("junas=trace,junas_core=trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let value: YamlValue = serde_yaml::from_str(&text)
        .with_context(|| format!("Failed to parse YAML {}", path.display()))?;
    if value.is_null() {
        return Ok(Config::default());
    }
    serde_yaml::from_value(value)
        .with_context(|| format!("Invalid config structure in {}", path.display()))
}

fn apply_overrides(cfg: &mut Config, sets: &[String]) -> anyhow::Result<()> {
    for kv in sets {
        let mut parts = kv.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let val = parts.next().unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        match key {
            "analysis.reading_words_per_minute" => {
                cfg.analysis.reading_words_per_minute = parse_value(key, val)?;
            }
            "analysis.speaking_words_per_minute" => {
                cfg.analysis.speaking_words_per_minute = parse_value(key, val)?;
            }
            "analysis.keyword_limit" => cfg.analysis.keyword_limit = parse_value(key, val)?,
            "analysis.max_detected_sections" => {
                cfg.analysis.max_detected_sections = parse_value(key, val)?;
            }
            "analysis.report_sections" => cfg.analysis.report_sections = parse_value(key, val)?,
            "analysis.extra_stopwords" => cfg.analysis.extra_stopwords.extend(
                val.split(',')
                    .map(str::trim)
                    .filter(|w| !w.is_empty())
                    .map(str::to_string),
            ),
            "tree.strict" => cfg.tree.strict = matches!(val, "true" | "1" | "yes"),
            "tree.preview_chars" => cfg.tree.preview_chars = parse_value(key, val)?,
            _ => tracing::warn!(key, "ignoring unknown config override"),
        }
    }
    Ok(())
}

fn parse_value<T>(key: &str, val: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    val.parse::<T>()
        .with_context(|| format!("Invalid value `{val}` for {key}"))
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn run_stats(analyzer: &TextAnalyzer, text: &str, json: bool) -> anyhow::Result<()> {
    let stats = analyzer.statistics(text);
    let readability = analyzer.readability(text);
    if json {
        let value = serde_json::json!({ "statistics": stats, "readability": readability });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    let rows = [
        ("Words", stats.words.to_string()),
        ("Sentences", stats.sentences.to_string()),
        ("Paragraphs", stats.paragraphs.to_string()),
        ("Characters", stats.characters.to_string()),
        ("Characters (no spaces)", stats.characters_no_spaces.to_string()),
        ("Avg. word length", format!("{} chars", stats.average_word_length)),
        ("Avg. sentence length", format!("{} words", stats.average_sentence_length)),
        ("Reading time", format!("~{} min", stats.reading_time_minutes)),
        ("Speaking time", format!("~{} min", stats.speaking_time_minutes)),
        ("Flesch reading ease", format!("{}/100", readability.flesch_reading_ease)),
        ("Flesch-Kincaid grade", readability.flesch_kincaid_grade.to_string()),
    ];
    for (label, value) in rows {
        println!("{:<24} {}", style(label).bold(), value);
    }
    println!("{}", style(readability.interpretation).dim());
    Ok(())
}

fn run_keywords(analyzer: &TextAnalyzer, text: &str, limit: usize, json: bool) -> anyhow::Result<()> {
    let keywords = analyzer.keywords(text, limit);
    if json {
        println!("{}", serde_json::to_string_pretty(&keywords)?);
        return Ok(());
    }
    if keywords.is_empty() {
        println!("  {}", style("no keywords").dim());
    }
    for keyword in keywords {
        println!(
            "  {:<24} {:>4}  {}%",
            style(&keyword.word).cyan(),
            keyword.count,
            keyword.frequency
        );
    }
    Ok(())
}

fn run_structure(analyzer: &TextAnalyzer, text: &str, json: bool) -> anyhow::Result<()> {
    let structure = analyzer.structure(text);
    if json {
        println!("{}", serde_json::to_string_pretty(&structure)?);
        return Ok(());
    }
    let features = structure.features();
    if features.is_empty() {
        println!("No structured formatting detected.");
    } else {
        println!("{} {}", style("Detected features:").bold(), features.join(", "));
    }
    if !structure.detected_sections.is_empty() {
        println!("{}", style("Section headings:").bold());
        for heading in &structure.detected_sections {
            println!("  - {heading}");
        }
    }
    Ok(())
}

fn run_entities(text: &str, json: bool) -> anyhow::Result<()> {
    let report = junas_core::extract_entities(text);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    if report.summary.total == 0 {
        println!("{}", entities::format_entity_report(&report));
        return Ok(());
    }
    for kind in EntityKind::ALL {
        let found: Vec<&str> = report.of_kind(kind).map(|e| e.text.as_str()).collect();
        if !found.is_empty() {
            println!("{} {}", style(format!("{}:", kind.label())).bold(), found.join("; "));
        }
    }
    Ok(())
}

fn run_citations(text: &str, year: i32, json: bool) -> anyhow::Result<()> {
    let checked = citations::check_citations(text, year);
    if json {
        println!("{}", serde_json::to_string_pretty(&checked)?);
        return Ok(());
    }
    if checked.is_empty() {
        println!("  {}", style("no citations found").dim());
    }
    for citation in &checked {
        let status = match citation.validation_status {
            ValidationStatus::Valid => style("valid").green(),
            ValidationStatus::Incomplete => style("incomplete").yellow(),
            ValidationStatus::Malformed => style("malformed").red(),
        };
        println!(
            "  [{}] {} {}",
            status,
            citation.citation.normalized_text,
            style(format!("@{}", citation.citation.citation.start)).dim()
        );
        for issue in &citation.validation_issues {
            println!("      {}: {}", issue.code, issue.message);
        }
    }
    Ok(())
}

fn run_command(analyzer: &TextAnalyzer, text: &str, resolve: bool, json: bool) -> anyhow::Result<()> {
    let processor = CommandProcessor::new(analyzer);
    if resolve {
        println!("{}", processor.resolve(text));
        return Ok(());
    }

    let parsed = junas_core::parse_command(text)
        .ok_or_else(|| anyhow!("Not a recognised slash command: {}", text.trim()))?;
    tracing::debug!(command = parsed.kind.id(), "running slash command");
    let outcome = processor.process(&parsed);
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }
    match outcome {
        CommandOutcome::Completed { content, artifact } => {
            println!("{content}");
            if let Some(artifact) = artifact {
                println!(
                    "\n{} {}\n{}",
                    style("Artifact:").bold(),
                    artifact.title,
                    artifact.content
                );
            }
        }
        CommandOutcome::Deferred { required_model } => match required_model {
            Some(model) => bail!(
                "/{} needs the `{}` model, which is not available here",
                parsed.kind.id(),
                model
            ),
            None => bail!("/{} needs an external service", parsed.kind.id()),
        },
        CommandOutcome::Failed { message } => bail!(message),
    }
    Ok(())
}

fn load_record(path: &Path) -> anyhow::Result<ConversationRecord> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read conversation {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid conversation record in {}", path.display()))
}

fn write_record(conversation: &Conversation, target: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&conversation.to_record())?;
    match target {
        Some(path) => fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn run_tree(cfg: &Config, action: TreeCommand, json: bool) -> anyhow::Result<()> {
    match action {
        TreeCommand::History { record, leaf } => {
            let conversation = Conversation::from_record(load_record(&record)?);
            let history = match leaf {
                Some(leaf) => tree::get_linear_history(conversation.nodes(), &leaf),
                None => conversation.linear_messages(),
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                for message in &history {
                    println!(
                        "{} {}\n{}\n",
                        style(message.role.label()).bold(),
                        style(&message.id).dim(),
                        message.content
                    );
                }
            }
        }
        TreeCommand::Siblings { record, node } => {
            let conversation = Conversation::from_record(load_record(&record)?);
            let siblings = conversation.siblings(&node);
            if json {
                println!("{}", serde_json::to_string_pretty(&siblings)?);
            } else {
                let active = tree::active_path(
                    conversation.nodes(),
                    conversation.current_leaf_id().unwrap_or_default(),
                );
                for (idx, id) in siblings.iter().enumerate() {
                    let marker = if active.contains(id) { "*" } else { " " };
                    println!("{} {}/{} {}", marker, idx + 1, siblings.len(), id);
                }
            }
        }
        TreeCommand::Graph { record, leaf, dark } => {
            let conversation = Conversation::from_record(load_record(&record)?);
            let leaf = leaf.as_deref().or(conversation.current_leaf_id());
            let description = graph::generate_with_preview(
                conversation.nodes(),
                leaf,
                dark,
                cfg.tree.preview_chars,
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&description)?);
            } else {
                print!("{description}");
            }
        }
        TreeCommand::Import { input, id, title } => {
            let text = read_input(&input)?;
            let parsed: ImportInput = serde_json::from_str(&text)
                .with_context(|| format!("Expected a message list or record in {}", input.display()))?;
            let record = match parsed {
                ImportInput::Record(record) => record,
                ImportInput::Messages(messages) => {
                    let now = Utc::now();
                    ConversationRecord {
                        id: id.unwrap_or_else(|| format!("conv-{}", now.timestamp_millis())),
                        title: title.unwrap_or_else(|| "Imported conversation".to_string()),
                        messages,
                        node_map: None,
                        current_leaf_id: None,
                        artifacts: Vec::new(),
                        tags: Vec::new(),
                        created_at: now,
                        updated_at: now,
                    }
                }
            };
            write_record(&Conversation::from_record(record), None)?;
        }
        TreeCommand::Append {
            record,
            role,
            content,
            parent,
            id,
            in_place,
        } => {
            let mut conversation =
                Conversation::from_record(load_record(&record)?).with_strict(cfg.tree.strict);
            let now = Utc::now();
            let id = id.unwrap_or_else(|| format!("msg-{}", now.timestamp_millis()));
            let message = Message::new(id, role, content, now);
            match parent {
                Some(parent) => conversation.branch_from(&parent, message)?,
                None => conversation.append(message)?,
            }
            write_record(&conversation, in_place.then_some(record.as_path()))?;
        }
        TreeCommand::Switch {
            record,
            node,
            in_place,
        } => {
            let mut conversation = Conversation::from_record(load_record(&record)?);
            conversation.select_leaf(&node)?;
            write_record(&conversation, in_place.then_some(record.as_path()))?;
        }
        TreeCommand::Validate { record } => {
            let conversation = Conversation::from_record(load_record(&record)?);
            let issues = tree::validate(conversation.nodes());
            if json {
                println!("{}", serde_json::to_string_pretty(&issues)?);
            } else if issues.is_empty() {
                println!("  {}", style("clean").green());
            } else {
                for issue in &issues {
                    println!("  [{}] {}", style("issue").yellow(), issue);
                }
            }
            if !issues.is_empty() {
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn parse_role(value: &str) -> Result<Role, String> {
    match value.trim().to_lowercase().as_str() {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "system" => Ok(Role::System),
        other => Err(format!("unknown role `{other}` (expected user, assistant or system)")),
    }
}
