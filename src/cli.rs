//! CLI interface for angluin-lab

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::api::graphql::GraphQlClient;
use crate::api::offline::OfflineLearner;
use crate::api::{CatalogApi, LearnerApi};
use crate::catalog::{
    default_seed, fact_for_day, format_percent, group_by_category, partition_mappings, validate_session_name,
    ExampleKind, HypothesisTestReport, LearningStats, Mapping, MappingStatus, NewExample, NewMapping,
    NewSourceEntry, OracleQueryRecord,
};
use crate::config::{Backend, Config};
use crate::interactive::{print_summary, TerminalOracle};
use crate::oracle::{drive, DriveOutcome, OracleSession, ScriptedOracle};
use crate::types::{QueryId, SessionId};

#[derive(Parser)]
#[command(name = "angluin-lab")]
#[command(about = "Answer membership and equivalence queries for an L* learner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a learning session and answer its queries
    Learn {
        /// Session name (defaults to learner.default_session_name)
        #[arg(short, long)]
        name: Option<String>,
        /// Use the built-in offline learner
        #[arg(long)]
        offline: bool,
        /// Answer from a comma separated list instead of the terminal
        #[arg(short, long)]
        answers: Option<String>,
    },
    /// Manage learning sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Manage training examples
    Examples {
        #[command(subcommand)]
        command: ExampleCommands,
    },
    /// Generate and test hypotheses
    Hypothesis {
        #[command(subcommand)]
        command: HypothesisCommands,
    },
    /// Inspect and answer stored oracle queries
    Queries {
        #[command(subcommand)]
        command: QueryCommands,
    },
    /// Review proposed mapping functions
    Mappings {
        #[command(subcommand)]
        command: MappingCommands,
    },
    /// Source and menu data
    Data {
        #[command(subcommand)]
        command: DataCommands,
    },
    /// Show learning statistics
    Stats {
        /// Session to report on (global stats when omitted)
        #[arg(short, long)]
        session: Option<i64>,
    },
    /// Configure the client
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Set the learner's GraphQL endpoint
        #[arg(long)]
        set_endpoint: Option<String>,
        /// Set the default backend (remote or offline)
        #[arg(long)]
        set_backend: Option<String>,
        /// Reset configuration to defaults
        #[arg(long)]
        reset: bool,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List all sessions
    List,
    /// Create a session
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Show a session with its examples, hypotheses and queries
    Show { id: i64 },
}

#[derive(Subcommand)]
enum ExampleCommands {
    /// Add an example to a session
    Add {
        #[arg(short, long)]
        session: i64,
        /// Source record (JSON)
        #[arg(long)]
        source: String,
        /// Expected target record (JSON)
        #[arg(long)]
        target: String,
        /// positive, negative or counterexample
        #[arg(short, long, default_value = "positive")]
        kind: String,
    },
}

#[derive(Subcommand)]
enum HypothesisCommands {
    /// Ask the learner for a new hypothesis
    Generate {
        #[arg(short, long)]
        session: i64,
    },
    /// Test a hypothesis against the session's examples
    Test { id: i64 },
}

#[derive(Subcommand)]
enum QueryCommands {
    /// List pending oracle queries of a session
    Pending {
        #[arg(short, long)]
        session: i64,
    },
    /// Answer a stored oracle query
    Answer { id: i64, response: String },
}

#[derive(Subcommand)]
enum MappingCommands {
    /// List mapping proposals, pending first
    List,
    /// Propose a mapping function
    Propose {
        /// What the mapping does
        #[arg(short, long)]
        description: String,
        /// Function body, inline
        #[arg(long, conflicts_with = "file")]
        code: Option<String>,
        /// Read the function body from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Accept or reject a proposal
    Evaluate {
        id: i64,
        /// accepted, rejected or pending
        status: String,
    },
}

#[derive(Subcommand)]
enum DataCommands {
    /// List source (T1) entries
    List,
    /// Seed source entries from a JSON file, or the sample menu
    Seed {
        /// JSON array of {name, price, category}
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Clear all source and target data
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show target menu items grouped by category
    Menu,
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            learn(None, false, None).await?;
        }
        Some(Commands::Learn { name, offline, answers }) => {
            learn(name, offline, answers).await?;
        }
        Some(Commands::Sessions { command }) => {
            let client = catalog_client()?;
            match command {
                SessionCommands::List => list_sessions(&client).await?,
                SessionCommands::Create { name, description } => {
                    let name = validate_session_name(&name)?;
                    let session = client
                        .create_session(&name, &description)
                        .await
                        .context("Failed to create session")?;
                    println!("Created session {} '{}'", session.id, session.name);
                }
                SessionCommands::Show { id } => show_session(&client, SessionId(id)).await?,
            }
        }
        Some(Commands::Examples { command }) => match command {
            ExampleCommands::Add { session, source, target, kind } => {
                let Some(kind) = ExampleKind::parse(&kind) else {
                    anyhow::bail!("Unknown example kind '{}'. Use positive, negative or counterexample", kind);
                };
                let example = NewExample::new(SessionId(session), source, target, kind)?;
                if !example.is_json() {
                    tracing::warn!("Example data is not JSON; the learner may reject it");
                }
                let record = catalog_client()?
                    .add_example(&example)
                    .await
                    .context("Failed to add example")?;
                println!("Added {} example {} to session {}", record.kind, record.id, session);
            }
        },
        Some(Commands::Hypothesis { command }) => {
            let client = catalog_client()?;
            match command {
                HypothesisCommands::Generate { session } => {
                    let result = client
                        .generate_hypothesis(SessionId(session))
                        .await
                        .context("Failed to generate hypothesis")?;
                    println!("{}", result);
                }
                HypothesisCommands::Test { id } => {
                    let report = client.test_hypothesis(id).await.context("Failed to test hypothesis")?;
                    print_test_report(id, &report);
                }
            }
        }
        Some(Commands::Queries { command }) => {
            let client = catalog_client()?;
            match command {
                QueryCommands::Pending { session } => {
                    let queries = client
                        .pending_queries(SessionId(session))
                        .await
                        .context("Failed to fetch pending queries")?;
                    if queries.is_empty() {
                        println!("No pending queries for session {}", session);
                    }
                    for query in &queries {
                        print_query_record(query);
                    }
                }
                QueryCommands::Answer { id, response } => {
                    let result = client
                        .answer_oracle_query(QueryId(id), &response)
                        .await
                        .context("Failed to answer query")?;
                    println!("{}", result);
                }
            }
        }
        Some(Commands::Mappings { command }) => {
            let client = catalog_client()?;
            match command {
                MappingCommands::List => list_mappings(&client).await?,
                MappingCommands::Propose { description, code, file } => {
                    let code = match (code, file) {
                        (Some(code), _) => code,
                        (None, Some(path)) => std::fs::read_to_string(&path)
                            .with_context(|| format!("Failed to read {}", path.display()))?,
                        (None, None) => anyhow::bail!("Provide the function body with --code or --file"),
                    };
                    let mapping = NewMapping::new(description, code)?;
                    let created = client
                        .propose_mapping(&mapping)
                        .await
                        .context("Failed to propose mapping")?;
                    println!("Proposed mapping {} ({})", created.id, created.status);
                }
                MappingCommands::Evaluate { id, status } => {
                    let status: MappingStatus = status.parse()?;
                    let updated = client
                        .evaluate_mapping(id, status)
                        .await
                        .context("Failed to evaluate mapping")?;
                    println!("Mapping {} is now {}", updated.id, updated.status);
                }
            }
        }
        Some(Commands::Data { command }) => {
            let client = catalog_client()?;
            match command {
                DataCommands::List => list_source_entries(&client).await?,
                DataCommands::Seed { file } => {
                    let entries = match file {
                        Some(path) => read_seed_file(&path)?,
                        None => default_seed(),
                    };
                    let seeded = client
                        .seed_source_data(&entries)
                        .await
                        .context("Failed to seed source data")?;
                    println!("Seeded {} source entries", seeded.len());
                }
                DataCommands::Reset { yes } => {
                    if !yes && !confirm("Delete all source and target data?")? {
                        println!("Cancelled.");
                        return Ok(());
                    }
                    let message = client.reset_data().await.context("Failed to reset data")?;
                    println!("{}", message);
                }
                DataCommands::Menu => show_menu(&client).await?,
            }
        }
        Some(Commands::Stats { session }) => {
            let client = catalog_client()?;
            match session {
                Some(id) => show_session_stats(&client, SessionId(id)).await?,
                None => show_global_stats(&client).await?,
            }
        }
        Some(Commands::Config { show, set_endpoint, set_backend, reset }) => {
            if let Some(endpoint) = set_endpoint {
                crate::config::set_endpoint(&endpoint)?;
            } else if let Some(backend) = set_backend {
                crate::config::set_backend(&backend)?;
            } else if reset {
                crate::config::reset_config()?;
            } else if show {
                crate::config::show_config()?;
            } else {
                println!("Configuration options:");
                println!("  --show                 Show current configuration");
                println!("  --set-endpoint <url>   Set the learner's GraphQL endpoint");
                println!("  --set-backend <name>   remote or offline");
                println!("  --reset                Reset to defaults");
            }
        }
    }

    Ok(())
}

fn catalog_client() -> Result<GraphQlClient> {
    let config = Config::load()?;
    GraphQlClient::from_config(&config.api).context("Failed to build learner client")
}

fn learner_for(config: &Config, offline: bool) -> Result<Arc<dyn LearnerApi>> {
    if offline || config.learner.backend == Backend::Offline {
        return Ok(Arc::new(OfflineLearner::with_budget(
            config.learner.max_membership_queries,
            config.learner.max_equivalence_queries,
        )));
    }
    let client = GraphQlClient::from_config(&config.api).context("Failed to build learner client")?;
    Ok(Arc::new(client))
}

async fn learn(name: Option<String>, offline: bool, answers: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let name = name.unwrap_or_else(|| config.learner.default_session_name.clone());

    let session = OracleSession::new(learner_for(&config, offline)?);
    session.set_live_refresh(config.oracle.show_live_state);

    let started = session
        .start(&name)
        .await
        .context("Failed to start learning session")?;
    println!(
        "Session {} '{}' started on the {} learner",
        started.session_id,
        name,
        session.api().name()
    );

    let report = match answers {
        Some(list) => drive(&session, &mut ScriptedOracle::from_csv(&list)).await?,
        None => {
            println!("Type /help for answer shortcuts, /quit to stop.");
            let mut oracle = TerminalOracle::new()?;
            drive(&session, &mut oracle).await?
        }
    };

    match report.outcome {
        DriveOutcome::Converged(Some(summary)) => print_summary(&summary),
        DriveOutcome::Converged(None) => println!("Learning complete. The learner reported no final result."),
        DriveOutcome::Abandoned => println!(
            "Stopped with session {} still open ({} answers accepted, {} rejected).",
            started.session_id, report.accepted, report.rejected
        ),
    }

    Ok(())
}

fn read_seed_file(path: &Path) -> Result<Vec<NewSourceEntry>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let entries: Vec<NewSourceEntry> =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
    for (i, entry) in entries.iter().enumerate() {
        entry
            .validate()
            .with_context(|| format!("Entry {} ('{}') is invalid", i + 1, entry.name))?;
    }
    Ok(entries)
}

fn confirm(question: &str) -> Result<bool> {
    use std::io::Write;
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_mapping(mapping: &Mapping, with_code: bool) {
    let created = mapping.created_at.as_deref().unwrap_or("-");
    println!(
        "  #{:<4} {:<9} {}  {}",
        mapping.id,
        mapping.status.as_str(),
        created,
        crate::truncate_safe(&mapping.description, 60)
    );
    if with_code {
        if let Some(code) = &mapping.function_code {
            for line in code.lines() {
                println!("        {}", line);
            }
        }
    }
}

async fn list_mappings(client: &GraphQlClient) -> Result<()> {
    let mappings = client.list_mappings().await.context("Failed to list mappings")?;
    let (pending, evaluated) = partition_mappings(&mappings);

    println!("Pending ({}):", pending.len());
    if pending.is_empty() {
        println!("  No pending mapping proposals.");
    }
    for mapping in pending {
        print_mapping(mapping, false);
    }

    println!("\nEvaluated ({}):", evaluated.len());
    for mapping in evaluated {
        print_mapping(mapping, true);
    }
    Ok(())
}

async fn list_source_entries(client: &GraphQlClient) -> Result<()> {
    let entries = client
        .list_source_entries()
        .await
        .context("Failed to list source entries")?;
    if entries.is_empty() {
        println!("No source data. Seed the sample menu with 'angluin-lab data seed'.");
        return Ok(());
    }
    println!("{:<6} {:<28} {:>8}  {}", "ID", "Name", "Price", "Category");
    for entry in &entries {
        println!(
            "{:<6} {:<28} {:>8.2}  {}",
            entry.id,
            crate::truncate_safe(&entry.name, 28),
            entry.price,
            entry.category
        );
    }
    Ok(())
}

async fn show_menu(client: &GraphQlClient) -> Result<()> {
    let items = client.list_menu_items().await.context("Failed to list menu items")?;
    let categories = client.list_categories().await.context("Failed to list categories")?;
    if items.is_empty() {
        println!("The target menu is empty.");
    }
    for (category, items) in group_by_category(&items) {
        let title = if category.is_empty() { "Uncategorized" } else { category };
        println!("{}:", title);
        for item in items {
            println!("  {:<28} {:>8.2}", crate::truncate_safe(&item.title, 28), item.price);
        }
    }
    let empty: Vec<&str> = categories
        .iter()
        .filter(|c| c.menu_items.is_empty())
        .map(|c| c.title.as_str())
        .collect();
    if !empty.is_empty() {
        println!("\nCategories without items: {}", empty.join(", "));
    }
    Ok(())
}

async fn list_sessions(client: &GraphQlClient) -> Result<()> {
    let sessions = client.list_sessions().await.context("Failed to list sessions")?;
    if sessions.is_empty() {
        println!("No learning sessions yet. Create one with 'angluin-lab sessions create <name>'.");
        return Ok(());
    }

    println!("{:<6} {:<32} {:<10} {:>8} {:>10}  {}", "ID", "Name", "Status", "Examples", "Hypotheses", "Created");
    for s in &sessions {
        let created = s.created_on().map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<32} {:<10} {:>8} {:>10}  {}",
            s.id,
            crate::truncate_safe(&s.name, 32),
            s.status,
            s.examples.len(),
            s.hypotheses.len(),
            created
        );
    }

    let stats = LearningStats::from_sessions(&sessions);
    println!();
    println!(
        "{} sessions, {} examples, {} hypotheses",
        stats.total_sessions, stats.total_examples, stats.total_hypotheses
    );
    Ok(())
}

async fn show_session(client: &GraphQlClient, id: SessionId) -> Result<()> {
    let Some(details) = client.session_details(id).await.context("Failed to fetch session")? else {
        anyhow::bail!("Session {} not found", id);
    };

    println!("Session {} '{}' ({})", details.id, details.name, details.status);
    if !details.description.is_empty() {
        println!("  {}", details.description);
    }

    println!("\nExamples ({}):", details.examples.len());
    for example in &details.examples {
        println!(
            "  #{} [{}] {} -> {}",
            example.id,
            example.kind,
            crate::truncate_safe(&example.source_data, 60),
            crate::truncate_safe(&example.target_data, 60)
        );
    }

    println!("\nHypotheses ({}):", details.hypotheses.len());
    for h in &details.hypotheses {
        println!("  #{} {} {} {}", h.id, format_percent(h.confidence), h.status, h.description);
        for counter in &h.counterexamples {
            let reason = counter.error_message.as_deref().unwrap_or("");
            println!("      counterexample #{}: {} {}", counter.id, counter.source_data, reason);
        }
    }

    let pending = details.pending_queries();
    println!(
        "\nOracle queries: {} pending, {} answered",
        pending.len(),
        details.answered_queries().len()
    );
    for query in pending {
        print_query_record(query);
    }
    Ok(())
}

fn print_query_record(query: &OracleQueryRecord) {
    println!(
        "  #{} {} [{}] {}",
        query.id,
        query.query_type,
        query.status,
        crate::truncate_safe(&query.query_data, 100)
    );
    if let Some(response) = &query.response {
        println!("      answered: {}", response);
    }
}

fn print_test_report(id: i64, report: &HypothesisTestReport) {
    let verdict = if report.success { "passed" } else { "failed" };
    println!("Hypothesis {} {}", id, verdict);
    if let (Some(correct), Some(total)) = (report.correct_count, report.total_count) {
        println!("  {}/{} examples matched", correct, total);
    }
    if let Some(confidence) = report.confidence {
        println!("  confidence {}", format_percent(confidence));
    }
    if let Some(message) = &report.message {
        println!("  {}", message);
    }
}

async fn show_global_stats(client: &GraphQlClient) -> Result<()> {
    let stats = client.global_stats().await.context("Failed to fetch global stats")?;
    println!("Sessions:           {}", stats.total_sessions);
    println!("Examples:           {}", stats.total_examples);
    println!("Hypotheses:         {}", stats.total_hypotheses);
    println!("Average confidence: {}", format_percent(stats.average_confidence));
    if let Some(top) = &stats.top_performing_session {
        println!(
            "Top session:        {} ({}, {} hypotheses)",
            top.name,
            format_percent(top.confidence),
            top.hypothesis_count
        );
    }

    // fun facts are optional
    match client.fun_facts().await {
        Ok(facts) => {
            if let Some(fact) = fact_for_day(&facts, chrono::Local::now().date_naive()) {
                println!("\n{} {} ({})", fact.emoji, fact.fact, fact.category);
            }
        }
        Err(e) => tracing::debug!("No fun fact: {}", e),
    }
    Ok(())
}

async fn show_session_stats(client: &GraphQlClient, id: SessionId) -> Result<()> {
    let stats = client.session_stats(id).await.context("Failed to fetch session stats")?;
    println!("Session {}", id);
    println!(
        "  Examples:           {} ({} positive, {} negative)",
        stats.total_examples, stats.positive_examples, stats.negative_examples
    );
    println!("  Hypotheses:         {}", stats.total_hypotheses);
    println!("  Best hypothesis:    {}", format_percent(stats.best_hypothesis));
    println!("  Average confidence: {}", format_percent(stats.average_confidence));
    println!("  Age:                {} days", stats.session_age);

    let achievements = client.achievements(id).await.context("Failed to fetch achievements")?;
    if !achievements.is_empty() {
        println!("\nAchievements:");
        for a in &achievements {
            let mark = if a.is_unlocked() { "✓" } else { " " };
            println!("  [{}] {} ({}) {}", mark, a.title, format_percent(a.progress.min(1.0)), a.description);
        }
    }
    Ok(())
}
