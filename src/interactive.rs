//! Terminal oracle
//!
//! Presents each query and reads the answer with rustyline. A spinner runs
//! while the answer is being submitted.

use indicatif::{ProgressBar, ProgressStyle};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Editor, Helper};
use std::time::Duration;

use crate::error::OracleError;
use crate::oracle::convergence::DisplayableSummary;
use crate::oracle::presenter::RenderableQuery;
use crate::oracle::query::{EquivalenceAnswer, MembershipAnswer};
use crate::oracle::runner::{Oracle, OracleReply};
use crate::types::QueryKind;

const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show answer shortcuts"),
    ("/state", "Refresh the live hypothesis and show the query again"),
    ("/quit", "Stop answering"),
];

/// What a line of input means for the current query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Reply(OracleReply),
    Help,
    Ignore,
}

/// Map a typed line to an action. Membership shortcuts are normalized to the
/// canonical wire values; anything else is passed through as typed.
pub fn interpret(kind: QueryKind, line: &str) -> LineAction {
    let line = line.trim();
    match line {
        "" => return LineAction::Ignore,
        "/help" | "?" => return LineAction::Help,
        "/state" | "/refresh" => return LineAction::Reply(OracleReply::Refresh),
        "/quit" | "/exit" => return LineAction::Reply(OracleReply::Abandon),
        _ => {}
    }

    let response = match kind {
        QueryKind::Membership => MembershipAnswer::parse(line)
            .map(|a| a.as_wire().to_string())
            .unwrap_or_else(|| line.to_string()),
        QueryKind::Equivalence => match EquivalenceAnswer::parse(line) {
            Some(answer) => answer.as_wire().to_string(),
            None => return LineAction::Ignore,
        },
    };
    LineAction::Reply(OracleReply::Answer(response))
}

struct OracleHelper;

impl Completer for OracleHelper {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let partial = &line[..pos];
        if !partial.starts_with('/') {
            return Ok((pos, Vec::new()));
        }
        let matches = COMMANDS
            .iter()
            .filter(|(c, _)| c.starts_with(partial))
            .map(|(c, _)| Pair {
                display: c.to_string(),
                replacement: c[partial.len()..].to_string(),
            })
            .collect();
        Ok((pos, matches))
    }
}

impl Hinter for OracleHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if !line.starts_with('/') || pos < line.len() {
            return None;
        }
        COMMANDS
            .iter()
            .find(|(c, _)| c.starts_with(line) && *c != line)
            .map(|(c, _)| c[line.len()..].to_string())
    }
}

impl Validator for OracleHelper {
    fn validate(&self, _ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        Ok(ValidationResult::Valid(None))
    }
}

impl Highlighter for OracleHelper {}

impl Helper for OracleHelper {}

fn show_help(kind: QueryKind) {
    println!();
    match kind {
        QueryKind::Membership => {
            println!("  \x1b[36my\x1b[0m / \x1b[36mtrue\x1b[0m   the item belongs to the category");
            println!("  \x1b[36mn\x1b[0m / \x1b[36mfalse\x1b[0m  it does not");
        }
        QueryKind::Equivalence => {
            println!("  \x1b[36mc\x1b[0m / \x1b[36mcorrect\x1b[0m  the hypothesis is right");
            println!("  \x1b[36m<item>\x1b[0m        name or number of a misclassified item");
        }
    }
    for (cmd, desc) in COMMANDS {
        println!("  \x1b[90m{:<8}\x1b[0m {}", cmd, desc);
    }
    println!();
}

fn submit_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.dim} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Submitting...");
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Oracle backed by a person at the terminal
pub struct TerminalOracle {
    editor: Editor<OracleHelper, DefaultHistory>,
    spinner: Option<ProgressBar>,
}

impl TerminalOracle {
    pub fn new() -> anyhow::Result<Self> {
        let config = rustyline::Config::builder()
            .auto_add_history(true)
            .completion_type(rustyline::CompletionType::List)
            .build();
        let mut editor = Editor::<OracleHelper, DefaultHistory>::with_config(config)?;
        editor.set_helper(Some(OracleHelper));
        Ok(Self { editor, spinner: None })
    }
}

impl Oracle for TerminalOracle {
    fn respond(&mut self, query: &RenderableQuery, last_error: Option<&OracleError>) -> OracleReply {
        println!();
        println!("{}", query);
        if let Some(error) = last_error {
            println!("  \x1b[31m{}\x1b[0m", error);
        }

        let prompt = match query.kind() {
            QueryKind::Membership => "\x1b[1myes/no ›\x1b[0m ",
            QueryKind::Equivalence => "\x1b[1mcorrect or counterexample ›\x1b[0m ",
        };

        loop {
            match self.editor.readline(prompt) {
                Ok(line) => match interpret(query.kind(), &line) {
                    LineAction::Reply(reply) => return reply,
                    LineAction::Help => show_help(query.kind()),
                    LineAction::Ignore => {}
                },
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return OracleReply::Abandon,
                Err(e) => {
                    tracing::warn!("Failed to read answer: {}", e);
                    return OracleReply::Abandon;
                }
            }
        }
    }

    fn submitting(&mut self, _query: &RenderableQuery, _response: &str) {
        self.spinner = Some(submit_spinner());
    }

    fn submitted(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

/// Print the learned model once the session converges
pub fn print_summary(summary: &DisplayableSummary) {
    println!();
    println!("\x1b[1m═══════════════════════════════════════\x1b[0m");
    println!("\x1b[1m  Learning complete\x1b[0m");
    println!("\x1b[1m═══════════════════════════════════════\x1b[0m");
    println!("{}", summary);
    println!();
}
