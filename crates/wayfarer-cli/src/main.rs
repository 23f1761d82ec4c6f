//! Wayfarer chat CLI: a minimal stdin/stdout driver over the compiled
//! trip-planning graph (spec.md §6). Grounded in the teacher's
//! `mofa-cli/src/main.rs` entry shape (`clap::Parser` + a
//! `tokio::runtime::Runtime` built by hand so logging can be configured
//! first) and its readline-based REPL (`mofa-cli/src/tui` uses ratatui
//! for a full TUI; this surface is deliberately the plain `rustyline`
//! loop the spec calls for instead).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use rustyline::DefaultEditor;
use wayfarer_engine::session::{EngineConfig, Session};
use wayfarer_kernel::state::TripState;

#[derive(Parser)]
#[command(name = "wayfarer")]
#[command(author, version, about = "Links-only travel-planning agent", long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log level, overriding `LOG_LEVEL` (trace/debug/info/warn/error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Runtime directory for logs/metrics/artifacts, overriding `RUNTIME_DIR`.
    #[arg(long, global = true)]
    runtime_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive trip-planning chat session.
    Chat,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.clone().unwrap_or_else(|| {
        if cli.verbose {
            "debug".into()
        } else {
            std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into())
        }
    });
    tracing_subscriber::fmt().with_env_filter(log_level.clone()).init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_chat(cli, log_level))
}

async fn run_chat(cli: Cli, log_level: String) -> anyhow::Result<()> {
    let mut config = EngineConfig::from_env();
    config.log_level = log_level;
    if let Some(dir) = cli.runtime_dir {
        config.runtime_dir = dir;
    }
    let _ = cli.command;

    let run_id = uuid::Uuid::new_v4().to_string();
    let session = Session::new(config, run_id);

    println!("{}", "Wayfarer — tell me about the trip you want to plan.".bold());
    println!("{}", "(Ctrl-D or \"exit\" to quit.)".dimmed());

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("you> ") {
            Ok(line) => line,
            Err(rustyline::error::ReadlineError::Eof) | Err(rustyline::error::ReadlineError::Interrupted) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        let _ = editor.add_history_entry(line);

        let state = session.new_state(line);
        if let Err(err) = run_turn_to_resolution(&session, &mut editor, state).await {
            eprintln!("{} {err:#}", "error:".red().bold());
        }
    }

    Ok(())
}

/// Drive one user utterance through the graph, resolving any
/// `needs_user_input` pauses by prompting for answers and re-invoking
/// the same, persisted `TripState` from its entry point (spec.md §6).
async fn run_turn_to_resolution(
    session: &Session,
    editor: &mut DefaultEditor,
    mut state: TripState,
) -> anyhow::Result<()> {
    loop {
        state = session.run_turn(state).await?;

        if !state.needs_user_input {
            print_final_answer(&state);
            return Ok(());
        }

        println!("{}", "I need a bit more information:".yellow());
        let mut answers = Vec::new();
        for question in state.clarifying_questions.clone() {
            println!("  {question}");
        }

        if let Some(pending) = state.pending_disambiguation.take() {
            println!("Options: {}", pending.options.join("; "));
            let answer = editor.readline(&format!("{}> ", pending.field))?;
            answers.push((pending.field.clone(), answer.trim().to_string()));
        } else {
            for field in state.constraints.missing_core_fields() {
                let answer = editor.readline(&format!("{field}> "))?;
                answers.push((field.to_string(), answer.trim().to_string()));
            }
        }

        state.constraint_overrides = Some(Session::overrides_from_answers(&answers));
        state.needs_user_input = false;
        state.clarifying_questions.clear();
        state.termination_reason = None;
    }
}

fn print_final_answer(state: &TripState) {
    if let Some(answer) = &state.final_answer {
        println!("{}", "wayfarer>".green().bold());
        println!("{answer}");
    }
    if let Some(path) = &state.ics_path {
        println!("{} {path}", "calendar exported to".dimmed());
    }
}
