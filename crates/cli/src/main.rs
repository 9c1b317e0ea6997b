//! `care-workflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `list`     — list template ids in the store.
//! - `validate` — report structural violations of a template.
//! - `order`    — print steps in display order.
//! - `preview`  — evaluate a step's branches against a fact file.
//! - `edit`     — apply a JSON script of editor actions and save.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::{EditorAction, EditorConfig, EditorState, Outcome};
use rules::FactTable;
use store::{FileStore, TemplateStore};

#[derive(Parser)]
#[command(
    name = "care-workflow",
    about = "Inspect and edit clinical workflow templates",
    version
)]
struct Cli {
    /// Directory holding `<id>.json` template documents.
    #[arg(long, env = "CARE_WORKFLOW_STORE", default_value = "./templates", global = true)]
    store: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List stored template ids.
    List,
    /// Validate a template; exits non-zero on invariant violations.
    Validate { id: String },
    /// Print steps in display order.
    Order { id: String },
    /// Evaluate every branch of one step against a fact table.
    Preview {
        id: String,
        #[arg(long)]
        step: String,
        /// JSON file with the facts (e.g. patient attributes).
        #[arg(long)]
        facts: PathBuf,
    },
    /// Apply a JSON array of editor actions, then save.
    Edit {
        id: String,
        #[arg(long)]
        script: PathBuf,
        /// Recorded as `lastEditedBy`.
        #[arg(long, env = "CARE_WORKFLOW_EDITOR")]
        editor: Option<String>,
        #[arg(long)]
        history_limit: Option<usize>,
        /// Apply and report without saving.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = FileStore::new(&cli.store);

    match run(cli.command, &store).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, store: &FileStore) -> Result<ExitCode> {
    match command {
        Command::List => {
            for id in store.list().await? {
                println!("{id}");
            }
        }

        Command::Validate { id } => {
            let template = load(store, &id).await?;
            let violations = engine::validate(&template);
            if violations.is_empty() {
                println!("✅ Template '{}' is valid.", template.name);
            }
            for v in &violations {
                let tag = if v.is_fatal() { "error" } else { "warning" };
                println!("{tag}: {v}");
            }
            if violations.iter().any(|v| v.is_fatal()) {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Order { id } => {
            let template = load(store, &id).await?;
            let order = engine::step_order(&template);
            for entry in &order.sequence {
                let name = template.step(&entry.step_id).map_or("", |s| s.name.as_str());
                println!("{:>3}. {} ({})", entry.sequence, name, entry.step_id);
            }
            for step_id in &order.unreachable {
                let name = template.step(step_id).map_or("", |s| s.name.as_str());
                println!("  -  {} ({}) [unreachable]", name, step_id);
            }
        }

        Command::Preview { id, step, facts } => {
            let template = load(store, &id).await?;
            let step = template
                .step(&step)
                .with_context(|| format!("template '{id}' has no step '{step}'"))?;
            let facts = read_facts(&facts)?;
            let report = engine::preview(step, &facts);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Command::Edit {
            id,
            script,
            editor,
            history_limit,
            dry_run,
        } => {
            let template = load(store, &id).await?;
            let actions = read_script(&script)?;
            let config = EditorConfig {
                editor,
                history_limit,
                ..EditorConfig::default()
            };

            let mut state = EditorState::new(template, config);
            let mut rejected = 0usize;
            for (i, action) in actions.into_iter().enumerate() {
                let (next, outcome) = state.reduce(action);
                match &outcome {
                    Outcome::Accepted => {}
                    Outcome::Unchanged => info!("action {i}: nothing to do"),
                    Outcome::Rejected(e) => {
                        rejected += 1;
                        println!("⚠️  action {i} rejected: {e}");
                    }
                }
                state = next.reduce(EditorAction::DismissNotice).0;
            }

            if !state.is_dirty() {
                println!("No changes to save.");
            } else if dry_run {
                println!("{}", serde_json::to_string_pretty(state.template())?);
            } else {
                store
                    .save(state.template())
                    .await
                    .with_context(|| format!("saving template '{id}'"))?;
                state = state.reduce(EditorAction::MarkSaved).0;
                info!(
                    "saved '{}' ({} step(s), undo available: {})",
                    id,
                    state.template().steps.len(),
                    state.can_undo()
                );
            }

            if rejected > 0 {
                warn!("{rejected} action(s) were rejected");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn load(store: &FileStore, id: &str) -> Result<engine::WorkflowTemplate> {
    store
        .load(id)
        .await
        .with_context(|| format!("loading template '{id}' from {}", store.root().display()))
}

fn read_facts(path: &Path) -> Result<FactTable> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read facts file {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))?;
    Ok(FactTable::new(value))
}

fn read_script(path: &Path) -> Result<Vec<EditorAction>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read script {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid edit script {}", path.display()))
}
