mod cli;

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use listing_draft::metadata::{PKG_NAME, PKG_VERSION};
use listing_draft::validation::{StepValidation, ValidationEngine};
use listing_draft::{DraftState, FileStore, FormSnapshot, PersistenceConfig, PersistenceService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so `export` output stays pipeable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    cli.store.validate()?;

    if let Command::Version = cli.command {
        println!("{PKG_NAME} {PKG_VERSION}");
        return Ok(());
    }

    let dir = cli.store.store_dir.clone().unwrap_or_else(FileStore::default_dir);
    tracing::debug!(dir = %dir.display(), "using draft store");
    let service = PersistenceService::builder(Arc::new(FileStore::new(dir)))
        .config(PersistenceConfig::with_namespace(cli.store.namespace.trim()))
        .build()?;

    match cli.command {
        Command::Status => status(&service).await?,
        Command::Show => match service.load_form_data().await {
            Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            None => println!("{}", "No saved draft".yellow()),
        },
        Command::Export { output } => {
            let json = service.export_form_data().await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, json).await?;
                    println!("{} {}", "Exported to".green(), path.display());
                }
                None => println!("{json}"),
            }
        }
        Command::Import { file } => {
            let json = tokio::fs::read_to_string(&file).await?;
            service.import_form_data(&json).await?;
            println!("{} {}", "Imported".green(), file.display());
        }
        Command::History => history(&service).await,
        Command::Restore { index } => match service.restore_from_history(index).await? {
            Some(_) => println!("{} {index}", "Restored history entry".green()),
            None => return Err(format!("no history entry at index {index}").into()),
        },
        Command::Clear => {
            service.clear_form_data().await?;
            println!("{}", "Draft cleared".green());
        }
        Command::Validate { step } => {
            let snapshot = service.load_form_data().await.unwrap_or_default();
            validate(&snapshot, step);
        }
        Command::Version => {}
    }
    Ok(())
}

async fn status(service: &PersistenceService) -> Result<(), Box<dyn std::error::Error>> {
    let state = match service.draft_state().await? {
        DraftState::Missing => "missing".yellow(),
        DraftState::Corrupted { reason } => format!("corrupted ({reason})").red(),
        DraftState::Present(_) => "present".green(),
    };
    println!("{:<12} {state}", "Draft:");

    if let Some(metadata) = service.get_metadata().await {
        println!("{:<12} {}", "Step:", metadata.current_step);
        println!("{:<12} {}", "Saves:", metadata.save_count);
        println!("{:<12} {}", "Last saved:", metadata.last_saved.to_rfc3339());
        println!("{:<12} {}", "Schema:", metadata.version);
        println!("{:<12} {}", "Complete:", metadata.is_complete);
    }
    println!(
        "{:<12} {}%",
        "Completion:",
        service.get_form_completion_percentage().await
    );
    Ok(())
}

async fn history(service: &PersistenceService) {
    let entries = service.get_save_history().await;
    if entries.is_empty() {
        println!("{}", "No save history".yellow());
        return;
    }
    for (index, entry) in entries.iter().enumerate() {
        println!(
            "{:>2}  {}  step {}  save #{}  {}",
            index.to_string().bold(),
            entry.metadata.last_saved.to_rfc3339(),
            entry.metadata.current_step,
            entry.metadata.save_count,
            entry.data.text("name").unwrap_or("(unnamed)")
        );
    }
}

fn print_step(step: u32, result: &StepValidation) {
    let verdict = if result.is_valid {
        "valid".green()
    } else {
        "invalid".red()
    };
    println!(
        "Step {step}: {verdict} ({}% complete)",
        result.completion_percentage
    );
    for (field, error) in &result.errors {
        println!("  {} {field}: {error}", "error".red());
    }
    for (field, warning) in &result.warnings {
        println!("  {} {field}: {warning}", "warning".yellow());
    }
    for suggestion in &result.suggestions {
        println!("  {} {suggestion}", "hint".cyan());
    }
}

fn validate(snapshot: &FormSnapshot, step: Option<u32>) {
    let engine = ValidationEngine::default();
    if let Some(step) = step {
        print_step(step, &engine.validate_step(step, snapshot));
        return;
    }

    let form = engine.validate_form(snapshot);
    for (step, result) in &form.step_results {
        print_step(*step, result);
    }
    let summary = engine.get_validation_summary(snapshot);
    println!();
    println!(
        "{} of {} steps complete, {}% overall",
        summary.completed_steps, summary.total_steps, form.completion_percentage
    );
    if let Some(field) = summary.next_required_field {
        println!("Next required field: {}", field.bold());
    }
    if summary.ready_to_submit {
        println!("{}", "Ready to submit".green().bold());
    }
}
