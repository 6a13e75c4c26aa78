use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use similar::{ChangeTag, TextDiff};

use vela_core::reconciler::{ReconcileOptions, ReconcileResult, Reconciler};
use vela_core::state::{CurrentState, DesiredState, Snapshot};
use vela_provider_aws::{CloudControl, resources};

#[derive(Parser)]
#[command(name = "vela")]
#[command(about = "Declarative reconciliation for AWS resources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what reconciliation would change, without mutating anything
    Plan {
        /// Path to the resource declaration
        #[arg(default_value = "resource.json")]
        file: PathBuf,
    },
    /// Converge the resource to the declared state
    Apply {
        /// Path to the resource declaration
        #[arg(default_value = "resource.json")]
        file: PathBuf,
    },
    /// Delete the declared resource
    Destroy {
        /// Path to the resource declaration
        #[arg(default_value = "resource.json")]
        file: PathBuf,

        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Print the live state of the declared resource
    Describe {
        /// Path to the resource declaration
        #[arg(default_value = "resource.json")]
        file: PathBuf,
    },
}

/// One resource declaration, read from a JSON file
#[derive(Debug, Deserialize)]
struct Declaration {
    resource_type: String,
    region: String,
    identifier: String,
    #[serde(default)]
    desired: DesiredState,
}

fn load_declaration(path: &Path) -> Result<Declaration, String> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    parse_declaration(&text).map_err(|e| format!("Invalid declaration in {}: {}", path.display(), e))
}

fn parse_declaration(text: &str) -> Result<Declaration, serde_json::Error> {
    serde_json::from_str(text)
}

async fn build_reconciler(decl: &Declaration) -> Result<Reconciler<CloudControl>, String> {
    let def = resources::lookup(&decl.resource_type).ok_or_else(|| {
        let known: Vec<&str> = resources::all().iter().map(|d| d.label).collect();
        format!(
            "Unknown resource type '{}' (known: {})",
            decl.resource_type,
            known.join(", ")
        )
    })?;
    Ok(vela_provider_aws::reconciler(&decl.region, &def).await)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    if let Err(message) = run(cli).await {
        eprintln!("{}", message.red());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Plan { file } => {
            let decl = load_declaration(&file)?;
            let reconciler = build_reconciler(&decl).await?;
            let opts = ReconcileOptions {
                dry_run: true,
                ..Default::default()
            };
            let result = reconciler.apply(&decl.identifier, &decl.desired, &opts).await;
            render_state_diff(result.old_state.as_ref(), result.new_state.as_ref());
            render_result(&result)
        }
        Commands::Apply { file } => {
            let decl = load_declaration(&file)?;
            let reconciler = build_reconciler(&decl).await?;
            let opts = ReconcileOptions::default();
            let result = reconciler.apply(&decl.identifier, &decl.desired, &opts).await;
            render_state_diff(result.old_state.as_ref(), result.new_state.as_ref());
            render_result(&result)
        }
        Commands::Destroy { file, auto_approve } => {
            let decl = load_declaration(&file)?;
            if !auto_approve
                && !confirm(&format!(
                    "Destroy {} '{}'? Only 'yes' will be accepted:",
                    decl.resource_type, decl.identifier
                ))?
            {
                println!("Aborted.");
                return Ok(());
            }
            let reconciler = build_reconciler(&decl).await?;
            let result = reconciler
                .destroy(&decl.identifier, &ReconcileOptions::default())
                .await;
            render_result(&result)
        }
        Commands::Describe { file } => {
            let decl = load_declaration(&file)?;
            let reconciler = build_reconciler(&decl).await?;
            match reconciler.describe(&decl.identifier).await {
                Ok(Snapshot::Present(state)) => {
                    println!("{}", state_text(Some(&state)));
                    Ok(())
                }
                Ok(Snapshot::Absent) => {
                    println!(
                        "{} '{}' does not exist",
                        decl.resource_type, decl.identifier
                    );
                    Ok(())
                }
                Err(error) => Err(error.to_string()),
            }
        }
    }
}

fn render_result(result: &ReconcileResult) -> Result<(), String> {
    for line in &result.comment {
        println!("{}", line);
    }
    if result.result {
        println!("{}", "Reconciliation complete".green());
        Ok(())
    } else {
        Err("Reconciliation failed".to_string())
    }
}

/// Render old vs. new state as a colored line diff
fn render_state_diff(old: Option<&CurrentState>, new: Option<&CurrentState>) {
    let old_text = state_text(old);
    let new_text = state_text(new);
    if old_text == new_text {
        return;
    }

    let diff = TextDiff::from_lines(&old_text, &new_text);
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => print!("{}", format!("- {}", change).red()),
            ChangeTag::Insert => print!("{}", format!("+ {}", change).green()),
            ChangeTag::Equal => print!("  {}", change),
        }
    }
}

fn state_text(state: Option<&CurrentState>) -> String {
    match state {
        Some(state) => {
            let mut text = serde_json::to_string_pretty(&state.attributes)
                .unwrap_or_else(|_| "{}".to_string());
            text.push('\n');
            text
        }
        None => String::new(),
    }
}

fn confirm(prompt: &str) -> Result<bool, String> {
    print!("{prompt} ");
    io::stdout()
        .flush()
        .map_err(|e| format!("Failed to flush stdout: {e}"))?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .map_err(|e| format!("Failed to read confirmation: {e}"))?;
    Ok(line.trim() == "yes")
}
