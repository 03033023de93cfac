//! # tasmoforge CLI Entry Point
//!
//! Parses CLI arguments using clap and routes commands to the build
//! orchestration core.
//!
//! ## Command Structure
//!
//! - **Build**: `build` - run a full firmware compilation from a request file
//! - **Inspect**: `version`, `artifacts` - query the current checkout
//! - **Maintenance**: `migrate` - one-time source-tree layout migration
//! - **Shell**: `completions` - generate shell completion scripts

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::thread;

use tasmoforge::compile::{
    Artifact, BuildEvent, BuildOutcome, BuildSession, extract_version, format_version,
    list_artifacts, normalize_layout,
};
use tasmoforge::config::{self, BuildRequest, RepoPaths};
use tasmoforge::git::{BranchSwitcher, FixedCheckout, GitSwitcher};

#[derive(Parser)]
#[command(name = "tasmoforge")]
#[command(about = "The Tasmota firmware build orchestrator", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile firmware from a build request file
    Build {
        /// JSON build request (network, features, version, customParams)
        #[arg(short, long)]
        config: PathBuf,
        /// Tasmota checkout to build in (overrides tasmoforge.toml)
        #[arg(long)]
        repo: Option<PathBuf>,
        /// Build the checkout as-is, without switching versions
        #[arg(long)]
        skip_checkout: bool,
    },
    /// Show the Tasmota version of the current checkout
    Version {
        /// Tasmota checkout to inspect (overrides tasmoforge.toml)
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// List the downloadable build products of the last compilation
    Artifacts {
        /// Tasmota checkout to inspect (overrides tasmoforge.toml)
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// Migrate a legacy (pre-6.7.1.1) checkout to the current layout
    Migrate {
        /// Tasmota checkout to migrate (overrides tasmoforge.toml)
        #[arg(long)]
        repo: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            config,
            repo,
            skip_checkout,
        } => cmd_build(&config, repo, skip_checkout),
        Commands::Version { repo } => cmd_version(repo),
        Commands::Artifacts { repo } => cmd_artifacts(repo),
        Commands::Migrate { repo } => cmd_migrate(repo),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "tasmoforge", &mut io::stdout());
            Ok(())
        }
    }
}

fn repo_paths(repo: Option<PathBuf>) -> Result<(RepoPaths, String)> {
    let settings = config::load_settings()?;
    let root = repo.unwrap_or(settings.repo_dir);
    Ok((RepoPaths::new(root), settings.repo_url))
}

// --- COMMAND: Build ---
fn cmd_build(request_path: &PathBuf, repo: Option<PathBuf>, skip_checkout: bool) -> Result<()> {
    let (paths, repo_url) = repo_paths(repo)?;
    let request = BuildRequest::load(request_path)?;

    println!(
        "{} Building Tasmota firmware ({})...",
        "🔨".cyan(),
        request.requested_version().unwrap_or("unspecified version")
    );
    println!("   {} Checkout: {}", "→".dimmed(), paths.root().display());
    println!();

    let switcher: Box<dyn BranchSwitcher + Send> = if skip_checkout {
        Box::new(FixedCheckout::new(paths.root()))
    } else {
        Box::new(GitSwitcher::new(paths.root(), repo_url))
    };

    let (events_tx, events_rx) = channel();
    let session_paths = paths.clone();
    let worker = thread::spawn(move || {
        BuildSession::new(&session_paths, switcher.as_ref(), events_tx).run(&request);
    });

    let mut outcome = None;
    for event in events_rx {
        match event {
            BuildEvent::Message(text) => {
                print!("{text}");
                let _ = io::stdout().flush();
            }
            BuildEvent::Finished(result) => outcome = Some(result),
        }
    }
    worker
        .join()
        .map_err(|_| anyhow::anyhow!("Build session thread panicked"))?;

    println!();
    match outcome {
        Some(BuildOutcome::Completed { ok: true }) => {
            println!("{} Firmware build succeeded", "✓".green());
            print_artifacts(&list_artifacts(&paths));
            Ok(())
        }
        Some(BuildOutcome::Completed { ok: false }) => {
            bail!("Firmware build failed");
        }
        Some(BuildOutcome::Aborted { status, message }) => {
            bail!("Build aborted (status {status}): {message}");
        }
        // the session emits exactly one terminal event on every path, so
        // this only fires if the worker died mid-session
        None => bail!("Build session ended without a result"),
    }
}

// --- COMMAND: Version ---
fn cmd_version(repo: Option<PathBuf>) -> Result<()> {
    let (paths, _) = repo_paths(repo)?;
    let version = extract_version(&paths.version_file())
        .context("Failed to read the checkout's Tasmota version")?;
    println!(
        "{} Tasmota {} ({:#010x})",
        "→".dimmed(),
        format_version(version).bold(),
        version
    );
    Ok(())
}

// --- COMMAND: Artifacts ---
fn cmd_artifacts(repo: Option<PathBuf>) -> Result<()> {
    let (paths, _) = repo_paths(repo)?;
    let artifacts = list_artifacts(&paths);
    if artifacts.is_empty() {
        println!("{} No build products found. Run a build first.", "!".yellow());
        return Ok(());
    }
    print_artifacts(&artifacts);
    Ok(())
}

fn print_artifacts(artifacts: &[Artifact]) {
    for artifact in artifacts {
        println!(
            "   {} {} ({} KiB)  {}",
            "📦".blue(),
            artifact.name.bold(),
            artifact.size / 1024,
            artifact.path.display().to_string().dimmed()
        );
        if let Some(digest) = &artifact.sha256 {
            println!("     sha256: {}", digest.dimmed());
        }
    }
}

// --- COMMAND: Migrate ---
fn cmd_migrate(repo: Option<PathBuf>) -> Result<()> {
    let (paths, _) = repo_paths(repo)?;
    let had_legacy = paths.legacy_source_dir().is_dir();
    normalize_layout(&paths)?;
    if had_legacy {
        println!("{} Moved sonoff/ to tasmota/", "✓".green());
    } else {
        println!("{} Layout already current, nothing to do", "✓".green());
    }
    Ok(())
}
