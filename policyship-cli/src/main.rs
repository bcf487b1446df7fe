//! Policyship: deliver versioned policy artifacts from a repository to a registry.
//!
//! # Usage
//!
//! ```text
//! policyship init [--repo <dir>] [--registry-url <url>] [--baseline <rev>] [--force]
//! policyship plan [--head <rev>] [--json]
//! policyship reconcile --release <tag> [--head <rev>] [--dry-run] [--json] [--summary-file <path>]
//! policyship status [--json]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    init::InitArgs, plan::PlanArgs, reconcile::ReconcileArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "policyship",
    version,
    about = "Reconcile versioned policy artifacts with a remote registry",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a .policyship.yaml scaffold and optionally seed the baseline.
    Init(InitArgs),

    /// Show which changed artifacts a run would publish, without contacting the registry.
    Plan(PlanArgs),

    /// Detect, validate and publish changed artifacts, then update the ledger.
    Reconcile(ReconcileArgs),

    /// Show the baseline and recorded deliveries.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Plan(args) => args.run(),
        Commands::Reconcile(args) => args.run(),
        Commands::Status(args) => args.run(),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
