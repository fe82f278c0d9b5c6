///
/// This module implements the CLI interface for bucket-mirror: command parsing,
/// argument validation and the async entrypoint.
///
/// All reconciliation logic lives in the [`bucket-mirror-core`] crate.
/// This module is strictly CLI glue: it loads the YAML declaration, opens the
/// state file, hands both to the core lifecycle and prints what changed.
///
/// ## How To Use
/// - Command-line users: `bucket-mirror --help`.
/// - Programmatic/integration use: call [`run`] with a parsed [`Cli`], or
///   [`run_with_factory`] to supply a different store client factory.
///
/// [`bucket-mirror-core`]: ../../bucket-mirror-core/
use crate::load_config::{describe_types, load_config, parse_type_override, CliConfig};
use crate::state::FileResource;
use anyhow::Result;
use bucket_mirror_core::content_type::ContentTypes;
use bucket_mirror_core::contract::ClientFactory;
use bucket_mirror_core::reconcile::{Diff, SyncReport};
use bucket_mirror_core::resource;
use bucket_mirror_core::s3::AwsClientFactory;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// CLI for bucket-mirror: keep a bucket in sync with a local directory.
#[derive(Parser)]
#[clap(
    name = "bucket-mirror",
    version,
    about = "Mirror a local directory tree into an S3-compatible bucket, applying only the changes"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload the tree on first run, then apply only additions and removals
    Apply {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Content-type override, EXT=MIME (repeatable, wins over the config file)
        #[clap(long = "type", value_parser = parse_type_override)]
        types: Vec<(String, String)>,
    },
    /// Show what apply would change without touching the bucket
    Plan {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Content-type override, EXT=MIME (repeatable); shown next to each upload
        #[clap(long = "type", value_parser = parse_type_override)]
        types: Vec<(String, String)>,
    },
    /// List the bucket and report drift from the recorded state
    Read {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Delete every recorded object from the bucket and forget the mirror
    Destroy {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
}

impl Commands {
    /// Config file named by the command.
    pub fn config_path(&self) -> &Path {
        match self {
            Commands::Apply { config, .. }
            | Commands::Plan { config, .. }
            | Commands::Read { config }
            | Commands::Destroy { config } => config.as_path(),
        }
    }
}

/// Async CLI entrypoint for main() and integration tests, talking to S3.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.command.config_path())?;
    let factory = AwsClientFactory::new().with_endpoint(config.endpoint.clone());
    execute(cli.command, config, &factory).await
}

/// Run a parsed command against clients produced by `factory`.
pub async fn run_with_factory<F: ClientFactory>(cli: Cli, factory: &F) -> Result<()> {
    let config = load_config(cli.command.config_path())?;
    execute(cli.command, config, factory).await
}

async fn execute<F: ClientFactory>(command: Commands, config: CliConfig, factory: &F) -> Result<()> {
    tracing::info!("trace_initialised");

    match command {
        Commands::Apply { types, .. } => {
            let mut data = open(config.with_type_overrides(&types))?;
            tracing::info!(command = "apply", "Starting apply");
            let outcome = resource::apply(factory, &mut data).await;
            // Record whatever the lifecycle committed, even when it failed.
            data.save()?;
            let report = outcome?;
            print_report(&report);
        }
        Commands::Plan { types, .. } => {
            let config = config.with_type_overrides(&types);
            if !config.resource.types.is_empty() {
                tracing::info!(overrides = %describe_types(&config.resource.types), "Content-type overrides");
            }
            let content_types = config.resource.content_types();
            let data = open(config)?;
            let diff = resource::plan(&data).await?;
            print_plan(&diff, &content_types);
        }
        Commands::Read { .. } => {
            let data = open(config)?;
            let outcome = resource::read(factory, &data).await?;
            println!("{} objects in bucket", outcome.remote.len());
            for key in &outcome.drift.missing {
                println!("missing   {key}");
            }
            for key in &outcome.drift.untracked {
                println!("untracked {key}");
            }
            if outcome.drift.is_empty() {
                println!("No drift.");
            }
        }
        Commands::Destroy { .. } => {
            let mut data = open(config)?;
            resource::delete(factory, &mut data).await?;
            data.save()?;
            println!("Mirror destroyed.");
        }
    }
    Ok(())
}

fn open(config: CliConfig) -> Result<FileResource> {
    let state_path = config
        .state_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(crate::load_config::DEFAULT_STATE_FILE));
    FileResource::load(state_path, config.resource)
}

fn print_report(report: &SyncReport) {
    for key in &report.deleted {
        println!("- {key}");
    }
    for key in &report.uploaded {
        println!("+ {key}");
    }
    println!(
        "Apply complete: {} uploaded, {} deleted, {} unchanged.",
        report.uploaded.len(),
        report.deleted.len(),
        report.unchanged
    );
}

fn print_plan(diff: &Diff, content_types: &ContentTypes) {
    for key in diff.removed.store_keys() {
        println!("- {key}");
    }
    for (file, key) in diff.added.iter() {
        let mime = content_types.for_path(Path::new(file)).unwrap_or("unset");
        println!("+ {key} ({mime})");
    }
    println!(
        "Plan: {} to upload, {} to delete, {} unchanged.",
        diff.added.len(),
        diff.removed.len(),
        diff.unchanged
    );
}
