#![warn(missing_docs)]
//! # soilscan binary
//!
//! Command-line shell over [`soilscan_app::Workflow`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use soilscan_app::{
    AppError, CliConfigOverrides, LayeredConfig, SubmissionPath, Workflow, app_version,
    config::default_config_path,
};
use soilscan_auth::{sign_in, sign_out};
use soilscan_render::{MicronutrientRow, ResultView};
use soilscan_stager::Candidate;
use soilscan_store::{FileStore, KeyValueStore};
use soilscan_upload::HttpTransport;

#[derive(Parser)]
#[command(name = "soilscan", version = app_version(), about = "Soil photo analysis client")]
struct Cli {
    /// TOML config file (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Analysis endpoint URL.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Session store file.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Request timeout in seconds; 0 disables it.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a soil photo for analysis.
    Analyze {
        /// Image file.
        image: PathBuf,
        /// Print the rendered result as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show session, guest quota and submit state.
    Status {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Store an issued credential.
    SignIn {
        /// Account name.
        #[arg(long)]
        username: String,
        /// Bearer token issued by the service.
        #[arg(long)]
        token: String,
    },
    /// Clear the stored credential.
    SignOut,
    /// Show effective configuration and where each value came from.
    Config,
}

#[derive(Serialize)]
struct AnalyzeOutput<'a> {
    path: SubmissionPath,
    guest_scans_used: Option<u32>,
    result: &'a ResultView,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    tracing::debug!(endpoint = %config.endpoint.value, "configuration resolved");

    let store_path = &config.store_path.value;
    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(store_path)
            .with_context(|| format!("failed to open store {}", store_path.display()))?,
    );

    match cli.command {
        Command::Analyze { image, json } => analyze(&config, store, image, json),
        Command::Status { json } => status(&config, store, json),
        Command::SignIn { username, token } => {
            let session = sign_in(store.as_ref(), &username, &token)
                .context("failed to store credential")?;
            println!(
                "Signed in as {}",
                session.username().unwrap_or(username.as_str())
            );
            Ok(())
        }
        Command::SignOut => {
            sign_out(store.as_ref()).context("failed to clear credential")?;
            println!("Signed out");
            Ok(())
        }
        Command::Config => {
            for (key, (value, source)) in config.to_inspection_map() {
                println!("{key} = {value} ({source:?})");
            }
            Ok(())
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();
    config = match (&cli.config, default_config_path()) {
        (Some(path), _) => config
            .load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        (None, Some(path)) => config.load_from_optional_file(&path)?,
        (None, None) => config,
    };
    config = config.load_from_env();
    config.update_from_cli(CliConfigOverrides {
        endpoint: cli.endpoint.clone(),
        store_path: cli.store.clone(),
        request_timeout_secs: cli.timeout_secs,
    });
    config.validate()?;
    Ok(config)
}

fn workflow(config: &LayeredConfig, store: Arc<dyn KeyValueStore>) -> Result<Workflow> {
    let transport = HttpTransport::new(&config.endpoint.value, config.request_timeout())
        .context("failed to build analysis transport")?;
    Ok(Workflow::new(store, Arc::new(transport)))
}

fn analyze(
    config: &LayeredConfig,
    store: Arc<dyn KeyValueStore>,
    image: PathBuf,
    json: bool,
) -> Result<()> {
    let mut workflow = workflow(config, store)?;

    let candidate = Candidate::from_path(&image)
        .with_context(|| format!("failed to read {}", image.display()))?;
    let ticket = workflow.select_file(candidate)?;
    workflow.preview_ready(ticket.resolve());

    let submission = match workflow.analyze(&mut |notice| eprintln!("{}", notice.message())) {
        Ok(submission) => submission,
        Err(AppError::Submit(error)) if error.requires_sign_in() => {
            anyhow::bail!("{error}\nRun `soilscan sign-in --username <NAME> --token <TOKEN>`.");
        }
        Err(error) => return Err(error.into()),
    };

    let view = workflow.view();
    if json {
        let output = AnalyzeOutput {
            path: submission.path,
            guest_scans_used: submission.guest_scans_used,
            result: view,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for (label, value) in view.rows() {
        println!("{label:<20} {value}");
    }
    print_micronutrients(&view.micronutrients);
    if !view.crops.is_empty() {
        println!("{:<20} {}", "Recommended crops", view.crops.join(", "));
    }
    if let Some(used) = submission.guest_scans_used {
        let status = workflow.status();
        println!(
            "\nGuest scans used: {used}/{}",
            status.guest_scan_limit
        );
    }
    Ok(())
}

fn print_micronutrients(rows: &[MicronutrientRow]) {
    if rows.is_empty() {
        return;
    }
    println!("Micronutrients");
    for row in rows {
        println!("  {:<18} {}", row.name, row.value);
    }
}

fn status(config: &LayeredConfig, store: Arc<dyn KeyValueStore>, json: bool) -> Result<()> {
    let status = workflow(config, store)?.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match &status.signed_in_as {
        Some(username) => println!("Signed in as {username}"),
        None => println!(
            "Guest ({} of {} free scans left)",
            status.guest_scans_remaining.unwrap_or_default(),
            status.guest_scan_limit
        ),
    }
    println!("Endpoint: {}", config.endpoint.value);
    Ok(())
}
