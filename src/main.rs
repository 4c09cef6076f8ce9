//! msync - mirror synchronization manager.
//!
//! Usage:
//!   msync run                 Run the manager and its JSON API
//!   msync validate            Validate the configuration without running
//!   msync list                List all configured repos
//!   msync trigger <NAME>      Run one repo's sync once and wait for it

use clap::{Parser, Subcommand};
use mirrorsync::{
    ApiConfig, ApiState, Config, Exporter, FileCheckpointStore, InMemoryCheckpointStore, Manager,
    NoopMetrics, load_config, start_server,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// msync - a mirror synchronization manager
#[derive(Parser)]
#[command(name = "msync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the manager and its JSON API
    Run {
        /// Override the API listen address (e.g. ":7001")
        #[arg(long)]
        address: Option<String>,
    },

    /// Validate the configuration without running
    Validate,

    /// List all configured repos
    List,

    /// Run one repo's sync once and wait for it to finish
    Trigger {
        /// Repo name
        #[arg(value_name = "NAME")]
        name: String,
    },
}

/// `RUST_LOG` wins over the configured level, which wins over `info`.
fn init_logging(config_level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config);
    init_logging(
        config
            .as_ref()
            .ok()
            .and_then(|c| c.log_level.as_deref()),
    );

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", cli.config.display(), e);
            return Err(e.into());
        }
    };

    match cli.command {
        Commands::Run { address } => run_manager(config, address).await?,
        Commands::Validate => validate_config(&cli.config, config).await?,
        Commands::List => list_repos(&config),
        Commands::Trigger { name } => trigger_repo(config, name).await?,
    }

    Ok(())
}

/// Run the manager until Ctrl+C or an exit request through the API.
async fn run_manager(
    config: Config,
    address: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let exporter = Exporter::new()?;
    let store = Arc::new(FileCheckpointStore::new(&config.checkpoint));
    let manager = Manager::new(
        config.manager_config(),
        config.repos.clone(),
        store,
        Arc::new(exporter.clone()),
    )
    .await?;

    let visible = manager.jobs().filter(|job| !job.is_hidden()).count();
    info!("Loaded {} repo(s) ({} visible)", manager.jobs().count(), visible);
    for job in manager.jobs() {
        info!(
            "  - {} ({}): every {:?}",
            job.name(),
            job.descriptor().kind().unwrap_or("?"),
            job.interval()
        );
    }

    let (handle, mut manager_task) = manager.start().await;

    let api_config = address
        .map(ApiConfig::new)
        .unwrap_or_else(|| ApiConfig::from(&config.json_api));
    let api_task = start_server(api_config, ApiState::new(handle.clone(), exporter)).await?;

    info!("Press Ctrl+C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            if let Err(e) = handle.exit().await {
                warn!("Manager did not acknowledge exit: {}", e);
            }
            if let Err(e) = manager_task.await {
                error!("Manager task failed: {}", e);
            }
        }
        result = &mut manager_task => {
            if let Err(e) = result {
                error!("Manager task failed: {}", e);
            }
            info!("Manager exited");
        }
    }

    api_task.abort();
    info!("Goodbye!");
    Ok(())
}

/// Validate the configuration by building every enabled job.
async fn validate_config(
    path: &std::path::Path,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating {}", path.display());

    let repos = config.repos.len();
    match Manager::new(
        config.manager_config(),
        config.repos,
        Arc::new(InMemoryCheckpointStore::new()),
        Arc::new(NoopMetrics),
    )
    .await
    {
        Ok(manager) => {
            info!(
                "Configuration is valid: {} repo(s), {} enabled",
                repos,
                manager.jobs().count()
            );
            Ok(())
        }
        Err(e) => {
            error!("Validation failed: {}", e);
            Err(e.into())
        }
    }
}

/// List all configured repos.
fn list_repos(config: &Config) {
    if config.repos.is_empty() {
        println!("No repos configured");
        return;
    }

    println!("Repos:");
    println!();

    for repo in &config.repos {
        println!("Name: {}", repo.name().unwrap_or("<unnamed>"));
        println!("  Type: {}", repo.kind().unwrap_or("<missing>"));
        println!("  Interval: {}s", repo.interval().as_secs());
        if let Some(path) = repo.path() {
            println!("  Path: {}", path);
        }
        if repo.is_disabled() {
            println!("  Disabled: true");
        }
        if repo.is_hidden() {
            println!("  Hidden: true");
        }
        println!();
    }
}

/// Run one repo's sync outside the schedule and report its outcome.
async fn trigger_repo(config: Config, name: String) -> Result<(), Box<dyn std::error::Error>> {
    let manager = Manager::new(
        config.manager_config(),
        config.repos,
        Arc::new(InMemoryCheckpointStore::new()),
        Arc::new(NoopMetrics),
    )
    .await?;

    let Some(job) = manager.jobs().find(|job| job.name() == name).cloned() else {
        error!("Repo '{}' not found", name);
        error!(
            "Available repos: {}",
            manager
                .jobs()
                .map(|job| job.name())
                .collect::<Vec<_>>()
                .join(", ")
        );
        return Err(format!("Repo '{}' not found", name).into());
    };

    if job.is_external() {
        info!("Repo '{}' is managed externally, nothing to run", name);
        return Ok(());
    }

    info!("Triggering '{}'", name);
    manager.run_specific_worker(&name).await?;

    let status = job.status();
    for line in status.stdout.last().into_iter().flat_map(|out| out.lines()) {
        info!("  stdout: {}", line);
    }
    for line in status.stderr.last().into_iter().flat_map(|err| err.lines()) {
        warn!("  stderr: {}", line);
    }

    if status.result {
        info!("Repo '{}' synced successfully", name);
        Ok(())
    } else {
        error!("Repo '{}' failed", name);
        Err(format!("Repo '{}' failed", name).into())
    }
}
