//! CLI Entry Point for alshub
//!
//! Provides command-line access to the PI reconciliation service:
//! - One-shot schedule queries
//! - A long-running watcher that keeps the PI in step with the schedule
//! - Dumping the effective configuration
//!
//! # Usage
//!
//! Who is scheduled on an endstation right now:
//! ```bash
//! alshub query --endstation 7.0.1.1
//! ```
//!
//! Follow the schedule until Ctrl+C:
//! ```bash
//! alshub watch --interval 10s
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use alshub::config::{HubConfig, DEFAULT_CONFIG_PATH};
use alshub::logging;
use alshub::notify::TracingNotifier;
use alshub::schedule::{EsafClient, MockSchedule, PiRecord, ScheduleSource};
use alshub::session::{load_session, save_session};
use alshub::PiService;

#[derive(Parser)]
#[command(name = "alshub")]
#[command(about = "Keeps the scheduled PI attached to acquired beamline data", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Answer every schedule query with this PI instead of contacting the
    /// service, given as "Name <email>"
    #[arg(long, global = true, value_parser = parse_mock_pi)]
    mock_pi: Option<PiRecord>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the schedule once and print the PI
    Query {
        /// Endstation to query (defaults to the configured one)
        #[arg(long)]
        endstation: Option<String>,

        /// Point in time to query, RFC 3339 (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Follow the schedule and publish PI changes until Ctrl+C
    Watch {
        /// Endstation to follow (defaults to the configured one)
        #[arg(long)]
        endstation: Option<String>,

        /// Poll interval, e.g. "10s" or "10m"
        #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
        interval: Option<Duration>,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = HubConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let endstation = match &cli.command {
        Commands::Query { endstation, .. } | Commands::Watch { endstation, .. } => {
            endstation.clone()
        }
        Commands::Config => None,
    };
    if let Some(endstation) = &endstation {
        config.schedule.endstation = endstation.clone();
    }
    if let Commands::Watch {
        interval: Some(interval),
        ..
    } = &cli.command
    {
        config.service.poll_interval = *interval;
    }

    config
        .validate()
        .map_err(|e| anyhow!("Invalid configuration: {e}"))?;
    logging::init_from_config(&config).map_err(|e| anyhow!(e))?;

    let source = schedule_source(&config, cli.mock_pi.clone())?;

    match cli.command {
        Commands::Query { at, .. } => query_once(&config, source, at.as_deref()).await,
        Commands::Watch { .. } => watch(config, source, endstation).await,
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn parse_mock_pi(value: &str) -> Result<PiRecord, String> {
    let (name, rest) = value
        .split_once('<')
        .ok_or_else(|| "expected \"Name <email>\"".to_string())?;
    let email = rest
        .strip_suffix('>')
        .ok_or_else(|| "expected \"Name <email>\"".to_string())?;
    Ok(PiRecord::new(name.trim(), email.trim()))
}

fn schedule_source(
    config: &HubConfig,
    mock_pi: Option<PiRecord>,
) -> Result<Arc<dyn ScheduleSource>> {
    match mock_pi {
        Some(pi) => {
            info!(pi = %pi.email, "Using mock schedule");
            Ok(Arc::new(MockSchedule::always(pi)))
        }
        None => {
            let client =
                EsafClient::new(&config.schedule).context("Failed to build schedule client")?;
            Ok(Arc::new(client))
        }
    }
}

fn parse_query_time(at: Option<&str>) -> Result<DateTime<Utc>> {
    match at {
        None => Ok(Utc::now()),
        Some(at) => {
            let parsed = DateTime::parse_from_rfc3339(at)
                .with_context(|| format!("Invalid --at timestamp '{at}'"))?;
            Ok(parsed.with_timezone(&Utc))
        }
    }
}

async fn query_once(
    config: &HubConfig,
    source: Arc<dyn ScheduleSource>,
    at: Option<&str>,
) -> Result<()> {
    let at = parse_query_time(at)?;
    let endstation = &config.schedule.endstation;

    let pi = source
        .current_pi(endstation, at)
        .await
        .with_context(|| format!("Schedule query for {endstation} failed"))?;

    match pi {
        Some(pi) => println!("{endstation}: {} <{}>", pi.name, pi.email),
        None => println!("{endstation}: no PI scheduled"),
    }
    Ok(())
}

async fn prompt_user_email() -> Result<String> {
    tokio::task::spawn_blocking(|| -> std::io::Result<String> {
        print!("User email address: ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    })
    .await
    .context("Prompt task failed")?
    .context("Failed to read user email")
}

async fn watch(
    config: HubConfig,
    source: Arc<dyn ScheduleSource>,
    endstation_override: Option<String>,
) -> Result<()> {
    let prompt = config.service.prompt_user_email;
    let mut service = PiService::new(&config, source, Arc::new(TracingNotifier))?;

    if let Some(path) = &config.service.session_path {
        if path.exists() {
            match load_session(path) {
                Ok(session) => {
                    service
                        .panel_mut()
                        .restore(&session, !prompt)
                        .await
                        .with_context(|| format!("Invalid session in {}", path.display()))?;
                    // An explicit --endstation wins over the saved one.
                    if let Some(endstation) = endstation_override.clone() {
                        service.panel_mut().set_endstation(endstation).await?;
                    }
                    info!(path = %path.display(), "Restored settings session");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unreadable session"),
            }
        }
    }

    if prompt {
        let email = prompt_user_email().await?;
        if let Err(e) = service.panel_mut().set_user_email(email).await {
            warn!(error = %e, "User email not set");
        }
    }

    let handle = service.spawn();
    let mut snapshots = handle.subscribe();

    let outcome = handle.apply().await?;
    info!(?outcome, "Settings applied");
    info!(snapshot = %snapshots.borrow_and_update().to_json(), "Metadata");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                info!(snapshot = %snapshot.to_json(), "Metadata updated");
            }
        }
    }

    if let Some(path) = &config.service.session_path {
        let session = handle.export_session(!prompt).await?;
        save_session(&session, path)
            .with_context(|| format!("Failed to save session to {}", path.display()))?;
        info!(path = %path.display(), "Saved settings session");
    }

    handle.shutdown().await?;
    Ok(())
}
