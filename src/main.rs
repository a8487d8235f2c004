//! # dayshare: proactive sharing scheduler
//!
//! Decides when and what an automated agent shares: period-aware content
//! rotation, weighted source choice, topic deduplication, and group
//! activity gating, all restart-safe on SQLite.
//!
//! Usage:
//!   dayshare run                          # Start the cron-driven daemon
//!   dayshare trigger                      # Fire one run right now
//!   dayshare trigger -t news -s zhihu     # Force type and source
//!   dayshare status                       # Schedule and rotation state
//!   dayshare view-sequence                # Per-period rotation tables

mod collaborators;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use dayshare_core::DayShareConfig;
use dayshare_core::types::{ContentType, Period};
use dayshare_scheduler::{Collaborators, RunCoordinator, RunOutcome, SharingDb, cron, run_loop};
use tracing_subscriber::EnvFilter;

use collaborators::{HttpChatHistory, HttpSourceFetcher, WebhookDeliverer, WebhookGenerator};

#[derive(Parser)]
#[command(name = "dayshare", version, about = "📤 dayshare — proactive sharing scheduler")]
struct Cli {
    /// Config file path (default: ~/.dayshare/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the cron-driven sharing daemon
    Run,
    /// Fire a single sharing run immediately
    Trigger {
        /// Force a content type instead of stepping the rotation
        #[arg(short = 't', long = "type")]
        content_type: Option<ContentType>,
        /// Force a specific source (news only)
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Show schedule, rotation state, and next run time
    Status,
    /// Show recent sharing outcomes
    History {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Clear the rotation cursor
    ResetState,
    /// Print the rotation sequence of every period
    ViewSequence,
    /// Turn automatic sharing on
    Enable,
    /// Turn automatic sharing off
    Disable,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "dayshare=debug" } else { "dayshare=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(DayShareConfig::default_path);
    let config = if config_path.exists() {
        DayShareConfig::load_from(&config_path)?
    } else {
        DayShareConfig::default()
    };

    match cli.command {
        Command::Run => {
            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            let coordinator =
                Arc::new(build_coordinator(config)?.with_shutdown(shutdown_rx.clone()));

            let loop_handle = tokio::spawn(run_loop(coordinator, shutdown_rx));
            tokio::signal::ctrl_c().await?;
            tracing::info!("Received Ctrl-C, shutting down");
            let _ = shutdown_tx.send(true);
            loop_handle.await?;
        }
        Command::Trigger { content_type, source } => {
            let coordinator = build_coordinator(config)?;
            match coordinator.trigger(content_type, source).await? {
                RunOutcome::Completed { content_type, sent, failed, suppressed } => {
                    println!("✅ Shared {content_type}: {sent} sent, {failed} failed, {suppressed} suppressed");
                }
                RunOutcome::Skipped { reason } => println!("⏭️  Skipped: {reason}"),
            }
        }
        Command::Status => {
            let db = SharingDb::open_default()?;
            let now = Local::now();
            let next = cron::next_run_from_cron(&config.basic.sharing_cron, now);
            let state = db.load_schedule_state()?;

            println!("📤 dayshare status\n");
            println!("  Auto sharing: {}", if config.enable_auto_sharing { "enabled" } else { "disabled" });
            println!("  Cron:         {}", config.basic.sharing_cron);
            match next {
                Some(t) => println!("  Next run:     {}", t.format("%Y-%m-%d %H:%M")),
                None => println!("  Next run:     (none, check the cron expression)"),
            }
            println!("  Recipients:   {}", config.recipient_list().len());
            if let Ok(table) = dayshare_scheduler::PeriodTable::new(config.periods.clone()) {
                use chrono::Timelike;
                println!("  Period now:   {}", table.classify(now.hour()));
            }
            match (state.last_period, state.last_type, state.last_timestamp) {
                (Some(period), Some(t), Some(at)) => {
                    println!("  Last run:     {t} in the {period} at {}", at.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
                    println!("  Cursor:       {}", state.cursor);
                }
                _ => println!("  Last run:     (never)"),
            }
            let recent = db.recent_history(3)?;
            if !recent.is_empty() {
                println!("\n  Recent:");
                for e in recent {
                    let mark = if e.success { "✅" } else { "❌" };
                    println!(
                        "    {mark} {} {} -> {}",
                        e.timestamp.with_timezone(&Local).format("%m-%d %H:%M"),
                        e.content_type,
                        e.target
                    );
                }
            }
        }
        Command::History { limit } => {
            let db = SharingDb::open_default()?;
            let entries = db.recent_history(limit)?;
            if entries.is_empty() {
                println!("No sharing history yet.");
            }
            for e in entries {
                let mark = if e.success { "✅" } else { "❌" };
                println!(
                    "{mark} {} {} -> {}: {}",
                    e.timestamp.with_timezone(&Local).format("%m-%d %H:%M"),
                    e.content_type,
                    e.target,
                    e.preview
                );
            }
        }
        Command::ResetState => {
            let db = SharingDb::open_default()?;
            db.reset_schedule_state()?;
            println!("✅ Rotation state cleared.");
        }
        Command::ViewSequence => {
            let state = SharingDb::open_default()?.load_schedule_state().ok();
            println!("📋 Rotation sequences\n");
            for period in [
                Period::Dawn,
                Period::Morning,
                Period::Forenoon,
                Period::Afternoon,
                Period::Evening,
                Period::Night,
            ] {
                let sequence = config
                    .sequences
                    .get(&period)
                    .cloned()
                    .unwrap_or_else(|| vec![ContentType::Greeting]);
                let rendered: Vec<String> = sequence
                    .iter()
                    .enumerate()
                    .map(|(i, t)| {
                        let current = state
                            .as_ref()
                            .is_some_and(|s| s.last_period == Some(period) && s.cursor == i);
                        if current { format!("[{t}]") } else { t.to_string() }
                    })
                    .collect();
                println!("  {:<9} {}", period.to_string(), rendered.join(" -> "));
            }
            println!("\n  [..] marks the next entry for the period of the last run.");
        }
        Command::Enable => toggle_auto_sharing(&config_path, config, true)?,
        Command::Disable => toggle_auto_sharing(&config_path, config, false)?,
    }

    Ok(())
}

fn build_coordinator(config: DayShareConfig) -> Result<RunCoordinator> {
    if config.endpoints.generation_url.is_empty() || config.endpoints.delivery_url.is_empty() {
        anyhow::bail!(
            "endpoints.generation_url and endpoints.delivery_url must be set in {}",
            DayShareConfig::default_path().display()
        );
    }
    let db = Arc::new(SharingDb::open_default()?);
    let collab = Collaborators {
        generator: Arc::new(WebhookGenerator::new(config.endpoints.generation_url.clone())),
        deliverer: Arc::new(WebhookDeliverer::new(config.endpoints.delivery_url.clone())),
        source_fetcher: Arc::new(HttpSourceFetcher::new(config.sources.catalog.clone())),
        chat_history: config
            .endpoints
            .history_url
            .clone()
            .map(|url| {
                Arc::new(HttpChatHistory::new(url)) as Arc<dyn dayshare_core::traits::ChatHistoryProvider>
            }),
    };
    Ok(RunCoordinator::new(config, db, collab)?)
}

fn toggle_auto_sharing(path: &std::path::Path, mut config: DayShareConfig, on: bool) -> Result<()> {
    config.enable_auto_sharing = on;
    config.save_to(path)?;
    println!(
        "✅ Automatic sharing {} (saved to {}).",
        if on { "enabled" } else { "disabled" },
        path.display()
    );
    Ok(())
}
