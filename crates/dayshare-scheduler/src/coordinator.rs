//! Run orchestration: one trigger in, at most one sharing run out.
//!
//! A trigger survives the debounce gate and the single-flight lock, then
//! walks the decision pipeline: classify the period, step (or override)
//! the rotation, resolve a source when needed, and fan out to every
//! configured recipient sequentially. Per-recipient failures are recorded
//! and never abort the rest of the run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local, Timelike, Utc};
use dayshare_core::config::DayShareConfig;
use dayshare_core::error::{DayShareError, Result};
use dayshare_core::traits::{ChatHistoryProvider, Deliverer, Generator, SourceFetcher};
use dayshare_core::types::{
    ContentType, GenerationRequest, Period, Recipient, SourceData, SuppressPolicy,
};
use rand::Rng;
use tokio::sync::watch;

use crate::activity;
use crate::cron;
use crate::history::SentHistory;
use crate::ledger::TopicLedger;
use crate::period::PeriodTable;
use crate::persistence::SharingDb;
use crate::retry::with_retry;
use crate::rotation::{ScheduleState, SequenceScheduler};
use crate::selector;

/// A database run-lock claim older than this is assumed to be left over
/// from a crashed process.
const RUN_LOCK_STALE_SECS: i64 = 600;

/// External services the coordinator drives.
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub deliverer: Arc<dyn Deliverer>,
    pub source_fetcher: Arc<dyn SourceFetcher>,
    pub chat_history: Option<Arc<dyn ChatHistoryProvider>>,
}

/// What a trigger amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        content_type: ContentType,
        sent: usize,
        failed: usize,
        suppressed: usize,
    },
    Skipped {
        reason: String,
    },
}

pub struct RunCoordinator {
    config: DayShareConfig,
    period_table: PeriodTable,
    scheduler: SequenceScheduler,
    ledger: TopicLedger,
    history: SentHistory,
    db: Arc<SharingDb>,
    collab: Collaborators,
    run_lock: tokio::sync::Mutex<()>,
    last_run_started: std::sync::Mutex<Option<DateTime<Utc>>>,
    enabled: AtomicBool,
    shutdown: Option<watch::Receiver<bool>>,
}

impl RunCoordinator {
    pub fn new(config: DayShareConfig, db: Arc<SharingDb>, collab: Collaborators) -> Result<Self> {
        let period_table = PeriodTable::new(config.periods.clone())?;
        if !cron::validate(&config.basic.sharing_cron) {
            return Err(DayShareError::Config(format!(
                "invalid cron expression '{}'",
                config.basic.sharing_cron
            )));
        }
        let scheduler = SequenceScheduler::new(config.sequences.clone(), db.clone());
        let ledger = TopicLedger::new(
            db.clone(),
            config.topics.window_days,
            config.topics.retention_days,
        );
        let history = SentHistory::new(db.clone(), config.basic.history_limit);
        let enabled = AtomicBool::new(config.enable_auto_sharing);
        Ok(Self {
            config,
            period_table,
            scheduler,
            ledger,
            history,
            db,
            collab,
            run_lock: tokio::sync::Mutex::new(()),
            last_run_started: std::sync::Mutex::new(None),
            enabled,
            shutdown: None,
        })
    }

    /// Installs a shutdown signal. A run in flight finishes its current
    /// recipient, then stops fanning out.
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(rx);
        self
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    pub fn config(&self) -> &DayShareConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::SeqCst);
    }

    pub fn schedule_state(&self) -> Result<ScheduleState> {
        self.db.load_schedule_state()
    }

    pub fn reset_schedule_state(&self) -> Result<()> {
        self.db.reset_schedule_state()
    }

    pub fn sequence_for(&self, period: Period) -> &[ContentType] {
        self.scheduler.sequence_for(period)
    }

    pub fn recent_history(&self, limit: usize) -> Result<Vec<crate::history::SentHistoryEntry>> {
        self.history.recent(limit)
    }

    /// Runs one sharing cycle at the current wall-clock time.
    pub async fn trigger(
        &self,
        forced_type: Option<ContentType>,
        forced_source: Option<String>,
    ) -> Result<RunOutcome> {
        self.run_at(Local::now(), forced_type, forced_source).await
    }

    /// Runs one sharing cycle as of `now`. Public so tests and manual
    /// tools can pin the clock.
    pub async fn run_at(
        &self,
        now: DateTime<Local>,
        forced_type: Option<ContentType>,
        forced_source: Option<String>,
    ) -> Result<RunOutcome> {
        let now_utc = now.with_timezone(&Utc);

        // Debounce: two triggers landing close together collapse to one.
        {
            let last = self
                .last_run_started
                .lock()
                .map_err(|e| DayShareError::Persistence(e.to_string()))?;
            if let Some(started) = *last
                && (now_utc - started).num_seconds() < self.config.basic.debounce_secs as i64
            {
                return Ok(RunOutcome::Skipped {
                    reason: format!("last run started {}s ago", (now_utc - started).num_seconds()),
                });
            }
        }

        // Single-flight: a run already holding the lock wins.
        let Ok(_guard) = self.run_lock.try_lock() else {
            return Err(DayShareError::RunInProgress);
        };

        // The daemon and the manual trigger command are separate
        // processes over the same database, so the mutex alone cannot
        // keep the rotation cursor from double-advancing.
        if !self.db.try_acquire_run_lock(now_utc, RUN_LOCK_STALE_SECS)? {
            return Err(DayShareError::RunInProgress);
        }

        {
            let mut last = self
                .last_run_started
                .lock()
                .map_err(|e| DayShareError::Persistence(e.to_string()))?;
            *last = Some(now_utc);
        }

        let result = self.execute_run(now, forced_type, forced_source).await;
        if let Err(e) = self.db.release_run_lock() {
            tracing::warn!("Could not release the run lock: {}", e);
        }
        result
    }

    async fn execute_run(
        &self,
        now: DateTime<Local>,
        forced_type: Option<ContentType>,
        forced_source: Option<String>,
    ) -> Result<RunOutcome> {
        let now_utc = now.with_timezone(&Utc);
        let period = self.period_table.classify(now.hour());

        // An override picks the type directly and leaves the rotation
        // cursor exactly where it was.
        let content_type = match forced_type {
            Some(t) => t,
            None => self.scheduler.advance(period, now_utc),
        };
        tracing::info!("📤 Sharing run: {} content in the {}", content_type, period);

        // A feed outage degrades to sharing without source data; only a
        // label that does not exist in the catalog is a hard error.
        let source_data = if content_type.needs_source() {
            let pinned = forced_source.as_deref().or(self.config.sources.fixed.as_deref());
            if let Some(label) = pinned
                && !self.config.sources.catalog.contains_key(label)
            {
                return Err(DayShareError::Source(format!("unknown source '{label}'")));
            }
            match self.resolve_source(period, pinned).await {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::warn!("Sources unavailable, sharing without feed data: {}", e);
                    None
                }
            }
        } else {
            None
        };

        if let Err(e) = self.ledger.purge_expired(now_utc) {
            tracing::warn!("Topic purge failed: {}", e);
        }

        let recipients = self.config.recipient_list();
        if recipients.is_empty() {
            return Ok(RunOutcome::Skipped { reason: "no recipients configured".into() });
        }

        let mut sent = 0;
        let mut failed = 0;
        let mut suppressed = 0;
        for (i, recipient) in recipients.iter().enumerate() {
            if i > 0 && self.shutdown_requested() {
                tracing::info!("Shutdown requested, stopping after {} of {} recipients", i, recipients.len());
                break;
            }
            if i > 0 && self.config.basic.inter_recipient_delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(
                    self.config.basic.inter_recipient_delay_secs,
                ))
                .await;
            }
            match self
                .share_with(recipient, content_type, period, source_data.clone(), now_utc)
                .await
            {
                Ok(true) => sent += 1,
                Ok(false) => suppressed += 1,
                Err(e) => {
                    tracing::warn!("Sharing with {} failed: {}", recipient.target, e);
                    self.history
                        .append(&recipient.target, content_type, &e.to_string(), false, now_utc);
                    failed += 1;
                }
            }
        }

        tracing::info!(
            "✅ Run complete: {} sent, {} failed, {} suppressed",
            sent,
            failed,
            suppressed
        );
        Ok(RunOutcome::Completed { content_type, sent, failed, suppressed })
    }

    /// One recipient. `Ok(true)` sent, `Ok(false)` suppressed.
    async fn share_with(
        &self,
        recipient: &Recipient,
        content_type: ContentType,
        period: Period,
        source_data: Option<SourceData>,
        now_utc: DateTime<Utc>,
    ) -> Result<bool> {
        let snapshot = if recipient.is_group
            && let Some(provider) = &self.collab.chat_history
        {
            match provider.recent_messages(&recipient.target).await {
                Ok(messages) => Some(activity::analyze(&messages, &self.config.activity, now_utc)),
                Err(e) => {
                    tracing::debug!("No activity data for {}: {}", recipient.target, e);
                    None
                }
            }
        } else {
            None
        };

        // Without a snapshot there is nothing to judge, so post.
        let policy = if recipient.is_group && snapshot.is_some() {
            self.config.activity.group_policy
        } else {
            SuppressPolicy::AlwaysPost
        };
        if let Some(snap) = &snapshot
            && activity::should_suppress(snap, policy)
        {
            tracing::info!("🤫 Holding back in {}: conversation is busy", recipient.target);
            return Ok(false);
        }

        let avoid_topics = if content_type.tracks_topics() {
            self.ledger
                .used_topics(&recipient.target, content_type, now_utc)
                .unwrap_or_else(|e| {
                    tracing::warn!("Topic lookup failed for {}: {}", recipient.target, e);
                    Vec::new()
                })
        } else {
            Vec::new()
        };

        let request = GenerationRequest {
            content_type,
            period,
            target: recipient.target.clone(),
            is_group: recipient.is_group,
            avoid_topics,
            activity: snapshot,
            source_data,
        };

        let deadline = Duration::from_secs(self.config.endpoints.timeout_secs);
        let retries = self.config.endpoints.max_retries;
        let generated =
            with_retry("generation", retries, deadline, || self.collab.generator.generate(&request))
                .await?;
        with_retry("delivery", retries, deadline, || {
            self.collab.deliverer.deliver(&recipient.target, &generated.message)
        })
        .await?;

        if content_type.tracks_topics()
            && let Some(key) = &generated.topic_key
            && let Err(e) = self.ledger.record(&recipient.target, content_type, key, now_utc)
        {
            tracing::warn!("Could not record topic for {}: {}", recipient.target, e);
        }
        self.history
            .append(&recipient.target, content_type, &generated.message, true, now_utc);
        Ok(true)
    }

    /// Picks and fetches a source feed. A pinned (fixed or forced) label
    /// is used as-is; otherwise a weighted pick gets one fallback retry
    /// that excludes the label that just failed.
    async fn resolve_source(&self, period: Period, pinned: Option<&str>) -> Result<SourceData> {
        if let Some(label) = pinned {
            return self.fetch_source(label).await;
        }

        let mut catalog: Vec<String> = self.config.sources.catalog.keys().cloned().collect();
        catalog.sort();
        let empty = std::collections::HashMap::new();
        let weights = self.config.sources.weights.get(&period).unwrap_or(&empty);

        let first = selector::select(&catalog, weights, &self.config.sources.allowed, None)?;
        match self.fetch_source(&first).await {
            Ok(data) => Ok(data),
            Err(e) => {
                tracing::warn!("Source '{}' failed ({}), trying an alternative", first, e);
                let second =
                    selector::select(&catalog, weights, &self.config.sources.allowed, Some(&first))?;
                if second == first {
                    return Err(e);
                }
                self.fetch_source(&second).await
            }
        }
    }

    async fn fetch_source(&self, label: &str) -> Result<SourceData> {
        let deadline = Duration::from_secs(self.config.endpoints.timeout_secs);
        with_retry(&format!("source '{label}'"), 0, deadline, || {
            self.collab.source_fetcher.fetch(label)
        })
        .await
    }
}

/// Background loop: waits for the next cron slot, applies random jitter,
/// and fires a run. Runs until the shutdown signal flips.
pub async fn run_loop(coordinator: Arc<RunCoordinator>, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("🚀 Sharing loop started (cron: {})", coordinator.config().basic.sharing_cron);
    loop {
        let now = Local::now();
        let Some(next) = cron::next_run_from_cron(&coordinator.config().basic.sharing_cron, now)
        else {
            tracing::error!("Cron expression yields no future slot, stopping loop");
            return;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        let jitter_max = coordinator.config().basic.jitter_max_minutes * 60;
        let jitter = if jitter_max > 0 {
            Duration::from_secs(rand::thread_rng().gen_range(0..=jitter_max))
        } else {
            Duration::ZERO
        };
        tracing::debug!("Next run at {} (+{}s jitter)", next.format("%H:%M"), jitter.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(wait + jitter) => {}
            _ = shutdown.changed() => {
                tracing::info!("Sharing loop shutting down");
                return;
            }
        }

        if !coordinator.is_enabled() {
            tracing::debug!("Auto sharing disabled, skipping slot");
            continue;
        }
        match coordinator.trigger(None, None).await {
            Ok(RunOutcome::Completed { sent, failed, suppressed, .. }) => {
                tracing::info!("Run done: {} sent / {} failed / {} suppressed", sent, failed, suppressed);
            }
            Ok(RunOutcome::Skipped { reason }) => tracing::info!("Run skipped: {}", reason),
            Err(e) => tracing::error!("Run failed: {}", e),
        }
    }
}
