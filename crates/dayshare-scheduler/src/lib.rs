//! # Dayshare Scheduler
//!
//! The decision core behind the proactive sharing agent. On each trigger it
//! answers four questions, deterministically and restart-safely:
//!
//! - what period of the day is it? ([`period`])
//! - what content type is next in this period's rotation? ([`rotation`])
//! - which weighted external source should supply data, if any? ([`selector`])
//! - should posting into this group be held back right now? ([`activity`])
//!
//! Chosen topics are written to a time-windowed dedup ledger ([`ledger`])
//! and every outcome lands in a capped history log ([`history`]). All
//! durable state lives in one SQLite file ([`persistence`]), so a crash
//! loses at most the in-flight decision.
//!
//! ```text
//! cron tick ─► RunCoordinator
//!                ├── jitter / debounce / single-flight
//!                ├── PeriodTable::classify(hour)
//!                ├── SequenceScheduler::advance(period)   ── persists cursor
//!                ├── selector::select(weights, exclude)   ── for news
//!                └── per recipient (sequential):
//!                      activity gate ─► generate ─► deliver ─► record
//! ```

pub mod activity;
pub mod coordinator;
pub mod cron;
pub mod history;
pub mod ledger;
pub mod period;
pub mod persistence;
pub mod retry;
pub mod rotation;
pub mod selector;

pub use coordinator::{Collaborators, RunCoordinator, RunOutcome, run_loop};
pub use history::{SentHistory, SentHistoryEntry};
pub use ledger::TopicLedger;
pub use period::PeriodTable;
pub use persistence::SharingDb;
pub use rotation::{ScheduleState, SequenceScheduler};
