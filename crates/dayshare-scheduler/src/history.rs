//! Capped log of sharing outcomes, successes and failures alike.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dayshare_core::error::Result;
use dayshare_core::types::ContentType;

use crate::persistence::SharingDb;

/// Message previews stored in history are capped at this many characters.
const PREVIEW_MAX_CHARS: usize = 80;

#[derive(Debug, Clone)]
pub struct SentHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub target: String,
    pub content_type: ContentType,
    pub preview: String,
    pub success: bool,
}

pub struct SentHistory {
    db: Arc<SharingDb>,
    limit: usize,
}

impl SentHistory {
    pub fn new(db: Arc<SharingDb>, limit: usize) -> Self {
        Self { db, limit }
    }

    /// Builds and appends an entry. History is advisory; a write failure
    /// is logged and never fails the run that produced it.
    pub fn append(
        &self,
        target: &str,
        content_type: ContentType,
        message: &str,
        success: bool,
        now: DateTime<Utc>,
    ) {
        let entry = SentHistoryEntry {
            timestamp: now,
            target: target.to_string(),
            content_type,
            preview: message.chars().take(PREVIEW_MAX_CHARS).collect(),
            success,
        };
        if let Err(e) = self.db.append_history(&entry, self.limit) {
            tracing::warn!("Could not record sharing history: {}", e);
        }
    }

    pub fn recent(&self, limit: usize) -> Result<Vec<SentHistoryEntry>> {
        self.db.recent_history(limit.min(self.limit))
    }
}
