//! Time-windowed topic deduplication.
//!
//! Every topic-tracking share records a short topic key per
//! (target, category). Keys inside the dedup window are handed to the
//! generation collaborator as an avoid-list; keys past the retention
//! horizon are purged outright.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dayshare_core::error::Result;
use dayshare_core::types::ContentType;

use crate::persistence::SharingDb;

/// Topic keys are trimmed to this many characters.
const KEY_MAX_CHARS: usize = 24;

pub struct TopicLedger {
    db: Arc<SharingDb>,
    window_days: i64,
    retention_days: i64,
}

impl TopicLedger {
    pub fn new(db: Arc<SharingDb>, window_days: i64, retention_days: i64) -> Self {
        Self { db, window_days, retention_days }
    }

    /// Records a used topic. The key is normalized to its first line,
    /// trimmed, and capped in length; an empty key records nothing.
    pub fn record(
        &self,
        target: &str,
        category: ContentType,
        raw_key: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let key = normalize_key(raw_key);
        if key.is_empty() {
            return Ok(());
        }
        self.db.insert_topic(target, category, &key, now)
    }

    /// Keys used for (target, category) within the dedup window.
    pub fn used_topics(
        &self,
        target: &str,
        category: ContentType,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let since = now - Duration::days(self.window_days);
        self.db.topics_since(target, category, since)
    }

    /// Drops records older than the retention horizon.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - Duration::days(self.retention_days);
        let purged = self.db.purge_topics_before(cutoff)?;
        if purged > 0 {
            tracing::debug!("Purged {} expired topic records", purged);
        }
        Ok(purged)
    }
}

fn normalize_key(raw: &str) -> String {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    line.chars().take(KEY_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> (TopicLedger, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("dayshare-ledger-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(SharingDb::open(&dir.join("sharing.db")).unwrap());
        (TopicLedger::new(db, 30, 90), dir)
    }

    #[test]
    fn test_keys_are_normalized() {
        assert_eq!(normalize_key("  Rust ownership \nsecond line"), "Rust ownership");
        // A blank first line must not blank the whole key.
        assert_eq!(normalize_key("   \n stuff"), "stuff");
        assert_eq!(normalize_key(""), "");
        assert_eq!(normalize_key(" \n \t\n"), "");
        let long = "x".repeat(50);
        assert_eq!(normalize_key(&long).chars().count(), 24);
    }

    #[test]
    fn test_window_excludes_old_topics() {
        let (ledger, dir) = scratch("window");
        let now = Utc::now();
        ledger.record("g", ContentType::Knowledge, "fresh", now).unwrap();
        ledger
            .record("g", ContentType::Knowledge, "faded", now - Duration::days(45))
            .unwrap();
        let used = ledger.used_topics("g", ContentType::Knowledge, now).unwrap();
        assert_eq!(used, vec!["fresh".to_string()]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_categories_do_not_bleed() {
        let (ledger, dir) = scratch("bleed");
        let now = Utc::now();
        ledger.record("g", ContentType::Knowledge, "topic-a", now).unwrap();
        let recs = ledger.used_topics("g", ContentType::Recommendation, now).unwrap();
        assert!(recs.is_empty());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_empty_key_records_nothing() {
        let (ledger, dir) = scratch("empty");
        let now = Utc::now();
        ledger.record("g", ContentType::Knowledge, "   \n stuff", now).unwrap();
        ledger.record("g", ContentType::Knowledge, "", now).unwrap();
        let used = ledger.used_topics("g", ContentType::Knowledge, now).unwrap();
        assert_eq!(used, vec!["stuff".to_string()]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_purge_honors_retention_not_window() {
        let (ledger, dir) = scratch("purge");
        let now = Utc::now();
        // Outside the 30-day window but inside the 90-day retention.
        ledger
            .record("g", ContentType::Knowledge, "midlife", now - Duration::days(60))
            .unwrap();
        ledger
            .record("g", ContentType::Knowledge, "ancient", now - Duration::days(120))
            .unwrap();
        assert_eq!(ledger.purge_expired(now).unwrap(), 1);
        assert_eq!(ledger.purge_expired(now).unwrap(), 0);
        let _ = std::fs::remove_dir_all(dir);
    }
}
