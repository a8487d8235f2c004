//! SQLite-backed durable state: rotation cursor, topic records, sent history.
//!
//! One database file holds everything, so a restart resumes the rotation
//! exactly where it stopped. All timestamps are stored as RFC3339 text.

use chrono::{DateTime, Utc};
use dayshare_core::error::{DayShareError, Result};
use dayshare_core::types::{ContentType, Period};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use crate::history::SentHistoryEntry;
use crate::rotation::ScheduleState;

pub struct SharingDb {
    conn: Mutex<Connection>,
}

impl SharingDb {
    /// Opens the default database under the dayshare home directory.
    pub fn open_default() -> Result<Self> {
        let path = dayshare_core::config::DayShareConfig::home_dir().join("sharing.db");
        Self::open(&path)
    }

    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| DayShareError::Persistence(e.to_string()))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schedule_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                cursor INTEGER NOT NULL DEFAULT 0,
                last_period TEXT,
                last_timestamp TEXT,
                last_type TEXT
            );
            CREATE TABLE IF NOT EXISTS topic_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                target TEXT NOT NULL,
                category TEXT NOT NULL,
                topic_key TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_topics_lookup
                ON topic_records (target, category, created_at);
            CREATE TABLE IF NOT EXISTS sent_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                target TEXT NOT NULL,
                content_type TEXT NOT NULL,
                preview TEXT NOT NULL,
                success INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS run_lock (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                acquired_at TEXT NOT NULL
            );",
        )
        .map_err(|e| DayShareError::Persistence(e.to_string()))?;

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DayShareError::Persistence(e.to_string()))
    }

    // ── schedule state ──────────────────────────────────────────────

    pub fn save_schedule_state(&self, state: &ScheduleState) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO schedule_state (id, cursor, last_period, last_timestamp, last_type)
             VALUES (1, ?1, ?2, ?3, ?4)",
            rusqlite::params![
                state.cursor as i64,
                state.last_period.map(|p| p.to_string()),
                state.last_timestamp.map(|t| t.to_rfc3339()),
                state.last_type.map(|t| t.to_string()),
            ],
        )
        .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Loads the single rotation row, or the zero state when none exists.
    pub fn load_schedule_state(&self) -> Result<ScheduleState> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT cursor, last_period, last_timestamp, last_type FROM schedule_state WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                    ))
                },
            )
            .ok();

        let Some((cursor, period, timestamp, content_type)) = row else {
            return Ok(ScheduleState::default());
        };

        Ok(ScheduleState {
            cursor: cursor.max(0) as usize,
            last_period: period.as_deref().and_then(|s| s.parse::<Period>().ok()),
            last_timestamp: timestamp
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc)),
            last_type: content_type
                .as_deref()
                .and_then(|s| s.parse::<ContentType>().ok()),
        })
    }

    pub fn reset_schedule_state(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM schedule_state", [])
            .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        Ok(())
    }

    // ── topic records ───────────────────────────────────────────────

    pub fn insert_topic(
        &self,
        target: &str,
        category: ContentType,
        topic_key: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO topic_records (target, category, topic_key, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![target, category.to_string(), topic_key, created_at.to_rfc3339()],
        )
        .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Topic keys recorded for (target, category) at or after `since`,
    /// newest first.
    pub fn topics_since(
        &self,
        target: &str,
        category: ContentType,
        since: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT topic_key FROM topic_records
                 WHERE target = ?1 AND category = ?2 AND created_at >= ?3
                 ORDER BY created_at DESC",
            )
            .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::params![target, category.to_string(), since.to_rfc3339()],
                |row| row.get::<_, String>(0),
            )
            .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Drops topic records older than `cutoff`. Returns how many went away.
    pub fn purge_topics_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock()?;
        let n = conn
            .execute(
                "DELETE FROM topic_records WHERE created_at < ?1",
                rusqlite::params![cutoff.to_rfc3339()],
            )
            .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        Ok(n)
    }

    // ── run lock ────────────────────────────────────────────────────

    /// Claims the cross-process run lock. The daemon and the manual
    /// trigger command share one database, so the in-process mutex is
    /// not enough to keep runs single-flight. A claim older than
    /// `stale_secs` is treated as left over from a crash and stolen.
    pub fn try_acquire_run_lock(&self, now: DateTime<Utc>, stale_secs: i64) -> Result<bool> {
        let conn = self.lock()?;
        let cutoff = (now - chrono::Duration::seconds(stale_secs)).to_rfc3339();
        conn.execute(
            "DELETE FROM run_lock WHERE acquired_at < ?1",
            rusqlite::params![cutoff],
        )
        .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        let claimed = conn
            .execute(
                "INSERT OR IGNORE INTO run_lock (id, acquired_at) VALUES (1, ?1)",
                rusqlite::params![now.to_rfc3339()],
            )
            .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        Ok(claimed == 1)
    }

    pub fn release_run_lock(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM run_lock", [])
            .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        Ok(())
    }

    // ── sent history ────────────────────────────────────────────────

    /// Appends one history entry, then evicts the oldest rows past `cap`.
    pub fn append_history(&self, entry: &SentHistoryEntry, cap: usize) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sent_history (timestamp, target, content_type, preview, success)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                entry.timestamp.to_rfc3339(),
                entry.target,
                entry.content_type.to_string(),
                entry.preview,
                entry.success as i64,
            ],
        )
        .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        conn.execute(
            "DELETE FROM sent_history WHERE id NOT IN (
                SELECT id FROM sent_history ORDER BY id DESC LIMIT ?1
            )",
            rusqlite::params![cap as i64],
        )
        .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        Ok(())
    }

    /// Most recent history entries, newest first.
    pub fn recent_history(&self, limit: usize) -> Result<Vec<SentHistoryEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, target, content_type, preview, success
                 FROM sent_history ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| DayShareError::Persistence(e.to_string()))?;
        let rows = stmt
            .query_map(rusqlite::params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(|e| DayShareError::Persistence(e.to_string()))?;

        let mut out = Vec::new();
        for row in rows.filter_map(|r| r.ok()) {
            let (timestamp, target, content_type, preview, success) = row;
            let Ok(parsed) = DateTime::parse_from_rfc3339(&timestamp) else {
                continue;
            };
            let Ok(content_type) = content_type.parse::<ContentType>() else {
                continue;
            };
            out.push(SentHistoryEntry {
                timestamp: parsed.with_timezone(&Utc),
                target,
                content_type,
                preview,
                success: success != 0,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_db(name: &str) -> (SharingDb, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("dayshare-db-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("sharing.db");
        (SharingDb::open(&path).unwrap(), dir)
    }

    #[test]
    fn test_schedule_state_round_trip() {
        let (db, dir) = scratch_db("state");
        assert_eq!(db.load_schedule_state().unwrap(), ScheduleState::default());

        let state = ScheduleState {
            cursor: 2,
            last_period: Some(Period::Evening),
            last_timestamp: Some(Utc::now()),
            last_type: Some(ContentType::News),
        };
        db.save_schedule_state(&state).unwrap();
        let loaded = db.load_schedule_state().unwrap();
        assert_eq!(loaded.cursor, 2);
        assert_eq!(loaded.last_period, Some(Period::Evening));
        assert_eq!(loaded.last_type, Some(ContentType::News));

        db.reset_schedule_state().unwrap();
        assert_eq!(db.load_schedule_state().unwrap(), ScheduleState::default());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_topics_filter_by_target_category_and_time() {
        let (db, dir) = scratch_db("topics");
        let now = Utc::now();
        let old = now - chrono::Duration::days(40);
        db.insert_topic("g1", ContentType::Knowledge, "rust", now).unwrap();
        db.insert_topic("g1", ContentType::Knowledge, "stale", old).unwrap();
        db.insert_topic("g1", ContentType::Recommendation, "movie", now).unwrap();
        db.insert_topic("g2", ContentType::Knowledge, "other", now).unwrap();

        let since = now - chrono::Duration::days(30);
        let got = db.topics_since("g1", ContentType::Knowledge, since).unwrap();
        assert_eq!(got, vec!["rust".to_string()]);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_purge_is_idempotent() {
        let (db, dir) = scratch_db("purge");
        let now = Utc::now();
        db.insert_topic("g", ContentType::Knowledge, "a", now - chrono::Duration::days(100))
            .unwrap();
        db.insert_topic("g", ContentType::Knowledge, "b", now).unwrap();

        let cutoff = now - chrono::Duration::days(90);
        assert_eq!(db.purge_topics_before(cutoff).unwrap(), 1);
        assert_eq!(db.purge_topics_before(cutoff).unwrap(), 0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_run_lock_is_exclusive_across_handles() {
        let dir = std::env::temp_dir().join(format!("dayshare-db-lock-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("sharing.db");
        let first = SharingDb::open(&path).unwrap();
        let second = SharingDb::open(&path).unwrap();
        let now = Utc::now();

        assert!(first.try_acquire_run_lock(now, 600).unwrap());
        assert!(!second.try_acquire_run_lock(now, 600).unwrap());

        first.release_run_lock().unwrap();
        assert!(second.try_acquire_run_lock(now, 600).unwrap());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_stale_run_lock_is_stolen() {
        let (db, dir) = scratch_db("stale-lock");
        let crash_time = Utc::now() - chrono::Duration::seconds(700);
        assert!(db.try_acquire_run_lock(crash_time, 600).unwrap());
        // A claim past the staleness horizon no longer blocks new runs.
        assert!(db.try_acquire_run_lock(Utc::now(), 600).unwrap());
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_history_cap_evicts_oldest() {
        let (db, dir) = scratch_db("history");
        for i in 0..6 {
            let entry = SentHistoryEntry {
                timestamp: Utc::now(),
                target: format!("t{i}"),
                content_type: ContentType::Greeting,
                preview: format!("msg {i}"),
                success: i % 2 == 0,
            };
            db.append_history(&entry, 4).unwrap();
        }
        let recent = db.recent_history(10).unwrap();
        assert_eq!(recent.len(), 4);
        assert_eq!(recent[0].target, "t5");
        assert_eq!(recent[3].target, "t2");
        assert!(!recent[0].success);
        let _ = std::fs::remove_dir_all(dir);
    }
}
