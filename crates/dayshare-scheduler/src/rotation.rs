//! Per-period content rotation with a persisted cursor.
//!
//! Each period owns an ordered sequence of content types. Successive
//! automatic runs within one period walk the sequence and wrap around;
//! entering a different period resets the cursor to the front. Manual
//! overrides never touch the cursor.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dayshare_core::types::{ContentType, Period};

use crate::persistence::SharingDb;

/// When a period has no configured sequence.
const FALLBACK_SEQUENCE: [ContentType; 1] = [ContentType::Greeting];

/// The durable rotation position. `cursor` always points at the NEXT
/// entry to emit for `last_period`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleState {
    pub cursor: usize,
    pub last_period: Option<Period>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub last_type: Option<ContentType>,
}

pub struct SequenceScheduler {
    sequences: HashMap<Period, Vec<ContentType>>,
    db: Arc<SharingDb>,
}

impl SequenceScheduler {
    pub fn new(sequences: HashMap<Period, Vec<ContentType>>, db: Arc<SharingDb>) -> Self {
        Self { sequences, db }
    }

    /// The sequence configured for `period`, or the greeting fallback.
    pub fn sequence_for(&self, period: Period) -> &[ContentType] {
        self.sequences
            .get(&period)
            .map(|s| s.as_slice())
            .filter(|s| !s.is_empty())
            .unwrap_or(&FALLBACK_SEQUENCE)
    }

    /// Pure rotation step: which type to emit now, and the state to
    /// persist afterwards. A period change resets the cursor; a stale
    /// out-of-range cursor is clamped to the front.
    pub fn next_in(&self, period: Period, state: &ScheduleState, now: DateTime<Utc>) -> (ContentType, ScheduleState) {
        let sequence = self.sequence_for(period);
        let mut cursor = if state.last_period == Some(period) {
            state.cursor
        } else {
            0
        };
        if cursor >= sequence.len() {
            cursor = 0;
        }
        let chosen = sequence[cursor];
        let next = ScheduleState {
            cursor: (cursor + 1) % sequence.len(),
            last_period: Some(period),
            last_timestamp: Some(now),
            last_type: Some(chosen),
        };
        (chosen, next)
    }

    /// Loads the persisted state, steps the rotation, and writes the new
    /// state back. A persistence failure is logged and the decision
    /// stands; the worst case is a repeated type on the next run.
    pub fn advance(&self, period: Period, now: DateTime<Utc>) -> ContentType {
        let state = self.db.load_schedule_state().unwrap_or_else(|e| {
            tracing::warn!("Could not load rotation state, starting fresh: {}", e);
            ScheduleState::default()
        });
        let (chosen, next) = self.next_in(period, &state, now);
        if let Err(e) = self.db.save_schedule_state(&next) {
            tracing::warn!("Could not persist rotation state: {}", e);
        }
        tracing::debug!(
            "Rotation: {} in {} (cursor {} -> {})",
            chosen,
            period,
            state.cursor,
            next.cursor
        );
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dayshare_core::config::default_sequences;

    fn scratch(name: &str) -> (SequenceScheduler, std::path::PathBuf, Arc<SharingDb>) {
        let dir = std::env::temp_dir().join(format!("dayshare-rot-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(SharingDb::open(&dir.join("sharing.db")).unwrap());
        (SequenceScheduler::new(default_sequences(), db.clone()), dir, db)
    }

    #[test]
    fn test_rotation_wraps_and_persists() {
        let (scheduler, dir, db) = scratch("wrap");
        let now = Utc::now();
        // Evening sequence is [recommendation, news].
        assert_eq!(scheduler.advance(Period::Evening, now), ContentType::Recommendation);
        assert_eq!(db.load_schedule_state().unwrap().cursor, 1);
        assert_eq!(scheduler.advance(Period::Evening, now), ContentType::News);
        assert_eq!(scheduler.advance(Period::Evening, now), ContentType::Recommendation);
        assert_eq!(db.load_schedule_state().unwrap().cursor, 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_three_entry_sequence_cycles() {
        let dir = std::env::temp_dir().join(format!("dayshare-rot-three-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let db = Arc::new(SharingDb::open(&dir.join("sharing.db")).unwrap());
        let sequences = HashMap::from([(
            Period::Afternoon,
            vec![ContentType::News, ContentType::Knowledge, ContentType::Mood],
        )]);
        let scheduler = SequenceScheduler::new(sequences, db.clone());
        let now = Utc::now();

        assert_eq!(scheduler.advance(Period::Afternoon, now), ContentType::News);
        assert_eq!(db.load_schedule_state().unwrap().cursor, 1);
        assert_eq!(scheduler.advance(Period::Afternoon, now), ContentType::Knowledge);
        assert_eq!(scheduler.advance(Period::Afternoon, now), ContentType::Mood);
        assert_eq!(scheduler.advance(Period::Afternoon, now), ContentType::News);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_period_change_resets_cursor() {
        let (scheduler, dir, _db) = scratch("reset");
        let now = Utc::now();
        assert_eq!(scheduler.advance(Period::Forenoon, now), ContentType::News);
        assert_eq!(scheduler.advance(Period::Forenoon, now), ContentType::Knowledge);
        // Switching periods starts that period's sequence from the front.
        assert_eq!(scheduler.advance(Period::Night, now), ContentType::Mood);
        assert_eq!(scheduler.advance(Period::Night, now), ContentType::Greeting);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_single_entry_sequence_repeats() {
        let (scheduler, dir, db) = scratch("single");
        let now = Utc::now();
        // Morning is just [greeting]; two runs in the same period repeat it.
        assert_eq!(scheduler.advance(Period::Morning, now), ContentType::Greeting);
        assert_eq!(scheduler.advance(Period::Morning, now), ContentType::Greeting);
        assert_eq!(db.load_schedule_state().unwrap().cursor, 0);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_unknown_period_uses_fallback() {
        let (_, dir, db) = scratch("fallback");
        let scheduler = SequenceScheduler::new(HashMap::new(), db);
        let now = Utc::now();
        assert_eq!(scheduler.advance(Period::Afternoon, now), ContentType::Greeting);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_stale_cursor_is_clamped() {
        let (scheduler, dir, _db) = scratch("clamp");
        let state = ScheduleState {
            cursor: 9,
            last_period: Some(Period::Evening),
            last_timestamp: None,
            last_type: None,
        };
        let (chosen, next) = scheduler.next_in(Period::Evening, &state, Utc::now());
        assert_eq!(chosen, ContentType::Recommendation);
        assert_eq!(next.cursor, 1);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_restart_resumes_mid_sequence() {
        let dir = std::env::temp_dir().join(format!("dayshare-rot-restart-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let path = dir.join("sharing.db");
        let now = Utc::now();
        {
            let db = Arc::new(SharingDb::open(&path).unwrap());
            let scheduler = SequenceScheduler::new(default_sequences(), db);
            assert_eq!(scheduler.advance(Period::Evening, now), ContentType::Recommendation);
        }
        // New process, same database file.
        let db = Arc::new(SharingDb::open(&path).unwrap());
        let scheduler = SequenceScheduler::new(default_sequences(), db);
        assert_eq!(scheduler.advance(Period::Evening, now), ContentType::News);
        let _ = std::fs::remove_dir_all(dir);
    }
}
