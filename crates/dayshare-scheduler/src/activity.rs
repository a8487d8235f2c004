//! Group activity heuristic.
//!
//! Looks at the most recent messages of a group and decides how lively
//! the conversation is, then applies the configured suppression policy.
//! Inputs are message metadata only; the scheduler never reads content.

use chrono::{DateTime, Utc};
use dayshare_core::config::ActivityConfig;
use dayshare_core::types::{
    ActivitySnapshot, ChatMessage, Intensity, MessageRole, SuppressPolicy,
};

/// A conversation counts as ongoing if the newest message is this fresh.
const DISCUSSING_WITHIN_SECS: i64 = 600;

/// How many top participants to report in a snapshot.
const TOP_PARTICIPANTS: usize = 3;

/// Builds an [`ActivitySnapshot`] from recent messages.
///
/// Messages older than the configured window are ignored. Intensity is
/// relative to `check_count`: more than `high_ratio * check_count`
/// messages is high, more than `medium_ratio * check_count` medium,
/// anything else low. Only user-authored messages count toward the
/// participant ranking.
pub fn analyze(messages: &[ChatMessage], config: &ActivityConfig, now: DateTime<Utc>) -> ActivitySnapshot {
    let cutoff = now - chrono::Duration::seconds(config.window_secs);
    let recent: Vec<&ChatMessage> = messages
        .iter()
        .filter(|m| m.timestamp >= cutoff && m.timestamp <= now)
        .collect();

    let count = recent.len();
    let high = (config.high_ratio * config.check_count as f64).floor() as usize;
    let medium = (config.medium_ratio * config.check_count as f64).floor() as usize;
    let intensity = if count > high {
        Intensity::High
    } else if count > medium {
        Intensity::Medium
    } else {
        Intensity::Low
    };

    let is_actively_discussing = recent
        .iter()
        .map(|m| m.timestamp)
        .max()
        .is_some_and(|newest| (now - newest).num_seconds() < DISCUSSING_WITHIN_SECS);

    // Rank user participants by message count; ties keep first-seen order.
    let mut order: Vec<&str> = Vec::new();
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for m in &recent {
        if m.role == MessageRole::User {
            let n = counts.entry(m.participant_id.as_str()).or_insert(0);
            if *n == 0 {
                order.push(m.participant_id.as_str());
            }
            *n += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = order
        .iter()
        .map(|id| (*id, counts[id]))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let active_participants = ranked
        .into_iter()
        .take(TOP_PARTICIPANTS)
        .map(|(id, _)| id.to_string())
        .collect();

    ActivitySnapshot {
        message_count: count,
        intensity,
        active_participants,
        is_actively_discussing,
    }
}

/// Applies a suppression policy to a snapshot. `true` means hold the post.
pub fn should_suppress(snapshot: &ActivitySnapshot, policy: SuppressPolicy) -> bool {
    match policy {
        SuppressPolicy::Cautious => {
            snapshot.is_actively_discussing && snapshot.intensity == Intensity::High
        }
        SuppressPolicy::Minimal => {
            snapshot.is_actively_discussing || snapshot.intensity != Intensity::Low
        }
        SuppressPolicy::AlwaysPost => false,
    }
}
