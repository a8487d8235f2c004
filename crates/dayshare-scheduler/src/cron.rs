//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Field syntax: *, */N, N, N-M, comma lists
//! Example: "0 8,20 * * *" = every day at 8:00 and 20:00

use chrono::{DateTime, Duration, Local, Timelike};

/// Parse a cron expression and compute the next run time in local time.
pub fn next_run_from_cron(expression: &str, after: DateTime<Local>) -> Option<DateTime<Local>> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != 5 {
        tracing::warn!(
            "Invalid cron expression: '{}' (need 5 fields: MIN HOUR DOM MON DOW)",
            expression
        );
        return None;
    }

    let minutes = parse_field(parts[0], 0, 59)?;
    let hours = parse_field(parts[1], 0, 23)?;
    // Day-of-month, month and day-of-week are accepted but only `*` is
    // honored; daily sharing never needs calendar-level granularity.

    let mut candidate = after + Duration::minutes(1);
    candidate = candidate.with_second(0).unwrap_or(candidate);

    // Try up to 48 hours ahead
    for _ in 0..(48 * 60) {
        if minutes.contains(&candidate.minute()) && hours.contains(&candidate.hour()) {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }

    None
}

/// Validate an expression without computing anything, for startup checks.
pub fn validate(expression: &str) -> bool {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    parts.len() == 5
        && parse_field(parts[0], 0, 59).is_some()
        && parse_field(parts[1], 0, 23).is_some()
}

/// Parse a cron field into a list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }

    // */N means every N
    if let Some(step) = field.strip_prefix("*/") {
        let n: u32 = step.parse().ok()?;
        if n == 0 {
            return None;
        }
        return Some((min..=max).step_by(n as usize).collect());
    }

    // Comma-separated: "0,15,30,45" (entries may themselves be ranges)
    if field.contains(',') {
        let mut out = Vec::new();
        for part in field.split(',') {
            out.extend(parse_field(part.trim(), min, max)?);
        }
        out.sort_unstable();
        out.dedup();
        return Some(out);
    }

    // Range: "8-11"
    if let Some((lo, hi)) = field.split_once('-') {
        let lo: u32 = lo.parse().ok()?;
        let hi: u32 = hi.parse().ok()?;
        if lo > hi || lo < min || hi > max {
            return None;
        }
        return Some((lo..=hi).collect());
    }

    // Single number
    let n: u32 = field.parse().ok()?;
    if n >= min && n <= max {
        Some(vec![n])
    } else {
        None
    }
}
