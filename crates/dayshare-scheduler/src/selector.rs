//! Weighted source selection with graceful fallback.
//!
//! Each period carries a weight table over source labels. Selection
//! prefers the weighted intersection of that table with the configured
//! allow-list, falls back to a uniform draw over the allow-list, and
//! finally to a uniform draw over the whole catalog. Only an empty
//! catalog is an error.

use std::collections::HashMap;

use dayshare_core::error::{DayShareError, Result};
use rand::distributions::WeightedIndex;
use rand::prelude::*;

/// Weights at or below zero would break the distribution; clamp them up
/// so a configured-but-downweighted source stays reachable.
const WEIGHT_FLOOR: f64 = 0.1;

/// Picks one source label using the thread-local RNG.
///
/// `catalog` is every known label, `weights` the period's preference
/// table, `allowed` an optional restriction (empty = no restriction),
/// and `exclude` a label that just failed and should be avoided when
/// any alternative exists.
pub fn select(
    catalog: &[String],
    weights: &HashMap<String, f64>,
    allowed: &[String],
    exclude: Option<&str>,
) -> Result<String> {
    select_with(&mut rand::thread_rng(), catalog, weights, allowed, exclude)
}

/// Same as [`select`] but with an injected RNG, for deterministic tests.
pub fn select_with<R: Rng>(
    rng: &mut R,
    catalog: &[String],
    weights: &HashMap<String, f64>,
    allowed: &[String],
    exclude: Option<&str>,
) -> Result<String> {
    if catalog.is_empty() {
        return Err(DayShareError::Config("source catalog is empty".into()));
    }

    let pool: Vec<&String> = if allowed.is_empty() {
        catalog.iter().collect()
    } else {
        catalog.iter().filter(|s| allowed.contains(s)).collect()
    };

    // Tier 1: weighted draw over pool entries the table knows about.
    let mut candidates: Vec<(&String, f64)> = pool
        .iter()
        .filter_map(|s| weights.get(*s).map(|w| (*s, w.max(WEIGHT_FLOOR))))
        .collect();

    // Tier 2: the table covers none of the pool, fall back to uniform.
    if candidates.is_empty() {
        candidates = pool.iter().map(|s| (*s, 1.0)).collect();
    }

    // Tier 3: the allow-list matched nothing, draw from the full catalog.
    if candidates.is_empty() {
        candidates = catalog.iter().map(|s| (s, 1.0)).collect();
    }

    // Excluding the last candidate would leave nothing to pick.
    if candidates.len() > 1
        && let Some(bad) = exclude
    {
        candidates.retain(|(s, _)| s.as_str() != bad);
    }

    let dist = WeightedIndex::new(candidates.iter().map(|(_, w)| *w))
        .map_err(|e| DayShareError::Config(format!("bad source weights: {e}")))?;
    Ok(candidates[dist.sample(rng)].0.clone())
}
