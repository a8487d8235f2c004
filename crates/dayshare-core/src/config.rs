//! Dayshare configuration system.
//!
//! Loaded from `~/.dayshare/config.toml`; every field has a serde default
//! so an empty file is a valid configuration. The defaults reproduce the
//! stock period partition, rotation sequences, and per-period source
//! weight tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{DayShareError, Result};
use crate::types::{ContentType, Period, Recipient, SuppressPolicy};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayShareConfig {
    #[serde(default = "bool_true")]
    pub enable_auto_sharing: bool,
    #[serde(default)]
    pub basic: BasicConfig,
    #[serde(default = "default_periods")]
    pub periods: Vec<PeriodBoundary>,
    #[serde(default = "default_sequences")]
    pub sequences: HashMap<Period, Vec<ContentType>>,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
    #[serde(default)]
    pub activity: ActivityConfig,
    #[serde(default)]
    pub recipients: RecipientsConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

fn bool_true() -> bool {
    true
}

impl Default for DayShareConfig {
    fn default() -> Self {
        Self {
            enable_auto_sharing: true,
            basic: BasicConfig::default(),
            periods: default_periods(),
            sequences: default_sequences(),
            sources: SourcesConfig::default(),
            topics: TopicsConfig::default(),
            activity: ActivityConfig::default(),
            recipients: RecipientsConfig::default(),
            endpoints: EndpointsConfig::default(),
        }
    }
}

impl DayShareConfig {
    /// Load config from the default path (~/.dayshare/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DayShareError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| DayShareError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DayShareError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the dayshare home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dayshare")
    }

    /// Cross-check the source tables. Period-boundary coverage is checked
    /// separately by the period table constructor.
    pub fn validate(&self) -> Result<()> {
        if self.sources.catalog.is_empty() {
            return Err(DayShareError::Config("sources.catalog is empty".into()));
        }
        for label in &self.sources.allowed {
            if !self.sources.catalog.contains_key(label) {
                return Err(DayShareError::Config(format!(
                    "sources.allowed references unknown source '{label}'"
                )));
            }
        }
        if let Some(fixed) = &self.sources.fixed
            && !self.sources.catalog.contains_key(fixed)
        {
            return Err(DayShareError::Config(format!(
                "sources.fixed references unknown source '{fixed}'"
            )));
        }
        for (period, table) in &self.sources.weights {
            for label in table.keys() {
                if !self.sources.catalog.contains_key(label) {
                    return Err(DayShareError::Config(format!(
                        "sources.weights.{period} references unknown source '{label}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Flatten the recipient config into the ordered list a run fans over.
    pub fn recipient_list(&self) -> Vec<Recipient> {
        let mut out = Vec::new();
        for target in &self.recipients.groups {
            if !target.is_empty() {
                out.push(Recipient { target: target.clone(), is_group: true });
            }
        }
        for target in &self.recipients.users {
            if !target.is_empty() {
                out.push(Recipient { target: target.clone(), is_group: false });
            }
        }
        out
    }
}

/// One entry of the day partition: `label` applies from `start_hour`
/// (inclusive) until the next boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodBoundary {
    pub start_hour: u32,
    pub label: Period,
}

pub fn default_periods() -> Vec<PeriodBoundary> {
    [
        (0, Period::Dawn),
        (6, Period::Morning),
        (9, Period::Forenoon),
        (12, Period::Afternoon),
        (16, Period::Evening),
        (19, Period::Night),
    ]
    .into_iter()
    .map(|(start_hour, label)| PeriodBoundary { start_hour, label })
    .collect()
}

pub fn default_sequences() -> HashMap<Period, Vec<ContentType>> {
    HashMap::from([
        (Period::Morning, vec![ContentType::Greeting]),
        (Period::Forenoon, vec![ContentType::News, ContentType::Knowledge]),
        (Period::Afternoon, vec![ContentType::News, ContentType::Knowledge]),
        (Period::Evening, vec![ContentType::Recommendation, ContentType::News]),
        (Period::Night, vec![ContentType::Mood, ContentType::Greeting]),
        (Period::Dawn, vec![ContentType::Mood]),
    ])
}

/// Scheduling basics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicConfig {
    /// 5-field cron expression for the automatic trigger.
    #[serde(default = "default_cron")]
    pub sharing_cron: String,
    /// Uniform random delay applied before each triggered run. 0 disables.
    #[serde(default)]
    pub jitter_max_minutes: u64,
    /// Triggers arriving within this many seconds of the last run start
    /// are treated as duplicates and skipped.
    #[serde(default = "default_debounce")]
    pub debounce_secs: u64,
    /// Polite pause between recipients within one run.
    #[serde(default = "default_recipient_delay")]
    pub inter_recipient_delay_secs: u64,
    /// Sent-history cap; oldest entries evicted beyond this.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_cron() -> String {
    "0 8,20 * * *".into()
}
fn default_debounce() -> u64 {
    60
}
fn default_recipient_delay() -> u64 {
    2
}
fn default_history_limit() -> usize {
    50
}

impl Default for BasicConfig {
    fn default() -> Self {
        Self {
            sharing_cron: default_cron(),
            jitter_max_minutes: 0,
            debounce_secs: default_debounce(),
            inter_recipient_delay_secs: default_recipient_delay(),
            history_limit: default_history_limit(),
        }
    }
}

/// External source catalog and per-period preference weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_source_catalog")]
    pub catalog: HashMap<String, SourceEndpoint>,
    #[serde(default = "default_source_weights")]
    pub weights: HashMap<Period, HashMap<String, f64>>,
    /// Allow-list restricting weighted choice; empty means "all of catalog".
    #[serde(default)]
    pub allowed: Vec<String>,
    /// When set, skips weighted choice entirely.
    #[serde(default)]
    pub fixed: Option<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            catalog: default_source_catalog(),
            weights: default_source_weights(),
            allowed: Vec::new(),
            fixed: None,
        }
    }
}

/// One fetchable source feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEndpoint {
    pub url: String,
    pub name: String,
}

fn default_source_catalog() -> HashMap<String, SourceEndpoint> {
    [
        ("zhihu", "Zhihu Hot List"),
        ("weibo", "Weibo Trending"),
        ("bili", "Bilibili Trending"),
        ("xiaohongshu", "Xiaohongshu Trending"),
        ("douyin", "Douyin Trending"),
        ("toutiao", "Toutiao Headlines"),
        ("baidu", "Baidu Hot Search"),
        ("tencent", "Tencent News"),
    ]
    .into_iter()
    .map(|(key, name)| {
        (
            key.to_string(),
            SourceEndpoint {
                url: format!("https://api.nycnm.cn/API/{key}.php"),
                name: name.to_string(),
            },
        )
    })
    .collect()
}

fn default_source_weights() -> HashMap<Period, HashMap<String, f64>> {
    fn table(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(k, w)| (k.to_string(), *w)).collect()
    }
    HashMap::from([
        (
            Period::Morning,
            table(&[
                ("xiaohongshu", 0.3),
                ("weibo", 0.25),
                ("toutiao", 0.2),
                ("baidu", 0.1),
                ("bili", 0.1),
                ("zhihu", 0.05),
            ]),
        ),
        (
            Period::Forenoon,
            table(&[
                ("xiaohongshu", 0.3),
                ("weibo", 0.25),
                ("toutiao", 0.2),
                ("baidu", 0.1),
                ("bili", 0.1),
                ("zhihu", 0.05),
            ]),
        ),
        (
            Period::Afternoon,
            table(&[
                ("douyin", 0.3),
                ("zhihu", 0.2),
                ("baidu", 0.15),
                ("toutiao", 0.15),
                ("bili", 0.1),
                ("xiaohongshu", 0.1),
            ]),
        ),
        (
            Period::Evening,
            table(&[
                ("bili", 0.3),
                ("weibo", 0.2),
                ("tencent", 0.15),
                ("douyin", 0.15),
                ("zhihu", 0.1),
                ("baidu", 0.1),
            ]),
        ),
        (
            Period::Night,
            table(&[
                ("douyin", 0.35),
                ("bili", 0.25),
                ("weibo", 0.2),
                ("xiaohongshu", 0.1),
                ("zhihu", 0.05),
                ("tencent", 0.05),
            ]),
        ),
        (
            Period::Dawn,
            table(&[
                ("xiaohongshu", 0.4),
                ("bili", 0.3),
                ("weibo", 0.1),
                ("zhihu", 0.1),
                ("toutiao", 0.1),
            ]),
        ),
    ])
}

/// Topic deduplication windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Topics used within this many days are excluded from generation.
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    /// Records older than this are deleted by the purge.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_window_days() -> i64 {
    30
}
fn default_retention_days() -> i64 {
    90
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            retention_days: default_retention_days(),
        }
    }
}

/// Conversation-activity heuristics for group suppression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Only messages this recent count toward intensity.
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
    /// Expected message count per window for this install; the intensity
    /// thresholds scale with it.
    #[serde(default = "default_check_count")]
    pub check_count: usize,
    #[serde(default = "default_high_ratio")]
    pub high_ratio: f64,
    #[serde(default = "default_medium_ratio")]
    pub medium_ratio: f64,
    /// Suppression policy applied to group recipients.
    #[serde(default = "default_group_policy")]
    pub group_policy: SuppressPolicy,
}

fn default_window_secs() -> i64 {
    3600
}
fn default_check_count() -> usize {
    20
}
fn default_high_ratio() -> f64 {
    0.5
}
fn default_medium_ratio() -> f64 {
    0.16
}
fn default_group_policy() -> SuppressPolicy {
    SuppressPolicy::Cautious
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            check_count: default_check_count(),
            high_ratio: default_high_ratio(),
            medium_ratio: default_medium_ratio(),
            group_policy: default_group_policy(),
        }
    }
}

/// Static recipient list. Groups first, then direct users, in config order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipientsConfig {
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub users: Vec<String>,
}

/// Collaborator endpoints used by the shipped webhook implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default)]
    pub generation_url: String,
    #[serde(default)]
    pub delivery_url: String,
    /// Optional chat-history endpoint; unset means no suppression data.
    #[serde(default)]
    pub history_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    2
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            generation_url: String::new(),
            delivery_url: String::new(),
            history_url: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}
