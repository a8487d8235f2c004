//! Core data model: the closed vocabularies and record types the
//! scheduler passes around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named contiguous slice of the 24-hour day. The partition boundaries
/// are configurable, but the label set is closed and validated at load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Dawn,
    Morning,
    Forenoon,
    Afternoon,
    Evening,
    Night,
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Period::Dawn => "dawn",
            Period::Morning => "morning",
            Period::Forenoon => "forenoon",
            Period::Afternoon => "afternoon",
            Period::Evening => "evening",
            Period::Night => "night",
        };
        write!(f, "{s}")
    }
}

/// What kind of content to produce next. Opaque to the rotation beyond
/// being a token; `News` additionally requires a source pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Greeting,
    News,
    Mood,
    Knowledge,
    Recommendation,
}

impl ContentType {
    /// Whether this type draws on an external data source.
    pub fn needs_source(&self) -> bool {
        matches!(self, ContentType::News)
    }

    /// Whether chosen topics of this type are tracked for deduplication.
    pub fn tracks_topics(&self) -> bool {
        matches!(self, ContentType::Knowledge | ContentType::Recommendation)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContentType::Greeting => "greeting",
            ContentType::News => "news",
            ContentType::Mood => "mood",
            ContentType::Knowledge => "knowledge",
            ContentType::Recommendation => "recommendation",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Period {
    type Err = crate::error::DayShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dawn" => Ok(Period::Dawn),
            "morning" => Ok(Period::Morning),
            "forenoon" => Ok(Period::Forenoon),
            "afternoon" => Ok(Period::Afternoon),
            "evening" => Ok(Period::Evening),
            "night" => Ok(Period::Night),
            other => Err(crate::error::DayShareError::Config(format!(
                "unknown period label '{other}'"
            ))),
        }
    }
}

impl std::str::FromStr for ContentType {
    type Err = crate::error::DayShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greeting" => Ok(ContentType::Greeting),
            "news" => Ok(ContentType::News),
            "mood" => Ok(ContentType::Mood),
            "knowledge" => Ok(ContentType::Knowledge),
            "recommendation" => Ok(ContentType::Recommendation),
            other => Err(crate::error::DayShareError::Config(format!(
                "unknown content type '{other}'"
            ))),
        }
    }
}

/// A configured message recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Opaque target id understood by the delivery collaborator.
    pub target: String,
    /// Group targets get activity-based suppression; direct ones never do.
    pub is_group: bool,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One recent message, as supplied by the chat-history collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub timestamp: DateTime<Utc>,
    pub participant_id: String,
    /// Text length in characters; the scheduler never sees the content.
    pub length: usize,
}

/// Coarse classification of recent conversational volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

/// Ephemeral per-decision view of a group's recent activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySnapshot {
    pub message_count: usize,
    pub intensity: Intensity,
    /// Up to 3 participant ids, ranked by message count in the window.
    pub active_participants: Vec<String>,
    pub is_actively_discussing: bool,
}

/// When to hold back an automated post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuppressPolicy {
    /// Suppress only a lively exchange: actively discussing AND high intensity.
    Cautious,
    /// Suppress on any sign of life: actively discussing OR non-low intensity.
    Minimal,
    /// Never suppress (direct recipients, or no snapshot available).
    AlwaysPost,
}

/// One item from an external source feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Fetched source data handed to the generation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceData {
    /// Source label (the weight-table key).
    pub source: String,
    /// Human-readable source name.
    pub name: String,
    pub items: Vec<SourceItem>,
}

/// Everything the generation collaborator needs for one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub content_type: ContentType,
    pub period: Period,
    pub target: String,
    pub is_group: bool,
    /// Topic keys already used for this (target, category) recently.
    pub avoid_topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<ActivitySnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_data: Option<SourceData>,
}

/// The generation collaborator's reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub message: String,
    /// The specific topic the collaborator settled on, if any; fed back
    /// to the topic ledger for deduplication.
    #[serde(default)]
    pub topic_key: Option<String>,
}
