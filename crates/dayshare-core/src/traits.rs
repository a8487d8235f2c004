//! Collaborator trait boundaries.
//!
//! Every collaborator is an explicit trait object injected at
//! construction and resolved once at startup; nothing is discovered
//! at call time.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, GeneratedContent, GenerationRequest, SourceData};

/// Produces the actual message body. Consumed as a black box.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedContent>;
}

/// Delivers a rendered message to a target. Calls are retried under the
/// configured endpoint budget, so delivery should be idempotent-ish.
#[async_trait]
pub trait Deliverer: Send + Sync {
    async fn deliver(&self, target: &str, message: &str) -> Result<()>;
}

/// Fetches the feed behind a source label picked by the weighted selector.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source: &str) -> Result<SourceData>;
}

/// Supplies a bounded window of recent messages for a target, newest last.
/// Optional: without one, group suppression degrades to always-post.
#[async_trait]
pub trait ChatHistoryProvider: Send + Sync {
    async fn recent_messages(&self, target: &str) -> Result<Vec<ChatMessage>>;
}
