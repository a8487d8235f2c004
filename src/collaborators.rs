//! Shipped webhook/HTTP collaborator implementations.
//!
//! The decision core only knows the trait boundaries; these adapters wire
//! them to plain HTTP endpoints. Source feeds in the wild disagree about
//! field names, so the fetcher parses payloads tolerantly.

use async_trait::async_trait;
use dayshare_core::config::SourceEndpoint;
use dayshare_core::error::{DayShareError, Result};
use dayshare_core::traits::{ChatHistoryProvider, Deliverer, Generator, SourceFetcher};
use dayshare_core::types::{ChatMessage, GeneratedContent, GenerationRequest, SourceData, SourceItem};
use std::collections::HashMap;
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// At most this many items are forwarded from one feed.
const MAX_FEED_ITEMS: usize = 15;

/// POSTs the full generation request to a webhook; the reply body is the
/// generated content.
pub struct WebhookGenerator {
    client: reqwest::Client,
    url: String,
}

impl WebhookGenerator {
    pub fn new(url: String) -> Self {
        Self { client: reqwest::Client::new(), url }
    }
}

#[async_trait]
impl Generator for WebhookGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedContent> {
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| DayShareError::Generation(format!("request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(DayShareError::Generation(format!(
                "generator returned {}",
                resp.status()
            )));
        }
        let content: GeneratedContent = resp
            .json()
            .await
            .map_err(|e| DayShareError::Generation(format!("bad reply: {e}")))?;
        if content.message.trim().is_empty() {
            return Err(DayShareError::Generation("generator returned an empty message".into()));
        }
        Ok(content)
    }
}

/// POSTs `{target, message}` to a delivery webhook.
pub struct WebhookDeliverer {
    client: reqwest::Client,
    url: String,
}

impl WebhookDeliverer {
    pub fn new(url: String) -> Self {
        Self { client: reqwest::Client::new(), url }
    }
}

#[async_trait]
impl Deliverer for WebhookDeliverer {
    async fn deliver(&self, target: &str, message: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "target": target,
                "message": message,
            }))
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| DayShareError::Delivery(format!("send failed: {e}")))?;
        if resp.status().is_success() {
            tracing::info!("✅ Delivered to {}", target);
            Ok(())
        } else {
            Err(DayShareError::Delivery(format!("delivery endpoint returned {}", resp.status())))
        }
    }
}

/// Fetches a catalog source over GET and normalizes whatever shape the
/// feed happens to use.
pub struct HttpSourceFetcher {
    client: reqwest::Client,
    catalog: HashMap<String, SourceEndpoint>,
}

impl HttpSourceFetcher {
    pub fn new(catalog: HashMap<String, SourceEndpoint>) -> Self {
        Self { client: reqwest::Client::new(), catalog }
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, source: &str) -> Result<SourceData> {
        let endpoint = self
            .catalog
            .get(source)
            .ok_or_else(|| DayShareError::Source(format!("unknown source '{source}'")))?;
        let resp = self
            .client
            .get(&endpoint.url)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| DayShareError::Source(format!("'{source}' fetch failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(DayShareError::Source(format!(
                "'{source}' returned {}",
                resp.status()
            )));
        }
        let payload: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| DayShareError::Source(format!("'{source}' sent bad JSON: {e}")))?;
        let items = parse_feed_items(&payload);
        if items.is_empty() {
            return Err(DayShareError::Source(format!("'{source}' sent an empty feed")));
        }
        Ok(SourceData {
            source: source.to_string(),
            name: endpoint.name.clone(),
            items,
        })
    }
}

/// Pulls items out of a feed payload. The item list may be the top-level
/// array or sit under a handful of common keys; the same goes for the
/// title and heat fields of each item.
fn parse_feed_items(payload: &serde_json::Value) -> Vec<SourceItem> {
    let list = if payload.is_array() {
        Some(payload)
    } else {
        ["data", "list", "items", "result"]
            .iter()
            .find_map(|k| payload.get(k))
            .and_then(|v| if v.is_array() { Some(v) } else { v.get("list") })
    };
    let Some(serde_json::Value::Array(entries)) = list else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let title = ["title", "name", "query", "word", "keyword"]
                .iter()
                .find_map(|k| entry.get(k))
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())?;
            let heat = ["hot", "hotValue", "heat", "hotScore"]
                .iter()
                .find_map(|k| entry.get(k))
                .and_then(|v| match v {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                });
            let url = ["url", "link", "mobilUrl"]
                .iter()
                .find_map(|k| entry.get(k))
                .and_then(|v| v.as_str())
                .map(String::from);
            Some(SourceItem { title: title.to_string(), heat, url })
        })
        .take(MAX_FEED_ITEMS)
        .collect()
}

/// GETs recent message metadata for a target from an optional endpoint.
pub struct HttpChatHistory {
    client: reqwest::Client,
    url: String,
}

impl HttpChatHistory {
    pub fn new(url: String) -> Self {
        Self { client: reqwest::Client::new(), url }
    }
}

#[async_trait]
impl ChatHistoryProvider for HttpChatHistory {
    async fn recent_messages(&self, target: &str) -> Result<Vec<ChatMessage>> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[("target", target)])
            .timeout(HTTP_TIMEOUT)
            .send()
            .await
            .map_err(|e| DayShareError::Source(format!("chat history fetch failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(DayShareError::Source(format!(
                "chat history endpoint returned {}",
                resp.status()
            )));
        }
        resp.json()
            .await
            .map_err(|e| DayShareError::Source(format!("bad chat history payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_top_level_array() {
        let payload = json!([
            {"title": "first", "hot": 12345},
            {"title": "second"},
        ]);
        let items = parse_feed_items(&payload);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "first");
        assert_eq!(items[0].heat.as_deref(), Some("12345"));
        assert!(items[1].heat.is_none());
    }

    #[test]
    fn test_parse_nested_under_data() {
        let payload = json!({"code": 200, "data": [
            {"name": "via name key", "hotValue": "9.9w", "link": "https://x"},
        ]});
        let items = parse_feed_items(&payload);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "via name key");
        assert_eq!(items[0].heat.as_deref(), Some("9.9w"));
        assert_eq!(items[0].url.as_deref(), Some("https://x"));
    }

    #[test]
    fn test_parse_double_nested_list() {
        let payload = json!({"data": {"list": [{"word": "trending"}]}});
        let items = parse_feed_items(&payload);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "trending");
    }

    #[test]
    fn test_parse_skips_titleless_and_caps_count() {
        let mut entries: Vec<serde_json::Value> = vec![json!({"rank": 1}), json!({"title": "  "})];
        for i in 0..30 {
            entries.push(json!({"title": format!("item {i}")}));
        }
        let items = parse_feed_items(&json!(entries));
        assert_eq!(items.len(), MAX_FEED_ITEMS);
        assert_eq!(items[0].title, "item 0");
    }

    #[test]
    fn test_parse_garbage_yields_nothing() {
        assert!(parse_feed_items(&json!("nope")).is_empty());
        assert!(parse_feed_items(&json!({"data": "still nope"})).is_empty());
    }
}
