//! JSON feed source: GETs an array of prompt items from a configured URL.
//!
//! Site-specific scrapers live outside this service and publish their output
//! in this shape; the service only normalises it into `Prompt` records.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::crawl::PromptSource;
use crate::models::prompt::{Prompt, PromptType};

/// One entry of `CRAWL_FEEDS`: `name|type|url`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSpec {
    pub name: String,
    pub prompt_type: PromptType,
    pub url: String,
}

/// Parses `name|type|url` entries separated by `;`. Blank entries are ignored.
pub fn parse_feed_specs(raw: &str) -> Result<Vec<FeedSpec>> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split('|').map(str::trim).collect();
            let [name, kind, url] = parts.as_slice() else {
                anyhow::bail!("Feed entry '{entry}' must look like name|type|url");
            };
            let prompt_type = PromptType::parse(kind)
                .with_context(|| format!("Feed '{name}' has unknown type '{kind}'"))?;
            if name.is_empty() || url.is_empty() {
                anyhow::bail!("Feed entry '{entry}' needs both a name and a url");
            }
            Ok(FeedSpec {
                name: name.to_string(),
                prompt_type,
                url: url.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedItem {
    content: String,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    model: Option<String>,
    media_url: Option<String>,
    #[serde(rename = "type")]
    prompt_type: Option<PromptType>,
}

pub struct JsonFeedSource {
    spec: FeedSpec,
    client: Client,
}

impl JsonFeedSource {
    pub fn new(spec: FeedSpec, client: Client) -> Self {
        Self { spec, client }
    }

    fn to_prompt(&self, item: FeedItem) -> Option<Prompt> {
        let content = item.content.trim();
        if content.is_empty() {
            return None;
        }
        Some(Prompt {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            title: item.title,
            description: item.description,
            source: self.spec.name.clone(),
            url: item.url.unwrap_or_default(),
            prompt_type: item.prompt_type.unwrap_or(self.spec.prompt_type),
            model: item.model,
            media_url: item.media_url,
            created_at: Utc::now(),
        })
    }
}

#[async_trait]
impl PromptSource for JsonFeedSource {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn fetch(&self) -> Result<Vec<Prompt>> {
        let items: Vec<FeedItem> = self
            .client
            .get(&self.spec.url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.spec.url))?
            .error_for_status()?
            .json()
            .await
            .context("feed body is not a JSON array of prompts")?;

        let total = items.len();
        let prompts: Vec<Prompt> = items.into_iter().filter_map(|i| self.to_prompt(i)).collect();
        debug!(
            "{}: kept {} of {} feed items",
            self.spec.name,
            prompts.len(),
            total
        );
        Ok(prompts)
    }
}
