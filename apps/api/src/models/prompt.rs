use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Media kind of a collected prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptType {
    Text,
    Image,
    Video,
}

impl PromptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptType::Text => "text",
            PromptType::Image => "image",
            PromptType::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(PromptType::Text),
            "image" => Some(PromptType::Image),
            "video" => Some(PromptType::Video),
            _ => None,
        }
    }
}

/// A single collected prompt. Immutable once written into a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub source: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type")]
    pub prompt_type: PromptType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The projection of a [`Prompt`] sent to the ranking oracle.
/// Deliberately omits `url` and `media_url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistedPrompt {
    pub id: String,
    pub content: String,
    pub source: String,
    #[serde(rename = "type")]
    pub prompt_type: PromptType,
}

impl From<&Prompt> for ShortlistedPrompt {
    fn from(prompt: &Prompt) -> Self {
        Self {
            id: prompt.id.clone(),
            content: prompt.content.clone(),
            source: prompt.source.clone(),
            prompt_type: prompt.prompt_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_deserializes_camel_case_with_optional_fields_missing() {
        let prompt: Prompt = serde_json::from_value(json!({
            "id": "p-1",
            "content": "Draw a lighthouse",
            "source": "PromptHero ChatGPT Images",
            "type": "image",
            "mediaUrl": "https://cdn.example/1.png",
            "createdAt": "2025-08-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(prompt.prompt_type, PromptType::Image);
        assert_eq!(prompt.media_url.as_deref(), Some("https://cdn.example/1.png"));
        assert!(prompt.title.is_none());
        assert_eq!(prompt.url, "");
    }

    #[test]
    fn test_shortlisted_projection_drops_urls() {
        let prompt = Prompt {
            id: "p-2".to_string(),
            content: "Write a haiku".to_string(),
            title: Some("Haiku".to_string()),
            description: None,
            source: "Anthropic Prompt Library".to_string(),
            url: "https://example.com/p-2".to_string(),
            prompt_type: PromptType::Text,
            model: Some("Claude".to_string()),
            media_url: Some("https://cdn.example/2.png".to_string()),
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(ShortlistedPrompt::from(&prompt)).unwrap();
        assert_eq!(value["type"], "text");
        assert!(value.get("url").is_none());
        assert!(value.get("mediaUrl").is_none());
    }

    #[test]
    fn test_prompt_type_parse_is_case_insensitive() {
        assert_eq!(PromptType::parse(" Video "), Some(PromptType::Video));
        assert_eq!(PromptType::parse("audio"), None);
    }
}
