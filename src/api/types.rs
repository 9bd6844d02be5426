// src/api/types.rs
// Wire shapes for the vision, search, and reader endpoints

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---- Multimodal messages (vision endpoint) ----

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    Text { text: String },
    ImageUrl { image_url: MediaUrl },
    VideoUrl { video_url: MediaUrl },
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        MessageContent::ImageUrl {
            image_url: MediaUrl { url: url.into() },
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        MessageContent::VideoUrl {
            video_url: MediaUrl { url: url.into() },
        }
    }
}

/// Message content is either a bare string or a multimodal part list.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    Parts(Vec<MessageContent>),
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageBody,
}

impl Message {
    pub fn user(parts: Vec<MessageContent>) -> Self {
        Message {
            role: Role::User,
            content: MessageBody::Parts(parts),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Message {
            role: Role::System,
            content: MessageBody::Text(text.into()),
        }
    }
}

// ---- Vision (chat completions) ----

#[derive(Debug, Serialize)]
pub struct Thinking {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VisionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub thinking: Thinking,
    pub stream: bool,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionResponse {
    pub id: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChoiceMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

// ---- Web search ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
#[value(rename_all = "camelCase")]
pub enum RecencyFilter {
    OneDay,
    OneWeek,
    OneMonth,
    OneYear,
    NoLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum ContentSize {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum SearchLocation {
    Cn,
    Us,
}

/// Caller-facing search parameters; optional fields absent from the wire
/// body entirely when unset.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub query: String,
    pub count: Option<u32>,
    pub domain_filter: Option<String>,
    pub recency_filter: Option<RecencyFilter>,
    pub content_size: Option<ContentSize>,
    pub location: Option<SearchLocation>,
}

#[derive(Debug, Serialize)]
pub struct SearchRequest {
    pub search_engine: &'static str,
    pub search_query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_domain_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_recency_filter: Option<RecencyFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_content_size: Option<ContentSize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_location: Option<SearchLocation>,
}

impl From<SearchParams> for SearchRequest {
    fn from(params: SearchParams) -> Self {
        SearchRequest {
            search_engine: "search-prime",
            search_query: params.query,
            count: params.count,
            search_domain_filter: params.domain_filter,
            search_recency_filter: params.recency_filter,
            search_content_size: params.content_size,
            search_location: params.location,
        }
    }
}

// ---- Web reader ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum ReturnFormat {
    #[default]
    Markdown,
    Text,
}

#[derive(Debug, Clone, Default)]
pub struct ReadParams {
    pub url: String,
    pub format: Option<ReturnFormat>,
    pub retain_images: Option<bool>,
    pub with_links_summary: Option<bool>,
    pub timeout: Option<u64>,
    pub no_cache: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ReaderRequest {
    pub url: String,
    pub return_format: ReturnFormat,
    pub retain_images: bool,
    pub with_links_summary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_cache: Option<bool>,
}

impl From<ReadParams> for ReaderRequest {
    fn from(params: ReadParams) -> Self {
        ReaderRequest {
            url: params.url,
            return_format: params.format.unwrap_or_default(),
            retain_images: params.retain_images.unwrap_or(true),
            with_links_summary: params.with_links_summary.unwrap_or(false),
            timeout: params.timeout,
            no_cache: params.no_cache,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderResponse {
    pub id: String,
    pub created: i64,
    pub reader_result: ReaderResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderResult {
    pub content: String,
    pub description: String,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn test_message_content_tags() {
        let parts = vec![
            MessageContent::text("hi"),
            MessageContent::image("https://x/img.png"),
            MessageContent::video("https://x/v.mp4"),
        ];
        let value = serde_json::to_value(&parts).unwrap();
        assert_eq!(value[0]["type"], "text");
        assert_eq!(value[0]["text"], "hi");
        assert_eq!(value[1]["type"], "image_url");
        assert_eq!(value[1]["image_url"]["url"], "https://x/img.png");
        assert_eq!(value[2]["type"], "video_url");
    }

    #[test]
    fn test_message_body_untagged() {
        let msg = Message::system("be brief");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "system");
        assert_eq!(value["content"], "be brief");

        let msg = Message::user(vec![MessageContent::text("q")]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "user");
        assert!(value["content"].is_array());
    }

    #[test]
    fn test_search_request_omits_absent_options() {
        let req = SearchRequest::from(SearchParams {
            query: "rust".into(),
            ..Default::default()
        });
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["search_engine"], "search-prime");
        assert_eq!(value["search_query"], "rust");
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("count"));
        assert!(!obj.contains_key("search_domain_filter"));
        assert!(!obj.contains_key("search_recency_filter"));
        assert!(!obj.contains_key("search_content_size"));
        assert!(!obj.contains_key("search_location"));
    }

    #[test]
    fn test_search_request_filters_on_wire() {
        let req = SearchRequest::from(SearchParams {
            query: "ai".into(),
            count: Some(5),
            domain_filter: Some("github.com".into()),
            recency_filter: Some(RecencyFilter::OneWeek),
            content_size: Some(ContentSize::High),
            location: Some(SearchLocation::Us),
        });
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["count"], 5);
        assert_eq!(value["search_domain_filter"], "github.com");
        assert_eq!(value["search_recency_filter"], "oneWeek");
        assert_eq!(value["search_content_size"], "high");
        assert_eq!(value["search_location"], "us");
    }

    #[test]
    fn test_reader_request_defaults() {
        let req = ReaderRequest::from(ReadParams {
            url: "https://example.com".into(),
            ..Default::default()
        });
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["return_format"], "markdown");
        assert_eq!(value["retain_images"], true);
        assert_eq!(value["with_links_summary"], false);
        let obj = value.as_object().unwrap();
        assert!(!obj.contains_key("timeout"));
        assert!(!obj.contains_key("no_cache"));
    }

    #[test]
    fn test_reader_response_deserializes() {
        let body: Value = json!({
            "id": "r1",
            "created": 1700000000,
            "reader_result": {
                "content": "# Title",
                "description": "d",
                "title": "Title",
                "url": "https://example.com"
            }
        });
        let resp: ReaderResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.reader_result.title, "Title");
        assert!(resp.reader_result.metadata.is_none());
    }

    #[test]
    fn test_vision_response_deserializes() {
        let body: Value = json!({
            "id": "v1",
            "created": 1700000000,
            "model": "glm-4.6v",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "a cat", "reasoning_content": "looks feline"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        });
        let resp: VisionResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.choices[0].message.content, "a cat");
        assert_eq!(resp.usage.total_tokens, 15);
    }
}
