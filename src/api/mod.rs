// src/api/mod.rs
// Domain facade over the Z.AI HTTP API

pub mod types;

use crate::config::ZaiConfig;
use crate::http::ApiPipeline;
use anyhow::Result;
use serde_json::Value;
use tracing::debug;
use types::{
    Message, ReadParams, ReaderRequest, ReaderResponse, SearchParams, SearchRequest, Thinking,
    VisionRequest, VisionResponse,
};

/// Thin facade over the three API operations. Builds request bodies,
/// delegates to the resilient pipeline, and trusts the wire contract on the
/// way back.
pub struct ZaiClient {
    pipeline: ApiPipeline,
    config: ZaiConfig,
}

impl ZaiClient {
    pub fn new(config: ZaiConfig) -> Self {
        Self {
            pipeline: ApiPipeline::new(&config),
            config,
        }
    }

    /// Vision completions for image/video analysis. Always non-streaming
    /// with extended reasoning enabled and the configured sampling params.
    pub async fn vision_complete(&self, messages: Vec<Message>) -> Result<VisionResponse> {
        let body = VisionRequest {
            model: self.config.vision_model.clone(),
            messages,
            thinking: Thinking { kind: "enabled" },
            stream: false,
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
        };
        debug!(model = %body.model, "vision completion request");
        self.pipeline.post_json("/chat/completions", &body).await
    }

    /// Web search. The payload comes back as loose JSON because upstream
    /// wraps result lists in several shapes; normalization happens at the
    /// command layer.
    pub async fn web_search(&self, params: SearchParams) -> Result<Value> {
        let body = SearchRequest::from(params);
        debug!(query = %body.search_query, "web search request");
        self.pipeline.post_json("/web_search", &body).await
    }

    /// Web reader: fetch and parse a page, defaulting to markdown with
    /// images retained.
    pub async fn web_read(&self, params: ReadParams) -> Result<ReaderResponse> {
        let body = ReaderRequest::from(params);
        debug!(url = %body.url, "web read request");
        self.pipeline.post_json("/reader", &body).await
    }
}
