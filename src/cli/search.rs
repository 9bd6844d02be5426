// src/cli/search.rs
// Search command: normalize upstream result shapes and rank them

use crate::api::ZaiClient;
use crate::api::types::SearchParams;
use crate::output::{OutputMode, print_success};
use serde::Serialize;
use serde_json::Value;

/// One formatted search hit.
#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub rank: usize,
    pub title: String,
    pub url: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Upstream wraps result lists in several shapes. Unwrap in fixed priority
/// order: bare array, then `results`/`data`/`items` arrays, then a lone
/// result object, else nothing.
pub fn normalize_search_results(raw: &Value) -> Vec<Value> {
    if let Value::Array(items) = raw {
        return items.clone();
    }
    if let Value::Object(obj) = raw {
        for key in ["results", "data", "items"] {
            if let Some(Value::Array(items)) = obj.get(key) {
                return items.clone();
            }
        }
        if ["title", "link", "url", "content"]
            .iter()
            .any(|k| obj.contains_key(*k))
        {
            return vec![raw.clone()];
        }
    }
    Vec::new()
}

fn str_field(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        entry
            .get(*k)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Normalize, truncate to `count`, and rank 1-based.
pub fn build_results(raw: &Value, count: Option<u32>) -> Vec<RankedResult> {
    let mut entries = normalize_search_results(raw);
    if let Some(count) = count {
        entries.truncate(count as usize);
    }

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| RankedResult {
            rank: i + 1,
            title: str_field(entry, &["title"]).unwrap_or_else(|| "(untitled)".to_string()),
            url: str_field(entry, &["link", "url"]).unwrap_or_default(),
            summary: str_field(entry, &["content", "summary"]).unwrap_or_default(),
            source: str_field(entry, &["media", "source"]),
            date: str_field(entry, &["publish_date", "date"]),
        })
        .collect()
}

pub async fn run(client: &ZaiClient, params: SearchParams, mode: OutputMode) -> anyhow::Result<()> {
    let count = params.count;
    let raw = client.web_search(params).await?;
    print_success(&build_results(&raw, count), mode);
    Ok(())
}
