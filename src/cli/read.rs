// src/cli/read.rs
// Read command: fetch and convert a web page

use crate::api::ZaiClient;
use crate::api::types::ReadParams;
use crate::error::ZaiError;
use crate::output::{OutputMode, print_success};

/// Reject non-web URLs before any network traffic.
fn validate_url(url: &str) -> crate::error::Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ZaiError::Validation(format!(
            "URL must start with http:// or https://: {}",
            url
        )))
    }
}

pub async fn run(client: &ZaiClient, params: ReadParams, mode: OutputMode) -> anyhow::Result<()> {
    validate_url(&params.url)?;
    let response = client.web_read(params).await?;
    print_success(&response.reader_result, mode);
    Ok(())
}
