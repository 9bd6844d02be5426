// src/cli/describe.rs
// Describe command: vision completion over an image or video source

use crate::api::ZaiClient;
use crate::api::types::{Message, MessageContent};
use crate::media;
use crate::output::{OutputMode, print_success};

const DEFAULT_IMAGE_PROMPT: &str = "Describe this image in detail.";
const DEFAULT_VIDEO_PROMPT: &str = "Describe this video in detail.";

pub async fn run(
    client: &ZaiClient,
    source: &str,
    prompt: Option<String>,
    video: bool,
    mode: OutputMode,
) -> anyhow::Result<()> {
    let (media_part, default_prompt) = if video {
        (
            MessageContent::video(media::process_video_source(source)?),
            DEFAULT_VIDEO_PROMPT,
        )
    } else {
        (
            MessageContent::image(media::process_image_source(source)?),
            DEFAULT_IMAGE_PROMPT,
        )
    };

    let instruction = prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| default_prompt.to_string());

    let messages = vec![Message::user(vec![
        media_part,
        MessageContent::text(instruction),
    ])];

    let response = client.vision_complete(messages).await?;
    let answer = response
        .choices
        .first()
        .map(|c| c.message.content.clone())
        .unwrap_or_default();

    print_success(&answer, mode);
    Ok(())
}
