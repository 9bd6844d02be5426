// src/media.rs
// Local image/video validation and data-URL encoding for the vision API

use crate::error::{Result, ZaiError};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "webm", "wmv"];
const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_VIDEO_BYTES: u64 = 8 * 1024 * 1024;

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

fn mime_for(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "m4v" => "video/x-m4v",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "wmv" => "video/x-ms-wmv",
        _ => "application/octet-stream",
    }
}

fn validate(source: &str, extensions: &[&str], max_bytes: u64, kind: &str) -> Result<()> {
    let path = Path::new(source);
    let meta = std::fs::metadata(path).map_err(|_| ZaiError::File {
        message: format!("File not found: {}", source),
        help: Some("Check the file path is correct".into()),
    })?;

    if meta.len() > max_bytes {
        return Err(ZaiError::Validation(format!(
            "{} exceeds {}MB limit ({:.2}MB)",
            kind,
            max_bytes / (1024 * 1024),
            meta.len() as f64 / 1024.0 / 1024.0
        )));
    }

    let ext = extension(path);
    if !extensions.contains(&ext.as_str()) {
        return Err(ZaiError::Validation(format!(
            "Unsupported {} format: .{}. Supported: {}",
            kind.to_lowercase(),
            ext,
            extensions
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    Ok(())
}

pub fn validate_image_source(source: &str) -> Result<()> {
    if is_url(source) {
        return Ok(()); // URLs are validated by the API
    }
    validate(source, IMAGE_EXTENSIONS, MAX_IMAGE_BYTES, "Image")
}

pub fn validate_video_source(source: &str) -> Result<()> {
    if is_url(source) {
        return Ok(());
    }
    validate(source, VIDEO_EXTENSIONS, MAX_VIDEO_BYTES, "Video")
}

fn encode_data_url(source: &str) -> Result<String> {
    let path = Path::new(source);
    let bytes = std::fs::read(path).map_err(|e| ZaiError::File {
        message: format!("Failed to read {}: {}", source, e),
        help: None,
    })?;
    let mime = mime_for(&extension(path));
    Ok(format!("data:{};base64,{}", mime, BASE64.encode(bytes)))
}

/// Resolve an image source for the wire: URLs pass through, local files are
/// validated and embedded as base64 data URLs.
pub fn process_image_source(source: &str) -> Result<String> {
    if is_url(source) {
        return Ok(source.to_string());
    }
    validate_image_source(source)?;
    encode_data_url(source)
}

pub fn process_video_source(source: &str) -> Result<String> {
    if is_url(source) {
        return Ok(source.to_string());
    }
    validate_video_source(source)?;
    encode_data_url(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_urls_pass_through() {
        assert!(is_url("https://example.com/cat.png"));
        assert_eq!(
            process_image_source("https://example.com/cat.png").unwrap(),
            "https://example.com/cat.png"
        );
    }

    #[test]
    fn test_missing_file_is_file_error() {
        let err = validate_image_source("/definitely/not/here.png").unwrap_err();
        assert_eq!(err.code(), "FILE_ERROR");
        assert!(err.help().unwrap().contains("path"));
    }

    #[test]
    fn test_unsupported_extension_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF").unwrap();
        let err = validate_image_source(path.to_str().unwrap()).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains(".pdf"));
    }

    #[test]
    fn test_oversized_image_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.png");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_IMAGE_BYTES + 1).unwrap();
        let err = validate_image_source(path.to_str().unwrap()).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("5MB"));
    }

    #[test]
    fn test_video_limit_is_8mb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        let file = std::fs::File::create(&path).unwrap();
        file.set_len(MAX_VIDEO_BYTES + 1).unwrap();
        let err = validate_video_source(path.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("8MB"));
    }

    #[test]
    fn test_data_url_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dot.png");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0x89, 0x50, 0x4e, 0x47]).unwrap();
        let url = process_image_source(path.to_str().unwrap()).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > "data:image/png;base64,".len());
    }

    #[test]
    fn test_video_mime_in_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mov");
        std::fs::write(&path, b"ftyp").unwrap();
        let url = process_video_source(path.to_str().unwrap()).unwrap();
        assert!(url.starts_with("data:video/quicktime;base64,"));
    }
}
