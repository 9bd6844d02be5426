// src/error.rs
// Standardized error taxonomy for zai-cli

use crate::output::OutputMode;
use serde_json::json;
use thiserror::Error;

/// Main error type for the zai library.
///
/// Every failure surfaced to the user is one of these six kinds. Lower
/// layers classify at the failure site; upper layers only format.
#[derive(Error, Debug, Clone)]
pub enum ZaiError {
    /// Credentials rejected by the API (401/403). Never retried.
    #[error("{0}")]
    Auth(String),

    /// Caller input rejected before any network call.
    #[error("{0}")]
    Validation(String),

    /// The remote API rejected the request; original status preserved.
    #[error("{message}")]
    Api { message: String, status: u16 },

    /// Transport-level failure (DNS, connect, TLS).
    #[error("{0}")]
    Network(String),

    /// Deadline exceeded; carries the configured timeout.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Local resource problem (missing or unreadable media file).
    #[error("{message}")]
    File {
        message: String,
        help: Option<String>,
    },
}

/// Convenience type alias for Result using ZaiError
pub type Result<T> = std::result::Result<T, ZaiError>;

impl ZaiError {
    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            ZaiError::Auth(_) => "AUTH_ERROR",
            ZaiError::Validation(_) => "VALIDATION_ERROR",
            ZaiError::Api { .. } => "API_ERROR",
            ZaiError::Network(_) => "NETWORK_ERROR",
            ZaiError::Timeout { .. } => "TIMEOUT_ERROR",
            ZaiError::File { .. } => "FILE_ERROR",
        }
    }

    /// HTTP status associated with this error, where one applies.
    pub fn status(&self) -> Option<u16> {
        match self {
            ZaiError::Auth(_) => Some(401),
            ZaiError::Validation(_) => Some(400),
            ZaiError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Remediation hint shown to the user alongside the message.
    pub fn help(&self) -> Option<String> {
        match self {
            ZaiError::Auth(_) => {
                Some("Check your Z_AI_API_KEY is valid and has sufficient quota".into())
            }
            ZaiError::Network(_) => Some("Check your internet connection".into()),
            ZaiError::Timeout { .. } => {
                Some("Try again or increase timeout with Z_AI_TIMEOUT env var".into())
            }
            ZaiError::File { help, .. } => help.clone(),
            _ => None,
        }
    }
}

/// Render any error (typed or not) as the stable JSON error envelope
/// `{success:false, error, code, help?}`.
///
/// Untyped errors get `code:"UNKNOWN_ERROR"`. Single-line output unless the
/// output mode is pretty. This function never fails.
pub fn format_error_output(err: &anyhow::Error, mode: OutputMode) -> String {
    let value = match err.downcast_ref::<ZaiError>() {
        Some(zai) => {
            let mut obj = json!({
                "success": false,
                "error": zai.to_string(),
                "code": zai.code(),
            });
            if let (Some(help), Some(map)) = (zai.help(), obj.as_object_mut()) {
                map.insert("help".into(), json!(help));
            }
            obj
        }
        None => json!({
            "success": false,
            "error": err.to_string(),
            "code": "UNKNOWN_ERROR",
        }),
    };

    let rendered = if mode == OutputMode::Pretty {
        serde_json::to_string_pretty(&value)
    } else {
        serde_json::to_string(&value)
    };
    rendered.unwrap_or_else(|_| r#"{"success":false,"error":"unrenderable error","code":"UNKNOWN_ERROR"}"#.to_string())
}
