// src/http.rs
// Resilient request pipeline: authenticated JSON POST + classification + retry

use crate::config::ZaiConfig;
use crate::error::ZaiError;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Base backoff between retries (doubles each attempt)
const BASE_BACKOFF: Duration = Duration::from_millis(1000);
/// Connect timeout, separate from the per-request deadline
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared HTTP pipeline for all Z.AI API operations.
///
/// Performs one logical remote call with a hard deadline and bounded,
/// classified retries. Attempts within one invocation are strictly
/// sequential; independent invocations may run concurrently.
pub struct ApiPipeline {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
    max_retries: u32,
    base_backoff: Duration,
}

impl ApiPipeline {
    pub fn new(config: &ZaiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            timeout_ms: config.timeout_ms,
            max_retries: config.max_retries,
            base_backoff: BASE_BACKOFF,
        }
    }

    /// Override the backoff base (test hook; production uses 1s).
    pub fn with_base_backoff(mut self, base: Duration) -> Self {
        self.base_backoff = base;
        self
    }

    /// POST `body` to `endpoint` under the base URL, retrying transient
    /// failures, and deserialize the 2xx response body.
    pub async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        with_retry(self.max_retries, self.base_backoff, || {
            self.send(endpoint, body)
        })
        .await
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &impl Serialize,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept-Language", "en-US,en")
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &text).into());
        }

        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| self.classify_transport(e))?;
        Ok(parsed)
    }

    /// Map a transport-level failure into the taxonomy: deadline hits become
    /// Timeout, connectivity failures become Network, anything else (e.g. a
    /// malformed 2xx body) propagates unchanged.
    fn classify_transport(&self, err: reqwest::Error) -> anyhow::Error {
        if err.is_timeout() {
            ZaiError::Timeout {
                ms: self.timeout_ms,
            }
            .into()
        } else if err.is_connect() {
            ZaiError::Network(err.to_string()).into()
        } else {
            err.into()
        }
    }
}

/// Classify a non-2xx response: 401/403 are Auth, everything else Api with
/// the original status. The message comes from the body when extractable.
pub(crate) fn classify_status(status: u16, body: &str) -> ZaiError {
    let message =
        extract_api_message(body).unwrap_or_else(|| format!("HTTP {}: {}", status, body));
    if status == 401 || status == 403 {
        ZaiError::Auth(message)
    } else {
        ZaiError::Api { message, status }
    }
}

/// Best-effort extraction of an error message from a JSON body, supporting
/// flat `message`, nested `error.message`, and `error` as a bare string or
/// object (objects are serialized verbatim).
pub(crate) fn extract_api_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    let msg = json
        .get("message")
        .filter(|m| !m.is_null())
        .or_else(|| json.get("error").and_then(|e| e.get("message")))
        .or_else(|| json.get("error"))?;
    match msg {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(msg).ok(),
        _ => None,
    }
}

/// Bounded retry with exponential backoff.
///
/// Auth failures are terminal: credentials will not become valid on retry.
/// Everything else (classified or not) is retried up to `max_retries` extra
/// attempts with delays of `base × 2^attempt`, applied only between attempts.
/// After exhaustion the last observed error is raised unchanged.
pub async fn with_retry<T, F, Fut>(max_retries: u32, base: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if matches!(err.downcast_ref::<ZaiError>(), Some(ZaiError::Auth(_))) {
                    return Err(err);
                }
                if attempt == max_retries {
                    last_err = Some(err);
                    break;
                }
                let delay = base * 2u32.pow(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Request failed, retrying"
                );
                last_err = Some(err);
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("retry loop produced no result")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    // ========================================================================
    // Error body extraction
    // ========================================================================

    #[test]
    fn test_extract_flat_message() {
        assert_eq!(
            extract_api_message(r#"{"message":"quota exceeded"}"#).as_deref(),
            Some("quota exceeded")
        );
    }

    #[test]
    fn test_extract_nested_error_message() {
        assert_eq!(
            extract_api_message(r#"{"error":{"message":"bad model"}}"#).as_deref(),
            Some("bad model")
        );
    }

    #[test]
    fn test_extract_error_string() {
        assert_eq!(
            extract_api_message(r#"{"error":"plain failure"}"#).as_deref(),
            Some("plain failure")
        );
    }

    #[test]
    fn test_extract_error_object_serialized_verbatim() {
        let msg = extract_api_message(r#"{"error":{"type":"rate_limit","retry_after":30}}"#)
            .unwrap();
        let parsed: Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(parsed["type"], "rate_limit");
        assert_eq!(parsed["retry_after"], 30);
    }

    #[test]
    fn test_extract_flat_message_beats_nested() {
        assert_eq!(
            extract_api_message(r#"{"message":"outer","error":{"message":"inner"}}"#).as_deref(),
            Some("outer")
        );
    }

    #[test]
    fn test_extract_non_json_body() {
        assert!(extract_api_message("<html>502</html>").is_none());
        assert!(extract_api_message(r#"{"error":42}"#).is_none());
    }

    // ========================================================================
    // Status classification
    // ========================================================================

    #[test]
    fn test_classify_auth_statuses() {
        assert!(matches!(
            classify_status(401, r#"{"message":"no key"}"#),
            ZaiError::Auth(m) if m == "no key"
        ));
        assert!(matches!(classify_status(403, "denied"), ZaiError::Auth(_)));
    }

    #[test]
    fn test_classify_api_preserves_status() {
        match classify_status(503, "oops") {
            ZaiError::Api { message, status } => {
                assert_eq!(status, 503);
                assert_eq!(message, "HTTP 503: oops");
            }
            other => panic!("expected Api, got {:?}", other),
        }
    }

    // ========================================================================
    // Retry policy (paused clock; sleeps auto-advance)
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success_with_exponential_delays() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result = with_retry(2, Duration::from_millis(1000), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ZaiError::Api {
                        message: format!("fail {}", n),
                        status: 500,
                    }
                    .into())
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two inter-attempt delays: 1000 * 2^0 + 1000 * 2^1
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_error_is_never_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(2, Duration::from_millis(1000), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ZaiError::Auth("bad key".into()).into()) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            err.downcast_ref::<ZaiError>(),
            Some(ZaiError::Auth(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_raises_last_error_unchanged() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(2, Duration::from_millis(10), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Err(ZaiError::Api {
                    message: format!("attempt {}", n),
                    status: 500,
                }
                .into())
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let err = result.unwrap_err();
        match err.downcast_ref::<ZaiError>() {
            Some(ZaiError::Api { message, status }) => {
                assert_eq!(message, "attempt 2");
                assert_eq!(*status, 500);
            }
            other => panic!("expected Api, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_final_attempt() {
        let start = Instant::now();
        let result: Result<()> = with_retry(1, Duration::from_millis(1000), || async {
            Err(anyhow::anyhow!("always"))
        })
        .await;
        assert!(result.is_err());
        // One inter-attempt delay only; nothing after the final attempt.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(0, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("x")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
