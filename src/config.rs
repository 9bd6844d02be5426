// src/config.rs
// Environment-based configuration - single source of truth for all env vars

use thiserror::Error;
use tracing::debug;

/// Z.AI Coding Plan requires the /coding/ endpoint
pub const ZAI_BASE_URL: &str = "https://api.z.ai/api/coding/paas/v4";
pub const ZHIPU_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// MCP server endpoints for the hosted tool bundle
pub const MCP_WEB_SEARCH_URL: &str = "https://api.z.ai/api/mcp/web_search_prime/mcp";
pub const MCP_WEB_READER_URL: &str = "https://api.z.ai/api/mcp/web_reader/mcp";
pub const MCP_ZREAD_URL: &str = "https://api.z.ai/api/mcp/zread/mcp";

const DEFAULT_TIMEOUT_MS: u64 = 300_000;
const DEFAULT_VISION_MODEL: &str = "glm-4.6v";
const DEFAULT_TEMPERATURE: f64 = 0.8;
const DEFAULT_TOP_P: f64 = 0.6;
const DEFAULT_MAX_TOKENS: u32 = 32_768;
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Which API endpoint family to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeployMode {
    #[default]
    Zai,
    Zhipu,
}

impl DeployMode {
    /// Parse a mode selector; unknown values fall back to the default mode,
    /// matching the base-URL lookup's fallback.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "ZHIPU" => DeployMode::Zhipu,
            _ => DeployMode::Zai,
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            DeployMode::Zai => ZAI_BASE_URL,
            DeployMode::Zhipu => ZHIPU_BASE_URL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeployMode::Zai => "ZAI",
            DeployMode::Zhipu => "ZHIPU",
        }
    }
}

/// Missing credential - the one configuration failure that terminates the
/// process (exit code 3) before any command runs.
#[derive(Debug, Error)]
#[error("Z_AI_API_KEY environment variable is required")]
pub struct MissingApiKey;

impl MissingApiKey {
    pub const EXIT_CODE: i32 = 3;

    /// The JSON payload written to stderr. Always pretty-printed so the
    /// remediation steps are readable.
    pub fn to_json(&self) -> String {
        let help = [
            "To set it:",
            "  export Z_AI_API_KEY=\"your-api-key\"",
            "",
            "Get your API key at:",
            "  https://z.ai/manage-apikey/apikey-list",
        ]
        .join("\n");
        let value = serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "help": help,
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| self.to_string())
    }
}

/// Immutable per-invocation configuration, resolved from environment before
/// any network call.
#[derive(Debug, Clone)]
pub struct ZaiConfig {
    pub api_key: String,
    pub mode: DeployMode,
    pub base_url: String,
    pub timeout_ms: u64,
    pub vision_model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: u32,
    pub max_retries: u32,
}

impl ZaiConfig {
    pub fn from_env() -> Result<Self, MissingApiKey> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Resolve configuration from an arbitrary lookup so tests never have to
    /// mutate the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, MissingApiKey> {
        let api_key = get("Z_AI_API_KEY")
            .or_else(|| get("ZAI_API_KEY"))
            .filter(|k| !k.trim().is_empty())
            .ok_or(MissingApiKey)?;

        let mode = get("Z_AI_MODE")
            .or_else(|| get("PLATFORM_MODE"))
            .map(|m| DeployMode::parse(&m))
            .unwrap_or_default();
        let base_url = get("Z_AI_BASE_URL")
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| mode.base_url().to_string());

        let config = Self {
            api_key,
            mode,
            base_url,
            timeout_ms: leading_u64(get("Z_AI_TIMEOUT"), DEFAULT_TIMEOUT_MS),
            vision_model: get("Z_AI_VISION_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
            temperature: leading_f64(get("Z_AI_TEMPERATURE"), DEFAULT_TEMPERATURE),
            top_p: leading_f64(get("Z_AI_TOP_P"), DEFAULT_TOP_P),
            max_tokens: leading_u64(get("Z_AI_MAX_TOKENS"), u64::from(DEFAULT_MAX_TOKENS)) as u32,
            max_retries: leading_u64(get("Z_AI_RETRY_COUNT"), u64::from(DEFAULT_MAX_RETRIES))
                as u32,
        };

        debug!(
            mode = config.mode.as_str(),
            base_url = %config.base_url,
            timeout_ms = config.timeout_ms,
            model = %config.vision_model,
            "Configuration resolved"
        );
        Ok(config)
    }
}

/// Parse the longest leading unsigned-integer prefix, defaulting when no
/// digits are present. Mirrors the lenient partial-parse semantics the env
/// contract was written against: `"300000ms"` is 300000, `"abc"` is the
/// default.
fn leading_u64(value: Option<String>, default: u64) -> u64 {
    value
        .as_deref()
        .map(str::trim)
        .and_then(|s| {
            let end = s
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(s.len());
            s[..end].parse().ok()
        })
        .unwrap_or(default)
}

/// Float twin of [`leading_u64`]: longest leading `digits[.digits]` prefix.
fn leading_f64(value: Option<String>, default: f64) -> f64 {
    value
        .as_deref()
        .map(str::trim)
        .and_then(|s| {
            let mut end = 0;
            let mut seen_dot = false;
            for c in s.chars() {
                if c.is_ascii_digit() {
                    end += c.len_utf8();
                } else if c == '.' && !seen_dot {
                    seen_dot = true;
                    end += 1;
                } else {
                    break;
                }
            }
            s[..end].parse().ok()
        })
        .unwrap_or(default)
}
