// src/code_mode.rs
// Tool-chaining session over the Z.AI MCP bundle (search/reader/zread + vision)

use crate::config::{MCP_WEB_READER_URL, MCP_WEB_SEARCH_URL, MCP_ZREAD_URL, ZaiConfig};
use crate::error::ZaiError;
use rmcp::model::{CallToolRequestParams, CallToolResult, ClientInfo};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::child_process::TokioChildProcess;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::{RoleClient, serve_client};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};

/// All bundle servers are registered under this manual name.
pub const MCP_MANUAL_NAME: &str = "zai";

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CLOSE_GRACE: Duration = Duration::from_secs(2);
const DEFAULT_VISION_COMMAND: &str = "npx";
const DEFAULT_VISION_ARGS: &[&str] = &["-y", "@z_ai/mcp-server@latest"];

// ---- Bundle configuration ----

#[derive(Debug, Clone)]
pub enum ToolTransport {
    Stdio {
        command: String,
        args: Vec<String>,
        env: HashMap<String, String>,
        cwd: Option<String>,
    },
    Http {
        url: String,
        bearer_token: String,
    },
}

#[derive(Debug, Clone)]
pub struct ToolServerConfig {
    pub name: String,
    pub transport: ToolTransport,
}

fn ensure_trailing_slash(value: &str) -> String {
    if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    }
}

/// Parse a command argument override: either a JSON string array or a
/// whitespace-separated list.
fn parse_args(value: Option<String>, fallback: &[&str]) -> Vec<String> {
    let fallback_vec = || fallback.iter().map(|s| (*s).to_string()).collect();
    let Some(value) = value else {
        return fallback_vec();
    };
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return fallback_vec();
    }
    if trimmed.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str::<Vec<String>>(trimmed) {
            return parsed;
        }
    }
    trimmed.split_whitespace().map(String::from).collect()
}

/// Build the Z.AI tool bundle: three hosted HTTP servers plus an optional
/// local vision server process that inherits the resolved configuration
/// through its environment.
pub fn tool_bundle(
    config: &ZaiConfig,
    get: impl Fn(&str) -> Option<String>,
    enable_vision: Option<bool>,
) -> Vec<ToolServerConfig> {
    let http = |name: &str, url: &str| ToolServerConfig {
        name: name.to_string(),
        transport: ToolTransport::Http {
            url: url.to_string(),
            bearer_token: config.api_key.clone(),
        },
    };

    let mut servers = vec![
        http("search", MCP_WEB_SEARCH_URL),
        http("reader", MCP_WEB_READER_URL),
        http("zread", MCP_ZREAD_URL),
    ];

    let env_vision = !matches!(
        get("Z_AI_VISION_MCP")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "0" | "false"
    );
    if enable_vision.unwrap_or(env_vision) {
        let env = HashMap::from([
            ("Z_AI_API_KEY".to_string(), config.api_key.clone()),
            (
                "Z_AI_BASE_URL".to_string(),
                ensure_trailing_slash(&config.base_url),
            ),
            ("Z_AI_MODE".to_string(), config.mode.as_str().to_string()),
            ("PLATFORM_MODE".to_string(), config.mode.as_str().to_string()),
            ("Z_AI_VISION_MODEL".to_string(), config.vision_model.clone()),
            (
                "Z_AI_VISION_MODEL_TEMPERATURE".to_string(),
                config.temperature.to_string(),
            ),
            (
                "Z_AI_VISION_MODEL_TOP_P".to_string(),
                config.top_p.to_string(),
            ),
            (
                "Z_AI_VISION_MODEL_MAX_TOKENS".to_string(),
                config.max_tokens.to_string(),
            ),
            ("Z_AI_TIMEOUT".to_string(), config.timeout_ms.to_string()),
            (
                "Z_AI_RETRY_COUNT".to_string(),
                config.max_retries.to_string(),
            ),
        ]);

        servers.push(ToolServerConfig {
            name: "vision".to_string(),
            transport: ToolTransport::Stdio {
                command: get("Z_AI_VISION_MCP_COMMAND")
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_VISION_COMMAND.to_string()),
                args: parse_args(get("Z_AI_VISION_MCP_ARGS"), DEFAULT_VISION_ARGS),
                env,
                cwd: get("Z_AI_VISION_MCP_CWD").filter(|c| !c.trim().is_empty()),
            },
        });
    }

    servers
}

// ---- Shared one-shot initialization ----

enum InitState<T> {
    Idle,
    Pending(watch::Receiver<Option<Result<T, ZaiError>>>),
    Ready(T),
}

enum InitRole<T> {
    Leader(watch::Sender<Option<Result<T, ZaiError>>>),
    Waiter(watch::Receiver<Option<Result<T, ZaiError>>>),
}

/// Run-once-notify-many initialization guard.
///
/// The first caller becomes the leader and runs the init future; concurrent
/// callers await the same published outcome over a watch channel. A failed
/// init resets to idle so the next caller retries from scratch. At most one
/// init is in flight at any time.
pub struct SharedInit<T: Clone> {
    state: Mutex<InitState<T>>,
}

impl<T: Clone> Default for SharedInit<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> SharedInit<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InitState::Idle),
        }
    }

    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<T, ZaiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ZaiError>>,
    {
        let role = {
            let mut state = self.state.lock().await;
            match &*state {
                InitState::Ready(value) => return Ok(value.clone()),
                InitState::Pending(rx) => InitRole::Waiter(rx.clone()),
                InitState::Idle => {
                    let (tx, rx) = watch::channel(None);
                    *state = InitState::Pending(rx);
                    InitRole::Leader(tx)
                }
            }
        };

        match role {
            InitRole::Leader(tx) => {
                // Run the init without holding the lock so waiters can park.
                let outcome = init().await;
                {
                    let mut state = self.state.lock().await;
                    *state = match &outcome {
                        Ok(value) => InitState::Ready(value.clone()),
                        Err(_) => InitState::Idle,
                    };
                }
                let _ = tx.send(Some(outcome.clone()));
                outcome
            }
            InitRole::Waiter(mut rx) => loop {
                let published = rx.borrow().clone();
                if let Some(outcome) = published {
                    return outcome;
                }
                if rx.changed().await.is_err() {
                    // Leader dropped without publishing; clear the stale
                    // guard so the next caller can retry.
                    let mut state = self.state.lock().await;
                    if matches!(&*state, InitState::Pending(_)) {
                        *state = InitState::Idle;
                    }
                    return Err(ZaiError::Api {
                        message: "tool session initialization was interrupted".into(),
                        status: 500,
                    });
                }
            },
        }
    }

    /// Reset to idle, returning the ready value if there was one.
    pub async fn take(&self) -> Option<T> {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, InitState::Idle) {
            InitState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

// ---- Connected session ----

struct ConnectedServer {
    peer: Peer<RoleClient>,
    /// Cached tool list from this server
    tools: Vec<rmcp::model::Tool>,
    /// Keeping the RunningService alive keeps the transport (and any child
    /// process) alive; cancelling it closes the connection.
    service: RunningService<RoleClient, ClientInfo>,
}

/// A ready tool-chaining session: one live connection per bundle server.
pub struct ToolSession {
    servers: RwLock<HashMap<String, ConnectedServer>>,
}

fn client_info() -> ClientInfo {
    ClientInfo {
        meta: None,
        protocol_version: Default::default(),
        capabilities: Default::default(),
        client_info: rmcp::model::Implementation {
            name: "zai-cli".into(),
            title: Some("Z.AI CLI".into()),
            version: env!("CARGO_PKG_VERSION").into(),
            icons: None,
            website_url: None,
        },
    }
}

/// Classify an initialization failure from its description, mirroring how
/// the HTTP pipeline classifies: credential-looking messages are terminal
/// Auth failures, deadline and connectivity failures map to their kinds, and
/// everything else is a generic Api error.
fn classify_init_error(message: &str, timeout_ms: u64) -> ZaiError {
    let lower = message.to_lowercase();
    if lower.contains("401") || lower.contains("403") || lower.contains("auth") {
        ZaiError::Auth(format!("Authentication failed: {}", message))
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ZaiError::Timeout { ms: timeout_ms }
    } else if lower.contains("connection refused")
        || lower.contains("connect")
        || lower.contains("network")
    {
        ZaiError::Network(message.to_string())
    } else {
        ZaiError::Api {
            message: format!("Tool session initialization failed: {}", message),
            status: 500,
        }
    }
}

impl ToolSession {
    /// Connect to every server in the bundle. Any single failure aborts the
    /// whole registration; already-opened connections are dropped.
    async fn connect(configs: &[ToolServerConfig], timeout_ms: u64) -> Result<Self, ZaiError> {
        let mut servers = HashMap::new();
        for config in configs {
            let connected = Self::connect_one(config)
                .await
                .map_err(|msg| classify_init_error(&msg, timeout_ms))?;
            servers.insert(config.name.clone(), connected);
        }
        info!(count = servers.len(), "Tool session ready");
        Ok(Self {
            servers: RwLock::new(servers),
        })
    }

    async fn connect_one(config: &ToolServerConfig) -> Result<ConnectedServer, String> {
        let service = match &config.transport {
            ToolTransport::Stdio {
                command,
                args,
                env,
                cwd,
            } => {
                // Log the full command being spawned so users can audit what
                // runs on their machine.
                warn!(
                    server = %config.name,
                    command = %command,
                    args = ?args,
                    "Spawning tool server child process"
                );

                let mut cmd = Command::new(command);
                cmd.args(args);
                if let Some(cwd) = cwd {
                    cmd.current_dir(cwd);
                }
                for (key, value) in env {
                    cmd.env(key, value);
                }
                cmd.stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::null()); // Suppress server stderr

                let transport = TokioChildProcess::new(cmd)
                    .map_err(|e| format!("Failed to spawn tool server '{}': {}", config.name, e))?;

                serve_client(client_info(), transport)
                    .await
                    .map_err(|e| format!("Failed to initialize '{}': {}", config.name, e))?
            }
            ToolTransport::Http { url, bearer_token } => {
                info!(server = %config.name, url = %url, "Connecting to tool server");

                let transport_config = StreamableHttpClientTransportConfig::with_uri(url.as_str())
                    .auth_header(bearer_token.clone());
                let transport = StreamableHttpClientTransport::from_config(transport_config);

                serve_client(client_info(), transport)
                    .await
                    .map_err(|e| format!("Failed to initialize '{}': {}", config.name, e))?
            }
        };

        let peer = service.peer().clone();
        let tools = peer
            .list_all_tools()
            .await
            .map_err(|e| format!("Failed to list tools from '{}': {}", config.name, e))?;

        info!(server = %config.name, tool_count = tools.len(), "Connected to tool server");

        Ok(ConnectedServer {
            peer,
            tools,
            service,
        })
    }

    /// Call one tool with a hard deadline.
    async fn call(
        &self,
        server: &str,
        tool: &str,
        args: Value,
        timeout: Duration,
    ) -> Result<String, ZaiError> {
        let servers = self.servers.read().await;
        let entry = servers.get(server).ok_or_else(|| {
            let mut known: Vec<&str> = servers.keys().map(String::as_str).collect();
            known.sort_unstable();
            ZaiError::Validation(format!(
                "Unknown tool server '{}'. Registered: {}",
                server,
                known.join(", ")
            ))
        })?;

        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            _ => {
                return Err(ZaiError::Validation(
                    "Tool arguments must be a JSON object".into(),
                ));
            }
        };

        debug!(server = server, tool = tool, "Calling tool");

        let tool_name: std::borrow::Cow<'static, str> = tool.to_string().into();
        let result: CallToolResult = tokio::time::timeout(
            timeout,
            entry.peer.call_tool(CallToolRequestParams {
                meta: None,
                name: tool_name,
                arguments,
                task: None,
            }),
        )
        .await
        .map_err(|_| ZaiError::Timeout {
            ms: timeout.as_millis() as u64,
        })?
        .map_err(|e| ZaiError::Api {
            message: format!("Tool call failed: {}", e),
            status: 500,
        })?;

        let text: String = result
            .content
            .iter()
            .filter_map(|c| c.as_text().map(|t| t.text.to_string()))
            .collect::<Vec<_>>()
            .join("\n");

        if text.is_empty() {
            Ok("(empty result)".to_string())
        } else {
            Ok(text)
        }
    }

    /// Render every registered tool's interface, grouped per server.
    async fn interfaces(&self) -> String {
        let servers = self.servers.read().await;
        let mut names: Vec<&String> = servers.keys().collect();
        names.sort_unstable();

        let mut out = String::new();
        for name in names {
            let Some(server) = servers.get(name) else {
                continue;
            };
            out.push_str(&format!("## {}.{}\n", MCP_MANUAL_NAME, name));
            for tool in &server.tools {
                let schema = serde_json::to_value(tool.input_schema.as_ref())
                    .ok()
                    .and_then(|v| serde_json::to_string(&v).ok())
                    .unwrap_or_else(|| "{}".to_string());
                out.push_str(&format!(
                    "- {}: {}\n  input: {}\n",
                    tool.name,
                    tool.description.as_deref().unwrap_or("(no description)"),
                    schema
                ));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }

    /// Close every connection, cancelling transports (which also terminates
    /// any spawned child process).
    async fn shutdown(&self) {
        let mut servers = self.servers.write().await;
        for (name, server) in servers.drain() {
            info!(server = %name, "Disconnecting from tool server");
            let _ = server.service.cancel().await;
        }
    }
}

// ---- Client ----

/// Lazily-initialized tool-chaining client over the Z.AI bundle.
///
/// Initialization runs at most once at a time; concurrent callers share the
/// in-flight outcome, and a failure resets the state so the next call
/// retries from scratch.
pub struct CodeModeClient {
    servers: Vec<ToolServerConfig>,
    timeout_ms: u64,
    init: SharedInit<Arc<ToolSession>>,
}

impl CodeModeClient {
    pub fn new(config: &ZaiConfig, enable_vision: Option<bool>) -> Self {
        Self::from_servers(
            tool_bundle(config, |k| std::env::var(k).ok(), enable_vision),
            config.timeout_ms,
        )
    }

    pub fn from_servers(servers: Vec<ToolServerConfig>, timeout_ms: u64) -> Self {
        Self {
            servers,
            timeout_ms,
            init: SharedInit::new(),
        }
    }

    async fn session(&self) -> Result<Arc<ToolSession>, ZaiError> {
        self.init
            .get_or_init(|| async {
                let session = ToolSession::connect(&self.servers, self.timeout_ms).await?;
                Ok(Arc::new(session))
            })
            .await
    }

    /// Execute one tool against the registered bundle (default 30s deadline).
    pub async fn call_tool_chain(
        &self,
        server: &str,
        tool: &str,
        args: Value,
        timeout: Option<Duration>,
    ) -> Result<String, ZaiError> {
        let session = self.session().await?;
        session
            .call(server, tool, args, timeout.unwrap_or(DEFAULT_CALL_TIMEOUT))
            .await
    }

    /// List every registered tool's interface.
    pub async fn interfaces(&self) -> Result<String, ZaiError> {
        let session = self.session().await?;
        Ok(session.interfaces().await)
    }

    /// Tear down the session, racing the close against a grace timeout
    /// (default 2s). State is reset unconditionally so a stuck close never
    /// blocks process exit.
    pub async fn close(&self, grace: Option<Duration>) {
        if let Some(session) = self.init.take().await {
            let _ = tokio::time::timeout(
                grace.unwrap_or(DEFAULT_CLOSE_GRACE),
                session.shutdown(),
            )
            .await;
        }
    }
}
