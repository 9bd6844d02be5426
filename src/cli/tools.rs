// src/cli/tools.rs
// Tools command: inspect and call the MCP tool bundle

use super::ToolsAction;
use crate::code_mode::CodeModeClient;
use crate::config::ZaiConfig;
use crate::error::ZaiError;
use crate::output::{OutputMode, print_success};
use serde_json::Value;
use std::time::Duration;

pub async fn run(config: &ZaiConfig, action: ToolsAction, mode: OutputMode) -> anyhow::Result<()> {
    let client = CodeModeClient::new(config, None);

    let result = match action {
        ToolsAction::Interfaces => client.interfaces().await,
        ToolsAction::Call {
            server,
            tool,
            args,
            timeout,
        } => match parse_tool_args(args.as_deref()) {
            Ok(args) => {
                client
                    .call_tool_chain(&server, &tool, args, timeout.map(Duration::from_secs))
                    .await
            }
            Err(err) => Err(err),
        },
    };

    // Always tear the session down, even on failure.
    client.close(None).await;

    let text = result?;
    print_success(&text, mode);
    Ok(())
}

fn parse_tool_args(raw: Option<&str>) -> Result<Value, ZaiError> {
    match raw {
        None => Ok(Value::Null),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ZaiError::Validation(format!("Tool arguments must be valid JSON: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_args_are_null() {
        assert_eq!(parse_tool_args(None).unwrap(), Value::Null);
    }

    #[test]
    fn test_object_args_parse() {
        let args = parse_tool_args(Some(r#"{"query":"rust"}"#)).unwrap();
        assert_eq!(args["query"], "rust");
    }

    #[test]
    fn test_malformed_args_are_validation_error() {
        let err = parse_tool_args(Some("{not json")).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
