// src/output.rs
// Response envelopes and console rendering

use chrono::Utc;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::{Value, json};

/// How command results are written to stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputMode {
    /// Raw data: strings verbatim, everything else as compact JSON
    #[default]
    Data,
    /// Single-line `{success, data, timestamp}` envelope
    Json,
    /// Same envelope, 2-space indented
    Pretty,
}

impl OutputMode {
    /// Resolve from an env lookup (`ZAI_OUTPUT_MODE`); unknown values fall
    /// back to data mode.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        match get("ZAI_OUTPUT_MODE").as_deref() {
            Some("json") => OutputMode::Json,
            Some("pretty") => OutputMode::Pretty,
            _ => OutputMode::Data,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }
}

/// Build the success envelope `{success:true, data, timestamp}`.
pub fn success_envelope(data: Value) -> Value {
    json!({
        "success": true,
        "data": data,
        "timestamp": Utc::now().timestamp_millis(),
    })
}

fn render(value: &Value, mode: OutputMode) -> String {
    let rendered = if mode == OutputMode::Pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    rendered.unwrap_or_else(|_| "null".to_string())
}

/// Serialize a success result for stdout according to the output mode.
///
/// Data mode unwraps the envelope: bare strings print verbatim so command
/// output stays pipeable; anything else prints as compact JSON.
pub fn render_success<T: Serialize>(data: &T, mode: OutputMode) -> String {
    let value = serde_json::to_value(data).unwrap_or(Value::Null);
    match mode {
        OutputMode::Data => match value {
            Value::String(s) => s,
            other => render(&other, mode),
        },
        _ => render(&success_envelope(value), mode),
    }
}

/// Print a success result to stdout.
pub fn print_success<T: Serialize>(data: &T, mode: OutputMode) {
    println!("{}", render_success(data, mode));
}
