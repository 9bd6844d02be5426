// src/lib.rs
// zai - Z.AI web search, page reading, and multimodal analysis

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod api;
pub mod cli;
pub mod code_mode;
pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod output;
pub use error::{Result, ZaiError};
