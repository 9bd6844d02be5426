// src/cli/mod.rs
// CLI surface for zai commands

use clap::{Parser, Subcommand};

pub mod describe;
pub mod read;
pub mod search;
pub mod tools;

use crate::api::ZaiClient;
use crate::api::types::{
    ContentSize, ReadParams, RecencyFilter, ReturnFormat, SearchLocation, SearchParams,
};
use crate::config::ZaiConfig;
use crate::output::OutputMode;

#[derive(Parser)]
#[command(name = "zai")]
#[command(about = "Web search, page reading, and multimodal analysis via the Z.AI API")]
#[command(version)]
pub struct Cli {
    /// Output rendering: raw data, JSON envelope, or pretty JSON
    #[arg(long, global = true, value_enum)]
    pub output: Option<OutputMode>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search the web
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        count: Option<u32>,

        /// Restrict results to a domain (e.g. github.com)
        #[arg(long)]
        domain: Option<String>,

        /// Freshness window
        #[arg(long, value_enum)]
        recency: Option<RecencyFilter>,

        /// Per-result summary length
        #[arg(long, value_enum)]
        content_size: Option<ContentSize>,

        /// Region bias
        #[arg(long, value_enum)]
        location: Option<SearchLocation>,
    },

    /// Fetch a web page and convert it for reading
    Read {
        /// Page URL (http:// or https://)
        url: String,

        /// Conversion format
        #[arg(long, value_enum)]
        format: Option<ReturnFormat>,

        /// Strip images from the converted page
        #[arg(long)]
        no_images: bool,

        /// Append a summary of the page's links
        #[arg(long)]
        with_links: bool,

        /// Bypass the reader cache
        #[arg(long)]
        no_cache: bool,

        /// Reader-side fetch timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Analyze an image or video with the vision model
    Describe {
        /// Local file path or http(s) URL
        source: String,

        /// Instruction for the model
        #[arg(short, long)]
        prompt: Option<String>,

        /// Treat the source as video
        #[arg(long)]
        video: bool,
    },

    /// Inspect and invoke the MCP tool bundle
    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },
}

#[derive(Subcommand)]
pub enum ToolsAction {
    /// List every registered tool's interface
    Interfaces,

    /// Call one tool with JSON arguments
    Call {
        /// Server name (search, reader, zread, vision)
        #[arg(index = 1)]
        server: String,

        /// Tool name
        #[arg(index = 2)]
        tool: String,

        /// JSON object of tool arguments (e.g. '{"query": "rust"}')
        #[arg(index = 3)]
        args: Option<String>,

        /// Call deadline in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Resolve configuration and dispatch the parsed command.
pub async fn run(cli: Cli, mode: OutputMode) -> anyhow::Result<()> {
    let config = ZaiConfig::from_env()?;

    match cli.command {
        Commands::Search {
            query,
            count,
            domain,
            recency,
            content_size,
            location,
        } => {
            let client = ZaiClient::new(config);
            let params = SearchParams {
                query,
                count,
                domain_filter: domain,
                recency_filter: recency,
                content_size,
                location,
            };
            search::run(&client, params, mode).await
        }
        Commands::Read {
            url,
            format,
            no_images,
            with_links,
            no_cache,
            timeout,
        } => {
            let client = ZaiClient::new(config);
            let params = ReadParams {
                url,
                format,
                retain_images: Some(!no_images),
                with_links_summary: Some(with_links),
                timeout,
                no_cache: no_cache.then_some(true),
            };
            read::run(&client, params, mode).await
        }
        Commands::Describe {
            source,
            prompt,
            video,
        } => {
            let client = ZaiClient::new(config);
            describe::run(&client, &source, prompt, video, mode).await
        }
        Commands::Tools { action } => tools::run(&config, action, mode).await,
    }
}
