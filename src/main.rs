// src/main.rs
// zai - Z.AI web search, page reading, and multimodal analysis

use clap::Parser;
use tracing_subscriber::EnvFilter;
use zai::cli::{Cli, run};
use zai::config::MissingApiKey;
use zai::error::format_error_output;
use zai::output::OutputMode;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // Logs go to stderr so stdout stays a clean data channel. Quiet unless
    // RUST_LOG says otherwise.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let mode = cli.output.unwrap_or_else(OutputMode::from_env);

    if let Err(err) = run(cli, mode).await {
        if err.downcast_ref::<MissingApiKey>().is_some() {
            eprintln!("{}", MissingApiKey.to_json());
            std::process::exit(MissingApiKey::EXIT_CODE);
        }
        eprintln!("{}", format_error_output(&err, mode));
        std::process::exit(1);
    }
}
