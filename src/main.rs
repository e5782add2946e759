//! ffstack CLI - build orchestrator for an FFmpeg media stack
//!
//! Entry point for the ffstack command-line application.

use anyhow::Result;
use clap::Parser;

use ffstack::cli::output::{display_error, OutputConfig};
use ffstack::cli::Cli;
use ffstack::error::{exit_code, PipelineError};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Apply output configuration globally
    let output_config = OutputConfig::new(cli.quiet, cli.json, cli.verbose);
    output_config.apply_global();

    // Logs go to stderr; RUST_LOG adds directives on top of the -v/-q level
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(output_config.log_level().into()),
        )
        .init();

    // Run the command and handle errors
    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            let code = e
                .downcast_ref::<PipelineError>()
                .map_or(exit_code::OTHER, PipelineError::exit_code);
            std::process::exit(code);
        }
    }
}
