//! Offerdesk CLI Application
//!
//! Command-line interface and MCP server for the placement analytics
//! assistant.

mod args;
mod cli;
mod mcp;
mod renderer;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use args::{Args, Commands};
use clap::Parser;
use cli::{Cli, YearArgs};
use log::{info, warn};
use mcp::{run_stdio_server, OfferdeskMcpServer};
use offerdesk_core::{AssistantBuilder, GeminiOracle, Settings};
use renderer::TerminalRenderer;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let Args {
        database_file,
        catalog,
        no_color,
        gemini_api_key,
        gemini_model,
        max_time,
        oracle_timeout,
        command,
    } = Args::parse();

    let settings = Settings {
        max_time: Duration::from_secs(max_time),
        oracle_timeout: Duration::from_secs(oracle_timeout),
        ..Settings::default()
    };

    let mut builder = AssistantBuilder::new()
        .with_database_path(database_file)
        .with_catalog_path(catalog)
        .with_settings(settings);

    match gemini_api_key.filter(|key| !key.trim().is_empty()) {
        Some(key) => {
            let oracle = GeminiOracle::new(key, gemini_model, settings.oracle_timeout)
                .context("Failed to configure the Gemini client")?;
            builder = builder.with_oracle(Arc::new(oracle));
        }
        None => warn!("GEMINI_API_KEY is not set; only stored plans can be answered"),
    }

    let renderer = TerminalRenderer::new(!no_color);

    info!("Offerdesk started");

    match command {
        Some(Commands::Serve) => {
            let assistant = builder
                .build()
                .await
                .context("Failed to initialize assistant")?;
            info!("Starting Offerdesk MCP server");
            run_stdio_server(OfferdeskMcpServer::new(assistant))
                .await
                .context("MCP server failed")
        }
        Some(command) => Cli::new(builder, renderer).run(command).await,
        None => {
            Cli::new(builder, renderer)
                .year(YearArgs {
                    year: None,
                    json: false,
                })
                .await
        }
    }
}
