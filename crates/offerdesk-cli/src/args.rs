use std::path::PathBuf;

use clap::{Parser, Subcommand};
use offerdesk_core::oracle::DEFAULT_MODEL;

use crate::cli::{
    AskArgs, ChatArgs, ExplainArgs, ImportArgs, MonthArgs, PipelineArgs, YearArgs,
};

/// Ask questions about placement offers in plain language
///
/// Offerdesk turns a question into a structured query plan with a generative
/// model, checks the plan against the field catalog, compiles it to a
/// read-only query and runs it against the local offer store. It runs as a
/// command-line tool or as an MCP (Model Context Protocol) server.
#[derive(Parser)]
#[command(version, about, name = "offerdesk")]
pub struct Args {
    /// Path to the SQLite database file. Defaults to
    /// $XDG_DATA_HOME/offerdesk/offerdesk.db
    #[arg(long, global = true)]
    pub database_file: Option<PathBuf>,

    /// Field catalog JSON to use instead of the built-in one
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    /// API key for the Gemini model; without it only stored plans can run
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name
    #[arg(long, global = true, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub gemini_model: String,

    /// Seconds a single store execution may take
    #[arg(long, global = true, default_value_t = 10)]
    pub max_time: u64,

    /// Seconds to wait for the model
    #[arg(long, global = true, default_value_t = 30)]
    pub oracle_timeout: u64,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands for the Offerdesk CLI
///
/// - `ask` / `chat`: answer a question through either plan grammar
/// - `explain`: compile a plan without running it
/// - `month` / `year`: window reports straight from the store
/// - `import` / `pipeline`: operator access to the store
/// - `serve`: start the MCP server
#[derive(Subcommand)]
pub enum Commands {
    /// Answer a question through the general plan grammar
    #[command(alias = "a")]
    Ask(AskArgs),
    /// Answer a question through the intent grammar
    #[command(alias = "c")]
    Chat(ChatArgs),
    /// Validate and compile a plan without executing it
    #[command(alias = "e")]
    Explain(ExplainArgs),
    /// Offer count and first offers of one month
    Month(MonthArgs),
    /// Offers per month of one year
    Year(YearArgs),
    /// Load offers from a JSON file into the store
    Import(ImportArgs),
    /// Run an aggregation pipeline from a JSON file
    Pipeline(PipelineArgs),
    /// Start the MCP server
    Serve,
}
