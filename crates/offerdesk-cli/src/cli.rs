//! Command arguments and their handlers.
//!
//! Each command has a clap `Args` struct that converts into the matching
//! core parameter type, keeping clap out of `offerdesk-core`:
//!
//! ```text
//! User Input → CLI Args (clap) → Core Params → Assistant
//! ```
//!
//! [`Cli`] runs a parsed command and renders the result as markdown, or as
//! the JSON wire shapes when `--json` is given.

use std::{fs, path::PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use log::{debug, info};
use offerdesk_core::{
    display::Rows, params as core, Assistant, AssistantBuilder, DeskError, ErrorResponse,
    Explanation, Reply,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{args::Commands, renderer::TerminalRenderer};

/// Reads a `--plan` value: inline JSON, or `@path` for a file.
fn plan_text(value: &str) -> Result<String> {
    match value.strip_prefix('@') {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read plan file {path}"))
        }
        None => Ok(value.to_string()),
    }
}

/// Answer a question through the general plan grammar
#[derive(Args)]
pub struct AskArgs {
    /// The question, e.g. "How many students got placed in July 2025?"
    pub message: String,
    /// Include the model output, executed plan and compiled query
    #[arg(long)]
    pub debug: bool,
    /// Print the JSON reply instead of markdown
    #[arg(long)]
    pub json: bool,
    /// Replay this plan (JSON, or @file) instead of asking the model
    #[arg(long)]
    pub plan: Option<String>,
}

impl From<&AskArgs> for core::Ask {
    fn from(val: &AskArgs) -> Self {
        core::Ask {
            message: val.message.clone(),
            debug: val.debug,
        }
    }
}

/// Answer a question through the intent grammar
#[derive(Args)]
pub struct ChatArgs {
    /// The question, e.g. "bar graph of students placed in July 2025"
    pub message: String,
    /// Print the JSON reply instead of markdown
    #[arg(long)]
    pub json: bool,
    /// Replay this intent plan (JSON, or @file) instead of asking the model
    #[arg(long)]
    pub plan: Option<String>,
}

impl From<&ChatArgs> for core::Chat {
    fn from(val: &ChatArgs) -> Self {
        core::Chat {
            message: val.message.clone(),
        }
    }
}

/// Validate and compile a plan without executing it
#[derive(Args)]
pub struct ExplainArgs {
    /// Plan JSON in the general grammar, or @file
    #[arg(long)]
    pub plan: String,
    /// Question the plan answers; enables the wording-based repairs
    #[arg(short, long)]
    pub message: Option<String>,
    /// Print JSON instead of markdown
    #[arg(long)]
    pub json: bool,
}

impl ExplainArgs {
    fn into_params(self) -> Result<core::Explain> {
        Ok(core::Explain {
            plan: plan_text(&self.plan)?,
            message: self.message,
        })
    }
}

/// Offer count and first offers of one month
#[derive(Args)]
pub struct MonthArgs {
    #[arg(long)]
    pub year: i16,
    /// Month number, 1-12
    #[arg(long)]
    pub month: u8,
    /// Print JSON instead of markdown
    #[arg(long)]
    pub json: bool,
}

impl From<&MonthArgs> for core::MonthWindow {
    fn from(val: &MonthArgs) -> Self {
        core::MonthWindow {
            year: val.year,
            month: val.month,
        }
    }
}

/// Offers per month of one year
#[derive(Args)]
pub struct YearArgs {
    /// Defaults to the current year
    #[arg(long)]
    pub year: Option<i16>,
    /// Print JSON instead of markdown
    #[arg(long)]
    pub json: bool,
}

impl From<&YearArgs> for core::YearWindow {
    fn from(val: &YearArgs) -> Self {
        core::YearWindow { year: val.year }
    }
}

/// Load offers from a JSON file into the store
#[derive(Args)]
pub struct ImportArgs {
    /// JSON array of offer records
    pub file: PathBuf,
}

/// Run an aggregation pipeline from a JSON file
#[derive(Args)]
pub struct PipelineArgs {
    /// JSON array of stage documents
    pub file: PathBuf,
    /// Print JSON instead of markdown
    #[arg(long)]
    pub json: bool,
}

/// Runs commands against an assistant built on demand.
pub struct Cli {
    builder: AssistantBuilder,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(builder: AssistantBuilder, renderer: TerminalRenderer) -> Self {
        Self { builder, renderer }
    }

    async fn assistant(&self) -> Result<Assistant> {
        self.builder
            .clone()
            .build()
            .await
            .context("Failed to initialize assistant")
    }

    fn print_json<T: Serialize>(value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Prints the failure envelope and hands the error back for the exit
    /// status.
    fn report(&self, error: DeskError, json: bool) -> Result<()> {
        let response = ErrorResponse::from(&error);
        if json {
            Self::print_json(&response)?;
        } else {
            self.renderer.render(&response.to_string())?;
        }
        Err(anyhow!(error).context(format!("Request failed ({})", response.status)))
    }

    fn reply(&self, result: offerdesk_core::Result<Reply>, json: bool) -> Result<()> {
        match result {
            Ok(reply) if json => Self::print_json(&reply),
            Ok(reply) => self.renderer.render(&reply.to_string()),
            Err(error) => self.report(error, json),
        }
    }

    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Ask(args) => self.ask(args).await,
            Commands::Chat(args) => self.chat(args).await,
            Commands::Explain(args) => self.explain(args).await,
            Commands::Month(args) => self.month(args).await,
            Commands::Year(args) => self.year(args).await,
            Commands::Import(args) => self.import(args).await,
            Commands::Pipeline(args) => self.pipeline(args).await,
            Commands::Serve => Err(anyhow!("serve is handled by the binary entry point")),
        }
    }

    pub async fn ask(&self, args: AskArgs) -> Result<()> {
        let assistant = self.assistant().await?;
        let params = core::Ask::from(&args);
        let result = match &args.plan {
            Some(plan) => assistant.ask_with_plan(&params, &plan_text(plan)?).await,
            None => assistant.ask(&params).await,
        };
        self.reply(result, args.json)
    }

    pub async fn chat(&self, args: ChatArgs) -> Result<()> {
        let assistant = self.assistant().await?;
        let params = core::Chat::from(&args);
        let result = match &args.plan {
            Some(plan) => assistant.chat_with_plan(&params, &plan_text(plan)?).await,
            None => assistant.chat(&params).await,
        };
        self.reply(result, args.json)
    }

    pub async fn explain(&self, args: ExplainArgs) -> Result<()> {
        let assistant = self.assistant().await?;
        let json = args.json;
        let explanation = match assistant.explain(&args.into_params()?) {
            Ok(explanation) => explanation,
            Err(error) => return self.report(error, json),
        };
        if json {
            Self::print_json(&explanation_document(&explanation))
        } else {
            self.renderer.render(&explanation.to_string())
        }
    }

    pub async fn month(&self, args: MonthArgs) -> Result<()> {
        let report = self
            .assistant()
            .await?
            .month_report(&core::MonthWindow::from(&args))
            .await
            .context("Failed to build month report")?;
        if args.json {
            Self::print_json(&report)
        } else {
            self.renderer.render(&report.to_string())
        }
    }

    pub async fn year(&self, args: YearArgs) -> Result<()> {
        let report = self
            .assistant()
            .await?
            .year_report(&core::YearWindow::from(&args))
            .await
            .context("Failed to build year report")?;
        if args.json {
            Self::print_json(&report)
        } else {
            self.renderer.render(&report.to_string())
        }
    }

    pub async fn import(&self, args: ImportArgs) -> Result<()> {
        let store = self
            .builder
            .open_store()
            .await
            .context("Failed to open offer store")?;
        info!("Importing offers from {}", args.file.display());
        let summary = store
            .import_file(args.file)
            .await
            .context("Failed to import offers")?;
        self.renderer.render(&summary.to_string())
    }

    pub async fn pipeline(&self, args: PipelineArgs) -> Result<()> {
        let text = fs::read_to_string(&args.file)
            .with_context(|| format!("Failed to read pipeline file {}", args.file.display()))?;
        let pipeline: Value = serde_json::from_str(&text).context("Pipeline file is not JSON")?;
        debug!("Operator pipeline: {pipeline}");

        let rows = match self.assistant().await?.run_pipeline(&pipeline).await {
            Ok(rows) => rows,
            Err(error) => return self.report(error, args.json),
        };
        if args.json {
            Self::print_json(&rows)
        } else {
            self.renderer.render(&Rows(&rows).to_string())
        }
    }
}

fn explanation_document(explanation: &Explanation) -> Value {
    json!({
        "plan": explanation.plan.to_value(),
        "query": explanation.query.to_document(),
        "rankingOverride": explanation.ranking_override,
    })
}
