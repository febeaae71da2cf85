//! MCP server implementation for Offerdesk
//!
//! Exposes the assistant over the Model Context Protocol so that another
//! model can ask placement questions, inspect plans and pull window reports.

use std::future::Future;

use anyhow::Result;
use log::{error, info};
use offerdesk_core::Assistant;
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        GetPromptRequestParam, GetPromptResult, Implementation, ListPromptsResult,
        PaginatedRequestParam, ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler,
};
use tokio::signal::unix::{signal, SignalKind};

pub mod errors;
pub mod handlers;
pub mod prompts;

pub use handlers::{Ask, Chat, Explain, McpResult, MonthWindow, YearWindow};

const INSTRUCTIONS: &str = r#"Offerdesk answers questions about student placement offers.

## Tools
- `ask`: the main entry point. Pass a plain-language `message`; the answer is text, a list of rows or a chart description. Set `debug` to see the plan and compiled query.
- `chat`: the same question through a fixed set of intents (count, list, chart by student, monthly trend).
- `explain`: validate and compile a plan in the general grammar without running it.
- `month_report` / `year_report`: offer counts for one month, or per month of a year.

## Notes
- Months and years are calendar periods in India Standard Time (+05:30).
- Queries are read-only. Plans naming fields outside the catalog are rejected.
- Failed requests carry `{ok: false, error, raw?}` as error data; `raw` is the model output when its plan could not be used."#;

/// MCP server for Offerdesk
#[derive(Clone)]
pub struct OfferdeskMcpServer {
    assistant: Assistant,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl OfferdeskMcpServer {
    pub fn new(assistant: Assistant) -> Self {
        Self {
            assistant,
            tool_router: Self::tool_router(),
        }
    }

    fn handlers(&self) -> handlers::McpHandlers {
        handlers::McpHandlers::new(self.assistant.clone())
    }

    #[tool(
        name = "ask",
        description = "Answer a plain-language question about placement offers, e.g. 'How many students got placed in July 2025?' or 'Which company hired the most students?'. Returns a markdown answer followed by the JSON reply ({ok, type: text|list|chart, ...}). Set debug=true to include the model output, the executed plan and the compiled query."
    )]
    async fn ask(&self, params: Parameters<Ask>) -> McpResult {
        self.handlers().ask(params).await
    }

    #[tool(
        name = "chat",
        description = "Answer a question through the intent grammar: counts, lists, a bar chart of students and packages, or the monthly trend for a year. Missing months and years are taken from the question."
    )]
    async fn chat(&self, params: Parameters<Chat>) -> McpResult {
        self.handlers().chat(params).await
    }

    #[tool(
        name = "explain",
        description = "Validate a plan in the general grammar (kind, filters, timeRange, groupBy, metrics, sort, limit, projection, chart), apply the wording-based repairs for an optional message, and return the plan and compiled query without executing it."
    )]
    async fn explain(&self, params: Parameters<Explain>) -> McpResult {
        self.handlers().explain(params).await
    }

    #[tool(
        name = "month_report",
        description = "Offer count and the first ten offers of one calendar month (year, month 1-12), computed on the India Standard Time calendar."
    )]
    async fn month_report(&self, params: Parameters<MonthWindow>) -> McpResult {
        self.handlers().month_report(params).await
    }

    #[tool(
        name = "year_report",
        description = "Offers per calendar month for a year; defaults to the current year."
    )]
    async fn year_report(&self, params: Parameters<YearWindow>) -> McpResult {
        self.handlers().year_report(params).await
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for OfferdeskMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }

    async fn list_prompts(
        &self,
        request: Option<PaginatedRequestParam>,
        context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        self.handlers().list_prompts(request, context).await
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        self.handlers().get_prompt(request, context).await
    }
}

/// Resolves with the name of the first termination signal received.
async fn shutdown_signal() -> std::io::Result<&'static str> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let name = tokio::select! {
        _ = sigint.recv() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    };
    Ok(name)
}

/// Serves the assistant over stdio until the client disconnects or the
/// process is asked to stop.
pub async fn run_stdio_server(server: OfferdeskMcpServer) -> Result<()> {
    use rmcp::{transport::stdio, ServiceExt};

    info!(
        "Starting Offerdesk MCP server on stdio ({} tools, {} prompts)",
        server.tool_router.list_all().len(),
        prompts::PROMPT_TEMPLATES.len()
    );

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| error!("Failed to start MCP service: {e:?}"))?;

    tokio::select! {
        result = service.waiting() => match result {
            Ok(reason) => info!("MCP session ended: {reason:?}"),
            Err(e) => error!("MCP session failed: {e:?}"),
        },
        signal = shutdown_signal() => {
            info!("Received {}, shutting down", signal?);
        }
    }

    Ok(())
}
