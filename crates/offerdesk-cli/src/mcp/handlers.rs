//! MCP tool handlers implementation

use log::debug;
use offerdesk_core::{params as core, Assistant, Reply};
use rmcp::{
    handler::server::wrapper::Parameters,
    model::{
        CallToolResult, Content, GetPromptRequestParam, GetPromptResult, ListPromptsResult,
        PaginatedRequestParam, PromptMessage, PromptMessageContent, PromptMessageRole,
    },
    service::RequestContext,
    ErrorData as McpError, RoleServer,
};
use schemars::JsonSchema;
use serde::Deserialize;

use super::{errors::to_mcp_error, prompts::{PromptTemplate, PROMPT_TEMPLATES}};

/// Generic MCP wrapper for core parameter types with serde integration
///
/// Core parameter types stay free of rmcp; this transparent wrapper gives
/// them the deserialization and schema the tool router needs.
#[derive(Debug, Deserialize)]
#[serde(transparent)]
pub struct McpParams<T>(T)
where
    T: JsonSchema;

impl<T> JsonSchema for McpParams<T>
where
    T: JsonSchema,
{
    fn schema_name() -> std::borrow::Cow<'static, str> {
        T::schema_name()
    }

    fn json_schema(g: &mut schemars::SchemaGenerator) -> schemars::Schema {
        T::json_schema(g)
    }
}

impl<T> AsRef<T> for McpParams<T>
where
    T: JsonSchema,
{
    fn as_ref(&self) -> &T {
        &self.0
    }
}

pub type Ask = McpParams<core::Ask>;
pub type Chat = McpParams<core::Chat>;
pub type Explain = McpParams<core::Explain>;
pub type MonthWindow = McpParams<core::MonthWindow>;
pub type YearWindow = McpParams<core::YearWindow>;

pub type McpResult = Result<CallToolResult, McpError>;

fn markdown_result(document: &impl std::fmt::Display) -> McpResult {
    Ok(CallToolResult::success(vec![Content::text(document.to_string())]))
}

/// Markdown for people, the wire JSON for programs.
fn reply_result(reply: &Reply) -> McpResult {
    let json = serde_json::to_string(reply)
        .map_err(|e| McpError::internal_error(format!("Failed to encode reply: {e}"), None))?;
    Ok(CallToolResult::success(vec![
        Content::text(reply.to_string()),
        Content::text(json),
    ]))
}

/// Handler implementations for the MCP server
pub struct McpHandlers {
    assistant: Assistant,
}

impl McpHandlers {
    pub fn new(assistant: Assistant) -> Self {
        Self { assistant }
    }

    pub async fn ask(&self, Parameters(params): Parameters<Ask>) -> McpResult {
        debug!("ask: {:?}", params);

        let reply = self
            .assistant
            .ask(params.as_ref())
            .await
            .map_err(|e| to_mcp_error(&e))?;
        reply_result(&reply)
    }

    pub async fn chat(&self, Parameters(params): Parameters<Chat>) -> McpResult {
        debug!("chat: {:?}", params);

        let reply = self
            .assistant
            .chat(params.as_ref())
            .await
            .map_err(|e| to_mcp_error(&e))?;
        reply_result(&reply)
    }

    pub async fn explain(&self, Parameters(params): Parameters<Explain>) -> McpResult {
        debug!("explain: {:?}", params);

        let explanation = self
            .assistant
            .explain(params.as_ref())
            .map_err(|e| to_mcp_error(&e))?;
        markdown_result(&explanation)
    }

    pub async fn month_report(&self, Parameters(params): Parameters<MonthWindow>) -> McpResult {
        debug!("month_report: {:?}", params);

        let report = self
            .assistant
            .month_report(params.as_ref())
            .await
            .map_err(|e| to_mcp_error(&e))?;
        markdown_result(&report)
    }

    pub async fn year_report(&self, Parameters(params): Parameters<YearWindow>) -> McpResult {
        debug!("year_report: {:?}", params);

        let report = self
            .assistant
            .year_report(params.as_ref())
            .await
            .map_err(|e| to_mcp_error(&e))?;
        markdown_result(&report)
    }

    /// List all available prompts
    pub async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        debug!("list_prompts");

        let prompts = PROMPT_TEMPLATES
            .iter()
            .map(PromptTemplate::to_prompt)
            .collect();

        Ok(ListPromptsResult {
            next_cursor: None,
            prompts,
        })
    }

    /// Get a specific prompt by name and apply arguments
    pub async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        debug!("get_prompt: {}", request.name);

        let template = PromptTemplate::find(&request.name)
            .ok_or_else(|| McpError::invalid_params("Prompt not found", None))?;
        let prompt_text = template
            .render(request.arguments.as_ref())
            .map_err(|message| McpError::invalid_params(message, None))?;

        Ok(GetPromptResult {
            description: Some(template.description.clone()),
            messages: vec![PromptMessage {
                role: PromptMessageRole::User,
                content: PromptMessageContent::text(prompt_text),
            }],
        })
    }
}
