//! Error handling utilities for MCP server

use offerdesk_core::{DeskError, ErrorResponse};
use rmcp::ErrorData;

/// Maps an assistant error to an MCP error carrying the wire failure
/// envelope as data. Caller mistakes become `invalid_params`.
pub fn to_mcp_error(error: &DeskError) -> ErrorData {
    let response = ErrorResponse::from(error);
    let data = serde_json::to_value(&response).ok();
    if response.status == 400 {
        ErrorData::invalid_params(response.error, data)
    } else {
        ErrorData::internal_error(response.error, data)
    }
}
