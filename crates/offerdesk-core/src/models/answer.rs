//! Answers and the wire envelopes they travel in.

use serde::Serialize;
use serde_json::Value;

use crate::{error::DeskError, plan::ChartKind};

/// Axis description of a chart answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDescriptor {
    pub kind: ChartKind,
    pub x_key: String,
    pub y_keys: Vec<String>,
}

/// The result of one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Answer {
    /// A sentence or a bare number
    Text {
        text: String,
        /// Rows the sentence was derived from
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Vec<Value>>,
    },
    /// Matching documents or raw aggregate rows
    List { rows: Vec<Value> },
    /// Rows shaped for a chart
    Chart {
        chart: ChartDescriptor,
        data: Vec<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
    },
}

impl Answer {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            data: None,
        }
    }

    pub fn list(rows: Vec<Value>) -> Self {
        Self::List { rows }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::List { .. } => "list",
            Self::Chart { .. } => "chart",
        }
    }
}

/// Intermediate artifacts attached to a reply when debugging is requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugInfo {
    /// Model text as received
    pub raw: String,
    /// Plan after post-processing, as executed
    pub plan: Value,
    #[serde(rename = "match", skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Value>,
}

/// Successful response envelope: `{ok: true, type, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub ok: bool,
    #[serde(flatten)]
    pub answer: Answer,
    #[serde(rename = "_debug", skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl Reply {
    pub fn new(answer: Answer) -> Self {
        Self {
            ok: true,
            answer,
            debug: None,
        }
    }

    pub fn with_debug(mut self, debug: Option<DebugInfo>) -> Self {
        self.debug = debug;
        self
    }
}

/// Failure envelope: `{ok: false, error, raw?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
    /// Model text, only for plans that failed to parse or validate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip)]
    pub status: u16,
}

impl From<&DeskError> for ErrorResponse {
    fn from(error: &DeskError) -> Self {
        Self {
            ok: false,
            error: error.to_string(),
            raw: error.raw().map(str::to_string),
            status: error.status_code(),
        }
    }
}
