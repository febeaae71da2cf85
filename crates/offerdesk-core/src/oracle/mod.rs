//! The generative model that turns a question into plan JSON.
//!
//! Whatever comes back is untrusted text; callers always pass it through
//! [`crate::plan::parse_universal`] or [`crate::plan::parse_legacy`].

use async_trait::async_trait;

use crate::error::Result;

mod gemini;
mod instructions;

pub use gemini::{GeminiOracle, DEFAULT_MODEL, GEMINI_BASE_URL};
pub use instructions::{legacy_instructions, universal_instructions, UniversalInstructions};

/// Text in, hopefully-JSON text out.
#[async_trait]
pub trait PlanOracle: Send + Sync {
    async fn generate(&self, instructions: &str, message: &str) -> Result<String>;
}

/// Oracle that always answers with the same text. Used to replay a stored
/// plan without calling a model.
#[derive(Debug, Clone)]
pub struct StaticOracle {
    response: String,
}

impl StaticOracle {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

#[async_trait]
impl PlanOracle for StaticOracle {
    async fn generate(&self, _instructions: &str, _message: &str) -> Result<String> {
        Ok(self.response.clone())
    }
}

/// Oracle for setups with no model configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredOracle;

#[async_trait]
impl PlanOracle for UnconfiguredOracle {
    async fn generate(&self, _instructions: &str, _message: &str) -> Result<String> {
        Err(crate::error::DeskError::Oracle {
            message: "no model configured; set GEMINI_API_KEY or pass --plan".to_string(),
        })
    }
}
