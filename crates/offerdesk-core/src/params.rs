//! Parameter structures for offerdesk operations.
//!
//! Shared by every interface (CLI, MCP) without framework-specific derives.
//! Interface layers wrap these with their own derives and convert into them;
//! JSON schemas for MCP tools are available behind the `schema` feature.

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    error::{DeskError, Result},
    plan::YEAR_RANGE,
};

/// A natural-language question for the general assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Ask {
    /// The question, e.g. "How many students got placed in July 2025?"
    pub message: String,
    /// Attach the model text, executed plan and compiled query to the reply
    #[serde(default)]
    pub debug: bool,
}

/// A question for the intent-based chat assistant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Chat {
    /// The question, e.g. "bar graph of students placed in July 2025 and their package"
    pub message: String,
}

/// A plan to compile without executing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Explain {
    /// Plan JSON in the general grammar
    pub plan: String,
    /// Question the plan answers; enables the wording-based repairs
    pub message: Option<String>,
}

/// One civil month, for the month debug report.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct MonthWindow {
    pub year: i16,
    /// 1-12
    pub month: u8,
}

impl MonthWindow {
    pub fn validate(&self) -> Result<()> {
        validate_year(self.year)?;
        if !(1..=12).contains(&self.month) {
            return Err(DeskError::invalid_input("month").with_reason(format!(
                "Month must be between 1 and 12, got {}",
                self.month
            )));
        }
        Ok(())
    }
}

/// One civil year, for the per-month report. Defaults to the current year.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct YearWindow {
    pub year: Option<i16>,
}

fn validate_year(year: i16) -> Result<()> {
    if YEAR_RANGE.contains(&i64::from(year)) {
        Ok(())
    } else {
        Err(DeskError::invalid_input("year").with_reason(format!(
            "Year must be between {} and {}, got {year}",
            YEAR_RANGE.start(),
            YEAR_RANGE.end()
        )))
    }
}

impl YearWindow {
    pub fn validate(&self) -> Result<()> {
        match self.year {
            Some(year) => validate_year(year),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_window_validate() {
        assert!(MonthWindow { year: 2025, month: 7 }.validate().is_ok());

        let err = MonthWindow { year: 2025, month: 13 }.validate().unwrap_err();
        assert!(matches!(err, DeskError::InvalidInput { ref field, .. } if field == "month"));

        let err = MonthWindow { year: 0, month: 1 }.validate().unwrap_err();
        assert!(matches!(err, DeskError::InvalidInput { ref field, .. } if field == "year"));
    }

    #[test]
    fn test_year_window_defaults_are_valid() {
        assert!(YearWindow::default().validate().is_ok());
        assert!(YearWindow { year: Some(-5) }.validate().is_err());
    }

    #[test]
    fn test_ask_debug_defaults_to_false() {
        let ask: Ask = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(!ask.debug);
    }
}
