//! Markdown rendering of answers and the envelopes around them.

use std::fmt;

use serde_json::Value;

use super::table::Rows;
use crate::{
    assistant::Explanation,
    models::{Answer, DebugInfo, ErrorResponse, Reply},
};

fn json_block(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    let pretty = serde_json::to_string_pretty(value).map_err(|_| fmt::Error)?;
    writeln!(f, "```json")?;
    writeln!(f, "{pretty}")?;
    writeln!(f, "```")
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { text, data } => {
                writeln!(f, "{text}")?;
                if let Some(rows) = data.as_ref().filter(|rows| !rows.is_empty()) {
                    writeln!(f)?;
                    write!(f, "{}", Rows(rows))?;
                }
                Ok(())
            }
            Self::List { rows } => {
                writeln!(f, "**{} result(s)**", rows.len())?;
                writeln!(f)?;
                write!(f, "{}", Rows(rows))
            }
            Self::Chart {
                chart,
                data,
                summary,
                unit,
            } => {
                if let Some(summary) = summary {
                    writeln!(f, "{summary}")?;
                    writeln!(f)?;
                }
                write!(
                    f,
                    "**{} chart**: {} by {}",
                    chart.kind,
                    chart.y_keys.join(", "),
                    chart.x_key
                )?;
                match unit {
                    Some(unit) => writeln!(f, " ({unit})")?,
                    None => writeln!(f)?,
                }
                writeln!(f)?;
                write!(f, "{}", Rows(data))
            }
        }
    }
}

impl fmt::Display for DebugInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Debug")?;
        writeln!(f)?;
        writeln!(f, "### Model output")?;
        writeln!(f, "```")?;
        writeln!(f, "{}", self.raw.trim_end())?;
        writeln!(f, "```")?;
        writeln!(f, "### Plan")?;
        json_block(f, &self.plan)?;
        if let Some(filter) = &self.filter {
            writeln!(f, "### Match")?;
            json_block(f, filter)?;
        }
        if let Some(pipeline) = &self.pipeline {
            writeln!(f, "### Pipeline")?;
            json_block(f, pipeline)?;
        }
        Ok(())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.answer)?;
        if let Some(debug) = &self.debug {
            writeln!(f)?;
            write!(f, "{debug}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Plan")?;
        writeln!(f)?;
        if self.ranking_override {
            writeln!(f, "_Replaced by the top-company ranking plan._")?;
            writeln!(f)?;
        }
        json_block(f, &self.plan.to_value())?;
        writeln!(f)?;
        writeln!(f, "# Query")?;
        writeln!(f)?;
        json_block(f, &self.query.to_document())
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "**Error ({})**: {}", self.status, self.error)?;
        if let Some(raw) = &self.raw {
            writeln!(f)?;
            writeln!(f, "Model output:")?;
            writeln!(f, "```")?;
            writeln!(f, "{}", raw.trim_end())?;
            writeln!(f, "```")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{error::DeskError, models::ChartDescriptor, plan::ChartKind};

    #[test]
    fn test_text_answer() {
        assert_eq!(Answer::text("12").to_string(), "12\n");
    }

    #[test]
    fn test_list_answer() {
        let answer = Answer::list(vec![json!({"studentName": "Asha"})]);
        assert_eq!(
            answer.to_string(),
            "**1 result(s)**\n\n| studentName |\n|---|\n| Asha |\n"
        );
    }

    #[test]
    fn test_chart_answer() {
        let answer = Answer::Chart {
            chart: ChartDescriptor {
                kind: ChartKind::Bar,
                x_key: "studentName".to_string(),
                y_keys: vec!["packageLPA".to_string()],
            },
            data: vec![json!({"studentName": "Asha", "packageLPA": 9.5})],
            summary: Some("1 student placed in July 2025.".to_string()),
            unit: Some("LPA".to_string()),
        };
        let output = answer.to_string();
        assert!(output.starts_with("1 student placed in July 2025.\n\n"));
        assert!(output.contains("**bar chart**: packageLPA by studentName (LPA)"));
        assert!(output.contains("| Asha | 9.5 |"));
    }

    #[test]
    fn test_reply_with_debug() {
        let reply = Reply::new(Answer::text("3")).with_debug(Some(DebugInfo {
            raw: "{\"kind\":\"count\"}".to_string(),
            plan: json!({"kind": "count"}),
            filter: Some(json!({})),
            pipeline: None,
        }));
        let output = reply.to_string();
        assert!(output.starts_with("3\n\n## Debug"));
        assert!(output.contains("### Match"));
        assert!(!output.contains("### Pipeline"));
    }

    #[test]
    fn test_error_response() {
        let error = DeskError::upstream("not json", "Plan JSON invalid", vec![]);
        let output = ErrorResponse::from(&error).to_string();
        assert_eq!(
            output,
            "**Error (400)**: Plan JSON invalid\n\nModel output:\n```\nnot json\n```\n"
        );
    }
}
