//! Display implementations for window reports and import outcomes.

use std::fmt;

use super::{datetime::CivilDateTime, table::Rows};
use crate::{
    assistant::{MonthReport, YearReport},
    db::ImportSummary,
    time_window::month_name,
};

impl fmt::Display for MonthReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {} {}", month_name(self.month), self.year)?;
        writeln!(f)?;
        writeln!(
            f,
            "**Window**: {} to {} (end excluded)",
            CivilDateTime(&self.window.start),
            CivilDateTime(&self.window.end)
        )?;
        writeln!(f, "**Offers**: {}", self.count)?;
        if self.sample.is_empty() {
            return Ok(());
        }
        writeln!(f)?;
        writeln!(f, "## First {} offer(s)", self.sample.len())?;
        writeln!(f)?;
        write!(f, "{}", Rows(&self.sample))
    }
}

impl fmt::Display for YearReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Offers in {}", self.year)?;
        writeln!(f)?;
        if self.months.is_empty() {
            return writeln!(f, "No offers recorded.");
        }
        writeln!(f, "| Month | Offers |")?;
        writeln!(f, "|---|---|")?;
        for row in &self.months {
            writeln!(f, "| {} | {} |", month_name(row.month), row.count)?;
        }
        writeln!(f)?;
        writeln!(f, "**Total**: {}", self.total())
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Imported {} offer(s): {} new, {} updated.",
            self.inserted + self.updated,
            self.inserted,
            self.updated
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{assistant::MonthCount, time_window::month_range};

    #[test]
    fn test_month_report() {
        let report = MonthReport {
            year: 2025,
            month: 7,
            window: month_range(2025, 7).unwrap(),
            count: 1,
            sample: vec![json!({"studentName": "Asha", "companyName": "Acme"})],
        };
        let output = report.to_string();
        assert!(output.starts_with("# July 2025\n"));
        assert!(output.contains("2025-07-01 00:00 +05:30 to 2025-08-01 00:00 +05:30"));
        assert!(output.contains("**Offers**: 1"));
        assert!(output.contains("| Asha | Acme |"));
    }

    #[test]
    fn test_year_report() {
        let report = YearReport {
            year: 2025,
            months: vec![MonthCount { month: 7, count: 2 }],
        };
        let output = report.to_string();
        assert!(output.contains("| July | 2 |"));
        assert!(output.ends_with("**Total**: 2\n"));

        let empty = YearReport {
            year: 2024,
            months: vec![],
        };
        assert!(empty.to_string().contains("No offers recorded."));
    }

    #[test]
    fn test_import_summary() {
        let summary = ImportSummary {
            inserted: 2,
            updated: 1,
        };
        assert_eq!(
            summary.to_string(),
            "Imported 3 offer(s): 2 new, 1 updated.\n"
        );
    }
}
