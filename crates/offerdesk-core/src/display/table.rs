//! Markdown tables over JSON rows.

use std::fmt;

use jiff::Timestamp;
use serde_json::Value;

use super::datetime::CivilDate;

/// Newtype wrapper rendering result rows as a markdown table.
///
/// Columns are the union of the rows' keys in order of first appearance;
/// `_id` is left out. Instants render as civil dates, missing values as `-`.
pub struct Rows<'a>(pub &'a [Value]);

impl Rows<'_> {
    fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for row in self.0 {
            if let Value::Object(map) = row {
                for key in map.keys() {
                    if key != "_id" && !columns.contains(&key.as_str()) {
                        columns.push(key);
                    }
                }
            }
        }
        columns
    }
}

/// One table cell; pipes are escaped so they cannot split the row.
pub fn cell(value: Option<&Value>) -> String {
    let text = match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(text)) => match text.parse::<Timestamp>() {
            Ok(instant) => CivilDate(&instant).to_string(),
            Err(_) => text.clone(),
        },
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    };
    text.replace('|', "\\|")
}

impl fmt::Display for Rows<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No matching offers.");
        }
        let columns = self.columns();
        if columns.is_empty() {
            return writeln!(f, "{} row(s) with no fields.", self.0.len());
        }

        writeln!(f, "| {} |", columns.join(" | "))?;
        writeln!(
            f,
            "|{}",
            columns.iter().map(|_| "---|").collect::<String>()
        )?;
        for row in self.0 {
            let cells: Vec<String> = columns.iter().map(|c| cell(row.get(*c))).collect();
            writeln!(f, "| {} |", cells.join(" | "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_rows_table() {
        let rows = vec![
            json!({"_id": "x", "studentName": "Asha", "offerDate": "2025-06-30T18:30:00Z"}),
            json!({"studentName": "Ravi | K", "packageLPA": 9.5}),
        ];
        let output = Rows(&rows).to_string();
        assert_eq!(
            output,
            "| studentName | offerDate | packageLPA |\n\
             |---|---|---|\n\
             | Asha | 2025-07-01 | - |\n\
             | Ravi \\| K | - | 9.5 |\n"
        );
    }

    #[test]
    fn test_empty_rows() {
        assert_eq!(Rows(&[]).to_string(), "No matching offers.\n");
    }
}
