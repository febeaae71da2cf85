//! Markdown formatting of answers, reports and query artifacts.
//!
//! Everything here produces markdown, rendered to the terminal by the CLI
//! and returned verbatim as MCP tool content. Data types stay free of
//! presentation logic; their `Display` implementations live in this module:
//!
//! - [`answers`]: `Answer`, `Reply`, `Explanation` and `ErrorResponse`
//! - [`reports`]: month and year reports, import summaries
//! - [`table`]: the [`Rows`] table wrapper shared by all of the above
//! - [`datetime`]: instants on the civil clock
//!
//! ```rust
//! use offerdesk_core::{display::Rows, models::Answer};
//! use serde_json::json;
//!
//! let rows = vec![json!({"studentName": "Asha", "packageLPA": 9.5})];
//! assert!(Rows(&rows).to_string().contains("| Asha | 9.5 |"));
//! assert_eq!(Answer::text("12").to_string(), "12\n");
//! ```

pub mod answers;
pub mod datetime;
pub mod reports;
pub mod table;

pub use datetime::{CivilDate, CivilDateTime};
pub use table::Rows;
