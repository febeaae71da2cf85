//! Core library for the Offerdesk placement analytics assistant.
//!
//! A question in plain language goes to a model that answers with a plan: a
//! small JSON document naming filters, groupings, metrics and a time range.
//! The plan is validated, repaired with a few message heuristics, checked
//! against the field catalog, compiled to a read-only query and executed
//! against the offer store. The result comes back as text, a list of rows or
//! a chart description.
//!
//! Two plan grammars are supported:
//!
//! - the general grammar ([`plan::UniversalPlan`]), answered by
//!   [`Assistant::ask`]
//! - the four-intent grammar ([`plan::Plan`]), answered by
//!   [`Assistant::chat`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use offerdesk_core::{params::Ask, AssistantBuilder, StaticOracle};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let assistant = AssistantBuilder::new()
//!     .with_database_path(Some("offers.db"))
//!     .with_oracle(Arc::new(StaticOracle::new(r#"{"kind":"count"}"#)))
//!     .build()
//!     .await?;
//!
//! let reply = assistant
//!     .ask(&Ask {
//!         message: "How many students were placed?".to_string(),
//!         debug: false,
//!     })
//!     .await?;
//! println!("{reply}");
//! # Ok(())
//! # }
//! ```

pub mod assistant;
pub mod catalog;
pub mod db;
pub mod display;
pub mod error;
pub mod infer;
pub mod models;
pub mod oracle;
pub mod params;
pub mod plan;
pub mod query;
pub mod store;
pub mod time_window;

// Re-export commonly used types
pub use assistant::{Assistant, AssistantBuilder, Explanation, Settings};
pub use catalog::FieldCatalog;
pub use db::ImportSummary;
pub use error::{DeskError, Result};
pub use models::{Answer, ErrorResponse, Reply};
pub use oracle::{GeminiOracle, PlanOracle, StaticOracle, UnconfiguredOracle};
pub use params::{Ask, Chat, Explain, MonthWindow, YearWindow};
pub use store::{AggregateOptions, FindOptions, OfferStore, SqliteStore};
