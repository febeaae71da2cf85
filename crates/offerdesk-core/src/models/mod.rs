//! Data models: the stored offer document and the answers produced for a
//! question.
//!
//! Display implementations for answers live in [`crate::display`], keeping
//! the data structures free of presentation logic.

pub mod answer;
pub mod offer;

pub use answer::{Answer, ChartDescriptor, DebugInfo, ErrorResponse, Reply};
pub use offer::{name_key, HrContact, Installment, Offer, PaymentMode};
