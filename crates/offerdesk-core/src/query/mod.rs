//! Plan compilation.
//!
//! A validated plan lowers deterministically into either a [`Filter`] (for
//! counts and finds) or a [`Pipeline`] (for grouped metrics). Both render
//! to the document-store's native JSON form for debugging and parse back
//! from it for operator-supplied pipelines.

mod filter;
mod pipeline;

#[cfg(test)]
mod tests;

pub use filter::{
    build_legacy_filter, compile_filter, Filter, Operand, Operators, Pattern, Predicate,
    FORBIDDEN_OPERATORS,
};
pub use pipeline::{
    compile_aggregation, Accumulator, DerivedField, GroupId, GroupStage, Pipeline, Projection,
    Stage, MAX_LIMIT,
};
