//! CLI command implementations.

pub mod fixture;
pub mod plan;
pub mod query;
pub mod records;
