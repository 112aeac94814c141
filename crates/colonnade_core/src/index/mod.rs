//! Secondary index maintenance.
//!
//! Index records are derived state: for every index, the record that should
//! exist is a pure function of the current document. Maintenance computes
//! that function for the old and the new image and reconciles the two,
//! independently per index.

mod engine;
mod plan;

pub use engine::{IndexEngine, MaintenanceReport};
pub use plan::{plan_index, IndexAction, Mutation};
