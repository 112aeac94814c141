//! Query predicates, index selection and compilation into scan plans.
//!
//! A predicate is first decomposed into equality members and at most one
//! trailing range ([`Predicate::shape`]), matched against an index prefix
//! ([`select_index`]) and then compiled into a single ordered scan
//! ([`PredicateCompiler`]).

mod compiler;
mod predicate;
mod select;

pub use compiler::{compile, PredicateCompiler, ScanPlan};
pub use predicate::{EqCondition, Predicate, RangeCondition, Shape};
pub use select::select_index;
