//! Predicate compilation into scan plans.

use super::predicate::Predicate;
use crate::config::SeparatorPolicy;
use crate::encoding::{index_sort_key, HIGH_SENTINEL, SEPARATOR};
use crate::error::{CoreError, CoreResult};
use crate::model::{Collection, Index};
use serde::Serialize;
use std::fmt;

/// A single ordered scan over one sort-key group of the projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanPlan {
    /// Every base record of the collection.
    FullScan {
        /// Collection sort key.
        sort_key: String,
    },
    /// Records whose sort value equals `value`.
    ExactMatch {
        /// Index sort key.
        sort_key: String,
        /// Composite value.
        value: String,
    },
    /// Records whose sort value starts with `prefix`.
    PrefixScan {
        /// Index sort key.
        sort_key: String,
        /// Composite prefix, always ending with the separator.
        prefix: String,
    },
    /// Records with `lo <= sort_value <= hi`.
    BoundedScan {
        /// Index sort key.
        sort_key: String,
        /// Inclusive lower bound.
        lo: String,
        /// Inclusive upper bound.
        hi: String,
    },
}

impl ScanPlan {
    /// Sort key of the group the plan scans.
    #[must_use]
    pub fn sort_key(&self) -> &str {
        match self {
            Self::FullScan { sort_key }
            | Self::ExactMatch { sort_key, .. }
            | Self::PrefixScan { sort_key, .. }
            | Self::BoundedScan { sort_key, .. } => sort_key,
        }
    }

    /// Returns true if the plan scans index records.
    #[must_use]
    pub const fn uses_index(&self) -> bool {
        !matches!(self, Self::FullScan { .. })
    }
}

impl fmt::Display for ScanPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullScan { sort_key } => write!(f, "FullScan({sort_key})"),
            Self::ExactMatch { sort_key, value } => {
                write!(f, "ExactMatch({sort_key}, {value:?})")
            }
            Self::PrefixScan { sort_key, prefix } => {
                write!(f, "PrefixScan({sort_key}, {prefix:?})")
            }
            Self::BoundedScan { sort_key, lo, hi } => {
                write!(f, "BoundedScan({sort_key}, {lo:?}, {hi:?})")
            }
        }
    }
}

/// Compiles `predicate` against `index` with the default separator policy.
///
/// # Errors
///
/// See [`PredicateCompiler::compile`].
pub fn compile(
    collection: &Collection,
    predicate: &Predicate,
    index: Option<&Index>,
) -> CoreResult<ScanPlan> {
    PredicateCompiler::default().compile(collection, predicate, index)
}

/// Turns predicates into scan plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredicateCompiler {
    separator: SeparatorPolicy,
}

impl PredicateCompiler {
    /// Creates a compiler with the given separator policy.
    #[must_use]
    pub const fn new(separator: SeparatorPolicy) -> Self {
        Self { separator }
    }

    /// Compiles `predicate` into a scan plan.
    ///
    /// `AnyMatch` scans the base records and ignores `index`. Every other
    /// predicate needs an index whose leading conditions are exactly the
    /// predicate's fields, with the range field (if any) last among them.
    /// Equality values are joined in index order.
    ///
    /// # Errors
    ///
    /// - `NoMatchingIndex` if a field predicate is compiled without index
    /// - `InvalidPredicate` if the predicate is malformed, does not fit the
    ///   index prefix, has inverted bounds, or carries a separator under
    ///   [`SeparatorPolicy::Reject`]
    pub fn compile(
        &self,
        collection: &Collection,
        predicate: &Predicate,
        index: Option<&Index>,
    ) -> CoreResult<ScanPlan> {
        let Some(shape) = predicate.shape()? else {
            return Ok(ScanPlan::FullScan {
                sort_key: collection.name.clone(),
            });
        };
        let Some(index) = index else {
            return Err(CoreError::NoMatchingIndex {
                collection: collection.name.clone(),
                fields: predicate.fields(),
            });
        };
        if index.collection_name != collection.name {
            return Err(CoreError::invalid_predicate(format!(
                "index {} does not belong to collection {}",
                index.name(),
                collection.name
            )));
        }
        if !shape.fits(&index.conditions) {
            return Err(CoreError::invalid_predicate(format!(
                "fields {:?} are not a prefix of index {}",
                predicate.fields(),
                index.name()
            )));
        }

        let sort_key = index_sort_key(index);
        let mut composite = String::new();
        for condition in &index.conditions[..shape.eqs.len()] {
            let value = shape.eq_value(condition).unwrap_or_default();
            self.check(condition, value)?;
            composite.push_str(value);
            composite.push(SEPARATOR);
        }

        let covers_all = shape.len() == index.conditions.len();
        let suffixed = !covers_all || index.ordering_key.is_some();

        let Some(range) = shape.range else {
            // composite ends with the separator here
            if suffixed {
                return Ok(ScanPlan::PrefixScan {
                    sort_key,
                    prefix: composite,
                });
            }
            composite.pop();
            return Ok(ScanPlan::ExactMatch {
                sort_key,
                value: composite,
            });
        };

        self.check(&range.field_name, &range.from)?;
        self.check(&range.field_name, &range.to)?;
        if range.from > range.to {
            return Err(CoreError::invalid_predicate(format!(
                "range on {} has from {:?} after to {:?}",
                range.field_name, range.from, range.to
            )));
        }

        let lo = format!("{composite}{}", range.from);
        let mut hi = format!("{composite}{}", range.to);
        if suffixed {
            hi.push(SEPARATOR);
            hi.push(HIGH_SENTINEL);
        }
        Ok(ScanPlan::BoundedScan { sort_key, lo, hi })
    }

    fn check(&self, field: &str, value: &str) -> CoreResult<()> {
        if self.separator == SeparatorPolicy::Reject && value.contains(SEPARATOR) {
            return Err(CoreError::invalid_predicate(format!(
                "value {value:?} for {field} contains the key separator '{SEPARATOR}'"
            )));
        }
        Ok(())
    }
}
