//! Index selection for predicates that do not name an index.

use super::predicate::Predicate;
use crate::error::CoreResult;
use crate::model::Index;

/// Picks the index that serves `predicate`.
///
/// A candidate's leading conditions must be exactly the predicate's fields
/// with the range field last. An index the predicate covers completely wins;
/// otherwise the candidate with the fewest conditions, ties broken by name.
/// Returns `Ok(None)` for `AnyMatch` and when no index fits.
///
/// # Errors
///
/// Returns `InvalidPredicate` if the predicate is malformed.
pub fn select_index<'a>(indexes: &'a [Index], predicate: &Predicate) -> CoreResult<Option<&'a Index>> {
    let Some(shape) = predicate.shape()? else {
        return Ok(None);
    };

    let best = indexes
        .iter()
        .filter(|index| shape.fits(&index.conditions))
        .min_by(|a, b| {
            let exact = |i: &Index| i.conditions.len() != shape.len();
            (exact(a), a.conditions.len(), a.name()).cmp(&(exact(b), b.conditions.len(), b.name()))
        });
    Ok(best)
}
