//! Pure per-index maintenance planning.

use crate::config::SeparatorPolicy;
use crate::encoding::KeyEncoder;
use crate::error::{CoreError, CoreResult};
use crate::model::{Collection, Index};
use colonnade_storage::{Record, RecordKey};
use serde_json::Value;

/// A document mutation as seen by index maintenance.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// The document did not exist before.
    Create {
        /// New image.
        new: Value,
    },
    /// The document existed before and still does.
    Update {
        /// Previous image.
        old: Value,
        /// New image.
        new: Value,
    },
    /// The document no longer exists.
    Delete {
        /// Last image.
        old: Value,
    },
}

impl Mutation {
    /// Builds a mutation from optional before and after images.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if both images are absent.
    pub fn from_images(old: Option<Value>, new: Option<Value>) -> CoreResult<Self> {
        match (old, new) {
            (None, Some(new)) => Ok(Self::Create { new }),
            (Some(old), Some(new)) => Ok(Self::Update { old, new }),
            (Some(old), None) => Ok(Self::Delete { old }),
            (None, None) => Err(CoreError::validation(
                "mutation needs an old or a new image",
            )),
        }
    }

    /// Previous image, if any.
    #[must_use]
    pub const fn old_image(&self) -> Option<&Value> {
        match self {
            Self::Create { .. } => None,
            Self::Update { old, .. } | Self::Delete { old } => Some(old),
        }
    }

    /// New image, if any.
    #[must_use]
    pub const fn new_image(&self) -> Option<&Value> {
        match self {
            Self::Create { new } | Self::Update { new, .. } => Some(new),
            Self::Delete { .. } => None,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// What has to happen to the record of one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAction {
    /// The document entered the index.
    Create(Record),
    /// Same position; the stored document copy is overwritten.
    Refresh(Record),
    /// An indexed value changed.
    Move {
        /// Record at the previous position.
        from: Record,
        /// Record at the new position.
        to: Record,
    },
    /// The document left the index.
    Remove(RecordKey),
}

/// Computes the action `mutation` requires on `index`.
///
/// Returns `Ok(None)` when the index record is unaffected: the document is
/// in neither image's index, or an `OPTIMIZE_WRITE` record keeps its
/// position. The old image is encoded without the separator check so that a
/// record written under a permissive policy can still be located.
///
/// # Errors
///
/// Returns `Validation` if the new image cannot be encoded.
pub fn plan_index(
    encoder: &KeyEncoder,
    collection: &Collection,
    index: &Index,
    mutation: &Mutation,
) -> CoreResult<Option<IndexAction>> {
    let lenient = KeyEncoder::new(SeparatorPolicy::Allow);
    let old = mutation
        .old_image()
        .map(|doc| lenient.encode_index(collection, index, doc))
        .transpose()?
        .flatten();
    let new = mutation
        .new_image()
        .map(|doc| encoder.encode_index(collection, index, doc))
        .transpose()?
        .flatten();

    Ok(match (old, new) {
        (None, None) => None,
        (Some(old), None) => Some(IndexAction::Remove(old.key())),
        (None, Some(new)) => Some(IndexAction::Create(new)),
        (Some(old), Some(new)) if old.same_position(&new) => {
            index.stores_payload().then_some(IndexAction::Refresh(new))
        }
        (Some(from), Some(to)) => Some(IndexAction::Move { from, to }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndexConfiguration;
    use serde_json::json;

    fn book() -> Collection {
        Collection::new("book", "isbn")
    }

    fn category() -> Index {
        Index::new("book", ["category.name"]).unwrap()
    }

    fn plan(index: &Index, mutation: &Mutation) -> Option<IndexAction> {
        plan_index(&KeyEncoder::default(), &book(), index, mutation).unwrap()
    }

    #[test]
    fn mutation_from_images() {
        let doc = json!({"isbn": "1"});
        assert!(matches!(
            Mutation::from_images(None, Some(doc.clone())).unwrap(),
            Mutation::Create { .. }
        ));
        assert!(matches!(
            Mutation::from_images(Some(doc.clone()), Some(doc.clone())).unwrap(),
            Mutation::Update { .. }
        ));
        assert!(matches!(
            Mutation::from_images(Some(doc), None).unwrap(),
            Mutation::Delete { .. }
        ));
        assert!(Mutation::from_images(None, None).is_err());
    }

    #[test]
    fn create_enters_index() {
        let mutation = Mutation::Create {
            new: json!({"isbn": "1", "category": {"name": "thriller"}}),
        };
        let Some(IndexAction::Create(record)) = plan(&category(), &mutation) else {
            panic!("expected create");
        };
        assert_eq!(record.sort_value, "thriller");
    }

    #[test]
    fn create_without_field_is_noop() {
        let mutation = Mutation::Create {
            new: json!({"isbn": "1"}),
        };
        assert_eq!(plan(&category(), &mutation), None);
    }

    #[test]
    fn value_change_moves() {
        let mutation = Mutation::Update {
            old: json!({"isbn": "1", "category": {"name": "thriller"}}),
            new: json!({"isbn": "1", "category": {"name": "scifi"}}),
        };
        let Some(IndexAction::Move { from, to }) = plan(&category(), &mutation) else {
            panic!("expected move");
        };
        assert_eq!(from.sort_value, "thriller");
        assert_eq!(to.sort_value, "scifi");
    }

    #[test]
    fn same_position_refreshes_only_read_indexes() {
        let mutation = Mutation::Update {
            old: json!({"isbn": "1", "category": {"name": "thriller"}, "title": "a"}),
            new: json!({"isbn": "1", "category": {"name": "thriller"}, "title": "b"}),
        };
        assert!(matches!(
            plan(&category(), &mutation),
            Some(IndexAction::Refresh(_))
        ));

        let write = category().configuration(IndexConfiguration::OptimizeWrite);
        assert_eq!(plan(&write, &mutation), None);
    }

    #[test]
    fn removed_field_removes_record() {
        let mutation = Mutation::Update {
            old: json!({"isbn": "1", "category": {"name": "thriller"}}),
            new: json!({"isbn": "1", "category": {}}),
        };
        assert_eq!(
            plan(&category(), &mutation),
            Some(IndexAction::Remove(RecordKey::new("book#1", "book#category.name")))
        );
    }

    #[test]
    fn delete_removes_record() {
        let mutation = Mutation::Delete {
            old: json!({"isbn": "1", "category": {"name": "thriller"}}),
        };
        assert!(matches!(
            plan(&category(), &mutation),
            Some(IndexAction::Remove(_))
        ));
    }

    #[test]
    fn old_image_with_separator_can_still_be_removed() {
        let mutation = Mutation::Update {
            old: json!({"isbn": "1", "category": {"name": "sci#fi"}}),
            new: json!({"isbn": "1", "category": {"name": "scifi"}}),
        };
        assert!(matches!(
            plan(&category(), &mutation),
            Some(IndexAction::Move { .. })
        ));
    }
}
