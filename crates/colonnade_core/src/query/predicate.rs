//! Structured query predicates.

use crate::encoding::{field_value, KeyValue};
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Equality on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqCondition {
    /// Dotted field path.
    pub field_name: String,
    /// Canonical value.
    pub value: String,
}

/// Inclusive range on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeCondition {
    /// Dotted field path.
    pub field_name: String,
    /// Canonical lower bound.
    pub from: String,
    /// Canonical upper bound.
    pub to: String,
}

/// A query predicate.
///
/// Serialized externally tagged: `"any_match"`,
/// `{"eq": {"field_name": .., "value": ..}}`,
/// `{"range": {"field_name": .., "from": .., "to": ..}}`,
/// `{"and": [..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Every document of the collection.
    AnyMatch,
    /// Field equals a value.
    Eq(EqCondition),
    /// Field lies within inclusive bounds.
    Range(RangeCondition),
    /// Conjunction of `Eq` members and at most one trailing `Range`.
    And(Vec<Predicate>),
}

impl Predicate {
    /// Matches every document.
    #[must_use]
    pub const fn any_match() -> Self {
        Self::AnyMatch
    }

    /// Equality on `field_name`.
    pub fn eq(field_name: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        Self::Eq(EqCondition {
            field_name: field_name.into(),
            value: value.into().canonical(),
        })
    }

    /// Inclusive range on `field_name`.
    pub fn range(
        field_name: impl Into<String>,
        from: impl Into<KeyValue>,
        to: impl Into<KeyValue>,
    ) -> Self {
        Self::Range(RangeCondition {
            field_name: field_name.into(),
            from: from.into().canonical(),
            to: to.into().canonical(),
        })
    }

    /// Conjunction of `members`.
    pub fn and(members: impl IntoIterator<Item = Predicate>) -> Self {
        Self::And(members.into_iter().collect())
    }

    /// Returns true for [`Predicate::AnyMatch`].
    #[must_use]
    pub const fn is_any_match(&self) -> bool {
        matches!(self, Self::AnyMatch)
    }

    /// Decomposes the predicate into its equality members and range.
    ///
    /// Returns `Ok(None)` for `AnyMatch`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPredicate` for an empty or nested `And`, an
    /// `AnyMatch` inside `And`, more than one range, a range that is not the
    /// last member, or a field constrained twice.
    pub fn shape(&self) -> CoreResult<Option<Shape<'_>>> {
        let members: &[Predicate] = match self {
            Self::AnyMatch => return Ok(None),
            Self::And(members) => members,
            single => std::slice::from_ref(single),
        };
        if members.is_empty() {
            return Err(CoreError::invalid_predicate("and must have at least one member"));
        }

        let mut shape = Shape {
            eqs: Vec::with_capacity(members.len()),
            range: None,
        };
        let mut seen = HashSet::with_capacity(members.len());
        for member in members {
            if shape.range.is_some() {
                return Err(CoreError::invalid_predicate(
                    "range must be the last member of and",
                ));
            }
            let field = match member {
                Self::Eq(eq) => {
                    shape.eqs.push(eq);
                    &eq.field_name
                }
                Self::Range(range) => {
                    shape.range = Some(range);
                    &range.field_name
                }
                Self::And(_) => {
                    return Err(CoreError::invalid_predicate("and must not be nested"));
                }
                Self::AnyMatch => {
                    return Err(CoreError::invalid_predicate(
                        "any_match cannot be combined with other predicates",
                    ));
                }
            };
            if !seen.insert(field.as_str()) {
                return Err(CoreError::invalid_predicate(format!(
                    "field {field} is constrained more than once"
                )));
            }
        }
        Ok(Some(shape))
    }

    /// Field paths referenced by the predicate, in predicate order.
    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        match self {
            Self::AnyMatch => Vec::new(),
            Self::Eq(eq) => vec![eq.field_name.clone()],
            Self::Range(range) => vec![range.field_name.clone()],
            Self::And(members) => members.iter().flat_map(Self::fields).collect(),
        }
    }

    /// Evaluates the predicate against a document.
    ///
    /// Compares canonical values; range bounds are inclusive. An absent
    /// field never matches.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        let canonical = |field: &str| field_value(document, field).map(|v| v.canonical());
        match self {
            Self::AnyMatch => true,
            Self::Eq(eq) => canonical(&eq.field_name).is_some_and(|v| v == eq.value),
            Self::Range(range) => canonical(&range.field_name)
                .is_some_and(|v| range.from <= v && v <= range.to),
            Self::And(members) => members.iter().all(|m| m.matches(document)),
        }
    }
}

/// A predicate decomposed into equality members and an optional range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape<'a> {
    /// Equality members in predicate order.
    pub eqs: Vec<&'a EqCondition>,
    /// Trailing range member.
    pub range: Option<&'a RangeCondition>,
}

impl Shape<'_> {
    /// Number of distinct fields constrained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.eqs.len() + usize::from(self.range.is_some())
    }

    /// Returns true if nothing is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value required for `field` by an equality member.
    #[must_use]
    pub fn eq_value(&self, field: &str) -> Option<&str> {
        self.eqs
            .iter()
            .find(|eq| eq.field_name == field)
            .map(|eq| eq.value.as_str())
    }

    /// Returns true if the constrained fields are exactly `conditions[..len]`
    /// and the range, if any, is on the last of them.
    #[must_use]
    pub fn fits(&self, conditions: &[String]) -> bool {
        let n = self.len();
        if n == 0 || n > conditions.len() {
            return false;
        }
        let (eq_part, rest) = conditions[..n].split_at(self.eqs.len());
        let eqs_fit = eq_part.iter().all(|c| self.eq_value(c).is_some());
        let range_fits = match (self.range, rest) {
            (Some(range), [last]) => range.field_name == *last,
            (None, []) => true,
            _ => false,
        };
        eqs_fit && range_fits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_format() {
        let predicate = Predicate::and([
            Predicate::eq("author.name", "Larsson"),
            Predicate::range("rating", "3", "7"),
        ]);
        let json = serde_json::to_value(&predicate).unwrap();
        assert_eq!(
            json,
            json!({"and": [
                {"eq": {"field_name": "author.name", "value": "Larsson"}},
                {"range": {"field_name": "rating", "from": "3", "to": "7"}}
            ]})
        );
        let back: Predicate = serde_json::from_value(json).unwrap();
        assert_eq!(back, predicate);

        assert_eq!(serde_json::to_value(Predicate::AnyMatch).unwrap(), json!("any_match"));
    }

    #[test]
    fn typed_values_are_canonicalized() {
        assert_eq!(
            Predicate::eq("available", true),
            Predicate::eq("available", "true")
        );
        assert_eq!(Predicate::eq("rating", 5_i64), Predicate::eq("rating", "5"));
    }

    #[test]
    fn shape_rules() {
        assert!(Predicate::AnyMatch.shape().unwrap().is_none());

        let pred = Predicate::eq("a", "1");
        let shape = pred.shape().unwrap().unwrap();
        assert_eq!(shape.len(), 1);

        let invalid = [
            Predicate::and([]),
            Predicate::and([Predicate::range("a", "1", "2"), Predicate::eq("b", "1")]),
            Predicate::and([Predicate::range("a", "1", "2"), Predicate::range("b", "1", "2")]),
            Predicate::and([Predicate::eq("a", "1"), Predicate::eq("a", "2")]),
            Predicate::and([Predicate::and([Predicate::eq("a", "1")])]),
            Predicate::and([Predicate::AnyMatch]),
        ];
        for predicate in invalid {
            let err = predicate.shape().unwrap_err();
            assert!(matches!(err, CoreError::InvalidPredicate { .. }), "{predicate:?}");
        }
    }

    #[test]
    fn fits_index_prefix() {
        let conditions = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let fits = |p: Predicate| p.shape().unwrap().unwrap().fits(&conditions);

        assert!(fits(Predicate::eq("a", "1")));
        assert!(fits(Predicate::and([Predicate::eq("b", "1"), Predicate::eq("a", "1")])));
        assert!(fits(Predicate::and([
            Predicate::eq("a", "1"),
            Predicate::range("b", "1", "2")
        ])));
        assert!(!fits(Predicate::eq("b", "1")));
        assert!(!fits(Predicate::and([
            Predicate::eq("b", "1"),
            Predicate::range("a", "1", "2")
        ])));
        assert!(!fits(Predicate::and([
            Predicate::eq("a", "1"),
            Predicate::eq("b", "1"),
            Predicate::eq("c", "1"),
            Predicate::eq("d", "1"),
        ])));
    }

    #[test]
    fn in_memory_matching() {
        let doc = json!({"author": {"name": "Larsson"}, "rating": "5", "available": true});

        assert!(Predicate::AnyMatch.matches(&doc));
        assert!(Predicate::eq("author.name", "Larsson").matches(&doc));
        assert!(Predicate::eq("available", true).matches(&doc));
        assert!(!Predicate::eq("author.name", "Lars").matches(&doc));
        assert!(Predicate::range("rating", "5", "7").matches(&doc));
        assert!(Predicate::range("rating", "3", "5").matches(&doc));
        assert!(!Predicate::range("rating", "6", "7").matches(&doc));
        assert!(!Predicate::eq("missing", "x").matches(&doc));
        assert!(Predicate::and([
            Predicate::eq("author.name", "Larsson"),
            Predicate::range("rating", "3", "7"),
        ])
        .matches(&doc));
    }
}
