//! Secondary index definitions.

use crate::encoding::SEPARATOR;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Separator between components of an index name.
pub const NAME_SEPARATOR: &str = "__";

/// Marker preceding the ordering key in an index name.
pub const ORDER_BY_MARKER: &str = "__ORDER_BY__";

/// Storage mode of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexConfiguration {
    /// Index records carry a full copy of the document.
    #[default]
    OptimizeRead,
    /// Index records carry no payload; readers fetch the base record by id.
    OptimizeWrite,
}

/// A composite secondary index over dotted field paths.
///
/// The order of `conditions` is significant: every prefix of it is
/// independently scannable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Collection the index belongs to.
    pub collection_name: String,
    /// Ordered field paths forming the composite sort value.
    pub conditions: Vec<String>,
    /// Field whose value suffixes the composite sort value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering_key: Option<String>,
    /// Storage mode.
    #[serde(default)]
    pub configuration: IndexConfiguration,
}

impl Index {
    /// Creates an `OPTIMIZE_READ` index on `conditions`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `conditions` is empty, repeats a field path,
    /// or a path is empty or contains the key separator.
    pub fn new<I, S>(collection_name: impl Into<String>, conditions: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let index = Self {
            collection_name: collection_name.into(),
            conditions: conditions.into_iter().map(Into::into).collect(),
            ordering_key: None,
            configuration: IndexConfiguration::OptimizeRead,
        };
        index.validate()?;
        Ok(index)
    }

    /// Sets the ordering key.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the key is an invalid field path or contains
    /// the key separator.
    pub fn ordering_key(mut self, key: impl Into<String>) -> CoreResult<Self> {
        let key = key.into();
        check_field_path(&key)?;
        self.ordering_key = Some(key);
        Ok(self)
    }

    /// Sets the storage mode.
    #[must_use]
    pub const fn configuration(mut self, configuration: IndexConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Stable identity of the index.
    ///
    /// `collection__cond1__cond2[__ORDER_BY__key]`. The storage mode is not
    /// part of the identity.
    #[must_use]
    pub fn name(&self) -> String {
        let mut name = format!(
            "{}{NAME_SEPARATOR}{}",
            self.collection_name,
            self.conditions.join(NAME_SEPARATOR)
        );
        if let Some(key) = &self.ordering_key {
            name.push_str(ORDER_BY_MARKER);
            name.push_str(key);
        }
        name
    }

    /// Returns true if index records carry the document.
    #[must_use]
    pub fn stores_payload(&self) -> bool {
        self.configuration == IndexConfiguration::OptimizeRead
    }

    /// Returns true if `fields` is a prefix of `conditions`.
    #[must_use]
    pub fn has_prefix(&self, fields: &[String]) -> bool {
        fields.len() <= self.conditions.len()
            && self.conditions.iter().zip(fields).all(|(a, b)| a == b)
    }

    /// Checks the structural invariants of the definition.
    ///
    /// # Errors
    ///
    /// Returns `Validation` describing the first violation.
    pub fn validate(&self) -> CoreResult<()> {
        if self.collection_name.is_empty() {
            return Err(CoreError::validation("index collection name must not be empty"));
        }
        if self.conditions.is_empty() {
            return Err(CoreError::validation(format!(
                "index on {} must have at least one condition",
                self.collection_name
            )));
        }

        let mut seen = HashSet::with_capacity(self.conditions.len());
        for field in &self.conditions {
            check_field_path(field)?;
            if !seen.insert(field.as_str()) {
                return Err(CoreError::validation(format!(
                    "index on {} repeats condition {field}",
                    self.collection_name
                )));
            }
        }

        if let Some(key) = &self.ordering_key {
            check_field_path(key)?;
        }
        Ok(())
    }
}

fn check_field_path(path: &str) -> CoreResult<()> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(CoreError::validation(format!(
            "invalid field path {path:?}"
        )));
    }
    if path.contains(SEPARATOR) {
        return Err(CoreError::validation(format!(
            "field path {path:?} must not contain '{SEPARATOR}'"
        )));
    }
    Ok(())
}
