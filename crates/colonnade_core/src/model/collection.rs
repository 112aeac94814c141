//! Collection definitions.

use crate::encoding::SEPARATOR;
use crate::error::{CoreError, CoreResult};
use crate::model::is_system_collection;
use serde::{Deserialize, Serialize};

/// Declared type of a document attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeType {
    /// Text.
    String,
    /// Integer or decimal.
    Number,
    /// Nested mapping.
    Object,
    /// List of values.
    Array,
    /// Timestamp.
    Date,
    /// Boolean.
    Boolean,
}

/// Constraint on a document attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeConstraint {
    /// The attribute may be missing or null.
    Nullable,
    /// The attribute must be present and non-null.
    NotNull,
}

/// Declared shape of one document attribute.
///
/// Attribute definitions are carried as metadata only; enforcing them is
/// the job of the schema validation layer in front of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Attribute name.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    /// Constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<AttributeConstraint>,
    /// Nested attributes of an `OBJECT` attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<AttributeDefinition>>,
}

impl AttributeDefinition {
    /// Creates an attribute definition without constraints.
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            constraints: Vec::new(),
            attributes: None,
        }
    }

    /// Adds a constraint.
    #[must_use]
    pub fn constraint(mut self, constraint: AttributeConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Sets nested attributes.
    #[must_use]
    pub fn nested(mut self, attributes: Vec<AttributeDefinition>) -> Self {
        self.attributes = Some(attributes);
        self
    }
}

/// A logical document type.
///
/// Collections are immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection name, the prefix of every physical key of its documents.
    pub name: String,
    /// Field holding each document's unique id.
    pub id_key: String,
    /// Field whose value suffixes the base record's sort value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering_key: Option<String>,
    /// Declared attributes.
    #[serde(
        default,
        rename = "attributes",
        skip_serializing_if = "Option::is_none"
    )]
    pub attribute_definitions: Option<Vec<AttributeDefinition>>,
    /// Whether documents created without an id get a generated one.
    #[serde(default)]
    pub auto_generate_id: bool,
}

impl Collection {
    /// Creates a collection definition.
    pub fn new(name: impl Into<String>, id_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_key: id_key.into(),
            ordering_key: None,
            attribute_definitions: None,
            auto_generate_id: false,
        }
    }

    /// Sets the ordering key.
    #[must_use]
    pub fn ordering_key(mut self, key: impl Into<String>) -> Self {
        self.ordering_key = Some(key.into());
        self
    }

    /// Enables id generation.
    #[must_use]
    pub fn auto_generate_id(mut self) -> Self {
        self.auto_generate_id = true;
        self
    }

    /// Sets the attribute definitions.
    #[must_use]
    pub fn attributes(mut self, attributes: Vec<AttributeDefinition>) -> Self {
        self.attribute_definitions = Some(attributes);
        self
    }

    /// Returns true if this is one of the reserved metadata collections.
    #[must_use]
    pub fn is_system(&self) -> bool {
        is_system_collection(&self.name)
    }

    /// Checks naming rules for a user collection.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the name is empty or contains the key
    /// separator, if `id_key` is empty, or `SystemCollection` for a
    /// reserved name.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::validation("collection name must not be empty"));
        }
        if self.name.contains(SEPARATOR) {
            return Err(CoreError::validation(format!(
                "collection name {:?} must not contain '{SEPARATOR}'",
                self.name
            )));
        }
        if self.is_system() {
            return Err(CoreError::SystemCollection {
                name: self.name.clone(),
            });
        }
        if self.id_key.is_empty() {
            return Err(CoreError::validation(format!(
                "collection {} has an empty id_key",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let collection = Collection::new("book", "isbn")
            .ordering_key("published")
            .auto_generate_id();
        assert_eq!(collection.ordering_key.as_deref(), Some("published"));
        assert!(collection.auto_generate_id);
        assert!(collection.validate().is_ok());
    }

    #[test]
    fn rejects_separator_and_reserved_names() {
        assert!(Collection::new("bo#ok", "id").validate().unwrap_err().is_validation());
        assert!(matches!(
            Collection::new("index", "id").validate(),
            Err(CoreError::SystemCollection { .. })
        ));
        assert!(Collection::new("book", "").validate().is_err());
        assert!(Collection::new("", "id").validate().is_err());
    }

    #[test]
    fn serde_shape() {
        let collection = Collection::new("book", "isbn").attributes(vec![
            AttributeDefinition::new("title", AttributeType::String)
                .constraint(AttributeConstraint::NotNull),
            AttributeDefinition::new("category", AttributeType::Object)
                .nested(vec![AttributeDefinition::new("name", AttributeType::String)]),
        ]);

        let json = serde_json::to_value(&collection).unwrap();
        assert_eq!(json["attributes"][0]["type"], "STRING");
        assert_eq!(json["attributes"][0]["constraints"][0], "NOT_NULL");
        assert_eq!(json["auto_generate_id"], false);
        assert!(json.get("ordering_key").is_none());

        let back: Collection = serde_json::from_value(json).unwrap();
        assert_eq!(back, collection);
    }

    #[test]
    fn deserialize_minimal() {
        let collection: Collection =
            serde_json::from_str(r#"{"name":"book","id_key":"isbn"}"#).unwrap();
        assert_eq!(collection, Collection::new("book", "isbn"));
    }
}
