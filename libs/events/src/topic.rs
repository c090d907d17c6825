//! Topics: the publishable event kinds and their payload schemas.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use jsonschema::Validator;
use serde_json::Value;

use crate::envelope;
use crate::error::{RegistryError, ValidationError};

/// Build a topic name from its parts, e.g. `testing.TestCreated`.
pub fn topic_name(category: &str, entity: &str, action: &str) -> String {
    format!("{category}.{entity}{action}")
}

/// A publishable event kind.
///
/// Equality and hashing only consider `(category, entity, action)`.
#[derive(Clone)]
pub struct Topic {
    category: String,
    entity: String,
    action: String,
    schema: Value,
    validator: Arc<Validator>,
}

impl Topic {
    /// Create a topic, compiling its payload schema.
    pub fn new(
        category: impl Into<String>,
        entity: impl Into<String>,
        action: impl Into<String>,
        schema: Value,
    ) -> Result<Self, RegistryError> {
        let category = category.into();
        let entity = entity.into();
        let action = action.into();

        let validator = jsonschema::draft7::new(&schema).map_err(|e| {
            RegistryError::InvalidSchema {
                topic: topic_name(&category, &entity, &action),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            category,
            entity,
            action,
            schema,
            validator: Arc::new(validator),
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Unique name for this topic.
    pub fn name(&self) -> String {
        topic_name(&self.category, &self.entity, &self.action)
    }

    /// Validate an event payload against this topic's schema.
    pub fn validate_data(&self, data: &Value) -> Result<(), ValidationError> {
        envelope::check(&self.validator, &format!("{} data", self.name()), data)
    }
}

impl PartialEq for Topic {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category
            && self.entity == other.entity
            && self.action == other.action
    }
}

impl Eq for Topic {}

impl Hash for Topic {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.category.hash(state);
        self.entity.hash(state);
        self.action.hash(state);
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::fmt::Debug for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topic")
            .field("category", &self.category)
            .field("entity", &self.entity)
            .field("action", &self.action)
            .field("schema", &self.schema)
            .finish()
    }
}
