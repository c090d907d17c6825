//! Topic registry loaded from static topic definitions.
//!
//! Definitions are YAML (or JSON, which YAML accepts) shaped as
//! `category -> entity -> action -> payload schema`:
//!
//! ```yaml
//! default_category: testing
//! topics:
//!   testing:
//!     Test:
//!       Created:
//!         type: object
//!         required: [id]
//! ```

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{PublishError, RegistryError};
use crate::topic::{topic_name, Topic};

/// The set of known topics, keyed by topic name.
#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    default_category: Option<String>,
    topics: BTreeMap<String, Arc<Topic>>,
}

impl TopicRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load definitions from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Load definitions from an open reader.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, RegistryError> {
        let mut contents = String::new();
        reader
            .read_to_string(&mut contents)
            .map_err(|source| RegistryError::Io {
                path: "<reader>".to_string(),
                source,
            })?;
        Self::from_yaml_str(&contents)
    }

    /// Load definitions from a YAML or JSON document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, RegistryError> {
        let value: Value = serde_yaml::from_str(contents)?;
        Self::from_value(&value)
    }

    /// Load definitions from an already-parsed document.
    pub fn from_value(value: &Value) -> Result<Self, RegistryError> {
        let root = value
            .as_object()
            .ok_or_else(|| RegistryError::Malformed("expected a mapping at top level".into()))?;

        let default_category = match root.get("default_category") {
            None | Some(Value::Null) => None,
            Some(Value::String(category)) => Some(category.clone()),
            Some(other) => {
                return Err(RegistryError::Malformed(format!(
                    "default_category must be a string, got {other}"
                )))
            }
        };

        let mut registry = Self {
            default_category,
            topics: BTreeMap::new(),
        };

        let categories = match root.get("topics") {
            Some(topics) => as_mapping(topics, "topics")?,
            None => return Err(RegistryError::Malformed("missing `topics` mapping".into())),
        };

        for (category, entities) in categories {
            for (entity, actions) in as_mapping(entities, category)? {
                for (action, schema) in as_mapping(actions, &format!("{category}.{entity}"))? {
                    let topic = Topic::new(category, entity, action, schema.clone())?;
                    registry.insert(topic)?;
                }
            }
        }

        debug!(
            topics = registry.len(),
            default_category = ?registry.default_category,
            "Loaded topic definitions"
        );

        Ok(registry)
    }

    /// Register a topic. Names must be unique.
    pub fn insert(&mut self, topic: Topic) -> Result<Arc<Topic>, RegistryError> {
        let name = topic.name();
        if self.topics.contains_key(&name) {
            return Err(RegistryError::Malformed(format!(
                "topic {name} is defined more than once"
            )));
        }
        let topic = Arc::new(topic);
        self.topics.insert(name, Arc::clone(&topic));
        Ok(topic)
    }

    /// Set the category used when callers omit one.
    pub fn with_default_category(mut self, category: impl Into<String>) -> Self {
        self.default_category = Some(category.into());
        self
    }

    pub fn default_category(&self) -> Option<&str> {
        self.default_category.as_deref()
    }

    /// Find the topic for a triple, if any.
    pub fn lookup(&self, category: &str, entity: &str, action: &str) -> Option<Arc<Topic>> {
        self.get(&topic_name(category, entity, action))
    }

    /// Find the topic for a triple, failing with the attempted name.
    pub fn resolve(
        &self,
        category: &str,
        entity: &str,
        action: &str,
    ) -> Result<Arc<Topic>, PublishError> {
        let name = topic_name(category, entity, action);
        self.get(&name).ok_or(PublishError::TopicNotFound(name))
    }

    /// Find a topic by its full name.
    pub fn get(&self, name: &str) -> Option<Arc<Topic>> {
        self.topics.get(name).cloned()
    }

    /// All topics, ordered by name.
    pub fn topics(&self) -> impl Iterator<Item = &Arc<Topic>> {
        self.topics.values()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

fn as_mapping<'a>(value: &'a Value, at: &str) -> Result<&'a Map<String, Value>, RegistryError> {
    value
        .as_object()
        .ok_or_else(|| RegistryError::Malformed(format!("expected a mapping at `{at}`")))
}
