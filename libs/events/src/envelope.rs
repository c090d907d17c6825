//! Event envelope - the fixed outer shape every published event must satisfy.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ValidationError;

/// Actor type for event attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorType {
    /// A human user.
    User,
    /// A service acting on its own behalf.
    Service,
    /// An external system calling in.
    ThirdParty,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::User => "user",
            ActorType::Service => "service",
            ActorType::ThirdParty => "third-party",
        }
    }
}

impl std::fmt::Display for ActorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ActorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(ActorType::User),
            "service" => Ok(ActorType::Service),
            "third-party" => Ok(ActorType::ThirdParty),
            other => Err(format!(
                "unknown actor type {other:?} (expected user, service or third-party)"
            )),
        }
    }
}

/// The identity an event is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,

    #[serde(rename = "type")]
    pub actor_type: ActorType,
}

impl Actor {
    pub fn new(id: impl Into<String>, actor_type: ActorType) -> Self {
        Self {
            id: id.into(),
            actor_type,
        }
    }
}

/// The envelope schema shared by all topics.
///
/// Topic-specific rules for `data` live in each topic's own schema.
pub fn envelope_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "action": {"$ref": "#/definitions/EventActionName"},
            "actor": {"$ref": "#/definitions/EventActor"},
            "category": {"$ref": "#/definitions/EventCategoryName"},
            "data": {
                "additionalProperties": true,
                "minProperties": 1,
                "properties": {},
                "type": "object"
            },
            "entity": {"$ref": "#/definitions/EventEntityName"}
        },
        "required": ["category", "action", "entity", "data", "actor"],
        "definitions": {
            "EventActionName": {"minLength": 1, "pattern": "^[A-Z][a-z]+$", "type": "string"},
            "EventActor": {
                "properties": {
                    "id": {"type": "string", "minLength": 5},
                    "type": {"enum": ["user", "service", "third-party"]}
                },
                "required": ["type", "id"],
                "title": "EventActor",
                "type": "object"
            },
            "EventCategoryName": {"minLength": 1, "pattern": "^[a-z]+$", "type": "string"},
            "EventEntityName": {"minLength": 1, "pattern": "^([A-Z][a-z]+)+$", "type": "string"}
        }
    })
}

static ENVELOPE_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    jsonschema::draft7::new(&envelope_schema()).expect("envelope schema is a valid draft 7 schema")
});

/// Validate a request body against the envelope schema.
pub fn validate_envelope(request_json: &Value) -> Result<(), ValidationError> {
    check(&ENVELOPE_VALIDATOR, "event envelope", request_json)
}

/// Run `validator` over `instance`, collecting every violation.
pub(crate) fn check(
    validator: &Validator,
    subject: &str,
    instance: &Value,
) -> Result<(), ValidationError> {
    let violations: Vec<String> = validator
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(subject, violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_envelope() -> Value {
        json!({
            "action": "Created",
            "category": "testing",
            "entity": "TestEntity",
            "data": {"id": "MyTestId"},
            "actor": {"id": "USER_ID", "type": "user"}
        })
    }

    #[test]
    fn test_actor_type_serialization() {
        assert_eq!(serde_json::to_string(&ActorType::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&ActorType::Service).unwrap(),
            "\"service\""
        );
        assert_eq!(
            serde_json::to_string(&ActorType::ThirdParty).unwrap(),
            "\"third-party\""
        );
    }

    #[test]
    fn test_actor_type_parse() {
        assert_eq!("third-party".parse::<ActorType>(), Ok(ActorType::ThirdParty));
        assert!("robot".parse::<ActorType>().is_err());
    }

    #[test]
    fn test_actor_serializes_type_key() {
        let actor = Actor::new("svc-billing", ActorType::Service);
        assert_eq!(
            serde_json::to_value(&actor).unwrap(),
            json!({"id": "svc-billing", "type": "service"})
        );
    }

    #[test]
    fn test_valid_envelope_passes() {
        assert!(validate_envelope(&valid_envelope()).is_ok());
    }

    #[test]
    fn test_non_string_category_rejected() {
        let mut envelope = valid_envelope();
        envelope["category"] = json!(5);

        let err = validate_envelope(&envelope).unwrap_err();
        assert!(err.to_string().contains("5 is not of type \"string\""), "{err}");
    }

    #[test]
    fn test_extra_key_rejected() {
        let mut envelope = valid_envelope();
        envelope["extra"] = json!("nope");

        assert!(validate_envelope(&envelope).is_err());
    }

    #[test]
    fn test_empty_data_rejected() {
        let mut envelope = valid_envelope();
        envelope["data"] = json!({});

        assert!(validate_envelope(&envelope).is_err());
    }

    #[test]
    fn test_short_actor_id_rejected() {
        let mut envelope = valid_envelope();
        envelope["actor"]["id"] = json!("abc");

        assert!(validate_envelope(&envelope).is_err());
    }

    #[test]
    fn test_name_patterns() {
        let mut envelope = valid_envelope();
        envelope["action"] = json!("created");
        assert!(validate_envelope(&envelope).is_err());

        let mut envelope = valid_envelope();
        envelope["entity"] = json!("testEntity");
        assert!(validate_envelope(&envelope).is_err());

        let mut envelope = valid_envelope();
        envelope["category"] = json!("Testing");
        assert!(validate_envelope(&envelope).is_err());
    }

    #[test]
    fn test_every_violation_reported() {
        let envelope = json!({
            "action": "Created",
            "category": 5,
            "entity": "Test",
            "data": {"id": "x"},
            "actor": {"type": "robot"}
        });

        let err = validate_envelope(&envelope).unwrap_err();
        assert!(err.violations.len() >= 3, "{:?}", err.violations);
    }
}
