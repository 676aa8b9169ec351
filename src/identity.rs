use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::Error;

/// An authenticated principal, as produced by a strategy or restored from a session.
///
/// The framework never inspects the content; applications convert to and from
/// their own user types with [`Identity::from_serializable`] and
/// [`Identity::deserialize_into`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Value);

impl Identity {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, Error> {
        serde_json::to_value(value).map(Self).map_err(|error| {
            warn!("Failed to convert value to identity: {error}");
            Error::Serialization(error.to_string())
        })
    }

    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.0.clone()).map_err(|error| {
            warn!("Failed to convert identity: {error}");
            Error::Deserialization(error.to_string())
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Identity {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Account {
        id: u64,
        username: String,
    }

    #[test]
    fn test_from_serializable() {
        let account = Account {
            id: 7,
            username: "alice".to_string(),
        };

        let identity = Identity::from_serializable(&account).unwrap();
        assert_eq!(identity.get("username"), Some(&json!("alice")));
        assert_eq!(identity.as_value(), &json!({"id": 7, "username": "alice"}));
    }

    #[test]
    fn test_deserialize_into() {
        let identity = Identity::new(json!({"id": 7, "username": "alice"}));

        let account: Account = identity.deserialize_into().unwrap();
        assert_eq!(account.id, 7);
        assert_eq!(account.username, "alice");
    }

    #[test]
    fn test_deserialize_into_mismatched_shape() {
        let identity = Identity::new(json!("alice"));

        let result = identity.deserialize_into::<Account>();
        assert!(matches!(result, Err(Error::Deserialization(_))));
    }
}
