//! Opaque key/value context passed to every step of a saga.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The context a saga carries through its steps.
///
/// Callers seed it at `start_saga`; the orchestrator merges each completed
/// step's response into it under the step's name, so later steps (and
/// compensations) can read what earlier steps produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaContext {
    values: Map<String, Value>,
}

impl SagaContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from a JSON value. Non-object values are stored
    /// under the `"input"` key.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(values) => Self { values },
            Value::Null => Self::default(),
            other => {
                let mut values = Map::new();
                values.insert("input".to_string(), other);
                Self { values }
            }
        }
    }

    /// Returns the value stored under a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Stores a value under a key, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Returns true if the context holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the context as a JSON object value.
    pub fn as_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

impl From<Value> for SagaContext {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}
