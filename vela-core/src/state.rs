//! State documents - desired and current resource state
//!
//! Both sides of a diff share one field vocabulary: a JSON object keyed by
//! logical (snake_case) field names. A desired field that is absent or null
//! means "leave unmanaged", not "clear".

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A mapping from logical field name to value
pub type StateDoc = serde_json::Map<String, Value>;

/// Target configuration for a resource, supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesiredState {
    attributes: StateDoc,
}

impl DesiredState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_doc(attributes: StateDoc) -> Self {
        Self { attributes }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Returns the value only if the caller actually manages the field
    ///
    /// Null is treated the same as absent.
    pub fn get_managed(&self, key: &str) -> Option<&Value> {
        match self.attributes.get(key) {
            Some(Value::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    pub fn is_managed(&self, key: &str) -> bool {
        self.get_managed(key).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.attributes.iter()
    }
}

/// Normalized snapshot of a resource's live configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
    /// Provider-assigned identifier (name, ARN, or ID)
    pub identifier: Option<String>,
    pub attributes: StateDoc,
}

impl CurrentState {
    pub fn new(attributes: StateDoc) -> Self {
        Self {
            identifier: None,
            attributes,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Result of fetching a resource: it exists, or it demonstrably does not
///
/// Absence is a value, never an error. A read that fails for any other
/// reason is a `FetchError` and must not be coerced into `Absent`.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Absent,
    Present(CurrentState),
}

impl Snapshot {
    pub fn exists(&self) -> bool {
        matches!(self, Snapshot::Present(_))
    }

    pub fn present(&self) -> Option<&CurrentState> {
        match self {
            Snapshot::Present(state) => Some(state),
            Snapshot::Absent => None,
        }
    }

    pub fn into_present(self) -> Option<CurrentState> {
        match self {
            Snapshot::Present(state) => Some(state),
            Snapshot::Absent => None,
        }
    }
}
