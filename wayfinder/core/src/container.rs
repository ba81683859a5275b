//! State Container - Ordered Saved-State Snapshots
//!
//! Flow controllers and screens flatten their state into a [`StateContainer`]
//! when the host asks them to save, and are rebuilt from it later (typically
//! after the process was killed and recreated).
//!
//! A container is an ordered list of `key → value` entries. Values come from a
//! closed set of kinds (see [`StateValue`]); anything outside that set is
//! rejected when it is put into the container through
//! [`insert_serialized`](StateContainer::insert_serialized). Floats are the
//! exception: NaN and infinities have no JSON form, so
//! [`to_json`](StateContainer::to_json) refuses containers holding them.
//!
//! Encoding the container to a platform blob is the host's job. The serde
//! derives (and the JSON helpers) exist so hosts have a lossless default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while building or decoding a state container
#[derive(Debug, Error)]
pub enum StateError {
    /// A value of a kind the container cannot hold
    #[error("Value for key '{key}' cannot be stored in a state container: {kind}")]
    Unencodable {
        /// Key the value was stored under
        key: String,
        /// Description of the offending value kind
        kind: &'static str,
    },

    /// JSON encoding or decoding failed
    #[error("State container JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Values
// =============================================================================

/// A single value stored in a [`StateContainer`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateValue {
    /// Boolean scalar
    Bool(bool),
    /// Signed integer scalar
    Int(i64),
    /// Floating point scalar
    Float(f64),
    /// String scalar
    Str(String),
    /// Nested container
    Container(StateContainer),
    /// Sequence of values
    List(Vec<StateValue>),
}

impl StateValue {
    /// Human readable name of this value kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Container(_) => "container",
            Self::List(_) => "list",
        }
    }

    /// Key of the first value JSON cannot represent, if any
    fn first_non_finite(&self, key: &str) -> Option<String> {
        match self {
            Self::Float(f) if !f.is_finite() => Some(key.to_string()),
            Self::Container(nested) => nested.first_non_finite(),
            Self::List(items) => items.iter().find_map(|item| item.first_non_finite(key)),
            _ => None,
        }
    }

    /// Convert any serializable value into a state value
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Unencodable`] when the value (or anything nested
    /// inside it) has no state value equivalent, such as `None`/`null` or an
    /// unsigned integer above `i64::MAX`.
    pub fn from_serialize<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Self, StateError> {
        let json = serde_json::to_value(value)?;
        Self::from_json(key, json)
    }

    fn from_json(key: &str, json: serde_json::Value) -> Result<Self, StateError> {
        use serde_json::Value;

        match json {
            Value::Null => Err(StateError::Unencodable {
                key: key.to_string(),
                kind: "null",
            }),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if n.is_u64() {
                    Err(StateError::Unencodable {
                        key: key.to_string(),
                        kind: "unsigned integer out of range",
                    })
                } else {
                    n.as_f64().map(Self::Float).ok_or(StateError::Unencodable {
                        key: key.to_string(),
                        kind: "number",
                    })
                }
            }
            Value::String(s) => Ok(Self::Str(s)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| Self::from_json(key, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            Value::Object(map) => {
                let mut nested = StateContainer::new();
                for (nested_key, item) in map {
                    let value = Self::from_json(&nested_key, item)?;
                    nested.insert(nested_key, value);
                }
                Ok(Self::Container(nested))
            }
        }
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<StateContainer> for StateValue {
    fn from(value: StateContainer) -> Self {
        Self::Container(value)
    }
}

impl From<Vec<StateValue>> for StateValue {
    fn from(value: Vec<StateValue>) -> Self {
        Self::List(value)
    }
}

// =============================================================================
// Container
// =============================================================================

/// One `key → value` entry of a [`StateContainer`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Entry key, unique within its container
    pub key: String,
    /// Entry value
    pub value: StateValue,
}

/// Ordered `key → value` snapshot of a controller's or screen's state
///
/// Entries keep their insertion order. Re-inserting an existing key replaces
/// the value in place.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateContainer {
    entries: Vec<StateEntry>,
}

impl StateContainer {
    /// Create an empty container
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any existing value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StateValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.value = value,
            None => self.entries.push(StateEntry { key, value }),
        }
    }

    /// Builder-style [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert an arbitrary serializable value
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Unencodable`] if the value has no state value
    /// equivalent.
    pub fn insert_serialized<T: Serialize + ?Sized>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), StateError> {
        let key = key.into();
        let value = StateValue::from_serialize(&key, value)?;
        self.insert(key, value);
        Ok(())
    }

    /// Get the value stored under a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    /// Get a string value
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(StateValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Get an integer value
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(StateValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get a boolean value
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(StateValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Get a nested container
    #[must_use]
    pub fn get_container(&self, key: &str) -> Option<&StateContainer> {
        match self.get(key) {
            Some(StateValue::Container(c)) => Some(c),
            _ => None,
        }
    }

    /// Get a list value
    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<&[StateValue]> {
        match self.get(key) {
            Some(StateValue::List(items)) => Some(items),
            _ => None,
        }
    }

    /// Remove a key, returning its value
    pub fn remove(&mut self, key: &str) -> Option<StateValue> {
        let idx = self.entries.iter().position(|e| e.key == key)?;
        Some(self.entries.remove(idx).value)
    }

    /// Whether the key is present
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the container has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateValue)> {
        self.entries.iter().map(|e| (e.key.as_str(), &e.value))
    }

    /// Encode as JSON
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Unencodable`] if a float anywhere in the
    /// container is NaN or infinite, or [`StateError::Json`] if encoding
    /// fails.
    pub fn to_json(&self) -> Result<String, StateError> {
        if let Some(key) = self.first_non_finite() {
            return Err(StateError::Unencodable {
                key,
                kind: "non-finite float",
            });
        }
        Ok(serde_json::to_string(self)?)
    }

    fn first_non_finite(&self) -> Option<String> {
        self.entries
            .iter()
            .find_map(|entry| entry.value.first_non_finite(&entry.key))
    }

    /// Decode from JSON produced by [`to_json`](Self::to_json)
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Json`] if the input is not a valid encoding.
    pub fn from_json(json: &str) -> Result<Self, StateError> {
        Ok(serde_json::from_str(json)?)
    }
}
