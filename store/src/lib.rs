use displaydoc::Display;
use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::debug;

/// A type of element kept in the metastore.
pub trait Element: Serialize + DeserializeOwned {
    const ELEMENT_TYPE: &'static str;
}

/// In-memory metastore: named elements, grouped by element type.
///
/// Elements are stored encoded, so what comes back out is always a fresh copy.
#[derive(Debug, Clone, Default)]
pub struct MetaStore {
    elements: IndexMap<&'static str, IndexMap<String, serde_json::Value>>,
}

#[derive(Debug, Error, Display)]
pub enum StoreError {
    /// Failed to encode {element_type} element "{name}"
    Encode {
        element_type: &'static str,
        name: String,
        #[source]
        source: serde_json::Error,
    },
    /// Failed to decode {element_type} element "{name}"
    Decode {
        element_type: &'static str,
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save an element, replacing any element of the same type and name.
    pub fn save<T: Element>(&mut self, name: &str, element: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(element).map_err(|source| StoreError::Encode {
            element_type: T::ELEMENT_TYPE,
            name: name.to_owned(),
            source,
        })?;
        debug!(element_type = T::ELEMENT_TYPE, name, "saving element");
        self.elements
            .entry(T::ELEMENT_TYPE)
            .or_default()
            .insert(name.to_owned(), value);
        Ok(())
    }

    pub fn load<T: Element>(&self, name: &str) -> Result<Option<T>, StoreError> {
        let Some(value) = self
            .elements
            .get(T::ELEMENT_TYPE)
            .and_then(|elements| elements.get(name))
        else {
            return Ok(None);
        };
        let element = T::deserialize(value).map_err(|source| StoreError::Decode {
            element_type: T::ELEMENT_TYPE,
            name: name.to_owned(),
            source,
        })?;
        Ok(Some(element))
    }

    pub fn contains<T: Element>(&self, name: &str) -> bool {
        self.elements
            .get(T::ELEMENT_TYPE)
            .is_some_and(|elements| elements.contains_key(name))
    }

    pub fn remove<T: Element>(&mut self, name: &str) -> bool {
        self.elements
            .get_mut(T::ELEMENT_TYPE)
            .and_then(|elements| elements.shift_remove(name))
            .is_some()
    }

    /// Names of every element of a type, in the order they were first saved.
    pub fn names<T: Element>(&self) -> Vec<&str> {
        self.elements
            .get(T::ELEMENT_TYPE)
            .map(|elements| elements.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}
