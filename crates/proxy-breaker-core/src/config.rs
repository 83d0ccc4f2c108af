//! Backend definitions and their namespaced extra configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Untyped, namespaced configuration attached to a backend.
///
/// Each feature reads the entry stored under its own namespace key and is
/// responsible for decoding it; unknown namespaces are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtraConfig(Map<String, Value>);

impl ExtraConfig {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry stored under `namespace`.
    pub fn get(&self, namespace: &str) -> Option<&Value> {
        self.0.get(namespace)
    }

    /// Stores a raw entry, replacing any previous one.
    pub fn insert(&mut self, namespace: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(namespace.into(), value.into());
    }

    /// Stores an already-typed configuration value.
    ///
    /// The value is kept in its serialized form, which is the same shape a
    /// JSON configuration file produces, so readers only deal with one
    /// representation.
    pub fn insert_typed<T: Serialize>(
        &mut self,
        namespace: impl Into<String>,
        value: &T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.0.insert(namespace.into(), value);
        Ok(())
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.0.contains_key(namespace)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ExtraConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ExtraConfig {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Static definition of a backend, as read from the gateway configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backend {
    /// Path template used against the backend hosts.
    pub url_pattern: String,
    /// Hosts serving this backend.
    #[serde(rename = "host")]
    pub hosts: Vec<String>,
    /// HTTP method used for the backend call.
    pub method: String,
    /// Feature configuration keyed by namespace.
    pub extra_config: ExtraConfig,
}

impl Backend {
    /// Creates a backend with the given extra configuration.
    pub fn with_extra_config(extra_config: ExtraConfig) -> Self {
        Self {
            extra_config,
            ..Self::default()
        }
    }

    /// Human-readable identifier for logs and metrics.
    pub fn label(&self) -> String {
        match self.hosts.first() {
            Some(host) if !self.url_pattern.is_empty() => format!("{}{}", host, self.url_pattern),
            Some(host) => host.clone(),
            None if !self.url_pattern.is_empty() => self.url_pattern.clone(),
            None => String::from("<unnamed>"),
        }
    }
}
