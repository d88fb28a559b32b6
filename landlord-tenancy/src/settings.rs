//! Runtime settings repository
//!
//! The application configuration that switch tasks rewrite on a tenant switch
//! (database connection targets, disk roots, cache prefix, ...). Keys are
//! dotted paths such as `filesystems.disks.public.root`.
//!
//! The runtime holds the landlord settings; every context works on its own
//! [`fork`](Settings::fork) of them, so one unit of work's tenant values are
//! never visible to another.

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared key/value settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: Arc<RwLock<HashMap<String, Value>>>,
}

impl Settings {
    /// Create empty settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create settings from key/value pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: Arc::new(RwLock::new(values)),
        }
    }

    /// Independent copy of the current values.
    ///
    /// Clones share state; a fork does not.
    pub fn fork(&self) -> Self {
        Self {
            values: Arc::new(RwLock::new(self.values.read().clone())),
        }
    }

    /// Raw value lookup
    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Typed lookup; `None` if missing or of the wrong shape
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_value(key)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// String lookup
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)
    }

    /// Whether a key is set to a non-null, non-empty value.
    pub fn is_set(&self, key: &str) -> bool {
        match self.values.read().get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Bool(b)) => *b,
            Some(_) => true,
        }
    }

    /// Whether a key exists at all
    pub fn has(&self, key: &str) -> bool {
        self.values.read().contains_key(key)
    }

    /// Set a value
    pub fn set(&self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.values.write().insert(key.into(), value);
    }

    /// Restore a previously captured value; `None` removes the key
    pub fn restore(&self, key: &str, value: Option<Value>) {
        let mut values = self.values.write();
        match value {
            Some(value) => {
                values.insert(key.to_string(), value);
            }
            None => {
                values.remove(key);
            }
        }
    }

    /// Copy `key` back from `origin`, removing it when `origin` lacks it
    pub fn reset_from(&self, origin: &Settings, key: &str) {
        self.restore(key, origin.get_value(key));
    }

    /// Remove a key
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.values.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}
