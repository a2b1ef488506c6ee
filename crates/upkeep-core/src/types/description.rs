//! TaskDescription: the canonical identity of a maintenance task.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::UpkeepError;

/// Reserved key selecting the plugin that executes the task.
pub const NAME_KEY: &str = "name";

/// Immutable description of one unit of administrative work.
///
/// The `name` field selects the plugin; `extras` carries plugin-defined
/// parameters. Two descriptions denote the *same* task iff their full
/// key/value sets are equal, independent of construction order. Equality and
/// [`identity_hash`](Self::identity_hash) are the basis for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescription {
    name: String,
    #[serde(default)]
    extras: BTreeMap<String, String>,
}

impl TaskDescription {
    /// Build a description from key/value pairs.
    ///
    /// Fails fast with `BadParameter` when the `name` key is absent. A
    /// repeated key keeps the last value.
    pub fn new<I, K, V>(pairs: I) -> Result<Self, UpkeepError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut name = None;
        let mut extras = BTreeMap::new();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            if key == NAME_KEY {
                name = Some(value);
            } else {
                extras.insert(key, value);
            }
        }
        match name {
            Some(name) if !name.trim().is_empty() => Ok(Self { name, extras }),
            _ => Err(UpkeepError::BadParameter(format!(
                "description is missing the '{}' key",
                NAME_KEY
            ))),
        }
    }

    /// Shorthand for a description with only a plugin name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extras: BTreeMap::new(),
        }
    }

    /// Add one extra key/value pair (builder style).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// The plugin name this task is dispatched to.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a value; `"name"` and extras are served uniformly.
    pub fn get(&self, key: &str) -> Option<&str> {
        if key == NAME_KEY {
            Some(&self.name)
        } else {
            self.extras.get(key).map(String::as_str)
        }
    }

    pub fn extras(&self) -> &BTreeMap<String, String> {
        &self.extras
    }

    /// Order-independent 64-bit hash over the full key/value set.
    ///
    /// Stable for the lifetime of the process; used as the dedup key.
    pub fn identity_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        NAME_KEY.hash(&mut hasher);
        self.name.hash(&mut hasher);
        // BTreeMap iteration is sorted, so insertion order cannot leak in.
        for (key, value) in &self.extras {
            key.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl fmt::Display for TaskDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        let mut sep = '{';
        for (key, value) in &self.extras {
            write!(f, "{}{}={}", sep, key, value)?;
            sep = ',';
        }
        if sep == ',' {
            write!(f, "}}")?;
        }
        Ok(())
    }
}
