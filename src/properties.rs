//! Contains the configuration of sightkeys, stored as a flat map of string properties.
//!
//! Every tunable value lives in the properties file: the pixel offset of each note position, the
//! paths of the image assets, the window geometry, and the timing of the practice loop. Values are
//! always stored as strings and parsed on demand by the typed helpers of [Properties].

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    time::Duration,
};

use crate::error::ConfigurationError;

/// A source of string properties.
pub trait Properties {
    /// Returns the value of the given property, if set.
    fn get(&self, key: &str) -> Option<String>;

    /// Returns all the `(key, value)` pairs whose key starts with the given prefix, sorted by key.
    fn entries_with_prefix(&self, prefix: &str) -> Vec<(String, String)>;

    /// Returns the value of the given property or an error if it is not set.
    fn require(&self, key: &str) -> Result<String, ConfigurationError> {
        self.get(key)
            .ok_or_else(|| ConfigurationError::MissingProperty(key.to_string()))
    }

    /// Returns the value of the given property parsed as an unsigned integer.
    fn require_u32(&self, key: &str) -> Result<u32, ConfigurationError> {
        let value = self.require(key)?;
        parse_u32(key, &value)
    }

    /// Returns the value of the given property, given in milliseconds, as a duration.
    fn require_millis(&self, key: &str) -> Result<Duration, ConfigurationError> {
        let value = self.require(key)?;
        value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigurationError::InvalidProperty(key.to_string(), value))
    }

    /// Returns the value of the given property parsed as an integer, or `None` if it is not set.
    fn optional_usize(&self, key: &str) -> Result<Option<usize>, ConfigurationError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse::<usize>()
                .map(Some)
                .map_err(|_| ConfigurationError::InvalidProperty(key.to_string(), value)),
        }
    }
}

/// Parses the value of a property as an unsigned integer.
pub(crate) fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigurationError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| ConfigurationError::InvalidProperty(key.to_string(), value.to_string()))
}

/// An implementation of [Properties] read from a JSON file containing a single object whose values
/// are all strings.
#[derive(Clone, Debug, Default)]
pub struct LocalProperties {
    /// A map of property keys to their values.
    values: BTreeMap<String, String>,
}

impl LocalProperties {
    /// Reads the properties from the given file.
    pub fn open(path: &Path) -> Result<LocalProperties> {
        let file = File::open(path)
            .with_context(|| format!("cannot open properties file {}", path.display()))?;
        let reader = BufReader::new(file);
        let values: BTreeMap<String, String> = serde_json::from_reader(reader)
            .with_context(|| format!("cannot parse properties file {}", path.display()))?;
        Ok(LocalProperties { values })
    }

    /// Creates the properties from the given pairs.
    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> LocalProperties {
        LocalProperties {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Sets the value of a property, replacing any previous value.
    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Writes the properties to the given file, replacing its contents.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("cannot create properties file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &self.values)
            .with_context(|| format!("cannot write properties file {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("cannot write properties file {}", path.display()))
    }
}

impl Properties for LocalProperties {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn entries_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.values
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
