// ABOUTME: Read-only state built from user-supplied key=value pairs
// ABOUTME: Typically the first fallback behind the primary state backend

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

use super::error::{Result, StateError};
use super::handler::{expect_type, StateReader};
use super::value::StateValue;
use crate::pipeline::{Argument, ArgumentType};

/// Raw values keyed by argument key; converted on read according to the
/// requested argument's type.
#[derive(Debug, Clone, Default)]
pub struct ArgMap {
    values: HashMap<String, String>,
}

impl ArgMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `key=value` pairs. A key may only appear once.
    pub fn parse<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut map = Self::new();

        for pair in pairs {
            let pair = pair.as_ref();
            if let Some((key, value)) = pair.split_once('=') {
                map.insert(key.trim(), value)?;
            } else {
                return Err(StateError::InvalidValue {
                    key: pair.to_string(),
                    reason: "expected 'key=value'".to_string(),
                });
            }
        }

        Ok(map)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if self.values.contains_key(&key) {
            return Err(StateError::KeyExists { key });
        }
        self.values.insert(key, value.into());
        Ok(())
    }

    /// Add entries for keys not set yet, e.g. values from a config file that
    /// command line arguments should win over.
    pub fn extend_defaults<I, K, V>(&mut self, defaults: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in defaults {
            self.values.entry(key.into()).or_insert_with(|| value.into());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl StateReader for ArgMap {
    async fn read(&self, argument: &Argument) -> Result<StateValue> {
        let raw = self
            .get(&argument.key)
            .ok_or_else(|| StateError::not_found(&argument.key))?;
        StateValue::parse(argument, raw)
    }

    async fn exists(&self, argument: &Argument) -> Result<bool> {
        Ok(self.values.contains_key(&argument.key))
    }

    /// Any directory argument resolves to the supplied path; packaging only
    /// happens once the value is cached into a real backend.
    async fn get_directory(&self, argument: &Argument) -> Result<PathBuf> {
        expect_type(
            argument,
            &[ArgumentType::PackagedDir, ArgumentType::UnpackagedDir],
        )?;
        Ok(PathBuf::from(self.read(argument).await?.into_string(argument)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_duplicates_and_bad_pairs() {
        assert!(matches!(
            ArgMap::parse(&["a=1", "a=2"]),
            Err(StateError::KeyExists { .. })
        ));
        assert!(matches!(
            ArgMap::parse(&["novalue"]),
            Err(StateError::InvalidValue { .. })
        ));

        let map = ArgMap::parse(&["url=https://x.test/?q=1"]).unwrap();
        assert_eq!(map.get("url"), Some("https://x.test/?q=1"));
    }

    #[test]
    fn test_extend_defaults_keeps_explicit_values() {
        let mut map = ArgMap::parse(&["env=prod"]).unwrap();
        map.extend_defaults([("env", "dev"), ("region", "eu")]);

        assert_eq!(map.get("env"), Some("prod"));
        assert_eq!(map.get("region"), Some("eu"));
    }

    #[tokio::test]
    async fn test_typed_reads() {
        let map = ArgMap::parse(&["retries=3", "verbose=true", "dist=/tmp/dist"]).unwrap();

        assert_eq!(map.get_int64(&Argument::int64("retries")).await.unwrap(), 3);
        assert!(map.get_bool(&Argument::boolean("verbose")).await.unwrap());
        assert_eq!(
            map.get_directory(&Argument::packaged_dir("dist")).await.unwrap(),
            PathBuf::from("/tmp/dist")
        );
        assert!(matches!(
            map.get_bool(&Argument::boolean("retries")).await,
            Err(StateError::InvalidValue { .. })
        ));
    }
}
