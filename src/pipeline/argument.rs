// ABOUTME: Typed, valueless keys identifying data exchanged between steps
// ABOUTME: Defines argument types, their persisted integer codes and key slugs

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ArgumentType {
    String,
    Int64,
    Float64,
    Bool,
    /// A string that is resolved out-of-band and never rendered.
    Secret,
    File,
    /// A directory archived into the state store and re-extracted per consumer.
    PackagedDir,
    /// A directory recorded by path only; assumed present wherever steps run.
    UnpackagedDir,
}

impl From<ArgumentType> for u8 {
    fn from(kind: ArgumentType) -> Self {
        match kind {
            ArgumentType::String => 0,
            ArgumentType::Int64 => 1,
            ArgumentType::Float64 => 2,
            ArgumentType::Bool => 3,
            ArgumentType::Secret => 4,
            ArgumentType::File => 5,
            ArgumentType::PackagedDir => 6,
            ArgumentType::UnpackagedDir => 7,
        }
    }
}

impl TryFrom<u8> for ArgumentType {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ArgumentType::String),
            1 => Ok(ArgumentType::Int64),
            2 => Ok(ArgumentType::Float64),
            3 => Ok(ArgumentType::Bool),
            4 => Ok(ArgumentType::Secret),
            5 => Ok(ArgumentType::File),
            6 => Ok(ArgumentType::PackagedDir),
            7 => Ok(ArgumentType::UnpackagedDir),
            other => Err(format!("unknown argument type code {other}")),
        }
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentType::String => write!(f, "string"),
            ArgumentType::Int64 => write!(f, "int64"),
            ArgumentType::Float64 => write!(f, "float64"),
            ArgumentType::Bool => write!(f, "bool"),
            ArgumentType::Secret => write!(f, "secret"),
            ArgumentType::File => write!(f, "file"),
            ArgumentType::PackagedDir => write!(f, "packaged_dir"),
            ArgumentType::UnpackagedDir => write!(f, "unpackaged_dir"),
        }
    }
}

/// A capability token naming a piece of data. It never carries a value;
/// values live in the state store under the argument's key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Argument {
    #[serde(rename = "type")]
    pub kind: ArgumentType,
    pub key: String,
}

impl Argument {
    pub fn new(kind: ArgumentType, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    pub fn string(key: impl Into<String>) -> Self {
        Self::new(ArgumentType::String, key)
    }

    pub fn int64(key: impl Into<String>) -> Self {
        Self::new(ArgumentType::Int64, key)
    }

    pub fn float64(key: impl Into<String>) -> Self {
        Self::new(ArgumentType::Float64, key)
    }

    pub fn boolean(key: impl Into<String>) -> Self {
        Self::new(ArgumentType::Bool, key)
    }

    pub fn secret(key: impl Into<String>) -> Self {
        Self::new(ArgumentType::Secret, key)
    }

    pub fn file(key: impl Into<String>) -> Self {
        Self::new(ArgumentType::File, key)
    }

    pub fn packaged_dir(key: impl Into<String>) -> Self {
        Self::new(ArgumentType::PackagedDir, key)
    }

    pub fn unpackaged_dir(key: impl Into<String>) -> Self {
        Self::new(ArgumentType::UnpackagedDir, key)
    }

    /// Storage-safe form of the key.
    pub fn slug(&self) -> String {
        slugify(&self.key)
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.kind)
    }
}

/// Lowercase ASCII alphanumerics; every other run of characters becomes one `-`.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_structural_equality_as_map_key() {
        let mut providers = HashMap::new();
        providers.insert(Argument::string("version"), 1);

        assert_eq!(providers.get(&Argument::string("version")), Some(&1));
        assert_eq!(providers.get(&Argument::secret("version")), None);
    }

    #[test]
    fn test_serialized_type_is_integer() {
        let json = serde_json::to_value(Argument::packaged_dir("frontend")).unwrap();
        assert_eq!(json, serde_json::json!({"type": 6, "key": "frontend"}));

        let parsed: Argument = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, Argument::packaged_dir("frontend"));

        let invalid = serde_json::from_value::<Argument>(serde_json::json!({"type": 99, "key": "x"}));
        assert!(invalid.is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Commit SHA"), "commit-sha");
        assert_eq!(slugify("  docker/image:tag  "), "docker-image-tag");
        assert_eq!(slugify("already-slugged"), "already-slugged");
        assert_eq!(slugify("--"), "");
    }
}
