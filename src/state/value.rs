// ABOUTME: Scalar values held by the state store and their persisted JSON form
// ABOUTME: Converts between JSON, raw user input and the value expected by an argument type

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{Result, StateError};
use crate::pipeline::{Argument, ArgumentType};

/// Files and directories are stored as their path string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    String(String),
    Int64(i64),
    Float64(f64),
    Bool(bool),
}

impl StateValue {
    /// Decode a persisted JSON value for `argument`.
    pub fn from_json(argument: &Argument, value: &Value) -> Result<Self> {
        let decoded = match argument.kind {
            ArgumentType::Int64 => value.as_i64().map(StateValue::Int64),
            ArgumentType::Float64 => value.as_f64().map(StateValue::Float64),
            ArgumentType::Bool => value.as_bool().map(StateValue::Bool),
            _ => value.as_str().map(|s| StateValue::String(s.to_string())),
        };

        decoded.ok_or_else(|| StateError::InvalidValue {
            key: argument.key.clone(),
            reason: format!("expected a {} value, found {}", argument.kind, value),
        })
    }

    /// Convert raw text (command line, prompt) into the value `argument` expects.
    pub fn parse(argument: &Argument, raw: &str) -> Result<Self> {
        let invalid = |reason: String| StateError::InvalidValue {
            key: argument.key.clone(),
            reason,
        };

        match argument.kind {
            ArgumentType::Int64 => raw
                .trim()
                .parse()
                .map(StateValue::Int64)
                .map_err(|e| invalid(format!("{e}"))),
            ArgumentType::Float64 => raw
                .trim()
                .parse()
                .map(StateValue::Float64)
                .map_err(|e| invalid(format!("{e}"))),
            ArgumentType::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(StateValue::Bool(true)),
                "false" | "0" => Ok(StateValue::Bool(false)),
                other => Err(invalid(format!("'{other}' is not a boolean"))),
            },
            _ => Ok(StateValue::String(raw.to_string())),
        }
    }

    pub fn into_string(self, argument: &Argument) -> Result<String> {
        match self {
            StateValue::String(value) => Ok(value),
            other => Err(other.mismatch(argument)),
        }
    }

    pub fn into_int64(self, argument: &Argument) -> Result<i64> {
        match self {
            StateValue::Int64(value) => Ok(value),
            other => Err(other.mismatch(argument)),
        }
    }

    pub fn into_float64(self, argument: &Argument) -> Result<f64> {
        match self {
            StateValue::Float64(value) => Ok(value),
            StateValue::Int64(value) => Ok(value as f64),
            other => Err(other.mismatch(argument)),
        }
    }

    pub fn into_bool(self, argument: &Argument) -> Result<bool> {
        match self {
            StateValue::Bool(value) => Ok(value),
            other => Err(other.mismatch(argument)),
        }
    }

    fn mismatch(&self, argument: &Argument) -> StateError {
        StateError::InvalidValue {
            key: argument.key.clone(),
            reason: format!("stored value {self:?} does not fit type {}", argument.kind),
        }
    }
}

/// One entry of a persisted state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    pub argument: Argument,
    pub value: Value,
}

impl StoredValue {
    pub fn new(argument: &Argument, value: &StateValue) -> Result<Self> {
        if let StateValue::Float64(number) = value {
            if !number.is_finite() {
                return Err(StateError::InvalidValue {
                    key: argument.key.clone(),
                    reason: format!("{number} cannot be stored"),
                });
            }
        }
        Ok(Self {
            argument: argument.clone(),
            value: serde_json::to_value(value)?,
        })
    }

    /// Whether this entry belongs to `argument`. Distinct keys can share a slug.
    pub fn is_for(&self, argument: &Argument) -> bool {
        self.argument.key == argument.key
    }

    /// Decode the value, checking it was stored under the same argument.
    pub fn decode(&self, argument: &Argument) -> Result<StateValue> {
        if !self.is_for(argument) {
            return Err(StateError::not_found(&argument.key));
        }
        if self.argument.kind != argument.kind {
            return Err(StateError::TypeMismatch {
                argument: self.argument.clone(),
                expected: argument.kind.to_string(),
            });
        }
        StateValue::from_json(argument, &self.value)
    }
}
