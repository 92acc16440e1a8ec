use log::warn;
use serde_json::{json, Map, Value};

use super::hash::{Algorithm, CombineHash, InputHash};
use crate::error::{MerkleError, Result};

/// Hash configuration of a tree, fixed at construction.
///
/// `hash` folds two child digests into a parent; `input_hash` turns a record
/// into its leaf digest. Both default to sha256.
#[derive(Clone, Debug, Default)]
pub struct TreeOptions {
    pub hash: CombineHash,
    pub input_hash: InputHash,
}

impl TreeOptions {
    pub fn with_hash(mut self, algorithm: Algorithm) -> Self {
        self.hash = algorithm.into();
        self
    }

    pub fn with_input_hash(mut self, algorithm: Algorithm) -> Self {
        self.input_hash = algorithm.into();
        self
    }

    pub fn with_custom_hash<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.hash = CombineHash::custom(f);
        self
    }

    pub fn with_custom_input_hash<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.input_hash = InputHash::custom(f);
        self
    }

    /// Read options from a loosely typed configuration object.
    ///
    /// `None` means "omitted". Only `hash` and `inputHash` are read, other
    /// keys are ignored.
    pub fn from_json(options: Option<&Value>) -> Result<Self> {
        let map = match options {
            None => return Ok(Self::default()),
            Some(Value::Object(map)) => map,
            Some(other) => {
                warn!("rejecting tree options of type {}", json_type(other));
                return Err(MerkleError::invalid(format!(
                    "options must be an object, got {}",
                    json_type(other)
                )));
            }
        };

        let mut out = Self::default();
        if let Some(algorithm) = algorithm_for(map, "hash")? {
            out.hash = algorithm.into();
        }
        if let Some(algorithm) = algorithm_for(map, "inputHash")? {
            out.input_hash = algorithm.into();
        }
        Ok(out)
    }

    /// The effective configuration, in the same key layout `from_json` reads.
    pub fn describe(&self) -> Value {
        json!({
            "hash": self.hash.label(),
            "inputHash": self.input_hash.label(),
        })
    }
}

fn algorithm_for(map: &Map<String, Value>, key: &str) -> Result<Option<Algorithm>> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::String(name)) => name.parse().map(Some),
        Some(other) => Err(MerkleError::invalid(format!(
            "option {key:?} must name a hash algorithm, got {}",
            json_type(other)
        ))),
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
