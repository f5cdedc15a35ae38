//! The parameter store: named scalar inputs for one simulation run.
use crate::error::{VarroaPopError, VarroaPopResult};
use derive_more::Display;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// A scalar parameter value.
///
/// Values are kept typed until they are written to an input file or pushed to the engine, at
/// which point they are rendered with [`Display`](std::fmt::Display).
#[derive(Debug, Clone, PartialEq, Display, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// A whole number
    #[display("{_0}")]
    Integer(i64),
    /// A floating-point number
    #[display("{_0}")]
    Float(f64),
    /// Anything else (dates, booleans, file names)
    #[display("{_0}")]
    Text(String),
}

impl ParameterValue {
    /// Parse a value read from an input file, preferring the narrowest numeric type.
    ///
    /// A number is only inferred when it renders back to exactly `raw`, so values such as `007`
    /// or `1e3` stay as text and are written out unchanged.
    pub fn parse(raw: &str) -> Self {
        let value = if let Ok(value) = raw.parse::<i64>() {
            Self::Integer(value)
        } else if let Ok(value) = raw.parse::<f64>() {
            Self::Float(value)
        } else {
            return Self::Text(raw.to_string());
        };

        if value.to_string() == raw {
            value
        } else {
            Self::Text(raw.to_string())
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl TryFrom<toml::Value> for ParameterValue {
    type Error = VarroaPopError;

    fn try_from(value: toml::Value) -> VarroaPopResult<Self> {
        match value {
            toml::Value::Integer(value) => Ok(Self::Integer(value)),
            toml::Value::Float(value) => Ok(Self::Float(value)),
            toml::Value::Boolean(value) => Ok(value.into()),
            toml::Value::String(value) => Ok(Self::Text(value)),
            toml::Value::Datetime(value) => Ok(Self::Text(value.to_string())),
            toml::Value::Array(_) | toml::Value::Table(_) => Err(VarroaPopError::invalid_argument(
                "parameters must be a flat mapping of scalar values",
            )),
        }
    }
}

/// A set of named parameters with case-insensitive names.
///
/// Names are normalised to lowercase on insertion. Iteration follows insertion order, which has no
/// meaning to the engine but keeps generated input files stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet(IndexMap<String, ParameterValue>);

impl ParameterSet {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `parameters` into the current set, overwriting existing names.
    ///
    /// # Returns
    ///
    /// The merged set
    pub fn set<I, K, V>(&mut self, parameters: I) -> &Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParameterValue>,
    {
        for (name, value) in parameters {
            self.insert(name.as_ref(), value.into());
        }

        self
    }

    /// Insert a single parameter, returning the previous value if there was one
    pub fn insert(&mut self, name: &str, value: ParameterValue) -> Option<ParameterValue> {
        self.0.insert(name.to_lowercase(), value)
    }

    /// Merge a TOML table of parameters.
    ///
    /// Fails with [`VarroaPopError::InvalidArgument`] if any value is an array or a table. Nothing
    /// is merged in that case.
    pub fn set_from_toml(&mut self, table: toml::Table) -> VarroaPopResult<&Self> {
        let parsed: Vec<(String, ParameterValue)> = table
            .into_iter()
            .map(|(name, value)| Ok((name, ParameterValue::try_from(value)?)))
            .collect::<VarroaPopResult<_>>()?;

        Ok(self.set(parsed))
    }

    /// Remove a parameter by (case-insensitive) name, returning its value if it was present
    pub fn remove(&mut self, name: &str) -> Option<ParameterValue> {
        self.0.shift_remove(&name.to_lowercase())
    }

    /// Get the value of a parameter by (case-insensitive) name
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(&name.to_lowercase())
    }

    /// Iterate over the parameters in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// The number of parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read a `key=value` input file and merge its contents into this set.
    ///
    /// All whitespace is stripped from each line before splitting. Blank lines are ignored.
    pub fn load_from_file(&mut self, path: &Path) -> VarroaPopResult<&Self> {
        let contents = fs::read_to_string(path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                VarroaPopError::NotFound {
                    what: "Input file",
                    path: path.to_path_buf(),
                }
            } else {
                VarroaPopError::io(path, err)
            }
        })?;

        // Parse everything before merging so a bad line leaves the set untouched
        let mut parsed = Vec::new();
        for (num, line) in contents.lines().enumerate() {
            let line: String = line.chars().filter(|c| !c.is_whitespace()).collect();
            if line.is_empty() {
                continue;
            }

            let format_err = |message: &str| VarroaPopError::Format {
                path: path.to_path_buf(),
                line: num + 1,
                message: message.to_string(),
            };
            let mut parts = line.split('=');
            let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(format_err("expected exactly one key and one value"));
            };
            if name.is_empty() {
                return Err(format_err("missing key"));
            }

            parsed.push((name.to_string(), ParameterValue::parse(value)));
        }

        debug!("Read {} parameters from {}", parsed.len(), path.display());
        Ok(self.set(parsed))
    }
}

impl<K: AsRef<str>, V: Into<ParameterValue>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut set = Self::new();
        set.set(iter);
        set
    }
}
