//! Key/value pass configuration as exchanged with the host graph.
//!
//! Getters return `Ok(None)` for absent keys and an error for present keys of
//! the wrong type, so callers can apply defaults without masking typos in
//! value types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::HostError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    FloatArray(Vec<f64>),
}

impl PropertyValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::String(_) => "string",
            PropertyValue::FloatArray(_) => "float array",
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        PropertyValue::Int(i64::from(v))
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(i64::from(v))
    }
}

impl From<f32> for PropertyValue {
    fn from(v: f32) -> Self {
        PropertyValue::Float(f64::from(v))
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<Vec<f32>> for PropertyValue {
    fn from(v: Vec<f32>) -> Self {
        PropertyValue::FloatArray(v.into_iter().map(f64::from).collect())
    }
}

/// Arrays are stored as floats; integer arrays read back via `get_u32_array`.
impl From<Vec<u32>> for PropertyValue {
    fn from(v: Vec<u32>) -> Self {
        PropertyValue::FloatArray(v.into_iter().map(f64::from).collect())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
    values: BTreeMap<String, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merges `other` over `self`.
    pub fn extend(&mut self, other: Properties) {
        self.values.extend(other.values);
    }

    fn type_error(key: &str, expected: &'static str, got: &PropertyValue) -> HostError {
        HostError::PropertyType {
            key: key.to_string(),
            expected,
            got: got.type_name(),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, HostError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(PropertyValue::Bool(b)) => Ok(Some(*b)),
            Some(v) => Err(Self::type_error(key, "bool", v)),
        }
    }

    /// Integers widen to float.
    pub fn get_f32(&self, key: &str) -> Result<Option<f32>, HostError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(PropertyValue::Float(f)) => Ok(Some(*f as f32)),
            Some(PropertyValue::Int(i)) => Ok(Some(*i as f32)),
            Some(v) => Err(Self::type_error(key, "float", v)),
        }
    }

    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, HostError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(PropertyValue::Int(i)) => u32::try_from(*i).map(Some).map_err(|_| {
                HostError::PropertyRange {
                    key: key.to_string(),
                    value: i.to_string(),
                    allowed: "0..=4294967295",
                }
            }),
            Some(v) => Err(Self::type_error(key, "unsigned int", v)),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<Option<&str>, HostError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(PropertyValue::String(s)) => Ok(Some(s.as_str())),
            Some(v) => Err(Self::type_error(key, "string", v)),
        }
    }

    pub fn get_f32_array(&self, key: &str) -> Result<Option<Vec<f32>>, HostError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(PropertyValue::FloatArray(a)) => Ok(Some(a.iter().map(|&f| f as f32).collect())),
            Some(v) => Err(Self::type_error(key, "float array", v)),
        }
    }

    /// Every element must be a whole number in `u32` range.
    pub fn get_u32_array(&self, key: &str) -> Result<Option<Vec<u32>>, HostError> {
        match self.values.get(key) {
            None => Ok(None),
            Some(PropertyValue::FloatArray(a)) => a
                .iter()
                .map(|&f| {
                    if f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) {
                        Ok(f as u32)
                    } else {
                        Err(HostError::PropertyRange {
                            key: key.to_string(),
                            value: f.to_string(),
                            allowed: "whole numbers in 0..=4294967295",
                        })
                    }
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(v) => Err(Self::type_error(key, "unsigned int array", v)),
        }
    }
}
