//! Route parameter values extracted from a matched path

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A single parameter value: one segment, or an ordered list for catch-all segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    /// Returns the value when it is a single segment
    pub fn as_single(&self) -> Option<&str> {
        match self {
            ParamValue::Single(v) => Some(v),
            ParamValue::Multi(_) => None,
        }
    }

    /// Flattens the value to a path fragment (`a/b/c` for catch-all values)
    pub fn to_path_string(&self) -> String {
        match self {
            ParamValue::Single(v) => v.clone(),
            ParamValue::Multi(vs) => vs.join("/"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::Multi(values)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Parameter name → value
pub type Params = HashMap<String, ParamValue>;

/// Query string pairs; ordered so generated URLs are deterministic
pub type Query = BTreeMap<String, String>;
