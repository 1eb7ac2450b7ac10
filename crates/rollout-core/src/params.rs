//! Parameter merging and diffing.
//!
//! Parameters flow from two layers: defaults declared on the operator
//! version and overrides set on the instance spec. [`merge`] resolves the
//! effective value map handed to tasks; [`diff`] computes the symmetric
//! changed/removed delta that plan selection and the admission validator use
//! to decide which plan a parameter update triggers.

use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::models::Parameter;

/// Symmetric difference between two parameter maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterDiff {
    /// Keys added or whose value changed, with the new value
    pub changed: BTreeMap<String, String>,

    /// Keys present before but absent now, with the old value
    pub removed: BTreeMap<String, String>,
}

impl ParameterDiff {
    /// Whether nothing changed at all.
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }

    /// Names of every parameter the diff touches, changed and removed alike.
    pub fn names(&self) -> Vec<&str> {
        self.changed
            .keys()
            .chain(self.removed.keys())
            .map(String::as_str)
            .collect()
    }
}

/// Computes the symmetric diff between the previously-observed and the
/// current parameter map.
///
/// A key counts as changed when it is new or its value differs, and as
/// removed when it existed before and is gone now.
pub fn diff(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> ParameterDiff {
    let mut result = ParameterDiff::default();
    for (key, value) in new {
        if old.get(key) != Some(value) {
            result.changed.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in old {
        if !new.contains_key(key) {
            result.removed.insert(key.clone(), value.clone());
        }
    }
    result
}

/// Merges operator-version defaults with instance overrides into the
/// effective parameter map tasks render against.
///
/// # Errors
///
/// Returns a fatal error when a required parameter ends up with no value:
/// that is a structural problem no retry will fix.
pub fn merge(
    declared: &BTreeMap<String, Parameter>,
    overrides: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let mut merged = BTreeMap::new();
    for (name, parameter) in declared {
        match overrides.get(name).or(parameter.default.as_ref()) {
            Some(value) => {
                merged.insert(name.clone(), value.clone());
            }
            None if parameter.required => {
                return Err(EngineError::fatal(format!(
                    "required parameter \"{name}\" has neither a value nor a default"
                )));
            }
            None => {}
        }
    }
    // Overrides for undeclared parameters pass through untouched; schema
    // validation outside this core decides whether to allow them.
    for (name, value) in overrides {
        merged.entry(name.clone()).or_insert_with(|| value.clone());
    }
    Ok(merged)
}
