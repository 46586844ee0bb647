//! Hemogram observation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single field value. Hemogram results are numeric; auxiliary variables
/// (sex, comorbidity flags) are booleans.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
}

impl FieldValue {
    pub fn as_f64(self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(n),
            FieldValue::Bool(_) => None,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Field name → optional value, ordered by field name.
///
/// Canonical fields (`wbc`, `neut`, ...) and raw alternates
/// (`neut_Upercentage_Rwbc`, `hgb_UgdL`, ...) share the same map. A key
/// mapped to `None` is present but null; both count as "no value".
/// Serializes as a flat JSON object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation {
    fields: BTreeMap<String, Option<FieldValue>>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.set(field, Some(value.into()));
        self
    }

    /// Builder-style explicit null.
    pub fn with_null(mut self, field: &str) -> Self {
        self.set(field, None);
        self
    }

    pub fn set(&mut self, field: &str, value: Option<FieldValue>) {
        self.fields.insert(field.to_string(), value);
    }

    /// Non-null value of `field`.
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        self.fields.get(field).copied().flatten()
    }

    /// Non-null numeric value of `field`.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_f64)
    }

    /// Whether `field` carries a non-null value.
    pub fn has_value(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<FieldValue>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Option<FieldValue>)> for Observation {
    fn from_iter<I: IntoIterator<Item = (S, Option<FieldValue>)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
