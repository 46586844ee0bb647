//! Conversion field names and the canonical hemogram field registry.
//!
//! A raw field name encodes its own conversion:
//! `<mainField>_U<unit>[_R<referenceField>]`, e.g. `hgb_UgdL` (hemoglobin
//! in g/dL) or `neut_Upercentage_Rwbc` (neutrophils as % of white cells).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::ConversionError;

pub const CONVERSION_MARKER: &str = "_U";
pub const REFERENCE_MARKER: &str = "_R";

/// Components of a conversion field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedField {
    pub main_field: String,
    pub unit: String,
    pub reference_field: Option<String>,
}

/// Parse a raw field name.
///
/// Returns `Ok(None)` for plain (canonical or auxiliary) field names.
pub fn parse_field_name(name: &str) -> Result<Option<ParsedField>, ConversionError> {
    let Some((main_field, rule)) = name.split_once(CONVERSION_MARKER) else {
        return Ok(None);
    };
    let (unit, reference_field) = match rule.split_once(REFERENCE_MARKER) {
        Some((unit, reference)) => (unit, Some(reference)),
        None => (rule, None),
    };

    if main_field.is_empty() || unit.is_empty() || reference_field == Some("") {
        return Err(ConversionError::MalformedFieldName {
            field: name.to_string(),
        });
    }

    Ok(Some(ParsedField {
        main_field: main_field.to_string(),
        unit: unit.to_string(),
        reference_field: reference_field.map(str::to_string),
    }))
}

/// Canonical fields and the unit each is stored in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRegistry {
    units: BTreeMap<String, String>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self {
            units: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, field: &str, unit: &str) -> Self {
        self.units.insert(field.to_string(), unit.to_string());
        self
    }

    /// The hemogram result fields.
    pub fn hemogram() -> Self {
        HEMOGRAM_FIELDS
            .iter()
            .fold(Self::new(), |reg, (field, unit)| reg.with_field(field, unit))
    }

    pub fn unit_of(&self, field: &str) -> Option<&str> {
        self.units.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.units.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::hemogram()
    }
}

const HEMOGRAM_FIELDS: &[(&str, &str)] = &[
    ("rbc", "x10e12L"),
    ("wbc", "x10e9L"),
    ("hgb", "gL"),
    ("hct", "LL"),
    ("mcv", "fL"),
    ("mch", "pgcell"),
    ("mchc", "gL"),
    ("rdw", "percent"),
    ("plt", "x10e9L"),
    ("neut", "x10e9L"),
    ("lymp", "x10e9L"),
    ("mono", "x10e9L"),
    ("eo", "x10e9L"),
    ("baso", "x10e9L"),
    ("iga", "x10e9L"),
    ("igm", "x10e9L"),
];

/// Raw alternates accepted by default.
pub const HEMOGRAM_RAW_FIELDS: &[&str] = &[
    "neut_Upercentage_Rwbc",
    "lymp_Upercentage_Rwbc",
    "mono_Upercentage_Rwbc",
    "eo_Upercentage_Rwbc",
    "baso_Upercentage_Rwbc",
    "hgb_UgdL",
    "hgb_UmmolL",
    "mchc_UgdL",
    "mch_Ufmolcell",
];
