//! Conversion engine.
//!
//! Resolves raw alternates (other units, percentages of a reference field)
//! into canonical fields. The engine is pure: [`ConversionEngine::normalize`]
//! returns a new observation, keeps the raw fields, and is idempotent.
//!
//! Evaluation order:
//! 1. [`ConversionEngine::validate`] rejects raw values whose reference
//!    field is null, before anything is converted.
//! 2. Unit rules are evaluated against the input to build the reference
//!    view, so a percentage whose reference is itself unit-converted sees the
//!    converted value on every pass.
//! 3. Every rule is applied in declared order; later rules overwrite earlier
//!    ones targeting the same canonical field.
//!
//! Converted values are computed in decimal and rounded to two places, ties
//! to even.

pub mod fields;
pub mod units;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ConversionError, FieldValue, Observation};

pub use fields::{
    parse_field_name, FieldRegistry, ParsedField, CONVERSION_MARKER, HEMOGRAM_RAW_FIELDS,
    REFERENCE_MARKER,
};

/// Minimum number of hemogram fields required before classifying.
pub const DEFAULT_MIN_HEMOGRAM_FIELDS: usize = 6;

/// How a raw value becomes a canonical one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversionKind {
    /// `reference * raw / 100`
    Percentage,
    /// Registered physical unit conversion
    Unit { from: String, to: String },
}

/// Declarative mapping from a raw field to its canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRule {
    pub raw_field: String,
    pub canonical_field: String,
    pub kind: ConversionKind,
    pub reference_field: Option<String>,
}

impl ConversionRule {
    pub fn percentage(raw_field: &str, canonical_field: &str, reference_field: &str) -> Self {
        Self {
            raw_field: raw_field.to_string(),
            canonical_field: canonical_field.to_string(),
            kind: ConversionKind::Percentage,
            reference_field: Some(reference_field.to_string()),
        }
    }

    pub fn unit(raw_field: &str, canonical_field: &str, from: &str, to: &str) -> Self {
        Self {
            raw_field: raw_field.to_string(),
            canonical_field: canonical_field.to_string(),
            kind: ConversionKind::Unit {
                from: from.to_string(),
                to: to.to_string(),
            },
            reference_field: None,
        }
    }

    /// Build a rule from an encoded field name; the target unit comes from
    /// the registry.
    pub fn from_field_name(name: &str, registry: &FieldRegistry) -> Result<Self, ConversionError> {
        let parsed = parse_field_name(name)?.ok_or_else(|| ConversionError::MalformedFieldName {
            field: name.to_string(),
        })?;

        if let Some(reference) = parsed.reference_field {
            return Ok(Self::percentage(name, &parsed.main_field, &reference));
        }

        let to = registry.unit_of(&parsed.main_field).ok_or_else(|| {
            ConversionError::UnknownCanonicalField {
                field: parsed.main_field.clone(),
            }
        })?;
        Ok(Self::unit(name, &parsed.main_field, &parsed.unit, to))
    }

    /// Compute the canonical value, quantized to two decimals.
    fn apply(&self, raw: f64, reference_view: &Observation) -> Result<f64, ConversionError> {
        let raw_value = self.decimal(&self.raw_field, raw)?;

        let converted = if let Some(reference) = &self.reference_field {
            let reference_value = numeric(reference_view, reference)?.ok_or_else(|| {
                ConversionError::MissingReferenceField {
                    raw_field: self.raw_field.clone(),
                    reference_field: reference.clone(),
                }
            })?;
            let reference_value = self.decimal(reference, reference_value)?;
            units::percentage(raw_value, reference_value)
        } else {
            match &self.kind {
                ConversionKind::Unit { from, to } => {
                    let conv = units::unit_conversion(from, to).ok_or_else(|| {
                        ConversionError::UnknownConversion {
                            raw_field: self.raw_field.clone(),
                            from: from.clone(),
                            to: to.clone(),
                        }
                    })?;
                    conv(raw_value)
                }
                ConversionKind::Percentage => {
                    return Err(ConversionError::UnknownConversion {
                        raw_field: self.raw_field.clone(),
                        from: units::PERCENTAGE.to_string(),
                        to: self.canonical_field.clone(),
                    })
                }
            }
        };

        converted
            .map(units::quantize)
            .and_then(units::to_f64)
            .ok_or_else(|| ConversionError::OutOfRange {
                field: self.raw_field.clone(),
            })
    }

    fn decimal(&self, field: &str, value: f64) -> Result<Decimal, ConversionError> {
        units::to_decimal(value).ok_or_else(|| ConversionError::OutOfRange {
            field: field.to_string(),
        })
    }
}

/// A raw value that cannot be used because its reference is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// The missing reference field
    pub field: String,
    /// The raw field that needs it
    pub raw_field: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: this field must be present in order to use {}",
            self.field, self.raw_field
        )
    }
}

impl From<FieldError> for ConversionError {
    fn from(e: FieldError) -> Self {
        ConversionError::MissingReferenceField {
            raw_field: e.raw_field,
            reference_field: e.field,
        }
    }
}

/// Statically configured set of conversion rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEngine {
    registry: FieldRegistry,
    rules: Vec<ConversionRule>,
}

impl ConversionEngine {
    /// Create an engine from declared rules.
    ///
    /// Rejects rules whose reference field is the target of a percentage
    /// rule; such chains would make the result depend on evaluation order.
    pub fn new(registry: FieldRegistry, rules: Vec<ConversionRule>) -> Result<Self, ConversionError> {
        for rule in &rules {
            let Some(reference) = &rule.reference_field else {
                continue;
            };
            let chained = rules
                .iter()
                .any(|r| r.reference_field.is_some() && &r.canonical_field == reference);
            if chained {
                return Err(ConversionError::ChainedReference {
                    raw_field: rule.raw_field.clone(),
                    reference_field: reference.clone(),
                });
            }
        }
        Ok(Self { registry, rules })
    }

    /// Create an engine from encoded raw field names, in the given order.
    pub fn from_field_names<'a>(
        registry: FieldRegistry,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ConversionError> {
        let rules = names
            .into_iter()
            .map(|name| ConversionRule::from_field_name(name, &registry))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(registry, rules)
    }

    /// The hemogram registry with the default raw alternates.
    pub fn hemogram() -> Result<Self, ConversionError> {
        Self::from_field_names(FieldRegistry::hemogram(), HEMOGRAM_RAW_FIELDS.iter().copied())
    }

    pub fn rules(&self) -> &[ConversionRule] {
        &self.rules
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    /// Report every unit rule without a registered conversion.
    pub fn check_rules(&self) -> Vec<ConversionError> {
        self.rules
            .iter()
            .filter_map(|rule| match &rule.kind {
                ConversionKind::Unit { from, to } if rule.reference_field.is_none() => {
                    units::unit_conversion(from, to)
                        .is_none()
                        .then(|| ConversionError::UnknownConversion {
                            raw_field: rule.raw_field.clone(),
                            from: from.clone(),
                            to: to.clone(),
                        })
                }
                ConversionKind::Percentage if rule.reference_field.is_none() => {
                    Some(ConversionError::UnknownConversion {
                        raw_field: rule.raw_field.clone(),
                        from: units::PERCENTAGE.to_string(),
                        to: rule.canonical_field.clone(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Raw fields with a value whose reference field is null or absent.
    pub fn validate(&self, observation: &Observation) -> Vec<FieldError> {
        self.rules
            .iter()
            .filter(|rule| observation.has_value(&rule.raw_field))
            .filter_map(|rule| {
                let reference = rule.reference_field.as_ref()?;
                (!observation.has_value(reference)).then(|| FieldError {
                    field: reference.clone(),
                    raw_field: rule.raw_field.clone(),
                })
            })
            .collect()
    }

    /// Resolve every raw alternate into its canonical field.
    pub fn normalize(&self, observation: &Observation) -> Result<Observation, ConversionError> {
        if let Some(err) = self.validate(observation).into_iter().next() {
            return Err(err.into());
        }

        let mut reference_view = observation.clone();
        for rule in self.rules.iter().filter(|r| r.reference_field.is_none()) {
            if let Some(raw) = numeric(observation, &rule.raw_field)? {
                let value = rule.apply(raw, observation)?;
                reference_view.set(&rule.canonical_field, Some(FieldValue::Number(value)));
            }
        }

        let mut output = observation.clone();
        let mut applied = 0usize;
        for rule in &self.rules {
            let Some(raw) = numeric(observation, &rule.raw_field)? else {
                continue;
            };
            let value = rule.apply(raw, &reference_view)?;
            output.set(&rule.canonical_field, Some(FieldValue::Number(value)));
            applied += 1;
        }

        debug!(applied, rules = self.rules.len(), "observation normalized");
        Ok(output)
    }

    /// Require at least `min` hemogram fields (canonical or raw) with a value.
    pub fn check_minimum_fields(
        &self,
        observation: &Observation,
        min: usize,
    ) -> Result<(), ConversionError> {
        let found = self
            .registry
            .fields()
            .chain(self.rules.iter().map(|r| r.raw_field.as_str()))
            .filter(|f| observation.has_value(f))
            .count();
        if found < min {
            return Err(ConversionError::NotEnoughFields {
                required: min,
                found,
            });
        }
        Ok(())
    }
}

fn numeric(observation: &Observation, field: &str) -> Result<Option<f64>, ConversionError> {
    match observation.get(field) {
        None => Ok(None),
        Some(FieldValue::Number(n)) => Ok(Some(n)),
        Some(FieldValue::Bool(_)) => Err(ConversionError::NonNumericValue {
            field: field.to_string(),
        }),
    }
}
