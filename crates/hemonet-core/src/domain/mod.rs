//! Domain models for hemonet.
//!
//! - `Observation`: one hemogram, canonical and raw fields side by side
//! - error taxonomy for conversion, classification, voting and configuration

pub mod error;
pub mod observation;

pub use error::{ClassifyError, ConfigError, ConversionError, VotingError};
pub use observation::{FieldValue, Observation};
