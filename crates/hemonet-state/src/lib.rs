//! Hemonet-State: error log sinks for remote calls
//!
//! This crate holds the append-only record of failed remote calls made by the
//! classification network (classify, data share, metadata refresh).
//!
//! ## Layer 0 - Observability/Persistence
//!
//! Focus: one entry per append, never failing the caller.
//!
//! ## Key Components
//!
//! - `ErrorLog`: the sink trait every remote client writes to
//! - `ErrorLogEntry`: a single failed call
//! - `MemoryErrorLog`: in-process sink (tests, short-lived tools)
//! - `JsonlErrorLog`: newline-delimited JSON file sink

mod error;
pub mod error_log;
pub mod fakes;
pub mod jsonl;

pub use error::StateError;
pub use error_log::{ErrorAction, ErrorLog, ErrorLogEntry};
pub use fakes::MemoryErrorLog;
pub use jsonl::JsonlErrorLog;

/// Result type for hemonet-state operations
pub type Result<T> = std::result::Result<T, StateError>;
