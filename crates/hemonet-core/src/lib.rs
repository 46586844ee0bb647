//! Hemonet Core Library
//!
//! Hemogram normalization and federated classification:
//!
//! - [`conversion`]: raw-field → canonical-field resolution (units and
//!   percentages of a reference field)
//! - [`classifier`]: local model or remote service behind one proxy
//! - [`peer`]: peer nodes, data sharing fan-out and metadata refresh
//! - [`voting`]: vote ledger and combination policies
//! - [`coordinator`]: collects votes from the network and combines them

pub mod classifier;
pub mod config;
pub mod conversion;
pub mod coordinator;
pub mod domain;
pub mod obs;
pub mod peer;
pub mod telemetry;
pub mod voting;

pub use classifier::{ClassifierHandle, ClassifierProxy, Model};
pub use config::{NetworkConfig, PeerSection, VotingSection};
pub use conversion::{
    parse_field_name, ConversionEngine, ConversionKind, ConversionRule, FieldError,
    FieldRegistry, ParsedField, DEFAULT_MIN_HEMOGRAM_FIELDS,
};
pub use coordinator::{
    ActiveClassifierConfig, NetworkPrediction, VotingCoordinator, SHARE_EXCLUDED_FIELDS,
};
pub use domain::{
    ClassifyError, ConfigError, ConversionError, FieldValue, Observation, VotingError,
};
pub use peer::{share_projection, should_share, spawn_share, PeerNode, ShareSummary, SharingMode};
pub use voting::{
    combine, Decision, PolicyKind, TieBreak, Vote, VoteLedger, VotingPolicy, LOCAL_VOTER,
};

pub use hemonet_state::{ErrorAction, ErrorLog, ErrorLogEntry, JsonlErrorLog, MemoryErrorLog};
pub use peer_client::{Label, Prediction, RemoteClient, RemoteConfig};
