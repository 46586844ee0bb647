//! Domain-level error taxonomy for hemonet.

use peer_client::ClientError;

/// Errors produced while validating or normalizing an observation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("field {reference_field} must be present in order to use {raw_field}")]
    MissingReferenceField {
        raw_field: String,
        reference_field: String,
    },

    #[error("no conversion registered from {from} to {to} (field {raw_field})")]
    UnknownConversion {
        raw_field: String,
        from: String,
        to: String,
    },

    #[error("field {field} must be numeric")]
    NonNumericValue { field: String },

    #[error("value of {field} is out of the convertible range")]
    OutOfRange { field: String },

    #[error("malformed conversion field name: {field}")]
    MalformedFieldName { field: String },

    #[error("unknown canonical field {field}")]
    UnknownCanonicalField { field: String },

    #[error("rule {raw_field} references {reference_field}, which is itself a percentage target")]
    ChainedReference {
        raw_field: String,
        reference_field: String,
    },

    #[error("at least {required} hemogram result fields must be submitted, got {found}")]
    NotEnoughFields { required: usize, found: usize },
}

/// Errors produced by a single classifier call (local or remote).
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("model failure in {classifier}: {source}")]
    ModelFailure {
        classifier: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{voter} unavailable: {message}")]
    Unavailable {
        voter: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{voter} protocol violation: {message}")]
    ProtocolViolation { voter: String, message: String },

    #[error("invalid classifier configuration for {voter}: {message}")]
    InvalidConfig { voter: String, message: String },
}

impl ClassifyError {
    /// Failures a voluntary voter may absorb by abstaining.
    pub fn is_abstention(&self) -> bool {
        matches!(
            self,
            ClassifyError::Unavailable { .. } | ClassifyError::ProtocolViolation { .. }
        )
    }
}

impl From<ClientError> for ClassifyError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unavailable {
                peer,
                status,
                message,
                ..
            } => ClassifyError::Unavailable {
                voter: peer,
                status,
                message,
            },
            ClientError::ProtocolViolation { peer, message, .. } => {
                ClassifyError::ProtocolViolation {
                    voter: peer,
                    message,
                }
            }
            ClientError::InvalidConfig { peer, message } => ClassifyError::InvalidConfig {
                voter: peer,
                message,
            },
        }
    }
}

/// Errors surfaced by the voting coordinator.
#[derive(Debug, thiserror::Error)]
pub enum VotingError {
    #[error("invalid voting policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid peer set: {0}")]
    InvalidPeer(String),

    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(#[source] ClassifyError),

    #[error("classification unavailable: no voter produced a result")]
    NoVoters,

    #[error("peer call failed unexpectedly: {0}")]
    PeerFailure(#[source] ClassifyError),

    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),
}

/// Errors loading a network configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("voting error: {0}")]
    Voting(#[from] VotingError),

    #[error("client error: {0}")]
    Client(#[from] ClientError),
}
