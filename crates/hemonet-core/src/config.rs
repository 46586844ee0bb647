//! Network configuration loaded from TOML.
//!
//! ```toml
//! [classifier]
//! name = "primary"
//! base_url = "https://classifier.example.org"
//!
//! [voting]
//! kind = "min_positive"
//! threshold = 2
//!
//! [[peers]]
//! name = "node-a"
//! base_url = "https://node-a.example.org"
//! data_sharing = true
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::ClassifierHandle;
use crate::coordinator::{ActiveClassifierConfig, VotingCoordinator};
use crate::domain::{ConfigError, VotingError};
use crate::peer::{PeerNode, SharingMode};
use crate::voting::{PolicyKind, TieBreak, VotingPolicy};
use hemonet_state::ErrorLog;
use peer_client::RemoteConfig;

/// Overrides `[classifier].token` when set.
pub const CLASSIFIER_TOKEN_ENV: &str = "HEMONET_CLASSIFIER_TOKEN";

/// `[voting]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingSection {
    #[serde(default)]
    pub kind: PolicyKind,
    #[serde(default)]
    pub tie_break: TieBreak,
    #[serde(default)]
    pub threshold: Option<u32>,
    #[serde(default)]
    pub allow_local_abstain: bool,
}

impl VotingSection {
    pub fn policy(&self) -> Result<VotingPolicy, VotingError> {
        VotingPolicy::new(self.kind, self.tie_break, self.threshold)
    }
}

fn default_true() -> bool {
    true
}

/// One `[[peers]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSection {
    #[serde(flatten)]
    pub remote: RemoteConfig,
    #[serde(default = "default_true")]
    pub classification_request: bool,
    #[serde(default)]
    pub data_sharing: bool,
    #[serde(default)]
    pub data_sharing_mode: SharingMode,
}

impl PeerSection {
    pub fn build(&self, error_log: Arc<dyn ErrorLog>) -> Result<PeerNode, ConfigError> {
        Ok(PeerNode::new(self.remote.clone(), error_log)?
            .with_classification_request(self.classification_request)
            .with_data_sharing(self.data_sharing, self.data_sharing_mode))
    }
}

/// Classifier, voting policy and peers of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub classifier: RemoteConfig,
    #[serde(default)]
    pub voting: VotingSection,
    #[serde(default)]
    pub peers: Vec<PeerSection>,
    /// JSON-lines error log; in-memory when unset.
    #[serde(default)]
    pub error_log: Option<PathBuf>,
}

impl NetworkConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: NetworkConfig = toml::from_str(s)?;
        config.voting.policy()?;
        config.classifier.validate()?;
        for peer in &config.peers {
            peer.remote.validate()?;
        }
        Ok(config)
    }

    /// Load from a file, applying the token environment override.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Ok(token) = std::env::var(CLASSIFIER_TOKEN_ENV) {
            debug!("classifier token taken from {}", CLASSIFIER_TOKEN_ENV);
            config.apply_token(token);
        }
        info!(
            path = %path.display(),
            peers = config.peers.len(),
            policy = ?config.voting.kind,
            "network config loaded"
        );
        Ok(config)
    }

    fn apply_token(&mut self, token: String) {
        if !token.is_empty() {
            self.classifier.token = Some(token);
        }
    }

    pub fn active_classifier(&self) -> Result<ActiveClassifierConfig, ConfigError> {
        let handle = ClassifierHandle::Remote(self.classifier.clone());
        Ok(ActiveClassifierConfig::new(handle, self.voting.policy()?)
            .with_local_abstain(self.voting.allow_local_abstain))
    }

    pub fn build_peers(&self, error_log: Arc<dyn ErrorLog>) -> Result<Vec<PeerNode>, ConfigError> {
        self.peers
            .iter()
            .map(|peer| peer.build(Arc::clone(&error_log)))
            .collect()
    }

    /// Coordinator for the configured remote classifier and peers.
    pub fn coordinator(&self, error_log: Arc<dyn ErrorLog>) -> Result<VotingCoordinator, ConfigError> {
        let peers = self.build_peers(Arc::clone(&error_log))?;
        Ok(VotingCoordinator::new(self.active_classifier()?, peers, error_log)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hemonet_state::MemoryErrorLog;
    use peer_client::ClientError;

    const FULL: &str = r#"
        [classifier]
        name = "primary"
        base_url = "https://classifier.example.org"
        token = "secret"
        timeout_secs = 5

        [voting]
        kind = "min_positive"
        tie_break = "prefer_highest_score"
        threshold = 2

        [[peers]]
        name = "node-a"
        base_url = "https://node-a.example.org"
        data_sharing = true
        data_sharing_mode = "on_update"

        [[peers]]
        name = "node-b"
        base_url = "https://node-b.example.org"
        classification_request = false
        dataset_endpoint = "/v2/dataset"
    "#;

    #[test]
    fn test_full_config() {
        let config = NetworkConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.classifier.token.as_deref(), Some("secret"));
        assert_eq!(config.classifier.timeout_secs, 5);
        let policy = config.voting.policy().unwrap();
        assert_eq!(policy.kind(), PolicyKind::MinPositive);
        assert_eq!(policy.tie_break(), TieBreak::PreferHighestScore);
        assert_eq!(policy.threshold(), Some(2));

        let a = &config.peers[0];
        assert!(a.classification_request);
        assert_eq!(a.data_sharing_mode, SharingMode::OnUpdate);
        assert_eq!(a.remote.classify_endpoint, "/api/v1/classify");

        let b = &config.peers[1];
        assert!(!b.classification_request);
        assert!(!b.data_sharing);
        assert_eq!(b.data_sharing_mode, SharingMode::OnFinished);
        assert_eq!(b.remote.dataset_url(), "https://node-b.example.org/v2/dataset");
        assert_eq!(b.remote.timeout_secs, 10);
    }

    #[test]
    fn test_defaults_to_majority_without_peers() {
        let config = NetworkConfig::from_toml_str(
            r#"
            [classifier]
            name = "primary"
            base_url = "http://localhost:8000"
            "#,
        )
        .unwrap();
        assert_eq!(config.voting.kind, PolicyKind::Majority);
        assert!(config.peers.is_empty());
        assert!(config.error_log.is_none());
    }

    #[test]
    fn test_missing_threshold_is_rejected_at_load() {
        let err = NetworkConfig::from_toml_str(
            r#"
            [classifier]
            name = "primary"
            base_url = "http://localhost:8000"

            [voting]
            kind = "min_negative"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Voting(VotingError::InvalidPolicy(_))));
    }

    #[test]
    fn test_zero_timeout_is_rejected_at_load() {
        let err = NetworkConfig::from_toml_str(
            r#"
            [classifier]
            name = "primary"
            base_url = "http://localhost:8000"

            [[peers]]
            name = "node-a"
            base_url = "http://node-a:8000"
            timeout_secs = 0
            "#,
        )
        .unwrap_err();
        match err {
            ConfigError::Client(ClientError::InvalidConfig { peer, .. }) => assert_eq!(peer, "node-a"),
            other => panic!("expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_policy_kind_is_a_parse_error() {
        let err = NetworkConfig::from_toml_str(
            r#"
            [classifier]
            name = "primary"
            base_url = "http://localhost:8000"

            [voting]
            kind = "unanimous"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_token_override() {
        let mut config = NetworkConfig::from_toml_str(FULL).unwrap();
        config.apply_token(String::new());
        assert_eq!(config.classifier.token.as_deref(), Some("secret"));
        config.apply_token("from-env".to_string());
        assert_eq!(config.classifier.token.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_load_from_file_and_build_coordinator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.toml");
        std::fs::write(&path, FULL).unwrap();

        let config = NetworkConfig::load(&path).unwrap();
        let coordinator = config.coordinator(Arc::new(MemoryErrorLog::new())).unwrap();
        assert_eq!(coordinator.peers().len(), 2);
        assert!(coordinator.classifier().is_remote());
        assert_eq!(coordinator.classifier().name(), "primary");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = NetworkConfig::load("/nonexistent/hemonet.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
