//! Voting coordinator.
//!
//! Turns one observation or a batch into final decisions:
//!
//! 1. Normalize the batch when a [`ConversionEngine`] is attached.
//! 2. Collect the local vote and, unless voting is disabled, one vote per
//!    classifying peer. Every peer runs on its own task and the coordinator
//!    waits for all of them; unreachable peers abstain.
//! 3. Combine the votes of each observation under the [`VotingPolicy`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::classifier::{ClassifierHandle, ClassifierProxy};
use crate::conversion::ConversionEngine;
use crate::domain::{ClassifyError, ConversionError, Observation, VotingError};
use crate::obs::{self, VoteSpan};
use crate::peer::{self, PeerNode, ShareSummary};
use crate::voting::{combine, Decision, Vote, VoteLedger, VotingPolicy, LOCAL_VOTER};
use hemonet_state::ErrorLog;
use peer_client::{Label, Prediction};

/// Fields never pushed to peers.
pub const SHARE_EXCLUDED_FIELDS: &[&str] = &["id", "user", "unit", "unit_ii"];

/// The classifier and voting policy in effect, resolved by the caller.
#[derive(Debug, Clone)]
pub struct ActiveClassifierConfig {
    pub handle: ClassifierHandle,
    pub policy: VotingPolicy,
    /// Turn a local failure into "no local vote" instead of an error.
    pub allow_local_abstain: bool,
}

impl ActiveClassifierConfig {
    pub fn new(handle: ClassifierHandle, policy: VotingPolicy) -> Self {
        Self {
            handle,
            policy,
            allow_local_abstain: false,
        }
    }

    pub fn with_local_abstain(mut self, allow: bool) -> Self {
        self.allow_local_abstain = allow;
        self
    }
}

/// Combined result of a network prediction, index-aligned with the input.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NetworkPrediction {
    pub labels: Vec<Label>,
    pub scores: Vec<f64>,
    pub ledger: VoteLedger,
}

impl NetworkPrediction {
    pub fn decision(&self, index: usize) -> Option<Decision> {
        Some(Decision {
            label: *self.labels.get(index)?,
            score: *self.scores.get(index)?,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub struct VotingCoordinator {
    classifier: ClassifierProxy,
    peers: Vec<PeerNode>,
    policy: VotingPolicy,
    allow_local_abstain: bool,
    engine: Option<ConversionEngine>,
}

impl VotingCoordinator {
    /// Create a coordinator. Peer names must be unique and must not clash
    /// with the local voter.
    pub fn new(
        active: ActiveClassifierConfig,
        peers: Vec<PeerNode>,
        error_log: Arc<dyn ErrorLog>,
    ) -> Result<Self, VotingError> {
        let mut seen = HashSet::new();
        for peer in &peers {
            if peer.name() == LOCAL_VOTER {
                return Err(VotingError::InvalidPeer(format!(
                    "peer name '{LOCAL_VOTER}' is reserved"
                )));
            }
            if !seen.insert(peer.name()) {
                return Err(VotingError::InvalidPeer(format!(
                    "duplicate peer name '{}'",
                    peer.name()
                )));
            }
        }

        let classifier = ClassifierProxy::new(active.handle, error_log)
            .map_err(VotingError::ClassificationUnavailable)?;

        Ok(Self {
            classifier,
            peers,
            policy: active.policy,
            allow_local_abstain: active.allow_local_abstain,
            engine: None,
        })
    }

    /// Normalize observations with `engine` before classifying them.
    pub fn with_conversion(mut self, engine: ConversionEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn policy(&self) -> &VotingPolicy {
        &self.policy
    }

    pub fn peers(&self) -> &[PeerNode] {
        &self.peers
    }

    pub fn classifier(&self) -> &ClassifierProxy {
        &self.classifier
    }

    /// Classify one observation with the local/external classifier only.
    #[instrument(skip_all, fields(classifier = %self.classifier.name()))]
    pub async fn predict_local(&self, observation: &Observation) -> Result<Vote, VotingError> {
        let batch = self.prepare(std::slice::from_ref(observation))?;
        let prediction = self
            .classifier
            .classify(&batch)
            .await
            .map_err(VotingError::ClassificationUnavailable)?;
        let (label, score) = prediction.get(0).ok_or(VotingError::NoVoters)?;
        Ok(Vote::new(label, score))
    }

    /// Classify a batch with the whole network and combine the votes.
    #[instrument(skip_all, fields(observations = observations.len(), policy = ?self.policy.kind()))]
    pub async fn network_predict(
        &self,
        observations: &[Observation],
    ) -> Result<NetworkPrediction, VotingError> {
        if observations.is_empty() {
            return Ok(NetworkPrediction::default());
        }
        let batch = Arc::new(self.prepare(observations)?);

        let (local, peers) = tokio::join!(
            self.classifier.classify(&batch),
            self.collect_peer_votes(Arc::clone(&batch))
        );

        let mut ledger = VoteLedger::new();
        match local {
            Ok(prediction) => ledger.record(LOCAL_VOTER, &prediction),
            Err(e) if self.allow_local_abstain => {
                obs::emit_peer_abstained(LOCAL_VOTER, &e);
                ledger.abstain(LOCAL_VOTER);
            }
            Err(e) => return Err(VotingError::ClassificationUnavailable(e)),
        }

        for (name, result) in peers {
            match result {
                Ok(prediction) => ledger.record(&name, &prediction),
                Err(e) if e.is_abstention() => {
                    obs::emit_peer_abstained(&name, &e);
                    ledger.abstain(&name);
                }
                Err(e) => return Err(VotingError::PeerFailure(e)),
            }
        }
        obs::emit_votes_collected(batch.len(), ledger.len(), ledger.abstained().len());

        let mut labels = Vec::with_capacity(batch.len());
        let mut scores = Vec::with_capacity(batch.len());
        for index in 0..batch.len() {
            let _span = VoteSpan::enter(index);
            let votes = ledger.votes_for(index);
            let decision = combine(&self.policy, &votes).ok_or(VotingError::NoVoters)?;
            obs::emit_vote_combined(index, decision.label, decision.score, votes.len());
            labels.push(decision.label);
            scores.push(decision.score);
        }

        Ok(NetworkPrediction {
            labels,
            scores,
            ledger,
        })
    }

    /// Push `observation` to the sharing peers in the background.
    pub fn share(&self, observation: &Observation, is_finished: bool) -> JoinHandle<ShareSummary> {
        let projection = peer::share_projection(observation, SHARE_EXCLUDED_FIELDS);
        peer::spawn_share(&self.peers, projection, is_finished)
    }

    fn prepare(&self, observations: &[Observation]) -> Result<Vec<Observation>, VotingError> {
        match &self.engine {
            Some(engine) => Ok(observations
                .iter()
                .map(|o| engine.normalize(o))
                .collect::<Result<Vec<_>, ConversionError>>()?),
            None => Ok(observations.to_vec()),
        }
    }

    /// One task per classifying peer, awaited in peer order.
    async fn collect_peer_votes(
        &self,
        batch: Arc<Vec<Observation>>,
    ) -> Vec<(String, Result<Prediction, ClassifyError>)> {
        if self.policy.is_disabled() {
            return Vec::new();
        }

        let (names, tasks): (Vec<String>, Vec<_>) = self
            .peers
            .iter()
            .filter(|peer| peer.classification_request_enabled())
            .map(|peer| {
                let peer = peer.clone();
                let batch = Arc::clone(&batch);
                let name = peer.name().to_string();
                (name, tokio::spawn(async move { peer.classify(&batch).await }))
            })
            .unzip();
        info!(peers = tasks.len(), "requesting peer votes");

        let outcomes = futures::future::join_all(tasks).await;
        names
            .into_iter()
            .zip(outcomes)
            .map(|(name, outcome)| {
                let result = outcome.unwrap_or_else(|e| {
                    warn!(peer = %name, error = %e, "peer vote task failed");
                    Err(ClassifyError::Unavailable {
                        voter: name.clone(),
                        status: None,
                        message: format!("vote task failed: {e}"),
                    })
                });
                (name, result)
            })
            .collect()
    }
}

impl std::fmt::Debug for VotingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VotingCoordinator")
            .field("classifier", &self.classifier)
            .field("peers", &self.peers.len())
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Model;
    use async_trait::async_trait;
    use hemonet_state::MemoryErrorLog;
    use peer_client::RemoteConfig;

    /// Labels POSITIVE when `wbc` exceeds 4.
    struct WbcModel;

    #[async_trait]
    impl Model for WbcModel {
        async fn predict(&self, observations: &[Observation]) -> anyhow::Result<Prediction> {
            let (labels, scores) = observations
                .iter()
                .map(|o| match o.number("wbc") {
                    Some(wbc) if wbc > 4.0 => (Label::Positive, 0.8),
                    _ => (Label::Negative, 0.3),
                })
                .unzip();
            Ok(Prediction::new(labels, scores))
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl Model for BrokenModel {
        async fn predict(&self, _observations: &[Observation]) -> anyhow::Result<Prediction> {
            anyhow::bail!("no model")
        }
    }

    fn log() -> Arc<MemoryErrorLog> {
        Arc::new(MemoryErrorLog::new())
    }

    fn unreachable_peer(name: &str, log: Arc<MemoryErrorLog>) -> PeerNode {
        let config = RemoteConfig::new(name, "http://127.0.0.1:1").with_timeout_secs(2);
        PeerNode::new(config, log).unwrap()
    }

    fn local(model: impl Model + 'static, policy: VotingPolicy) -> ActiveClassifierConfig {
        ActiveClassifierConfig::new(ClassifierHandle::Local(Arc::new(model)), policy)
    }

    #[test]
    fn test_reserved_and_duplicate_peer_names() {
        let log = log();
        let reserved = vec![unreachable_peer("local", log.clone())];
        assert!(matches!(
            VotingCoordinator::new(local(WbcModel, VotingPolicy::default()), reserved, log.clone()),
            Err(VotingError::InvalidPeer(_))
        ));

        let duplicate = vec![
            unreachable_peer("node-a", log.clone()),
            unreachable_peer("node-a", log.clone()),
        ];
        assert!(matches!(
            VotingCoordinator::new(local(WbcModel, VotingPolicy::default()), duplicate, log),
            Err(VotingError::InvalidPeer(_))
        ));
    }

    #[tokio::test]
    async fn test_predict_local_normalizes_first() {
        let coordinator =
            VotingCoordinator::new(local(WbcModel, VotingPolicy::default()), vec![], log())
                .unwrap()
                .with_conversion(ConversionEngine::hemogram().unwrap());
        let vote = coordinator
            .predict_local(&Observation::new().with("wbc", 5.0))
            .await
            .unwrap();
        assert_eq!(vote, Vote::positive(0.8));
    }

    #[tokio::test]
    async fn test_unreachable_peers_abstain() {
        let log = log();
        let peers = vec![unreachable_peer("node-a", log.clone())];
        let coordinator =
            VotingCoordinator::new(local(WbcModel, VotingPolicy::default()), peers, log.clone())
                .unwrap();

        let result = coordinator
            .network_predict(&[Observation::new().with("wbc", 5.0)])
            .await
            .unwrap();
        assert_eq!(result.labels, vec![Label::Positive]);
        assert_eq!(result.ledger.voters().collect::<Vec<_>>(), vec!["local"]);
        assert_eq!(result.ledger.abstained(), ["node-a".to_string()]);
        assert_eq!(log.entries_for("node-a").len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_policy_skips_peers() {
        let log = log();
        let peers = vec![unreachable_peer("node-a", log.clone())];
        let coordinator =
            VotingCoordinator::new(local(WbcModel, VotingPolicy::disabled()), peers, log.clone())
                .unwrap();

        let result = coordinator
            .network_predict(&[Observation::new().with("wbc", 1.0)])
            .await
            .unwrap();
        assert_eq!(result.decision(0), Some(Decision { label: Label::Negative, score: 0.3 }));
        assert!(result.ledger.abstained().is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_local_failure_is_fatal_by_default() {
        let coordinator =
            VotingCoordinator::new(local(BrokenModel, VotingPolicy::default()), vec![], log())
                .unwrap();
        let err = coordinator
            .network_predict(&[Observation::new()])
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::ClassificationUnavailable(_)));
    }

    #[tokio::test]
    async fn test_local_abstain_without_peers_is_no_voters() {
        let active = local(BrokenModel, VotingPolicy::default()).with_local_abstain(true);
        let coordinator = VotingCoordinator::new(active, vec![], log()).unwrap();
        let err = coordinator
            .network_predict(&[Observation::new()])
            .await
            .unwrap_err();
        assert!(matches!(err, VotingError::NoVoters));
    }

    #[tokio::test]
    async fn test_missing_reference_fails_before_any_vote() {
        let coordinator =
            VotingCoordinator::new(local(BrokenModel, VotingPolicy::default()), vec![], log())
                .unwrap()
                .with_conversion(ConversionEngine::hemogram().unwrap());
        let obs = Observation::new().with("neut_Upercentage_Rwbc", 10.0);
        let err = coordinator.network_predict(&[obs]).await.unwrap_err();
        assert!(matches!(err, VotingError::Conversion(_)));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let coordinator =
            VotingCoordinator::new(local(BrokenModel, VotingPolicy::default()), vec![], log())
                .unwrap();
        assert!(coordinator.network_predict(&[]).await.unwrap().is_empty());
    }
}
