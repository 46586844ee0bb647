//! Vote ledger and combination policies.
//!
//! Every voter (the local/external classifier and each peer) contributes one
//! [`Vote`] per observation. [`combine`] reduces the votes for one
//! observation into a [`Decision`] under a [`VotingPolicy`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::VotingError;
use peer_client::{Label, Prediction};

/// Ledger identifier of the local/external classifier.
pub const LOCAL_VOTER: &str = "local";

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// How votes are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Peers are not consulted; the local vote is the answer.
    Disabled,
    /// The side with strictly more votes wins.
    #[default]
    Majority,
    /// POSITIVE when at least `threshold` voters say so.
    MinPositive,
    /// NEGATIVE when at least `threshold` voters say so.
    MinNegative,
}

/// Resolution of a majority tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    #[default]
    PreferLocal,
    PreferHighestScore,
}

/// A validated voting policy. `threshold` is always set for the
/// `Min*` kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingPolicy {
    kind: PolicyKind,
    tie_break: TieBreak,
    threshold: Option<u32>,
}

impl VotingPolicy {
    /// Build a policy, rejecting `Min*` kinds without a threshold.
    ///
    /// The threshold is dropped for kinds that do not use it.
    pub fn new(
        kind: PolicyKind,
        tie_break: TieBreak,
        threshold: Option<u32>,
    ) -> Result<Self, VotingError> {
        let threshold = match kind {
            PolicyKind::MinPositive | PolicyKind::MinNegative => {
                Some(threshold.ok_or_else(|| {
                    VotingError::InvalidPolicy(format!("{kind:?} requires a threshold"))
                })?)
            }
            PolicyKind::Disabled | PolicyKind::Majority => None,
        };
        Ok(Self {
            kind,
            tie_break,
            threshold,
        })
    }

    pub fn disabled() -> Self {
        Self {
            kind: PolicyKind::Disabled,
            tie_break: TieBreak::PreferLocal,
            threshold: None,
        }
    }

    pub fn majority(tie_break: TieBreak) -> Self {
        Self {
            kind: PolicyKind::Majority,
            tie_break,
            threshold: None,
        }
    }

    pub fn min_positive(threshold: u32) -> Self {
        Self {
            kind: PolicyKind::MinPositive,
            tie_break: TieBreak::PreferLocal,
            threshold: Some(threshold),
        }
    }

    pub fn min_negative(threshold: u32) -> Self {
        Self {
            kind: PolicyKind::MinNegative,
            tie_break: TieBreak::PreferLocal,
            threshold: Some(threshold),
        }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    pub fn threshold(&self) -> Option<u32> {
        self.threshold
    }

    pub fn is_disabled(&self) -> bool {
        self.kind == PolicyKind::Disabled
    }
}

impl Default for VotingPolicy {
    fn default() -> Self {
        Self::majority(TieBreak::default())
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One voter's result for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub label: Label,
    pub score: f64,
}

impl Vote {
    pub fn new(label: Label, score: f64) -> Self {
        Self { label, score }
    }

    pub fn positive(score: f64) -> Self {
        Self::new(Label::Positive, score)
    }

    pub fn negative(score: f64) -> Self {
        Self::new(Label::Negative, score)
    }
}

/// Per-voter, per-observation results of one call. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct VoteLedger {
    votes: BTreeMap<String, Vec<Vote>>,
    abstained: Vec<String>,
}

impl VoteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a voter's index-aligned prediction.
    pub fn record(&mut self, voter: &str, prediction: &Prediction) {
        let votes = prediction
            .labels
            .iter()
            .zip(&prediction.scores)
            .map(|(label, score)| Vote::new(*label, *score))
            .collect();
        self.votes.insert(voter.to_string(), votes);
    }

    /// Record a voter that produced no result.
    pub fn abstain(&mut self, voter: &str) {
        self.abstained.push(voter.to_string());
    }

    /// All votes cast for observation `index`, ordered by voter.
    pub fn votes_for(&self, index: usize) -> Vec<(&str, Vote)> {
        self.votes
            .iter()
            .filter_map(|(voter, votes)| Some((voter.as_str(), *votes.get(index)?)))
            .collect()
    }

    pub fn vote(&self, voter: &str, index: usize) -> Option<Vote> {
        self.votes.get(voter)?.get(index).copied()
    }

    /// Voters that produced a result.
    pub fn voters(&self) -> impl Iterator<Item = &str> {
        self.votes.keys().map(String::as_str)
    }

    pub fn abstained(&self) -> &[String] {
        &self.abstained
    }

    pub fn contains(&self, voter: &str) -> bool {
        self.votes.contains_key(voter)
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Combination
// ---------------------------------------------------------------------------

/// Final label and confidence for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Decision {
    pub label: Label,
    pub score: f64,
}

impl Decision {
    fn new(label: Label, score: f64) -> Self {
        Self { label, score }
    }
}

impl From<Vote> for Decision {
    fn from(vote: Vote) -> Self {
        Self::new(vote.label, vote.score)
    }
}

/// Tally of one observation's votes.
struct Tally {
    positive: Vec<f64>,
    negative: Vec<f64>,
    local: Option<Vote>,
}

impl Tally {
    fn new(votes: &[(&str, Vote)]) -> Self {
        let (positive, negative): (Vec<_>, Vec<_>) =
            votes.iter().map(|(_, v)| *v).partition(|v| v.label.is_positive());
        Self {
            positive: positive.iter().map(|v| v.score).collect(),
            negative: negative.iter().map(|v| v.score).collect(),
            local: votes
                .iter()
                .find(|(voter, _)| *voter == LOCAL_VOTER)
                .map(|(_, v)| *v),
        }
    }

    /// Mean score of one side. An empty side falls back to the local
    /// score, else `0.0`.
    fn mean(&self, label: Label) -> f64 {
        let side = match label {
            Label::Positive => &self.positive,
            Label::Negative => &self.negative,
        };
        if side.is_empty() {
            return self.local.map_or(0.0, |v| v.score);
        }
        side.iter().sum::<f64>() / side.len() as f64
    }

    fn decide(&self, label: Label) -> Decision {
        Decision::new(label, self.mean(label))
    }

    fn count(&self, label: Label) -> usize {
        match label {
            Label::Positive => self.positive.len(),
            Label::Negative => self.negative.len(),
        }
    }
}

/// Combine the votes cast for one observation.
///
/// Returns `None` when nobody voted. A single vote, or a disabled policy,
/// returns the vote as is (the local one when present).
pub fn combine(policy: &VotingPolicy, votes: &[(&str, Vote)]) -> Option<Decision> {
    let first = votes.first()?;
    let tally = Tally::new(votes);

    if votes.len() == 1 || policy.is_disabled() {
        return Some(tally.local.unwrap_or(first.1).into());
    }

    let decision = match (policy.kind, policy.threshold) {
        (PolicyKind::MinPositive, Some(threshold)) => {
            if tally.count(Label::Positive) >= threshold as usize {
                tally.decide(Label::Positive)
            } else {
                tally.decide(Label::Negative)
            }
        }
        (PolicyKind::MinNegative, Some(threshold)) => {
            if tally.count(Label::Negative) >= threshold as usize {
                tally.decide(Label::Negative)
            } else {
                tally.decide(Label::Positive)
            }
        }
        _ => majority(policy.tie_break, &tally),
    };
    Some(decision)
}

fn majority(tie_break: TieBreak, tally: &Tally) -> Decision {
    let positive = tally.count(Label::Positive);
    let negative = tally.count(Label::Negative);
    if positive > negative {
        return tally.decide(Label::Positive);
    }
    if negative > positive {
        return tally.decide(Label::Negative);
    }

    match tie_break {
        TieBreak::PreferLocal => match tally.local {
            Some(local) if local.label.is_positive() => tally.decide(Label::Positive),
            _ => tally.decide(Label::Negative),
        },
        TieBreak::PreferHighestScore => {
            if tally.mean(Label::Positive) > tally.mean(Label::Negative) {
                tally.decide(Label::Positive)
            } else {
                tally.decide(Label::Negative)
            }
        }
    }
}
