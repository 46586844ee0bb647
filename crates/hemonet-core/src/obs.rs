//! Structured observability hooks for network classification.
//!
//! This module provides:
//! - Observation-scoped tracing spans via the `VoteSpan` RAII guard
//! - Emission functions for vote collection, abstentions, combination and
//!   data-share dispatch
//!
//! Events are emitted at `info!` level (`warn!` for abstentions) and are
//! filtered through `RUST_LOG`.

use tracing::{info, warn};

use peer_client::Label;

/// RAII guard that enters a span for combining one observation's votes.
///
/// Only hold it across synchronous code; the entered span is not `Send`.
pub struct VoteSpan {
    _span: tracing::span::EnteredSpan,
}

impl VoteSpan {
    pub fn enter(index: usize) -> Self {
        let span = tracing::info_span!("hemonet.vote", index = index);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: every dispatched voter answered or abstained.
pub fn emit_votes_collected(observations: usize, voters: usize, abstained: usize) {
    info!(
        event = "votes.collected",
        observations = observations,
        voters = voters,
        abstained = abstained,
    );
}

/// Emit event: a voter produced no result and was dropped from the ledger.
pub fn emit_peer_abstained(voter: &str, error: &dyn std::fmt::Display) {
    warn!(event = "votes.abstained", voter = %voter, error = %error);
}

/// Emit event: final decision for one observation.
pub fn emit_vote_combined(index: usize, label: Label, score: f64, voters: usize) {
    info!(
        event = "votes.combined",
        index = index,
        label = %label,
        score = score,
        voters = voters,
    );
}

/// Emit event: data share pushed to `peers` peers in the background.
pub fn emit_share_dispatched(peers: usize, skipped: usize, is_finished: bool) {
    info!(
        event = "share.dispatched",
        peers = peers,
        skipped = skipped,
        is_finished = is_finished,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_span_create() {
        let _span = VoteSpan::enter(0);
        emit_vote_combined(0, Label::Positive, 0.83, 3);
    }
}
