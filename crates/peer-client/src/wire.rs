//! Wire types for the classification protocol.
//!
//! - `POST classify`: one observation in, `{"result": label, "prob": p}` out
//! - `POST classify_dataset`: `{"dataset": [...]}` in, index-aligned
//!   `{"result": [...], "prob": [...]}` out

use serde::{Deserialize, Serialize};

/// Binary classification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    pub fn is_positive(self) -> bool {
        matches!(self, Label::Positive)
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Positive => write!(f, "POSITIVE"),
            Label::Negative => write!(f, "NEGATIVE"),
        }
    }
}

/// Index-aligned labels and scores for a batch of observations.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Prediction {
    pub labels: Vec<Label>,
    pub scores: Vec<f64>,
}

impl Prediction {
    pub fn new(labels: Vec<Label>, scores: Vec<f64>) -> Self {
        Self { labels, scores }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Check the prediction covers exactly `expected` observations with
    /// scores in `[0, 1]`.
    pub fn check_shape(&self, expected: usize) -> std::result::Result<(), String> {
        if self.labels.len() != self.scores.len() {
            return Err(format!(
                "{} labels but {} scores",
                self.labels.len(),
                self.scores.len()
            ));
        }
        if self.labels.len() != expected {
            return Err(format!(
                "expected {} results, got {}",
                expected,
                self.labels.len()
            ));
        }
        if let Some(bad) = self.scores.iter().find(|s| !(0.0..=1.0).contains(*s)) {
            return Err(format!("score {bad} outside [0, 1]"));
        }
        Ok(())
    }

    /// Vote for a single observation.
    pub fn get(&self, index: usize) -> Option<(Label, f64)> {
        Some((*self.labels.get(index)?, *self.scores.get(index)?))
    }
}

/// Scalar or one-element list; single-observation responses use either.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub(crate) fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClassifyResponse {
    pub result: OneOrMany<Label>,
    pub prob: OneOrMany<f64>,
}

impl From<ClassifyResponse> for Prediction {
    fn from(r: ClassifyResponse) -> Self {
        Prediction::new(r.result.into_vec(), r.prob.into_vec())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DatasetRequest<'a, T> {
    pub dataset: &'a [T],
}
