//! Decoders over transition systems
//!
//! [`BeamSearch`] keeps the `B` best configurations per round and can stop
//! early once the gold path leaves the beam. [`Deterministic`] follows a
//! single path, chosen either by the model or by an oracle.

use std::sync::Arc;

use ndarray::Array1;

use crate::configuration::{ConfigId, Configuration, Derivation, FeatureVector};
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::model::AveragedMatrix;
use crate::transition::{Legal, Transition, TransitionSystem};

mod agenda;
mod beam;
mod deterministic;

pub use self::beam::BeamSearch;
pub use self::deterministic::{Deterministic, GoldSequence};

/// What a decoder needs to expand and score configurations
#[derive(Clone, Copy)]
pub struct SearchContext<'a> {
    pub system: &'a dyn TransitionSystem,
    pub extractor: &'a FeatureExtractor,
    pub model: &'a AveragedMatrix,
}

impl<'a> SearchContext<'a> {
    pub fn new(
        system: &'a dyn TransitionSystem,
        extractor: &'a FeatureExtractor,
        model: &'a AveragedMatrix,
    ) -> Self {
        Self {
            system,
            extractor,
            model,
        }
    }

    /// Features of `conf` and the score of every legal transition
    pub(crate) fn score(
        &self,
        conf: &Configuration,
        legal: &Legal,
    ) -> (Arc<FeatureVector>, Array1<f64>) {
        let features = Arc::new(self.extractor.extract(conf, legal.family));
        let scores = self.model.score_transitions(&features, &legal.transitions);
        (features, scores)
    }

    /// Apply `transition` and link the result back to its parent
    pub(crate) fn advance(
        &self,
        parent: &Configuration,
        parent_id: ConfigId,
        transition: Transition,
        features: Option<Arc<FeatureVector>>,
        score: f64,
    ) -> Result<Configuration> {
        let mut next = self.system.apply(parent, transition)?;
        next.previous = Some(parent_id);
        next.features = features;
        next.score = score;
        Ok(next)
    }
}

/// The outcome of one decode
#[derive(Debug, Clone)]
pub struct DecodeResult {
    pub derivation: Derivation,
    /// Highest scoring configuration when the search stopped
    pub best: ConfigId,
    /// Number of steps after which the gold path left the beam
    pub divergence: Option<usize>,
}

impl DecodeResult {
    pub fn best(&self) -> &Configuration {
        self.derivation.get(self.best)
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.derivation.transitions(self.best)
    }

    pub fn feature_history(&self) -> Vec<(Arc<FeatureVector>, Transition)> {
        self.derivation.feature_history(self.best)
    }
}
