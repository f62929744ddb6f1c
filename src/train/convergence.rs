use log::{debug, info};

use crate::error::Result;
use crate::graph::GoldGraph;
use crate::search::{BeamSearch, SearchContext};
use crate::sentence::ParseInput;

/// State of a training run after one full pass over the corpus
pub struct Progress<'a> {
    /// Number of completed iterations
    pub iteration: usize,
    /// Instances whose prediction differed from gold in this iteration
    pub mistakes: usize,
    /// Instances decoded in this iteration
    pub instances: usize,
    /// Live, not yet finalized weights
    pub search: SearchContext<'a>,
    pub beam: &'a BeamSearch,
}

/// Decides after every iteration whether training should stop
pub trait StopCondition {
    fn should_stop(&mut self, progress: &Progress<'_>) -> Result<bool>;
}

/// Stop after a fixed number of iterations
#[derive(Debug, Clone, Copy)]
pub struct MaxIterations(pub usize);

impl StopCondition for MaxIterations {
    fn should_stop(&mut self, progress: &Progress<'_>) -> Result<bool> {
        Ok(progress.iteration >= self.0)
    }
}

/// Number of iterations without improvement that ends training
const PATIENCE: usize = 2;

/// Track labeled attachment accuracy on held-out data
///
/// Every check decodes the held-out set with the weights averaged so far,
/// against a frozen vocabulary.
/// Training stops once accuracy drops below the previous iteration, or has
/// not improved on the best value for two iterations in a row.
#[derive(Debug, Clone)]
pub struct HeldOut {
    instances: Vec<(ParseInput, GoldGraph)>,
    history: Vec<f64>,
    best: Option<f64>,
    stale: usize,
}

impl HeldOut {
    pub fn new(instances: Vec<(ParseInput, GoldGraph)>) -> Self {
        Self {
            instances,
            history: Vec::new(),
            best: None,
            stale: 0,
        }
    }

    /// Accuracy measured after each iteration so far
    pub fn history(&self) -> &[f64] {
        &self.history
    }

    /// Labeled attachment accuracy of `search` on the held-out set
    ///
    /// Instances that fail to decode count as entirely wrong.
    pub fn accuracy(&self, search: &SearchContext<'_>, beam: &BeamSearch) -> Result<f64> {
        let (mut correct, mut total) = (0, 0);
        for (input, gold) in &self.instances {
            let gold = gold.dependency();
            match beam.decode(search, input) {
                Ok(result) => {
                    let (c, t) = result.best().to_graph().attachment_score(gold);
                    correct += c;
                    total += t;
                }
                Err(e) if e.is_instance_local() => {
                    debug!("held-out instance failed to decode: {}", e);
                    total += gold.heads().iter().filter(|h| h.is_some()).count();
                }
                Err(e) => return Err(e),
            }
        }
        Ok(if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        })
    }

    /// Record one accuracy value and decide whether to stop
    fn observe(&mut self, accuracy: f64) -> bool {
        let previous = self.history.last().copied();
        self.history.push(accuracy);
        if previous.map_or(false, |p| accuracy < p) {
            return true;
        }
        match self.best {
            Some(best) if accuracy <= best => {
                self.stale += 1;
                self.stale >= PATIENCE
            }
            _ => {
                self.best = Some(accuracy);
                self.stale = 0;
                false
            }
        }
    }
}

impl StopCondition for HeldOut {
    fn should_stop(&mut self, progress: &Progress<'_>) -> Result<bool> {
        let averaged = progress.search.model.averaged_snapshot()?;
        let search = SearchContext {
            model: &averaged,
            ..progress.search
        };
        // held-out data must not grow the vocabulary being trained
        let vocab = progress.search.system.space().vocabulary();
        vocab.freeze();
        let accuracy = self.accuracy(&search, progress.beam);
        vocab.unfreeze_for_training();
        let accuracy = accuracy?;
        info!(
            "iteration {}: held-out LAS {:.4}",
            progress.iteration, accuracy
        );
        Ok(self.observe(accuracy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_when_accuracy_drops() {
        let mut held_out = HeldOut::new(Vec::new());
        assert!(!held_out.observe(0.5));
        assert!(!held_out.observe(0.7));
        assert!(held_out.observe(0.6));
        assert_eq!(held_out.history(), &[0.5, 0.7, 0.6]);
    }

    #[test]
    fn test_stops_after_two_flat_iterations() {
        let mut held_out = HeldOut::new(Vec::new());
        assert!(!held_out.observe(0.8));
        assert!(!held_out.observe(0.8));
        assert!(held_out.observe(0.8));
    }

    #[test]
    fn test_improvement_resets_patience() {
        let mut held_out = HeldOut::new(Vec::new());
        assert!(!held_out.observe(0.4));
        assert!(!held_out.observe(0.4));
        assert!(!held_out.observe(0.6));
        assert!(!held_out.observe(0.6));
        assert!(held_out.observe(0.6));
    }
}
