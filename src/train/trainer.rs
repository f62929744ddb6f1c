use std::marker::PhantomData;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::convergence::{Progress, StopCondition};
use crate::error::{Error, Result};
use crate::graph::GoldGraph;
use crate::model::SparseVector;
use crate::parser::Parser;
use crate::search::{BeamSearch, DecodeResult, Deterministic, GoldSequence, SearchContext};
use crate::sentence::ParseInput;
use crate::transition::{Transition, TransitionSystem};

mod params;
mod strategy;

pub use self::params::PerceptronParams;
pub use self::strategy::UpdateStrategy;

/// Update strategy marker for the averaged perceptron.
#[derive(Debug, Clone, Copy)]
pub struct Averaged;

/// Update strategy marker for the plain perceptron.
#[derive(Debug, Clone, Copy)]
pub struct Trivial;

/// One sentence with its gold analysis
#[derive(Debug, Clone)]
pub struct TrainingInstance {
    pub input: ParseInput,
    pub gold: GoldGraph,
}

/// Summary of a training run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainingReport {
    /// Iterations actually run
    pub iterations: usize,
    /// Instances dropped because the oracle could not derive their gold tree
    pub dropped: usize,
    /// Instances skipped per iteration because decoding failed
    pub skipped: Vec<usize>,
    /// Instances per iteration whose prediction differed from gold
    pub mistakes: Vec<usize>,
    /// Number of weight updates applied
    pub updates: usize,
}

/// Structured perceptron trainer
#[derive(Debug)]
pub struct Trainer<S: UpdateStrategy> {
    /// Training instances
    instances: Vec<TrainingInstance>,
    /// Enable verbose output
    verbose: bool,
    /// Training parameters
    params: PerceptronParams,
    strategy: PhantomData<S>,
}

impl<S: UpdateStrategy> Default for Trainer<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: UpdateStrategy> Trainer<S> {
    /// Create a new trainer
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            verbose: false,
            params: PerceptronParams::default(),
            strategy: PhantomData,
        }
    }

    /// Log progress at info level instead of debug
    pub fn verbose(&mut self, enabled: bool) -> &mut Self {
        self.verbose = enabled;
        self
    }

    /// Get training parameters
    pub fn params(&self) -> &PerceptronParams {
        &self.params
    }

    /// Get training parameters for mutation
    pub fn params_mut(&mut self) -> &mut PerceptronParams {
        &mut self.params
    }

    pub fn with_params(mut self, params: PerceptronParams) -> Self {
        self.params = params;
        self
    }

    /// Set maximum iterations (builder pattern)
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Result<Self> {
        self.params.set_max_iterations(max_iterations)?;
        Ok(self)
    }

    /// Set the shuffling seed, `None` for a random one (builder pattern)
    pub fn with_shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.params.set_shuffle_seed(seed);
        self
    }

    /// Enable or disable early update (builder pattern)
    pub fn with_early_update(mut self, enabled: bool) -> Self {
        self.params.set_early_update(enabled);
        self
    }

    /// Append a training instance
    pub fn append<I, G>(&mut self, input: I, gold: G)
    where
        I: Into<ParseInput>,
        G: Into<GoldGraph>,
    {
        self.instances.push(TrainingInstance {
            input: input.into(),
            gold: gold.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Clear all training data
    pub fn clear(&mut self) {
        self.instances.clear();
    }

    /// Train the parser's weights for the configured number of iterations
    pub fn train(&self, parser: &mut Parser) -> Result<TrainingReport> {
        self.run(parser, None)
    }

    /// Train, additionally consulting `stop` after every iteration
    pub fn train_with(
        &self,
        parser: &mut Parser,
        stop: &mut dyn StopCondition,
    ) -> Result<TrainingReport> {
        self.run(parser, Some(stop))
    }

    fn log(&self, msg: std::fmt::Arguments<'_>) {
        if self.verbose {
            info!("{}", msg);
        } else {
            debug!("{}", msg);
        }
    }

    fn run(
        &self,
        parser: &mut Parser,
        mut stop: Option<&mut dyn StopCondition>,
    ) -> Result<TrainingReport> {
        if self.instances.is_empty() {
            return Err(Error::invalid_input("no training data"));
        }
        let vocab = parser.vocabulary().clone();
        let beam = BeamSearch::new(parser.config().beam_size, parser.config().concurrent)?;
        let (system, extractor, model) = parser.parts_mut();
        vocab.unfreeze_for_training();

        let mut report = TrainingReport::default();
        self.log(format_args!(
            "Deriving gold sequences for {} instances with {}...",
            self.instances.len(),
            system.name()
        ));
        let golds = {
            let ctx = SearchContext::new(system, extractor, model);
            let mut golds = Vec::with_capacity(self.instances.len());
            for (i, inst) in self.instances.iter().enumerate() {
                match Deterministic::parse_gold(&ctx, &inst.input, &inst.gold) {
                    Ok(gold) => golds.push((inst, gold)),
                    Err(e) if e.is_instance_local() => {
                        warn!("dropping training instance {}: {}", i, e);
                        report.dropped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
            golds
        };
        if golds.is_empty() {
            return Err(Error::invalid_input(
                "no training instance has an oracle derivation",
            ));
        }
        if report.dropped > 0 {
            warn!(
                "dropped {} of {} training instances",
                report.dropped,
                self.instances.len()
            );
        }

        let mut order: Vec<usize> = (0..golds.len()).collect();
        let mut rng = match self.params.shuffle_seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        self.log(format_args!(
            "Training with the {} perceptron, beam size {}...",
            S::name(),
            beam.beam_size()
        ));
        for iteration in 0..self.params.max_iterations() {
            if order.len() > 1 {
                order.shuffle(&mut rng);
            }
            let (mut mistakes, mut skipped) = (0, 0);
            for &idx in &order {
                let (inst, gold) = &golds[idx];
                let decoded = {
                    let ctx = SearchContext::new(system, extractor, model);
                    if self.params.early_update() {
                        beam.decode_early_update(&ctx, &inst.input, &gold.transitions)
                    } else {
                        beam.decode(&ctx, &inst.input)
                    }
                };
                match decoded {
                    Ok(result) => {
                        let k = result.divergence.unwrap_or(usize::MAX);
                        let predicted = result.transitions();
                        if predicted[..] != gold.transitions[..k.min(gold.len())] {
                            mistakes += 1;
                            let delta = structured_delta(gold, &result, k);
                            if !delta.is_empty() {
                                model.apply_delta(&delta)?;
                                report.updates += 1;
                            }
                        }
                    }
                    Err(e) if e.is_instance_local() => {
                        debug!("skipping instance {}: {}", idx, e);
                        skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
                S::step(model);
            }

            report.iterations = iteration + 1;
            report.mistakes.push(mistakes);
            report.skipped.push(skipped);
            self.log(format_args!(
                "Iteration {}: {} of {} instances mistaken, {} skipped, {} weights",
                iteration + 1,
                mistakes,
                golds.len(),
                skipped,
                model.nnz()
            ));

            if let Some(stop) = stop.as_deref_mut() {
                let progress = Progress {
                    iteration: iteration + 1,
                    mistakes,
                    instances: golds.len(),
                    search: SearchContext::new(system, extractor, model),
                    beam: &beam,
                };
                if stop.should_stop(&progress)? {
                    self.log(format_args!("Stopping after iteration {}", iteration + 1));
                    break;
                }
            }
        }

        S::finalize(model)?;
        vocab.freeze();
        self.log(format_args!(
            "Training completed: {} updates over {} generations",
            report.updates,
            model.generation()
        ));
        Ok(report)
    }
}

/// `(gold - predicted)` over the first `k` steps of both derivations
fn structured_delta(
    gold: &GoldSequence,
    predicted: &DecodeResult,
    k: usize,
) -> SparseVector<(u32, Transition)> {
    let mut delta = SparseVector::new();
    for (features, &t) in gold.features.iter().zip(&gold.transitions).take(k) {
        for &f in features.iter() {
            delta.increment((f, t));
        }
    }
    for (features, t) in predicted.feature_history().into_iter().take(k) {
        for &f in features.iter() {
            delta.decrement((f, t));
        }
    }
    delta
}

impl Trainer<Averaged> {
    /// Create a new averaged perceptron trainer
    pub fn averaged() -> Self {
        Self::new()
    }
}

impl Trainer<Trivial> {
    /// Create a new plain perceptron trainer
    pub fn trivial() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AveragedMatrix;
    use crate::search::tests::eager_fixture;
    use crate::transition::SHIFT;

    #[test]
    fn test_shared_prefix_cancels() {
        let (_, system, extractor, input, gold) = eager_fixture();
        let model = AveragedMatrix::new();
        let ctx = SearchContext::new(&system, &extractor, &model);
        let sequence = Deterministic::parse_gold(&ctx, &input, &gold).unwrap();
        let result =
            Deterministic::decode_early_update(&ctx, &input, &sequence.transitions).unwrap();
        assert_eq!(result.divergence, Some(3));

        // SH SH agree, then gold attaches where the model shifted
        let delta = structured_delta(&sequence, &result, 3);
        let diverged = &sequence.features[2];
        let attach = sequence.transitions[2];
        assert!(!delta.is_empty());
        for (&(f, t), &v) in delta.iter() {
            assert!(diverged.contains(&f));
            if t == attach {
                assert!(v > 0.0);
            } else {
                assert_eq!(t, SHIFT);
                assert!(v < 0.0);
            }
        }
        for &f in diverged.iter() {
            assert!(delta.get(&(f, attach)) > 0.0);
            assert!(delta.get(&(f, SHIFT)) < 0.0);
        }
    }

    #[test]
    fn test_builders_and_instances() {
        let mut trainer = Trainer::averaged()
            .with_max_iterations(3)
            .unwrap()
            .with_shuffle_seed(Some(9))
            .with_early_update(false);
        assert_eq!(trainer.params().max_iterations(), 3);
        assert_eq!(trainer.params().shuffle_seed(), Some(9));
        assert!(!trainer.params().early_update());

        let (_, _, _, input, gold) = eager_fixture();
        trainer.append(input, gold);
        assert_eq!(trainer.len(), 1);
        trainer.clear();
        assert!(trainer.is_empty());
        assert!(Trainer::trivial().with_max_iterations(0).is_err());
    }
}
