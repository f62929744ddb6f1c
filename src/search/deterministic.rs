use std::sync::Arc;

use log::debug;

use crate::configuration::{ConfigId, Configuration, Derivation, FeatureVector};
use crate::error::{Error, Result};
use crate::graph::GoldGraph;
use crate::sentence::ParseInput;
use crate::transition::{Transition, MAX_TRANSITIONS};

use super::{DecodeResult, SearchContext};

/// The oracle derivation of one training instance
#[derive(Debug, Clone)]
pub struct GoldSequence {
    pub transitions: Vec<Transition>,
    /// Features of the configuration each gold transition was taken in
    pub features: Vec<Arc<FeatureVector>>,
    pub derivation: Derivation,
    pub terminal: ConfigId,
}

impl GoldSequence {
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn terminal(&self) -> &Configuration {
        self.derivation.get(self.terminal)
    }
}

/// Single path decoding, the beam of width one without an agenda
pub struct Deterministic;

impl Deterministic {
    /// Follow the best scoring transition until a terminal configuration
    ///
    /// Ties go to the lowest transition ID.
    pub fn decode(ctx: &SearchContext<'_>, input: &ParseInput) -> Result<DecodeResult> {
        Self::run(ctx, input, None)
    }

    /// Like [`decode`](Deterministic::decode), but stop at the first
    /// transition that differs from `gold`
    pub fn decode_early_update(
        ctx: &SearchContext<'_>,
        input: &ParseInput,
        gold: &[Transition],
    ) -> Result<DecodeResult> {
        Self::run(ctx, input, Some(gold))
    }

    fn run(
        ctx: &SearchContext<'_>,
        input: &ParseInput,
        gold: Option<&[Transition]>,
    ) -> Result<DecodeResult> {
        let mut derivation = Derivation::new();
        let mut current = derivation.push(ctx.system.initial(input)?);
        for step in 0..=MAX_TRANSITIONS {
            let conf = derivation.get(current);
            let done = match gold {
                Some(gold) => step == gold.len(),
                None => ctx.system.is_terminal(conf),
            };
            if done {
                return Ok(DecodeResult {
                    derivation,
                    best: current,
                    divergence: None,
                });
            }
            if step == MAX_TRANSITIONS {
                break;
            }

            let legal = ctx.system.legal(conf)?;
            if legal.is_empty() {
                return Err(Error::EmptyAgenda(step));
            }
            let (features, scores) = ctx.score(conf, &legal);
            let mut best = (legal.transitions[0], conf.score() + scores[0]);
            for (&t, s) in legal.transitions.iter().zip(scores.iter()).skip(1) {
                let score = conf.score() + s;
                if score > best.1 {
                    best = (t, score);
                }
            }
            let (transition, score) = best;
            let next = ctx.advance(conf, current, transition, Some(features), score)?;
            current = derivation.push(next);

            if let Some(gold) = gold {
                if gold[step] != transition {
                    debug!("greedy path left the gold sequence after {} steps", step + 1);
                    return Ok(DecodeResult {
                        derivation,
                        best: current,
                        divergence: Some(step + 1),
                    });
                }
            }
        }
        Err(Error::TransitionLimit(MAX_TRANSITIONS))
    }

    /// Replay the oracle for `gold` and record every transition with the
    /// features it was taken on
    ///
    /// Fails with [`Error::OracleGoldMismatch`] when the oracle proposes a
    /// transition that is not legal, which happens for gold trees the system
    /// cannot derive.
    pub fn parse_gold(
        ctx: &SearchContext<'_>,
        input: &ParseInput,
        gold: &GoldGraph,
    ) -> Result<GoldSequence> {
        let mut oracle = ctx.system.oracle();
        oracle.set_gold(gold)?;

        let mut derivation = Derivation::new();
        let mut current = derivation.push(ctx.system.initial(input)?);
        let mut transitions = Vec::new();
        let mut features = Vec::new();
        while !ctx.system.is_terminal(derivation.get(current)) {
            if transitions.len() == MAX_TRANSITIONS {
                return Err(Error::TransitionLimit(MAX_TRANSITIONS));
            }
            let conf = derivation.get(current);
            let transition = oracle.transition(conf)?;
            let legal = ctx.system.legal(conf)?;
            if !legal.contains(transition) {
                return Err(Error::OracleGoldMismatch(format!(
                    "{} is not legal after {} transitions",
                    ctx.system.space().name(transition),
                    transitions.len()
                )));
            }
            let f = Arc::new(ctx.extractor.extract(conf, legal.family));
            let next = ctx.advance(conf, current, transition, Some(f.clone()), conf.score())?;
            current = derivation.push(next);
            transitions.push(transition);
            features.push(f);
        }
        Ok(GoldSequence {
            transitions,
            features,
            derivation,
            terminal: current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AveragedMatrix;
    use crate::search::tests::eager_fixture;
    use crate::transition::{TransitionSystem, SHIFT};

    #[test]
    fn test_parse_gold_reproduces_tree() {
        let (_, system, extractor, input, gold) = eager_fixture();
        let model = AveragedMatrix::new();
        let ctx = SearchContext::new(&system, &extractor, &model);
        let sequence = Deterministic::parse_gold(&ctx, &input, &gold).unwrap();

        assert_eq!(sequence.len(), 12);
        assert_eq!(sequence.features.len(), sequence.len());
        assert!(system.is_terminal(sequence.terminal()));
        assert_eq!(
            sequence.derivation.transitions(sequence.terminal),
            sequence.transitions
        );
        assert_eq!(sequence.terminal().to_graph().heads(), gold.dependency().heads());
    }

    #[test]
    fn test_untrained_decode_prefers_lowest_id() {
        let (_, system, extractor, input, _) = eager_fixture();
        let model = AveragedMatrix::new();
        let ctx = SearchContext::new(&system, &extractor, &model);
        let result = Deterministic::decode(&ctx, &input).unwrap();
        assert!(system.is_terminal(result.best()));
        assert_eq!(&result.transitions()[..4], &[SHIFT; 4]);
    }

    #[test]
    fn test_early_update_stops_at_mismatch() {
        let (_, system, extractor, input, gold) = eager_fixture();
        let model = AveragedMatrix::new();
        let ctx = SearchContext::new(&system, &extractor, &model);
        let sequence = Deterministic::parse_gold(&ctx, &input, &gold).unwrap();
        let result = Deterministic::decode_early_update(&ctx, &input, &sequence.transitions).unwrap();
        assert_eq!(result.divergence, Some(3));
        assert_eq!(result.feature_history().len(), 3);
    }
}
