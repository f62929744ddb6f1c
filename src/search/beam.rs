use log::{debug, trace};
use rayon::prelude::*;

use crate::configuration::{ConfigId, Configuration, Derivation};
use crate::error::{Error, Result};
use crate::sentence::ParseInput;
use crate::transition::{Transition, MAX_TRANSITIONS};

use super::agenda::{Agenda, Candidate};
use super::{DecodeResult, SearchContext};

#[derive(Debug, Clone, Copy)]
struct Member {
    id: ConfigId,
    gold: bool,
}

/// Beam search over a transition system
#[derive(Debug, Clone)]
pub struct BeamSearch {
    beam_size: usize,
    concurrent: bool,
}

impl BeamSearch {
    pub fn new(beam_size: usize, concurrent: bool) -> Result<Self> {
        if beam_size < 1 {
            return Err(Error::invalid_input("beam_size must be at least 1"));
        }
        Ok(Self {
            beam_size,
            concurrent,
        })
    }

    pub fn beam_size(&self) -> usize {
        self.beam_size
    }

    /// Search until the best configuration of a round is terminal
    pub fn decode(&self, ctx: &SearchContext<'_>, input: &ParseInput) -> Result<DecodeResult> {
        self.search(ctx, input, None)
    }

    /// Search along a gold transition sequence
    ///
    /// Stops as soon as no beam member lies on the gold path, reporting the
    /// number of steps taken as the divergence, or once the gold sequence
    /// is exhausted.
    pub fn decode_early_update(
        &self,
        ctx: &SearchContext<'_>,
        input: &ParseInput,
        gold: &[Transition],
    ) -> Result<DecodeResult> {
        self.search(ctx, input, Some(gold))
    }

    fn search(
        &self,
        ctx: &SearchContext<'_>,
        input: &ParseInput,
        gold: Option<&[Transition]>,
    ) -> Result<DecodeResult> {
        let mut derivation = Derivation::new();
        let root = derivation.push(ctx.system.initial(input)?);
        let done = match gold {
            Some(gold) => gold.is_empty(),
            None => ctx.system.is_terminal(derivation.get(root)),
        };
        if done {
            return Ok(DecodeResult {
                derivation,
                best: root,
                divergence: None,
            });
        }

        let mut beam = vec![Member {
            id: root,
            gold: true,
        }];
        for round in 0..MAX_TRANSITIONS {
            let gold_next = gold.and_then(|g| g.get(round).copied());
            let survivors = self.expand(ctx, &derivation, &beam, gold_next)?;
            if survivors.is_empty() {
                return Err(Error::EmptyAgenda(round));
            }
            beam = self.materialize(ctx, &mut derivation, &beam, &survivors)?;

            let best = beam[0];
            trace!(
                "round {}: {} members, best {:.3} after {}",
                round,
                beam.len(),
                derivation.get(best.id).score(),
                derivation
                    .get(best.id)
                    .last_transition()
                    .map_or_else(|| "-".to_string(), |t| ctx.system.space().name(t))
            );

            let stop = match gold {
                Some(gold) => {
                    if !beam.iter().any(|m| m.gold) {
                        let k = (round + 1).min(derivation.get(best.id).len());
                        debug!("gold sequence left the beam after {} steps", k);
                        return Ok(DecodeResult {
                            derivation,
                            best: best.id,
                            divergence: Some(k),
                        });
                    }
                    round + 1 == gold.len()
                }
                None => ctx.system.is_terminal(derivation.get(best.id)),
            };
            if stop {
                return Ok(DecodeResult {
                    derivation,
                    best: best.id,
                    divergence: None,
                });
            }
        }
        Err(Error::TransitionLimit(MAX_TRANSITIONS))
    }

    /// Score every successor of every beam member into one bounded agenda
    fn expand(
        &self,
        ctx: &SearchContext<'_>,
        derivation: &Derivation,
        beam: &[Member],
        gold_next: Option<Transition>,
    ) -> Result<Vec<Candidate>> {
        let agenda = Agenda::new(self.beam_size);
        let push = |(rank, member): (usize, &Member)| -> Result<()> {
            let conf = derivation.get(member.id);
            let legal = ctx.system.legal(conf)?;
            if legal.is_empty() {
                // terminal configurations without IDLE ride along unchanged
                if ctx.system.is_terminal(conf) {
                    agenda.push(Candidate {
                        parent: rank,
                        transition: None,
                        score: conf.score(),
                        features: None,
                        gold: false,
                    });
                }
                return Ok(());
            }
            let (features, scores) = ctx.score(conf, &legal);
            for (&transition, score) in legal.transitions.iter().zip(scores.iter()) {
                agenda.push(Candidate {
                    parent: rank,
                    transition: Some(transition),
                    score: conf.score() + score,
                    features: Some(features.clone()),
                    gold: member.gold && gold_next == Some(transition),
                });
            }
            Ok(())
        };
        if self.concurrent {
            beam.par_iter().enumerate().try_for_each(push)?;
        } else {
            beam.iter().enumerate().try_for_each(push)?;
        }
        Ok(agenda.into_sorted())
    }

    /// Apply the surviving candidates and register them in the derivation
    fn materialize(
        &self,
        ctx: &SearchContext<'_>,
        derivation: &mut Derivation,
        beam: &[Member],
        survivors: &[Candidate],
    ) -> Result<Vec<Member>> {
        let confs: Vec<Option<Configuration>> = {
            let derivation = &*derivation;
            let apply = |c: &Candidate| -> Result<Option<Configuration>> {
                let parent = beam[c.parent].id;
                match c.transition {
                    Some(t) => ctx
                        .advance(derivation.get(parent), parent, t, c.features.clone(), c.score)
                        .map(Some),
                    None => Ok(None),
                }
            };
            if self.concurrent {
                survivors.par_iter().map(apply).collect::<Result<_>>()?
            } else {
                survivors.iter().map(apply).collect::<Result<_>>()?
            }
        };
        Ok(survivors
            .iter()
            .zip(confs)
            .map(|(c, conf)| Member {
                id: match conf {
                    Some(conf) => derivation.push(conf),
                    None => beam[c.parent].id,
                },
                gold: c.gold,
            })
            .collect())
    }
}
