use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::graph::GoldGraph;
use crate::sentence::{DepNode, ParseInput, TaggedToken};

use super::{Family, Legal, Oracle, Transition, TransitionKind, TransitionSpace, TransitionSystem, IDLE};

/// Morphological disambiguation: one MD transition per lattice
///
/// Each MD commits a spellout of the front lattice and appends its morphemes
/// to the node table and to the queue.
#[derive(Debug, Clone)]
pub struct Morph {
    space: TransitionSpace,
}

impl Morph {
    pub fn new(space: TransitionSpace) -> Self {
        Self { space }
    }

    pub(crate) fn md_legal(&self, conf: &Configuration) -> Result<Vec<Transition>> {
        let lattice = match conf.morph().and_then(|m| m.current_lattice()) {
            Some(lattice) => lattice,
            None => return Ok(Vec::new()),
        };
        lattice
            .spellouts()
            .iter()
            .map(|s| self.space.md_for(s))
            .collect()
    }

    pub(crate) fn md_apply(&self, conf: &Configuration, transition: Transition) -> Result<Configuration> {
        let key = self.space.spellout_key(transition).ok_or_else(|| {
            Error::precondition(format!("{} is not an MD transition", self.space.name(transition)))
        })?;
        let morph = conf
            .morph()
            .ok_or_else(|| Error::precondition("MD on a configuration without lattices"))?;
        let lattice_idx = *morph
            .lattice_queue()
            .front()
            .ok_or_else(|| Error::precondition("MD with no lattice left"))?;
        let lattice = &morph.lattices()[lattice_idx];
        let spellout_idx = self.space.find_spellout(lattice, &key).ok_or_else(|| {
            Error::precondition(format!("{} is not a spellout of {}", key, lattice.token))
        })?;

        let mut next = conf.successor(transition);
        if let Some(state) = next.morph.as_mut() {
            state.lattice_queue.pop_front();
            state.mappings.push((lattice_idx, spellout_idx));
        }
        let vocab = self.space.vocabulary();
        for m in lattice.spellouts()[spellout_idx].morphemes() {
            let node = DepNode::resolve(TaggedToken::new(m.form.clone(), m.pos.clone()), vocab)
                .with_morph_tags(&m.cpos, &m.feature_str, vocab);
            let id = next.push_node(node);
            next.queue.push_back(id);
        }
        Ok(next)
    }
}

impl TransitionSystem for Morph {
    fn name(&self) -> &'static str {
        "morph"
    }

    fn space(&self) -> &TransitionSpace {
        &self.space
    }

    fn initial(&self, input: &ParseInput) -> Result<Configuration> {
        match input {
            ParseInput::Lattices(lattices) => Ok(Configuration::with_lattices(
                DepNode::root(self.space.vocabulary()),
                lattices,
            )),
            ParseInput::Tagged(_) => Err(Error::invalid_input(
                "morphological disambiguation needs lattices",
            )),
        }
    }

    fn apply(&self, conf: &Configuration, transition: Transition) -> Result<Configuration> {
        match self.space.kind(transition) {
            TransitionKind::Idle if self.is_terminal(conf) => Ok(conf.successor(IDLE)),
            TransitionKind::MorphDecide => self.md_apply(conf, transition),
            _ => Err(Error::precondition(format!(
                "{} is not legal for morphological disambiguation",
                self.space.name(transition)
            ))),
        }
    }

    fn legal(&self, conf: &Configuration) -> Result<Legal> {
        if self.is_terminal(conf) {
            return Ok(Legal::new(Family::Idle, vec![IDLE]));
        }
        Ok(Legal::new(Family::Morph, self.md_legal(conf)?))
    }

    fn is_terminal(&self, conf: &Configuration) -> bool {
        conf.lattices_done()
    }

    fn oracle(&self) -> Box<dyn Oracle + Send + '_> {
        Box::new(MorphOracle::new(&self.space))
    }
}

/// Replays the gold spellouts, one per lattice
#[derive(Debug)]
pub(crate) struct MorphOracle<'a> {
    space: &'a TransitionSpace,
    gold: Vec<String>,
}

impl<'a> MorphOracle<'a> {
    pub(crate) fn new(space: &'a TransitionSpace) -> Self {
        Self {
            space,
            gold: Vec::new(),
        }
    }
}

impl Oracle for MorphOracle<'_> {
    fn name(&self) -> &'static str {
        "morph static"
    }

    fn set_gold(&mut self, gold: &GoldGraph) -> Result<()> {
        let mappings = gold
            .mappings()
            .ok_or_else(|| Error::invalid_input("morph oracle needs gold spellouts"))?;
        let projection = self.space.projection();
        self.gold = mappings.iter().map(|m| projection.project(&m.spellout)).collect();
        Ok(())
    }

    fn transition(&self, conf: &Configuration) -> Result<Transition> {
        if conf.lattices_done() {
            return Ok(IDLE);
        }
        let done = conf.morph().map_or(0, |m| m.num_mappings());
        let key = self.gold.get(done).ok_or_else(|| {
            Error::OracleGoldMismatch(format!("no gold spellout for lattice {}", done))
        })?;
        match conf.morph().and_then(|m| m.current_lattice()) {
            Some(lattice) if self.space.find_spellout(lattice, key).is_some() => self.space.md(key),
            Some(lattice) => Err(Error::OracleGoldMismatch(format!(
                "gold spellout {} missing from lattice {}",
                key, lattice.token
            ))),
            None => Err(Error::OracleGoldMismatch(format!("lattice {} missing", done))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::MorphDependencyGraph;
    use crate::lattice::tests::ambiguous_lattice;
    use crate::lattice::{Lattice, LatticeSentence, Morpheme};
    use crate::vocabulary::Vocabulary;

    /// "bbit hlk": gold splits the first token into three morphemes
    pub(crate) fn morph_fixture() -> (Arc<Vocabulary>, TransitionSpace, LatticeSentence, GoldGraph) {
        let vocab = Arc::new(Vocabulary::new());
        let walked = Lattice::new("hlk", vec![Morpheme::new(3, 4, "hlk", "VB", "VB", "")]).unwrap();
        let ambiguous = LatticeSentence::new(vec![ambiguous_lattice(), walked.clone()]);
        let gold = LatticeSentence::new(vec![
            Lattice::new(
                "bbit",
                vec![
                    Morpheme::new(0, 1, "b", "PREP", "PREP", ""),
                    Morpheme::new(1, 2, "h", "DEF", "DEF", ""),
                    Morpheme::new(2, 3, "bit", "NN", "NN", "gen=M"),
                ],
            )
            .unwrap(),
            walked,
        ]);
        let heads = [(4, "PREP"), (3, "DEF"), (1, "POBJ"), (0, "PRED")];
        let (graph, added) =
            MorphDependencyGraph::combine_gold(&gold, ambiguous, &heads, &vocab).unwrap();
        assert!(!added);
        let lattices = graph.lattices.clone();
        let space = TransitionSpace::new(vocab.clone()).unwrap();
        (vocab, space, lattices, GoldGraph::from(graph))
    }

    #[test]
    fn test_oracle_commits_gold_spellouts() {
        let (_, space, lattices, gold) = morph_fixture();
        let system = Morph::new(space);
        let mut oracle = system.oracle();
        oracle.set_gold(&gold).unwrap();

        let mut conf = system.initial(&ParseInput::Lattices(lattices)).unwrap();
        let legal = system.legal(&conf).unwrap();
        assert_eq!(legal.family, Family::Morph);
        assert_eq!(legal.transitions.len(), 3);

        while !system.is_terminal(&conf) {
            crate::transition::tests::assert_apply_matches_legal(&system, &conf);
            let t = oracle.transition(&conf).unwrap();
            assert!(system.legal(&conf).unwrap().contains(t));
            conf = system.apply(&conf, t).unwrap();
        }
        assert_eq!(conf.len(), 2);
        assert_eq!(conf.nodes().len(), 5);
        assert_eq!(conf.queue().iter().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert_eq!(conf.node(3).and_then(|n| n.cpos.as_deref()), Some("NN"));
        assert_eq!(conf.node(3).and_then(|n| n.features.as_deref()), Some("gen=M"));
        assert_eq!(Some(conf.morph().unwrap().mappings().as_slice()), gold.mappings());
        assert_eq!(oracle.transition(&conf).unwrap(), IDLE);
    }

    #[test]
    fn test_terminal_offers_idle() {
        let (_, space, lattices, _) = morph_fixture();
        let system = Morph::new(space);
        let mut conf = system.initial(&ParseInput::Lattices(lattices)).unwrap();
        while !system.is_terminal(&conf) {
            let t = system.legal(&conf).unwrap().transitions[0];
            conf = system.apply(&conf, t).unwrap();
        }
        let legal = system.legal(&conf).unwrap();
        assert_eq!(legal, Legal::new(Family::Idle, vec![IDLE]));
        let idle = system.apply(&conf, IDLE).unwrap();
        assert_eq!(idle.len(), conf.len() + 1);
        assert_eq!(idle.last_transition(), Some(IDLE));
    }

    #[test]
    fn test_foreign_spellout_rejected() {
        let (_, space, lattices, _) = morph_fixture();
        let system = Morph::new(space);
        let conf = system.initial(&ParseInput::Lattices(lattices)).unwrap();
        let foreign = system.space().md("hlk-VB-VB-_").unwrap();
        assert!(matches!(
            system.apply(&conf, foreign),
            Err(Error::PreconditionViolation(_))
        ));
        assert!(system.apply(&conf, IDLE).is_err());
    }

    #[test]
    fn test_oracle_needs_morph_gold() {
        let (vocab, space) = crate::transition::tests::economic_space();
        let graph = crate::graph::tests::economic_news_graph(&vocab);
        let system = Morph::new(space);
        let mut oracle = system.oracle();
        assert!(matches!(
            oracle.set_gold(&GoldGraph::from(graph)),
            Err(Error::InvalidInput(_))
        ));
    }
}
