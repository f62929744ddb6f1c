use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::graph::GoldGraph;
use crate::sentence::{DepNode, ParseInput};

use super::arc_eager::ArcEagerOracle;
use super::arc_standard::ArcStandardOracle;
use super::morph::MorphOracle;
use super::{
    ArcEager, ArcStandard, Family, Legal, Morph, Oracle, Transition, TransitionKind,
    TransitionSpace, TransitionSystem, IDLE,
};

/// When a joint system disambiguates lattices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JointStrategy {
    /// Disambiguate every lattice before the first arc transition
    MdFirst,
    /// Disambiguate only while fewer than three nodes are queued
    #[default]
    ArcGreedy,
}

/// The dependency half of a joint system
#[derive(Debug, Clone)]
pub enum ArcSystem {
    Standard(ArcStandard),
    Eager(ArcEager),
}

impl ArcSystem {
    fn space(&self) -> &TransitionSpace {
        match self {
            ArcSystem::Standard(s) => s.space(),
            ArcSystem::Eager(s) => s.space(),
        }
    }

    fn prepare(&self, conf: &mut Configuration) {
        match self {
            ArcSystem::Standard(s) => s.prepare(conf),
            ArcSystem::Eager(s) => s.prepare(conf),
        }
    }

    fn legal(&self, conf: &Configuration) -> Vec<Transition> {
        match self {
            ArcSystem::Standard(s) => s.arc_legal(conf),
            ArcSystem::Eager(s) => s.arc_legal(conf),
        }
    }

    fn apply(&self, conf: &Configuration, transition: Transition) -> Result<Configuration> {
        match self {
            ArcSystem::Standard(s) => s.arc_apply(conf, transition),
            ArcSystem::Eager(s) => s.arc_apply(conf, transition),
        }
    }

    fn is_terminal(&self, conf: &Configuration) -> bool {
        match self {
            ArcSystem::Standard(s) => s.arc_terminal(conf),
            ArcSystem::Eager(s) => s.arc_terminal(conf),
        }
    }

    fn oracle(&self) -> Box<dyn Oracle + Send + '_> {
        match self {
            ArcSystem::Standard(s) => Box::new(ArcStandardOracle::new(s.space())),
            ArcSystem::Eager(s) => Box::new(ArcEagerOracle::new(s.space())),
        }
    }
}

/// Morphological disambiguation interleaved with dependency parsing
#[derive(Debug, Clone)]
pub struct Joint {
    arc: ArcSystem,
    md: Morph,
    strategy: JointStrategy,
}

impl Joint {
    pub fn new(arc: ArcSystem, md: Morph, strategy: JointStrategy) -> Self {
        Self { arc, md, strategy }
    }

    pub fn strategy(&self) -> JointStrategy {
        self.strategy
    }

    fn md_phase(&self, conf: &Configuration) -> bool {
        md_phase(self.strategy, conf)
    }
}

fn md_phase(strategy: JointStrategy, conf: &Configuration) -> bool {
    if conf.lattices_done() {
        return false;
    }
    match strategy {
        JointStrategy::MdFirst => true,
        JointStrategy::ArcGreedy => conf.queue().len() < 3,
    }
}

impl TransitionSystem for Joint {
    fn name(&self) -> &'static str {
        match self.arc {
            ArcSystem::Standard(_) => "joint arc-standard",
            ArcSystem::Eager(_) => "joint arc-eager",
        }
    }

    fn space(&self) -> &TransitionSpace {
        self.arc.space()
    }

    fn initial(&self, input: &ParseInput) -> Result<Configuration> {
        match input {
            ParseInput::Lattices(lattices) => {
                let root = DepNode::root(self.space().vocabulary());
                let mut conf = Configuration::with_lattices(root, lattices);
                self.arc.prepare(&mut conf);
                Ok(conf)
            }
            ParseInput::Tagged(_) => Err(Error::invalid_input("joint parsing needs lattices")),
        }
    }

    fn apply(&self, conf: &Configuration, transition: Transition) -> Result<Configuration> {
        match self.space().kind(transition) {
            TransitionKind::Idle if self.is_terminal(conf) => Ok(conf.successor(IDLE)),
            TransitionKind::Idle => Err(Error::precondition("IDLE before the end of the derivation")),
            TransitionKind::MorphDecide if self.md_phase(conf) => self.md.md_apply(conf, transition),
            _ if !self.md_phase(conf) => self.arc.apply(conf, transition),
            _ => Err(Error::precondition(format!(
                "{} outside of its phase",
                self.space().name(transition)
            ))),
        }
    }

    fn legal(&self, conf: &Configuration) -> Result<Legal> {
        if self.is_terminal(conf) {
            return Ok(Legal::new(Family::Idle, vec![IDLE]));
        }
        if self.md_phase(conf) {
            return Ok(Legal::new(Family::Morph, self.md.md_legal(conf)?));
        }
        Ok(Legal::new(Family::Arc, self.arc.legal(conf)))
    }

    fn is_terminal(&self, conf: &Configuration) -> bool {
        conf.lattices_done() && self.arc.is_terminal(conf)
    }

    fn oracle(&self) -> Box<dyn Oracle + Send + '_> {
        Box::new(JointOracle {
            joint: self,
            arc: self.arc.oracle(),
            md: MorphOracle::new(self.space()),
        })
    }
}

/// Delegates to the MD or arc oracle following the joint strategy
struct JointOracle<'a> {
    joint: &'a Joint,
    arc: Box<dyn Oracle + Send + 'a>,
    md: MorphOracle<'a>,
}

impl Oracle for JointOracle<'_> {
    fn name(&self) -> &'static str {
        "joint static"
    }

    fn set_gold(&mut self, gold: &GoldGraph) -> Result<()> {
        self.md.set_gold(gold)?;
        self.arc.set_gold(gold)
    }

    fn transition(&self, conf: &Configuration) -> Result<Transition> {
        if self.joint.is_terminal(conf) {
            Ok(IDLE)
        } else if self.joint.md_phase(conf) {
            self.md.transition(conf)
        } else {
            self.arc.transition(conf)
        }
    }
}
