//! Transition systems and their oracles
//!
//! Transitions are plain integers laid out in contiguous ranges:
//!
//! | kind | ids |
//! |------|-----|
//! | IDLE | `0` |
//! | SH   | `1` |
//! | RE   | `2` |
//! | PR   | `3` |
//! | LA-r | `4 .. 4+L` |
//! | RA-r | `4+L .. 4+2L` |
//! | MD-s | `4+2L ..` |
//!
//! where `L` is the number of relations. MD transitions are interned on
//! demand in the transitions vocabulary, keyed by the spellout projected
//! through the space's [`SpelloutProjection`].

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::graph::GoldGraph;
use crate::lattice::{Lattice, Spellout, SpelloutProjection};
use crate::sentence::ParseInput;
use crate::vocabulary::Vocabulary;

mod arc_eager;
mod arc_standard;
mod joint;
mod morph;

pub use self::arc_eager::ArcEager;
pub use self::arc_standard::ArcStandard;
pub use self::joint::{ArcSystem, Joint, JointStrategy};
pub use self::morph::Morph;

/// Upper bound on the length of any derivation
pub const MAX_TRANSITIONS: usize = 800;

pub const IDLE: Transition = Transition(0);
pub const SHIFT: Transition = Transition(1);
pub const REDUCE: Transition = Transition(2);
pub const POP_ROOT: Transition = Transition(3);
const ARC_BASE: u32 = 4;

/// A transition identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Transition(pub u32);

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

bitflags! {
    /// Transition families a feature template fires for
    #[derive(Default)]
    pub struct TransitionFamilies: u32 {
        const ARC = 0x01;
        const MORPH = 0x02;
        const IDLE = 0x04;
        const ALL = 0x07;
    }
}

/// The family of the transitions offered in one configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Arc,
    Morph,
    Idle,
}

impl Family {
    pub fn flag(self) -> TransitionFamilies {
        match self {
            Family::Arc => TransitionFamilies::ARC,
            Family::Morph => TransitionFamilies::MORPH,
            Family::Idle => TransitionFamilies::IDLE,
        }
    }
}

/// Decoded form of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Idle,
    Shift,
    Reduce,
    PopRoot,
    LeftArc(u32),
    RightArc(u32),
    MorphDecide,
}

/// Legal transitions of a configuration, sorted by ID
#[derive(Debug, Clone, PartialEq)]
pub struct Legal {
    pub family: Family,
    pub transitions: Vec<Transition>,
}

impl Legal {
    pub(crate) fn new(family: Family, mut transitions: Vec<Transition>) -> Self {
        transitions.sort_unstable();
        transitions.dedup();
        Self {
            family,
            transitions,
        }
    }

    pub fn contains(&self, transition: Transition) -> bool {
        self.transitions.binary_search(&transition).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Layout of the transition ID space for one relation inventory
#[derive(Debug, Clone)]
pub struct TransitionSpace {
    vocab: Arc<Vocabulary>,
    num_labels: u32,
    projection: SpelloutProjection,
}

impl TransitionSpace {
    /// Lay out transitions for the current relations and freeze them
    ///
    /// The fixed part of the layout is registered in the transitions
    /// vocabulary; a vocabulary that already holds a different layout is
    /// rejected.
    pub fn new(vocab: Arc<Vocabulary>) -> Result<Self> {
        vocab.relations.freeze();
        let relations = vocab.relations.values();
        let num_labels = relations.len() as u32;
        let mut names: Vec<String> = ["IDLE", "SH", "RE", "PR"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        names.extend(relations.iter().map(|r| format!("LA-{}", r)));
        names.extend(relations.iter().map(|r| format!("RA-{}", r)));
        for (expected, name) in names.iter().enumerate() {
            let id = vocab.transitions.add(name)?;
            if id as usize != expected {
                return Err(Error::VocabularyMismatch {
                    set: "transitions",
                    detail: format!("{} has id {}, expected {}", name, id, expected),
                });
            }
        }
        Ok(Self {
            vocab,
            num_labels,
            projection: SpelloutProjection::default(),
        })
    }

    /// Name MD transitions by `projection` instead of the full spellout
    pub fn with_projection(mut self, projection: SpelloutProjection) -> Self {
        self.projection = projection;
        self
    }

    pub fn projection(&self) -> &SpelloutProjection {
        &self.projection
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn num_labels(&self) -> u32 {
        self.num_labels
    }

    pub fn left_arc(&self, label: u32) -> Transition {
        Transition(ARC_BASE + label)
    }

    pub fn right_arc(&self, label: u32) -> Transition {
        Transition(ARC_BASE + self.num_labels + label)
    }

    pub fn left_arcs(&self) -> impl Iterator<Item = Transition> {
        (ARC_BASE..ARC_BASE + self.num_labels).map(Transition)
    }

    pub fn right_arcs(&self) -> impl Iterator<Item = Transition> {
        let base = ARC_BASE + self.num_labels;
        (base..base + self.num_labels).map(Transition)
    }

    /// First ID of the open-ended MD range
    pub fn md_base(&self) -> u32 {
        ARC_BASE + 2 * self.num_labels
    }

    pub fn kind(&self, transition: Transition) -> TransitionKind {
        let t = transition.0;
        match t {
            0 => TransitionKind::Idle,
            1 => TransitionKind::Shift,
            2 => TransitionKind::Reduce,
            3 => TransitionKind::PopRoot,
            _ if t < ARC_BASE + self.num_labels => TransitionKind::LeftArc(t - ARC_BASE),
            _ if t < self.md_base() => TransitionKind::RightArc(t - ARC_BASE - self.num_labels),
            _ => TransitionKind::MorphDecide,
        }
    }

    /// Relation index of an arc transition
    pub fn label(&self, transition: Transition) -> Option<u32> {
        match self.kind(transition) {
            TransitionKind::LeftArc(l) | TransitionKind::RightArc(l) => Some(l),
            _ => None,
        }
    }

    /// The MD transition for an already projected key, interned on first use
    pub fn md(&self, key: &str) -> Result<Transition> {
        self.vocab.spellouts.add(key)?;
        let id = self.vocab.transitions.add(&format!("MD-{}", key))?;
        Ok(Transition(id))
    }

    /// The MD transition committing `spellout`
    pub fn md_for(&self, spellout: &Spellout) -> Result<Transition> {
        self.md(&self.projection.project(spellout))
    }

    /// The MD transition of a key, if one was ever interned
    pub fn md_lookup(&self, key: &str) -> Option<Transition> {
        self.vocab
            .transitions
            .index(&format!("MD-{}", key))
            .map(Transition)
    }

    /// The first spellout of `lattice` an MD key selects
    pub fn find_spellout(&self, lattice: &Lattice, key: &str) -> Option<usize> {
        lattice.find_projected(key, &self.projection)
    }

    /// The projected spellout key an MD transition commits
    pub fn spellout_key(&self, transition: Transition) -> Option<String> {
        if transition.0 < self.md_base() {
            return None;
        }
        let name = self.vocab.transitions.value(transition.0)?;
        name.strip_prefix("MD-").map(|s| s.to_string())
    }

    /// Human readable name, such as `SH` or `LA-SBJ`
    pub fn name(&self, transition: Transition) -> String {
        self.vocab
            .transitions
            .value(transition.0)
            .unwrap_or_else(|| format!("T{}", transition.0))
    }
}

/// A transition relation over configurations
pub trait TransitionSystem: Send + Sync {
    fn name(&self) -> &'static str;

    fn space(&self) -> &TransitionSpace;

    /// The initial configuration for an input
    fn initial(&self, input: &ParseInput) -> Result<Configuration>;

    /// Apply a transition, leaving the input configuration untouched
    fn apply(&self, conf: &Configuration, transition: Transition) -> Result<Configuration>;

    /// Every legal transition, in ID order
    fn legal(&self, conf: &Configuration) -> Result<Legal>;

    fn is_terminal(&self, conf: &Configuration) -> bool;

    /// A fresh oracle bound to this system
    fn oracle(&self) -> Box<dyn Oracle + Send + '_>;
}

/// Chooses the transition that makes progress towards a gold graph
pub trait Oracle {
    fn name(&self) -> &'static str;

    fn set_gold(&mut self, gold: &GoldGraph) -> Result<()>;

    fn transition(&self, conf: &Configuration) -> Result<Transition>;
}

/// Which transition system a parser runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SystemKind {
    ArcStandard,
    ArcEager,
    Morph,
    JointStandard,
    JointEager,
}

/// The supported transition systems behind one type
#[derive(Debug, Clone)]
pub enum System {
    ArcStandard(ArcStandard),
    ArcEager(ArcEager),
    Morph(Morph),
    Joint(Joint),
}

impl System {
    pub fn new(kind: SystemKind, strategy: JointStrategy, space: TransitionSpace) -> Self {
        match kind {
            SystemKind::ArcStandard => System::ArcStandard(ArcStandard::new(space)),
            SystemKind::ArcEager => System::ArcEager(ArcEager::new(space)),
            SystemKind::Morph => System::Morph(Morph::new(space)),
            SystemKind::JointStandard => System::Joint(Joint::new(
                ArcSystem::Standard(ArcStandard::new(space.clone())),
                Morph::new(space),
                strategy,
            )),
            SystemKind::JointEager => System::Joint(Joint::new(
                ArcSystem::Eager(ArcEager::new(space.clone())),
                Morph::new(space),
                strategy,
            )),
        }
    }

    fn inner(&self) -> &dyn TransitionSystem {
        match self {
            System::ArcStandard(s) => s,
            System::ArcEager(s) => s,
            System::Morph(s) => s,
            System::Joint(s) => s,
        }
    }
}

impl TransitionSystem for System {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn space(&self) -> &TransitionSpace {
        self.inner().space()
    }

    fn initial(&self, input: &ParseInput) -> Result<Configuration> {
        self.inner().initial(input)
    }

    fn apply(&self, conf: &Configuration, transition: Transition) -> Result<Configuration> {
        self.inner().apply(conf, transition)
    }

    fn legal(&self, conf: &Configuration) -> Result<Legal> {
        self.inner().legal(conf)
    }

    fn is_terminal(&self, conf: &Configuration) -> bool {
        self.inner().is_terminal(conf)
    }

    fn oracle(&self) -> Box<dyn Oracle + Send + '_> {
        self.inner().oracle()
    }
}

/// Stack top and queue head, or a precondition error naming the transition
pub(crate) fn stack_and_queue(conf: &Configuration, what: &str) -> Result<(usize, usize)> {
    match (conf.stack_at(0), conf.queue_at(0)) {
        (Some(s), Some(b)) => Ok((s, b)),
        _ => Err(Error::precondition(format!(
            "{} needs a non-empty stack and queue",
            what
        ))),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::graph::tests::economic_news_graph;

    /// A space over the relations of the example tree
    pub(crate) fn economic_space() -> (Arc<Vocabulary>, TransitionSpace) {
        let vocab = Arc::new(Vocabulary::new());
        economic_news_graph(&vocab);
        let space = TransitionSpace::new(vocab.clone()).unwrap();
        (vocab, space)
    }

    /// `apply` succeeds for exactly the transitions `legal` lists
    pub(crate) fn assert_apply_matches_legal(system: &dyn TransitionSystem, conf: &Configuration) {
        let legal = system.legal(conf).unwrap();
        let space = system.space();
        let known = space.vocabulary().transitions.len() as u32;
        for t in (0..known).map(Transition) {
            match system.apply(conf, t) {
                Ok(_) => assert!(legal.contains(t), "{} applied but not legal", space.name(t)),
                Err(e) => {
                    assert!(!legal.contains(t), "{} legal but rejected: {}", space.name(t), e);
                    assert!(
                        matches!(e, Error::PreconditionViolation(_)),
                        "{} rejected with {}",
                        space.name(t),
                        e
                    );
                }
            }
        }
    }

    #[test]
    fn test_layout() {
        let (vocab, space) = economic_space();
        assert_eq!(space.num_labels(), 4);
        assert_eq!(space.md_base(), 12);

        let att = vocab.relations.index("ATT").unwrap();
        let obj = vocab.relations.index("OBJ").unwrap();
        assert_eq!(space.kind(space.left_arc(att)), TransitionKind::LeftArc(att));
        assert_eq!(space.kind(space.right_arc(obj)), TransitionKind::RightArc(obj));
        assert_eq!(space.kind(SHIFT), TransitionKind::Shift);
        assert_eq!(space.kind(IDLE), TransitionKind::Idle);
        assert_eq!(space.label(space.right_arc(obj)), Some(obj));
        assert_eq!(space.name(space.left_arc(att)), "LA-ATT");
        assert_eq!(space.name(POP_ROOT), "PR");
        assert_eq!(space.left_arcs().count(), 4);
        assert!(space.right_arcs().all(|t| matches!(space.kind(t), TransitionKind::RightArc(_))));
    }

    #[test]
    fn test_md_transitions_are_interned() {
        let (_, space) = economic_space();
        let a = space.md("b-PREP-PREP-_").unwrap();
        let b = space.md("bbit-NN-NN-_").unwrap();
        assert!(a.0 >= space.md_base());
        assert_ne!(a, b);
        assert_eq!(space.md("b-PREP-PREP-_").unwrap(), a);
        assert_eq!(space.kind(a), TransitionKind::MorphDecide);
        assert_eq!(space.spellout_key(b).as_deref(), Some("bbit-NN-NN-_"));
        assert_eq!(space.md_lookup("unseen"), None);
        assert_eq!(space.spellout_key(SHIFT), None);
    }

    #[test]
    fn test_space_rejects_conflicting_layout() {
        let vocab = Arc::new(Vocabulary::new());
        vocab.transitions.add("SH").unwrap();
        assert!(matches!(
            TransitionSpace::new(vocab),
            Err(Error::VocabularyMismatch { .. })
        ));
    }

    #[test]
    fn test_space_freezes_relations() {
        let (vocab, _) = economic_space();
        assert!(vocab.relations.is_frozen());
        assert!(vocab.relations.add("NEW").is_err());
    }
}
