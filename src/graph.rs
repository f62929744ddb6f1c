use log::warn;

use crate::error::{Error, Result};
use crate::lattice::{LatticeSentence, Mapping, Spellout};
use crate::sentence::{TaggedSentence, TaggedToken};
use crate::vocabulary::{EnumSet, Vocabulary};

/// A labeled dependency arc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabeledArc {
    pub head: usize,
    pub modifier: usize,
    pub relation: u32,
}

impl LabeledArc {
    pub fn new(head: usize, modifier: usize, relation: u32) -> Self {
        Self {
            head,
            modifier,
            relation,
        }
    }
}

/// Partial arc used for queries, `None` matches anything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArcPattern {
    pub head: Option<usize>,
    pub modifier: Option<usize>,
    pub relation: Option<u32>,
}

impl ArcPattern {
    pub fn head(mut self, head: usize) -> Self {
        self.head = Some(head);
        self
    }

    pub fn modifier(mut self, modifier: usize) -> Self {
        self.modifier = Some(modifier);
        self
    }

    pub fn relation(mut self, relation: u32) -> Self {
        self.relation = Some(relation);
        self
    }

    pub fn matches(&self, arc: &LabeledArc) -> bool {
        self.head.map_or(true, |h| h == arc.head)
            && self.modifier.map_or(true, |m| m == arc.modifier)
            && self.relation.map_or(true, |r| r == arc.relation)
    }
}

/// A set of arcs kept sorted by modifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArcSet {
    arcs: Vec<LabeledArc>,
}

impl ArcSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, arc: LabeledArc) {
        let pos = self
            .arcs
            .binary_search_by_key(&(arc.modifier, arc.head, arc.relation), |a| {
                (a.modifier, a.head, a.relation)
            });
        if let Err(pos) = pos {
            self.arcs.insert(pos, arc);
        }
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    pub fn contains(&self, arc: &LabeledArc) -> bool {
        self.arcs.contains(arc)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabeledArc> + '_ {
        self.arcs.iter()
    }

    /// All arcs matching a partial pattern
    pub fn query<'a>(&'a self, pattern: &'a ArcPattern) -> impl Iterator<Item = &'a LabeledArc> + 'a {
        self.arcs.iter().filter(move |arc| pattern.matches(arc))
    }

    /// The arc attaching `modifier`, if any
    pub fn head_of(&self, modifier: usize) -> Option<&LabeledArc> {
        self.arcs.iter().find(|arc| arc.modifier == modifier)
    }
}

impl FromIterator<LabeledArc> for ArcSet {
    fn from_iter<I: IntoIterator<Item = LabeledArc>>(iter: I) -> Self {
        let mut set = ArcSet::new();
        for arc in iter {
            set.add(arc);
        }
        set
    }
}

/// A dependency tree over tokens, ROOT at index 0
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDependencyGraph {
    pub nodes: Vec<TaggedToken>,
    pub arcs: ArcSet,
}

impl LabeledDependencyGraph {
    /// Build a tree from one `(head, relation)` pair per token
    ///
    /// Heads use 1-based token positions, 0 is ROOT. New relations are added
    /// to `relations`, which fails once the set has been frozen.
    pub fn from_heads<R: AsRef<str>>(
        sentence: &TaggedSentence,
        heads: &[(usize, R)],
        relations: &EnumSet,
    ) -> Result<Self> {
        if heads.len() != sentence.len() {
            return Err(Error::invalid_input(format!(
                "{} heads for {} tokens",
                heads.len(),
                sentence.len()
            )));
        }
        let mut nodes = Vec::with_capacity(sentence.len() + 1);
        nodes.push(TaggedToken::root());
        nodes.extend(sentence.iter().cloned());
        let mut arcs = ArcSet::new();
        for (i, (head, relation)) in heads.iter().enumerate() {
            if *head > sentence.len() {
                return Err(Error::invalid_input(format!(
                    "head {} of token {} is out of range",
                    head,
                    i + 1
                )));
            }
            let relation = relations.add(relation.as_ref())?;
            arcs.add(LabeledArc::new(*head, i + 1, relation));
        }
        Ok(Self { nodes, arcs })
    }

    /// Number of nodes including ROOT
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `(head, relation)` for each non-ROOT node
    pub fn heads(&self) -> Vec<Option<(usize, u32)>> {
        let mut heads = vec![None; self.nodes.len()];
        for arc in self.arcs.iter() {
            if let Some(slot) = heads.get_mut(arc.modifier) {
                *slot = Some((arc.head, arc.relation));
            }
        }
        heads.into_iter().skip(1).collect()
    }

    /// Labeled attachment matches against a gold tree: `(correct, total)`
    pub fn attachment_score(&self, gold: &LabeledDependencyGraph) -> (usize, usize) {
        let predicted = self.heads();
        let expected = gold.heads();
        let total = expected.iter().filter(|h| h.is_some()).count();
        let correct = expected
            .iter()
            .zip(predicted.iter().chain(std::iter::repeat(&None)))
            .filter(|(g, p)| g.is_some() && g == p)
            .count();
        (correct, total)
    }
}

/// Gold head and modifier lookup used by the oracles
#[derive(Debug, Clone, Default)]
pub struct GoldArcs {
    heads: Vec<Option<(usize, u32)>>,
    modifiers: Vec<Vec<usize>>,
}

impl GoldArcs {
    pub fn new(graph: &LabeledDependencyGraph) -> Self {
        let n = graph.len();
        let mut heads = vec![None; n];
        let mut modifiers = vec![Vec::new(); n];
        for arc in graph.arcs.iter() {
            if arc.modifier < n && arc.head < n {
                heads[arc.modifier] = Some((arc.head, arc.relation));
                modifiers[arc.head].push(arc.modifier);
            }
        }
        Self { heads, modifiers }
    }

    /// Number of gold nodes including ROOT
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    pub fn head(&self, node: usize) -> Option<usize> {
        self.heads.get(node).copied().flatten().map(|(h, _)| h)
    }

    pub fn relation(&self, node: usize) -> Option<u32> {
        self.heads.get(node).copied().flatten().map(|(_, r)| r)
    }

    pub fn modifiers(&self, node: usize) -> &[usize] {
        self.modifiers.get(node).map_or(&[], |m| m.as_slice())
    }

    /// Whether a gold arc links `a` and `b` in either direction
    pub fn linked(&self, a: usize, b: usize) -> bool {
        self.head(a) == Some(b) || self.head(b) == Some(a)
    }
}

/// A dependency tree over morphemes together with the spellout decisions
/// that produced them
#[derive(Debug, Clone)]
pub struct MorphDependencyGraph {
    pub graph: LabeledDependencyGraph,
    pub mappings: Vec<Mapping>,
    pub lattices: LatticeSentence,
}

impl MorphDependencyGraph {
    /// Combine gold lattices (one path each) with the ambiguous analyzer
    /// output and a morpheme-level tree
    ///
    /// Gold spellouts missing from the ambiguous lattices are added to them.
    /// Returns the graph and whether any spellout had to be added.
    pub fn combine_gold<R: AsRef<str>>(
        gold: &LatticeSentence,
        mut ambiguous: LatticeSentence,
        heads: &[(usize, R)],
        vocab: &Vocabulary,
    ) -> Result<(Self, bool)> {
        if gold.len() != ambiguous.len() {
            return Err(Error::invalid_input(format!(
                "{} gold lattices for {} ambiguous lattices",
                gold.len(),
                ambiguous.len()
            )));
        }
        let mut added = false;
        let mut mappings = Vec::with_capacity(gold.len());
        for (i, gold_lattice) in gold.lattices().iter().enumerate() {
            let spellout: Spellout = match gold_lattice.spellouts().first() {
                Some(s) => s.clone(),
                None => {
                    return Err(Error::invalid_input(format!(
                        "gold lattice {} ({}) has no path",
                        i, gold_lattice.token
                    )))
                }
            };
            let ambiguous_lattice = &mut ambiguous.0[i];
            if ambiguous_lattice.add_spellout(spellout.clone()) {
                warn!(
                    "added missing gold spellout {} to lattice {} ({})",
                    spellout.as_string(),
                    i,
                    ambiguous_lattice.token
                );
                added = true;
            }
            mappings.push(Mapping {
                token: gold_lattice.token.clone(),
                spellout,
            });
        }
        let tokens: TaggedSentence = mappings
            .iter()
            .flat_map(|m| m.spellout.morphemes().iter())
            .map(|m| TaggedToken::new(m.form.clone(), m.pos.clone()))
            .collect();
        let graph = LabeledDependencyGraph::from_heads(&tokens, heads, &vocab.relations)?;
        Ok((
            Self {
                graph,
                mappings,
                lattices: ambiguous,
            },
            added,
        ))
    }
}

/// Gold reference handed to an oracle
#[derive(Debug, Clone)]
pub enum GoldGraph {
    Dependency(LabeledDependencyGraph),
    Morph(MorphDependencyGraph),
}

impl GoldGraph {
    pub fn dependency(&self) -> &LabeledDependencyGraph {
        match self {
            GoldGraph::Dependency(graph) => graph,
            GoldGraph::Morph(morph) => &morph.graph,
        }
    }

    pub fn mappings(&self) -> Option<&[Mapping]> {
        match self {
            GoldGraph::Dependency(_) => None,
            GoldGraph::Morph(morph) => Some(&morph.mappings),
        }
    }
}

impl From<LabeledDependencyGraph> for GoldGraph {
    fn from(graph: LabeledDependencyGraph) -> Self {
        GoldGraph::Dependency(graph)
    }
}

impl From<MorphDependencyGraph> for GoldGraph {
    fn from(graph: MorphDependencyGraph) -> Self {
        GoldGraph::Morph(graph)
    }
}
