//! Parser configurations and their derivation history
//!
//! A [`Configuration`] is one state of a derivation: stack, queue, node table
//! and the arcs built so far. Successors share the node table and per-node arc
//! caches through [`Arc`] and copy them on write, so expanding a beam only
//! duplicates what a transition actually touches.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graph::{ArcSet, LabeledArc, LabeledDependencyGraph, MorphDependencyGraph};
use crate::lattice::{Lattice, LatticeSentence, Mapping};
use crate::sentence::DepNode;
use crate::transition::Transition;

/// Interned feature IDs extracted from one configuration
pub type FeatureVector = Vec<u32>;

/// Arc state of a single node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeState {
    /// `(head, relation)` once attached
    pub head: Option<(usize, u32)>,
    /// Left modifiers, ascending
    pub left: Vec<usize>,
    /// Right modifiers, ascending
    pub right: Vec<usize>,
}

/// Morphological disambiguation state
#[derive(Debug, Clone)]
pub struct MorphState {
    pub(crate) lattices: Arc<Vec<Lattice>>,
    /// Lattices not yet disambiguated
    pub(crate) lattice_queue: VecDeque<usize>,
    /// Committed `(lattice, spellout)` decisions, in lattice order
    pub(crate) mappings: Vec<(usize, usize)>,
}

impl MorphState {
    pub fn lattices(&self) -> &[Lattice] {
        &self.lattices
    }

    pub fn lattice_queue(&self) -> &VecDeque<usize> {
        &self.lattice_queue
    }

    pub fn current_lattice(&self) -> Option<&Lattice> {
        self.lattice_queue
            .front()
            .and_then(|&i| self.lattices.get(i))
    }

    pub fn num_mappings(&self) -> usize {
        self.mappings.len()
    }

    pub fn mappings(&self) -> Vec<Mapping> {
        self.mappings
            .iter()
            .filter_map(|&(l, s)| {
                let lattice = self.lattices.get(l)?;
                Some(Mapping {
                    token: lattice.token.clone(),
                    spellout: lattice.spellouts().get(s)?.clone(),
                })
            })
            .collect()
    }
}

/// Index of a configuration inside a [`Derivation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigId(pub(crate) usize);

/// Parser state at one point of a derivation
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) nodes: Arc<Vec<DepNode>>,
    pub(crate) states: Vec<Arc<NodeState>>,
    /// Top of the stack is the last element
    pub(crate) stack: Vec<usize>,
    pub(crate) queue: VecDeque<usize>,
    /// Headless nodes currently on the stack
    pub(crate) num_head_stack: usize,
    pub(crate) morph: Option<MorphState>,
    pub(crate) previous: Option<ConfigId>,
    pub(crate) last: Option<Transition>,
    /// Features of the parent that scored `last`
    pub(crate) features: Option<Arc<FeatureVector>>,
    pub(crate) len: usize,
    pub(crate) score: f64,
}

impl Configuration {
    /// A configuration over `nodes` with empty stack and queue
    pub fn new(nodes: Vec<DepNode>) -> Self {
        let states = (0..nodes.len())
            .map(|_| Arc::new(NodeState::default()))
            .collect();
        Self {
            nodes: Arc::new(nodes),
            states,
            stack: Vec::new(),
            queue: VecDeque::new(),
            num_head_stack: 0,
            morph: None,
            previous: None,
            last: None,
            features: None,
            len: 0,
            score: 0.0,
        }
    }

    /// A configuration holding ROOT and the lattices still to disambiguate
    pub fn with_lattices(root: DepNode, lattices: &LatticeSentence) -> Self {
        let mut conf = Self::new(vec![root]);
        conf.morph = Some(MorphState {
            lattices: Arc::new(lattices.lattices().to_vec()),
            lattice_queue: (0..lattices.len()).collect(),
            mappings: Vec::new(),
        });
        conf
    }

    /// Copy for the next step of the derivation
    pub(crate) fn successor(&self, transition: Transition) -> Self {
        let mut next = self.clone();
        next.previous = None;
        next.features = None;
        next.last = Some(transition);
        next.len += 1;
        next
    }

    pub fn nodes(&self) -> &[DepNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&DepNode> {
        self.nodes.get(index)
    }

    pub fn stack(&self) -> &[usize] {
        &self.stack
    }

    pub fn queue(&self) -> &VecDeque<usize> {
        &self.queue
    }

    /// The `k`-th node from the top of the stack
    pub fn stack_at(&self, k: usize) -> Option<usize> {
        self.stack.len().checked_sub(k + 1).map(|i| self.stack[i])
    }

    /// The `k`-th node of the queue
    pub fn queue_at(&self, k: usize) -> Option<usize> {
        self.queue.get(k).copied()
    }

    pub fn num_head_stack(&self) -> usize {
        self.num_head_stack
    }

    pub fn morph(&self) -> Option<&MorphState> {
        self.morph.as_ref()
    }

    /// The `k`-th most recently committed morpheme node
    pub fn morpheme_at(&self, k: usize) -> Option<usize> {
        self.morph.as_ref()?;
        // node 0 is ROOT, committed morphemes follow in order
        let committed = self.nodes.len() - 1;
        committed.checked_sub(k).filter(|&n| n > 0)
    }

    /// The `k`-th lattice still waiting for disambiguation
    pub fn lattice_at(&self, k: usize) -> Option<&Lattice> {
        let morph = self.morph.as_ref()?;
        morph
            .lattice_queue
            .get(k)
            .and_then(|&i| morph.lattices.get(i))
    }

    pub fn lattices_done(&self) -> bool {
        self.morph
            .as_ref()
            .map_or(true, |m| m.lattice_queue.is_empty())
    }

    pub fn head(&self, node: usize) -> Option<(usize, u32)> {
        self.states.get(node).and_then(|s| s.head)
    }

    pub fn left_modifiers(&self, node: usize) -> &[usize] {
        self.states.get(node).map_or(&[], |s| s.left.as_slice())
    }

    pub fn right_modifiers(&self, node: usize) -> &[usize] {
        self.states.get(node).map_or(&[], |s| s.right.as_slice())
    }

    /// `k`-th leftmost modifier, 0-based
    pub fn leftmost(&self, node: usize, k: usize) -> Option<usize> {
        self.left_modifiers(node).get(k).copied()
    }

    /// `k`-th rightmost modifier, 0-based
    pub fn rightmost(&self, node: usize, k: usize) -> Option<usize> {
        let right = self.right_modifiers(node);
        right.len().checked_sub(k + 1).map(|i| right[i])
    }

    pub fn last_transition(&self) -> Option<Transition> {
        self.last
    }

    pub fn previous(&self) -> Option<ConfigId> {
        self.previous
    }

    pub fn features(&self) -> Option<&Arc<FeatureVector>> {
        self.features.as_ref()
    }

    /// Number of transitions since the initial configuration
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// All arcs built so far
    pub fn arcs(&self) -> ArcSet {
        self.states
            .iter()
            .enumerate()
            .filter_map(|(modifier, s)| {
                s.head
                    .map(|(head, relation)| LabeledArc::new(head, modifier, relation))
            })
            .collect()
    }

    pub fn to_graph(&self) -> LabeledDependencyGraph {
        LabeledDependencyGraph {
            nodes: self.nodes.iter().map(|n| n.token.clone()).collect(),
            arcs: self.arcs(),
        }
    }

    pub fn to_morph_graph(&self) -> Option<MorphDependencyGraph> {
        let morph = self.morph.as_ref()?;
        Some(MorphDependencyGraph {
            graph: self.to_graph(),
            mappings: morph.mappings(),
            lattices: LatticeSentence::new(morph.lattices.to_vec()),
        })
    }

    /// Move the queue head onto the stack
    pub(crate) fn shift(&mut self) -> Result<usize> {
        let node = self
            .queue
            .pop_front()
            .ok_or_else(|| Error::precondition("shift on empty queue"))?;
        self.stack.push(node);
        if self.head(node).is_none() {
            self.num_head_stack += 1;
        }
        Ok(node)
    }

    pub(crate) fn pop_stack(&mut self) -> Result<usize> {
        let node = self
            .stack
            .pop()
            .ok_or_else(|| Error::precondition("pop on empty stack"))?;
        if self.head(node).is_none() {
            self.num_head_stack = self.num_head_stack.saturating_sub(1);
        }
        Ok(node)
    }

    /// Add the arc `head -> modifier` and update the arc caches
    pub(crate) fn attach(&mut self, head: usize, modifier: usize, relation: u32) -> Result<()> {
        if head >= self.states.len() || modifier >= self.states.len() {
            return Err(Error::precondition(format!(
                "arc {} -> {} outside of {} nodes",
                head,
                modifier,
                self.states.len()
            )));
        }
        if head == modifier {
            return Err(Error::precondition(format!("self arc on node {}", head)));
        }
        if let Some((existing, _)) = self.head(modifier) {
            return Err(Error::precondition(format!(
                "node {} already headed by {}",
                modifier, existing
            )));
        }
        Arc::make_mut(&mut self.states[modifier]).head = Some((head, relation));
        let state = Arc::make_mut(&mut self.states[head]);
        let side = if modifier < head {
            &mut state.left
        } else {
            &mut state.right
        };
        let pos = side.binary_search(&modifier).unwrap_or_else(|p| p);
        side.insert(pos, modifier);
        Ok(())
    }

    /// Append a node created during the derivation
    pub(crate) fn push_node(&mut self, node: DepNode) -> usize {
        let nodes = Arc::make_mut(&mut self.nodes);
        nodes.push(node);
        self.states.push(Arc::new(NodeState::default()));
        nodes.len() - 1
    }
}

/// Arena owning every configuration of one decode
///
/// Configurations point back to their parent by [`ConfigId`].
#[derive(Debug, Clone, Default)]
pub struct Derivation {
    configs: Vec<Configuration>,
}

impl Derivation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, conf: Configuration) -> ConfigId {
        self.configs.push(conf);
        ConfigId(self.configs.len() - 1)
    }

    pub fn get(&self, id: ConfigId) -> &Configuration {
        &self.configs[id.0]
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Configurations from the initial one up to `id`
    pub fn path(&self, id: ConfigId) -> Vec<ConfigId> {
        let mut path = Vec::with_capacity(self.get(id).len + 1);
        let mut cur = Some(id);
        while let Some(c) = cur {
            path.push(c);
            cur = self.get(c).previous;
        }
        path.reverse();
        path
    }

    /// The transition sequence leading to `id`
    pub fn transitions(&self, id: ConfigId) -> Vec<Transition> {
        self.path(id)
            .into_iter()
            .filter_map(|c| self.get(c).last)
            .collect()
    }

    /// `(features, transition)` for every step leading to `id`
    pub fn feature_history(&self, id: ConfigId) -> Vec<(Arc<FeatureVector>, Transition)> {
        self.path(id)
            .into_iter()
            .filter_map(|c| {
                let conf = self.get(c);
                Some((conf.features.clone()?, conf.last?))
            })
            .collect()
    }
}
