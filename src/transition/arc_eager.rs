use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::graph::{GoldArcs, GoldGraph};
use crate::sentence::{EnumTaggedSentence, ParseInput};

use super::{
    stack_and_queue, Family, Legal, Oracle, Transition, TransitionKind, TransitionSpace,
    TransitionSystem, POP_ROOT, REDUCE, SHIFT,
};

/// Arc-eager transitions with an explicit pop-root
///
/// ROOT starts at the head of the queue and is the last node to leave the
/// stack.
#[derive(Debug, Clone)]
pub struct ArcEager {
    space: TransitionSpace,
}

impl ArcEager {
    pub fn new(space: TransitionSpace) -> Self {
        Self { space }
    }

    pub(crate) fn prepare(&self, conf: &mut Configuration) {
        conf.stack = Vec::new();
        conf.queue = (0..conf.nodes.len()).collect();
        conf.num_head_stack = 0;
    }

    pub(crate) fn arc_legal(&self, conf: &Configuration) -> Vec<Transition> {
        let mut legal = Vec::new();
        let (stack, queue) = (conf.stack.len(), conf.queue.len());
        if queue == 0 {
            match stack {
                0 => {}
                1 => legal.push(POP_ROOT),
                _ => legal.push(REDUCE),
            }
            return legal;
        }
        if conf.last != Some(REDUCE) && (stack == 0 || queue > 1) {
            legal.push(SHIFT);
        }
        if let Some(s) = conf.stack_at(0) {
            if queue > 1 || conf.num_head_stack == 1 {
                legal.extend(self.space.right_arcs());
            }
            if conf.head(s).is_some() {
                if stack > 1 {
                    legal.push(REDUCE);
                }
            } else if s != 0 {
                legal.extend(self.space.left_arcs());
            }
        }
        legal
    }

    pub(crate) fn arc_terminal(&self, conf: &Configuration) -> bool {
        conf.queue.is_empty() && conf.stack.is_empty()
    }

    pub(crate) fn arc_apply(&self, conf: &Configuration, transition: Transition) -> Result<Configuration> {
        let mut next = conf.successor(transition);
        match self.space.kind(transition) {
            TransitionKind::Shift => {
                if conf.last == Some(REDUCE) {
                    return Err(Error::precondition("SH directly after RE"));
                }
                let queue = conf.queue.len();
                if queue == 0 || (!conf.stack.is_empty() && queue == 1) {
                    return Err(Error::precondition(
                        "SH would leave the last queued node without a head",
                    ));
                }
                next.shift()?;
            }
            TransitionKind::Reduce => {
                let s = conf
                    .stack_at(0)
                    .ok_or_else(|| Error::precondition("RE on empty stack"))?;
                if conf.stack.len() < 2 {
                    return Err(Error::precondition("RE of the last stack node, use PR"));
                }
                if !conf.queue.is_empty() && conf.head(s).is_none() {
                    return Err(Error::precondition(format!("RE of headless node {}", s)));
                }
                next.pop_stack()?;
            }
            TransitionKind::PopRoot => {
                if !conf.queue.is_empty() || conf.stack.len() != 1 {
                    return Err(Error::precondition(
                        "PR needs an empty queue and a single node on the stack",
                    ));
                }
                next.pop_stack()?;
            }
            TransitionKind::LeftArc(label) => {
                let (s, b) = stack_and_queue(conf, "LA")?;
                if s == 0 {
                    return Err(Error::precondition("LA would attach ROOT"));
                }
                next.pop_stack()?;
                next.attach(b, s, label)?;
            }
            TransitionKind::RightArc(label) => {
                let (s, b) = stack_and_queue(conf, "RA")?;
                if conf.queue.len() == 1 && conf.num_head_stack != 1 {
                    return Err(Error::precondition(format!(
                        "RA onto the last queued node leaves {} headless stack nodes",
                        conf.num_head_stack
                    )));
                }
                next.attach(s, b, label)?;
                next.shift()?;
            }
            _ => {
                return Err(Error::precondition(format!(
                    "{} is not an arc-eager transition",
                    self.space.name(transition)
                )))
            }
        }
        Ok(next)
    }
}

impl TransitionSystem for ArcEager {
    fn name(&self) -> &'static str {
        "arc-eager"
    }

    fn space(&self) -> &TransitionSpace {
        &self.space
    }

    fn initial(&self, input: &ParseInput) -> Result<Configuration> {
        match input {
            ParseInput::Tagged(sent) => {
                let nodes = EnumTaggedSentence::from_tagged(sent, self.space.vocabulary()).nodes;
                let mut conf = Configuration::new(nodes);
                self.prepare(&mut conf);
                Ok(conf)
            }
            ParseInput::Lattices(_) => Err(Error::invalid_input(
                "arc-eager parses tagged sentences, not lattices",
            )),
        }
    }

    fn apply(&self, conf: &Configuration, transition: Transition) -> Result<Configuration> {
        self.arc_apply(conf, transition)
    }

    fn legal(&self, conf: &Configuration) -> Result<Legal> {
        if self.arc_terminal(conf) {
            return Ok(Legal::new(Family::Idle, Vec::new()));
        }
        Ok(Legal::new(Family::Arc, self.arc_legal(conf)))
    }

    fn is_terminal(&self, conf: &Configuration) -> bool {
        self.arc_terminal(conf)
    }

    fn oracle(&self) -> Box<dyn Oracle + Send + '_> {
        Box::new(ArcEagerOracle::new(&self.space))
    }
}

/// Static arc-eager oracle
///
/// Every reduce it emits is checked: the popped node must be attached and
/// must have no gold arc to or from anything left in the queue or not yet
/// created. Anything else means the gold tree cannot be built (it is not
/// projective) and is reported as a mismatch.
#[derive(Debug)]
pub(crate) struct ArcEagerOracle<'a> {
    space: &'a TransitionSpace,
    gold: Option<GoldArcs>,
}

impl<'a> ArcEagerOracle<'a> {
    pub(crate) fn new(space: &'a TransitionSpace) -> Self {
        Self { space, gold: None }
    }

    fn reduce(&self, conf: &Configuration, gold: &GoldArcs, s: usize) -> Result<Transition> {
        if conf.head(s).is_none() {
            return Err(Error::OracleGoldMismatch(format!(
                "reduce would drop headless node {}",
                s
            )));
        }
        // nodes past the end of the table are morphemes still inside a lattice
        let pending = conf.nodes.len()..gold.len();
        if let Some(q) = conf.queue.iter().copied().chain(pending).find(|&q| gold.linked(s, q)) {
            return Err(Error::OracleGoldMismatch(format!(
                "reduce of {} loses the gold arc to {}",
                s, q
            )));
        }
        Ok(REDUCE)
    }

    fn relation(gold: &GoldArcs, node: usize) -> Result<u32> {
        gold.relation(node)
            .ok_or_else(|| Error::OracleGoldMismatch(format!("node {} has no gold relation", node)))
    }
}

impl Oracle for ArcEagerOracle<'_> {
    fn name(&self) -> &'static str {
        "arc-eager static"
    }

    fn set_gold(&mut self, gold: &GoldGraph) -> Result<()> {
        self.gold = Some(GoldArcs::new(gold.dependency()));
        Ok(())
    }

    fn transition(&self, conf: &Configuration) -> Result<Transition> {
        let gold = self
            .gold
            .as_ref()
            .ok_or_else(|| Error::precondition("oracle has no gold graph"))?;
        let b = match conf.queue_at(0) {
            Some(b) => b,
            None => {
                return match conf.stack_at(0) {
                    None => Err(Error::OracleGoldMismatch(
                        "arc-eager oracle called on a terminal configuration".to_string(),
                    )),
                    Some(_) if conf.stack.len() == 1 => Ok(POP_ROOT),
                    Some(s) => self.reduce(conf, gold, s),
                }
            }
        };
        let s = match conf.stack_at(0) {
            Some(s) => s,
            None => return Ok(SHIFT),
        };

        // highest ancestor of the stack top built so far
        let mut top = s;
        while let Some((head, _)) = conf.head(top) {
            top = head;
        }
        if gold.head(top) == Some(b) {
            return if top == s {
                Ok(self.space.left_arc(Self::relation(gold, s)?))
            } else {
                self.reduce(conf, gold, s)
            };
        }
        match gold.head(b) {
            None => Ok(SHIFT),
            Some(h) if h > b => Ok(SHIFT),
            Some(h) if h == s => Ok(self.space.right_arc(Self::relation(gold, b)?)),
            Some(_) => self.reduce(conf, gold, s),
        }
    }
}
