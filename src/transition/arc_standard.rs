use crate::configuration::Configuration;
use crate::error::{Error, Result};
use crate::graph::{GoldArcs, GoldGraph};
use crate::sentence::{EnumTaggedSentence, ParseInput};

use super::{
    stack_and_queue, Family, Legal, Oracle, Transition, TransitionKind, TransitionSpace,
    TransitionSystem, SHIFT,
};

/// Arc-standard transitions: SH, LA-r and RA-r
///
/// Starts with ROOT on the stack and ends once the queue is empty and only
/// ROOT is left.
#[derive(Debug, Clone)]
pub struct ArcStandard {
    space: TransitionSpace,
}

impl ArcStandard {
    pub fn new(space: TransitionSpace) -> Self {
        Self { space }
    }

    /// Put ROOT on the stack and every other node on the queue
    pub(crate) fn prepare(&self, conf: &mut Configuration) {
        conf.stack = vec![0];
        conf.queue = (1..conf.nodes.len()).collect();
        conf.num_head_stack = 1;
    }

    pub(crate) fn arc_legal(&self, conf: &Configuration) -> Vec<Transition> {
        let mut legal = Vec::new();
        let (stack, queue) = (conf.stack.len(), conf.queue.len());
        if queue > 0 && (stack == 0 || queue > 1) {
            legal.push(SHIFT);
        }
        if let (Some(s), Some(b)) = (conf.stack_at(0), conf.queue_at(0)) {
            if s != 0 {
                legal.extend(self.space.left_arcs());
            }
            if b != 0 {
                legal.extend(self.space.right_arcs());
            }
        }
        legal
    }

    pub(crate) fn arc_terminal(&self, conf: &Configuration) -> bool {
        conf.queue.is_empty() && conf.stack.len() == 1
    }

    pub(crate) fn arc_apply(&self, conf: &Configuration, transition: Transition) -> Result<Configuration> {
        let mut next = conf.successor(transition);
        match self.space.kind(transition) {
            TransitionKind::Shift => {
                let queue = conf.queue.len();
                if queue == 0 || (!conf.stack.is_empty() && queue == 1) {
                    return Err(Error::precondition(
                        "SH would leave the last queued node without a head",
                    ));
                }
                next.shift()?;
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
                if b == 0 {
                    return Err(Error::precondition("RA would attach ROOT"));
                }
                next.pop_stack()?;
                next.attach(s, b, label)?;
                next.queue[0] = s;
            }
            _ => {
                return Err(Error::precondition(format!(
                    "{} is not an arc-standard transition",
                    self.space.name(transition)
                )))
            }
        }
        Ok(next)
    }
}

impl TransitionSystem for ArcStandard {
    fn name(&self) -> &'static str {
        "arc-standard"
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
                "arc-standard parses tagged sentences, not lattices",
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
        Box::new(ArcStandardOracle::new(&self.space))
    }
}

/// Static oracle for arc-standard
///
/// Attaches left as soon as the gold arc is available and right only once
/// the queue head has collected all of its own gold modifiers.
#[derive(Debug)]
pub(crate) struct ArcStandardOracle<'a> {
    space: &'a TransitionSpace,
    gold: Option<GoldArcs>,
}

impl<'a> ArcStandardOracle<'a> {
    pub(crate) fn new(space: &'a TransitionSpace) -> Self {
        Self { space, gold: None }
    }
}

impl Oracle for ArcStandardOracle<'_> {
    fn name(&self) -> &'static str {
        "arc-standard static"
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
        let (s, b) = match (conf.stack_at(0), conf.queue_at(0)) {
            (Some(s), Some(b)) => (s, b),
            (None, Some(_)) => return Ok(SHIFT),
            _ => {
                return Err(Error::OracleGoldMismatch(
                    "arc-standard oracle called on an exhausted queue".to_string(),
                ))
            }
        };
        if gold.head(s) == Some(b) {
            let label = gold
                .relation(s)
                .ok_or_else(|| Error::OracleGoldMismatch(format!("node {} has no relation", s)))?;
            return Ok(self.space.left_arc(label));
        }
        if gold.head(b) == Some(s) && gold.modifiers(b).iter().all(|&m| conf.head(m).is_some()) {
            let label = gold
                .relation(b)
                .ok_or_else(|| Error::OracleGoldMismatch(format!("node {} has no relation", b)))?;
            return Ok(self.space.right_arc(label));
        }
        Ok(SHIFT)
    }
}
