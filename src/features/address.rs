use std::fmt;
use std::str::FromStr;

use crate::configuration::Configuration;
use crate::lattice::Lattice;

/// Where an address starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// `S<k>`: k-th node from the stack top
    Stack,
    /// `N<k>`: k-th node of the queue
    Queue,
    /// `M<k>`: k-th most recently committed morpheme
    Morpheme,
    /// `L<k>`: k-th pending lattice
    Lattice,
}

/// Relative move from the starting node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Head,
    Head2,
    Left,
    Left2,
    Right,
    Right2,
    /// Every modifier, left to right
    Children,
}

/// A parsed relative address such as `S0h` or `N0l2`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub source: Source,
    pub index: usize,
    pub step: Option<Step>,
}

/// What an address resolved to
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Node(usize),
    Lattice(&'a Lattice),
}

impl Address {
    pub fn new(source: Source, index: usize) -> Self {
        Self {
            source,
            index,
            step: None,
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.step = Some(step);
        self
    }

    pub fn is_generator(&self) -> bool {
        self.step == Some(Step::Children)
    }

    /// Resolve against a configuration
    ///
    /// Empty when the address does not exist in `conf`; generators may yield
    /// several targets.
    pub fn resolve<'a>(&self, conf: &'a Configuration) -> Vec<Target<'a>> {
        let start = match self.source {
            Source::Stack => conf.stack_at(self.index),
            Source::Queue => conf.queue_at(self.index),
            Source::Morpheme => conf.morpheme_at(self.index),
            Source::Lattice => {
                return conf
                    .lattice_at(self.index)
                    .map(Target::Lattice)
                    .into_iter()
                    .collect()
            }
        };
        let node = match start {
            Some(node) => node,
            None => return Vec::new(),
        };
        let step = match self.step {
            Some(step) => step,
            None => return vec![Target::Node(node)],
        };
        let moved = match step {
            Step::Head => conf.head(node).map(|(h, _)| h),
            Step::Head2 => conf
                .head(node)
                .and_then(|(h, _)| conf.head(h))
                .map(|(h, _)| h),
            Step::Left => conf.leftmost(node, 0),
            Step::Left2 => conf.leftmost(node, 1),
            Step::Right => conf.rightmost(node, 0),
            Step::Right2 => conf.rightmost(node, 1),
            Step::Children => {
                return conf
                    .left_modifiers(node)
                    .iter()
                    .chain(conf.right_modifiers(node))
                    .map(|&m| Target::Node(m))
                    .collect()
            }
        };
        moved.map(Target::Node).into_iter().collect()
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let source = match chars.next() {
            Some('S') => Source::Stack,
            Some('N') => Source::Queue,
            Some('M') => Source::Morpheme,
            Some('L') => Source::Lattice,
            _ => return Err(format!("unknown address source in {:?}", s)),
        };
        let rest = chars.as_str();
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(format!("address {:?} has no index", s));
        }
        let index = rest[..digits]
            .parse()
            .map_err(|_| format!("bad index in address {:?}", s))?;
        let step = match &rest[digits..] {
            "" => None,
            "h" => Some(Step::Head),
            "h2" => Some(Step::Head2),
            "l" => Some(Step::Left),
            "l2" => Some(Step::Left2),
            "r" => Some(Step::Right),
            "r2" => Some(Step::Right2),
            "Ci" => Some(Step::Children),
            other => return Err(format!("unknown step {:?} in address {:?}", other, s)),
        };
        if step.is_some() && matches!(source, Source::Morpheme | Source::Lattice) {
            return Err(format!("address {:?} cannot move away from a morpheme or lattice", s));
        }
        Ok(Self {
            source,
            index,
            step,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            Source::Stack => "S",
            Source::Queue => "N",
            Source::Morpheme => "M",
            Source::Lattice => "L",
        };
        let step = match self.step {
            None => "",
            Some(Step::Head) => "h",
            Some(Step::Head2) => "h2",
            Some(Step::Left) => "l",
            Some(Step::Left2) => "l2",
            Some(Step::Right) => "r",
            Some(Step::Right2) => "r2",
            Some(Step::Children) => "Ci",
        };
        write!(f, "{}{}{}", source, self.index, step)
    }
}

/// A property read off a resolved address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Word,
    Pos,
    WordPos,
    /// Relation of the arc above the node
    Label,
    ValencyLeft,
    ValencyRight,
    Valency,
    LabelsLeft,
    LabelsRight,
    Labels,
    /// POS tags of all modifiers
    ModifierPos,
    /// Bucketed distance between the stack top and the queue head
    Distance,
    /// Headless nodes on the stack
    HeadlessStack,
    Host,
    Suffix,
    /// Surface token of a lattice
    Token,
    /// Number of spellouts of a lattice
    Spellouts,
    Form,
    Cpos,
    MorphFeatures,
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let attr = match s {
            "w" => Attribute::Word,
            "p" => Attribute::Pos,
            "wp" => Attribute::WordPos,
            "l" => Attribute::Label,
            "vl" => Attribute::ValencyLeft,
            "vr" => Attribute::ValencyRight,
            "vf" => Attribute::Valency,
            "sl" => Attribute::LabelsLeft,
            "sr" => Attribute::LabelsRight,
            "sf" => Attribute::Labels,
            "fp" => Attribute::ModifierPos,
            "d" => Attribute::Distance,
            "o" => Attribute::HeadlessStack,
            "h" => Attribute::Host,
            "x" => Attribute::Suffix,
            "t" => Attribute::Token,
            "n" => Attribute::Spellouts,
            "f" => Attribute::Form,
            "c" => Attribute::Cpos,
            "g" => Attribute::MorphFeatures,
            _ => return Err(format!("unknown attribute {:?}", s)),
        };
        Ok(attr)
    }
}

fn id_or_unknown(id: Option<u32>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}

fn join_sorted(mut values: Vec<u32>) -> String {
    values.sort_unstable();
    values.dedup();
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl Attribute {
    /// Value of the attribute at `target`, `None` when it does not apply
    pub fn value(self, conf: &Configuration, target: Target<'_>) -> Option<String> {
        let node = match target {
            Target::Lattice(lattice) => {
                return match self {
                    Attribute::Token => Some(lattice.token.clone()),
                    Attribute::Spellouts => Some(lattice.spellouts().len().to_string()),
                    _ => None,
                }
            }
            Target::Node(node) => node,
        };
        let dep = conf.node(node)?;
        let labels = |mods: &[usize]| -> Vec<u32> {
            mods.iter()
                .filter_map(|&m| conf.head(m).map(|(_, r)| r))
                .collect()
        };
        let value = match self {
            Attribute::Word => id_or_unknown(dep.word),
            Attribute::Pos => id_or_unknown(dep.pos),
            Attribute::WordPos => id_or_unknown(dep.wpos),
            Attribute::Label => conf.head(node)?.1.to_string(),
            Attribute::ValencyLeft => conf.left_modifiers(node).len().to_string(),
            Attribute::ValencyRight => conf.right_modifiers(node).len().to_string(),
            Attribute::Valency => {
                (conf.left_modifiers(node).len() + conf.right_modifiers(node).len()).to_string()
            }
            Attribute::LabelsLeft => join_sorted(labels(conf.left_modifiers(node))),
            Attribute::LabelsRight => join_sorted(labels(conf.right_modifiers(node))),
            Attribute::Labels => {
                let mut all = labels(conf.left_modifiers(node));
                all.extend(labels(conf.right_modifiers(node)));
                join_sorted(all)
            }
            Attribute::ModifierPos => join_sorted(
                conf.left_modifiers(node)
                    .iter()
                    .chain(conf.right_modifiers(node))
                    .filter_map(|&m| conf.node(m).and_then(|n| n.pos))
                    .collect(),
            ),
            Attribute::Distance => {
                let s = conf.stack_at(0)?;
                let b = conf.queue_at(0)?;
                let d = if s > b { s - b } else { b - s };
                let bucket = match d {
                    d if d > 10 => 6,
                    d if d > 5 => 5,
                    d => d,
                };
                bucket.to_string()
            }
            Attribute::HeadlessStack => conf.num_head_stack().to_string(),
            Attribute::Host => dep.host?.to_string(),
            Attribute::Suffix => dep.suffix?.to_string(),
            Attribute::Form => dep.token.form.clone(),
            Attribute::Cpos => dep.cpos_id?.to_string(),
            Attribute::MorphFeatures => dep.features.clone()?,
            Attribute::Token | Attribute::Spellouts => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::economic_news;
    use crate::sentence::ParseInput;
    use crate::transition::tests::economic_space;
    use crate::transition::{ArcEager, TransitionSystem, SHIFT};

    #[test]
    fn test_parse_addresses() {
        let addr: Address = "S0h2".parse().unwrap();
        assert_eq!(addr, Address::new(Source::Stack, 0).with_step(Step::Head2));
        assert_eq!(addr.to_string(), "S0h2");
        let addr: Address = "N12Ci".parse().unwrap();
        assert_eq!(addr.index, 12);
        assert!(addr.is_generator());
        assert_eq!("L1".parse::<Address>().unwrap().source, Source::Lattice);

        assert!("X0".parse::<Address>().is_err());
        assert!("S".parse::<Address>().is_err());
        assert!("S0q".parse::<Address>().is_err());
        assert!("M0h".parse::<Address>().is_err());
    }

    #[test]
    fn test_resolve_and_read_attributes() {
        let (vocab, space) = economic_space();
        let system = ArcEager::new(space);
        let mut conf = system.initial(&ParseInput::Tagged(economic_news())).unwrap();
        conf = system.apply(&conf, SHIFT).unwrap();
        conf = system.apply(&conf, SHIFT).unwrap();
        // news <- Economic
        conf = system.apply(&conf, system.space().left_arc(0)).unwrap();

        let n0: Address = "N0".parse().unwrap();
        let targets = n0.resolve(&conf);
        assert_eq!(targets.len(), 1);
        let news = vocab.words.index("news").unwrap();
        assert_eq!(Attribute::Word.value(&conf, targets[0]), Some(news.to_string()));
        assert_eq!(Attribute::ValencyLeft.value(&conf, targets[0]).as_deref(), Some("1"));
        assert_eq!(Attribute::LabelsLeft.value(&conf, targets[0]).as_deref(), Some("0"));
        assert_eq!(Attribute::Label.value(&conf, targets[0]), None);
        assert_eq!(Attribute::Distance.value(&conf, targets[0]).as_deref(), Some("2"));
        assert_eq!(Attribute::HeadlessStack.value(&conf, targets[0]).as_deref(), Some("1"));

        let left: Address = "N0l".parse().unwrap();
        let economic = left.resolve(&conf);
        assert_eq!(Attribute::Form.value(&conf, economic[0]).as_deref(), Some("Economic"));
        assert_eq!(Attribute::Label.value(&conf, economic[0]).as_deref(), Some("0"));
        assert!("S1".parse::<Address>().unwrap().resolve(&conf).is_empty());
        assert_eq!("N0Ci".parse::<Address>().unwrap().resolve(&conf).len(), 1);
        assert_eq!(Attribute::Token.value(&conf, economic[0]), None);
    }
}
