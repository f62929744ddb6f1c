use std::sync::Arc;

use crate::configuration::{Configuration, FeatureVector};
use crate::error::Result;
use crate::transition::Family;
use crate::vocabulary::Vocabulary;

use super::address::{Attribute, Target};
use super::template::{FeatureSetup, FeatureTemplate};

/// Turns configurations into interned feature IDs
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    setup: FeatureSetup,
    templates: Vec<FeatureTemplate>,
    vocab: Arc<Vocabulary>,
}

impl FeatureExtractor {
    pub fn new(setup: FeatureSetup, vocab: Arc<Vocabulary>) -> Result<Self> {
        let templates = setup.compile()?;
        Ok(Self {
            setup,
            templates,
            vocab,
        })
    }

    pub fn setup(&self) -> &FeatureSetup {
        &self.setup
    }

    pub fn templates(&self) -> &[FeatureTemplate] {
        &self.templates
    }

    /// Extract every feature that fires for `family` in `conf`
    ///
    /// New feature strings are interned while the features set is open. Once
    /// it is frozen, unseen strings are dropped.
    pub fn extract(&self, conf: &Configuration, family: Family) -> FeatureVector {
        let mut features = Vec::new();
        for (idx, template) in self.templates.iter().enumerate() {
            if !template.fires_for(family) {
                continue;
            }
            if template
                .requirements
                .iter()
                .any(|req| req.resolve(conf).is_empty())
            {
                continue;
            }
            for key in self.instantiate(idx, template, conf) {
                if let Some(id) = self.vocab.features.resolve(&key) {
                    features.push(id);
                }
            }
        }
        features
    }

    /// Feature strings of one template, one per combination of generated
    /// addresses
    fn instantiate(&self, idx: usize, template: &FeatureTemplate, conf: &Configuration) -> Vec<String> {
        let mut keys = vec![format!("{}:", idx)];
        for (i, element) in template.elements.iter().enumerate() {
            let values: Vec<String> = element
                .address
                .resolve(conf)
                .into_iter()
                .filter_map(|target| element_value(conf, &element.attributes, target))
                .collect();
            if values.is_empty() {
                return Vec::new();
            }
            let sep = if i == 0 { "" } else { "+" };
            keys = keys
                .iter()
                .flat_map(|prefix| values.iter().map(move |v| format!("{}{}{}", prefix, sep, v)))
                .collect();
        }
        keys
    }
}

fn element_value(
    conf: &Configuration,
    attributes: &[Attribute],
    target: Target<'_>,
) -> Option<String> {
    let values = attributes
        .iter()
        .map(|a| a.value(conf, target))
        .collect::<Option<Vec<_>>>()?;
    Some(values.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::economic_news;
    use crate::sentence::ParseInput;
    use crate::transition::tests::economic_space;
    use crate::transition::{ArcStandard, TransitionSystem, SHIFT};

    fn setup(lines: &str) -> FeatureSetup {
        FeatureSetup::parse_lines(lines).unwrap()
    }

    #[test]
    fn test_unresolved_templates_are_dropped() {
        let (vocab, space) = economic_space();
        let system = ArcStandard::new(space);
        let conf = system.initial(&ParseInput::Tagged(economic_news())).unwrap();
        let extractor =
            FeatureExtractor::new(setup("S0|w+N0|w\nS1|w\nS0h|p\nN0|p,S1"), vocab.clone()).unwrap();

        let features = extractor.extract(&conf, Family::Arc);
        assert_eq!(features.len(), 1);
        let key = vocab.features.value(features[0]).unwrap();
        let root = vocab.words.index("<ROOT>").unwrap();
        let economic = vocab.words.index("Economic").unwrap();
        assert_eq!(key, format!("0:{}+{}", root, economic));

        assert!(extractor.extract(&conf, Family::Morph).is_empty());
    }

    #[test]
    fn test_features_are_stable_and_frozen() {
        let (vocab, space) = economic_space();
        let system = ArcStandard::new(space);
        let conf = system.initial(&ParseInput::Tagged(economic_news())).unwrap();
        let extractor = FeatureExtractor::new(FeatureSetup::default_arc(), vocab.clone()).unwrap();

        let first = extractor.extract(&conf, Family::Arc);
        assert!(!first.is_empty());
        assert_eq!(extractor.extract(&conf, Family::Arc), first);

        vocab.freeze();
        let next = system.apply(&conf, SHIFT).unwrap();
        let before = vocab.features.len();
        let frozen = extractor.extract(&next, Family::Arc);
        assert_eq!(vocab.features.len(), before);
        assert!(frozen.iter().all(|&f| (f as usize) < before));
    }

    #[test]
    fn test_generator_expands_per_child() {
        let (vocab, space) = economic_space();
        let system = ArcStandard::new(space);
        let mut conf = system.initial(&ParseInput::Tagged(economic_news())).unwrap();
        for t in [SHIFT, system.space().left_arc(0), SHIFT, system.space().left_arc(1)] {
            conf = system.apply(&conf, t).unwrap();
        }
        // stack [0], queue [had, little, effect]; had <- news <- Economic
        let extractor = FeatureExtractor::new(setup("N0Ci|w\nN0|vl"), vocab.clone()).unwrap();
        let features = extractor.extract(&conf, Family::Arc);
        assert_eq!(features.len(), 2);
        let news = vocab.words.index("news").unwrap();
        assert_eq!(vocab.features.value(features[0]).unwrap(), format!("0:{}", news));
        assert_eq!(vocab.features.value(features[1]).unwrap(), "1:1");
    }
}
