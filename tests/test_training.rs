use std::sync::Arc;

use transparse::features::FeatureSetup;
use transparse::train::{HeldOut, MaxIterations};
use transparse::{
    Error, GoldGraph, LabeledDependencyGraph, ParseInput, Parser, ParserConfig, SystemKind,
    TaggedSentence, Trainer, Transition, Vocabulary,
};

fn economic_news() -> TaggedSentence {
    vec![
        ("Economic", "NN"),
        ("news", "NN"),
        ("had", "VB"),
        ("little", "ADJ"),
        ("effect", "NN"),
    ]
    .into_iter()
    .collect()
}

/// An arc-eager parser over the example sentence, scored by word pairs only
fn setup() -> (Parser, LabeledDependencyGraph) {
    let vocab = Arc::new(Vocabulary::new());
    let heads = [(2, "ATT"), (3, "SBJ"), (0, "PRED"), (5, "ATT"), (3, "OBJ")];
    let gold =
        LabeledDependencyGraph::from_heads(&economic_news(), &heads, &vocab.relations).unwrap();
    let config = ParserConfig::new(SystemKind::ArcEager)
        .with_beam_size(1)
        .unwrap();
    let setup = FeatureSetup::parse_lines("S0|w+N0|w").unwrap();
    (Parser::with_features(config, vocab, setup).unwrap(), gold)
}

#[test]
fn test_averaged_trainer() {
    let (mut parser, gold) = setup();
    let mut trainer = Trainer::averaged()
        .with_max_iterations(2)
        .unwrap()
        .with_early_update(false)
        .with_shuffle_seed(Some(0));
    trainer.verbose(true);
    trainer.append(economic_news(), gold.clone());
    assert_eq!(trainer.len(), 1);

    let report = trainer.train(&mut parser).unwrap();
    assert_eq!(report.mistakes, vec![1, 0]);
    assert_eq!(parser.model().integrations(), 1);
    assert!(parser.vocabulary().features.is_frozen());

    let output = parser
        .parse_deterministic(&ParseInput::from(economic_news()))
        .unwrap();
    assert_eq!(output.graph().heads(), gold.heads());
}

#[test]
fn test_trivial_trainer_keeps_last_weights() {
    let (mut parser, gold) = setup();
    let mut trainer = Trainer::trivial()
        .with_max_iterations(2)
        .unwrap()
        .with_early_update(false);
    trainer.append(economic_news(), gold.clone());

    let report = trainer.train(&mut parser).unwrap();
    assert_eq!(report.mistakes, vec![1, 0]);
    assert!(parser.model().is_finalized());
    assert_eq!(parser.model().integrations(), 0);
    assert_eq!(parser.model().generation(), 0);

    let output = parser
        .parse_deterministic(&ParseInput::from(economic_news()))
        .unwrap();
    assert_eq!(output.graph().heads(), gold.heads());

    // finalized weights refuse updates until reinitialized
    let model = parser.model_mut();
    assert!(matches!(
        model.increment(&[0], Transition(1)),
        Err(Error::PreconditionViolation(_))
    ));
    model.reinitialize();
    assert!(model.increment(&[0], Transition(1)).is_ok());
}

#[test]
fn test_stop_condition_ends_training() {
    let (mut parser, gold) = setup();
    let mut trainer = Trainer::averaged().with_max_iterations(10).unwrap();
    trainer.append(economic_news(), gold);

    let report = trainer
        .train_with(&mut parser, &mut MaxIterations(3))
        .unwrap();
    assert_eq!(report.iterations, 3);
    assert_eq!(report.mistakes.len(), 3);
    assert!(parser.model().is_finalized());
}

#[test]
fn test_held_out_stops_on_flat_accuracy() {
    let (mut parser, gold) = setup();
    let mut trainer = Trainer::averaged()
        .with_max_iterations(10)
        .unwrap()
        .with_early_update(false);
    trainer.append(economic_news(), gold.clone());

    let mut held_out = HeldOut::new(vec![(
        ParseInput::from(economic_news()),
        GoldGraph::from(gold),
    )]);
    let report = trainer.train_with(&mut parser, &mut held_out).unwrap();
    // perfect after the first update, then two iterations without gain
    assert_eq!(held_out.history(), &[1.0, 1.0, 1.0]);
    assert_eq!(report.iterations, 3);
}

#[test]
fn test_invalid_trainer_settings() {
    assert!(matches!(
        Trainer::averaged().with_max_iterations(0),
        Err(Error::InvalidInput(_))
    ));
    let (mut parser, _) = setup();
    let trainer = Trainer::averaged();
    assert!(trainer.is_empty());
    assert!(matches!(
        trainer.train(&mut parser),
        Err(Error::InvalidInput(_))
    ));
}

fn stocks_fell() -> TaggedSentence {
    vec![("Stocks", "NNS"), ("fell", "VBD")].into_iter().collect()
}

/// Vocabulary sizes after two iterations on the example sentence
fn vocabulary_sizes(held_out: Option<&mut HeldOut>) -> (usize, usize, usize, usize) {
    let (mut parser, gold) = setup();
    let mut trainer = Trainer::averaged()
        .with_max_iterations(2)
        .unwrap()
        .with_early_update(false)
        .with_shuffle_seed(Some(0));
    trainer.append(economic_news(), gold);
    match held_out {
        Some(held_out) => trainer.train_with(&mut parser, held_out).unwrap(),
        None => trainer.train(&mut parser).unwrap(),
    };
    let vocab = parser.vocabulary();
    assert!(vocab.words.index("Stocks").is_none());
    assert!(vocab.pos.index("VBD").is_none());
    (
        vocab.words.len(),
        vocab.pos.len(),
        vocab.features.len(),
        vocab.relations.len(),
    )
}

#[test]
fn test_held_out_leaves_vocabulary_alone() {
    let vocab = Arc::new(Vocabulary::new());
    for relation in ["ATT", "SBJ", "PRED", "OBJ"] {
        vocab.relations.add(relation).unwrap();
    }
    let gold = LabeledDependencyGraph::from_heads(
        &stocks_fell(),
        &[(2, "SBJ"), (0, "PRED")],
        &vocab.relations,
    )
    .unwrap();
    let mut held_out = HeldOut::new(vec![(ParseInput::from(stocks_fell()), GoldGraph::from(gold))]);

    let without = vocabulary_sizes(None);
    let with = vocabulary_sizes(Some(&mut held_out));
    assert_eq!(held_out.history().len(), 2);
    assert_eq!(with, without);
}
