use std::sync::Arc;

use transparse::search::Deterministic;
use transparse::transition::TransitionSystem;
use transparse::{
    Error, GoldGraph, JointStrategy, Lattice, LatticeSentence, MdParam, Morpheme,
    MorphDependencyGraph, ParseInput, Parser, ParserConfig, SystemKind, TaggedSentence,
    Vocabulary,
};

fn bbit() -> Lattice {
    Lattice::new(
        "bbit",
        vec![
            Morpheme::new(0, 1, "b", "PREP", "PREP", ""),
            Morpheme::new(1, 2, "h", "DEF", "DEF", ""),
            Morpheme::new(2, 3, "bit", "NN", "NN", "gen=M"),
            Morpheme::new(1, 3, "bit", "NN", "NN", "gen=M"),
            Morpheme::new(0, 3, "bbit", "NN", "NN", "gen=M"),
        ],
    )
    .unwrap()
}

fn hlk() -> Lattice {
    Lattice::new("hlk", vec![Morpheme::new(3, 4, "hlk", "VB", "VB", "")]).unwrap()
}

/// "bbit hlk" with the first token split into three gold morphemes
fn bbit_hlk(vocab: &Vocabulary) -> MorphDependencyGraph {
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
        hlk(),
    ]);
    let ambiguous = LatticeSentence::new(vec![bbit(), hlk()]);
    let heads = [(4, "PREP"), (3, "DEF"), (1, "POBJ"), (0, "PRED")];
    let (graph, added) =
        MorphDependencyGraph::combine_gold(&gold, ambiguous, &heads, vocab).unwrap();
    assert!(!added);
    graph
}

#[test]
fn test_gold_derivation_for_every_joint_setup() {
    let setups = [
        (SystemKind::JointStandard, JointStrategy::MdFirst),
        (SystemKind::JointStandard, JointStrategy::ArcGreedy),
        (SystemKind::JointEager, JointStrategy::MdFirst),
        (SystemKind::JointEager, JointStrategy::ArcGreedy),
    ];
    for (kind, strategy) in setups {
        let vocab = Arc::new(Vocabulary::new());
        let gold = bbit_hlk(&vocab);
        let input = ParseInput::from(gold.lattices.clone());
        let config = ParserConfig::new(kind).with_strategy(strategy);
        let parser = Parser::new(config, vocab).unwrap();

        let mappings = gold.mappings.clone();
        let arcs = gold.graph.arcs.clone();
        let sequence =
            Deterministic::parse_gold(&parser.search_context(), &input, &GoldGraph::from(gold))
                .unwrap();
        let terminal = sequence.terminal();
        assert!(terminal.lattices_done());
        assert_eq!(terminal.arcs(), arcs, "{:?} {:?}", kind, strategy);
        assert_eq!(terminal.morph().unwrap().mappings(), mappings);
        assert_eq!(sequence.features.len(), sequence.len());
    }
}

#[test]
fn test_joint_training_and_parsing() {
    let vocab = Arc::new(Vocabulary::new());
    let gold = bbit_hlk(&vocab);
    let input = ParseInput::from(gold.lattices.clone());
    let config = ParserConfig::new(SystemKind::JointEager)
        .with_beam_size(4)
        .unwrap()
        .with_iterations(3)
        .unwrap()
        .with_shuffle_seed(Some(11));
    let mut parser = Parser::new(config, vocab).unwrap();

    let report = parser
        .train(vec![(input.clone(), GoldGraph::from(gold))])
        .unwrap();
    assert_eq!(report.dropped, 0);
    assert_eq!(report.iterations, 3);

    let output = parser.parse(&input).unwrap();
    assert!(parser.system().is_terminal(output.configuration()));
    let morph = output.morph_graph().unwrap();
    assert_eq!(morph.mappings.len(), 2);
    assert_eq!(morph.mappings[0].token, "bbit");
    assert_eq!(morph.mappings[1].token, "hlk");
    assert_eq!(morph.mappings[1].spellout.as_string(), "hlk-VB-VB-_");
}

#[test]
fn test_pure_morph_commits_each_lattice() {
    let vocab = Arc::new(Vocabulary::new());
    let gold = bbit_hlk(&vocab);
    let parser = Parser::new(ParserConfig::new(SystemKind::Morph), vocab).unwrap();
    let output = parser
        .parse(&ParseInput::from(gold.lattices.clone()))
        .unwrap();
    let morph = output.morph_graph().unwrap();
    assert_eq!(morph.mappings.len(), 2);
    assert!(output.configuration().lattices_done());
}

#[test]
fn test_joint_systems_need_lattices() {
    let vocab = Arc::new(Vocabulary::new());
    bbit_hlk(&vocab);
    let parser = Parser::new(ParserConfig::new(SystemKind::JointStandard), vocab).unwrap();
    let sentence: TaggedSentence = vec![("hlk", "VB")].into_iter().collect();
    assert!(matches!(
        parser.parse(&ParseInput::from(sentence)),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn test_missing_gold_spellout_is_added() {
    let vocab = Vocabulary::new();
    let gold = LatticeSentence::new(vec![hlk()]);
    let nominal = Lattice::new("hlk", vec![Morpheme::new(3, 4, "hlk", "NN", "NN", "")]).unwrap();
    let (graph, added) = MorphDependencyGraph::combine_gold(
        &gold,
        LatticeSentence::new(vec![nominal]),
        &[(0, "PRED")],
        &vocab,
    )
    .unwrap();
    assert!(added);
    assert_eq!(graph.lattices.lattices()[0].spellouts().len(), 2);
}

/// "bsfr xlk": the tags of "bbit hlk" over forms never seen in training
fn bsfr_xlk() -> LatticeSentence {
    LatticeSentence::new(vec![
        Lattice::new(
            "bsfr",
            vec![
                Morpheme::new(0, 1, "b", "PREP", "PREP", ""),
                Morpheme::new(1, 2, "h", "DEF", "DEF", ""),
                Morpheme::new(2, 3, "sfr", "NN", "NN", "gen=M"),
                Morpheme::new(1, 3, "sfr", "NN", "NN", "gen=M"),
                Morpheme::new(0, 3, "bsfr", "NN", "NN", "gen=M"),
            ],
        )
        .unwrap(),
        Lattice::new("xlk", vec![Morpheme::new(3, 4, "xlk", "VB", "VB", "")]).unwrap(),
    ])
}

/// Train a morph parser and count transitions before and after an unseen parse
fn transitions_around_unseen_parse(md_param: MdParam) -> (Arc<Vocabulary>, usize, usize) {
    let vocab = Arc::new(Vocabulary::new());
    let gold = bbit_hlk(&vocab);
    let input = ParseInput::from(gold.lattices.clone());
    let config = ParserConfig::new(SystemKind::Morph)
        .with_iterations(2)
        .unwrap()
        .with_shuffle_seed(Some(5))
        .with_md_param(md_param, ["NN", "VB"]);
    let mut parser = Parser::new(config, vocab.clone()).unwrap();
    parser.train(vec![(input, GoldGraph::from(gold))]).unwrap();

    let before = vocab.transitions.len();
    let output = parser.parse(&ParseInput::from(bsfr_xlk())).unwrap();
    assert_eq!(output.morph_graph().unwrap().mappings.len(), 2);
    (vocab.clone(), before, vocab.transitions.len())
}

#[test]
fn test_projected_md_keys_cover_unseen_forms() {
    let (vocab, before, after) = transitions_around_unseen_parse(MdParam::Pos);
    assert!(vocab.transitions.index("MD-PREP;DEF;NN").is_some());
    assert!(vocab.transitions.index("MD-VB").is_some());
    assert_eq!(after, before);

    // full keys carry the forms, so every unseen path needs a new transition
    let (_, before, after) = transitions_around_unseen_parse(MdParam::Full);
    assert_eq!(after, before + 4);
}

#[test]
fn test_projected_gold_derivation_keeps_mappings() {
    let vocab = Arc::new(Vocabulary::new());
    let gold = bbit_hlk(&vocab);
    let input = ParseInput::from(gold.lattices.clone());
    let config = ParserConfig::new(SystemKind::JointStandard)
        .with_md_param(MdParam::FuncsMainPosProp, ["NN", "VB"]);
    let parser = Parser::new(config, vocab).unwrap();

    let mappings = gold.mappings.clone();
    let sequence =
        Deterministic::parse_gold(&parser.search_context(), &input, &GoldGraph::from(gold))
            .unwrap();
    assert_eq!(sequence.terminal().morph().unwrap().mappings(), mappings);
    let names: Vec<String> = sequence
        .transitions
        .iter()
        .map(|&t| parser.system().space().name(t))
        .filter(|n| n.starts_with("MD-"))
        .collect();
    assert_eq!(names, vec!["MD-b_PREP__;h_DEF__;NN_gen=M", "MD-VB__"]);
}
