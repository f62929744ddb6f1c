use std::sync::Arc;

use transparse::train::HeldOut;
use transparse::{
    GoldGraph, LabeledDependencyGraph, ParseInput, Parser, ParserConfig, TaggedSentence, Trainer,
    Vocabulary,
};

fn tagged(pairs: &[(&str, &str)]) -> TaggedSentence {
    pairs.iter().copied().collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Dependency Parser Training and Parsing Example");
    println!("==============================================\n");

    let vocab = Arc::new(Vocabulary::new());
    let corpus = [
        (
            tagged(&[
                ("Economic", "NN"),
                ("news", "NN"),
                ("had", "VB"),
                ("little", "ADJ"),
                ("effect", "NN"),
            ]),
            vec![(2, "ATT"), (3, "SBJ"), (0, "PRED"), (5, "ATT"), (3, "OBJ")],
        ),
        (
            tagged(&[("Markets", "NN"), ("fell", "VB"), ("sharply", "ADV")]),
            vec![(2, "SBJ"), (0, "PRED"), (2, "ATT")],
        ),
        (
            tagged(&[("Little", "ADJ"), ("news", "NN"), ("had", "VB"), ("effect", "NN")]),
            vec![(2, "ATT"), (3, "SBJ"), (0, "PRED"), (3, "OBJ")],
        ),
    ];

    // every relation has to be known before the parser lays out its transitions
    let mut instances = Vec::new();
    for (sentence, heads) in &corpus {
        let gold = LabeledDependencyGraph::from_heads(sentence, heads, &vocab.relations)?;
        instances.push((ParseInput::from(sentence.clone()), GoldGraph::from(gold)));
    }
    println!("Training data: {} sentences", instances.len());

    let config = ParserConfig::from_json_str(
        r#"{"system": "arc-eager", "beam_size": 8, "iterations": 20, "shuffle_seed": 42}"#,
    )?;
    println!("Configuration: {}\n", config.to_json()?);
    let mut parser = Parser::new(config, vocab)?;

    let mut trainer = Trainer::averaged()
        .with_max_iterations(parser.config().iterations)?
        .with_shuffle_seed(parser.config().shuffle_seed);
    trainer.verbose(true);
    for (input, gold) in &instances {
        trainer.append(input.clone(), gold.clone());
    }
    let mut held_out = HeldOut::new(instances.clone());
    let report = trainer.train_with(&mut parser, &mut held_out)?;
    println!(
        "\nTrained {} iterations, {} updates, held-out LAS {:?}",
        report.iterations,
        report.updates,
        held_out.history()
    );

    let model_path = std::env::temp_dir().join("example_model.trp");
    parser.save(&model_path)?;
    let parser = Parser::load(&model_path)?;
    println!("Reloaded model from {}\n", model_path.display());

    let sentence = tagged(&[("Economic", "NN"), ("news", "NN"), ("fell", "VB")]);
    let output = parser.parse(&ParseInput::from(sentence.clone()))?;
    let relations = &parser.vocabulary().relations;
    for (i, head) in output.graph().heads().iter().enumerate() {
        let token = &sentence[i];
        match head {
            Some((head, relation)) => println!(
                "  {:>2} {:<10} <- {} ({})",
                i + 1,
                token.form,
                head,
                relations.value(*relation).unwrap_or_default()
            ),
            None => println!("  {:>2} {:<10} <- unattached", i + 1, token.form),
        }
    }
    println!("  score {:.3}", output.score());

    Ok(())
}
