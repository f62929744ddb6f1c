//! Transition-based dependency parsing with beam search
//!
//! This library parses tagged sentences, or ambiguous morphological lattices,
//! into labeled dependency trees. Configurations are explored with a beam and
//! scored by a sparse linear model trained with the structured averaged
//! perceptron.
//!
//! # Examples
//!
//! ## Training
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use transparse::{
//!     GoldGraph, LabeledDependencyGraph, ParseInput, Parser, ParserConfig, SystemKind,
//!     TaggedSentence, Vocabulary,
//! };
//!
//! let vocab = Arc::new(Vocabulary::new());
//! let sentence: TaggedSentence = vec![("Economic", "NN"), ("news", "NN"), ("had", "VB")]
//!     .into_iter()
//!     .collect();
//! let heads = [(2, "ATT"), (3, "SBJ"), (0, "PRED")];
//! // gold trees register their relations, which must precede the parser
//! let gold = LabeledDependencyGraph::from_heads(&sentence, &heads, &vocab.relations)?;
//!
//! let config = ParserConfig::new(SystemKind::ArcEager).with_iterations(5)?;
//! let mut parser = Parser::new(config, vocab)?;
//! parser.train(vec![(ParseInput::from(sentence), GoldGraph::from(gold))])?;
//! parser.save("model.trp")?;
//! # Ok::<(), transparse::Error>(())
//! ```
//!
//! ## Parsing
//!
//! ```no_run
//! use transparse::{Parser, TaggedSentence};
//!
//! let parser = Parser::load("model.trp")?;
//! let sentence: TaggedSentence = vec![("Economic", "NN"), ("news", "NN"), ("had", "VB")]
//!     .into_iter()
//!     .collect();
//! let output = parser.parse(&sentence.into())?;
//! for (i, head) in output.graph().heads().iter().enumerate() {
//!     println!("{} <- {:?}", i + 1, head);
//! }
//! # Ok::<(), transparse::Error>(())
//! ```

mod config;
mod configuration;
mod error;
mod graph;
mod lattice;
mod parser;
mod sentence;
mod vocabulary;

/// Feature templates and their extraction from configurations
pub mod features;
/// Sparse weights, averaging and model persistence
pub mod model;
/// Beam and deterministic decoders
pub mod search;
/// Perceptron training
pub mod train;
/// Transition systems and oracles
pub mod transition;

// Re-export main types
pub use self::config::ParserConfig;
pub use self::configuration::{
    ConfigId, Configuration, Derivation, FeatureVector, MorphState, NodeState,
};
pub use self::error::{Error, Result};
pub use self::graph::{
    ArcPattern, ArcSet, GoldArcs, GoldGraph, LabeledArc, LabeledDependencyGraph,
    MorphDependencyGraph,
};
pub use self::lattice::{
    Lattice, LatticeSentence, Mapping, MdParam, Morpheme, Spellout, SpelloutProjection,
};
pub use self::parser::{ParseOutput, Parser};
pub use self::sentence::{DepNode, EnumTaggedSentence, ParseInput, TaggedSentence, TaggedToken};
pub use self::transition::{JointStrategy, SystemKind, Transition};
pub use self::vocabulary::{EnumSet, Vocabulary, ROOT_FORM, ROOT_POS};

// Re-export training types for convenience
pub use self::train::{Averaged, Trainer, Trivial};
