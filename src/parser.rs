use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use crate::config::ParserConfig;
use crate::configuration::Configuration;
use crate::error::Result;
use crate::features::{FeatureExtractor, FeatureSetup};
use crate::graph::{GoldGraph, LabeledDependencyGraph, MorphDependencyGraph};
use crate::model::{AveragedMatrix, ModelReader, ModelWriter};
use crate::search::{BeamSearch, DecodeResult, Deterministic, SearchContext};
use crate::sentence::ParseInput;
use crate::train::{PerceptronParams, Trainer, TrainingReport};
use crate::transition::{System, Transition, TransitionSpace, TransitionSystem};
use crate::vocabulary::Vocabulary;

/// A transition system, feature extractor and weights over one vocabulary
///
/// The relations vocabulary is frozen on construction because it fixes the
/// layout of the transition IDs, so every relation must be known by then.
#[derive(Debug, Clone)]
pub struct Parser {
    config: ParserConfig,
    vocab: Arc<Vocabulary>,
    system: System,
    extractor: FeatureExtractor,
    model: AveragedMatrix,
}

impl Parser {
    /// Create an untrained parser
    ///
    /// Templates are read from `config.features` when set, otherwise the
    /// built-in feature setup is used.
    pub fn new(config: ParserConfig, vocab: Arc<Vocabulary>) -> Result<Self> {
        let setup = match &config.features {
            Some(path) => FeatureSetup::from_file(path)?,
            None => FeatureSetup::default(),
        };
        Self::with_features(config, vocab, setup)
    }

    pub fn with_features(
        config: ParserConfig,
        vocab: Arc<Vocabulary>,
        setup: FeatureSetup,
    ) -> Result<Self> {
        Self::assemble(config, vocab, setup, AveragedMatrix::new())
    }

    fn assemble(
        config: ParserConfig,
        vocab: Arc<Vocabulary>,
        setup: FeatureSetup,
        model: AveragedMatrix,
    ) -> Result<Self> {
        config.validate()?;
        let space = TransitionSpace::new(vocab.clone())?.with_projection(config.projection());
        let system = System::new(config.system, config.strategy, space);
        let extractor = FeatureExtractor::new(setup, vocab.clone())?;
        debug!(
            "{} parser with {} templates and {} relations",
            system.name(),
            extractor.templates().len(),
            vocab.relations.len()
        );
        Ok(Self {
            config,
            vocab,
            system,
            extractor,
            model,
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn vocabulary(&self) -> &Arc<Vocabulary> {
        &self.vocab
    }

    pub fn system(&self) -> &System {
        &self.system
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn model(&self) -> &AveragedMatrix {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut AveragedMatrix {
        &mut self.model
    }

    pub(crate) fn parts_mut(&mut self) -> (&System, &FeatureExtractor, &mut AveragedMatrix) {
        (&self.system, &self.extractor, &mut self.model)
    }

    pub fn search_context(&self) -> SearchContext<'_> {
        SearchContext::new(&self.system, &self.extractor, &self.model)
    }

    /// Beam search with the configured width
    pub fn parse(&self, input: &ParseInput) -> Result<ParseOutput> {
        let beam = BeamSearch::new(self.config.beam_size, self.config.concurrent)?;
        let result = beam.decode(&self.search_context(), input)?;
        Ok(ParseOutput { result })
    }

    /// Greedy search, one transition at a time
    pub fn parse_deterministic(&self, input: &ParseInput) -> Result<ParseOutput> {
        let result = Deterministic::decode(&self.search_context(), input)?;
        Ok(ParseOutput { result })
    }

    /// Train with the averaged perceptron using the configured settings
    pub fn train<I>(&mut self, corpus: I) -> Result<TrainingReport>
    where
        I: IntoIterator<Item = (ParseInput, GoldGraph)>,
    {
        let mut trainer =
            Trainer::averaged().with_params(PerceptronParams::from_config(&self.config)?);
        for (input, gold) in corpus {
            trainer.append(input, gold);
        }
        trainer.train(self)
    }

    /// Serialize configuration, templates, vocabulary and weights
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        ModelWriter::to_bytes(
            &self.config,
            self.extractor.setup(),
            &self.vocab,
            &self.model,
        )
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        ModelWriter::write_file(
            path,
            &self.config,
            self.extractor.setup(),
            &self.vocab,
            &self.model,
        )?;
        info!("saved {} weights to {}", self.model.nnz(), path.display());
        Ok(())
    }

    /// Restore a parser together with the vocabulary stored in the blob
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let data = ModelReader::read(buf)?;
        data.vocab.freeze();
        Self::assemble(data.config, Arc::new(data.vocab), data.features, data.weights)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&fs::read(path)?)
    }

    /// Restore a parser into an existing session vocabulary
    ///
    /// Fails with [`VocabularyMismatch`](crate::Error::VocabularyMismatch)
    /// when the session and the blob disagree on any shared ID.
    pub fn load_with_vocabulary<P: AsRef<Path>>(path: P, vocab: Arc<Vocabulary>) -> Result<Self> {
        let data = ModelReader::read(&fs::read(path)?)?;
        vocab.extend_from(&data.vocab)?;
        vocab.freeze();
        Self::assemble(data.config, vocab, data.features, data.weights)
    }
}

/// The analysis of one input
#[derive(Debug, Clone)]
pub struct ParseOutput {
    result: DecodeResult,
}

impl ParseOutput {
    pub fn configuration(&self) -> &Configuration {
        self.result.best()
    }

    /// Dependency tree over the tokens or, for lattices, the chosen morphemes
    pub fn graph(&self) -> LabeledDependencyGraph {
        self.configuration().to_graph()
    }

    /// Tree with its spellout decisions, for lattice input
    pub fn morph_graph(&self) -> Option<MorphDependencyGraph> {
        self.configuration().to_morph_graph()
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.result.transitions()
    }

    pub fn score(&self) -> f64 {
        self.configuration().score()
    }

    pub fn into_result(self) -> DecodeResult {
        self.result
    }
}
