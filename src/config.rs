use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lattice::{MdParam, SpelloutProjection};
use crate::transition::{JointStrategy, SystemKind};

/// Parser settings
///
/// Every field has a default, so a JSON document only needs the settings it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    pub system: SystemKind,
    pub strategy: JointStrategy,
    /// Beam width, 1 for greedy search
    pub beam_size: usize,
    /// Expand beam members on the rayon thread pool
    pub concurrent: bool,
    /// Training iterations over the corpus
    pub iterations: usize,
    pub shuffle_seed: Option<u64>,
    pub early_update: bool,
    /// Feature setup file, the built-in templates when absent
    pub features: Option<PathBuf>,
    /// How MD transitions name the spellout they commit
    pub md_param: MdParam,
    /// Open class CPOS tags for the `funcs-main-pos*` parameters
    pub main_pos: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            system: SystemKind::ArcEager,
            strategy: JointStrategy::default(),
            beam_size: 32,
            concurrent: true,
            iterations: 10,
            shuffle_seed: None,
            early_update: true,
            features: None,
            md_param: MdParam::default(),
            main_pos: Vec::new(),
        }
    }
}

impl ParserConfig {
    pub fn new(system: SystemKind) -> Self {
        Self {
            system,
            ..Self::default()
        }
    }

    pub fn set_beam_size(&mut self, beam_size: usize) -> Result<()> {
        if beam_size < 1 {
            return Err(Error::invalid_input("beam_size must be at least 1"));
        }
        self.beam_size = beam_size;
        Ok(())
    }

    pub fn set_iterations(&mut self, iterations: usize) -> Result<()> {
        if iterations < 1 {
            return Err(Error::invalid_input("iterations must be at least 1"));
        }
        self.iterations = iterations;
        Ok(())
    }

    /// Set beam width (builder pattern)
    pub fn with_beam_size(mut self, beam_size: usize) -> Result<Self> {
        self.set_beam_size(beam_size)?;
        Ok(self)
    }

    /// Set training iterations (builder pattern)
    pub fn with_iterations(mut self, iterations: usize) -> Result<Self> {
        self.set_iterations(iterations)?;
        Ok(self)
    }

    pub fn with_strategy(mut self, strategy: JointStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn with_shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.shuffle_seed = seed;
        self
    }

    pub fn with_early_update(mut self, enabled: bool) -> Self {
        self.early_update = enabled;
        self
    }

    pub fn with_features<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.features = Some(path.into());
        self
    }

    pub fn with_md_param<I, S>(mut self, md_param: MdParam, main_pos: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.md_param = md_param;
        self.main_pos = main_pos.into_iter().map(Into::into).collect();
        self
    }

    pub fn projection(&self) -> SpelloutProjection {
        SpelloutProjection::new(self.md_param, self.main_pos.iter().cloned())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.beam_size < 1 {
            return Err(Error::invalid_input("beam_size must be at least 1"));
        }
        if self.iterations < 1 {
            return Err(Error::invalid_input("iterations must be at least 1"));
        }
        Ok(())
    }
}
