use crate::config::ParserConfig;
use crate::error::{Error, Result};

/// Structured perceptron training parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerceptronParams {
    max_iterations: usize,
    shuffle_seed: Option<u64>,
    early_update: bool,
}

impl Default for PerceptronParams {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            shuffle_seed: None,
            early_update: true,
        }
    }
}

impl PerceptronParams {
    /// Take the training settings of a parser configuration
    pub fn from_config(config: &ParserConfig) -> Result<Self> {
        let mut params = Self::default();
        params.set_max_iterations(config.iterations)?;
        params.set_shuffle_seed(config.shuffle_seed);
        params.set_early_update(config.early_update);
        Ok(params)
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn set_max_iterations(&mut self, max_iterations: usize) -> Result<()> {
        if max_iterations < 1 {
            return Err(Error::invalid_input("max_iterations must be at least 1"));
        }
        self.max_iterations = max_iterations;
        Ok(())
    }

    pub fn shuffle_seed(&self) -> Option<u64> {
        self.shuffle_seed
    }

    pub fn set_shuffle_seed(&mut self, seed: Option<u64>) {
        self.shuffle_seed = seed;
    }

    pub fn early_update(&self) -> bool {
        self.early_update
    }

    pub fn set_early_update(&mut self, enabled: bool) {
        self.early_update = enabled;
    }
}
