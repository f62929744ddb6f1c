//! Structured perceptron training
//!
//! The trainer derives every instance's gold transition sequence once with
//! the oracle, then repeatedly decodes the corpus with beam search and
//! updates the weights wherever the prediction leaves the gold path.

mod convergence;
mod trainer;

pub use self::convergence::{HeldOut, MaxIterations, Progress, StopCondition};
pub use self::trainer::{
    Averaged, PerceptronParams, Trainer, TrainingInstance, TrainingReport, Trivial,
    UpdateStrategy,
};
