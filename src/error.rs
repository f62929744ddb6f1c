use std::io;

use thiserror::Error;

/// Errors raised while building, training or running a parser
#[derive(Debug, Error)]
pub enum Error {
    /// A transition was applied to a configuration that does not admit it,
    /// or a finalized model received an update.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("division by zero: {0}")]
    DivideByZero(&'static str),

    /// The averaged history was already integrated at this generation
    #[error("weights already integrated at generation {0}")]
    AlreadyIntegrated(u64),

    /// No legal transition reproduces the next gold arc or spellout
    #[error("oracle cannot reproduce gold: {0}")]
    OracleGoldMismatch(String),

    /// Decoding ran out of candidates
    #[error("empty agenda after {0} transitions")]
    EmptyAgenda(usize),

    #[error("derivation exceeded {0} transitions")]
    TransitionLimit(usize),

    /// A model blob disagrees with the vocabulary it is loaded against
    #[error("vocabulary mismatch in {set}: {detail}")]
    VocabularyMismatch { set: &'static str, detail: String },

    #[error("vocabulary set {0} is frozen")]
    FrozenVocabulary(&'static str),

    #[error("invalid feature template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors that only invalidate the current training instance.
    ///
    /// The trainer drops or skips the instance and keeps going; every other
    /// error aborts the run.
    pub fn is_instance_local(&self) -> bool {
        matches!(
            self,
            Error::OracleGoldMismatch(_) | Error::EmptyAgenda(_) | Error::TransitionLimit(_)
        )
    }

    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Error::PreconditionViolation(msg.into())
    }
}

/// Result type used throughout this crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_local_errors() {
        assert!(Error::OracleGoldMismatch("x".into()).is_instance_local());
        assert!(Error::EmptyAgenda(3).is_instance_local());
        assert!(Error::TransitionLimit(800).is_instance_local());
        assert!(!Error::DivideByZero("integrate").is_instance_local());
        assert!(!Error::FrozenVocabulary("words").is_instance_local());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "short").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("short"));
    }
}
