/// Errors raised by a single translation request.
///
/// None of them leave shared state behind: the evictor works on its own copy
/// of the queues and every other stage is a pure computation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatError {
    /// Malformed or out-of-range input; the caller can re-enter the field.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A field was read that does not exist on the current branch.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// Every replacement queue is empty.
    #[error("no eviction victim available: all replacement queues are empty")]
    NoVictimAvailable,

    #[error("replacement did not find a victim within {limit} iterations")]
    ReplacementLimitExceeded { limit: usize },
}

impl DatError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

pub type Result<T> = core::result::Result<T, DatError>;
