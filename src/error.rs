use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a geometry input was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The input was not an ordered sequence at all.
    #[error("vertices must be a sequence of number pairs")]
    NotASequence,

    /// Element `index` of the sequence is not a pair of numbers.
    #[error("vertex {index} is not a pair of numbers")]
    NotANumberPair { index: usize },

    /// Fewer points than a polygon needs.
    #[error("polygon needs at least {min} vertices, got {got}")]
    TooFewVertices { got: usize, min: usize },
}

/// Errors surfaced by the binding layer.
///
/// Every variant is produced before any engine-side mutation happens, so a
/// failed call leaves both the engine and the handle registry untouched.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or undersized geometry input.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A value of the wrong kind was passed where a specific handle or value type is required.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The operation needs a live engine-side counterpart and there is none.
    #[error("body is not registered with a live world: {0} requires a registered body")]
    NotRegistered(&'static str),

    /// The handle was already handed to a world once.
    #[error("already registered: {0}")]
    AlreadyRegistered(&'static str),

    /// Out-of-domain scalar (negative mass, non-finite time step, ...).
    #[error("invalid value: {0}")]
    InvalidValue(String),
}
