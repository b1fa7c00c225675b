use thiserror::Error;

/// Errors surfaced across the estimator's API boundary. Only deserialization
/// is fallible in this sense: `record`, `estimate_median`, and friends
/// report failure as sentinel values (`-1`, `0`), per the contract that the
/// estimator never raises exceptions for ordinary out-of-data conditions.
#[derive(Error, Debug)]
pub enum EstimatorError {
    /// The on-disk estimates file failed a structural or value-range check
    /// during deserialize. The in-memory instance being deserialized into is
    /// left untouched; callers decide whether to reinitialize from scratch.
    #[error("corrupt fee estimates file: {0}")]
    CorruptEstimatesFile(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
