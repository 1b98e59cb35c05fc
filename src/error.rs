use thiserror::Error;

/// Errors raised by the fitting core.
///
/// Only structural problems surface here: malformed loss maps, bad
/// configuration, I/O. A diverging or "terrible" replica is not an error; it
/// is reported through the fit status and the sentinel chi² values.
#[derive(Debug, Error)]
pub enum FitError {
    /// A loss that the caller declared was not produced by the backend.
    #[error("loss entry `{0}` missing from the backend output")]
    MissingLoss(String),

    /// A loss map was built without its aggregate entry.
    #[error("loss map has no `total` entry")]
    MissingTotal,

    /// Neither training nor validation data contributes to the chi².
    #[error("no dataset contributes to the chi2")]
    NoChi2Data,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Replica numbers are 1-based.
    #[error("invalid replica number {0}, replicas start at 1")]
    InvalidReplica(u32),

    #[error("could not generate positive pseudodata after {0} attempts")]
    Pseudodata(usize),

    #[error("shape mismatch: {0}")]
    Shape(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, FitError>;
