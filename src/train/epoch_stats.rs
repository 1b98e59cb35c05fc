use serde::{Serialize, Deserialize};

/// Per-epoch statistics emitted by the trainer.
///
/// When a `progress_tx` channel is configured in `TrainerOptions`, the epoch
/// loop sends one `EpochStats` value after every monitored epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Epoch budget of this run.
    pub total_epochs: usize,
    /// Point-normalised training chi² of the step, `None` after a NaN.
    pub training_chi2: Option<f64>,
    /// Validation chi² of the epoch, `None` after a NaN.
    pub validation_chi2: Option<f64>,
    /// Best epoch so far (0-based).
    pub best_epoch: Option<usize>,
    /// Patience counter after this epoch.
    pub stopping_degree: usize,
    /// Wall-clock duration of the epoch in milliseconds.
    pub elapsed_ms: u64,
}
