use std::sync::mpsc;

use crate::train::epoch_stats::EpochStats;

/// Run-level options of a `ModelTrainer`.
///
/// # Fields
/// - `pass_status`      : status reported by a successful fit
/// - `failed_status`    : status reported after a NaN or when no epoch
///                         ever passed positivity
/// - `debug`            : keep the backend session between fits
/// - `save_weights_each`: checkpoint the best weights every this many epochs
/// - `progress_tx`      : optional channel sender; one `EpochStats` is sent
///                         per monitored epoch. A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct TrainerOptions {
    pub pass_status: String,
    pub failed_status: String,
    pub debug: bool,
    pub save_weights_each: Option<usize>,
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        TrainerOptions {
            pass_status: "ok".to_string(),
            failed_status: "fail".to_string(),
            debug: false,
            save_weights_each: None,
            progress_tx: None,
        }
    }
}

impl TrainerOptions {
    /// Default statuses, no checkpoints and no progress channel.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, tx: mpsc::Sender<EpochStats>) -> Self {
        self.progress_tx = Some(tx);
        self
    }
}
