use std::sync::mpsc;
use std::time::Instant;

use tracing::debug;

use crate::backend::MetaModel;
use crate::error::Result;
use crate::stopping::Stopping;
use crate::train::epoch_stats::EpochStats;

/// Epochs between two updates of the positivity multiplier.
pub const POSITIVITY_UPDATE_EACH: usize = 100;

/// Trains `training_model` for at most `epochs` epochs, feeding every
/// training step to `stopping`, and returns whether the last monitored step
/// passed (i.e. was not NaN).
///
/// Every [`POSITIVITY_UPDATE_EACH`] epochs the positivity penalties of the
/// training model are multiplied by `pos_multiplier`. Statistics are logged
/// every `log_each` epochs.
///
/// # Early termination
/// The loop breaks as soon as `stopping.stop_here()` is true.
pub fn train_and_fit<M: MetaModel>(
    training_model: &mut M,
    stopping: &mut Stopping<M>,
    epochs: usize,
    pos_multiplier: f64,
    log_each: usize,
    progress_tx: Option<&mpsc::Sender<EpochStats>>,
) -> Result<bool> {
    let mut passes = true;

    for epoch in 0..epochs {
        let t_start = Instant::now();

        let training_info = training_model.fit()?;

        if (epoch + 1) % POSITIVITY_UPDATE_EACH == 0 {
            debug!(epoch, pos_multiplier, "updating the positivity multiplier");
            training_model.scale_positivity(pos_multiplier);
        }
        let print_stats = log_each > 0 && (epoch + 1) % log_each == 0;

        passes = stopping.monitor_chi2(&training_info, epoch, print_stats)?;

        if let Some(tx) = progress_tx {
            let last = stopping.history().last().filter(|_| passes);
            let stats = EpochStats {
                epoch: epoch + 1,
                total_epochs: epochs,
                training_chi2: last.map(|state| state.training_total()),
                validation_chi2: last.map(|state| state.validation_total()),
                best_epoch: stopping.e_best_chi2(),
                stopping_degree: stopping.stopping_degree(),
                elapsed_ms: t_start.elapsed().as_millis() as u64,
            };
            // Nobody listening anymore: keep training regardless.
            let _ = tx.send(stats);
        }

        if stopping.stop_here() {
            break;
        }
    }

    Ok(passes)
}
