use std::fs::File;
use std::io::{BufReader, BufWriter};

use serde::{Deserialize, Serialize};

use crate::backend::MetaModel;
use crate::error::Result;
use crate::stopping::{PositivityStatus, Stopping};

/// Serializable record of a finished fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    /// `pass_status` or `failed_status` of the trainer.
    pub status: String,
    /// `POS_PASS` or `POS_VETO`.
    pub positivity_status: String,
    /// Figure of merit of the fit: the experimental chi².
    pub loss: f64,
    /// Training chi² of the best epoch, or the sentinel for a terrible run.
    pub training_loss: f64,
    /// Validation chi² of the best epoch, or the sentinel for a terrible run.
    pub validation_loss: f64,
    /// Chi² to the central data, without replica fluctuations or split.
    pub experimental_loss: f64,
    pub best_epoch: Option<usize>,
    /// 1-based epoch at which the fit stopped.
    pub stop_epoch: usize,
    pub terrible: bool,
}

impl FitSummary {
    /// Serialises the summary to pretty-printed JSON at `path`.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load_json(path: &str) -> Result<FitSummary> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Everything a fit leaves behind: the summary, the stopping object with
/// its history, and the models, with the best weights loaded.
pub struct FitResult<M: MetaModel> {
    /// No NaN in the last step and a best epoch passing positivity.
    pub passed: bool,
    pub positivity: PositivityStatus,
    pub summary: FitSummary,
    pub stopping: Stopping<M>,
    pub training: M,
    pub experimental: M,
    pub(crate) experimental_ndata: usize,
}

impl<M: MetaModel> FitResult<M> {
    /// Training, validation and experimental chi² of the current weights.
    ///
    /// Training and validation only count the experiments entering the
    /// chi²; the experimental chi² is normalised by all the data points.
    pub fn evaluate(&mut self) -> Result<(f64, f64, f64)> {
        let train_chi2 = self.stopping.evaluate_training(&mut self.training)?;
        let (val_chi2, _) = self.stopping.validation_mut().loss()?;
        let exp_chi2 = self.experimental.evaluate()?.total / self.experimental_ndata as f64;
        Ok((train_chi2, val_chi2, exp_chi2))
    }
}
