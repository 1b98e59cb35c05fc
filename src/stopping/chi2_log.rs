use std::fs;
use std::path::Path;

use crate::backend::MetaModel;
use crate::error::Result;
use crate::stopping::stopping::Stopping;

impl<M: MetaModel> Stopping<M> {
    /// Status of the fit every `log_each` epochs, one text block per record.
    ///
    /// Each block lists the training and validation chi² of every
    /// experiment (validation defaults to `0.0` for experiments with no
    /// validation points) followed by the totals. Values are written with
    /// their shortest round-trip representation, always with a decimal
    /// point (`1.0`, not `1`).
    pub fn chi2exps_str(&self, log_each: usize) -> Vec<String> {
        if log_each == 0 {
            return Vec::new();
        }
        let states = self.history().states();
        let last = self.history().final_epoch().min(states.len().saturating_sub(1));

        (log_each - 1..=last)
            .step_by(log_each)
            .filter_map(|i| states.get(i).map(|state| (i, state)))
            .map(|(i, state)| {
                let data: Vec<String> = self.training_ndata().iter()
                    .map(|(exp, _)| {
                        let tr = state.training_losses().get(exp).unwrap_or(f64::NAN);
                        let vl = state.validation_losses().get(exp).unwrap_or(0.0);
                        format!("{exp}: {tr:?} {vl:?}")
                    })
                    .collect();
                format!(
                    "\nEpoch: {}\n{}\nTotal: training = {:?} validation = {:?}\n",
                    i + 1,
                    data.join("\n"),
                    state.training_total(),
                    state.validation_total()
                )
            })
            .collect()
    }

    /// Writes [`Stopping::chi2exps_str`] to `path`.
    pub fn write_chi2exps<P: AsRef<Path>>(&self, path: P, log_each: usize) -> Result<()> {
        fs::write(path, self.chi2exps_str(log_each).concat())?;
        Ok(())
    }
}
