use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::backend::{MetaModel, TrainingInfo};
use crate::data::dataset::{parse_ndata, DatasetInfo};
use crate::error::{FitError, Result};
use crate::stopping::fit_state::{FitState, LossMap};
use crate::stopping::history::FitHistory;
use crate::stopping::positivity::{Positivity, PositivityStatus};
use crate::stopping::validation::Validation;

/// Settings of the stopping algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct StoppingConfig {
    /// Largest positivity loss accepted for a best-fit candidate.
    pub threshold_positivity: f64,
    /// Epoch budget, only used for reporting.
    pub total_epochs: usize,
    /// Epochs without improvement tolerated before stopping.
    pub stopping_patience: usize,
    /// Never request a stop; the fit runs for the whole epoch budget.
    pub dont_stop: bool,
    /// Checkpoint the best weights every this many epochs.
    pub save_each: Option<usize>,
    /// Amount the patience counter advances per monitored step once a
    /// best fit has been found. Before that the counter does not move.
    pub count: usize,
}

impl Default for StoppingConfig {
    fn default() -> Self {
        StoppingConfig {
            threshold_positivity: 1e-6,
            total_epochs: 0,
            stopping_patience: 7000,
            dont_stop: false,
            save_each: None,
            count: 1,
        }
    }
}

/// Driver of the stopping algorithm.
///
/// Fed once per epoch through [`Stopping::monitor_chi2`], it keeps the
/// history of the fit, tracks the best epoch (lowest validation chi² among
/// the epochs that pass positivity) and decides when to stop. When it stops
/// the best weights are loaded back into the validation model.
///
/// When no dataset has validation points the validation model is expected
/// to be compiled on the training data.
pub struct Stopping<M: MetaModel> {
    tr_ndata: Vec<(String, usize)>,
    validation: Validation<M>,
    positivity: Positivity,
    history: FitHistory<M::Weights>,
    dont_stop: bool,
    stop_now: bool,
    stopping_patience: usize,
    stopping_degree: usize,
    count: usize,
    increment: usize,
    total_epochs: usize,
}

impl<M: MetaModel> Stopping<M> {
    pub fn new(validation_model: M, all_data: &[DatasetInfo], config: StoppingConfig) -> Result<Self> {
        let counts = parse_ndata(all_data);
        if counts.total_training() == 0 {
            return Err(FitError::NoChi2Data);
        }
        let validation = Validation::new(validation_model, counts.validation)?;
        Ok(Stopping {
            tr_ndata: counts.training,
            validation,
            positivity: Positivity::new(config.threshold_positivity, counts.positivity),
            history: FitHistory::new(config.save_each),
            dont_stop: config.dont_stop,
            stop_now: false,
            stopping_patience: config.stopping_patience,
            stopping_degree: 0,
            count: config.count,
            increment: 0,
            total_epochs: config.total_epochs,
        })
    }

    /// Validation chi² of the best fit.
    pub fn vl_loss(&self) -> f64 {
        self.history.best_vl()
    }

    /// Training chi² of the best fit.
    pub fn tr_loss(&self) -> f64 {
        self.history.best_tr()
    }

    /// Epoch of the best chi².
    pub fn e_best_chi2(&self) -> Option<usize> {
        self.history.best_epoch()
    }

    /// 1-based epoch at which the fit stopped.
    pub fn epoch_of_the_stop(&self) -> usize {
        self.history.final_epoch() + 1
    }

    /// To be called at the end of every epoch with the output of the
    /// training step.
    ///
    /// Records the training and validation chi², promotes the epoch to best
    /// fit when it improves the validation chi² and passes positivity, and
    /// requests a stop once the patience runs out.
    ///
    /// Returns `Ok(false)` when the training chi² is NaN: the stop is
    /// requested immediately and the best weights, if any, are reloaded.
    /// Errors only come from malformed training or evaluation output.
    pub fn monitor_chi2(&mut self, training_info: &TrainingInfo, epoch: usize, print_stats: bool) -> Result<bool> {
        let (tr_chi2, all_tr) = self.parse_training(training_info)?;

        if tr_chi2.is_nan() {
            warn!(" > NaN found, stopping activated");
            self.stop_now = true;
            self.history.reload(&mut self.validation)?;
            return Ok(false);
        }

        self.stopping_degree += self.increment;

        let (vl_chi2, all_vl) = self.validation.loss()?;

        let fitstate = FitState::new(all_tr, all_vl, training_info.clone());
        let passes_positivity = self.positivity.check(&fitstate)?;
        if print_stats {
            self.print_current_stats(epoch, &fitstate);
        }
        self.history.save(fitstate, epoch);

        if passes_positivity && vl_chi2 < self.history.best_vl() {
            debug!(epoch, vl_chi2, "new best fit");
            self.history.set_best_epoch(epoch, &self.validation);
            self.stopping_degree = 1;
            self.increment = self.count;
        }

        if self.stopping_degree > self.stopping_patience {
            self.stop_now = true;
            self.history.reload(&mut self.validation)?;
        }
        Ok(true)
    }

    /// Ends the fit at the end of the epoch budget: the stop is latched and
    /// the best weights reloaded (or the run marked terrible).
    pub fn make_stop(&mut self) -> Result<()> {
        self.stop_now = true;
        self.history.reload(&mut self.validation)
    }

    fn print_current_stats(&self, epoch: usize, fitstate: &FitState<M::Weights>) {
        let mut total_str = format!(
            "At epoch {}/{}, total loss: {}\n",
            epoch + 1,
            self.total_epochs,
            fitstate.training_total()
        );
        let partials: Vec<String> = self.tr_ndata.iter()
            .filter_map(|(name, _)| {
                fitstate.training_losses().get(name).map(|chi2| format!("{name}: {chi2:.3}"))
            })
            .collect();
        total_str.push_str(&partials.join(", "));
        total_str.push_str(&format!("\nValidation loss at this point: {}", fitstate.validation_total()));
        info!("{}", total_str);
    }

    /// Averages every experiment loss over the sub-steps of the training
    /// step and normalises it by its number of points. Positivity and any
    /// other penalty are left out of the total.
    fn parse_training(&self, training_info: &TrainingInfo) -> Result<(f64, LossMap)> {
        let mut tr_chi2 = BTreeMap::new();
        let mut total_points = 0;
        let mut total_loss = 0.0;
        for (name, npoints) in &self.tr_ndata {
            let loss = training_info.mean(name)?;
            tr_chi2.insert(name.clone(), loss / *npoints as f64);
            total_points += npoints;
            total_loss += loss;
        }
        let total = total_loss / total_points as f64;
        Ok((total, LossMap::new(tr_chi2, total)))
    }

    /// Training chi² of `model`, restricted to the experiments that count
    /// towards the chi².
    pub fn evaluate_training(&self, model: &mut M) -> Result<f64> {
        let evaluation = model.evaluate()?;
        let mut total_points = 0;
        let mut total_loss = 0.0;
        for (name, npoints) in &self.tr_ndata {
            total_loss += evaluation.get(name)?;
            total_points += npoints;
        }
        Ok(total_loss / total_points as f64)
    }

    /// Whether the fit should stop now. Always `false` with `dont_stop`.
    pub fn stop_here(&self) -> bool {
        if self.dont_stop {
            false
        } else {
            self.stop_now
        }
    }

    /// Whether the best fit passes positivity. Without a best fit this is a veto.
    pub fn positivity_pass(&self) -> Result<PositivityStatus> {
        match self.history.best_state() {
            Some(state) if self.positivity.check(state)? => Ok(PositivityStatus::Pass),
            _ => Ok(PositivityStatus::Veto),
        }
    }

    /// The stop latch, tracked even when `dont_stop` is set.
    pub fn stop_now(&self) -> bool {
        self.stop_now
    }

    pub fn stopping_degree(&self) -> usize {
        self.stopping_degree
    }

    pub fn stopping_patience(&self) -> usize {
        self.stopping_patience
    }

    pub fn total_epochs(&self) -> usize {
        self.total_epochs
    }

    pub fn training_ndata(&self) -> &[(String, usize)] {
        &self.tr_ndata
    }

    pub fn history(&self) -> &FitHistory<M::Weights> {
        &self.history
    }

    pub fn validation(&self) -> &Validation<M> {
        &self.validation
    }

    pub fn validation_mut(&mut self) -> &mut Validation<M> {
        &mut self.validation
    }

    /// Replays the checkpoints of the fit, see [`FitHistory::rewind`].
    pub fn rewind(&mut self) -> crate::stopping::history::Rewind<'_, M::Weights, M> {
        self.history.rewind(&mut self.validation)
    }
}
