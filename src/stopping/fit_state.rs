use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::TrainingInfo;
use crate::error::{FitError, Result};

/// Per-experiment losses, normalised by number of points, plus their
/// point-weighted `total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossMap {
    total: f64,
    experiments: BTreeMap<String, f64>,
}

impl LossMap {
    pub const TOTAL: &'static str = "total";

    pub fn new(experiments: BTreeMap<String, f64>, total: f64) -> Self {
        LossMap { total, experiments }
    }

    /// Builds a map from a flat dictionary in which the aggregate is stored
    /// under `"total"`. A dictionary without it is malformed.
    pub fn from_map(mut map: BTreeMap<String, f64>) -> Result<Self> {
        let total = map.remove(Self::TOTAL).ok_or(FitError::MissingTotal)?;
        Ok(LossMap { total, experiments: map })
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Loss of one experiment; `"total"` returns the aggregate.
    pub fn get(&self, name: &str) -> Option<f64> {
        if name == Self::TOTAL {
            Some(self.total)
        } else {
            self.experiments.get(name).copied()
        }
    }

    pub fn experiments(&self) -> impl Iterator<Item = (&str, f64)> {
        self.experiments.iter().map(|(name, loss)| (name.as_str(), *loss))
    }
}

/// The chi² values of one epoch.
///
/// The weights are only kept for the epochs at which the history takes a
/// checkpoint, to save memory.
#[derive(Debug, Clone)]
pub struct FitState<W> {
    training: LossMap,
    validation: LossMap,
    training_info: TrainingInfo,
    saved_weights: Option<W>,
    best_epoch: Option<usize>,
}

impl<W> FitState<W> {
    pub fn new(training: LossMap, validation: LossMap, training_info: TrainingInfo) -> Self {
        FitState {
            training,
            validation,
            training_info,
            saved_weights: None,
            best_epoch: None,
        }
    }

    /// Stores the best weights known when this epoch was checkpointed and
    /// the epoch they belong to.
    pub fn save_history(&mut self, weights: Option<W>, best_epoch: Option<usize>) {
        self.saved_weights = weights;
        self.best_epoch = best_epoch;
    }

    pub fn training_losses(&self) -> &LossMap {
        &self.training
    }

    pub fn validation_losses(&self) -> &LossMap {
        &self.validation
    }

    pub fn training_info(&self) -> &TrainingInfo {
        &self.training_info
    }

    pub fn training_total(&self) -> f64 {
        self.training.total()
    }

    pub fn validation_total(&self) -> f64 {
        self.validation.total()
    }

    pub fn saved_weights(&self) -> Option<&W> {
        self.saved_weights.as_ref()
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

impl<W> fmt::Display for FitState<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chi2: tr={} vl={}", self.training_total(), self.validation_total())
    }
}
