//! Boundary between the stopping core and the model backend.
//!
//! The core only ever talks to a backend through [`MetaModel`]: run one
//! training step, evaluate without updating, and snapshot or restore the
//! parameters. [`ModelFactory`] builds the three models used by a fit and
//! owns the backend session lifecycle.

pub mod dense;

use std::collections::BTreeMap;
use std::fmt;

use crate::config::FitParameters;
use crate::error::{FitError, Result};

pub use dense::{DenseBackend, DenseModel, Observable};

/// Output of one training step: every sub-loss name mapped to the values it
/// took during the step (one value per sub-step).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingInfo {
    losses: BTreeMap<String, Vec<f64>>,
    total: Vec<f64>,
}

impl TrainingInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one value to the history of `name`.
    pub fn record(&mut self, name: &str, value: f64) {
        self.losses.entry(name.to_string()).or_default().push(value);
    }

    /// Appends one value to the history of the aggregate loss.
    pub fn record_total(&mut self, value: f64) {
        self.total.push(value);
    }

    pub fn history(&self, name: &str) -> Result<&[f64]> {
        self.losses
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| FitError::MissingLoss(name.to_string()))
    }

    /// Mean of the values recorded for `name` during the step.
    pub fn mean(&self, name: &str) -> Result<f64> {
        let values = self.history(name)?;
        if values.is_empty() {
            return Err(FitError::MissingLoss(name.to_string()));
        }
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Last value recorded for `name`.
    pub fn last(&self, name: &str) -> Result<f64> {
        self.history(name)?
            .last()
            .copied()
            .ok_or_else(|| FitError::MissingLoss(name.to_string()))
    }

    pub fn total(&self) -> &[f64] {
        &self.total
    }
}

/// Losses of an inference pass, keyed by observable name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub total: f64,
    pub losses: BTreeMap<String, f64>,
}

impl Evaluation {
    pub fn get(&self, name: &str) -> Result<f64> {
        self.losses
            .get(name)
            .copied()
            .ok_or_else(|| FitError::MissingLoss(name.to_string()))
    }
}

/// A compiled model as seen by the trainer and the stopping logic.
pub trait MetaModel {
    /// Parameter snapshot. Must be a deep copy: restoring it after further
    /// training has to bring back exactly the captured state.
    type Weights: Clone + fmt::Debug;

    /// Runs one optimizer step over the training data.
    fn fit(&mut self) -> Result<TrainingInfo>;

    /// Computes the losses without updating any parameter.
    fn evaluate(&mut self) -> Result<Evaluation>;

    fn weights(&self) -> Self::Weights;

    fn set_weights(&mut self, weights: Self::Weights) -> Result<()>;

    /// Multiplies the weight of every positivity penalty by `factor`.
    fn scale_positivity(&mut self, _factor: f64) {}
}

/// The models of one fit. Training and validation (and experimental) share
/// their parameters: restoring weights through any of them restores all.
pub struct FitModels<M> {
    pub training: M,
    /// Restricted to the validation split, or to the training data when the
    /// fit has no validation points.
    pub validation: M,
    /// Full data without replica fluctuations, for reporting only.
    pub experimental: M,
}

pub trait ModelFactory {
    type Model: MetaModel;

    /// Discards any state left by a previous model graph and reseeds the
    /// backend. Called right before [`ModelFactory::build_models`].
    fn reset_session(&mut self);

    fn build_models(&mut self, params: &FitParameters) -> Result<FitModels<Self::Model>>;
}
