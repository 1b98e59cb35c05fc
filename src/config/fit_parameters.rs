use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{FitError, Result};
use crate::layers::dense::Initializer;
use crate::optim::sgd::OptimizerKind;

/// Hyperparameters of one fit.
///
/// Every field has a default so a runcard only needs to list what it
/// changes. Call [`FitParameters::validate`] once before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitParameters {
    /// Maximum number of training steps.
    pub epochs: usize,
    /// Patience as a fraction of `epochs`.
    pub stopping_patience: f64,
    pub learning_rate: f64,
    pub optimizer: OptimizerKind,
    /// Optional gradient-norm clipping for the optimizer.
    pub clipnorm: Option<f64>,
    /// Nodes of each dense layer; the last layer is the PDF output.
    pub nodes_per_layer: Vec<usize>,
    pub activation_per_layer: Vec<ActivationFunction>,
    pub initializer: Initializer,
    /// Factor applied to the positivity penalties every 100 epochs.
    pub pos_multiplier: f64,
    /// Initial weight of the positivity penalties.
    pub pos_initial: f64,
    /// Largest positivity loss accepted for a best-fit candidate.
    pub threshold_positivity: f64,
    /// Optimizer sub-steps per training step; also the amount the patience
    /// counter advances per step.
    pub steps_per_epoch: usize,
    /// Train for the whole epoch budget regardless of convergence.
    pub dont_stop: bool,
    /// Cadence, in epochs, of the statistics logs and of the chi² log.
    pub log_each: usize,
}

impl Default for FitParameters {
    fn default() -> Self {
        FitParameters {
            epochs: 1000,
            stopping_patience: 0.1,
            learning_rate: 0.01,
            optimizer: OptimizerKind::Sgd,
            clipnorm: None,
            nodes_per_layer: vec![10, 8, 1],
            activation_per_layer: vec![
                ActivationFunction::Tanh,
                ActivationFunction::Tanh,
                ActivationFunction::Identity,
            ],
            initializer: Initializer::GlorotNormal,
            pos_multiplier: 1.05,
            pos_initial: 1.0,
            threshold_positivity: 1e-6,
            steps_per_epoch: 1,
            dont_stop: false,
            log_each: 100,
        }
    }
}

impl FitParameters {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(FitError::InvalidConfig(msg));
        if self.epochs == 0 {
            return invalid("epochs must be at least 1".into());
        }
        if !(self.stopping_patience > 0.0) || !self.stopping_patience.is_finite() {
            return invalid(format!("stopping_patience must be positive, got {}", self.stopping_patience));
        }
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if let Some(clip) = self.clipnorm {
            if !(clip > 0.0) {
                return invalid(format!("clipnorm must be positive, got {clip}"));
            }
        }
        if self.nodes_per_layer.is_empty() || self.nodes_per_layer.contains(&0) {
            return invalid("nodes_per_layer must list non-empty layers".into());
        }
        if self.nodes_per_layer.len() != self.activation_per_layer.len() {
            return invalid(format!(
                "{} layers but {} activations",
                self.nodes_per_layer.len(),
                self.activation_per_layer.len()
            ));
        }
        if self.nodes_per_layer.last() != Some(&1) {
            return invalid("the output layer must have a single node".into());
        }
        if !(self.pos_multiplier > 0.0) || !(self.pos_initial >= 0.0) {
            return invalid("positivity multipliers must be positive".into());
        }
        if !(self.threshold_positivity >= 0.0) {
            return invalid("threshold_positivity must be non-negative".into());
        }
        if self.steps_per_epoch == 0 || self.log_each == 0 {
            return invalid("steps_per_epoch and log_each must be at least 1".into());
        }
        Ok(())
    }

    /// Patience in epochs: `floor(epochs * stopping_patience)`.
    pub fn stopping_epochs(&self) -> usize {
        (self.epochs as f64 * self.stopping_patience).floor() as usize
    }
}
