use std::fmt;

use crate::backend::TrainingInfo;
use crate::error::Result;
use crate::stopping::fit_state::FitState;

/// Outcome of the positivity check on the best fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositivityStatus {
    Pass,
    Veto,
}

impl PositivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositivityStatus::Pass => "POS_PASS",
            PositivityStatus::Veto => "POS_VETO",
        }
    }
}

impl fmt::Display for PositivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether an epoch satisfies the positivity requirement by looking
/// at the positivity losses recorded during its training step.
#[derive(Debug, Clone)]
pub struct Positivity {
    threshold: f64,
    positivity_sets: Vec<String>,
}

impl Positivity {
    pub fn new(threshold: f64, positivity_sets: Vec<String>) -> Self {
        Positivity { threshold, positivity_sets }
    }

    /// Reads the last value of each positivity loss in turn and compares the
    /// one read last with the threshold: each set overwrites the previous
    /// one, so only the last listed set decides. With no positivity sets the
    /// check passes.
    pub fn evaluate(&self, training_info: &TrainingInfo) -> Result<bool> {
        let mut positivity_loss = 0.0;
        for name in &self.positivity_sets {
            positivity_loss = training_info.last(name)?;
        }
        Ok(positivity_loss <= self.threshold)
    }

    pub fn check<W>(&self, state: &FitState<W>) -> Result<bool> {
        self.evaluate(state.training_info())
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}
