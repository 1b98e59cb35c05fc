use std::collections::BTreeMap;

use crate::backend::MetaModel;
use crate::error::{FitError, Result};
use crate::stopping::fit_state::LossMap;

/// Cross-validation loss: the chi² of the points left out of the training.
///
/// Wraps the model compiled on the validation split (or on the training data
/// when there is no validation split).
pub struct Validation<M> {
    model: M,
    ndata: Vec<(String, usize)>,
    total_points: usize,
}

impl<M: MetaModel> Validation<M> {
    pub fn new(model: M, ndata: Vec<(String, usize)>) -> Result<Self> {
        let total_points = ndata.iter().map(|(_, n)| n).sum();
        if total_points == 0 {
            return Err(FitError::NoChi2Data);
        }
        Ok(Validation { model, ndata, total_points })
    }

    /// Evaluates the model and returns the total validation loss together
    /// with the loss of each experiment, both normalised by point count.
    pub fn loss(&mut self) -> Result<(f64, LossMap)> {
        let evaluation = self.model.evaluate()?;
        let mut per_experiment = BTreeMap::new();
        let mut total_loss = 0.0;
        for (name, npoints) in &self.ndata {
            let loss = evaluation.get(name)?;
            per_experiment.insert(name.clone(), loss / *npoints as f64);
            total_loss += loss;
        }
        let total = total_loss / self.total_points as f64;
        Ok((total, LossMap::new(per_experiment, total)))
    }

    pub fn ndata(&self) -> &[(String, usize)] {
        &self.ndata
    }

    pub fn weights(&self) -> M::Weights {
        self.model.weights()
    }

    pub fn set_weights(&mut self, weights: M::Weights) -> Result<()> {
        self.model.set_weights(weights)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }
}
