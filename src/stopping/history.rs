use tracing::info;

use crate::backend::MetaModel;
use crate::error::Result;
use crate::stopping::fit_state::FitState;
use crate::stopping::validation::Validation;
use crate::stopping::{INITIAL_CHI2, TERRIBLE_CHI2};

/// Every [`FitState`] of a fit, in epoch order, plus the best epoch and the
/// weights captured when it was reached.
///
/// With `save_each` set, a checkpoint of the best weights is stored every
/// `save_each` epochs; [`FitHistory::rewind`] replays them.
#[derive(Debug)]
pub struct FitHistory<W> {
    save_each: Option<usize>,
    weights: Option<W>,
    best_epoch: Option<usize>,
    final_epoch: usize,
    history: Vec<FitState<W>>,
    terrible: bool,
    reloadable: Vec<usize>,
}

impl<W: Clone> FitHistory<W> {
    pub fn new(save_each: Option<usize>) -> Self {
        FitHistory {
            save_each,
            weights: None,
            best_epoch: None,
            final_epoch: 0,
            history: Vec::new(),
            terrible: false,
            reloadable: Vec::new(),
        }
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }

    /// Marks `epoch` as the best one, capturing the current weights of the
    /// validation model first.
    pub fn set_best_epoch<M>(&mut self, epoch: usize, validation: &Validation<M>)
    where
        M: MetaModel<Weights = W>,
    {
        self.weights = Some(validation.weights());
        self.best_epoch = Some(epoch);
    }

    pub fn best_state(&self) -> Option<&FitState<W>> {
        self.best_epoch.and_then(|epoch| self.history.get(epoch))
    }

    /// Validation chi² of the best fit: [`INITIAL_CHI2`] while there is no
    /// best fit, [`TERRIBLE_CHI2`] once the run has been marked terrible.
    pub fn best_vl(&self) -> f64 {
        if self.terrible {
            return TERRIBLE_CHI2;
        }
        self.best_state().map_or(INITIAL_CHI2, FitState::validation_total)
    }

    /// Training chi² of the best fit, with the same sentinels as
    /// [`FitHistory::best_vl`].
    pub fn best_tr(&self) -> f64 {
        if self.terrible {
            return TERRIBLE_CHI2;
        }
        self.best_state().map_or(INITIAL_CHI2, FitState::training_total)
    }

    /// Appends the state of `epoch`. On checkpoint epochs the current best
    /// weights are stored in it.
    pub fn save(&mut self, mut fitstate: FitState<W>, epoch: usize) {
        self.final_epoch = epoch;
        let checkpoint = self.save_each.is_some_and(|each| (epoch + 1) % each == 0);
        if checkpoint {
            fitstate.save_history(self.weights.clone(), self.best_epoch);
            self.reloadable.push(self.history.len());
        }
        self.history.push(fitstate);
    }

    /// Loads the best weights back into the validation model. Without best
    /// weights there is nothing to go back to and the run is terrible.
    pub fn reload<M>(&mut self, validation: &mut Validation<M>) -> Result<()>
    where
        M: MetaModel<Weights = W>,
    {
        match &self.weights {
            Some(weights) => validation.set_weights(weights.clone()),
            None => {
                self.terrible = true;
                Ok(())
            }
        }
    }

    /// Rewinds the fit to each checkpoint in turn: every step restores the
    /// checkpointed weights into `validation` and yields the checkpoint index.
    pub fn rewind<'a, M>(&'a mut self, validation: &'a mut Validation<M>) -> Rewind<'a, W, M>
    where
        M: MetaModel<Weights = W>,
    {
        Rewind { history: self, validation, next: 0 }
    }

    pub fn states(&self) -> &[FitState<W>] {
        &self.history
    }

    pub fn last(&self) -> Option<&FitState<W>> {
        self.history.last()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The checkpointed states, in epoch order.
    pub fn reloadable(&self) -> impl Iterator<Item = &FitState<W>> {
        self.reloadable.iter().map(|&i| &self.history[i])
    }

    pub fn final_epoch(&self) -> usize {
        self.final_epoch
    }

    pub fn is_terrible(&self) -> bool {
        self.terrible
    }

    pub fn weights(&self) -> Option<&W> {
        self.weights.as_ref()
    }
}

/// Iterator returned by [`FitHistory::rewind`].
pub struct Rewind<'a, W, M> {
    history: &'a mut FitHistory<W>,
    validation: &'a mut Validation<M>,
    next: usize,
}

impl<'a, W, M> Iterator for Rewind<'a, W, M>
where
    W: Clone,
    M: MetaModel<Weights = W>,
{
    type Item = Result<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.next;
        let &index = self.history.reloadable.get(i)?;
        self.next += 1;
        info!("Reloading step {}", i);

        let state = &self.history.history[index];
        self.history.weights = state.saved_weights().cloned();
        self.history.best_epoch = state.best_epoch();
        self.history.final_epoch = (i + 1) * self.history.save_each.unwrap_or(0);
        Some(self.history.reload(&mut *self.validation).map(|()| i))
    }
}
