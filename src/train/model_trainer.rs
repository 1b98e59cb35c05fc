use tracing::info;

use crate::backend::{FitModels, MetaModel, ModelFactory};
use crate::config::FitParameters;
use crate::data::dataset::DatasetInfo;
use crate::error::{FitError, Result};
use crate::stopping::{PositivityStatus, Stopping, StoppingConfig};
use crate::train::fit_result::{FitResult, FitSummary};
use crate::train::loop_fn::train_and_fit;
use crate::train::trainer_options::TrainerOptions;

/// Builds the models of a fit through a [`ModelFactory`], trains them under
/// a [`Stopping`] and collects the outcome.
///
/// One trainer can run several fits with different parameters; every call
/// to [`ModelTrainer::hyperparametrizable`] starts from a fresh session
/// unless `debug` is set.
pub struct ModelTrainer<F: ModelFactory> {
    factory: F,
    all_data: Vec<DatasetInfo>,
    options: TrainerOptions,
}

impl<F: ModelFactory> ModelTrainer<F> {
    pub fn new(factory: F, all_data: Vec<DatasetInfo>, options: TrainerOptions) -> Self {
        ModelTrainer { factory, all_data, options }
    }

    pub fn options(&self) -> &TrainerOptions {
        &self.options
    }

    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }

    /// Number of points of every dataset entering the chi², training and
    /// validation together.
    pub fn experimental_ndata(&self) -> usize {
        self.all_data.iter()
            .filter(|info| info.count_chi2)
            .map(|info| info.ndata + info.ndata_vl)
            .sum()
    }

    /// Generates the models for `params`, fits them and returns the result
    /// with the best weights loaded.
    ///
    /// A fit that diverges or never passes positivity is not an error: it
    /// comes back with `failed_status` and, for a terrible run, the sentinel
    /// chi² as training and validation loss.
    pub fn hyperparametrizable(&mut self, params: &FitParameters) -> Result<FitResult<F::Model>> {
        params.validate()?;
        let experimental_ndata = self.experimental_ndata();
        if experimental_ndata == 0 {
            return Err(FitError::NoChi2Data);
        }

        if !self.options.debug {
            self.factory.reset_session();
        }

        let FitModels { mut training, validation, mut experimental } = self.factory.build_models(params)?;

        let config = StoppingConfig {
            threshold_positivity: params.threshold_positivity,
            total_epochs: params.epochs,
            stopping_patience: params.stopping_epochs(),
            dont_stop: params.dont_stop,
            save_each: self.options.save_weights_each,
            count: params.steps_per_epoch,
        };
        let mut stopping = Stopping::new(validation, &self.all_data, config)?;

        info!("Start of the training");
        let passes = train_and_fit(
            &mut training,
            &mut stopping,
            params.epochs,
            params.pos_multiplier,
            params.log_each,
            self.options.progress_tx.as_ref(),
        )?;
        stopping.make_stop()?;

        let positivity = stopping.positivity_pass()?;
        let passed = passes && positivity == PositivityStatus::Pass;
        let status = if passed { &self.options.pass_status } else { &self.options.failed_status };

        let experimental_loss = evaluate_experimental(&mut experimental, experimental_ndata)?;
        let summary = FitSummary {
            status: status.clone(),
            positivity_status: positivity.to_string(),
            loss: experimental_loss,
            training_loss: stopping.tr_loss(),
            validation_loss: stopping.vl_loss(),
            experimental_loss,
            best_epoch: stopping.e_best_chi2(),
            stop_epoch: stopping.epoch_of_the_stop(),
            terrible: stopping.history().is_terrible(),
        };
        info!(
            status = summary.status.as_str(),
            stop_epoch = summary.stop_epoch,
            "Stopped at epoch={}",
            summary.stop_epoch
        );

        Ok(FitResult {
            passed,
            positivity,
            summary,
            stopping,
            training,
            experimental,
            experimental_ndata,
        })
    }
}

fn evaluate_experimental<M: MetaModel>(model: &mut M, ndata: usize) -> Result<f64> {
    Ok(model.evaluate()?.total / ndata as f64)
}
