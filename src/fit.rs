//! Fit of a single replica from a runcard.

use tracing::info;

use crate::backend::{DenseBackend, DenseModel};
use crate::config::FitRuncard;
use crate::data::dataset::{DatasetInfo, ReplicaDataset};
use crate::data::pseudodata::replica_datasets;
use crate::data::seeds::ReplicaSeeds;
use crate::error::Result;
use crate::train::{FitResult, ModelTrainer, TrainerOptions};

/// Dataset records of a replica: its datasets followed by the positivity
/// sets of the runcard.
pub fn all_data_info(datasets: &[ReplicaDataset], runcard: &FitRuncard) -> Vec<DatasetInfo> {
    datasets.iter()
        .map(ReplicaDataset::info)
        .chain(runcard.positivity.iter().map(|pos| DatasetInfo::positivity(&pos.name)))
        .collect()
}

/// Fits replica `replica` (1-based) of `runcard` with the dense backend.
///
/// The replica seeds fix the training/validation split, the pseudodata and
/// the network initialisation, so the same replica always yields the same
/// fit.
pub fn fit_replica(runcard: &FitRuncard, replica: u32, options: TrainerOptions) -> Result<FitResult<DenseModel>> {
    runcard.validate()?;
    let seeds = ReplicaSeeds::for_replica(replica, &runcard.seeds)?;
    info!(replica, nnseed = seeds.nnseed, trvlseed = seeds.trvlseed, "Preparing replica");

    let datasets = replica_datasets(&runcard.datasets, &seeds)?;
    let all_data = all_data_info(&datasets, runcard);

    let backend = DenseBackend::new(
        runcard.x_grid.clone(),
        datasets,
        runcard.positivity.clone(),
        seeds.nnseed,
    )
    .with_model_file(runcard.load.clone());

    let options = TrainerOptions {
        debug: runcard.debug || options.debug,
        save_weights_each: runcard.save_weights_each.or(options.save_weights_each),
        ..options
    };
    let mut trainer = ModelTrainer::new(backend, all_data, options);
    let mut result = trainer.hyperparametrizable(&runcard.parameters)?;

    let (tr_chi2, vl_chi2, exp_chi2) = result.evaluate()?;
    info!(
        "Best fit for replica #{}, chi2={:.3} (tr={:.3}, vl={:.3})",
        replica, exp_chi2, tr_chi2, vl_chi2
    );
    Ok(result)
}
