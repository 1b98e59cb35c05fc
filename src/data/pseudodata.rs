use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::debug;

use crate::config::SeedConfig;
use crate::data::dataset::{Dataset, ReplicaDataset};
use crate::data::masks::tr_masks;
use crate::data::seeds::{name_seed, ReplicaSeeds};
use crate::error::{FitError, Result};
use crate::math::matrix::Matrix;

/// Upper bound on the number of draws spent looking for positive pseudodata.
pub const MAX_ATTEMPTS: usize = 1000;

/// Draws one pseudodata replica per dataset: central values shifted by
/// `sigma * N(0, 1)`. The whole replica is redrawn until every point of the
/// datasets flagged `check_positive` is non-negative.
///
/// Without an `mcseed` the central values are returned unchanged.
pub fn make_replica(datasets: &[Dataset], mcseed: Option<u64>) -> Result<Vec<Vec<f64>>> {
    let Some(mcseed) = mcseed else {
        return Ok(datasets.iter().map(|ds| ds.central_values.clone()).collect());
    };

    let seed = name_seed(datasets.iter().map(|ds| ds.name.as_str())).wrapping_add(mcseed);
    let mut rng = StdRng::seed_from_u64(seed);

    for attempt in 0..MAX_ATTEMPTS {
        let replica: Vec<Vec<f64>> = datasets
            .iter()
            .map(|ds| {
                ds.central_values.iter().zip(ds.sigma.iter())
                    .map(|(cv, s)| cv + s * Matrix::sample_standard_normal(&mut rng))
                    .collect()
            })
            .collect();

        let positive = datasets
            .iter()
            .zip(replica.iter())
            .filter(|(ds, _)| ds.check_positive)
            .all(|(_, values)| values.iter().all(|&v| v >= 0.0));
        if positive {
            return Ok(replica);
        }
        debug!(attempt, "negative pseudodata drawn, resampling");
    }
    Err(FitError::Pseudodata(MAX_ATTEMPTS))
}

/// Applies the replica seeds to the datasets: training masks from `trvlseed`
/// and pseudodata from `mcseed`.
pub fn replica_datasets(datasets: &[Dataset], seeds: &ReplicaSeeds) -> Result<Vec<ReplicaDataset>> {
    let masks = tr_masks(datasets, seeds.trvlseed);
    let pseudodata = make_replica(datasets, seeds.mcseed)?;
    Ok(datasets
        .iter()
        .zip(masks)
        .zip(pseudodata)
        .map(|((dataset, tr_mask), pseudodata)| ReplicaDataset {
            dataset: dataset.clone(),
            tr_mask,
            pseudodata,
        })
        .collect())
}

/// Pseudodata for many replicas on a pool of `n_workers` threads.
///
/// Each replica derives its own seed, so the output does not depend on the
/// number of workers or on how replicas are split between them.
pub fn generate_replicas(
    datasets: &[Dataset],
    replicas: &[u32],
    seeds: &SeedConfig,
    n_workers: usize,
) -> Result<Vec<Vec<Vec<f64>>>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_workers.max(1))
        .build()?;
    pool.install(|| {
        replicas
            .par_iter()
            .map(|&replica| {
                let replica_seeds = ReplicaSeeds::for_replica(replica, seeds)?;
                make_replica(datasets, replica_seeds.mcseed)
            })
            .collect()
    })
}
