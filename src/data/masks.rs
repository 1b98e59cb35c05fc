use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::dataset::Dataset;
use crate::data::seeds::name_seed;

/// Training masks, one per dataset: `floor(frac * ndata)` points are `true`
/// (training), the rest validation, shuffled with a generator seeded by the
/// dataset names plus the replica's `trvlseed`.
pub fn tr_masks(datasets: &[Dataset], trvlseed: u64) -> Vec<Vec<bool>> {
    let seed = name_seed(datasets.iter().map(|ds| ds.name.as_str())).wrapping_add(trvlseed);
    let mut rng = StdRng::seed_from_u64(seed);
    datasets
        .iter()
        .map(|ds| {
            let ndata = ds.ndata();
            let trmax = ((ds.frac * ndata as f64).floor() as usize).min(ndata);
            let mut mask: Vec<bool> = (0..ndata).map(|i| i < trmax).collect();
            mask.shuffle(&mut rng);
            mask
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(name: &str, ndata: usize, frac: f64) -> Dataset {
        Dataset {
            name: name.into(),
            fktable: vec![vec![1.0]; ndata],
            central_values: vec![1.0; ndata],
            sigma: vec![0.1; ndata],
            frac,
            check_positive: false,
        }
    }

    #[test]
    fn masks_keep_the_training_fraction() {
        let masks = tr_masks(&[dataset("NMC", 10, 0.75), dataset("SLAC", 3, 1.0)], 9);
        assert_eq!(masks[0].iter().filter(|&&m| m).count(), 7);
        assert_eq!(masks[1], vec![true, true, true]);
    }

    #[test]
    fn masks_depend_on_the_seed() {
        let data = [dataset("NMC", 40, 0.5)];
        assert_eq!(tr_masks(&data, 1), tr_masks(&data, 1));
        assert_ne!(tr_masks(&data, 1), tr_masks(&data, 2));
    }
}
