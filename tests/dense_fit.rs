use n3fit::data::{Dataset, PositivitySet};
use n3fit::{fit_replica, ActivationFunction, FitError, FitParameters, FitRuncard, FitSummary, SeedConfig, TrainerOptions};

fn runcard(epochs: usize) -> FitRuncard {
    let x_grid = vec![0.1, 0.2, 0.3, 0.4, 0.5];
    let truth: Vec<f64> = x_grid.iter().map(|x| 1.0 + x).collect();
    let dataset = |name: &str, offset: usize| {
        let fktable: Vec<Vec<f64>> = (0..6)
            .map(|i| (0..x_grid.len()).map(|k| if k == (i + offset) % 5 { 0.6 } else { 0.1 }).collect())
            .collect();
        let central_values = fktable.iter()
            .map(|row| row.iter().zip(&truth).map(|(w, f)| w * f).sum())
            .collect();
        Dataset {
            name: name.into(),
            fktable,
            central_values,
            sigma: vec![0.3; 6],
            frac: 0.5,
            check_positive: true,
        }
    };
    FitRuncard {
        parameters: FitParameters {
            epochs,
            stopping_patience: 0.5,
            learning_rate: 0.01,
            clipnorm: Some(1.0),
            nodes_per_layer: vec![5, 1],
            activation_per_layer: vec![ActivationFunction::Tanh, ActivationFunction::Identity],
            log_each: 100,
            ..FitParameters::default()
        },
        seeds: SeedConfig { nnseed: 11, trvlseed: 12, mcseed: 13, genrep: true },
        save_weights_each: Some(200),
        debug: false,
        load: None,
        x_grid: x_grid.clone(),
        datasets: vec![dataset("DIS", 0), dataset("DY", 2)],
        positivity: vec![PositivitySet {
            name: "POSPDF".into(),
            fktable: (0..5).map(|k| (0..5).map(|j| if j == k { 1.0 } else { 0.0 }).collect()).collect(),
        }],
    }
}

#[test]
fn a_replica_fit_converges() {
    let short = fit_replica(&runcard(1), 1, TrainerOptions::new()).unwrap();
    let mut result = fit_replica(&runcard(600), 1, TrainerOptions::new()).unwrap();

    assert_eq!(result.summary.status, "ok");
    assert!(result.summary.best_epoch.is_some());
    assert!(result.summary.experimental_loss.is_finite());
    assert!(result.summary.experimental_loss < short.summary.experimental_loss);

    let (_, vl, _) = result.evaluate().unwrap();
    assert!((vl - result.summary.validation_loss).abs() < 1e-12);
    assert_eq!(result.stopping.history().reloadable().count(), result.stopping.history().len() / 200);
}

#[test]
fn the_same_replica_gives_the_same_fit() {
    let first = fit_replica(&runcard(150), 3, TrainerOptions::new()).unwrap();
    let second = fit_replica(&runcard(150), 3, TrainerOptions::new()).unwrap();
    let other = fit_replica(&runcard(150), 4, TrainerOptions::new()).unwrap();

    assert_eq!(first.summary, second.summary);
    assert_eq!(first.stopping.validation().weights(), second.stopping.validation().weights());
    assert_ne!(first.summary.experimental_loss, other.summary.experimental_loss);
}

#[test]
fn outputs_can_be_written() {
    let result = fit_replica(&runcard(200), 1, TrainerOptions::new()).unwrap();
    let dir = tempfile::tempdir().unwrap();

    let summary_path = dir.path().join("summary.json");
    let summary_path = summary_path.to_str().unwrap();
    result.summary.save_json(summary_path).unwrap();
    assert_eq!(FitSummary::load_json(summary_path).unwrap(), result.summary);

    let log_path = dir.path().join("chi2exps.log");
    result.stopping.write_chi2exps(&log_path, 100).unwrap();
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("Epoch: 100\nDIS: "));
    assert!(log.contains("DY: "));
    assert!(log.contains("Total: training = "));
}

#[test]
fn replica_numbers_start_at_one() {
    assert!(matches!(
        fit_replica(&runcard(10), 0, TrainerOptions::new()),
        Err(FitError::InvalidReplica(0))
    ));
}
