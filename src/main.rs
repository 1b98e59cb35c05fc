// Fits one replica and writes its summary, chi2 log and weights to
// OUTPUT_DIR (default: the current directory).
//
//   n3fit [RUNCARD.json] [REPLICA] [OUTPUT_DIR]
//
// Without a runcard a small synthetic fit is run. Log verbosity follows
// RUST_LOG (default `n3fit=info`).
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use n3fit::data::Dataset;
use n3fit::data::PositivitySet;
use n3fit::{fit_replica, FitParameters, FitRuncard, Result, SeedConfig, TrainerOptions};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("n3fit=info")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let runcard = match args.next() {
        Some(path) => FitRuncard::load_json(&path)?,
        None => {
            info!("No runcard given, fitting a synthetic dataset");
            synthetic_runcard()
        }
    };
    let replica = match args.next() {
        Some(r) => r.parse().map_err(|_| n3fit::FitError::InvalidConfig(format!("bad replica number {r}")))?,
        None => 1,
    };
    let output = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));

    let result = fit_replica(&runcard, replica, TrainerOptions::new())?;
    info!(
        status = result.summary.status.as_str(),
        positivity = result.summary.positivity_status.as_str(),
        "experimental chi2 = {:.4}",
        result.summary.experimental_loss
    );

    std::fs::create_dir_all(&output)?;
    let file = |name: &str| -> String {
        output.join(format!("replica_{replica}_{name}")).to_string_lossy().into_owned()
    };
    result.summary.save_json(&file("summary.json"))?;
    result.stopping.write_chi2exps(Path::new(&file("chi2exps.log")), runcard.parameters.log_each)?;
    result.training.save_weights(&file("weights.json"))?;
    info!("Results written to {}", output.display());
    Ok(())
}

/// A straight line `f(x) = 1 + x` seen through two observables, plus a
/// positivity constraint on the PDF itself.
fn synthetic_runcard() -> FitRuncard {
    let x_grid: Vec<f64> = (1..=10).map(|i| i as f64 / 10.0).collect();
    let truth: Vec<f64> = x_grid.iter().map(|x| 1.0 + x).collect();

    let dataset = |name: &str, shift: usize| {
        let fktable: Vec<Vec<f64>> = (0..8)
            .map(|i| {
                x_grid.iter().enumerate()
                    .map(|(k, _)| if k == (i + shift) % x_grid.len() { 0.8 } else { 0.2 / 9.0 })
                    .collect()
            })
            .collect();
        let central_values = fktable.iter()
            .map(|row| row.iter().zip(&truth).map(|(w, f)| w * f).sum())
            .collect();
        Dataset {
            name: name.to_string(),
            fktable,
            central_values,
            sigma: vec![0.05; 8],
            frac: 0.75,
            check_positive: true,
        }
    };

    FitRuncard {
        parameters: FitParameters {
            epochs: 2000,
            stopping_patience: 0.2,
            nodes_per_layer: vec![8, 1],
            activation_per_layer: vec![
                n3fit::ActivationFunction::Tanh,
                n3fit::ActivationFunction::Identity,
            ],
            learning_rate: 1e-3,
            ..FitParameters::default()
        },
        seeds: SeedConfig::default(),
        save_weights_each: Some(500),
        debug: false,
        load: None,
        x_grid: x_grid.clone(),
        datasets: vec![dataset("SYNTH_A", 0), dataset("SYNTH_B", 3)],
        positivity: vec![PositivitySet {
            name: "POS_PDF".to_string(),
            fktable: (0..x_grid.len())
                .map(|k| (0..x_grid.len()).map(|j| if j == k { 1.0 } else { 0.0 }).collect())
                .collect(),
        }],
    }
}
