//! Reference backend: a small dense network fitted through linear
//! observables.
//!
//! The network parametrises `f(x)`. Every observable is a set of FK-table
//! rows; its prediction for point `i` is `Σ_k fk[i][k] · f(x_k)` over the
//! shared x-grid. All models built by one [`DenseBackend`] share the same
//! network, so a weight update through the training model is seen by the
//! validation and experimental models.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::backend::{Evaluation, FitModels, MetaModel, ModelFactory, TrainingInfo};
use crate::config::FitParameters;
use crate::data::dataset::{PositivitySet, ReplicaDataset};
use crate::error::{FitError, Result};
use crate::loss::{Chi2Loss, PositivityLoss};
use crate::network::network::{Network, NetworkWeights};
use crate::optim::sgd::Sgd;

#[derive(Debug, Clone)]
enum ObservableKind {
    Chi2 { data: Vec<f64>, sigma: Vec<f64> },
    Positivity { multiplier: f64 },
}

#[derive(Debug, Clone)]
pub struct Observable {
    pub name: String,
    fktable: Vec<Vec<f64>>,
    kind: ObservableKind,
}

impl Observable {
    pub fn chi2(name: &str, fktable: Vec<Vec<f64>>, data: Vec<f64>, sigma: Vec<f64>) -> Result<Self> {
        if fktable.len() != data.len() || data.len() != sigma.len() {
            return Err(FitError::Shape(format!(
                "observable {name}: {} fktable rows, {} data, {} uncertainties",
                fktable.len(),
                data.len(),
                sigma.len()
            )));
        }
        Ok(Observable {
            name: name.to_string(),
            fktable,
            kind: ObservableKind::Chi2 { data, sigma },
        })
    }

    pub fn positivity(name: &str, fktable: Vec<Vec<f64>>, multiplier: f64) -> Self {
        Observable {
            name: name.to_string(),
            fktable,
            kind: ObservableKind::Positivity { multiplier },
        }
    }

    pub fn ndata(&self) -> usize {
        self.fktable.len()
    }

    fn predict(&self, pdf: &[f64]) -> Vec<f64> {
        self.fktable.iter()
            .map(|row| row.iter().zip(pdf.iter()).map(|(w, f)| w * f).sum())
            .collect()
    }

    fn loss(&self, predictions: &[f64]) -> f64 {
        match &self.kind {
            ObservableKind::Chi2 { data, sigma } => Chi2Loss::loss(predictions, data, sigma),
            ObservableKind::Positivity { multiplier } => PositivityLoss::loss(predictions, *multiplier),
        }
    }

    /// Adds ∂loss/∂f(x_k) into `pdf_grad`.
    fn accumulate_pdf_gradient(&self, predictions: &[f64], pdf_grad: &mut [f64]) {
        let point_grad = match &self.kind {
            ObservableKind::Chi2 { data, sigma } => Chi2Loss::derivative(predictions, data, sigma),
            ObservableKind::Positivity { multiplier } => PositivityLoss::derivative(predictions, *multiplier),
        };
        for (row, g) in self.fktable.iter().zip(point_grad) {
            if g == 0.0 {
                continue;
            }
            for (acc, w) in pdf_grad.iter_mut().zip(row.iter()) {
                *acc += g * w;
            }
        }
    }
}

struct SharedPdf {
    network: Network,
    x_grid: Vec<f64>,
}

impl SharedPdf {
    fn pdf_on_grid(&mut self) -> Vec<f64> {
        let SharedPdf { network, x_grid } = self;
        x_grid.iter()
            .map(|&x| network.forward(vec![x])[0])
            .collect()
    }
}

/// One view over the shared network: a list of observables and, for the
/// training model, an optimizer.
pub struct DenseModel {
    pdf: Rc<RefCell<SharedPdf>>,
    observables: Vec<Observable>,
    optimizer: Option<Sgd>,
    steps_per_fit: usize,
}

impl DenseModel {
    pub fn observables(&self) -> &[Observable] {
        &self.observables
    }

    /// Values of the PDF on the x-grid with the current weights.
    pub fn pdf_on_grid(&self) -> Vec<f64> {
        self.pdf.borrow_mut().pdf_on_grid()
    }

    pub fn save_weights(&self, path: &str) -> Result<()> {
        self.pdf.borrow().network.save_json(path)
    }

    fn losses(&self, pdf: &[f64]) -> Vec<(Vec<f64>, f64)> {
        self.observables.iter()
            .map(|obs| {
                let predictions = obs.predict(pdf);
                let loss = obs.loss(&predictions);
                (predictions, loss)
            })
            .collect()
    }
}

impl MetaModel for DenseModel {
    type Weights = NetworkWeights;

    fn fit(&mut self) -> Result<TrainingInfo> {
        let optimizer = self.optimizer.as_ref().ok_or_else(|| {
            FitError::InvalidConfig("model was compiled without an optimizer".into())
        })?;
        let mut info = TrainingInfo::new();
        let mut shared = self.pdf.borrow_mut();

        for _ in 0..self.steps_per_fit {
            let pdf = shared.pdf_on_grid();
            let evaluated = self.losses(&pdf);

            let mut total = 0.0;
            let mut pdf_grad = vec![0.0; pdf.len()];
            for (obs, (predictions, loss)) in self.observables.iter().zip(evaluated.iter()) {
                info.record(&obs.name, *loss);
                total += loss;
                obs.accumulate_pdf_gradient(predictions, &mut pdf_grad);
            }
            info.record_total(total);

            let SharedPdf { network, x_grid } = &mut *shared;
            let mut acc = network.zero_gradients();
            for (&x, &g) in x_grid.iter().zip(pdf_grad.iter()) {
                // refresh the layer caches for this grid point before backprop
                network.forward(vec![x]);
                network.accumulate_gradients(&[x], vec![g], &mut acc);
            }
            optimizer.step(network, &acc);
        }
        Ok(info)
    }

    fn evaluate(&mut self) -> Result<Evaluation> {
        let pdf = self.pdf.borrow_mut().pdf_on_grid();
        let mut evaluation = Evaluation::default();
        for (obs, (_, loss)) in self.observables.iter().zip(self.losses(&pdf)) {
            evaluation.total += loss;
            evaluation.losses.insert(obs.name.clone(), loss);
        }
        Ok(evaluation)
    }

    fn weights(&self) -> NetworkWeights {
        self.pdf.borrow().network.weights()
    }

    fn set_weights(&mut self, weights: NetworkWeights) -> Result<()> {
        self.pdf.borrow_mut().network.set_weights(weights)
    }

    fn scale_positivity(&mut self, factor: f64) {
        for obs in &mut self.observables {
            if let ObservableKind::Positivity { multiplier } = &mut obs.kind {
                *multiplier *= factor;
            }
        }
    }
}

/// Builds the models of a replica fit from its prepared datasets.
pub struct DenseBackend {
    x_grid: Vec<f64>,
    datasets: Vec<ReplicaDataset>,
    positivity: Vec<PositivitySet>,
    nnseed: u64,
    rng: StdRng,
    model_file: Option<String>,
}

impl DenseBackend {
    pub fn new(
        x_grid: Vec<f64>,
        datasets: Vec<ReplicaDataset>,
        positivity: Vec<PositivitySet>,
        nnseed: u64,
    ) -> Self {
        DenseBackend {
            x_grid,
            datasets,
            positivity,
            nnseed,
            rng: StdRng::seed_from_u64(nnseed),
            model_file: None,
        }
    }

    /// Initial weights are read from `path` instead of drawn at random.
    pub fn with_model_file(mut self, path: Option<String>) -> Self {
        self.model_file = path;
        self
    }

    fn training_observables(&self) -> Result<Vec<Observable>> {
        self.datasets.iter()
            .filter(|ds| ds.ndata_tr() > 0)
            .map(|ds| split_observable(ds, true))
            .collect()
    }
}

/// The observable over the training (`training == true`) or validation
/// points of a replica dataset, fitted to its pseudodata.
fn split_observable(ds: &ReplicaDataset, training: bool) -> Result<Observable> {
    let mut fktable = Vec::new();
    let mut data = Vec::new();
    let mut sigma = Vec::new();
    for (i, &in_training) in ds.tr_mask.iter().enumerate() {
        if in_training == training {
            fktable.push(ds.dataset.fktable[i].clone());
            data.push(ds.pseudodata[i]);
            sigma.push(ds.dataset.sigma[i]);
        }
    }
    Observable::chi2(&ds.dataset.name, fktable, data, sigma)
}

impl ModelFactory for DenseBackend {
    type Model = DenseModel;

    fn reset_session(&mut self) {
        debug!(nnseed = self.nnseed, "resetting backend session");
        self.rng = StdRng::seed_from_u64(self.nnseed);
    }

    fn build_models(&mut self, params: &FitParameters) -> Result<FitModels<DenseModel>> {
        info!("Generating the Model");
        let mut network = Network::new(
            1,
            &params.nodes_per_layer,
            &params.activation_per_layer,
            params.initializer,
            &mut self.rng,
        );
        if network.output_size() != 1 {
            return Err(FitError::Shape(format!(
                "the PDF network must have one output, got {}",
                network.output_size()
            )));
        }
        if let Some(path) = &self.model_file {
            info!(path = path.as_str(), "loading initial weights");
            network.load_json(path)?;
        }
        let pdf = Rc::new(RefCell::new(SharedPdf { network, x_grid: self.x_grid.clone() }));

        let chi2_training = self.training_observables()?;
        let mut training = chi2_training.clone();
        for pos in &self.positivity {
            debug!(name = pos.name.as_str(), "generating positivity penalty");
            training.push(Observable::positivity(&pos.name, pos.fktable.clone(), params.pos_initial));
        }

        let mut validation: Vec<Observable> = self.datasets.iter()
            .filter(|ds| ds.ndata_vl() > 0)
            .map(|ds| split_observable(ds, false))
            .collect::<Result<_>>()?;
        if validation.is_empty() {
            // without validation points the stopping runs on the training chi²
            validation = chi2_training;
        }

        let experimental = self.datasets.iter()
            .map(|ds| Observable::chi2(
                &ds.dataset.name,
                ds.dataset.fktable.clone(),
                ds.dataset.central_values.clone(),
                ds.dataset.sigma.clone(),
            ))
            .collect::<Result<Vec<_>>>()?;

        let optimizer = params.optimizer.build(params.learning_rate, params.clipnorm);

        let view = |observables: Vec<Observable>, optimizer: Option<Sgd>| DenseModel {
            pdf: Rc::clone(&pdf),
            observables,
            optimizer,
            steps_per_fit: params.steps_per_epoch,
        };
        Ok(FitModels {
            training: view(training, Some(optimizer)),
            validation: view(validation, None),
            experimental: view(experimental, None),
        })
    }
}
