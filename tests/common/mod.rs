#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use n3fit::backend::{Evaluation, FitModels, MetaModel, ModelFactory, TrainingInfo};
use n3fit::data::DatasetInfo;
use n3fit::{FitParameters, Result};

pub const EXP: &str = "EXP";
pub const POS: &str = "POS";

/// Per-epoch losses played back by [`ScriptedModel`]. Once a script runs
/// out its last value is repeated.
#[derive(Debug, Default)]
pub struct Script {
    /// Raw (not normalised) training loss of `EXP` for each step.
    pub training: Vec<f64>,
    /// Raw validation loss of `EXP` after each step.
    pub validation: Vec<f64>,
    /// Positivity loss recorded during each step.
    pub positivity: Vec<f64>,
    /// Number of `fit` calls so far.
    pub steps: usize,
    /// Live weights: `[steps]`, so every epoch has distinct weights.
    pub weights: Vec<f64>,
    pub positivity_scalings: Vec<f64>,
    pub resets: usize,
}

fn at(values: &[f64], step: usize) -> f64 {
    values.get(step).or(values.last()).copied().unwrap_or(0.0)
}

impl Script {
    pub fn new(training: Vec<f64>, validation: Vec<f64>, positivity: Vec<f64>) -> Rc<RefCell<Script>> {
        Rc::new(RefCell::new(Script {
            training,
            validation,
            positivity,
            weights: vec![0.0],
            ..Script::default()
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Role {
    Training,
    Validation,
}

/// Model sharing its weights with every other model built on the same
/// script, like the real backend models share the PDF.
#[derive(Debug, Clone)]
pub struct ScriptedModel {
    pub script: Rc<RefCell<Script>>,
    pub role: Role,
}

impl ScriptedModel {
    pub fn new(script: &Rc<RefCell<Script>>, role: Role) -> Self {
        ScriptedModel { script: Rc::clone(script), role }
    }
}

impl MetaModel for ScriptedModel {
    type Weights = Vec<f64>;

    fn fit(&mut self) -> Result<TrainingInfo> {
        let mut script = self.script.borrow_mut();
        let step = script.steps;
        script.steps += 1;
        script.weights = vec![script.steps as f64];

        let mut info = TrainingInfo::new();
        let loss = at(&script.training, step);
        info.record(EXP, loss);
        info.record(POS, at(&script.positivity, step));
        info.record_total(loss);
        Ok(info)
    }

    fn evaluate(&mut self) -> Result<Evaluation> {
        let script = self.script.borrow();
        let step = script.steps.saturating_sub(1);
        let loss = match self.role {
            Role::Training => at(&script.training, step),
            Role::Validation => at(&script.validation, step),
        };
        let mut evaluation = Evaluation { total: loss, ..Evaluation::default() };
        evaluation.losses.insert(EXP.to_string(), loss);
        Ok(evaluation)
    }

    fn weights(&self) -> Vec<f64> {
        self.script.borrow().weights.clone()
    }

    fn set_weights(&mut self, weights: Vec<f64>) -> Result<()> {
        self.script.borrow_mut().weights = weights;
        Ok(())
    }

    fn scale_positivity(&mut self, factor: f64) {
        self.script.borrow_mut().positivity_scalings.push(factor);
    }
}

/// Records of a single experiment `EXP` with `ndata` training and
/// `ndata_vl` validation points, plus the positivity set `POS`.
pub fn all_data(ndata: usize, ndata_vl: usize) -> Vec<DatasetInfo> {
    vec![
        DatasetInfo {
            name: EXP.to_string(),
            ndata,
            ndata_vl,
            count_chi2: true,
            positivity: false,
        },
        DatasetInfo::positivity(POS),
    ]
}

pub struct ScriptedFactory {
    pub script: Rc<RefCell<Script>>,
}

impl ModelFactory for ScriptedFactory {
    type Model = ScriptedModel;

    fn reset_session(&mut self) {
        let mut script = self.script.borrow_mut();
        script.resets += 1;
        script.steps = 0;
        script.weights = vec![0.0];
    }

    fn build_models(&mut self, _params: &FitParameters) -> Result<FitModels<ScriptedModel>> {
        Ok(FitModels {
            training: ScriptedModel::new(&self.script, Role::Training),
            validation: ScriptedModel::new(&self.script, Role::Validation),
            experimental: ScriptedModel::new(&self.script, Role::Validation),
        })
    }
}
