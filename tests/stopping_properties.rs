mod common;

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use n3fit::backend::MetaModel;
use n3fit::stopping::{PositivityStatus, Stopping, StoppingConfig, INITIAL_CHI2, TERRIBLE_CHI2};
use n3fit::FitError;

use common::{all_data, Role, Script, ScriptedModel, EXP};

const NDATA: usize = 10;
const NDATA_VL: usize = 5;

struct Fit {
    script: Rc<RefCell<Script>>,
    training: ScriptedModel,
    stopping: Stopping<ScriptedModel>,
}

impl Fit {
    fn new(script: Rc<RefCell<Script>>, config: StoppingConfig) -> Fit {
        let validation = ScriptedModel::new(&script, Role::Validation);
        let stopping = Stopping::new(validation, &all_data(NDATA, NDATA_VL), config).unwrap();
        Fit { training: ScriptedModel::new(&script, Role::Training), script, stopping }
    }

    fn epoch(&mut self, epoch: usize) -> bool {
        let info = self.training.fit().unwrap();
        self.stopping.monitor_chi2(&info, epoch, false).unwrap()
    }

    fn live_weights(&self) -> Vec<f64> {
        self.script.borrow().weights.clone()
    }
}

fn config(patience: usize) -> StoppingConfig {
    StoppingConfig { stopping_patience: patience, ..StoppingConfig::default() }
}

#[test]
fn best_epoch_follows_a_decreasing_validation_loss() {
    let vl = vec![50.0, 40.0, 30.0, 20.0, 10.0];
    let mut fit = Fit::new(Script::new(vec![100.0; 5], vl.clone(), vec![0.0]), config(10));

    for (epoch, raw) in vl.iter().enumerate() {
        assert!(fit.epoch(epoch));
        assert_eq!(fit.stopping.e_best_chi2(), Some(epoch));
        assert_relative_eq!(fit.stopping.vl_loss(), raw / NDATA_VL as f64);
        assert_relative_eq!(fit.stopping.tr_loss(), 100.0 / NDATA as f64);
        assert_eq!(fit.stopping.stopping_degree(), 1);
    }
    assert!(!fit.stopping.stop_here());
    assert_eq!(fit.stopping.history().len(), 5);
}

#[test]
fn patience_runs_out_after_patience_non_improving_epochs() {
    let script = Script::new(vec![1.0], vec![10.0, 20.0], vec![0.0]);
    let mut fit = Fit::new(script, config(3));

    fit.epoch(0);
    assert_eq!(fit.stopping.e_best_chi2(), Some(0));
    let best_weights = fit.live_weights();

    fit.epoch(1);
    fit.epoch(2);
    assert!(!fit.stopping.stop_here());
    assert_eq!(fit.stopping.stopping_degree(), 3);

    fit.epoch(3);
    assert!(fit.stopping.stop_here());
    assert_eq!(fit.stopping.epoch_of_the_stop(), 4);
    // the best weights are back in the live model
    assert_eq!(fit.live_weights(), best_weights);
    assert_eq!(fit.stopping.validation().weights(), best_weights);
}

#[test]
fn positivity_failures_count_towards_the_patience() {
    let script = Script::new(vec![1.0], vec![10.0, 9.0, 8.0, 7.0], vec![0.0, 1.0]);
    let mut fit = Fit::new(script, config(3));
    for epoch in 0..4 {
        fit.epoch(epoch);
    }
    assert!(fit.stopping.stop_here());
    assert_eq!(fit.stopping.e_best_chi2(), Some(0));
    assert_eq!(fit.stopping.positivity_pass().unwrap(), PositivityStatus::Pass);
}

#[test]
fn counter_increment_shortens_the_patience() {
    let script = Script::new(vec![1.0], vec![10.0, 20.0], vec![0.0]);
    let mut fit = Fit::new(script, StoppingConfig { count: 2, ..config(3) });
    fit.epoch(0);
    assert_eq!(fit.stopping.stopping_degree(), 1);
    fit.epoch(1);
    assert!(!fit.stopping.stop_here());
    fit.epoch(2);
    assert!(fit.stopping.stop_here());
}

#[test]
fn nan_stops_immediately_and_reloads() {
    let script = Script::new(vec![10.0, f64::NAN], vec![10.0, 5.0], vec![0.0]);
    let mut fit = Fit::new(script, config(1000));

    assert!(fit.epoch(0));
    let best_weights = fit.live_weights();
    assert!(!fit.epoch(1));

    assert!(fit.stopping.stop_here());
    assert_eq!(fit.stopping.history().len(), 1);
    assert_eq!(fit.live_weights(), best_weights);
    assert!(!fit.stopping.history().is_terrible());
}

#[test]
fn nan_on_the_first_epoch_is_terrible() {
    let script = Script::new(vec![f64::NAN], vec![1.0], vec![0.0]);
    let mut fit = Fit::new(script, config(1000));
    assert!(!fit.epoch(0));
    assert!(fit.stopping.history().is_terrible());
    assert_eq!(fit.stopping.vl_loss(), TERRIBLE_CHI2);
}

#[test]
fn never_passing_positivity_is_terrible() {
    let script = Script::new(vec![1.0], vec![10.0, 9.0, 8.0, 7.0], vec![1.0]);
    let mut fit = Fit::new(script, config(1000));
    for epoch in 0..4 {
        assert!(fit.epoch(epoch));
    }
    assert_eq!(fit.stopping.e_best_chi2(), None);
    assert_eq!(fit.stopping.vl_loss(), INITIAL_CHI2);
    assert_eq!(fit.stopping.tr_loss(), INITIAL_CHI2);

    fit.stopping.make_stop().unwrap();
    assert!(fit.stopping.history().is_terrible());
    assert_eq!(fit.stopping.vl_loss(), TERRIBLE_CHI2);
    assert_eq!(fit.stopping.tr_loss(), TERRIBLE_CHI2);
    assert_eq!(fit.stopping.positivity_pass().unwrap(), PositivityStatus::Veto);
    // the live weights were left where training ended
    assert_eq!(fit.live_weights(), vec![4.0]);
}

#[test]
fn patience_only_counts_after_the_first_best_fit() {
    let vl = vec![10.0, 9.0, 8.0, 7.0, 6.0];
    let script = Script::new(vec![1.0], vl, vec![1.0, 1.0, 1.0, 1.0, 0.0]);
    let mut fit = Fit::new(script, config(3));

    for epoch in 0..4 {
        assert!(fit.epoch(epoch));
        assert_eq!(fit.stopping.stopping_degree(), 0);
        assert!(!fit.stopping.stop_here());
    }
    assert_eq!(fit.stopping.e_best_chi2(), None);

    fit.epoch(4);
    assert_eq!(fit.stopping.e_best_chi2(), Some(4));
    assert_eq!(fit.stopping.stopping_degree(), 1);
    assert!(!fit.stopping.history().is_terrible());
}

#[test]
fn terrible_stays_set_after_a_later_restore() {
    let n = 3;
    let vl: Vec<f64> = (0..2 * n).map(|i| 60.0 - 10.0 * i as f64).collect();
    let script = Script::new(vec![1.0], vl, vec![1.0, 1.0, 1.0, 0.0]);
    let mut fit = Fit::new(script, StoppingConfig { save_each: Some(n), ..config(1000) });
    for epoch in 0..2 * n {
        fit.epoch(epoch);
    }

    let checkpoints: Vec<_> = fit.stopping.history().reloadable().collect();
    assert_eq!(checkpoints[0].saved_weights(), None);
    assert_eq!(checkpoints[1].saved_weights(), Some(&vec![5.0]));

    let script = Rc::clone(&fit.script);
    let steps: Vec<_> = fit.stopping.rewind().collect();
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|step| step.is_ok()));

    // the second checkpoint was restored, but the first one had no weights
    assert_eq!(script.borrow().weights, vec![5.0]);
    assert!(fit.stopping.history().is_terrible());
    assert_eq!(fit.stopping.vl_loss(), TERRIBLE_CHI2);
    assert_eq!(fit.stopping.tr_loss(), TERRIBLE_CHI2);
}

#[test]
fn checkpoints_store_the_best_weights_known_at_that_epoch() {
    let n = 3;
    let vl: Vec<f64> = (0..2 * n).map(|i| 60.0 - 10.0 * i as f64).collect();
    let script = Script::new(vec![1.0], vl, vec![0.0]);
    let mut fit = Fit::new(script, StoppingConfig { save_each: Some(n), ..config(1000) });

    let mut captured = Vec::new();
    for epoch in 0..2 * n {
        let info = fit.training.fit().unwrap();
        if (epoch + 1) % n == 0 {
            captured.push(fit.stopping.history().weights().cloned());
        }
        fit.stopping.monitor_chi2(&info, epoch, false).unwrap();
    }

    let checkpoints: Vec<_> = fit.stopping.history().reloadable().collect();
    assert_eq!(checkpoints.len(), 2);
    assert_eq!(checkpoints[0].saved_weights().cloned(), captured[0]);
    assert_eq!(checkpoints[0].saved_weights(), Some(&vec![2.0]));
    assert_eq!(checkpoints[0].best_epoch(), Some(1));
    assert_eq!(checkpoints[1].best_epoch(), Some(4));

    let script = Rc::clone(&fit.script);
    let mut replayed = 0;
    for (k, step) in fit.stopping.rewind().enumerate() {
        assert_eq!(step.unwrap(), k);
        assert_eq!(Some(script.borrow().weights.clone()), captured[k]);
        replayed += 1;
    }
    assert_eq!(replayed, 2);
    assert_eq!(fit.stopping.history().final_epoch(), 2 * n);
    assert_eq!(fit.stopping.e_best_chi2(), Some(4));
}

#[test]
fn dont_stop_hides_the_stop_signal() {
    let script = Script::new(vec![1.0, f64::NAN], vec![1.0], vec![0.0]);
    let mut fit = Fit::new(script, StoppingConfig { dont_stop: true, ..config(1000) });
    fit.epoch(0);
    assert!(!fit.epoch(1));
    assert!(fit.stopping.stop_now());
    assert!(!fit.stopping.stop_here());

    let script = Script::new(vec![1.0], vec![1.0, 2.0], vec![0.0]);
    let mut fit = Fit::new(script, StoppingConfig { dont_stop: true, ..config(1) });
    for epoch in 0..5 {
        fit.epoch(epoch);
    }
    assert!(fit.stopping.stop_now());
    assert!(!fit.stopping.stop_here());
}

#[test]
fn without_validation_points_validation_is_the_training_loss() {
    let script = Script::new(vec![30.0, 20.0, 25.0], vec![999.0], vec![0.0]);
    let mut training = ScriptedModel::new(&script, Role::Training);
    let validation = ScriptedModel::new(&script, Role::Training);
    let mut stopping = Stopping::new(validation, &all_data(NDATA, 0), config(10)).unwrap();

    assert_eq!(stopping.validation().ndata(), &[(EXP.to_string(), NDATA)]);
    for epoch in 0..3 {
        let info = training.fit().unwrap();
        stopping.monitor_chi2(&info, epoch, false).unwrap();
        let state = stopping.history().last().unwrap();
        assert_eq!(state.validation_total(), state.training_total());
    }
    let tr = stopping.evaluate_training(&mut training).unwrap();
    let (vl, _) = stopping.validation_mut().loss().unwrap();
    assert_eq!(tr, vl);
    assert_eq!(stopping.e_best_chi2(), Some(1));
}

#[test]
fn chi2_log_has_one_block_per_interval() {
    let script = Script::new(vec![10.0], vec![10.0], vec![0.0]);
    let mut fit = Fit::new(script, config(100));
    for epoch in 0..5 {
        fit.epoch(epoch);
    }
    let blocks = fit.stopping.chi2exps_str(2);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0], "\nEpoch: 2\nEXP: 1.0 2.0\nTotal: training = 1.0 validation = 2.0\n");
    assert!(blocks[1].starts_with("\nEpoch: 4\n"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chi2exps.log");
    fit.stopping.write_chi2exps(&path, 2).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), blocks.concat());
}

#[test]
fn malformed_training_output_is_an_error() {
    let script = Script::new(vec![1.0], vec![1.0], vec![0.0]);
    let validation = ScriptedModel::new(&script, Role::Validation);
    let mut data = all_data(NDATA, NDATA_VL);
    data[0].name = "OTHER".to_string();
    let mut stopping = Stopping::new(validation, &data, config(10)).unwrap();

    let info = ScriptedModel::new(&script, Role::Training).fit().unwrap();
    assert!(matches!(
        stopping.monitor_chi2(&info, 0, false),
        Err(FitError::MissingLoss(name)) if name == "OTHER"
    ));
}

#[test]
fn no_chi2_data_is_rejected() {
    let script = Script::new(vec![1.0], vec![1.0], vec![0.0]);
    let validation = ScriptedModel::new(&script, Role::Validation);
    assert!(matches!(
        Stopping::new(validation, &all_data(0, 0), config(10)),
        Err(FitError::NoChi2Data)
    ));
}
