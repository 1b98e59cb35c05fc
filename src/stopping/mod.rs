//! Early stopping for one replica fit.
//!
//! [`Stopping`] is fed the output of every training step. It records a
//! [`FitState`] per epoch in the [`FitHistory`], promotes epochs that improve
//! the [`Validation`] chi² and pass the [`Positivity`] check to best fit, and
//! stops once the patience is exhausted or the training diverges.

pub mod chi2_log;
pub mod fit_state;
pub mod history;
pub mod positivity;
pub mod stopping;
pub mod validation;

pub use fit_state::{FitState, LossMap};
pub use history::{FitHistory, Rewind};
pub use positivity::{Positivity, PositivityStatus};
pub use stopping::{Stopping, StoppingConfig};
pub use validation::Validation;

/// Chi² reported for a run that never found an acceptable best fit.
pub const TERRIBLE_CHI2: f64 = 1e10;

/// Chi² of the best fit before any epoch qualifies.
pub const INITIAL_CHI2: f64 = 1e9;
