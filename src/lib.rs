pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod optim;
pub mod backend;
pub mod data;
pub mod config;
pub mod stopping;
pub mod train;
pub mod fit;

// Convenience re-exports
pub use error::{FitError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::Layer;
pub use network::network::{Network, NetworkWeights};
pub use optim::sgd::Sgd;
pub use backend::{Evaluation, MetaModel, ModelFactory, TrainingInfo};
pub use config::{FitParameters, FitRuncard, SeedConfig};
pub use stopping::{FitHistory, FitState, Positivity, PositivityStatus, Stopping, Validation};
pub use train::{FitResult, FitSummary, ModelTrainer, TrainerOptions};
pub use fit::fit_replica;
