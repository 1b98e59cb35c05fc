pub mod sgd;

pub use sgd::{OptimizerKind, Sgd};
