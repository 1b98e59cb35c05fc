pub mod fit_parameters;
pub mod runcard;

pub use fit_parameters::FitParameters;
pub use runcard::{FitRuncard, SeedConfig};
