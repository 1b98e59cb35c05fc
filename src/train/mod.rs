pub mod epoch_stats;
pub mod fit_result;
pub mod loop_fn;
pub mod model_trainer;
pub mod trainer_options;

pub use epoch_stats::EpochStats;
pub use fit_result::{FitResult, FitSummary};
pub use loop_fn::train_and_fit;
pub use model_trainer::ModelTrainer;
pub use trainer_options::TrainerOptions;
