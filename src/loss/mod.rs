pub mod chi2;
pub mod positivity;

pub use chi2::Chi2Loss;
pub use positivity::PositivityLoss;
