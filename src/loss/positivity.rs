/// Penalty on negative predictions of a positivity observable.
pub struct PositivityLoss;

impl PositivityLoss {
    /// multiplier · Σ max(0, −predicted)
    pub fn loss(predicted: &[f64], multiplier: f64) -> f64 {
        multiplier * predicted.iter().map(|p| (-p).max(0.0)).sum::<f64>()
    }

    /// Per-point gradient: −multiplier where the prediction is negative, else 0
    pub fn derivative(predicted: &[f64], multiplier: f64) -> Vec<f64> {
        predicted.iter()
            .map(|&p| if p < 0.0 { -multiplier } else { 0.0 })
            .collect()
    }
}
