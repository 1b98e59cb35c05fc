/// Chi² with a diagonal covariance matrix.
pub struct Chi2Loss;

impl Chi2Loss {
    /// Σ ((predicted − data) / σ)², summed (not averaged) over points.
    /// Normalising by the number of points is left to the caller.
    pub fn loss(predicted: &[f64], data: &[f64], sigma: &[f64]) -> f64 {
        predicted.iter().zip(data.iter()).zip(sigma.iter())
            .map(|((p, d), s)| ((p - d) / s).powi(2))
            .sum()
    }

    /// Per-point gradient: 2 (predicted − data) / σ²
    pub fn derivative(predicted: &[f64], data: &[f64], sigma: &[f64]) -> Vec<f64> {
        predicted.iter().zip(data.iter()).zip(sigma.iter())
            .map(|((p, d), s)| 2.0 * (p - d) / (s * s))
            .collect()
    }
}
