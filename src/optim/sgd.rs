use serde::{Deserialize, Serialize};

use crate::{math::matrix::Matrix, network::network::Network};

/// Optimizers a runcard may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
}

impl OptimizerKind {
    /// Builds the optimizer with the given learning rate and optional
    /// gradient-norm clipping.
    pub fn build(self, learning_rate: f64, clipnorm: Option<f64>) -> Sgd {
        match self {
            OptimizerKind::Sgd => {
                let sgd = Sgd::new(learning_rate);
                match clipnorm {
                    Some(clip) => sgd.with_clipnorm(clip),
                    None => sgd,
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
    /// Gradients whose global norm exceeds this value are rescaled to it.
    pub clipnorm: Option<f64>,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Sgd {
        Sgd { learning_rate, clipnorm: None }
    }

    pub fn with_clipnorm(mut self, clipnorm: f64) -> Sgd {
        self.clipnorm = Some(clipnorm);
        self
    }

    /// Applies one SGD update to every layer given its accumulated gradients.
    pub fn step(&self, network: &mut Network, grads: &[(Matrix, Matrix)]) {
        let scale = match self.clipnorm {
            Some(max_norm) => {
                let norm = grads.iter()
                    .map(|(w, b)| w.norm().powi(2) + b.norm().powi(2))
                    .sum::<f64>()
                    .sqrt();
                if norm > max_norm { max_norm / norm } else { 1.0 }
            }
            None => 1.0,
        };
        let lr = self.learning_rate * scale;
        for (layer, (w_grad, b_grad)) in network.layers.iter_mut().zip(grads.iter()) {
            layer.apply_gradients(w_grad, b_grad, lr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::activation::ActivationFunction;
    use crate::layers::dense::Initializer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn clipping_bounds_the_update() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut network = Network::new(1, &[1], &[ActivationFunction::Identity], Initializer::Random, &mut rng);
        let before = network.layers[0].weights.data[0][0];
        let grads = vec![(
            Matrix::from_data(vec![vec![300.0]]),
            Matrix::from_data(vec![vec![400.0]]),
        )];
        Sgd::new(1.0).with_clipnorm(5.0).step(&mut network, &grads);
        let after = network.layers[0].weights.data[0][0];
        assert!((before - after - 3.0).abs() < 1e-12);
        assert!((network.layers[0].biases.data[0][0] + 4.0).abs() < 1e-12);
    }

    #[test]
    fn runcard_optimizer_names() {
        let kind: OptimizerKind = serde_json::from_str(r#""sgd""#).unwrap();
        let sgd = kind.build(0.02, Some(3.0));
        assert_eq!(sgd.learning_rate, 0.02);
        assert_eq!(sgd.clipnorm, Some(3.0));
        assert_eq!(OptimizerKind::Sgd.build(0.1, None).clipnorm, None);
        assert!(serde_json::from_str::<OptimizerKind>(r#""adam""#).is_err());
    }
}
