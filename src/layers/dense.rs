use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{math::matrix::Matrix, activation::activation::ActivationFunction};

/// Weight initialisation scheme for dense layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initializer {
    /// Uniform in [-1, 1).
    Random,
    GlorotNormal,
    HeNormal,
}

/// Trainable parameters of one layer, detached from the forward caches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    pub weights: Matrix,
    pub biases: Matrix,
}

#[derive(Debug)]
pub struct Layer{
    pub size: usize,
    pub neurons: Matrix,
    pre_neurons: Matrix,  // pre-activation values (z = Wx + b) needed for correct derivative
    pub weights: Matrix,
    pub biases: Matrix,
    pub activator: ActivationFunction
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        size: usize,
        input_size: usize,
        activation: ActivationFunction,
        initializer: Initializer,
        rng: &mut R,
    ) -> Layer {
        let weights = match initializer {
            Initializer::Random => Matrix::random(input_size, size, rng),
            Initializer::GlorotNormal => Matrix::glorot(input_size, size, rng),
            Initializer::HeNormal => Matrix::he(input_size, size, input_size, rng),
        };

        Layer {
            size,
            neurons: Matrix::zeros(1, size),
            pre_neurons: Matrix::zeros(1, size),
            weights,
            biases: Matrix::zeros(1, size),
            activator: activation
        }
    }

    pub fn feed_from(&mut self, input: Vec<f64>) -> Vec<f64> {
        let z = Matrix::from_data(vec![input]) * self.weights.clone() + self.biases.clone();
        let a = z.map(|x| self.activator.function(x));
        self.pre_neurons = z;
        self.neurons = a.clone();
        a.data.into_iter().next().unwrap_or_default()
    }

    /// Computes gradient adjustments for the last forward pass.
    /// Returns `(weights_grad, biases_grad)`; the bias gradient is also the
    /// layer delta δ = ∂L/∂z, from which the caller propagates backwards.
    /// `next_layer_delta` is ∂L/∂a for this layer (error in activation space).
    pub fn compute_gradients(
        &self,
        next_layer_delta: &Matrix,
        inputs: &Matrix,
    ) -> (Matrix, Matrix) {
        // σ'(z) on the cached pre-activation
        let act_derivative = self.pre_neurons.map(|x| self.activator.derivative(x));
        let layer_delta = next_layer_delta.hadamard(&act_derivative);

        let weights_adjustment = inputs.transpose() * layer_delta.clone();
        (weights_adjustment, layer_delta)
    }

    /// Applies pre-computed gradients scaled by lr.
    pub fn apply_gradients(&mut self, weights_grad: &Matrix, biases_grad: &Matrix, lr: f64) {
        self.weights = self.weights.clone() - weights_grad.map(|x| x * lr);
        self.biases = self.biases.clone() - biases_grad.map(|x| x * lr);
    }

    pub fn snapshot(&self) -> LayerWeights {
        LayerWeights {
            weights: self.weights.clone(),
            biases: self.biases.clone(),
        }
    }

    pub fn restore(&mut self, snapshot: LayerWeights) {
        self.weights = snapshot.weights;
        self.biases = snapshot.biases;
    }
}
