use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::{
    activation::activation::ActivationFunction,
    error::{FitError, Result},
    layers::dense::{Initializer, Layer, LayerWeights},
    math::matrix::Matrix,
};

/// Deep copy of every trainable parameter of a [`Network`].
///
/// Taking a snapshot never aliases the live parameters, so a snapshot can be
/// restored after any amount of further training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkWeights(pub Vec<LayerWeights>);

/// Fully connected network parametrising the PDF, `x -> f(x)`.
#[derive(Debug)]
pub struct Network {
    pub layers: Vec<Layer>,
}

impl Network {
    /// Builds a network from the per-layer node counts and activations.
    /// The first layer reads `input_size` values.
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        nodes_per_layer: &[usize],
        activation_per_layer: &[ActivationFunction],
        initializer: Initializer,
        rng: &mut R,
    ) -> Network {
        let mut fan_in = input_size;
        let layers = nodes_per_layer.iter().zip(activation_per_layer.iter())
            .map(|(&size, &activation)| {
                let layer = Layer::new(size, fan_in, activation, initializer, rng);
                fan_in = size;
                layer
            })
            .collect();
        Network { layers }
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.size)
    }

    /// Forward pass; stores activations in each layer for backprop.
    pub fn forward(&mut self, input: Vec<f64>) -> Vec<f64> {
        let mut current = input;
        for layer in &mut self.layers {
            current = layer.feed_from(current);
        }
        current
    }

    /// Backpropagates `output_delta` (∂L/∂output) through the activations
    /// cached by the most recent [`Network::forward`] call and adds the
    /// resulting gradients into `acc`.
    pub fn accumulate_gradients(
        &self,
        input: &[f64],
        output_delta: Vec<f64>,
        acc: &mut [(Matrix, Matrix)],
    ) {
        let mut delta = Matrix::from_data(vec![output_delta]);

        for i in (0..self.layers.len()).rev() {
            let input_for_layer = if i == 0 {
                Matrix::from_data(vec![input.to_vec()])
            } else {
                self.layers[i - 1].neurons.clone()
            };

            let (w_grad, b_grad) = self.layers[i].compute_gradients(&delta, &input_for_layer);

            if i > 0 {
                // Propagate δ_i through weights to get ∂L/∂a_{i-1}
                delta = b_grad.clone() * self.layers[i].weights.transpose();
            }

            acc[i].0.add_assign(&w_grad);
            acc[i].1.add_assign(&b_grad);
        }
    }

    /// Zeroed gradient storage matching the layer shapes.
    pub fn zero_gradients(&self) -> Vec<(Matrix, Matrix)> {
        self.layers.iter()
            .map(|layer| (
                Matrix::zeros(layer.weights.rows, layer.weights.cols),
                Matrix::zeros(layer.biases.rows, layer.biases.cols),
            ))
            .collect()
    }

    pub fn weights(&self) -> NetworkWeights {
        NetworkWeights(self.layers.iter().map(Layer::snapshot).collect())
    }

    pub fn set_weights(&mut self, weights: NetworkWeights) -> Result<()> {
        if weights.0.len() != self.layers.len() {
            return Err(FitError::Shape(format!(
                "snapshot has {} layers, network has {}",
                weights.0.len(),
                self.layers.len()
            )));
        }
        for (layer, snapshot) in self.layers.iter_mut().zip(weights.0) {
            if snapshot.weights.rows != layer.weights.rows || snapshot.weights.cols != layer.weights.cols {
                return Err(FitError::Shape(format!(
                    "layer expects {}x{} weights, snapshot has {}x{}",
                    layer.weights.rows, layer.weights.cols, snapshot.weights.rows, snapshot.weights.cols
                )));
            }
            layer.restore(snapshot);
        }
        Ok(())
    }

    /// Serializes the network weights to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.weights())?;
        Ok(())
    }

    /// Loads weights previously written by [`Network::save_json`] into this network.
    pub fn load_json(&mut self, path: &str) -> Result<()> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let weights: NetworkWeights = serde_json::from_reader(reader)?;
        self.set_weights(weights)
    }
}
