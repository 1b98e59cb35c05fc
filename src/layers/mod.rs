pub mod dense;

pub use dense::{Initializer, Layer, LayerWeights};
