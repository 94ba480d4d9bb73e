//! Feed-forward network with perturbation training.

// Layer widths become float fan sizes
#![allow(clippy::cast_precision_loss)]

use super::GuidanceError;
use crate::rng::RandomStream;
use serde::{Deserialize, Serialize};

/// Probability that any single weight or bias is perturbed by [`GuidanceNetwork::mutate`].
pub const MUTATION_PROBABILITY: f64 = 0.1;

/// Absolute error below which [`GuidanceNetwork::train`] leaves the network alone.
pub const TRAIN_TOLERANCE: f64 = 0.05;

/// Neuron activation function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// `max(0, x)`, used on hidden layers.
    Relu,
    /// Logistic function, used on the output layer.
    Sigmoid,
}

impl Activation {
    /// Apply the activation to one pre-activation value.
    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Relu => x.max(0.0),
            Self::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

/// One fully connected layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Weight matrix, one row per output neuron, one column per input.
    pub weights: Vec<Vec<f64>>,
    /// One bias per output neuron.
    pub biases: Vec<f64>,
    /// Activation applied to every output.
    pub activation: Activation,
}

impl Layer {
    fn xavier(fan_in: usize, fan_out: usize, activation: Activation, rng: &mut RandomStream) -> Self {
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let weights = (0..fan_out)
            .map(|_| {
                (0..fan_in)
                    .map(|_| (2.0 * rng.next() - 1.0) * limit)
                    .collect()
            })
            .collect();
        Self {
            weights,
            biases: vec![0.0; fan_out],
            activation,
        }
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                let sum: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum();
                self.activation.apply(sum + bias)
            })
            .collect()
    }

    fn parameters_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.weights.iter_mut().flatten().chain(self.biases.iter_mut())
    }
}

/// Small multi-layer perceptron.
///
/// Hidden layers use ReLU, the output layer a sigmoid, so every output lies
/// in `(0, 1)`. Decoding, through serde or [`GuidanceNetwork::deserialize`],
/// always checks parameter shapes against the declared architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawNetwork")]
pub struct GuidanceNetwork {
    layer_sizes: Vec<usize>,
    layers: Vec<Layer>,
}

/// Unchecked wire form of a network.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNetwork {
    layer_sizes: Vec<usize>,
    layers: Vec<Layer>,
}

impl TryFrom<RawNetwork> for GuidanceNetwork {
    type Error = GuidanceError;

    fn try_from(raw: RawNetwork) -> Result<Self, Self::Error> {
        let network = Self {
            layer_sizes: raw.layer_sizes,
            layers: raw.layers,
        };
        network.validate()?;
        Ok(network)
    }
}

impl GuidanceNetwork {
    /// Build a network with Xavier-uniform weights and zero biases.
    ///
    /// Weights are drawn layer by layer, row by row.
    ///
    /// # Errors
    ///
    /// [`GuidanceError::InvalidArchitecture`] when fewer than two sizes are
    /// given or any size is zero.
    pub fn new(layer_sizes: &[usize], rng: &mut RandomStream) -> Result<Self, GuidanceError> {
        if layer_sizes.len() < 2 || layer_sizes.contains(&0) {
            return Err(GuidanceError::InvalidArchitecture(layer_sizes.to_vec()));
        }
        let last = layer_sizes.len() - 2;
        let layers = layer_sizes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let activation = if i == last {
                    Activation::Sigmoid
                } else {
                    Activation::Relu
                };
                Layer::xavier(pair[0], pair[1], activation, rng)
            })
            .collect();
        Ok(Self {
            layer_sizes: layer_sizes.to_vec(),
            layers,
        })
    }

    /// Layer widths, input first.
    #[must_use]
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    /// The layers, input side first.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Width of the input layer.
    #[must_use]
    pub fn input_size(&self) -> usize {
        self.layer_sizes.first().copied().unwrap_or_default()
    }

    /// Run a forward pass.
    ///
    /// # Panics
    ///
    /// Panics if `input.len()` differs from [`Self::input_size`].
    #[must_use]
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        assert_eq!(
            input.len(),
            self.input_size(),
            "guidance network input width mismatch"
        );
        self.layers
            .iter()
            .fold(input.to_vec(), |acc, layer| layer.forward(&acc))
    }

    /// First output of a forward pass.
    ///
    /// # Panics
    ///
    /// Panics if `input.len()` differs from [`Self::input_size`].
    #[must_use]
    pub fn predict(&self, input: &[f64]) -> f64 {
        self.forward(input).first().copied().unwrap_or_default()
    }

    /// Checked variant of [`Self::predict`].
    ///
    /// # Errors
    ///
    /// [`GuidanceError::InputSize`] on a width mismatch.
    pub fn try_predict(&self, input: &[f64]) -> Result<f64, GuidanceError> {
        if input.len() != self.input_size() {
            return Err(GuidanceError::InputSize {
                expected: self.input_size(),
                actual: input.len(),
            });
        }
        Ok(self.predict(input))
    }

    /// Randomly perturb parameters.
    ///
    /// Each weight, then each bias, of each layer in order: with probability
    /// [`MUTATION_PROBABILITY`] add a uniform value in `[-rate, rate)`.
    pub fn mutate(&mut self, rate: f64, rng: &mut RandomStream) {
        for layer in &mut self.layers {
            for p in layer.parameters_mut() {
                if rng.chance(MUTATION_PROBABILITY) {
                    *p += (2.0 * rng.next() - 1.0) * rate;
                }
            }
        }
    }

    /// One perturbation training step; returns the absolute error.
    ///
    /// When the error exceeds [`TRAIN_TOLERANCE`], the network is mutated
    /// with rate `error * learning_rate`. Otherwise no draws are consumed.
    ///
    /// # Panics
    ///
    /// Panics if `input.len()` differs from [`Self::input_size`].
    pub fn train(
        &mut self,
        input: &[f64],
        target: f64,
        learning_rate: f64,
        rng: &mut RandomStream,
    ) -> f64 {
        let error = (target - self.predict(input)).abs();
        if error > TRAIN_TOLERANCE {
            self.mutate(error * learning_rate, rng);
        }
        error
    }

    /// Encode the architecture and every parameter as JSON.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn serialize(&self) -> Result<String, GuidanceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a network and check that its parameters match its declared
    /// architecture.
    ///
    /// # Errors
    ///
    /// [`GuidanceError::Encoding`] on bad JSON, [`GuidanceError::Shape`] or
    /// [`GuidanceError::InvalidArchitecture`] on inconsistent contents.
    pub fn deserialize(encoded: &str) -> Result<Self, GuidanceError> {
        let raw: RawNetwork = serde_json::from_str(encoded)?;
        Self::try_from(raw)
    }

    fn validate(&self) -> Result<(), GuidanceError> {
        let sizes = &self.layer_sizes;
        if sizes.len() < 2 || sizes.contains(&0) {
            return Err(GuidanceError::InvalidArchitecture(sizes.clone()));
        }
        if self.layers.len() != sizes.len() - 1 {
            return Err(GuidanceError::Shape {
                layer: self.layers.len(),
                reason: format!("expected {} layers", sizes.len() - 1),
            });
        }
        for (i, (layer, pair)) in self.layers.iter().zip(sizes.windows(2)).enumerate() {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let shape_error = |reason: String| GuidanceError::Shape { layer: i, reason };
            if layer.weights.len() != fan_out {
                return Err(shape_error(format!(
                    "{} weight rows, expected {fan_out}",
                    layer.weights.len()
                )));
            }
            if let Some(row) = layer.weights.iter().find(|row| row.len() != fan_in) {
                return Err(shape_error(format!(
                    "weight row of width {}, expected {fan_in}",
                    row.len()
                )));
            }
            if layer.biases.len() != fan_out {
                return Err(shape_error(format!(
                    "{} biases, expected {fan_out}",
                    layer.biases.len()
                )));
            }
        }
        Ok(())
    }
}
