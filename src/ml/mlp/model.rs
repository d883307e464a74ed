use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hidden layer widths of the letter classifier.
pub const DEFAULT_HIDDEN_LAYERS: [usize; 2] = [64, 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Softmax,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("model has no layers")]
    NoLayers,
    #[error("layer {layer} expects {expected} inputs but receives {actual}")]
    LayerChain {
        layer: usize,
        expected: usize,
        actual: usize,
    },
    #[error("layer {layer} {field} length {actual} does not match {expected}")]
    ParameterLength {
        layer: usize,
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("output layer must use softmax")]
    OutputNotSoftmax,
}

/// Fully connected layer. `weights` is row-major `[units][input_dim]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseLayer {
    pub input_dim: usize,
    pub units: usize,
    pub activation: Activation,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl DenseLayer {
    /// Glorot-uniform weights and zero bias.
    pub fn glorot<R: Rng + ?Sized>(
        input_dim: usize,
        units: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let limit = (6.0 / (input_dim + units).max(1) as f32).sqrt();
        let weights = (0..input_dim * units)
            .map(|_| rng.random_range(-limit..=limit))
            .collect();
        Self {
            input_dim,
            units,
            activation,
            weights,
            bias: vec![0.0; units],
        }
    }

    fn validate(&self, index: usize) -> Result<(), ModelError> {
        if self.weights.len() != self.input_dim * self.units {
            return Err(ModelError::ParameterLength {
                layer: index,
                field: "weights",
                expected: self.input_dim * self.units,
                actual: self.weights.len(),
            });
        }
        if self.bias.len() != self.units {
            return Err(ModelError::ParameterLength {
                layer: index,
                field: "bias",
                expected: self.units,
                actual: self.bias.len(),
            });
        }
        Ok(())
    }

    /// Write pre-activations into `pre` and activations into `out`.
    pub(crate) fn forward_into(&self, input: &[f32], pre: &mut Vec<f32>, out: &mut Vec<f32>) {
        pre.clear();
        for u in 0..self.units {
            let row = &self.weights[u * self.input_dim..(u + 1) * self.input_dim];
            let sum = row
                .iter()
                .zip(input)
                .fold(self.bias[u], |acc, (w, x)| acc + w * x);
            pre.push(sum);
        }
        out.clear();
        out.resize(self.units, 0.0);
        match self.activation {
            Activation::Relu => {
                for (o, &z) in out.iter_mut().zip(pre.iter()) {
                    *o = z.max(0.0);
                }
            }
            Activation::Softmax => softmax_inplace(pre, out),
        }
    }
}

/// Stack of dense layers ending in a softmax.
#[derive(Debug, Clone, PartialEq)]
pub struct MlpClassifier {
    layers: Vec<DenseLayer>,
}

/// Per-layer values kept from a forward pass for backpropagation.
#[derive(Debug, Clone, Default)]
pub(crate) struct ForwardTrace {
    /// `activations[0]` is the input; `activations[l + 1]` is layer `l` output.
    pub activations: Vec<Vec<f32>>,
    pub pre_activations: Vec<Vec<f32>>,
}

impl ForwardTrace {
    pub fn output(&self) -> &[f32] {
        self.activations.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

impl MlpClassifier {
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self, ModelError> {
        let model = Self { layers };
        model.validate()?;
        Ok(model)
    }

    /// `hidden` ReLU layers followed by a softmax over `n_classes`.
    pub fn with_architecture<R: Rng + ?Sized>(
        input_dim: usize,
        hidden: &[usize],
        n_classes: usize,
        rng: &mut R,
    ) -> Self {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut fan_in = input_dim;
        for &units in hidden {
            layers.push(DenseLayer::glorot(fan_in, units, Activation::Relu, rng));
            fan_in = units;
        }
        layers.push(DenseLayer::glorot(fan_in, n_classes, Activation::Softmax, rng));
        Self { layers }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let Some(last) = self.layers.last() else {
            return Err(ModelError::NoLayers);
        };
        if last.activation != Activation::Softmax {
            return Err(ModelError::OutputNotSoftmax);
        }
        for (index, layer) in self.layers.iter().enumerate() {
            layer.validate(index)?;
            if index > 0 {
                let prev_units = self.layers[index - 1].units;
                if layer.input_dim != prev_units {
                    return Err(ModelError::LayerChain {
                        layer: index,
                        expected: layer.input_dim,
                        actual: prev_units,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub(crate) fn layers_mut(&mut self) -> &mut [DenseLayer] {
        &mut self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map(|layer| layer.input_dim).unwrap_or(0)
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(|layer| layer.units).unwrap_or(0)
    }

    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.weights.len() + layer.bias.len())
            .sum()
    }

    /// Class probabilities, or `None` when `features` has the wrong length.
    pub fn predict_proba(&self, features: &[f32]) -> Option<Vec<f32>> {
        if features.len() != self.input_dim() {
            return None;
        }
        let mut input = features.to_vec();
        let mut pre = Vec::new();
        let mut out = Vec::new();
        for layer in &self.layers {
            layer.forward_into(&input, &mut pre, &mut out);
            std::mem::swap(&mut input, &mut out);
        }
        Some(input)
    }

    pub(crate) fn forward_trace(&self, features: &[f32], trace: &mut ForwardTrace) {
        let depth = self.layers.len();
        trace.activations.resize_with(depth + 1, Vec::new);
        trace.pre_activations.resize_with(depth, Vec::new);
        trace.activations[0].clear();
        trace.activations[0].extend_from_slice(features);
        for (l, layer) in self.layers.iter().enumerate() {
            let (inputs, outputs) = trace.activations.split_at_mut(l + 1);
            layer.forward_into(&inputs[l], &mut trace.pre_activations[l], &mut outputs[0]);
        }
    }
}

/// Index and value of the largest entry; ties keep the lowest index.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        match best {
            Some((_, best_val)) if value <= best_val => {}
            _ => best = Some((idx, value)),
        }
    }
    best
}

pub(crate) fn softmax_inplace(raw: &[f32], out: &mut [f32]) {
    if raw.is_empty() || out.is_empty() {
        return;
    }
    let max = raw
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, |a, b| a.max(b));
    let mut sum = 0.0f32;
    for (o, &v) in out.iter_mut().zip(raw) {
        let e = (v - max).exp();
        *o = e;
        sum += e;
    }
    if sum == 0.0 || !sum.is_finite() {
        let uniform = 1.0 / (raw.len() as f32);
        out.fill(uniform);
        return;
    }
    for v in out.iter_mut() {
        *v /= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn architecture_matches_requested_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let model = MlpClassifier::with_architecture(63, &DEFAULT_HIDDEN_LAYERS, 5, &mut rng);
        model.validate().unwrap();
        let shapes: Vec<(usize, usize, Activation)> = model
            .layers()
            .iter()
            .map(|layer| (layer.input_dim, layer.units, layer.activation))
            .collect();
        assert_eq!(
            shapes,
            vec![
                (63, 64, Activation::Relu),
                (64, 32, Activation::Relu),
                (32, 5, Activation::Softmax),
            ]
        );
        assert_eq!(model.parameter_count(), 63 * 64 + 64 + 64 * 32 + 32 + 32 * 5 + 5);
    }

    #[test]
    fn softmax_output_sums_to_one() {
        let mut rng = StdRng::seed_from_u64(2);
        let model = MlpClassifier::with_architecture(6, &[4], 3, &mut rng);
        let out = model.predict_proba(&[0.3, -0.2, 0.9, 0.0, 1.0, -1.0]).unwrap();
        let sum: f32 = out.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(model.predict_proba(&[0.0; 5]).is_none());
    }

    #[test]
    fn rejects_broken_layer_chain() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = DenseLayer::glorot(4, 3, Activation::Relu, &mut rng);
        let b = DenseLayer::glorot(5, 2, Activation::Softmax, &mut rng);
        assert_eq!(
            MlpClassifier::new(vec![a.clone(), b]).unwrap_err(),
            ModelError::LayerChain {
                layer: 1,
                expected: 5,
                actual: 3
            }
        );
        assert_eq!(
            MlpClassifier::new(vec![a]).unwrap_err(),
            ModelError::OutputNotSoftmax
        );
    }

    #[test]
    fn argmax_prefers_first_of_ties() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some((1, 0.4)));
        assert_eq!(argmax(&[]), None);
    }
}
