use super::model::MlpClassifier;

/// Adam hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdamConfig {
    pub learning_rate: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// Accumulated gradients for one dense layer, same layout as its parameters.
#[derive(Debug, Clone)]
pub(crate) struct LayerGradients {
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

impl LayerGradients {
    pub fn zeros_for(model: &MlpClassifier) -> Vec<Self> {
        model
            .layers()
            .iter()
            .map(|layer| Self {
                weights: vec![0.0; layer.weights.len()],
                bias: vec![0.0; layer.bias.len()],
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.weights.fill(0.0);
        self.bias.fill(0.0);
    }

    pub fn scale(&mut self, factor: f32) {
        for g in self.weights.iter_mut().chain(self.bias.iter_mut()) {
            *g *= factor;
        }
    }
}

#[derive(Debug, Clone)]
struct Moments {
    m: Vec<f32>,
    v: Vec<f32>,
}

impl Moments {
    fn zeros(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }
}

/// Adam optimizer state for an [`MlpClassifier`].
#[derive(Debug, Clone)]
pub struct Adam {
    config: AdamConfig,
    step: i32,
    weight_moments: Vec<Moments>,
    bias_moments: Vec<Moments>,
}

impl Adam {
    pub fn new(config: AdamConfig, model: &MlpClassifier) -> Self {
        Self {
            config,
            step: 0,
            weight_moments: model
                .layers()
                .iter()
                .map(|layer| Moments::zeros(layer.weights.len()))
                .collect(),
            bias_moments: model
                .layers()
                .iter()
                .map(|layer| Moments::zeros(layer.bias.len()))
                .collect(),
        }
    }

    pub fn steps(&self) -> i32 {
        self.step
    }

    /// Apply one bias-corrected update with the given mean gradients.
    pub(crate) fn apply(&mut self, model: &mut MlpClassifier, grads: &[LayerGradients]) {
        self.step = self.step.saturating_add(1);
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;
        let correction = (1.0 - beta2.powi(self.step)).sqrt() / (1.0 - beta1.powi(self.step));
        let step_size = learning_rate * correction;

        for (l, layer) in model.layers_mut().iter_mut().enumerate() {
            update(
                &mut layer.weights,
                &grads[l].weights,
                &mut self.weight_moments[l],
                beta1,
                beta2,
                epsilon,
                step_size,
            );
            update(
                &mut layer.bias,
                &grads[l].bias,
                &mut self.bias_moments[l],
                beta1,
                beta2,
                epsilon,
                step_size,
            );
        }
    }
}

fn update(
    params: &mut [f32],
    grads: &[f32],
    moments: &mut Moments,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    step_size: f32,
) {
    for i in 0..params.len() {
        let g = grads[i];
        moments.m[i] = beta1 * moments.m[i] + (1.0 - beta1) * g;
        moments.v[i] = beta2 * moments.v[i] + (1.0 - beta2) * g * g;
        params[i] -= step_size * moments.m[i] / (moments.v[i].sqrt() + epsilon);
    }
}
