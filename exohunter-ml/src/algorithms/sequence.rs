//! Small 1-D convolutional network over the feature vector read as a sequence.
//!
//! Layers: Conv1D (kernel 2, ReLU) -> MaxPool (2) -> Dense (ReLU) -> Dense (sigmoid).
//! Trained with binary cross-entropy and Adam.

use crate::config::SequenceConfig;
use crate::error::MlError;
use crate::features::definition::{FEATURE_COUNT, FeatureVector};
use crate::training::metrics::TrainingMetrics;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const KERNEL: usize = 2;
const POOL: usize = 2;
const CONV_STEPS: usize = FEATURE_COUNT - KERNEL + 1;
const POOL_STEPS: usize = CONV_STEPS / POOL;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;
const LOSS_EPSILON: f64 = 1e-7;

/// Offsets of each parameter block inside the flat parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Layout {
    filters: usize,
    hidden: usize,
}

impl Layout {
    fn flat(&self) -> usize {
        POOL_STEPS * self.filters
    }
    fn conv_w(&self) -> usize {
        0
    }
    fn conv_b(&self) -> usize {
        self.filters * KERNEL
    }
    fn dense_w(&self) -> usize {
        self.conv_b() + self.filters
    }
    fn dense_b(&self) -> usize {
        self.dense_w() + self.hidden * self.flat()
    }
    fn out_w(&self) -> usize {
        self.dense_b() + self.hidden
    }
    fn out_b(&self) -> usize {
        self.out_w() + self.hidden
    }
    fn len(&self) -> usize {
        self.out_b() + 1
    }
}

/// Intermediate activations of one forward pass, kept for backpropagation.
struct Activations {
    conv: Vec<f64>,
    pooled: Vec<f64>,
    pool_arg: Vec<usize>,
    hidden: Vec<f64>,
    output: f64,
}

/// Fitted convolutional classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceClassifier {
    layout: Layout,
    params: Vec<f64>,
    history: TrainingMetrics,
}

impl SequenceClassifier {
    pub fn fit(
        rows: &[FeatureVector],
        labels: &[u8],
        config: &SequenceConfig,
    ) -> Result<Self, MlError> {
        if rows.is_empty() || rows.len() != labels.len() {
            return Err(MlError::training(format!(
                "sequence classifier needs matching non-empty rows and labels, got {} and {}",
                rows.len(),
                labels.len()
            )));
        }
        if config.filters == 0 || config.hidden_units == 0 || config.batch_size == 0 {
            return Err(MlError::training(
                "filters, hidden_units and batch_size must be positive",
            ));
        }

        let layout = Layout {
            filters: config.filters,
            hidden: config.hidden_units,
        };
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut model = Self {
            layout,
            params: glorot_init(&layout, &mut rng),
            history: TrainingMetrics::default(),
        };

        let mut adam = Adam::new(layout.len(), config.learning_rate);
        let mut order: Vec<usize> = (0..rows.len()).collect();
        let mut grads = vec![0.0; layout.len()];

        for epoch in 0..config.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            for batch in order.chunks(config.batch_size) {
                grads.iter_mut().for_each(|g| *g = 0.0);
                for &i in batch {
                    let act = model.forward(&rows[i]);
                    let y = f64::from(labels[i]);
                    epoch_loss += bce(act.output, y);
                    model.backward(&rows[i], &act, y, &mut grads);
                }
                let scale = 1.0 / batch.len() as f64;
                grads.iter_mut().for_each(|g| *g *= scale);
                adam.step(&mut model.params, &grads);
            }
            let loss = epoch_loss / rows.len() as f64;
            model.history.record_epoch(loss, None);
            debug!(epoch, loss, "Sequence classifier epoch");
        }

        info!(
            epochs = config.epochs,
            rows = rows.len(),
            loss = model.history.loss_history.last().copied().unwrap_or(f64::NAN),
            "Fitted sequence classifier"
        );
        Ok(model)
    }

    /// Whether every weight is finite. A diverged model must not be used.
    pub fn is_finite(&self) -> bool {
        self.params.iter().all(|p| p.is_finite())
    }

    pub fn history(&self) -> &TrainingMetrics {
        &self.history
    }

    pub fn parameter_count(&self) -> usize {
        self.params.len()
    }

    pub fn predict_probability(&self, rows: &[FeatureVector]) -> Vec<f64> {
        rows.iter().map(|r| self.forward(r).output).collect()
    }

    pub fn predict(&self, rows: &[FeatureVector]) -> Vec<u8> {
        self.predict_probability(rows)
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect()
    }

    fn forward(&self, x: &FeatureVector) -> Activations {
        let l = self.layout;
        let p = &self.params;
        let f_n = l.filters;

        let mut conv = vec![0.0; CONV_STEPS * f_n];
        for t in 0..CONV_STEPS {
            for f in 0..f_n {
                let mut z = p[l.conv_b() + f];
                for k in 0..KERNEL {
                    z += p[l.conv_w() + f * KERNEL + k] * x[t + k];
                }
                conv[t * f_n + f] = z.max(0.0);
            }
        }

        // Flattened as step-major, filter-minor.
        let mut pooled = vec![0.0; l.flat()];
        let mut pool_arg = vec![0; l.flat()];
        for q in 0..POOL_STEPS {
            for f in 0..f_n {
                let (mut best_t, mut best) = (q * POOL, f64::NEG_INFINITY);
                for t in q * POOL..(q + 1) * POOL {
                    if conv[t * f_n + f] > best {
                        best = conv[t * f_n + f];
                        best_t = t;
                    }
                }
                pooled[q * f_n + f] = best;
                pool_arg[q * f_n + f] = best_t;
            }
        }

        let mut hidden = vec![0.0; l.hidden];
        for (j, h) in hidden.iter_mut().enumerate() {
            let row = l.dense_w() + j * l.flat();
            let z: f64 = p[l.dense_b() + j]
                + pooled
                    .iter()
                    .enumerate()
                    .map(|(k, v)| p[row + k] * v)
                    .sum::<f64>();
            *h = z.max(0.0);
        }

        let logit = p[l.out_b()]
            + hidden
                .iter()
                .enumerate()
                .map(|(j, h)| p[l.out_w() + j] * h)
                .sum::<f64>();

        Activations {
            conv,
            pooled,
            pool_arg,
            hidden,
            output: 1.0 / (1.0 + (-logit).exp()),
        }
    }

    /// Accumulate d(loss)/d(params) for one sample into `grads`.
    fn backward(&self, x: &FeatureVector, act: &Activations, y: f64, grads: &mut [f64]) {
        let l = self.layout;
        let p = &self.params;
        let f_n = l.filters;

        // Sigmoid + cross-entropy.
        let d_logit = act.output - y;
        grads[l.out_b()] += d_logit;

        let mut d_pooled = vec![0.0; l.flat()];
        for j in 0..l.hidden {
            grads[l.out_w() + j] += d_logit * act.hidden[j];
            if act.hidden[j] <= 0.0 {
                continue;
            }
            let d_pre = d_logit * p[l.out_w() + j];
            grads[l.dense_b() + j] += d_pre;
            let row = l.dense_w() + j * l.flat();
            for k in 0..l.flat() {
                grads[row + k] += d_pre * act.pooled[k];
                d_pooled[k] += d_pre * p[row + k];
            }
        }

        for q in 0..POOL_STEPS {
            for f in 0..f_n {
                let idx = q * f_n + f;
                let t = act.pool_arg[idx];
                if act.conv[t * f_n + f] <= 0.0 {
                    continue;
                }
                let d = d_pooled[idx];
                grads[l.conv_b() + f] += d;
                for k in 0..KERNEL {
                    grads[l.conv_w() + f * KERNEL + k] += d * x[t + k];
                }
            }
        }
    }
}

fn bce(p: f64, y: f64) -> f64 {
    let p = p.clamp(LOSS_EPSILON, 1.0 - LOSS_EPSILON);
    -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
}

/// Glorot-uniform weights, zero biases.
fn glorot_init(layout: &Layout, rng: &mut StdRng) -> Vec<f64> {
    let mut params = vec![0.0; layout.len()];
    let mut fill = |start: usize, count: usize, fan_in: usize, fan_out: usize| {
        let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let dist = Uniform::new_inclusive(-limit, limit);
        for v in &mut params[start..start + count] {
            *v = dist.sample(&mut *rng);
        }
    };
    fill(
        layout.conv_w(),
        layout.filters * KERNEL,
        KERNEL,
        KERNEL * layout.filters,
    );
    fill(
        layout.dense_w(),
        layout.hidden * layout.flat(),
        layout.flat(),
        layout.hidden,
    );
    fill(layout.out_w(), layout.hidden, layout.hidden, 1);
    params
}

struct Adam {
    lr: f64,
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

impl Adam {
    fn new(n: usize, lr: f64) -> Self {
        Self {
            lr,
            m: vec![0.0; n],
            v: vec![0.0; n],
            t: 0,
        }
    }

    fn step(&mut self, params: &mut [f64], grads: &[f64]) {
        self.t += 1;
        let lr_t =
            self.lr * (1.0 - BETA2.powi(self.t)).sqrt() / (1.0 - BETA1.powi(self.t));
        for i in 0..params.len() {
            self.m[i] = BETA1 * self.m[i] + (1.0 - BETA1) * grads[i];
            self.v[i] = BETA2 * self.v[i] + (1.0 - BETA2) * grads[i] * grads[i];
            params[i] -= lr_t * self.m[i] / (self.v[i].sqrt() + ADAM_EPSILON);
        }
    }
}
