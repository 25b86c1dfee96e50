//! Affine preference model fitted with full-batch Adam.
//!
//! ```text
//! predict(x) = w · x + b
//! loss       = mean((predict(x_i) - y_i)²)
//! ```
//!
//! Optimizer moments only exist inside [`ParametricRegressor::fit`]. The
//! returned [`LinearModel`] is plain data, so prediction cannot touch training
//! state.

use crate::error::{Result, ScoringError};
use crate::labels::TrainingSet;
use crate::session::CancellationToken;
use crate::track::{FeatureVector, FEATURE_DIM};
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

/// Training hyper-parameters for the linear model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParametricRegressor {
    pub iterations: u32,
    pub learning_rate: f64,
    /// Seed for weight initialisation; equal seeds give equal models.
    pub seed: u64,
}

impl Default for ParametricRegressor {
    fn default() -> Self {
        Self {
            iterations: 1000,
            learning_rate: 1e-3,
            seed: 42,
        }
    }
}

/// Fitted weights and bias.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModel {
    pub weights: [f64; FEATURE_DIM],
    pub bias: f64,
}

impl LinearModel {
    #[must_use]
    pub fn predict(&self, vector: &FeatureVector) -> f64 {
        self.weights
            .iter()
            .zip(vector.values())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }

    /// Mean squared error over `training`.
    #[must_use]
    pub fn mse(&self, training: &TrainingSet) -> f64 {
        if training.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = training.len() as f64;
        training
            .examples()
            .iter()
            .map(|e| (self.predict(&e.vector) - e.label).powi(2))
            .sum::<f64>()
            / n
    }
}

/// First and second moment estimates for every parameter (weights, then bias).
struct AdamState {
    m: [f64; FEATURE_DIM + 1],
    v: [f64; FEATURE_DIM + 1],
    step: i32,
}

impl AdamState {
    fn new() -> Self {
        Self {
            m: [0.0; FEATURE_DIM + 1],
            v: [0.0; FEATURE_DIM + 1],
            step: 0,
        }
    }

    /// Turn raw gradients into parameter deltas.
    fn update(&mut self, grads: &[f64; FEATURE_DIM + 1], learning_rate: f64) -> [f64; FEATURE_DIM + 1] {
        self.step += 1;
        let bias1 = 1.0 - BETA1.powi(self.step);
        let bias2 = 1.0 - BETA2.powi(self.step);

        let mut deltas = [0.0; FEATURE_DIM + 1];
        for (i, delta) in deltas.iter_mut().enumerate() {
            self.m[i] = BETA1 * self.m[i] + (1.0 - BETA1) * grads[i];
            self.v[i] = BETA2 * self.v[i] + (1.0 - BETA2) * grads[i] * grads[i];
            let m_hat = self.m[i] / bias1;
            let v_hat = self.v[i] / bias2;
            *delta = learning_rate * m_hat / (v_hat.sqrt() + EPSILON);
        }
        deltas
    }
}

impl ParametricRegressor {
    /// Fit a [`LinearModel`] to `training`.
    ///
    /// A single example is accepted; the line through one point is
    /// underdetermined and the optimizer's answer is kept as-is.
    ///
    /// # Errors
    ///
    /// [`ScoringError::EmptyTrainingSet`] for an empty set and
    /// [`ScoringError::Cancelled`] if `cancel` fires between steps.
    pub fn fit(&self, training: &TrainingSet, cancel: &CancellationToken) -> Result<LinearModel> {
        if training.is_empty() {
            return Err(ScoringError::EmptyTrainingSet);
        }

        let mut model = self.initial_model();
        let mut adam = AdamState::new();
        #[allow(clippy::cast_precision_loss)]
        let n = training.len() as f64;

        for iteration in 0..self.iterations {
            if cancel.is_cancelled() {
                debug!("Regressor fit cancelled at step {iteration}");
                return Err(ScoringError::Cancelled);
            }

            let mut grads = [0.0; FEATURE_DIM + 1];
            for example in training.examples() {
                let residual = model.predict(&example.vector) - example.label;
                for (grad, x) in grads.iter_mut().zip(example.vector.values()) {
                    *grad += 2.0 * residual * x / n;
                }
                grads[FEATURE_DIM] += 2.0 * residual / n;
            }

            let deltas = adam.update(&grads, self.learning_rate);
            for (weight, delta) in model.weights.iter_mut().zip(deltas.iter()) {
                *weight -= delta;
            }
            model.bias -= deltas[FEATURE_DIM];

            if iteration % 250 == 0 {
                trace!("step {iteration}: mse {:.6}", model.mse(training));
            }
        }

        debug!(
            "Fitted linear model on {} examples, final mse {:.6}",
            training.len(),
            model.mse(training)
        );
        Ok(model)
    }

    /// Uniform in `[-1/√d, 1/√d]`, the usual fan-in bound for a linear layer.
    fn initial_model(&self) -> LinearModel {
        let mut rng = StdRng::seed_from_u64(self.seed);
        #[allow(clippy::cast_precision_loss)]
        let bound = 1.0 / (FEATURE_DIM as f64).sqrt();

        let mut weights = [0.0; FEATURE_DIM];
        for weight in &mut weights {
            *weight = rng.gen_range(-bound..=bound);
        }
        LinearModel {
            weights,
            bias: rng.gen_range(-bound..=bound),
        }
    }
}
