use rayon::prelude::*;

use super::Optimizer;
use crate::{MlErr, Result, gan::TensorMap};

/// Hyperparameters of the `Adam` optimizer.
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
            learning_rate: 2e-4,
            beta1: 0.5,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Box<[f32]>,
    s: Box<[f32]>,
    epsilon: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `config` - The learning rate, decay rates and epsilon of the algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, config: AdamConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            beta1: config.beta1,
            beta2: config.beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: vec![0.; len].into_boxed_slice(),
            s: vec![0.; len].into_boxed_slice(),
            epsilon: config.epsilon,
        }
    }

    /// Exports the moment estimates and the decay powers under `prefix`.
    pub fn state(&self, prefix: &str, out: &mut TensorMap) {
        out.insert(format!("{prefix}/m"), self.v.to_vec());
        out.insert(format!("{prefix}/v"), self.s.to_vec());
        out.insert(format!("{prefix}/beta1_t"), vec![self.beta1_t]);
        out.insert(format!("{prefix}/beta2_t"), vec![self.beta2_t]);
    }

    /// Replaces the optimizer's state with the tensors stored under `prefix`.
    pub fn load_state(&mut self, prefix: &str, state: &TensorMap) -> Result<()> {
        let v = take(state, &format!("{prefix}/m"), self.v.len())?;
        let s = take(state, &format!("{prefix}/v"), self.s.len())?;
        let beta1_t = take(state, &format!("{prefix}/beta1_t"), 1)?;
        let beta2_t = take(state, &format!("{prefix}/beta2_t"), 1)?;

        self.v.copy_from_slice(v);
        self.s.copy_from_slice(s);
        self.beta1_t = beta1_t[0];
        self.beta2_t = beta2_t[0];
        Ok(())
    }
}

/// Looks up a tensor by name and checks its length.
pub(crate) fn take<'a>(state: &'a TensorMap, name: &str, len: usize) -> Result<&'a [f32]> {
    let tensor = state
        .get(name)
        .ok_or_else(|| MlErr::MissingTensor(name.to_string()))?;

    if tensor.len() != len {
        return Err(MlErr::SizeMismatch {
            what: "restored tensor",
            got: tensor.len(),
            expected: len,
        });
    }

    Ok(tensor)
}

impl Optimizer for Adam {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        if grad.len() != params.len() || params.len() != self.v.len() {
            return Err(MlErr::SizeMismatch {
                what: "optimizer gradient",
                got: grad.len(),
                expected: self.v.len(),
            });
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        params
            .par_iter_mut()
            .zip(grad.par_iter())
            .zip(self.v.par_iter_mut())
            .zip(self.s.par_iter_mut())
            .for_each(|(((p, g), v), s)| {
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g.powi(2);
                *p -= step_size * *v / (s.sqrt() + eps);
            });

        Ok(())
    }
}
