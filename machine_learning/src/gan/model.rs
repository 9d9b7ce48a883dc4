use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2};

use crate::Result;

/// Named flat tensors making up a model's persistent state.
pub type TensorMap = BTreeMap<String, Vec<f32>>;

/// The static shapes a GAN exposes to whoever drives its training.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDims {
    pub batch_size: usize,
    pub z_dim: usize,
    pub n_input: usize,
    pub sample_num: usize,
    pub sample_size: usize,
    pub height: usize,
    pub width: usize,
    pub channel: usize,
}

/// Discriminator and generator losses computed over the same batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Losses {
    pub d_loss: f32,
    pub g_loss: f32,
}

/// A generative adversarial network that can be trained one step at a time.
///
/// `x` is a batch of real samples, one flattened image per row, and `z` a batch of noise with
/// `z_dim` columns. Both must have the same amount of rows.
pub trait GanModel {
    /// Returns the model's dimensions.
    fn dims(&self) -> ModelDims;

    /// Runs one optimization step on the discriminator's objective.
    ///
    /// # Returns
    /// The discriminator loss measured before the update.
    fn d_step(&mut self, x: ArrayView2<f32>, z: ArrayView2<f32>) -> Result<f32>;

    /// Runs one optimization step on the generator's objective.
    ///
    /// # Returns
    /// The generator loss measured before the update.
    fn g_step(&mut self, x: ArrayView2<f32>, z: ArrayView2<f32>) -> Result<f32>;

    /// Computes both losses without updating any parameter.
    fn losses(&mut self, x: ArrayView2<f32>, z: ArrayView2<f32>) -> Result<Losses>;

    /// Maps noise into generated samples, one flattened image per row.
    fn generate(&mut self, z: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Exports every tensor needed to resume training, optimizer state included.
    fn state(&self) -> TensorMap;

    /// Replaces the model's state, loading the same state twice yields the same model.
    fn load_state(&mut self, state: &TensorMap) -> Result<()>;
}
