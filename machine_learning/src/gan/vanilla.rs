use std::{cell::RefCell, rc::Rc};

use ndarray::{Array2, ArrayView2};
use rand::{SeedableRng, rngs::StdRng};

use super::{GanModel, Losses, ModelDims, TensorMap};
use crate::{
    MlErr, Result,
    arch::{
        Sequential,
        activations::ActFn,
        layers::Dense,
        loss::{BceWithLogits, LossFn},
    },
    initialization,
    optimization::{self, Adam, AdamConfig, Optimizer},
};

/// Hyperparameters of a `VanillaGan`.
#[derive(Debug, Clone, PartialEq)]
pub struct GanConfig {
    pub batch_size: usize,
    pub z_dim: usize,
    pub height: usize,
    pub width: usize,
    pub channel: usize,
    pub sample_num: usize,
    pub fc_unit: usize,
    pub leak: f32,
    pub d_optimizer: AdamConfig,
    pub g_optimizer: AdamConfig,
}

impl Default for GanConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            z_dim: 128,
            height: 28,
            width: 28,
            channel: 1,
            sample_num: 64,
            fc_unit: 256,
            leak: 0.2,
            d_optimizer: AdamConfig::default(),
            g_optimizer: AdamConfig::default(),
        }
    }
}

/// A fully connected GAN.
///
/// * generator: `z_dim -> fc_unit (leaky relu) -> n_input (sigmoid)`
/// * discriminator: `n_input -> fc_unit (leaky relu) -> 1 (logit)`
pub struct VanillaGan {
    dims: ModelDims,
    loss_fn: BceWithLogits,

    generator: Sequential,
    g_params: Vec<f32>,
    g_grad: Vec<f32>,
    g_opt: Adam,

    discriminator: Sequential,
    d_params: Vec<f32>,
    d_grad: Vec<f32>,
    d_scratch: Vec<f32>,
    d_opt: Adam,
}

impl VanillaGan {
    /// Creates a new `VanillaGan` with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `config` - The model's hyperparameters.
    /// * `seed` - The seed for the parameter initialization.
    ///
    /// # Returns
    /// A new `VanillaGan` or an error if the configuration is invalid.
    pub fn new(config: GanConfig, seed: u64) -> Result<Self> {
        let dims = validate(&config)?;

        let generator = Sequential::new([
            Dense::new((dims.z_dim, config.fc_unit), Some(ActFn::leaky_relu(config.leak))),
            Dense::new((config.fc_unit, dims.n_input), Some(ActFn::sigmoid(1.))),
        ]);
        let discriminator = Sequential::new([
            Dense::new((dims.n_input, config.fc_unit), Some(ActFn::leaky_relu(config.leak))),
            Dense::new((config.fc_unit, 1), None),
        ]);

        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(seed)));
        let g_params = initialization::xavier_params(&generator, &rng)?;
        let d_params = initialization::xavier_params(&discriminator, &rng)?;

        let g_size = generator.size();
        let d_size = discriminator.size();

        Ok(Self {
            dims,
            loss_fn: BceWithLogits::new(),
            generator,
            g_params,
            g_grad: vec![0.; g_size],
            g_opt: Adam::new(g_size, config.g_optimizer),
            discriminator,
            d_params,
            d_grad: vec![0.; d_size],
            d_scratch: vec![0.; d_size],
            d_opt: Adam::new(d_size, config.d_optimizer),
        })
    }

    pub fn generator_params(&self) -> &[f32] {
        &self.g_params
    }

    pub fn discriminator_params(&self) -> &[f32] {
        &self.d_params
    }

    fn check_batch(&self, x: ArrayView2<f32>, z: ArrayView2<f32>) -> Result<()> {
        if x.ncols() != self.dims.n_input {
            return Err(MlErr::SizeMismatch {
                what: "real batch width",
                got: x.ncols(),
                expected: self.dims.n_input,
            });
        }

        if x.nrows() != z.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "noise batch rows",
                got: z.nrows(),
                expected: x.nrows(),
            });
        }

        self.check_noise(z)
    }

    fn check_noise(&self, z: ArrayView2<f32>) -> Result<()> {
        if z.ncols() != self.dims.z_dim {
            return Err(MlErr::SizeMismatch {
                what: "noise width",
                got: z.ncols(),
                expected: self.dims.z_dim,
            });
        }

        Ok(())
    }
}

impl GanModel for VanillaGan {
    fn dims(&self) -> ModelDims {
        self.dims
    }

    fn d_step(&mut self, x: ArrayView2<f32>, z: ArrayView2<f32>) -> Result<f32> {
        self.check_batch(x, z)?;

        let fake = self.generator.forward(&self.g_params, z)?;

        let real_logits = self.discriminator.forward(&self.d_params, x)?;
        let ones = Array2::ones(real_logits.raw_dim());
        let real_loss = self.loss_fn.loss(real_logits.view(), ones.view());
        let d = self.loss_fn.loss_prime(real_logits.view(), ones.view());
        self.discriminator.backward(&self.d_params, &mut self.d_grad, d)?;

        let fake_logits = self.discriminator.forward(&self.d_params, fake.view())?;
        let zeros = Array2::zeros(fake_logits.raw_dim());
        let fake_loss = self.loss_fn.loss(fake_logits.view(), zeros.view());
        let d = self.loss_fn.loss_prime(fake_logits.view(), zeros.view());
        self.discriminator.backward(&self.d_params, &mut self.d_scratch, d)?;

        let d_loss = check_finite("discriminator loss", real_loss + fake_loss)?;

        for (g, s) in self.d_grad.iter_mut().zip(&self.d_scratch) {
            *g += s;
        }
        self.d_opt.update_params(&mut self.d_params, &self.d_grad)?;

        Ok(d_loss)
    }

    fn g_step(&mut self, x: ArrayView2<f32>, z: ArrayView2<f32>) -> Result<f32> {
        self.check_batch(x, z)?;

        let fake = self.generator.forward(&self.g_params, z)?;
        let logits = self.discriminator.forward(&self.d_params, fake.view())?;
        let ones = Array2::ones(logits.raw_dim());
        let g_loss = check_finite("generator loss", self.loss_fn.loss(logits.view(), ones.view()))?;

        // The discriminator's gradient is only needed to reach the generator's output.
        let d = self.loss_fn.loss_prime(logits.view(), ones.view());
        let d_fake = self
            .discriminator
            .backward(&self.d_params, &mut self.d_scratch, d)?;
        self.generator.backward(&self.g_params, &mut self.g_grad, d_fake)?;
        self.g_opt.update_params(&mut self.g_params, &self.g_grad)?;

        Ok(g_loss)
    }

    fn losses(&mut self, x: ArrayView2<f32>, z: ArrayView2<f32>) -> Result<Losses> {
        self.check_batch(x, z)?;

        let fake = self.generator.forward(&self.g_params, z)?;
        let real_logits = self.discriminator.forward(&self.d_params, x)?;
        let fake_logits = self.discriminator.forward(&self.d_params, fake.view())?;

        let ones = Array2::ones(real_logits.raw_dim());
        let zeros = Array2::zeros(fake_logits.raw_dim());
        let d_loss = self.loss_fn.loss(real_logits.view(), ones.view())
            + self.loss_fn.loss(fake_logits.view(), zeros.view());
        let g_loss = self.loss_fn.loss(fake_logits.view(), ones.view());

        Ok(Losses {
            d_loss: check_finite("discriminator loss", d_loss)?,
            g_loss: check_finite("generator loss", g_loss)?,
        })
    }

    fn generate(&mut self, z: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_noise(z)?;
        self.generator.forward(&self.g_params, z)
    }

    fn state(&self) -> TensorMap {
        let mut state = TensorMap::new();
        state.insert("generator/params".into(), self.g_params.clone());
        state.insert("discriminator/params".into(), self.d_params.clone());
        self.g_opt.state("generator/adam", &mut state);
        self.d_opt.state("discriminator/adam", &mut state);
        state
    }

    fn load_state(&mut self, state: &TensorMap) -> Result<()> {
        let g_params = optimization::take(state, "generator/params", self.g_params.len())?;
        let d_params = optimization::take(state, "discriminator/params", self.d_params.len())?;

        // Validate both optimizers before touching anything so a bad state leaves the model as is.
        let mut g_opt = self.g_opt.clone();
        let mut d_opt = self.d_opt.clone();
        g_opt.load_state("generator/adam", state)?;
        d_opt.load_state("discriminator/adam", state)?;

        self.g_params.copy_from_slice(g_params);
        self.d_params.copy_from_slice(d_params);
        self.g_opt = g_opt;
        self.d_opt = d_opt;
        Ok(())
    }
}

fn check_finite(which: &'static str, value: f32) -> Result<f32> {
    if !value.is_finite() {
        return Err(MlErr::NonFiniteLoss { which, value });
    }

    Ok(value)
}

fn validate(config: &GanConfig) -> Result<ModelDims> {
    let sizes = [
        ("batch_size", config.batch_size),
        ("z_dim", config.z_dim),
        ("height", config.height),
        ("width", config.width),
        ("channel", config.channel),
        ("sample_num", config.sample_num),
        ("fc_unit", config.fc_unit),
    ];

    if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0) {
        return Err(MlErr::InvalidConfig(format!("{name} must be greater than 0")));
    }

    let sample_size = config.sample_num.isqrt();
    if sample_size * sample_size != config.sample_num {
        return Err(MlErr::InvalidConfig(format!(
            "sample_num ({}) must be a perfect square to fill the sample grid",
            config.sample_num
        )));
    }

    Ok(ModelDims {
        batch_size: config.batch_size,
        z_dim: config.z_dim,
        n_input: config.height * config.width * config.channel,
        sample_num: config.sample_num,
        sample_size,
        height: config.height,
        width: config.width,
        channel: config.channel,
    })
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    fn tiny_config() -> GanConfig {
        GanConfig {
            batch_size: 4,
            z_dim: 3,
            height: 2,
            width: 2,
            channel: 1,
            sample_num: 4,
            fc_unit: 5,
            ..Default::default()
        }
    }

    fn batch(rows: usize, cols: usize, seed: u64) -> Array2<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_simple_fn((rows, cols), || rng.random_range(0.0..1.0))
    }

    #[test]
    fn default_dims_follow_mnist() {
        let gan = VanillaGan::new(GanConfig::default(), 0).unwrap();
        let dims = gan.dims();

        assert_eq!(dims.n_input, 784);
        assert_eq!(dims.sample_size, 8);
        assert_eq!(dims.z_dim, 128);
    }

    #[test]
    fn same_seed_gives_same_parameters() {
        let a = VanillaGan::new(tiny_config(), 3).unwrap();
        let b = VanillaGan::new(tiny_config(), 3).unwrap();

        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn d_step_only_updates_the_discriminator() {
        let mut gan = VanillaGan::new(tiny_config(), 1).unwrap();
        let g_before = gan.generator_params().to_vec();
        let d_before = gan.discriminator_params().to_vec();

        let loss = gan.d_step(batch(4, 4, 1).view(), batch(4, 3, 2).view()).unwrap();

        assert!(loss > 0.);
        assert_eq!(gan.generator_params(), g_before.as_slice());
        assert_ne!(gan.discriminator_params(), d_before.as_slice());
    }

    #[test]
    fn g_step_only_updates_the_generator() {
        let mut gan = VanillaGan::new(tiny_config(), 1).unwrap();
        let g_before = gan.generator_params().to_vec();
        let d_before = gan.discriminator_params().to_vec();

        gan.g_step(batch(4, 4, 1).view(), batch(4, 3, 2).view()).unwrap();

        assert_ne!(gan.generator_params(), g_before.as_slice());
        assert_eq!(gan.discriminator_params(), d_before.as_slice());
    }

    #[test]
    fn repeated_d_steps_lower_the_discriminator_loss() {
        let config = GanConfig {
            d_optimizer: AdamConfig {
                learning_rate: 1e-2,
                ..Default::default()
            },
            ..tiny_config()
        };
        let mut gan = VanillaGan::new(config, 5).unwrap();
        let x = batch(4, 4, 10);
        let z = batch(4, 3, 11);

        let first = gan.losses(x.view(), z.view()).unwrap().d_loss;
        for _ in 0..200 {
            gan.d_step(x.view(), z.view()).unwrap();
        }
        let last = gan.losses(x.view(), z.view()).unwrap().d_loss;

        assert!(last < first, "d_loss went from {first} to {last}");
    }

    #[test]
    fn losses_do_not_update_parameters() {
        let mut gan = VanillaGan::new(tiny_config(), 1).unwrap();
        let before = gan.state();

        gan.losses(batch(4, 4, 1).view(), batch(4, 3, 2).view()).unwrap();

        assert_eq!(gan.state(), before);
    }

    #[test]
    fn generate_yields_one_image_per_noise_row() {
        let mut gan = VanillaGan::new(tiny_config(), 1).unwrap();

        let samples = gan.generate(batch(4, 3, 2).view()).unwrap();

        assert_eq!(samples.dim(), (4, 4));
        assert!(samples.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn load_state_is_idempotent() {
        let mut trained = VanillaGan::new(tiny_config(), 1).unwrap();
        trained.d_step(batch(4, 4, 1).view(), batch(4, 3, 2).view()).unwrap();
        trained.g_step(batch(4, 4, 1).view(), batch(4, 3, 2).view()).unwrap();
        let state = trained.state();

        let mut restored = VanillaGan::new(tiny_config(), 99).unwrap();
        restored.load_state(&state).unwrap();
        assert_eq!(restored.state(), state);

        restored.load_state(&state).unwrap();
        assert_eq!(restored.state(), state);
    }

    #[test]
    fn truncated_state_leaves_the_model_untouched() {
        let mut gan = VanillaGan::new(tiny_config(), 1).unwrap();
        let before = gan.state();

        let mut state = before.clone();
        state.insert("generator/params".into(), vec![1.; 3]);
        state.remove("discriminator/adam/v");
        assert!(gan.load_state(&state).is_err());

        let mut state = before.clone();
        state.remove("discriminator/adam/v");
        assert!(matches!(gan.load_state(&state), Err(MlErr::MissingTensor(_))));

        assert_eq!(gan.state(), before);
    }

    #[test]
    fn wrong_noise_width_is_rejected() {
        let mut gan = VanillaGan::new(tiny_config(), 1).unwrap();

        let err = gan.g_step(batch(4, 4, 1).view(), batch(4, 2, 2).view()).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { what: "noise width", .. }));
    }

    #[test]
    fn non_square_sample_grid_is_rejected() {
        let config = GanConfig {
            sample_num: 10,
            ..tiny_config()
        };

        assert!(matches!(VanillaGan::new(config, 0), Err(MlErr::InvalidConfig(_))));
    }
}
