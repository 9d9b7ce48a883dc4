use std::num::NonZeroUsize;

use log::{debug, info};
use ndarray::Array2;
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use rand::{SeedableRng, rngs::StdRng};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{Result, TrainErr};

/// The independent noise sources drawn from at a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseStream {
    Train = 0,
    Eval = 1,
    Sample = 2,
}

/// The compute session every model call runs in: a dedicated thread pool and the seed all the
/// noise derives from.
///
/// Released with `close` once training finishes, or on drop when a run aborts.
#[derive(Debug)]
pub struct ComputeContext {
    pool: Option<ThreadPool>,
    seed: u64,
    noise: Uniform<f32>,
}

impl ComputeContext {
    /// Creates a new `ComputeContext`.
    ///
    /// # Arguments
    /// * `threads` - The size of the pool, one thread per core if `None`.
    /// * `seed` - The seed of every noise batch.
    ///
    /// # Returns
    /// A new context or an error if the pool can't be built.
    pub fn new(threads: Option<NonZeroUsize>, seed: u64) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("gan-compute-{i}"));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads.get());
        }

        let pool = builder
            .build()
            .map_err(|e| TrainErr::Context(e.to_string()))?;
        let noise = Uniform::new_inclusive(-1., 1.).map_err(|e| TrainErr::Context(e.to_string()))?;

        info!(threads = pool.current_num_threads(), seed = seed; "compute context acquired");

        Ok(Self {
            pool: Some(pool),
            seed,
            noise,
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs `op` inside the context's thread pool.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Draws a `rows x cols` batch of uniform noise in [-1, 1].
    ///
    /// The same step and stream always yield the same noise, whichever step a run started at.
    pub fn noise(&self, step: usize, stream: NoiseStream, rows: usize, cols: usize) -> Array2<f32> {
        let seed = self
            .seed
            .wrapping_add(((step as u64) << 2) | stream as u64);
        let mut rng = StdRng::seed_from_u64(seed);

        Array2::random_using((rows, cols), &self.noise, &mut rng)
    }

    /// Releases the thread pool.
    pub fn close(mut self) {
        if self.pool.take().is_some() {
            info!("compute context closed");
        }
    }
}

impl Drop for ComputeContext {
    fn drop(&mut self) {
        if self.pool.take().is_some() {
            debug!("compute context released on drop");
        }
    }
}
