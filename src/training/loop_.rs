use std::{io::Write, num::NonZeroUsize, path::PathBuf, time::Instant};

use log::{debug, info};
use machine_learning::{GanModel, MlErr};

use super::{ComputeContext, LoggingSchedule, LoopState, NoiseStream, TrainMetrics};
use crate::{
    Result, TrainErr,
    checkpoint::CheckpointStore,
    data::{DataErr, DatasetProvider, Partition},
    export::ImageExporter,
    summary::{SummaryRecord, SummaryWriter},
};

/// The loop's execution bounds and artifact locations.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub total_steps: usize,
    pub schedule: LoggingSchedule,
    pub output: PathBuf,
}

impl LoopConfig {
    /// Creates a new `LoopConfig`.
    ///
    /// # Arguments
    /// * `total_steps` - The step the loop stops at, exclusive.
    /// * `logging_interval` - The cadence of evaluation, sample export and checkpointing.
    /// * `output` - The directory receiving the sample grids.
    pub fn new(total_steps: usize, logging_interval: NonZeroUsize, output: PathBuf) -> Self {
        Self {
            total_steps,
            schedule: LoggingSchedule::new(logging_interval),
            output,
        }
    }
}

/// Drives the adversarial training of a `GanModel`.
///
/// Every step trains the discriminator (unless it's overpowered) and then the generator on the
/// same batch. Every `logging_interval` steps the losses are re-evaluated on the test partition,
/// a sample grid is exported and a checkpoint is saved. A run resumes right after the latest
/// checkpoint.
pub struct TrainingLoop<M, D, S, E, W: Write> {
    cfg: LoopConfig,
    model: M,
    dataset: D,
    store: S,
    exporter: E,
    summary: SummaryWriter<W>,
    state: LoopState,
    metrics: TrainMetrics,
}

impl<M, D, S, E, W> TrainingLoop<M, D, S, E, W>
where
    M: GanModel + Send,
    D: DatasetProvider,
    S: CheckpointStore,
    E: ImageExporter,
    W: Write,
{
    /// Creates a new `TrainingLoop`.
    ///
    /// # Returns
    /// A new loop or an error if the dataset's images don't fit the model's input.
    pub fn new(
        cfg: LoopConfig,
        model: M,
        dataset: D,
        store: S,
        exporter: E,
        summary: SummaryWriter<W>,
    ) -> Result<Self> {
        let expected = model.dims().n_input;
        let got = dataset.n_features();
        if got != expected {
            return Err(DataErr::FeatureMismatch { got, expected }.into());
        }

        Ok(Self {
            cfg,
            model,
            dataset,
            store,
            exporter,
            summary,
            state: LoopState::fresh(),
            metrics: TrainMetrics::default(),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn metrics(&self) -> &TrainMetrics {
        &self.metrics
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Restores the model from the latest checkpoint, if any.
    ///
    /// # Returns
    /// The step the loop continues at or an error if the checkpoint metadata is malformed or
    /// the state doesn't fit the model.
    pub fn resume(&mut self) -> Result<usize> {
        let Some(record) = self.store.get_latest()? else {
            self.state = LoopState::fresh();
            info!("no checkpoint found, starting from step 0");
            return Ok(self.state.step);
        };

        let tensors = self.store.restore(&record)?;
        self.model
            .load_state(&tensors)
            .map_err(|source| TrainErr::Model {
                step: record.step,
                source,
            })?;

        self.state = LoopState::resumed(&record);
        info!(step = record.step; "resumed from {}", record.path.display());
        Ok(self.state.step)
    }

    /// Runs the loop from the latest checkpoint up to the configured total.
    ///
    /// # Arguments
    /// * `ctx` - The compute context every model call runs in.
    ///
    /// # Returns
    /// The run's metrics or the first error, which aborts the run.
    pub fn run(&mut self, ctx: &ComputeContext) -> Result<TrainMetrics> {
        let start = Instant::now();
        self.resume()?;

        while self.state.step < self.cfg.total_steps {
            let step = self.state.step;
            self.train_step(ctx, step)?;

            if self.cfg.schedule.should_log(step) {
                self.evaluate(ctx, step)?;
            }

            self.state.advance();
        }

        self.metrics.elapsed = start.elapsed();
        info!(
            d_updates = self.metrics.d_updates,
            d_skips = self.metrics.d_skips,
            g_updates = self.metrics.g_updates;
            "training finished at step {}",
            self.state.step
        );

        Ok(self.metrics.clone())
    }

    fn train_step(&mut self, ctx: &ComputeContext, step: usize) -> Result<()> {
        let dims = self.model.dims();
        let batch = self.dataset.next_batch(Partition::Train, dims.batch_size)?;
        let z = ctx.noise(step, NoiseStream::Train, dims.batch_size, dims.z_dim);
        let (x, z) = (batch.images.view(), z.view());

        let model = &mut self.model;
        let model_err = |source: MlErr| TrainErr::Model { step, source };

        if self.state.d_overpowered {
            self.metrics.bump_d_skip();
            debug!(step = step; "discriminator overpowered, skipping its update");
        } else {
            let d_loss = ctx.install(|| model.d_step(x, z)).map_err(model_err)?;
            self.state.record_d_loss(d_loss);
            self.metrics.bump_d_update();
        }

        let g_loss = ctx.install(|| model.g_step(x, z)).map_err(model_err)?;
        self.state.record_g_loss(g_loss);
        self.metrics.bump_g_update();

        self.state.update_flag();
        Ok(())
    }

    fn evaluate(&mut self, ctx: &ComputeContext, step: usize) -> Result<()> {
        let dims = self.model.dims();
        let model = &mut self.model;
        let model_err = |source: MlErr| TrainErr::Model { step, source };

        let batch = self.dataset.next_batch(Partition::Test, dims.batch_size)?;
        let z = ctx.noise(step, NoiseStream::Eval, dims.batch_size, dims.z_dim);
        let losses = ctx
            .install(|| model.losses(batch.images.view(), z.view()))
            .map_err(model_err)?;
        self.state.apply_eval(losses);

        info!(
            "Step {step:08} => D loss : {:.8} G loss : {:.8}",
            self.state.d_loss, self.state.g_loss
        );

        self.summary
            .append(&SummaryRecord {
                step,
                d_loss: self.state.d_loss,
                g_loss: self.state.g_loss,
                d_overpowered: self.state.d_overpowered,
            })
            .map_err(TrainErr::Summary)?;

        let z = ctx.noise(step, NoiseStream::Sample, dims.sample_num, dims.z_dim);
        let samples = ctx
            .install(|| model.generate(z.view()))
            .map_err(model_err)?;
        let samples = samples
            .into_shape_with_order((dims.sample_num, dims.height, dims.width, dims.channel))
            .map_err(TrainErr::SampleShape)?;

        let path = self.cfg.output.join(format!("train_{step:08}.png"));
        self.exporter.save_grid(
            samples.view(),
            (dims.sample_size, dims.sample_size),
            &path,
        )?;

        self.store.save(&self.state.snapshot(), &self.model.state())?;
        self.metrics.bump_evaluation();
        Ok(())
    }
}
