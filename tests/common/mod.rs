#![allow(dead_code)]

use std::{
    cell::RefCell,
    fs::File,
    io::BufWriter,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    rc::Rc,
};

use gan_training::{
    data::{Batch, DataErr, DatasetProvider, Partition},
    export::{ExportErr, ImageExporter},
    summary::SummaryWriter,
    training::{ComputeContext, LoopConfig},
};
use machine_learning::{GanModel, Losses, MlErr, ModelDims, Result as MlResult, TensorMap};
use ndarray::{Array1, Array2, ArrayView2, ArrayView4};

pub fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

pub fn ctx() -> ComputeContext {
    ComputeContext::new(Some(nz(2)), 7).unwrap()
}

pub fn loop_config(total_steps: usize, interval: usize, output: &Path) -> LoopConfig {
    LoopConfig::new(total_steps, nz(interval), output.to_path_buf())
}

pub fn summary(dir: &Path) -> SummaryWriter<BufWriter<File>> {
    SummaryWriter::create(&dir.join("summary.jsonl")).unwrap()
}

/// Serves the same batch forever, from either partition.
pub struct FixedDataset {
    images: Array2<f32>,
}

impl FixedDataset {
    pub fn new(rows: usize, features: usize) -> Self {
        let images = Array2::from_shape_fn((rows, features), |(i, j)| {
            ((i * features + j) % 7) as f32 / 6.
        });
        Self { images }
    }
}

impl DatasetProvider for FixedDataset {
    fn n_features(&self) -> usize {
        self.images.ncols()
    }

    fn next_batch(&mut self, _partition: Partition, n: usize) -> Result<Batch, DataErr> {
        if n != self.images.nrows() {
            return Err(DataErr::BatchTooLarge {
                requested: n,
                available: self.images.nrows(),
            });
        }

        Ok(Batch {
            images: self.images.clone(),
            labels: Array1::zeros(n),
        })
    }
}

/// Remembers every grid it was asked to write without touching the disk.
#[derive(Default, Clone)]
pub struct RecordingExporter {
    pub paths: Rc<RefCell<Vec<PathBuf>>>,
}

impl ImageExporter for RecordingExporter {
    fn save_grid(
        &mut self,
        images: ArrayView4<f32>,
        grid_size: (usize, usize),
        path: &Path,
    ) -> Result<(), ExportErr> {
        assert_eq!(images.dim(), (4, 2, 2, 1));
        assert_eq!(grid_size, (2, 2));
        self.paths.borrow_mut().push(path.to_path_buf());
        Ok(())
    }
}

/// A model reporting scripted losses.
///
/// It tracks the overpowered flag the way the loop should and fails any discriminator update
/// requested while the flag is set.
pub struct StubModel {
    pub train: Losses,
    pub eval: Losses,
    pub fail_at_g_call: Option<usize>,

    pub d_calls: usize,
    pub g_calls: usize,
    pub eval_calls: usize,

    last: Losses,
}

impl StubModel {
    pub const N_INPUT: usize = 4;

    pub fn new(train: Losses, eval: Losses) -> Self {
        Self {
            train,
            eval,
            fail_at_g_call: None,
            d_calls: 0,
            g_calls: 0,
            eval_calls: 0,
            last: Losses {
                d_loss: 0.,
                g_loss: 0.,
            },
        }
    }

    fn overpowered(&self) -> bool {
        self.last.d_loss < self.last.g_loss / 2.
    }
}

pub fn losses(d_loss: f32, g_loss: f32) -> Losses {
    Losses { d_loss, g_loss }
}

impl GanModel for StubModel {
    fn dims(&self) -> ModelDims {
        ModelDims {
            batch_size: 2,
            z_dim: 2,
            n_input: Self::N_INPUT,
            sample_num: 4,
            sample_size: 2,
            height: 2,
            width: 2,
            channel: 1,
        }
    }

    fn d_step(&mut self, _x: ArrayView2<f32>, _z: ArrayView2<f32>) -> MlResult<f32> {
        if self.overpowered() {
            return Err(MlErr::InvalidConfig(
                "discriminator updated while overpowered".into(),
            ));
        }

        self.d_calls += 1;
        self.last.d_loss = self.train.d_loss;
        Ok(self.train.d_loss)
    }

    fn g_step(&mut self, _x: ArrayView2<f32>, _z: ArrayView2<f32>) -> MlResult<f32> {
        if self.fail_at_g_call == Some(self.g_calls) {
            return Err(MlErr::NonFiniteLoss {
                which: "generator loss",
                value: f32::NAN,
            });
        }

        self.g_calls += 1;
        self.last.g_loss = self.train.g_loss;
        Ok(self.train.g_loss)
    }

    fn losses(&mut self, _x: ArrayView2<f32>, _z: ArrayView2<f32>) -> MlResult<Losses> {
        self.eval_calls += 1;
        self.last = self.eval;
        Ok(self.eval)
    }

    fn generate(&mut self, z: ArrayView2<f32>) -> MlResult<Array2<f32>> {
        Ok(Array2::zeros((z.nrows(), Self::N_INPUT)))
    }

    fn state(&self) -> TensorMap {
        TensorMap::from([("stub/g_calls".to_string(), vec![self.g_calls as f32])])
    }

    fn load_state(&mut self, state: &TensorMap) -> MlResult<()> {
        let calls = state
            .get("stub/g_calls")
            .ok_or_else(|| MlErr::MissingTensor("stub/g_calls".into()))?;
        self.g_calls = calls[0] as usize;
        Ok(())
    }
}
