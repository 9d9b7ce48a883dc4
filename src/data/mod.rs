mod dataset;
mod error;
mod mnist;

pub use dataset::InMemoryDataset;
pub use error::DataErr;
pub use mnist::MnistDataset;

use ndarray::{Array1, Array2};

/// The dataset split a batch is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    Train,
    Test,
}

/// A mini-batch: one flattened image per row and its label.
#[derive(Debug, Clone)]
pub struct Batch {
    pub images: Array2<f32>,
    pub labels: Array1<u8>,
}

impl Batch {
    #[inline]
    pub fn len(&self) -> usize {
        self.images.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A source of shuffled mini-batches.
pub trait DatasetProvider {
    /// The amount of features of every flattened image.
    fn n_features(&self) -> usize;

    /// Draws the next `n` samples of `partition`.
    fn next_batch(&mut self, partition: Partition, n: usize) -> Result<Batch, DataErr>;
}
