use ndarray::{Array1, Array2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Batch, DataErr};

/// A partition held in memory, served in shuffled epochs.
///
/// When an epoch runs out mid-batch, the batch is completed with the start of a freshly
/// shuffled epoch.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    images: Array2<f32>,
    labels: Array1<u8>,
    order: Vec<usize>,
    cursor: usize,
    epoch: usize,
    rng: StdRng,
}

impl InMemoryDataset {
    /// Creates a new `InMemoryDataset`.
    ///
    /// # Arguments
    /// * `images` - One flattened image per row.
    /// * `labels` - One label per image.
    /// * `seed` - The seed of the epoch shuffling.
    ///
    /// # Returns
    /// A new dataset or an error if it's empty or the labels don't match the images.
    pub fn new(images: Array2<f32>, labels: Array1<u8>, seed: u64) -> Result<Self, DataErr> {
        if images.nrows() != labels.len() {
            return Err(DataErr::Inconsistent {
                images: images.nrows(),
                labels: labels.len(),
            });
        }

        if images.is_empty() {
            return Err(DataErr::Empty);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..images.nrows()).collect();
        order.shuffle(&mut rng);

        Ok(Self {
            images,
            labels,
            order,
            cursor: 0,
            epoch: 0,
            rng,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.images.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.images.ncols()
    }

    /// Amount of epochs fully consumed so far.
    #[inline]
    pub fn epoch(&self) -> usize {
        self.epoch
    }

    /// Returns the next `n` samples in shuffled order.
    pub fn next_batch(&mut self, n: usize) -> Result<Batch, DataErr> {
        if n > self.len() {
            return Err(DataErr::BatchTooLarge {
                requested: n,
                available: self.len(),
            });
        }

        let mut indices = Vec::with_capacity(n);
        while indices.len() < n {
            if self.cursor == self.order.len() {
                self.order.shuffle(&mut self.rng);
                self.cursor = 0;
                self.epoch += 1;
            }

            let take = (n - indices.len()).min(self.order.len() - self.cursor);
            indices.extend_from_slice(&self.order[self.cursor..self.cursor + take]);
            self.cursor += take;
        }

        Ok(Batch {
            images: self.images.select(Axis(0), &indices),
            labels: self.labels.select(Axis(0), &indices),
        })
    }
}
