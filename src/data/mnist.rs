use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;
use ndarray::{Array1, Array2};

use super::{Batch, DataErr, DatasetProvider, InMemoryDataset, Partition};

const IMAGES_MAGIC: u32 = 0x0000_0803;
const LABELS_MAGIC: u32 = 0x0000_0801;

const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// MNIST read from the four raw IDX files, pixels scaled into [0, 1].
#[derive(Debug, Clone)]
pub struct MnistDataset {
    train: InMemoryDataset,
    test: InMemoryDataset,
    rows: usize,
    cols: usize,
}

impl MnistDataset {
    /// Opens the MNIST files stored in `dir`.
    ///
    /// # Arguments
    /// * `dir` - The directory holding the IDX files.
    /// * `seed` - The seed of the shuffling, the test partition uses the next one.
    ///
    /// # Returns
    /// The loaded dataset or an error if a file is missing or malformed.
    pub fn open(dir: &Path, seed: u64) -> Result<Self, DataErr> {
        let (train_images, rows, cols) = read_images(&dir.join(TRAIN_IMAGES))?;
        let train_labels = read_labels(&dir.join(TRAIN_LABELS))?;
        let (test_images, test_rows, test_cols) = read_images(&dir.join(TEST_IMAGES))?;
        let test_labels = read_labels(&dir.join(TEST_LABELS))?;

        if (test_rows, test_cols) != (rows, cols) {
            return Err(DataErr::Malformed {
                path: dir.join(TEST_IMAGES),
                reason: format!(
                    "images are {test_rows}x{test_cols} but the train images are {rows}x{cols}"
                ),
            });
        }

        let train = InMemoryDataset::new(train_images, train_labels, seed)?;
        let test = InMemoryDataset::new(test_images, test_labels, seed.wrapping_add(1))?;

        info!(
            train = train.len(),
            test = test.len();
            "loaded MNIST from {} ({rows}x{cols})",
            dir.display()
        );

        Ok(Self {
            train,
            test,
            rows,
            cols,
        })
    }

    /// Image height and width.
    pub fn image_dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn partition(&self, partition: Partition) -> &InMemoryDataset {
        match partition {
            Partition::Train => &self.train,
            Partition::Test => &self.test,
        }
    }
}

impl DatasetProvider for MnistDataset {
    fn n_features(&self) -> usize {
        self.rows * self.cols
    }

    fn next_batch(&mut self, partition: Partition, n: usize) -> Result<Batch, DataErr> {
        match partition {
            Partition::Train => self.train.next_batch(n),
            Partition::Test => self.test.next_batch(n),
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, DataErr> {
    fs::read(path).map_err(|source| DataErr::Unreachable {
        path: path.to_path_buf(),
        source,
    })
}

fn malformed(path: &Path, reason: impl Into<String>) -> DataErr {
    DataErr::Malformed {
        path: PathBuf::from(path),
        reason: reason.into(),
    }
}

/// Reads the big endian `u32` header fields of an IDX file.
fn header<const N: usize>(path: &Path, bytes: &[u8]) -> Result<[u32; N], DataErr> {
    if bytes.len() < N * 4 {
        return Err(malformed(path, format!("truncated header, got {} bytes", bytes.len())));
    }

    let mut fields = [0; N];
    for (field, chunk) in fields.iter_mut().zip(bytes.chunks_exact(4)) {
        *field = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    Ok(fields)
}

fn read_images(path: &Path) -> Result<(Array2<f32>, usize, usize), DataErr> {
    let bytes = read(path)?;
    let [magic, count, rows, cols] = header::<4>(path, &bytes)?;

    if magic != IMAGES_MAGIC {
        return Err(malformed(path, format!("bad magic number {magic:#010x}")));
    }

    let (count, rows, cols) = (count as usize, rows as usize, cols as usize);
    let payload = &bytes[16..];
    let expected = count * rows * cols;
    if payload.len() != expected {
        return Err(malformed(
            path,
            format!("expected {expected} pixel bytes, got {}", payload.len()),
        ));
    }

    let pixels = payload.iter().map(|&p| p as f32 / 255.).collect();
    let images = Array2::from_shape_vec((count, rows * cols), pixels)
        .map_err(|e| malformed(path, e.to_string()))?;

    Ok((images, rows, cols))
}

fn read_labels(path: &Path) -> Result<Array1<u8>, DataErr> {
    let bytes = read(path)?;
    let [magic, count] = header::<2>(path, &bytes)?;

    if magic != LABELS_MAGIC {
        return Err(malformed(path, format!("bad magic number {magic:#010x}")));
    }

    let payload = &bytes[8..];
    if payload.len() != count as usize {
        return Err(malformed(
            path,
            format!("expected {count} labels, got {}", payload.len()),
        ));
    }

    Ok(Array1::from(payload.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idx_images(count: u32, rows: u32, cols: u32, pixels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for field in [IMAGES_MAGIC, count, rows, cols] {
            bytes.extend_from_slice(&field.to_be_bytes());
        }
        bytes.extend_from_slice(pixels);
        bytes
    }

    fn idx_labels(labels: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for field in [LABELS_MAGIC, labels.len() as u32] {
            bytes.extend_from_slice(&field.to_be_bytes());
        }
        bytes.extend_from_slice(labels);
        bytes
    }

    fn write_mnist(dir: &Path) {
        let pixels = [0, 255, 0, 255, 51, 51, 51, 51, 255, 255, 255, 255];
        fs::write(dir.join(TRAIN_IMAGES), idx_images(3, 2, 2, &pixels)).unwrap();
        fs::write(dir.join(TRAIN_LABELS), idx_labels(&[1, 2, 3])).unwrap();
        fs::write(dir.join(TEST_IMAGES), idx_images(2, 2, 2, &[0; 8])).unwrap();
        fs::write(dir.join(TEST_LABELS), idx_labels(&[7, 8])).unwrap();
    }

    #[test]
    fn opens_and_scales_pixels() {
        let dir = tempfile::tempdir().unwrap();
        write_mnist(dir.path());

        let mut mnist = MnistDataset::open(dir.path(), 0).unwrap();

        assert_eq!(mnist.image_dims(), (2, 2));
        assert_eq!(mnist.n_features(), 4);
        assert_eq!(mnist.partition(Partition::Train).len(), 3);
        assert_eq!(mnist.partition(Partition::Test).len(), 2);

        let batch = mnist.next_batch(Partition::Train, 3).unwrap();
        for (row, label) in batch.images.rows().into_iter().zip(batch.labels.iter()) {
            let expected: &[f32] = match label {
                1 => &[0., 1., 0., 1.],
                2 => &[0.2, 0.2, 0.2, 0.2],
                _ => &[1., 1., 1., 1.],
            };
            assert_eq!(row.to_vec(), expected);
        }
    }

    #[test]
    fn missing_directory_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();

        let err = MnistDataset::open(&dir.path().join("nope"), 0).unwrap_err();
        assert!(matches!(err, DataErr::Unreachable { .. }));
    }

    #[test]
    fn bad_magic_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        write_mnist(dir.path());
        fs::write(dir.path().join(TRAIN_LABELS), idx_images(3, 1, 1, &[1, 2, 3])).unwrap();

        let err = MnistDataset::open(dir.path(), 0).unwrap_err();
        assert!(matches!(err, DataErr::Malformed { .. }));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        write_mnist(dir.path());
        fs::write(dir.path().join(TEST_IMAGES), idx_images(2, 2, 2, &[0; 5])).unwrap();

        let err = MnistDataset::open(dir.path(), 0).unwrap_err();
        assert!(matches!(err, DataErr::Malformed { .. }));
    }

    #[test]
    fn label_count_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_mnist(dir.path());
        fs::write(dir.path().join(TRAIN_LABELS), idx_labels(&[1, 2])).unwrap();

        let err = MnistDataset::open(dir.path(), 0).unwrap_err();
        assert!(matches!(err, DataErr::Inconsistent { images: 3, labels: 2 }));
    }
}
