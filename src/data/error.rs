use std::{error::Error, fmt, io, path::PathBuf};

#[derive(Debug)]
pub enum DataErr {
    Unreachable {
        path: PathBuf,
        source: io::Error,
    },
    Malformed {
        path: PathBuf,
        reason: String,
    },
    Inconsistent {
        images: usize,
        labels: usize,
    },
    Empty,
    BatchTooLarge {
        requested: usize,
        available: usize,
    },
    FeatureMismatch {
        got: usize,
        expected: usize,
    },
}

impl fmt::Display for DataErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataErr::Unreachable { path, source } => {
                write!(f, "dataset file {} is unreachable: {source}", path.display())
            }
            DataErr::Malformed { path, reason } => {
                write!(f, "dataset file {} is malformed: {reason}", path.display())
            }
            DataErr::Inconsistent { images, labels } => {
                write!(f, "got {images} images but {labels} labels")
            }
            DataErr::Empty => write!(f, "the dataset partition is empty"),
            DataErr::BatchTooLarge {
                requested,
                available,
            } => write!(
                f,
                "requested a batch of {requested} samples from a partition of {available}"
            ),
            DataErr::FeatureMismatch { got, expected } => write!(
                f,
                "the dataset yields {got} features per sample but the model expects {expected}"
            ),
        }
    }
}

impl Error for DataErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DataErr::Unreachable { source, .. } => Some(source),
            _ => None,
        }
    }
}
