use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    NonFiniteLoss {
        which: &'static str,
        value: f32,
    },
    MissingTensor(String),
    InvalidConfig(String),
    InvalidDistribution(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::NonFiniteLoss { which, value } => {
                write!(f, "The {which} is not finite, got {value}")
            }
            MlErr::MissingTensor(name) => {
                write!(f, "The model state is missing the `{name}` tensor")
            }
            MlErr::InvalidConfig(msg) => write!(f, "Invalid model configuration: {msg}"),
            MlErr::InvalidDistribution(msg) => {
                write!(f, "Failed to build the sampling distribution: {msg}")
            }
        }
    }
}

impl Error for MlErr {}

impl From<rand_distr::uniform::Error> for MlErr {
    fn from(value: rand_distr::uniform::Error) -> Self {
        Self::InvalidDistribution(value.to_string())
    }
}

impl From<ndarray::ShapeError> for MlErr {
    fn from(value: ndarray::ShapeError) -> Self {
        Self::InvalidConfig(value.to_string())
    }
}
