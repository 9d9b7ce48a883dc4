use std::{error::Error, fmt, io};

use machine_learning::MlErr;

use crate::{checkpoint::CheckpointErr, config::ConfigErr, data::DataErr, export::ExportErr};

/// The training driver's result type.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// Every failure that stops a training run.
#[derive(Debug)]
pub enum TrainErr {
    Config(ConfigErr),
    Data(DataErr),
    Checkpoint(CheckpointErr),
    Export(ExportErr),
    Summary(io::Error),
    Model { step: usize, source: MlErr },
    SampleShape(ndarray::ShapeError),
    Context(String),
}

impl fmt::Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainErr::Config(e) => write!(f, "configuration error: {e}"),
            TrainErr::Data(e) => write!(f, "dataset error: {e}"),
            TrainErr::Checkpoint(e) => write!(f, "checkpoint error: {e}"),
            TrainErr::Export(e) => write!(f, "sample export error: {e}"),
            TrainErr::Summary(e) => write!(f, "summary write error: {e}"),
            TrainErr::Model { step, source } => write!(f, "model failed at step {step}: {source}"),
            TrainErr::SampleShape(e) => write!(f, "generated samples have the wrong shape: {e}"),
            TrainErr::Context(msg) => write!(f, "compute context error: {msg}"),
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainErr::Config(e) => Some(e),
            TrainErr::Data(e) => Some(e),
            TrainErr::Checkpoint(e) => Some(e),
            TrainErr::Export(e) => Some(e),
            TrainErr::Summary(e) => Some(e),
            TrainErr::Model { source, .. } => Some(source),
            TrainErr::SampleShape(e) => Some(e),
            TrainErr::Context(_) => None,
        }
    }
}

impl From<ConfigErr> for TrainErr {
    fn from(value: ConfigErr) -> Self {
        Self::Config(value)
    }
}

impl From<DataErr> for TrainErr {
    fn from(value: DataErr) -> Self {
        Self::Data(value)
    }
}

impl From<CheckpointErr> for TrainErr {
    fn from(value: CheckpointErr) -> Self {
        Self::Checkpoint(value)
    }
}

impl From<ExportErr> for TrainErr {
    fn from(value: ExportErr) -> Self {
        Self::Export(value)
    }
}
