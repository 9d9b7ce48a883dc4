use std::{error::Error, fmt, io, path::PathBuf};

#[derive(Debug)]
pub enum CheckpointErr {
    Io { path: PathBuf, source: io::Error },
    Metadata { path: PathBuf, reason: String },
    MalformedStep(String),
    Blob { path: PathBuf, reason: String },
}

impl CheckpointErr {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

impl fmt::Display for CheckpointErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointErr::Io { path, source } => {
                write!(f, "io error on {}: {source}", path.display())
            }
            CheckpointErr::Metadata { path, reason } => {
                write!(f, "malformed checkpoint metadata in {}: {reason}", path.display())
            }
            CheckpointErr::MalformedStep(path) => {
                write!(f, "checkpoint path `{path}` doesn't end in a step number")
            }
            CheckpointErr::Blob { path, reason } => {
                write!(f, "unusable checkpoint blob {}: {reason}", path.display())
            }
        }
    }
}

impl Error for CheckpointErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CheckpointErr::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
