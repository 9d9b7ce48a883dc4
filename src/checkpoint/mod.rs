mod error;
mod record;
mod store;

pub use error::CheckpointErr;
pub use record::{CheckpointRecord, Snapshot, step_from_path};
pub use store::{CheckpointStore, FileCheckpointStore, METADATA_FILE};
