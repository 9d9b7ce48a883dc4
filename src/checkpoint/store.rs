use std::{
    collections::HashMap,
    fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use log::{debug, info};
use machine_learning::TensorMap;
use safetensors::{
    SafeTensors,
    tensor::{Dtype, TensorView},
};

use super::{CheckpointErr, CheckpointRecord, Snapshot, record::Metadata};

/// Name of the metadata file written next to the checkpoint blobs.
pub const METADATA_FILE: &str = "checkpoint";

/// Persists model state keyed by the training step.
pub trait CheckpointStore {
    /// Returns the most recent checkpoint or `None` if nothing was ever saved.
    fn get_latest(&self) -> Result<Option<CheckpointRecord>, CheckpointErr>;

    /// Persists `state` tagged with the snapshot's step and makes it the latest checkpoint.
    fn save(
        &mut self,
        snapshot: &Snapshot,
        state: &TensorMap,
    ) -> Result<CheckpointRecord, CheckpointErr>;

    /// Reads back the state persisted by `record`.
    fn restore(&self, record: &CheckpointRecord) -> Result<TensorMap, CheckpointErr>;
}

/// A `CheckpointStore` writing `safetensors` blobs named `<prefix>-<step>` and a JSON
/// `checkpoint` metadata file in the prefix's directory.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
    prefix: String,
    max_to_keep: NonZeroUsize,
}

impl FileCheckpointStore {
    /// Creates a new `FileCheckpointStore`.
    ///
    /// # Arguments
    /// * `prefix` - The blobs' path prefix, e.g. `./model/GAN-model.ckpt`.
    /// * `max_to_keep` - The amount of blobs kept on disk, older ones are deleted.
    ///
    /// # Returns
    /// A new store or an error if `prefix` has no file name.
    pub fn new(prefix: &Path, max_to_keep: NonZeroUsize) -> Result<Self, CheckpointErr> {
        let name = prefix
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CheckpointErr::Metadata {
                path: prefix.to_path_buf(),
                reason: "the checkpoint prefix has no file name".into(),
            })?;

        let dir = match prefix.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self {
            dir,
            prefix: name.to_string(),
            max_to_keep,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    fn read_metadata(&self) -> Result<Option<Metadata>, CheckpointErr> {
        let path = self.metadata_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckpointErr::Io { path, source: e }),
        };

        Metadata::parse(&path, &raw).map(Some)
    }

    fn write_metadata(&self, metadata: &Metadata) -> Result<(), CheckpointErr> {
        let path = self.metadata_path();
        let tmp = self.dir.join(format!("{METADATA_FILE}.tmp"));

        let raw = serde_json::to_string_pretty(metadata).map_err(|e| CheckpointErr::Metadata {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        fs::write(&tmp, raw).map_err(CheckpointErr::io(&tmp))?;
        fs::rename(&tmp, &path).map_err(CheckpointErr::io(&path))
    }

    /// Deletes the blobs that no longer fit in `max_to_keep`.
    fn prune(&self, paths: &mut Vec<String>) -> Result<(), CheckpointErr> {
        let excess = paths.len().saturating_sub(self.max_to_keep.get());

        for stale in paths.drain(..excess) {
            let path = self.dir.join(&stale);
            match fs::remove_file(&path) {
                Ok(()) => debug!("pruned checkpoint {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(CheckpointErr::Io { path, source: e }),
            }
        }

        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn get_latest(&self) -> Result<Option<CheckpointRecord>, CheckpointErr> {
        self.read_metadata()?
            .map(|metadata| metadata.into_record(&self.dir))
            .transpose()
    }

    fn save(
        &mut self,
        snapshot: &Snapshot,
        state: &TensorMap,
    ) -> Result<CheckpointRecord, CheckpointErr> {
        fs::create_dir_all(&self.dir).map_err(CheckpointErr::io(&self.dir))?;

        let name = format!("{}-{}", self.prefix, snapshot.step);
        let path = self.dir.join(&name);

        let blob = serialize(state, snapshot).map_err(|reason| CheckpointErr::Blob {
            path: path.clone(),
            reason,
        })?;
        fs::write(&path, blob).map_err(CheckpointErr::io(&path))?;

        let mut paths = self
            .read_metadata()?
            .map(|metadata| metadata.all_model_checkpoint_paths)
            .unwrap_or_default();
        paths.retain(|p| *p != name);
        paths.push(name.clone());
        self.prune(&mut paths)?;

        self.write_metadata(&Metadata {
            model_checkpoint_path: name,
            all_model_checkpoint_paths: paths,
            step: Some(snapshot.step),
            d_loss: Some(snapshot.d_loss),
            g_loss: Some(snapshot.g_loss),
            d_overpowered: Some(snapshot.d_overpowered),
        })?;

        info!(step = snapshot.step; "saved checkpoint {}", path.display());

        Ok(CheckpointRecord {
            step: snapshot.step,
            path,
            d_loss: Some(snapshot.d_loss),
            g_loss: Some(snapshot.g_loss),
            d_overpowered: Some(snapshot.d_overpowered),
        })
    }

    fn restore(&self, record: &CheckpointRecord) -> Result<TensorMap, CheckpointErr> {
        let bytes = fs::read(&record.path).map_err(CheckpointErr::io(&record.path))?;
        let blob_err = |reason: String| CheckpointErr::Blob {
            path: record.path.clone(),
            reason,
        };

        let tensors = SafeTensors::deserialize(&bytes).map_err(|e| blob_err(e.to_string()))?;

        let mut state = TensorMap::new();
        for (name, view) in tensors.tensors() {
            if view.dtype() != Dtype::F32 {
                let dtype = view.dtype();
                return Err(blob_err(format!("tensor `{name}` is {dtype:?}, expected F32")));
            }

            state.insert(name, bytemuck::pod_collect_to_vec(view.data()));
        }

        info!(step = record.step; "restored checkpoint {}", record.path.display());
        Ok(state)
    }
}

/// Encodes every tensor as a 1-D F32 safetensors entry, the snapshot goes in `__metadata__`.
fn serialize(state: &TensorMap, snapshot: &Snapshot) -> Result<Vec<u8>, String> {
    let views = state
        .iter()
        .map(|(name, values)| {
            let bytes: &[u8] = bytemuck::cast_slice(values);
            TensorView::new(Dtype::F32, vec![values.len()], bytes)
                .map(|view| (name.as_str(), view))
                .map_err(|e| e.to_string())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let metadata = HashMap::from([
        ("step".to_string(), snapshot.step.to_string()),
        ("d_loss".to_string(), snapshot.d_loss.to_string()),
        ("g_loss".to_string(), snapshot.g_loss.to_string()),
        ("d_overpowered".to_string(), snapshot.d_overpowered.to_string()),
    ]);

    safetensors::serialize(views, &Some(metadata)).map_err(|e| e.to_string())
}
