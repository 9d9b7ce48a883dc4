use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::CheckpointErr;

/// The loop's state at the moment a checkpoint is written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub step: usize,
    pub d_loss: f32,
    pub g_loss: f32,
    pub d_overpowered: bool,
}

/// A persisted checkpoint as described by the store's metadata.
///
/// `step` is the last completed step. The losses and the flag are absent when the metadata
/// predates them (legacy text metadata).
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRecord {
    pub step: usize,
    pub path: PathBuf,
    pub d_loss: Option<f32>,
    pub g_loss: Option<f32>,
    pub d_overpowered: Option<bool>,
}

/// The `checkpoint` metadata file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Metadata {
    pub model_checkpoint_path: String,
    #[serde(default)]
    pub all_model_checkpoint_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_loss: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub g_loss: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_overpowered: Option<bool>,
}

impl Metadata {
    /// Parses the metadata file's contents, JSON first and the legacy text format otherwise.
    pub fn parse(path: &Path, raw: &str) -> Result<Self, CheckpointErr> {
        match serde_json::from_str(raw) {
            Ok(metadata) => Ok(metadata),
            Err(json_err) => Self::parse_legacy(raw).ok_or_else(|| CheckpointErr::Metadata {
                path: path.to_path_buf(),
                reason: format!("neither JSON ({json_err}) nor `model_checkpoint_path:` lines"),
            }),
        }
    }

    /// Parses `key: "value"` lines.
    fn parse_legacy(raw: &str) -> Option<Self> {
        let mut latest = None;
        let mut all = Vec::new();

        for line in raw.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };

            let value = value.trim().trim_matches('"').to_string();
            match key.trim() {
                "model_checkpoint_path" => latest = Some(value),
                "all_model_checkpoint_paths" => all.push(value),
                _ => {}
            }
        }

        Some(Self {
            model_checkpoint_path: latest?,
            all_model_checkpoint_paths: all,
            ..Default::default()
        })
    }

    /// Resolves the latest checkpoint relative to the metadata's directory.
    pub fn into_record(self, dir: &Path) -> Result<CheckpointRecord, CheckpointErr> {
        let step = match self.step {
            Some(step) => step,
            None => step_from_path(&self.model_checkpoint_path)?,
        };

        Ok(CheckpointRecord {
            step,
            path: dir.join(&self.model_checkpoint_path),
            d_loss: self.d_loss,
            g_loss: self.g_loss,
            d_overpowered: self.d_overpowered,
        })
    }
}

/// Extracts the step out of a `<prefix>-<step>` checkpoint path, only the file name is
/// considered.
///
/// # Returns
/// The step or `CheckpointErr::MalformedStep` if the suffix isn't an integer.
pub fn step_from_path(path: &str) -> Result<usize, CheckpointErr> {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);

    file_name
        .rsplit_once('-')
        .and_then(|(_, suffix)| suffix.parse().ok())
        .ok_or_else(|| CheckpointErr::MalformedStep(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_comes_from_the_last_dash() {
        assert_eq!(step_from_path("./model/GAN-model.ckpt-3000").unwrap(), 3000);
        assert_eq!(step_from_path("a-b-0").unwrap(), 0);
    }

    #[test]
    fn non_numeric_suffix_is_malformed() {
        for path in ["GAN-model.ckpt-final", "GANmodel", "GAN-model.ckpt-", "./run-3/GANmodel"] {
            assert!(matches!(step_from_path(path), Err(CheckpointErr::MalformedStep(_))));
        }
    }

    #[test]
    fn json_step_wins_over_the_suffix() {
        let raw = r#"{ "model_checkpoint_path": "GAN-model.ckpt-5", "step": 7, "d_loss": 0.5 }"#;

        let record = Metadata::parse(Path::new("checkpoint"), raw)
            .unwrap()
            .into_record(Path::new("model"))
            .unwrap();

        assert_eq!(record.step, 7);
        assert_eq!(record.path, PathBuf::from("model/GAN-model.ckpt-5"));
        assert_eq!(record.d_loss, Some(0.5));
        assert_eq!(record.d_overpowered, None);
    }

    #[test]
    fn json_without_step_falls_back_to_the_suffix() {
        let raw = r#"{ "model_checkpoint_path": "GAN-model.ckpt-2000" }"#;

        let record = Metadata::parse(Path::new("checkpoint"), raw)
            .unwrap()
            .into_record(Path::new("."))
            .unwrap();

        assert_eq!(record.step, 2000);
    }

    #[test]
    fn legacy_text_is_accepted() {
        let raw = "model_checkpoint_path: \"GAN-model.ckpt-4000\"\n\
                   all_model_checkpoint_paths: \"GAN-model.ckpt-3000\"\n\
                   all_model_checkpoint_paths: \"GAN-model.ckpt-4000\"\n";

        let metadata = Metadata::parse(Path::new("checkpoint"), raw).unwrap();
        assert_eq!(metadata.all_model_checkpoint_paths.len(), 2);

        let record = metadata.into_record(Path::new("model")).unwrap();
        assert_eq!(record.step, 4000);
        assert_eq!(record.g_loss, None);
    }

    #[test]
    fn legacy_text_with_a_bad_suffix_is_malformed() {
        let raw = "model_checkpoint_path: \"GAN-model.ckpt-latest\"\n";

        let metadata = Metadata::parse(Path::new("checkpoint"), raw).unwrap();
        assert!(matches!(
            metadata.into_record(Path::new(".")),
            Err(CheckpointErr::MalformedStep(_))
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = Metadata::parse(Path::new("checkpoint"), "{ not json").unwrap_err();
        assert!(matches!(err, CheckpointErr::Metadata { .. }));
    }
}
