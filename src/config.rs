use std::{
    env,
    error::Error,
    fmt, fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use machine_learning::{GanConfig, optimization::AdamConfig};
use serde::Deserialize;

/// Environment variable naming an optional JSON file that overrides the defaults.
pub const CONFIG_ENV: &str = "GAN_TRAIN_CONFIG";

const DEFAULT_LOGGING_INTERVAL: NonZeroUsize = NonZeroUsize::new(1000).unwrap();
const DEFAULT_MAX_TO_KEEP: NonZeroUsize = NonZeroUsize::new(5).unwrap();

/// The training driver's configuration.
///
/// Every field has a default, a config file only needs to name what it changes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub results: ResultsConfig,
    pub train_step: TrainStepConfig,
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub runtime: RuntimeConfig,
}

/// Where the run leaves its artifacts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResultsConfig {
    /// Directory receiving the sample grids.
    pub output: PathBuf,
    /// Checkpoint prefix, blobs are written as `<model>-<step>`.
    pub model: PathBuf,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("./gen_img/"),
            model: PathBuf::from("./model/GAN-model.ckpt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainStepConfig {
    /// Total amount of steps, exclusive.
    pub global_step: usize,
    /// Step cadence of evaluation, sample export and checkpointing.
    pub logging_interval: NonZeroUsize,
}

impl Default for TrainStepConfig {
    fn default() -> Self {
        Self {
            global_step: 200001,
            logging_interval: DEFAULT_LOGGING_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    /// Directory holding the MNIST IDX files.
    pub path: PathBuf,
    /// Seed of the epoch shuffling.
    pub seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./mnist/"),
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    pub batch_size: usize,
    pub z_dim: usize,
    pub height: usize,
    pub width: usize,
    pub channel: usize,
    pub sample_num: usize,
    pub fc_unit: usize,
    pub leak: f32,
    pub d_lr: f32,
    pub g_lr: f32,
    pub beta1: f32,
    pub beta2: f32,
    pub epsilon: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let gan = GanConfig::default();
        let adam = AdamConfig::default();

        Self {
            batch_size: gan.batch_size,
            z_dim: gan.z_dim,
            height: gan.height,
            width: gan.width,
            channel: gan.channel,
            sample_num: gan.sample_num,
            fc_unit: gan.fc_unit,
            leak: gan.leak,
            d_lr: adam.learning_rate,
            g_lr: adam.learning_rate,
            beta1: adam.beta1,
            beta2: adam.beta2,
            epsilon: adam.epsilon,
        }
    }
}

impl ModelConfig {
    /// Builds the model's hyperparameters out of this section.
    pub fn gan_config(&self) -> GanConfig {
        let adam = |learning_rate| AdamConfig {
            learning_rate,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
        };

        GanConfig {
            batch_size: self.batch_size,
            z_dim: self.z_dim,
            height: self.height,
            width: self.width,
            channel: self.channel,
            sample_num: self.sample_num,
            fc_unit: self.fc_unit,
            leak: self.leak,
            d_optimizer: adam(self.d_lr),
            g_optimizer: adam(self.g_lr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Size of the compute pool, `None` lets rayon pick one thread per core.
    pub threads: Option<NonZeroUsize>,
    /// Seed of the parameter initialization and of every noise batch.
    pub seed: u64,
    /// Amount of checkpoints kept on disk.
    pub max_to_keep: NonZeroUsize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            threads: None,
            seed: 777,
            max_to_keep: DEFAULT_MAX_TO_KEEP,
        }
    }
}

impl Config {
    /// Loads the configuration, reading the file named by `GAN_TRAIN_CONFIG` if set.
    ///
    /// # Returns
    /// The defaults, the overridden configuration or an error if the file is unusable.
    pub fn load() -> Result<Self, ConfigErr> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_path(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Reads and validates a JSON configuration file.
    ///
    /// # Arguments
    /// * `path` - The configuration file's path.
    ///
    /// # Returns
    /// The parsed configuration or an error if the file can't be read, parsed or validated.
    pub fn from_path(path: &Path) -> Result<Self, ConfigErr> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigErr::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigErr::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the constraints serde can't express.
    pub fn validate(&self) -> Result<(), ConfigErr> {
        if self.results.model.file_name().is_none() {
            return Err(ConfigErr::Invalid(format!(
                "results.model ({}) must end in a checkpoint file prefix",
                self.results.model.display()
            )));
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigErr {
    Read { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Invalid(String),
}

impl fmt::Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErr::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ConfigErr::Parse { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
            ConfigErr::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for ConfigErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigErr::Read { source, .. } => Some(source),
            ConfigErr::Parse { source, .. } => Some(source),
            ConfigErr::Invalid(_) => None,
        }
    }
}
