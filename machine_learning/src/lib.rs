pub mod arch;
pub mod error;
pub mod gan;
pub mod initialization;
pub mod optimization;

pub use error::{MlErr, Result};
pub use gan::{GanConfig, GanModel, Losses, ModelDims, TensorMap, VanillaGan};
