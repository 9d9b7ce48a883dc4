mod model;
mod vanilla;

pub use model::{GanModel, Losses, ModelDims, TensorMap};
pub use vanilla::{GanConfig, VanillaGan};
