mod adam;
mod optimizer;

pub(crate) use adam::take;
pub use adam::{Adam, AdamConfig};
pub use optimizer::Optimizer;
