pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod summary;
pub mod training;

pub use config::Config;
pub use error::{Result, TrainErr};
