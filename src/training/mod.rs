mod context;
mod loop_;
mod metrics;
mod schedule;
mod state;

pub use context::{ComputeContext, NoiseStream};
pub use loop_::{LoopConfig, TrainingLoop};
pub use metrics::TrainMetrics;
pub use schedule::LoggingSchedule;
pub use state::{LoopState, d_overpowered};
