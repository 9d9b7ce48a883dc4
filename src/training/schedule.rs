use std::num::NonZeroUsize;

/// Defines at which steps to evaluate, export samples and checkpoint.
#[derive(Debug, Clone, Copy)]
pub struct LoggingSchedule {
    pub interval: NonZeroUsize,
}

impl LoggingSchedule {
    pub fn new(interval: NonZeroUsize) -> Self {
        Self { interval }
    }

    /// Returns true if `step` is a multiple of the interval, step 0 included.
    #[inline]
    pub fn should_log(&self, step: usize) -> bool {
        step % self.interval.get() == 0
    }
}
