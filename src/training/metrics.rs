use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrainMetrics {
    pub d_updates: u64,
    pub d_skips: u64,
    pub g_updates: u64,
    pub evaluations: u64,
    pub elapsed: Duration,
}

impl TrainMetrics {
    #[inline]
    pub fn bump_d_update(&mut self) {
        self.d_updates += 1;
    }

    #[inline]
    pub fn bump_d_skip(&mut self) {
        self.d_skips += 1;
    }

    #[inline]
    pub fn bump_g_update(&mut self) {
        self.g_updates += 1;
    }

    #[inline]
    pub fn bump_evaluation(&mut self) {
        self.evaluations += 1;
    }
}
