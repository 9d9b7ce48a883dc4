use machine_learning::Losses;

use crate::checkpoint::{CheckpointRecord, Snapshot};

/// Whether the discriminator dominates the generator badly enough to skip its next update.
#[inline]
pub fn d_overpowered(d_loss: f32, g_loss: f32) -> bool {
    d_loss < g_loss / 2.
}

/// The only state carried between iterations besides the model's parameters.
///
/// `step` is the next step to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopState {
    pub step: usize,
    pub d_loss: f32,
    pub g_loss: f32,
    pub d_overpowered: bool,
}

impl LoopState {
    pub fn fresh() -> Self {
        Self {
            step: 0,
            d_loss: 0.,
            g_loss: 0.,
            d_overpowered: false,
        }
    }

    /// Continues right after the checkpointed step, with the losses and flag it recorded.
    pub fn resumed(record: &CheckpointRecord) -> Self {
        let d_loss = record.d_loss.unwrap_or(0.);
        let g_loss = record.g_loss.unwrap_or(0.);

        Self {
            step: record.step + 1,
            d_loss,
            g_loss,
            d_overpowered: record.d_overpowered.unwrap_or(false),
        }
    }

    #[inline]
    pub fn record_d_loss(&mut self, d_loss: f32) {
        self.d_loss = d_loss;
    }

    #[inline]
    pub fn record_g_loss(&mut self, g_loss: f32) {
        self.g_loss = g_loss;
    }

    /// Recomputes the overpowered flag from the last recorded losses.
    #[inline]
    pub fn update_flag(&mut self) {
        self.d_overpowered = d_overpowered(self.d_loss, self.g_loss);
    }

    /// Overrides the losses with the evaluation's and recomputes the flag.
    pub fn apply_eval(&mut self, losses: Losses) {
        self.d_loss = losses.d_loss;
        self.g_loss = losses.g_loss;
        self.update_flag();
    }

    #[inline]
    pub fn advance(&mut self) {
        self.step += 1;
    }

    /// The state to persist once `self.step` has completed.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            step: self.step,
            d_loss: self.d_loss,
            g_loss: self.g_loss,
            d_overpowered: self.d_overpowered,
        }
    }
}
