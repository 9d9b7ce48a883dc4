use ndarray::{Array2, ArrayView2, Zip};

use super::LossFn;

/// Binary cross entropy computed straight from logits, averaged over every element.
///
/// Uses `max(l, 0) - l * y + ln(1 + e^-|l|)` so large logits don't overflow.
#[derive(Default, Clone, Copy, Debug)]
pub struct BceWithLogits;

impl BceWithLogits {
    /// Returns a new `BceWithLogits`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for BceWithLogits {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let n = y_pred.len();
        if n == 0 {
            return 0.;
        }

        let total = Zip::from(&y_pred)
            .and(&y)
            .fold(0., |acc, &l, &y| acc + l.max(0.) - l * y + (-l.abs()).exp().ln_1p());

        total / n as f32
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let n = y_pred.len().max(1) as f32;

        Zip::from(&y_pred)
            .and(&y)
            .map_collect(|&l, &y| (1. / (1. + (-l).exp()) - y) / n)
    }
}
