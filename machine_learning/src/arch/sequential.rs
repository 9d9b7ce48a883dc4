use ndarray::{Array2, ArrayView2};

use super::layers::Dense;
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The parameters live outside the model in a single flat buffer, each layer takes the next
/// `layer.size()` values of it in order.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Dense>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Dense>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.layers.iter().map(Dense::size).sum()
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input data.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_len("sequential parameters", params.len())?;

        let mut layers = self.layers.iter_mut();
        let Some(first) = layers.next() else {
            return Ok(x.to_owned());
        };

        let mut offset = first.size();
        let mut a = first.forward(&params[..offset], x)?;

        for layer in layers {
            let end = offset + layer.size();
            a = layer.forward(&params[offset..end], a.view())?;
            offset = end;
        }

        Ok(a)
    }

    /// Makes a backward pass through the network, it must follow a `forward` call.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - The gradient buffer, overwritten with the gradient of this pass.
    /// * `d` - The derivative of the loss with respect to the network's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the network's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        self.check_len("sequential parameters", params.len())?;
        self.check_len("sequential gradient", grad.len())?;

        let mut end = params.len();
        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(d)
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::arch::{
        activations::ActFn,
        loss::{BceWithLogits, LossFn},
    };

    fn net() -> Sequential {
        Sequential::new([
            Dense::new((3, 4), Some(ActFn::sigmoid(1.))),
            Dense::new((4, 1), None),
        ])
    }

    fn loss_at(net: &mut Sequential, params: &[f32], x: &Array2<f32>, y: &Array2<f32>) -> f32 {
        let logits = net.forward(params, x.view()).unwrap();
        BceWithLogits.loss(logits.view(), y.view())
    }

    #[test]
    fn size_adds_up_every_layer() {
        assert_eq!(net().size(), (3 + 1) * 4 + (4 + 1));
    }

    #[test]
    fn backward_matches_finite_differences() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut net = net();
        let params: Vec<f32> = (0..net.size())
            .map(|_| rng.random_range(-0.5..0.5))
            .collect();
        let x = array![[0.1, -0.2, 0.3], [0.5, 0.4, -0.1]];
        let y = array![[1.], [0.]];

        let logits = net.forward(&params, x.view()).unwrap();
        let d = BceWithLogits.loss_prime(logits.view(), y.view());
        let mut grad = vec![0.; net.size()];
        net.backward(&params, &mut grad, d).unwrap();

        const EPS: f32 = 1e-2;
        for i in 0..params.len() {
            let mut plus = params.clone();
            plus[i] += EPS;
            let mut minus = params.clone();
            minus[i] -= EPS;

            let numeric =
                (loss_at(&mut net, &plus, &x, &y) - loss_at(&mut net, &minus, &x, &y)) / (2. * EPS);
            assert!(
                (numeric - grad[i]).abs() < 1e-3,
                "param {i}: numeric {numeric}, analytic {}",
                grad[i]
            );
        }
    }

    #[test]
    fn input_delta_has_the_input_shape() {
        let mut net = net();
        let params = vec![0.1; net.size()];
        let x = Array2::zeros((5, 3));

        let out = net.forward(&params, x.view()).unwrap();
        let mut grad = vec![0.; net.size()];
        let dx = net.backward(&params, &mut grad, Array2::ones(out.raw_dim())).unwrap();

        assert_eq!(dx.dim(), (5, 3));
    }

    #[test]
    fn mismatched_parameter_buffer_is_rejected() {
        let mut net = net();
        let params = vec![0.; net.size() - 1];
        let x = Array2::zeros((1, 3));

        let err = net.forward(&params, x.view()).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { .. }));
    }
}
