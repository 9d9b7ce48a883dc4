use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer, `a = act_fn(x · w + b)`.
///
/// The layer doesn't own its parameters, it views a flat slice laid out as the
/// `dim.0 x dim.1` weight matrix in row major order followed by `dim.1` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - An optional activation function applied to the output.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros,
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the amount of inputs and outputs of this layer.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Makes a forward pass through the layer, caching what the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    /// * `x` - The input batch, one sample per row.
    ///
    /// # Returns
    /// The activations of the layer or an error if the shapes don't line up.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = x.dot(&w);
        z += &b;

        let a = match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        };

        self.x = x.to_owned();
        self.z = z;
        Ok(a)
    }

    /// Makes a backward pass through the layer using the cache of the last forward pass.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of parameters.
    /// * `grad` - This layer's slice of the gradient, overwritten with the new values.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense delta rows",
                got: d.nrows(),
                expected: self.z.nrows(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn forward_applies_weights_then_biases() {
        // w = [[1, 2], [3, 4], [5, 6]], b = [0.5, -0.5]
        let params = [1., 2., 3., 4., 5., 6., 0.5, -0.5];
        let mut dense = Dense::new((3, 2), None);
        let x = array![[1., 0., 1.], [0., 1., 0.]];

        let a = dense.forward(&params, x.view()).unwrap();

        assert_eq!(a, array![[6.5, 7.5], [3.5, 3.5]]);
    }

    #[test]
    fn backward_writes_weight_and_bias_deltas() {
        let params = [1., 2., 3., 4., 5., 6., 0., 0.];
        let mut grad = [0.; 8];
        let mut dense = Dense::new((3, 2), None);
        let x = array![[1., 2., 3.]];

        dense.forward(&params, x.view()).unwrap();
        let dx = dense.backward(&params, &mut grad, array![[1., -1.]]).unwrap();

        assert_eq!(grad, [1., -1., 2., -2., 3., -3., 1., -1.]);
        assert_eq!(dx, array![[-1., -1., -1.]]);
    }

    #[test]
    fn wrong_input_width_is_rejected() {
        let params = [0.; 8];
        let mut dense = Dense::new((3, 2), None);
        let x = Array2::zeros((4, 2));

        let err = dense.forward(&params, x.view()).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { got: 2, expected: 3, .. }));
    }

    #[test]
    fn wrong_parameter_count_is_rejected() {
        let params = [0.; 7];
        let mut dense = Dense::new((3, 2), None);
        let x = Array2::zeros((1, 3));

        assert!(dense.forward(&params, x.view()).is_err());
    }
}
