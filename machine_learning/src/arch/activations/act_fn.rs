use super::{LeakyRelu, Sigmoid};

/// An element-wise activation function applied after a layer's affine transform.
#[derive(Clone, Debug)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    LeakyRelu(LeakyRelu),
}
use ActFn::*;

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        Sigmoid(Sigmoid::new(amp))
    }

    pub fn leaky_relu(leak: f32) -> Self {
        LeakyRelu(LeakyRelu::new(leak))
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Sigmoid(a) => a.f(x),
            LeakyRelu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Sigmoid(a) => a.df(x),
            LeakyRelu(a) => a.df(x),
        }
    }
}
