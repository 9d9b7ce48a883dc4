/// Rectifier that lets a `leak` fraction of negative inputs through.
#[derive(Clone, Debug)]
pub struct LeakyRelu {
    leak: f32,
}

impl LeakyRelu {
    pub fn new(leak: f32) -> Self {
        Self { leak }
    }

    pub fn f(&self, z: f32) -> f32 {
        if z > 0. { z } else { self.leak * z }
    }

    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { self.leak }
    }
}
