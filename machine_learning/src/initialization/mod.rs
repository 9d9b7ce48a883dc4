mod chained;
mod constant;
mod param_gen;
mod random;

pub use chained::ChainedParamGen;
pub use constant::ConstParamGen;
pub use param_gen::ParamGen;
pub use random::RandParamGen;

use std::{cell::RefCell, rc::Rc};

use rand::Rng;

use crate::{MlErr, Result, arch::Sequential};

/// Generates the initial parameters of a sequential network: Xavier uniform weights and zero
/// biases for every dense layer.
///
/// # Arguments
/// * `net` - The network whose layout dictates the amount of parameters.
/// * `rng` - The random number generator shared by every layer.
///
/// # Returns
/// The flat parameter buffer or an error if a distribution couldn't be built.
pub fn xavier_params<R: Rng + 'static>(net: &Sequential, rng: &Rc<RefCell<R>>) -> Result<Vec<f32>> {
    let mut param_gens: Vec<Box<dyn ParamGen>> = Vec::with_capacity(net.layers().len() * 2);

    for layer in net.layers() {
        let (fan_in, fan_out) = layer.dim();
        let weights = RandParamGen::xavier_uniform(rng.clone(), fan_in * fan_out, fan_in, fan_out)?;
        param_gens.push(Box::new(weights));
        param_gens.push(Box::new(ConstParamGen::new(0., fan_out)));
    }

    let size = net.size();
    let params = ChainedParamGen::new(param_gens)
        .sample(size)
        .unwrap_or_default();

    if params.len() != size {
        return Err(MlErr::SizeMismatch {
            what: "initial parameters",
            got: params.len(),
            expected: size,
        });
    }

    Ok(params)
}
