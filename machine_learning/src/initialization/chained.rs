use super::ParamGen;

/// A parameter generator that delegates the generation to a chain of parameter generators.
///
/// Each generator in the chain knows how many values it owns, so a different initialization
/// can be used for every weight matrix and bias vector of the model.
pub struct ChainedParamGen {
    param_gens: Vec<Box<dyn ParamGen>>,
    curr: usize,
}

impl ChainedParamGen {
    /// Creates a new `ChainedParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `param_gens` - A vec of potentially different parameter generators.
    pub fn new(param_gens: Vec<Box<dyn ParamGen>>) -> Self {
        Self {
            param_gens,
            curr: 0,
        }
    }
}

impl ParamGen for ChainedParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let mut sample = Vec::with_capacity(n);

        while sample.len() < n && self.curr < self.param_gens.len() {
            match self.param_gens[self.curr].sample(n - sample.len()) {
                Some(chunk) if sample.len() + chunk.len() == n => sample.extend(chunk),
                Some(chunk) => {
                    sample.extend(chunk);
                    self.curr += 1;
                }
                None => self.curr += 1,
            }
        }

        (!sample.is_empty()).then_some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::{super::ConstParamGen, *};

    #[test]
    fn empty() {
        let mut param_gen = ChainedParamGen::new(vec![]);
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn exact() {
        let param_gens: Vec<Box<dyn ParamGen>> = vec![
            Box::new(ConstParamGen::new(0., 5)),
            Box::new(ConstParamGen::new(1., 5)),
        ];

        let mut param_gen = ChainedParamGen::new(param_gens);
        let sample = param_gen.sample(10).unwrap();
        let expected: Vec<_> = (0..10).map(|i| (i > 4) as u32 as f32).collect();

        assert_eq!(sample, expected);
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn partial() {
        let param_gens: Vec<Box<dyn ParamGen>> = vec![
            Box::new(ConstParamGen::new(0., 1)),
            Box::new(ConstParamGen::new(1., 3)),
        ];

        let mut param_gen = ChainedParamGen::new(param_gens);

        let sample = param_gen.sample(2).unwrap();
        assert_eq!(sample, [0., 1.]);

        let sample = param_gen.sample(2).unwrap();
        assert_eq!(sample, [1., 1.]);
        assert!(param_gen.sample(1).is_none());
    }
}
