use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Uniform};

/// Default seed for parameter initialisation.
pub const MODEL_INIT_SEED: u64 = 0x1234_5678;

/// Seeded source of initial parameter values.
pub struct ParamRng(StdRng);

impl ParamRng {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// Samples uniformly from `[-bound, bound]`.
    pub fn uniform(&mut self, length: usize, bound: f32) -> Vec<f32> {
        let dist = Uniform::new_inclusive(-bound, bound);
        (0..length).map(|_| dist.sample(&mut self.0)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_and_bounded() {
        let a = ParamRng::new(7).uniform(1000, 0.1);
        let b = ParamRng::new(7).uniform(1000, 0.1);
        let c = ParamRng::new(8).uniform(1000, 0.1);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|x| (-0.1..=0.1).contains(x)));
    }
}
