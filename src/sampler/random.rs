use crate::{Point2i, Point2f, Float};
use crate::sampler::{Sampler, SamplerState};
use rand_xoshiro::Xoshiro256Plus;
use rand::{SeedableRng, Rng};

/// Independent uniform random samples, drawn from a seeded xoshiro generator.
#[derive(Clone)]
pub struct RandomSampler {
    rng: Xoshiro256Plus,
    state: SamplerState,
}

impl RandomSampler {
    pub fn new_with_seed(samples_per_pixel: usize, seed: u64) -> Self {
        Self {
            rng: Xoshiro256Plus::seed_from_u64(seed),
            state: SamplerState::new(samples_per_pixel),
        }
    }
}

impl Sampler for RandomSampler {
    fn start_pixel(&mut self, pixel: Point2i) {
        self.state.start_pixel(pixel);
    }

    fn start_next_sample(&mut self) -> bool {
        self.state.start_next_sample()
    }

    fn get_1d(&mut self) -> Float {
        self.rng.gen()
    }

    fn get_2d(&mut self) -> Point2f {
        Point2f::new(self.rng.gen(), self.rng.gen())
    }

    fn clone_with_seed(&self, seed: u64) -> Box<dyn Sampler> {
        Box::new(Self {
            rng: Xoshiro256Plus::seed_from_u64(seed),
            state: self.state.clone(),
        })
    }

    fn samples_per_pixel(&self) -> usize {
        self.state.samples_per_pixel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count_per_pixel() {
        let mut sampler = RandomSampler::new_with_seed(4, 0);
        sampler.start_pixel(Point2i::new(3, 5));
        let mut n = 1;
        while sampler.start_next_sample() {
            n += 1;
        }
        assert_eq!(n, 4);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let base = RandomSampler::new_with_seed(1, 0);
        let mut a = base.clone_with_seed(42);
        let mut b = base.clone_with_seed(42);
        let mut c = base.clone_with_seed(43);
        let xs: Vec<Float> = (0..8).map(|_| a.get_1d()).collect();
        let ys: Vec<Float> = (0..8).map(|_| b.get_1d()).collect();
        let zs: Vec<Float> = (0..8).map(|_| c.get_1d()).collect();
        assert_eq!(xs, ys);
        assert_ne!(xs, zs);
        assert!(xs.iter().all(|&x| (0.0..1.0).contains(&x)));
    }
}
