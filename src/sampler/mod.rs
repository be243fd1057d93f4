use crate::{Float, Point2f, Point2i};
use crate::camera::CameraSample;
use cgmath::EuclideanSpace;

pub mod random;

pub use random::RandomSampler;

/// A source of sample values in [0, 1). Samplers step through the samples of one pixel at a
/// time; each render tile gets its own clone seeded from the tile index.
pub trait Sampler: Sync + Send {
    fn start_pixel(&mut self, pixel: Point2i);

    /// Advance to the next sample of the current pixel, returning false once all samples have
    /// been taken.
    fn start_next_sample(&mut self) -> bool;

    fn get_1d(&mut self) -> Float;

    fn get_2d(&mut self) -> Point2f;

    fn clone_with_seed(&self, seed: u64) -> Box<dyn Sampler>;

    fn samples_per_pixel(&self) -> usize;

    fn get_camera_sample(&mut self, p_raster: Point2i) -> CameraSample {
        let p_film = Point2f::new(p_raster.x as Float, p_raster.y as Float) + self.get_2d().to_vec();

        CameraSample {
            p_film,
            p_lens: self.get_2d(),
            time: self.get_1d(),
        }
    }
}

/// Per-pixel bookkeeping shared by sampler implementations.
#[derive(Clone, Debug)]
pub struct SamplerState {
    pub samples_per_pixel: usize,
    pub current_pixel: Point2i,
    pub current_sample_index: usize,
}

impl SamplerState {
    pub fn new(samples_per_pixel: usize) -> Self {
        Self {
            samples_per_pixel,
            current_pixel: Point2i::new(0, 0),
            current_sample_index: 0,
        }
    }

    pub fn start_pixel(&mut self, pixel: Point2i) {
        self.current_pixel = pixel;
        self.current_sample_index = 0;
    }

    pub fn start_next_sample(&mut self) -> bool {
        self.current_sample_index += 1;
        self.current_sample_index < self.samples_per_pixel
    }
}
