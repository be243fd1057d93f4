use crate::{Float, Point2i, Bounds2i, Bounds2f, Point2f, Vec2f};
use crate::filter::Filter;
use crate::spectrum::{Spectrum, spectrum_into_rgb8};
use crate::imageio::gamma_correct;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::warn;

const FILTER_TABLE_WIDTH: usize = 16;

type FilterTable = [[Float; FILTER_TABLE_WIDTH]; FILTER_TABLE_WIDTH];

/// Running sums for the filtered reconstruction of one pixel.
#[derive(Clone, Copy)]
pub struct Pixel {
    pub contrib_sum: Spectrum,
    pub filter_weight_sum: Float,
}

impl Default for Pixel {
    fn default() -> Self {
        Self { contrib_sum: Spectrum::zero(), filter_weight_sum: 0.0 }
    }
}

impl Pixel {
    /// The filtered pixel value. Only defined once at least one sample with nonzero filter
    /// weight has been accumulated.
    pub fn average(&self) -> Spectrum {
        debug_assert!(self.filter_weight_sum != 0.0, "reading a pixel with zero filter weight");
        self.contrib_sum / self.filter_weight_sum
    }
}

/// An `f32` that supports lock-free addition. There is no native atomic float add, so the
/// value is stored as raw bits and updated with a compare-and-swap retry loop.
#[derive(Default)]
pub struct AtomicFloat {
    bits: AtomicU32,
}

impl AtomicFloat {
    pub fn new(v: Float) -> Self {
        Self { bits: AtomicU32::new(v.to_bits()) }
    }

    pub fn load(&self) -> Float {
        Float::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn fetch_add(&self, v: Float) -> Float {
        let mut old_bits = self.bits.load(Ordering::Relaxed);
        loop {
            let new_bits = (Float::from_bits(old_bits) + v).to_bits();
            match self.bits.compare_exchange_weak(old_bits, new_bits, Ordering::SeqCst, Ordering::Relaxed) {
                Ok(_) => break,
                Err(x) => old_bits = x,
            }
        }
        Float::from_bits(old_bits)
    }
}

pub struct Film<F: Filter> {
    pub full_resolution: Point2i,
    pub cropped_pixel_bounds: Bounds2i,
    pub filter: F,
    /// Scale applied to every pixel when resolving
    pub exposure: Float,
    pixels: Mutex<Vec<Pixel>>,
    /// Unfiltered contributions added directly with `add_pixel`
    raw: Vec<[AtomicFloat; 3]>,
    filter_table: FilterTable,
}

impl<F: Filter> Film<F> {
    /// `crop_window` is given in normalized [0, 1] image coordinates.
    pub fn new(
        resolution: Point2i,
        crop_window: Bounds2f,
        filter: F,
        exposure: Float,
    ) -> Self {
        let low_x = (resolution.x as Float * crop_window.min.x).ceil() as i32;
        let low_y = (resolution.y as Float * crop_window.min.y).ceil() as i32;
        let high_x = (resolution.x as Float * crop_window.max.x).ceil() as i32;
        let high_y = (resolution.y as Float * crop_window.max.y).ceil() as i32;

        let cropped_pixel_bounds = Bounds2i::with_bounds(
            Point2i::new(low_x, low_y),
            Point2i::new(high_x, high_y)
        );

        let n_pixels = cropped_pixel_bounds.area().max(0) as usize;
        let pixels = vec![Pixel::default(); n_pixels];
        let raw = (0..n_pixels).map(|_| Default::default()).collect();

        let radius = filter.radius();
        let mut filter_table = [[0.0; FILTER_TABLE_WIDTH]; FILTER_TABLE_WIDTH];
        for (y, row) in filter_table.iter_mut().enumerate() {
            for (x, val) in row.iter_mut().enumerate() {
                let p = Point2f::new(
                    (x as Float + 0.5) * radius.x / FILTER_TABLE_WIDTH as Float,
                    (y as Float + 0.5) * radius.y / FILTER_TABLE_WIDTH as Float
                );

                *val = filter.evaluate(&p);
            }
        }

        Self {
            full_resolution: resolution,
            cropped_pixel_bounds,
            filter,
            exposure,
            pixels: Mutex::new(pixels),
            raw,
            filter_table,
        }
    }

    /// Film covering the whole image, with unit exposure.
    pub fn with_resolution(resolution: Point2i, filter: F) -> Self {
        Self::new(
            resolution,
            Bounds2f::with_bounds(Point2f::new(0.0, 0.0), Point2f::new(1.0, 1.0)),
            filter,
            1.0,
        )
    }

    pub fn width(&self) -> u32 {
        self.cropped_pixel_bounds.diagonal().x.max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.cropped_pixel_bounds.diagonal().y.max(0) as u32
    }

    /// The range of pixel values that must be sampled,
    /// this is larger than the size of the image to allow pixels
    /// at the edge to have an equal number of samples.
    pub fn sample_bounds(&self) -> Bounds2i {
        let r = self.filter.radius();
        let low_x = (self.cropped_pixel_bounds.min.x as Float + 0.5 - r.x).floor() as i32;
        let low_y = (self.cropped_pixel_bounds.min.y as Float + 0.5 - r.y).floor() as i32;
        let high_x = (self.cropped_pixel_bounds.max.x as Float - 0.5 + r.x).ceil() as i32;
        let high_y = (self.cropped_pixel_bounds.max.y as Float - 0.5 + r.y).ceil() as i32;

        Bounds2i::with_bounds(Point2i::new(low_x, low_y), Point2i::new(high_x, high_y))
    }

    /// Create a tile that accumulates samples taken in `sample_bounds`. Its pixels cover every
    /// pixel those samples can reach through the filter, clipped to the film.
    pub fn get_film_tile(&self, sample_bounds: Bounds2i) -> FilmTile {
        let r = self.filter.radius();
        let p0x = (sample_bounds.min.x as Float - 0.5 - r.x).ceil() as i32;
        let p0y = (sample_bounds.min.y as Float - 0.5 - r.y).ceil() as i32;

        let p1x = (sample_bounds.max.x as Float - 0.5 + r.x).floor() as i32 + 1;
        let p1y = (sample_bounds.max.y as Float - 0.5 + r.y).floor() as i32 + 1;

        let tile_pixel_bounds = Bounds2i::with_bounds(Point2i::new(p0x, p0y), Point2i::new(p1x, p1y))
            .intersection(&self.cropped_pixel_bounds);

        FilmTile {
            pixel_bounds: tile_pixel_bounds,
            filter_radius: r,
            inv_filter_radius: Vec2f::new(1.0 / r.x, 1.0 / r.y),
            filter_table: &self.filter_table,
            pixels: vec![FilmTilePixel::default(); tile_pixel_bounds.area().max(0) as usize],
        }
    }

    /// Add a finished tile's sums into the film. Addition is commutative so tiles may be merged
    /// in any order.
    pub fn merge_film_tile(&self, tile: FilmTile) {
        let mut pixels = self.pixels.lock();
        for p in tile.pixel_bounds.iter_points() {
            let tile_pixel = tile.pixel(p);
            let i = self.pixel_index(p);
            let pixel = &mut pixels[i];
            pixel.contrib_sum += tile_pixel.contrib_sum;
            pixel.filter_weight_sum += tile_pixel.filter_weight_sum;
        }
    }

    /// Add `v` straight into the unfiltered buffer at the pixel containing `p`. Safe to call
    /// concurrently from any thread. Points outside the film are ignored.
    pub fn add_pixel(&self, p: Point2f, v: Spectrum) {
        if v.has_nans() {
            warn!(x = p.x, y = p.y, "ignoring NaN value passed to add_pixel");
            return;
        }
        let pi = Point2i::new(p.x.floor() as i32, p.y.floor() as i32);
        if !self.cropped_pixel_bounds.inside_exclusive(pi) {
            return;
        }
        let raw = &self.raw[self.pixel_index(pi)];
        for c in 0..3 {
            raw[c].fetch_add(v[c]);
        }
    }

    fn pixel_index(&self, p: Point2i) -> usize {
        debug_assert!(self.cropped_pixel_bounds.inside_exclusive(p));
        let width = self.cropped_pixel_bounds.max.x - self.cropped_pixel_bounds.min.x;
        let offset_x = p.x - self.cropped_pixel_bounds.min.x;
        let offset_y = p.y - self.cropped_pixel_bounds.min.y;
        (offset_y * width + offset_x) as usize
    }

    /// Linear pixel values (filtered average plus raw contributions, times exposure), row by
    /// row over the cropped bounds.
    pub fn into_spectrum_buffer(&self) -> Vec<Spectrum> {
        let pixels = self.pixels.lock();
        pixels.iter()
            .zip(self.raw.iter())
            .map(|(pixel, raw)| {
                let raw = Spectrum::rgb(raw[0].load(), raw[1].load(), raw[2].load());
                (pixel.average() + raw) * self.exposure
            })
            .collect()
    }

    /// Resolve to gamma encoded 8-bit RGB, row by row. NaN pixels are reported but still
    /// written (as black after clamping).
    pub fn resolve_rgb8(&self) -> Vec<u8> {
        let width = self.width().max(1) as usize;
        let mut out = Vec::with_capacity(self.cropped_pixel_bounds.area().max(0) as usize * 3);
        for (i, value) in self.into_spectrum_buffer().into_iter().enumerate() {
            if value.has_nans() {
                warn!(
                    x = self.cropped_pixel_bounds.min.x + (i % width) as i32,
                    y = self.cropped_pixel_bounds.min.y + (i / width) as i32,
                    "NaN pixel value"
                );
            }
            let encoded = value.map(gamma_correct);
            out.extend_from_slice(&spectrum_into_rgb8(encoded));
        }
        out
    }
}

#[derive(Clone, Copy)]
struct FilmTilePixel {
    contrib_sum: Spectrum,
    filter_weight_sum: Float,
}

impl Default for FilmTilePixel {
    fn default() -> Self {
        Self { contrib_sum: Spectrum::zero(), filter_weight_sum: 0.0 }
    }
}

/// A private accumulator for the samples of one render tile.
pub struct FilmTile<'a> {
    pixel_bounds: Bounds2i,
    filter_radius: Vec2f,
    inv_filter_radius: Vec2f,
    filter_table: &'a FilterTable,
    pixels: Vec<FilmTilePixel>,
}

impl<'a> FilmTile<'a> {
    pub fn pixel_bounds(&self) -> Bounds2i {
        self.pixel_bounds
    }

    /// Splat the sample at continuous film position `p_film` onto every tile pixel within the
    /// filter radius.
    pub fn add_sample(&mut self, p_film: Point2f, radiance: Spectrum, sample_weight: Float) {
        // discrete coordinates put pixel centers at integers
        let pfd = Point2f::new(p_film.x - 0.5, p_film.y - 0.5);
        let p0 = Point2i::new(
            ((pfd.x - self.filter_radius.x).ceil() as i32).max(self.pixel_bounds.min.x),
            ((pfd.y - self.filter_radius.y).ceil() as i32).max(self.pixel_bounds.min.y),
        );
        let p1 = Point2i::new(
            ((pfd.x + self.filter_radius.x).floor() as i32 + 1).min(self.pixel_bounds.max.x),
            ((pfd.y + self.filter_radius.y).floor() as i32 + 1).min(self.pixel_bounds.max.y),
        );
        if p1.x <= p0.x || p1.y <= p0.y {
            return;
        }

        let table_index = |d: Float, inv_r: Float| {
            ((d.abs() * inv_r * FILTER_TABLE_WIDTH as Float).floor() as usize).min(FILTER_TABLE_WIDTH - 1)
        };

        for y in p0.y..p1.y {
            let iy = table_index(y as Float - pfd.y, self.inv_filter_radius.y);
            for x in p0.x..p1.x {
                let ix = table_index(x as Float - pfd.x, self.inv_filter_radius.x);
                let filter_weight = self.filter_table[iy][ix];

                let pixel = self.pixel_mut(Point2i::new(x, y));
                pixel.contrib_sum += radiance * sample_weight * filter_weight;
                pixel.filter_weight_sum += filter_weight;
            }
        }
    }

    fn index(&self, p: Point2i) -> usize {
        debug_assert!(self.pixel_bounds.inside_exclusive(p));
        let width = self.pixel_bounds.max.x - self.pixel_bounds.min.x;
        ((p.y - self.pixel_bounds.min.y) * width + (p.x - self.pixel_bounds.min.x)) as usize
    }

    fn pixel(&self, p: Point2i) -> &FilmTilePixel {
        &self.pixels[self.index(p)]
    }

    fn pixel_mut(&mut self, p: Point2i) -> &mut FilmTilePixel {
        let i = self.index(p);
        &mut self.pixels[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{BoxFilter, TriangleFilter};
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng};
    use rand::seq::SliceRandom;
    use rand_xoshiro::Xoshiro256Plus;
    use rayon::prelude::*;

    #[test]
    fn test_single_sample_reconstructs_exactly() {
        let film = Film::with_resolution(Point2i::new(4, 4), BoxFilter::default());
        let mut tile = film.get_film_tile(film.sample_bounds());
        let l = Spectrum::rgb(0.25, 3.0, 7.5);
        for p in film.cropped_pixel_bounds.iter_points() {
            let center = Point2f::new(p.x as Float + 0.5, p.y as Float + 0.5);
            if p == Point2i::new(2, 1) {
                tile.add_sample(center, l, 1.0);
            } else {
                tile.add_sample(center, Spectrum::zero(), 1.0);
            }
        }
        film.merge_film_tile(tile);

        let buf = film.into_spectrum_buffer();
        assert_eq!(buf[4 + 2], l);
        assert!(buf[4 + 1].is_black());
        assert!(buf[2 * 4 + 2].is_black());
    }

    #[test]
    fn test_tile_pixels_stay_inside_film() {
        let film = Film::with_resolution(Point2i::new(20, 10), TriangleFilter::new(Vec2f::new(2.0, 2.0)));
        for sample_tile in film.sample_bounds().iter_tiles(8) {
            let tile = film.get_film_tile(sample_tile);
            assert!(film.cropped_pixel_bounds.contains(&tile.pixel_bounds()));
        }
    }

    fn fill_tiles<'a>(film: &'a Film<TriangleFilter>, seed: u64) -> Vec<FilmTile<'a>> {
        film.sample_bounds().iter_tiles(4).enumerate().map(|(i, bounds)| {
            let mut rng = Xoshiro256Plus::seed_from_u64(seed + i as u64);
            let mut tile = film.get_film_tile(bounds);
            for p in bounds.iter_points() {
                for _ in 0..4 {
                    let p_film = Point2f::new(p.x as Float + rng.gen::<Float>(), p.y as Float + rng.gen::<Float>());
                    let l = Spectrum::rgb(rng.gen(), rng.gen(), rng.gen());
                    tile.add_sample(p_film, l, 1.0);
                }
            }
            tile
        }).collect()
    }

    #[test]
    fn test_tile_merge_order_independent() {
        let make_film = || Film::with_resolution(Point2i::new(12, 9), TriangleFilter::new(Vec2f::new(1.5, 1.5)));
        let in_order = make_film();
        let shuffled = make_film();

        for tile in fill_tiles(&in_order, 100) {
            in_order.merge_film_tile(tile);
        }

        let mut tiles = fill_tiles(&shuffled, 100);
        tiles.shuffle(&mut Xoshiro256Plus::seed_from_u64(5));
        for tile in tiles {
            shuffled.merge_film_tile(tile);
        }

        let a = in_order.into_spectrum_buffer();
        let b = shuffled.into_spectrum_buffer();
        for (x, y) in a.iter().zip(b.iter()) {
            for c in 0..3 {
                assert_abs_diff_eq!(x[c], y[c], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_concurrent_add_pixel() {
        let film = Film::with_resolution(Point2i::new(2, 2), BoxFilter::default());
        (0..1000).into_par_iter().for_each(|_| {
            film.add_pixel(Point2f::new(1.5, 0.2), Spectrum::uniform(1.0));
        });
        // ignored, outside the film
        film.add_pixel(Point2f::new(5.0, 0.2), Spectrum::uniform(1.0));

        let mut tile = film.get_film_tile(film.sample_bounds());
        for p in film.cropped_pixel_bounds.iter_points() {
            tile.add_sample(Point2f::new(p.x as Float + 0.5, p.y as Float + 0.5), Spectrum::zero(), 1.0);
        }
        film.merge_film_tile(tile);

        let buf = film.into_spectrum_buffer();
        assert_eq!(buf[1], Spectrum::uniform(1000.0));
        assert!(buf[0].is_black());
    }

    #[test]
    fn test_resolve_applies_exposure_and_gamma() {
        let film = Film::new(
            Point2i::new(1, 1),
            Bounds2f::with_bounds(Point2f::new(0.0, 0.0), Point2f::new(1.0, 1.0)),
            BoxFilter::default(),
            2.0,
        );
        let mut tile = film.get_film_tile(film.sample_bounds());
        tile.add_sample(Point2f::new(0.5, 0.5), Spectrum::rgb(0.0, 0.1, 1.0), 1.0);
        film.merge_film_tile(tile);
        let rgb = film.resolve_rgb8();
        assert_eq!(rgb.len(), 3);
        assert_eq!(rgb[0], 0);
        assert_eq!(rgb[1], (gamma_correct(0.2) * 255.0).round() as u8);
        assert_eq!(rgb[2], 255);
    }
}
