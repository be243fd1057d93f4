use crate::Float;
use crate::film::Film;
use crate::filter::Filter;
use crate::spectrum::{Spectrum, spectrum_from_rgb8};
use std::path::Path;
use image::io::Reader;
use image::{DynamicImage, GenericImageView};
use anyhow::{anyhow, Context};

/// Load an 8-bit image as linear spectra, row by row, along with its (width, height).
pub fn load_image(path: impl AsRef<Path>) -> anyhow::Result<(Vec<Spectrum>, (usize, usize))> {
    let path = path.as_ref();
    let image = Reader::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .decode()?;
    let (w, h) = image.dimensions();
    let image: Vec<Spectrum> = match image {
        DynamicImage::ImageRgb8(img) => img.pixels().map(|p| spectrum_from_rgb8(p.0)).collect(),
        other => other.to_rgb8().pixels().map(|p| spectrum_from_rgb8(p.0)).collect(),
    };
    let image = image.into_iter()
        .map(|s| s.map(inverse_gamma_correct))
        .collect();
    Ok((image, (w as usize, h as usize)))
}

/// Resolve the film and write it out as an 8-bit image. The format follows the file extension.
pub fn write_image<F: Filter>(path: impl AsRef<Path>, film: &Film<F>) -> anyhow::Result<()> {
    let path = path.as_ref();
    let rgb_buf = film.resolve_rgb8();
    let img = image::RgbImage::from_raw(film.width(), film.height(), rgb_buf)
        .ok_or_else(|| anyhow!("resolved buffer does not match {}x{}", film.width(), film.height()))?;
    img.save(path).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// sRGB transfer curve
pub fn gamma_correct(v: Float) -> Float {
    if v <= 0.003_130_8 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

pub fn inverse_gamma_correct(v: Float) -> Float {
    if v <= 0.04045 {
        v * 1.0 / 12.92
    } else {
        ((v + 0.055) * 1.0 / 1.055).powf(2.4)
    }
}
