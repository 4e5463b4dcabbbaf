// Copyright @yucwang 2026

use std::path::Path;

use crate::core::sample_generator::Sample2D;

use image::{ImageResult, Rgb, RgbImage};

/// Plots 2D samples into a `size` x `size` PNG, one white pixel per sample
/// with +y pointing up. Handy for eyeballing stratification.
pub fn sample_scatter_image(samples: &[Sample2D], size: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(size, size, Rgb([16, 16, 16]));
    if size == 0 {
        return img;
    }
    let scale = size as f32;
    for sample in samples {
        if !(0.0..1.0).contains(&sample.x) || !(0.0..1.0).contains(&sample.y) {
            continue;
        }
        let px = ((sample.x * scale) as u32).min(size - 1);
        let py = size - 1 - ((sample.y * scale) as u32).min(size - 1);
        img.put_pixel(px, py, Rgb([255, 255, 255]));
    }
    img
}

pub fn write_sample_scatter<P: AsRef<Path>>(samples: &[Sample2D], size: u32, path: P) -> ImageResult<()> {
    let img = sample_scatter_image(samples, size);
    img.save(path.as_ref())?;
    log::info!("Wrote {} samples to: {}.", samples.len(), path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scatter_marks_sample_pixels() {
        let samples = [Sample2D::new(0.0, 0.0, 1.0), Sample2D::new(0.99, 0.99, 1.0), Sample2D::new(1.5, 0.2, 1.0)];
        let img = sample_scatter_image(&samples, 10);
        assert_eq!(img.get_pixel(0, 9), &Rgb([255, 255, 255]));
        assert_eq!(img.get_pixel(9, 0), &Rgb([255, 255, 255]));
        let lit = img.pixels().filter(|p| p.0 == [255, 255, 255]).count();
        assert_eq!(lit, 2);
    }

    #[test]
    fn test_write_png() {
        let path = std::env::temp_dir().join("lumenvol_image_utils_test.png");
        write_sample_scatter(&[Sample2D::new(0.5, 0.5, 1.0)], 16, &path).expect("write png");
        let loaded = image::open(&path).expect("read back").to_rgb8();
        assert_eq!(loaded.dimensions(), (16, 16));
        assert_eq!(loaded.get_pixel(8, 7), &Rgb([255, 255, 255]));
        let _ = std::fs::remove_file(&path);
    }
}
