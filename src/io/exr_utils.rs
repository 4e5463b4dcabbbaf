/* Copyright 2020 @TwoCookingMice */

use crate::math::constants::Float;
use crate::volumes::grid_volume::VolumeEstimate;

use exr::prelude::*;

/// Linear RGB pixels of slice `z`, row-major with +y pointing up in the image.
pub fn volume_slice_pixels(volume: &VolumeEstimate, z: usize) -> Option<(Vec<(Float, Float, Float)>, usize, usize)> {
    let [width, height, depth] = volume.grid().dims();
    if z >= depth {
        return None;
    }
    let mut pixels = Vec::with_capacity(width * height);
    for row in 0..height {
        let y = height - 1 - row;
        for x in 0..width {
            let v = volume.value(x, y, z).unwrap_or_default();
            pixels.push((v[0], v[1], v[2]));
        }
    }
    Some((pixels, width, height))
}

// Write EXR Image to file
pub fn write_exr_to_file(image: &[(Float, Float, Float)],
                         width: usize,
                         height: usize,
                         file_path: &str) -> std::result::Result<(), exr::error::Error> {
    log::info!("Starting writing openexr images: {}.", file_path);

    write_rgb_file(file_path, width, height, |x, y| {
        (
            image[y * width + x].0,
            image[y * width + x].1,
            image[y * width + x].2
        )
    })?;
    log::info!("EXR written to: {}.", file_path);
    Ok(())
}

/// Writes one z-slice of the light volume as an OpenEXR image.
pub fn write_volume_slice(volume: &VolumeEstimate, z: usize, file_path: &str) -> std::result::Result<(), exr::error::Error> {
    let (pixels, width, height) = volume_slice_pixels(volume, z).ok_or_else(|| {
        exr::error::Error::Invalid(format!("slice {} outside a volume of depth {}", z, volume.grid().dims()[2]).into())
    })?;
    write_exr_to_file(&pixels, width, height, file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::aabb::AABB;
    use crate::math::constants::Vector3f;
    use crate::math::spectrum::RGBSpectrum;
    use crate::volumes::grid::CellGrid;

    fn volume() -> VolumeEstimate {
        let grid = CellGrid::new([3, 2, 2], AABB::new(Vector3f::zeros(), Vector3f::new(3.0, 2.0, 2.0))).expect("grid");
        let values = (0..grid.cell_count()).map(|i| RGBSpectrum::splat(i as Float)).collect();
        VolumeEstimate::new(grid, values, 1)
    }

    #[test]
    fn test_slice_is_flipped_so_y_points_up() {
        let volume = volume();
        let (pixels, width, height) = volume_slice_pixels(&volume, 1).expect("slice");
        assert_eq!((width, height), (3, 2));
        // Top-left pixel is (x = 0, y = 1, z = 1).
        assert_eq!(pixels[0].0, volume.value(0, 1, 1).expect("cell")[0]);
        assert_eq!(pixels[3].0, volume.value(0, 0, 1).expect("cell")[0]);
        assert!(volume_slice_pixels(&volume, 2).is_none());
    }

    #[test]
    fn test_write_slice() {
        let path = std::env::temp_dir().join("lumenvol_exr_utils_test.exr");
        let path = path.to_string_lossy().to_string();
        write_volume_slice(&volume(), 0, &path).expect("write exr");
        let bytes = std::fs::read(&path).expect("read back");
        assert_eq!(&bytes[..4], &[0x76, 0x2f, 0x31, 0x01]);
        assert!(write_volume_slice(&volume(), 5, &path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
