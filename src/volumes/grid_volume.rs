// Copyright @yucwang 2026

use crate::core::volume::Volume;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;
use crate::volumes::grid::CellGrid;
use crate::volumes::VolumeFilterMode;

/// Dense radiance-density field handed to a volume renderer. Values are
/// cell averages located at cell centres; lookups outside the box are zero.
#[derive(Debug, Clone)]
pub struct VolumeEstimate {
    grid: CellGrid,
    values: Vec<RGBSpectrum>,
    passes: u64,
    filter_mode: VolumeFilterMode,
}

impl VolumeEstimate {
    pub fn new(grid: CellGrid, values: Vec<RGBSpectrum>, passes: u64) -> Self {
        Self { grid, values, passes, filter_mode: VolumeFilterMode::Trilinear }
    }

    pub fn set_filter_mode(&mut self, filter_mode: VolumeFilterMode) {
        self.filter_mode = filter_mode;
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn values(&self) -> &[RGBSpectrum] {
        &self.values
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn cell_size(&self) -> Vector3f {
        self.grid.cell_size()
    }

    /// Value of cell `(x, y, z)`, `None` outside the grid.
    pub fn value(&self, x: usize, y: usize, z: usize) -> Option<RGBSpectrum> {
        let [nx, ny, nz] = self.grid.dims();
        if x >= nx || y >= ny || z >= nz {
            return None;
        }
        self.values.get(self.grid.linear_index(x, y, z)).copied()
    }

    // Callers clamp to the grid first.
    fn cell(&self, x: usize, y: usize, z: usize) -> RGBSpectrum {
        self.values[self.grid.linear_index(x, y, z)]
    }

    pub fn max_value(&self) -> Float {
        self.values.iter().map(|v| v.max_component()).fold(0.0, Float::max)
    }

    fn sample_nearest(&self, g: Vector3f) -> RGBSpectrum {
        let dims = self.grid.dims();
        let x = (g.x.floor() as isize).clamp(0, dims[0] as isize - 1) as usize;
        let y = (g.y.floor() as isize).clamp(0, dims[1] as isize - 1) as usize;
        let z = (g.z.floor() as isize).clamp(0, dims[2] as isize - 1) as usize;
        self.cell(x, y, z)
    }

    fn sample_trilinear(&self, g: Vector3f) -> RGBSpectrum {
        let dims = self.grid.dims();
        let x = g.x - 0.5;
        let y = g.y - 0.5;
        let z = g.z - 0.5;

        let x0 = x.floor() as isize;
        let y0 = y.floor() as isize;
        let z0 = z.floor() as isize;

        let tx = x - x0 as Float;
        let ty = y - y0 as Float;
        let tz = z - z0 as Float;

        let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;
        let (x0u, x1u) = (clamp(x0, dims[0]), clamp(x0 + 1, dims[0]));
        let (y0u, y1u) = (clamp(y0, dims[1]), clamp(y0 + 1, dims[1]));
        let (z0u, z1u) = (clamp(z0, dims[2]), clamp(z0 + 1, dims[2]));

        let c00 = self.cell(x0u, y0u, z0u) * (1.0 - tx) + self.cell(x1u, y0u, z0u) * tx;
        let c10 = self.cell(x0u, y1u, z0u) * (1.0 - tx) + self.cell(x1u, y1u, z0u) * tx;
        let c01 = self.cell(x0u, y0u, z1u) * (1.0 - tx) + self.cell(x1u, y0u, z1u) * tx;
        let c11 = self.cell(x0u, y1u, z1u) * (1.0 - tx) + self.cell(x1u, y1u, z1u) * tx;

        let c0 = c00 * (1.0 - ty) + c10 * ty;
        let c1 = c01 * (1.0 - ty) + c11 * ty;

        c0 * (1.0 - tz) + c1 * tz
    }
}

impl Volume for VolumeEstimate {
    fn bbox(&self) -> Option<AABB> {
        Some(*self.grid.bounds())
    }

    fn channels(&self) -> usize {
        3
    }

    fn eval(&self, p_world: Vector3f) -> Vector3f {
        if self.values.is_empty() || !self.grid.bounds().contains(&p_world) {
            return Vector3f::zeros();
        }

        let g = self.grid.to_grid(&p_world);
        let value = match self.filter_mode {
            VolumeFilterMode::Nearest => self.sample_nearest(g),
            VolumeFilterMode::Trilinear => self.sample_trilinear(g),
        };
        value.to_vector()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: Vector3f, b: Vector3f) -> bool {
        (a - b).norm() < 1e-5
    }

    fn ramp() -> VolumeEstimate {
        let grid = CellGrid::new([2, 1, 1], AABB::new(Vector3f::zeros(), Vector3f::new(2.0, 1.0, 1.0))).expect("grid");
        VolumeEstimate::new(grid, vec![RGBSpectrum::splat(1.0), RGBSpectrum::splat(3.0)], 4)
    }

    #[test]
    fn test_trilinear_between_cell_centres() {
        let volume = ramp();
        assert!(approx_eq(volume.eval(Vector3f::new(0.5, 0.5, 0.5)), Vector3f::new(1.0, 1.0, 1.0)));
        assert!(approx_eq(volume.eval(Vector3f::new(1.0, 0.5, 0.5)), Vector3f::new(2.0, 2.0, 2.0)));
        assert!(approx_eq(volume.eval(Vector3f::new(1.9, 0.2, 0.8)), Vector3f::new(3.0, 3.0, 3.0)));
        assert!((volume.eval_scalar(Vector3f::new(1.25, 0.5, 0.5)) - 2.5).abs() < 1e-5);
    }

    #[test]
    fn test_nearest_and_outside() {
        let mut volume = ramp();
        volume.set_filter_mode(VolumeFilterMode::Nearest);
        assert!(approx_eq(volume.eval(Vector3f::new(1.1, 0.5, 0.5)), Vector3f::new(3.0, 3.0, 3.0)));
        assert!(approx_eq(volume.eval(Vector3f::new(-0.1, 0.5, 0.5)), Vector3f::zeros()));
        assert_eq!(volume.passes(), 4);
        assert_eq!(volume.channels(), 3);
        assert_eq!(volume.max_value(), 3.0);
    }

    #[test]
    fn test_cell_lookup_outside_grid_is_none() {
        let volume = ramp();
        assert_eq!(volume.value(1, 0, 0), Some(RGBSpectrum::splat(3.0)));
        assert!(volume.value(2, 0, 0).is_none());
        assert!(volume.value(0, 1, 0).is_none());
        assert!(volume.value(0, 0, 7).is_none());
    }
}
