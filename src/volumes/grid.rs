// Copyright @yucwang 2026

use crate::core::error::TracerError;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};

/// Cell layout of a dense grid over a box. Cells are stored x-fastest:
/// `index = (z * ny + y) * nx + x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellGrid {
    dims: [usize; 3],
    bounds: AABB,
}

// Points this far outside the box (relative to a cell) still land in a border cell.
const BORDER_TOLERANCE: Float = 1e-3;

impl CellGrid {
    pub fn new(dims: [usize; 3], bounds: AABB) -> Result<Self, TracerError> {
        if dims.iter().any(|d| *d == 0) {
            return Err(TracerError::config(format!("grid resolution {:?} must be positive on every axis", dims)));
        }
        if !bounds.is_valid() {
            return Err(TracerError::config("grid bounds are empty"));
        }
        Ok(Self { dims, bounds: pad_flat_axes(&bounds) })
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn bounds(&self) -> &AABB {
        &self.bounds
    }

    pub fn cell_count(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    pub fn cell_size(&self) -> Vector3f {
        let d = self.bounds.diagnal();
        Vector3f::new(
            d.x / self.dims[0] as Float,
            d.y / self.dims[1] as Float,
            d.z / self.dims[2] as Float,
        )
    }

    pub fn cell_volume(&self) -> Float {
        let s = self.cell_size();
        s.x * s.y * s.z
    }

    pub fn linear_index(&self, x: usize, y: usize, z: usize) -> usize {
        (z * self.dims[1] + y) * self.dims[0] + x
    }

    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let x = index % self.dims[0];
        let y = (index / self.dims[0]) % self.dims[1];
        let z = index / (self.dims[0] * self.dims[1]);
        (x, y, z)
    }

    pub fn cell_center(&self, index: usize) -> Vector3f {
        let (x, y, z) = self.coords(index);
        let s = self.cell_size();
        self.bounds.p_min + Vector3f::new((x as Float + 0.5) * s.x, (y as Float + 0.5) * s.y, (z as Float + 0.5) * s.z)
    }

    /// Continuous grid coordinates: cell `i` spans `[i, i + 1)` on each axis.
    pub fn to_grid(&self, p: &Vector3f) -> Vector3f {
        let rel = p - self.bounds.p_min;
        let d = self.bounds.diagnal();
        Vector3f::new(
            rel.x / d.x * self.dims[0] as Float,
            rel.y / d.y * self.dims[1] as Float,
            rel.z / d.z * self.dims[2] as Float,
        )
    }

    /// Cell containing `p`, or `None` when `p` lies outside the grid.
    pub fn cell_index(&self, p: &Vector3f) -> Option<usize> {
        let g = self.to_grid(p);
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            let n = self.dims[axis] as Float;
            let v = g[axis];
            if !v.is_finite() || v < -BORDER_TOLERANCE || v > n + BORDER_TOLERANCE {
                return None;
            }
            idx[axis] = (v.max(0.0) as usize).min(self.dims[axis] - 1);
        }
        Some(self.linear_index(idx[0], idx[1], idx[2]))
    }
}

// Planar geometry gives a box with no thickness; give such axes a slab of
// 5% of the largest extent so cells keep a finite volume.
fn pad_flat_axes(bounds: &AABB) -> AABB {
    let d = bounds.diagnal();
    let largest = d.x.max(d.y).max(d.z).max(1e-3);
    let mut padded = *bounds;
    for axis in 0..3 {
        if d[axis] < largest * 1e-4 {
            let half = 0.025 * largest;
            padded.p_min[axis] -= half;
            padded.p_max[axis] += half;
        }
    }
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip_and_centers() {
        let grid = CellGrid::new([4, 3, 2], AABB::new(Vector3f::zeros(), Vector3f::new(4.0, 3.0, 2.0))).expect("grid");
        assert_eq!(grid.cell_count(), 24);
        assert!((grid.cell_volume() - 1.0).abs() < 1e-6);
        for index in 0..grid.cell_count() {
            let (x, y, z) = grid.coords(index);
            assert_eq!(grid.linear_index(x, y, z), index);
            assert_eq!(grid.cell_index(&grid.cell_center(index)), Some(index));
        }
    }

    #[test]
    fn test_points_on_the_far_face_stay_inside() {
        let grid = CellGrid::new([2, 2, 2], AABB::new(Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0))).expect("grid");
        assert_eq!(grid.cell_index(&Vector3f::new(1.0, 1.0, 1.0)), Some(7));
        assert_eq!(grid.cell_index(&Vector3f::new(0.0, 0.0, 0.0)), Some(0));
        assert_eq!(grid.cell_index(&Vector3f::new(1.5, 0.5, 0.5)), None);
    }

    #[test]
    fn test_flat_bounds_are_padded() {
        let flat = AABB::new(Vector3f::new(-1.0, 0.0, -1.0), Vector3f::new(1.0, 0.0, 1.0));
        let grid = CellGrid::new([4, 4, 4], flat).expect("grid");
        assert!(grid.cell_volume() > 0.0);
        assert!(grid.cell_index(&Vector3f::new(0.3, 0.0, -0.2)).is_some());
    }

    #[test]
    fn test_rejects_zero_resolution() {
        let bounds = AABB::new(Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0));
        assert!(CellGrid::new([0, 1, 1], bounds).is_err());
        assert!(CellGrid::new([1, 1, 1], AABB::default()).is_err());
    }
}
