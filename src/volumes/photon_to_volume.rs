// Copyright @yucwang 2026

use crate::core::computation_node::{generate_node_id, ComputationNode};
use crate::core::device::{Device, KernelProgram};
use crate::core::error::TracerError;
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;
use crate::volumes::accumulator::{AccumulatorSnapshot, LightVolumeAccumulator};
use crate::volumes::grid_volume::VolumeEstimate;

use std::sync::Arc;

pub const PHOTON_TO_VOLUME_KERNEL: &str = "photon_to_volume";

/// Density estimation kernel over the cell neighbourhood, `radius` in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityKernel {
    Nearest,
    Box { radius: usize },
    Tent { radius: usize },
}

impl DensityKernel {
    fn radius(&self) -> usize {
        match *self {
            DensityKernel::Nearest => 0,
            DensityKernel::Box { radius } | DensityKernel::Tent { radius } => radius,
        }
    }

    fn weight(&self, offset: [isize; 3]) -> Float {
        match *self {
            DensityKernel::Nearest | DensityKernel::Box { .. } => 1.0,
            DensityKernel::Tent { radius } => {
                let span = (radius + 1) as Float;
                offset.iter().map(|d| 1.0 - (d.abs() as Float) / span).product()
            }
        }
    }
}

/// Turns per-cell running means into a smooth field for rendering. Works on a
/// private snapshot, so it never touches the live accumulator.
pub struct PhotonToVolume {
    id: String,
    device: Arc<Device>,
    program: KernelProgram,
    kernel: DensityKernel,
    work_group_size: usize,
}

impl PhotonToVolume {
    pub fn new(device: Arc<Device>, kernel: DensityKernel, work_group_size: usize) -> Self {
        let program = device.program(PHOTON_TO_VOLUME_KERNEL);
        Self { id: generate_node_id("PhotonToVolume"), device, program, kernel, work_group_size }
    }

    pub fn kernel(&self) -> DensityKernel {
        self.kernel
    }

    pub fn set_kernel(&mut self, kernel: DensityKernel) {
        self.kernel = kernel;
    }

    pub fn convert_accumulator(&self, accumulator: &LightVolumeAccumulator) -> Result<VolumeEstimate, TracerError> {
        let snapshot = accumulator.snapshot()?;
        self.convert(&snapshot)
    }

    pub fn convert(&self, snapshot: &AccumulatorSnapshot) -> Result<VolumeEstimate, TracerError> {
        let grid = snapshot.grid;
        if snapshot.cells.len() != grid.cell_count() {
            return Err(TracerError::config(format!(
                "snapshot has {} cells, grid expects {}",
                snapshot.cells.len(),
                grid.cell_count()
            )));
        }

        let dims = grid.dims();
        let r = self.kernel.radius() as isize;
        let kernel = self.kernel;
        let cells = &snapshot.cells;
        let mut values = vec![RGBSpectrum::default(); cells.len()];
        self.device.dispatch(&self.program, self.work_group_size, &[], &mut values, |index, out| {
            let (x, y, z) = grid.coords(index);
            let mut sum = RGBSpectrum::default();
            let mut weight_sum: Float = 0.0;
            for dz in -r..=r {
                for dy in -r..=r {
                    for dx in -r..=r {
                        let (nx, ny, nz) = (x as isize + dx, y as isize + dy, z as isize + dz);
                        if nx < 0 || ny < 0 || nz < 0
                            || nx >= dims[0] as isize || ny >= dims[1] as isize || nz >= dims[2] as isize
                        {
                            continue;
                        }
                        let w = kernel.weight([dx, dy, dz]);
                        sum += cells[grid.linear_index(nx as usize, ny as usize, nz as usize)] * w;
                        weight_sum += w;
                    }
                }
            }
            if weight_sum <= 0.0 {
                return Err("empty filter footprint".to_string());
            }
            *out = sum / weight_sum;
            Ok(())
        })?;

        log::debug!("{} converted {} cells after {} passes with {:?}", self.id, cells.len(), snapshot.passes, kernel);
        Ok(VolumeEstimate::new(grid, values, snapshot.passes))
    }
}

impl ComputationNode for PhotonToVolume {
    fn id(&self) -> &str {
        &self.id
    }

    fn describe(&self) -> String {
        format!("PhotonToVolume[{}] {:?}", self.id, self.kernel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::aabb::AABB;
    use crate::math::constants::Vector3f;
    use crate::volumes::grid::CellGrid;

    fn spike() -> AccumulatorSnapshot {
        let grid = CellGrid::new([5, 5, 5], AABB::new(Vector3f::zeros(), Vector3f::new(5.0, 5.0, 5.0))).expect("grid");
        let mut cells = vec![RGBSpectrum::default(); grid.cell_count()];
        cells[grid.linear_index(2, 2, 2)] = RGBSpectrum::splat(27.0);
        AccumulatorSnapshot { grid, cells, passes: 3 }
    }

    #[test]
    fn test_nearest_is_identity() {
        let snapshot = spike();
        let converter = PhotonToVolume::new(Arc::new(Device::with_workers(2)), DensityKernel::Nearest, 16);
        let estimate = converter.convert(&snapshot).expect("convert");
        assert_eq!(estimate.values(), snapshot.cells.as_slice());
        assert_eq!(estimate.passes(), 3);
    }

    #[test]
    fn test_box_spreads_and_preserves_constants() {
        let snapshot = spike();
        let converter = PhotonToVolume::new(Arc::new(Device::with_workers(2)), DensityKernel::Box { radius: 1 }, 16);
        let estimate = converter.convert(&snapshot).expect("convert");
        assert!((estimate.value(2, 2, 2).expect("cell")[0] - 1.0).abs() < 1e-5);
        assert!((estimate.value(1, 3, 2).expect("cell")[0] - 1.0).abs() < 1e-5);
        assert!(estimate.value(0, 0, 0).expect("cell").is_black());

        let flat = AccumulatorSnapshot { cells: vec![RGBSpectrum::splat(2.0); snapshot.cells.len()], ..snapshot };
        let estimate = converter.convert(&flat).expect("convert");
        assert!(estimate.values().iter().all(|v| (v[1] - 2.0).abs() < 1e-5));
    }

    #[test]
    fn test_tent_is_symmetric_and_peaked() {
        let snapshot = spike();
        let mut converter = PhotonToVolume::new(Arc::new(Device::with_workers(3)), DensityKernel::Nearest, 8);
        converter.set_kernel(DensityKernel::Tent { radius: 2 });
        assert_eq!(converter.kernel(), DensityKernel::Tent { radius: 2 });
        let estimate = converter.convert(&snapshot).expect("convert");
        let centre = estimate.value(2, 2, 2).expect("cell")[0];
        assert!(centre > estimate.value(1, 2, 2).expect("cell")[0]);
        assert!((estimate.value(1, 2, 2).expect("cell")[0] - estimate.value(3, 2, 2).expect("cell")[0]).abs() < 1e-5);
        assert!((estimate.value(2, 1, 2).expect("cell")[0] - estimate.value(2, 3, 2).expect("cell")[0]).abs() < 1e-5);
    }

    #[test]
    fn test_does_not_touch_the_accumulator() {
        let device = Arc::new(Device::with_workers(1));
        let grid = CellGrid::new([2, 2, 2], AABB::new(Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0))).expect("grid");
        let mut accumulator = LightVolumeAccumulator::new(device.clone(), grid, 4);
        accumulator.commit_pass(&vec![RGBSpectrum::splat(1.5); 8], &[]).expect("commit");
        let before = accumulator.snapshot().expect("snapshot");

        let converter = PhotonToVolume::new(device, DensityKernel::Box { radius: 1 }, 4);
        let estimate = converter.convert_accumulator(&accumulator).expect("convert");
        assert_eq!(estimate.passes(), 1);
        assert_eq!(accumulator.snapshot().expect("snapshot").cells, before.cells);
    }
}
