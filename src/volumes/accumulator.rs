// Copyright @yucwang 2026

//! Progressive light volume: every cell holds the running mean of the
//! radiance density deposited into it by all completed passes.

use crate::core::device::{Device, Event, KernelProgram};
use crate::core::error::TracerError;
use crate::core::interop::{DisplayView, SharedBuffer};
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;
use crate::volumes::grid::CellGrid;

use std::sync::Arc;

pub const ACCUMULATE_KERNEL: &str = "accumulate_incremental_mean";

/// Stable copy of the accumulator taken between two commits.
#[derive(Debug, Clone)]
pub struct AccumulatorSnapshot {
    pub grid: CellGrid,
    pub cells: Vec<RGBSpectrum>,
    pub passes: u64,
}

/// Single writer, any number of readers. Cells only change in
/// [`LightVolumeAccumulator::commit_pass`], which either applies a whole pass
/// or nothing.
pub struct LightVolumeAccumulator {
    grid: CellGrid,
    cells: Arc<SharedBuffer<RGBSpectrum>>,
    passes: u64,
    device: Arc<Device>,
    program: KernelProgram,
    work_group_size: usize,
}

impl LightVolumeAccumulator {
    pub fn new(device: Arc<Device>, grid: CellGrid, work_group_size: usize) -> Self {
        let program = device.program(ACCUMULATE_KERNEL);
        let cells = Arc::new(SharedBuffer::new("light_volume", vec![RGBSpectrum::default(); grid.cell_count()]));
        Self { grid, cells, passes: 0, device, program, work_group_size }
    }

    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// The compute-owned cell buffer, for a display context that reads it in place.
    pub fn shared_cells(&self) -> Arc<SharedBuffer<RGBSpectrum>> {
        Arc::clone(&self.cells)
    }

    pub fn read(&self) -> Result<DisplayView<'_, RGBSpectrum>, TracerError> {
        self.cells.read()
    }

    pub fn snapshot(&self) -> Result<AccumulatorSnapshot, TracerError> {
        Ok(AccumulatorSnapshot { grid: self.grid, cells: self.cells.copy_out()?, passes: self.passes })
    }

    /// Folds one pass into the running mean: `cell = (k * cell + c) / (k + 1)`.
    /// The new means are computed into scratch first; on error nothing changes.
    pub fn commit_pass(&mut self, contribution: &[RGBSpectrum], wait_list: &[Event]) -> Result<Event, TracerError> {
        if contribution.len() != self.grid.cell_count() {
            return Err(TracerError::config(format!(
                "pass has {} cells, accumulator has {}",
                contribution.len(),
                self.grid.cell_count()
            )));
        }

        let previous = self.cells.copy_out()?;
        let k = self.passes as Float;
        let mut scratch = vec![RGBSpectrum::default(); previous.len()];
        let event = self.device.dispatch(&self.program, self.work_group_size, wait_list, &mut scratch, |cell, out| {
            let mean = (previous[cell] * k + contribution[cell]) / (k + 1.0);
            if !mean.is_finite() {
                return Err(format!("non-finite running mean in cell {}", cell));
            }
            *out = mean;
            Ok(())
        })?;

        {
            let mut cells = self.cells.acquire()?;
            cells.copy_from_slice(&scratch);
        }
        self.passes += 1;
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::aabb::AABB;
    use crate::math::constants::Vector3f;

    fn accumulator(device: Arc<Device>) -> LightVolumeAccumulator {
        let grid = CellGrid::new([2, 2, 1], AABB::new(Vector3f::zeros(), Vector3f::new(1.0, 1.0, 1.0))).expect("grid");
        LightVolumeAccumulator::new(device, grid, 2)
    }

    #[test]
    fn test_running_mean_is_exact() {
        let mut acc = accumulator(Arc::new(Device::with_workers(2)));
        let passes = [
            vec![RGBSpectrum::splat(1.0), RGBSpectrum::splat(0.3), RGBSpectrum::default(), RGBSpectrum::splat(7.0)],
            vec![RGBSpectrum::splat(3.0), RGBSpectrum::splat(0.1), RGBSpectrum::splat(2.0), RGBSpectrum::splat(7.0)],
            vec![RGBSpectrum::splat(0.5), RGBSpectrum::splat(0.9), RGBSpectrum::splat(1.0), RGBSpectrum::default()],
        ];
        for pass in passes.iter() {
            let before = acc.snapshot().expect("snapshot");
            acc.commit_pass(pass, &[]).expect("commit");
            let after = acc.snapshot().expect("snapshot");
            let k = before.passes as Float;
            for cell in 0..4 {
                let expected = (before.cells[cell] * k + pass[cell]) / (k + 1.0);
                assert_eq!(after.cells[cell], expected);
            }
            assert_eq!(after.passes, before.passes + 1);
        }
    }

    #[test]
    fn test_fault_leaves_cells_untouched() {
        let device = Arc::new(Device::with_workers(1));
        let mut acc = accumulator(device.clone());
        acc.commit_pass(&vec![RGBSpectrum::splat(2.0); 4], &[]).expect("commit");
        let before = acc.snapshot().expect("snapshot");

        device.fail_next_dispatch();
        assert!(acc.commit_pass(&vec![RGBSpectrum::splat(9.0); 4], &[]).is_err());
        let after = acc.snapshot().expect("snapshot");
        assert_eq!(before.cells, after.cells);
        assert_eq!(after.passes, 1);

        let bad = [RGBSpectrum::splat(Float::NAN), RGBSpectrum::default(), RGBSpectrum::default(), RGBSpectrum::default()];
        assert!(acc.commit_pass(&bad, &[]).is_err());
        assert_eq!(acc.snapshot().expect("snapshot").cells, before.cells);
    }
}
