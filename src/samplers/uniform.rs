// Copyright @yucwang 2026

use crate::core::computation_node::{generate_node_id, ComputationNode};
use crate::core::device::{Device, Event, KernelProgram};
use crate::core::error::TracerError;
use crate::core::sample_generator::{Sample2D, SampleGenerator2D};
use crate::math::constants::Float;

use std::sync::Arc;

pub const UNIFORM_KERNEL: &str = "uniform_sample_generator_2d";

/// Stateless generator: lane `i` of `n` gets `x = y = (0.5 + i) / n`, `pdf = 1`.
pub struct UniformSampleGenerator2D {
    id: String,
    device: Arc<Device>,
    program: KernelProgram,
    work_group_size: usize,
}

impl UniformSampleGenerator2D {
    pub fn new(device: Arc<Device>, work_group_size: usize) -> Self {
        let program = device.program(UNIFORM_KERNEL);
        Self {
            id: generate_node_id("UniformSampleGenerator2D"),
            device,
            program,
            work_group_size,
        }
    }

    fn fill(&self, count: usize, wait_list: &[Event]) -> Result<(Vec<Sample2D>, Event), TracerError> {
        let mut scratch = vec![Sample2D::default(); count];
        let n = count as Float;
        let event = self.device.dispatch(&self.program, self.work_group_size, wait_list, &mut scratch, |lane, sample| {
            let v = (0.5 + lane as Float) / n;
            *sample = Sample2D::new(v, v, 1.0);
            Ok(())
        })?;
        Ok((scratch, event))
    }
}

impl ComputationNode for UniformSampleGenerator2D {
    fn id(&self) -> &str {
        &self.id
    }

    fn describe(&self) -> String {
        format!("UniformSampleGenerator2D[{}] on {}", self.id, self.device.name())
    }
}

impl SampleGenerator2D for UniformSampleGenerator2D {
    fn reset(&mut self) {}

    fn generate(
        &mut self,
        count: usize,
        out: &mut Vec<Sample2D>,
        out2: Option<&mut Vec<Sample2D>>,
    ) -> Result<(), TracerError> {
        if count == 0 {
            return Ok(());
        }

        let (first, event) = self.fill(count, &[])?;
        let second = match out2 {
            Some(out2) => Some((out2, self.fill(count, &[event])?.0)),
            None => None,
        };

        *out = first;
        if let Some((out2, samples)) = second {
            *out2 = samples;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::KernelProgram;

    #[test]
    fn test_uniform_formula_is_exact() {
        let device = Arc::new(Device::with_workers(4));
        let mut generator = UniformSampleGenerator2D::new(device, 32);
        let n = 1000usize;
        let mut out = Vec::new();
        for _ in 0..3 {
            generator.generate(n, &mut out, None).expect("generate");
            assert_eq!(out.len(), n);
            for (i, s) in out.iter().enumerate() {
                let expected = (0.5 + i as Float) / n as Float;
                assert_eq!(s.x, expected);
                assert_eq!(s.y, expected);
                assert_eq!(s.z, 0.0);
                assert_eq!(s.pdf, 1.0);
            }
        }
    }

    #[test]
    fn test_second_output_uses_same_scheme() {
        let device = Arc::new(Device::with_workers(2));
        let mut generator = UniformSampleGenerator2D::new(device, 16);
        let mut out = Vec::new();
        let mut out2 = Vec::new();
        generator.generate(10, &mut out, Some(&mut out2)).expect("generate");
        assert_eq!(out, out2);
    }

    #[test]
    fn test_zero_count_has_no_side_effects() {
        let device = Arc::new(Device::with_workers(1));
        let mut generator = UniformSampleGenerator2D::new(device, 16);
        let mut out = vec![Sample2D::new(0.25, 0.25, 1.0)];
        generator.generate(0, &mut out, None).expect("generate");
        assert_eq!(out, vec![Sample2D::new(0.25, 0.25, 1.0)]);
    }

    #[test]
    fn test_pending_kernel_reports_compilation_pending() {
        let device = Arc::new(Device::with_workers(1));
        device.register_program(KernelProgram::pending(UNIFORM_KERNEL));
        let mut generator = UniformSampleGenerator2D::new(device, 16);
        let mut out = Vec::new();
        let err = generator.generate(4, &mut out, None).unwrap_err();
        assert!(matches!(err, TracerError::CompilationPending(_)));
        assert!(out.is_empty());
    }
}
