// Copyright @yucwang 2026

pub mod directional;
pub mod uniform;

pub use directional::DirectionalLightSampler;
pub use uniform::UniformLightSampler;

use crate::core::device::{Device, KernelProgram};
use crate::core::emitter::{EmissionSample, LightSample, LightSource};
use crate::core::error::TracerError;
use crate::core::sample_generator::{Sample2D, SampleGenerator2D};
use crate::math::constants::Vector2f;

use std::sync::Arc;

pub const LIGHT_SAMPLER_KERNEL: &str = "light_source_sampler";

/// State every light sampler carries: the device, the mapping kernel, the
/// light it samples and the generator it exclusively owns.
pub(crate) struct SamplerSlot {
    pub device: Arc<Device>,
    pub program: KernelProgram,
    pub work_group_size: usize,
    pub light: Option<Arc<dyn LightSource>>,
    pub light_id: usize,
    pub generator: Option<Box<dyn SampleGenerator2D>>,
}

impl SamplerSlot {
    pub fn new(device: Arc<Device>, work_group_size: usize) -> Self {
        let program = device.program(LIGHT_SAMPLER_KERNEL);
        Self { device, program, work_group_size, light: None, light_id: 0, generator: None }
    }

    pub fn light(&self) -> Result<Arc<dyn LightSource>, TracerError> {
        self.light
            .clone()
            .ok_or_else(|| TracerError::config("light source sampler has no light source"))
    }

    /// Draws `count` position and direction samples from the owned generator.
    pub fn draw(&mut self, count: usize) -> Result<(Vec<Sample2D>, Vec<Sample2D>), TracerError> {
        let generator = self
            .generator
            .as_mut()
            .ok_or_else(|| TracerError::config("light source sampler has no sample generator"))?;
        let mut positions = Vec::with_capacity(count);
        let mut directions = Vec::with_capacity(count);
        generator.generate(count, &mut positions, Some(&mut directions))?;
        Ok((positions, directions))
    }

    /// Runs the mapping kernel: lane `i` turns the sample pair `i` into a light sample.
    /// The weight is divided by the density of the 2D samples themselves.
    pub fn map<F>(&self, positions: &[Sample2D], directions: &[Sample2D], emit: F) -> Result<Vec<LightSample>, TracerError>
    where
        F: Fn(&Vector2f, &Vector2f) -> EmissionSample + Sync,
    {
        let light_id = self.light_id;
        let mut scratch = vec![LightSample::default(); positions.len()];
        self.device.dispatch(&self.program, self.work_group_size, &[], &mut scratch, |lane, out| {
            let (u_pos, u_dir) = (&positions[lane], &directions[lane]);
            let sample_pdf = u_pos.pdf * u_dir.pdf;
            if !(sample_pdf > 0.0) {
                return Err(format!("sample density {} is not positive", sample_pdf));
            }
            let emission = emit(&u_pos.uv(), &u_dir.uv());
            if !emission.weight.is_finite() {
                return Err("emission weight is not finite".to_string());
            }
            *out = LightSample {
                position: emission.position,
                direction: emission.direction,
                weight: emission.weight / sample_pdf,
                pdf: emission.pdf * sample_pdf,
                light_id,
            };
            Ok(())
        })?;
        Ok(scratch)
    }
}
