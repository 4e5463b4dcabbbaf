// Copyright @yucwang 2026

use super::SamplerSlot;
use crate::core::computation_node::{generate_node_id, ComputationNode};
use crate::core::device::Device;
use crate::core::emitter::{EmitterFlag, LightSample, LightSource, LightSourceSampler};
use crate::core::error::TracerError;
use crate::core::sample_generator::SampleGenerator2D;
use crate::core::shape::Shape;
use crate::math::aabb::AABB;
use crate::shapes::triangle_mesh::TriangleMesh;

use std::sync::Arc;

/// Samples point and area lights: the first 2D sample picks the position on
/// the emitter, the second the emission direction.
pub struct UniformLightSampler {
    id: String,
    slot: SamplerSlot,
}

impl UniformLightSampler {
    pub fn new(device: Arc<Device>, work_group_size: usize) -> Self {
        Self { id: generate_node_id("UniformLightSampler"), slot: SamplerSlot::new(device, work_group_size) }
    }
}

impl ComputationNode for UniformLightSampler {
    fn id(&self) -> &str {
        &self.id
    }

    fn describe(&self) -> String {
        match &self.slot.light {
            Some(light) => format!("UniformLightSampler[{}] for {}", self.id, light.describe()),
            None => format!("UniformLightSampler[{}] (no light)", self.id),
        }
    }
}

impl LightSourceSampler for UniformLightSampler {
    fn set_light_source(&mut self, light: Arc<dyn LightSource>, light_id: usize) -> Result<(), TracerError> {
        if light.flags().contains(EmitterFlag::DIRECTION) {
            return Err(TracerError::config(format!(
                "{} cannot be sampled uniformly, use a directional light sampler",
                light.describe()
            )));
        }
        self.slot.light = Some(light);
        self.slot.light_id = light_id;
        Ok(())
    }

    fn set_sample_generator(&mut self, generator: Box<dyn SampleGenerator2D>) {
        self.slot.generator = Some(generator);
    }

    fn sample_light_source(
        &mut self,
        bounding_geometry: Option<&TriangleMesh>,
        count: usize,
        out: &mut Vec<LightSample>,
    ) -> Result<(), TracerError> {
        let light = self.slot.light()?;
        if self.slot.generator.is_none() {
            return Err(TracerError::config("light source sampler has no sample generator"));
        }
        if count == 0 {
            out.clear();
            return Ok(());
        }

        let bounds = bounding_geometry.map(|mesh| mesh.bounding_box()).unwrap_or_else(AABB::default);
        let (positions, directions) = self.slot.draw(count)?;
        *out = self
            .slot
            .map(&positions, &directions, |u_pos, u_dir| light.sample_emission(u_pos, u_dir, &bounds))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitters::{AreaLight, DirectionalLight, PointLight};
    use crate::math::constants::{Vector3f, PI};
    use crate::math::spectrum::RGBSpectrum;
    use crate::samplers::{StochasticSampleGenerator2D, UniformSampleGenerator2D};

    fn device() -> Arc<Device> {
        Arc::new(Device::with_workers(2))
    }

    #[test]
    fn test_unset_light_or_generator_fails_fast() {
        let device = device();
        let mut sampler = UniformLightSampler::new(device.clone(), 32);
        let mut out = Vec::new();
        let err = sampler.sample_light_source(None, 8, &mut out).unwrap_err();
        assert!(matches!(err, TracerError::InvalidConfiguration(_)));

        let light = Arc::new(PointLight::new(Vector3f::zeros(), RGBSpectrum::splat(1.0)));
        sampler.set_light_source(light, 0).expect("point light");
        let err = sampler.sample_light_source(None, 8, &mut out).unwrap_err();
        assert!(matches!(err, TracerError::InvalidConfiguration(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_rejects_directional_lights() {
        let mut sampler = UniformLightSampler::new(device(), 32);
        let light = Arc::new(DirectionalLight::new_with(Vector3f::new(0.0, -1.0, 0.0), RGBSpectrum::splat(1.0)));
        assert!(sampler.set_light_source(light, 0).is_err());
    }

    #[test]
    fn test_point_light_samples_are_unbiased() {
        let device = device();
        let mut sampler = UniformLightSampler::new(device.clone(), 32);
        let position = Vector3f::new(1.0, 2.0, 3.0);
        let light = Arc::new(PointLight::new(position, RGBSpectrum::splat(0.5)));
        sampler.set_light_source(light, 4).expect("point light");
        sampler.set_sample_generator(Box::new(UniformSampleGenerator2D::new(device, 32)));

        let mut out = Vec::new();
        sampler.sample_light_source(None, 100, &mut out).expect("sample");
        assert_eq!(out.len(), 100);
        for s in &out {
            assert_eq!(s.light_id, 4);
            assert_eq!(s.position, position);
            assert!((s.pdf - 1.0 / (4.0 * PI)).abs() < 1e-6);
            assert!((s.weight[0] - 0.5 * 4.0 * PI).abs() < 1e-4);
            assert!((s.direction.norm() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_area_light_mean_weight_is_power() {
        let device = device();
        let mut sampler = UniformLightSampler::new(device.clone(), 64);
        let quad = TriangleMesh::quad(Vector3f::zeros(), Vector3f::new(1.0, 0.0, 0.0), Vector3f::new(0.0, 1.0, 0.0));
        let light = AreaLight::from_shape(Arc::new(quad), RGBSpectrum::splat(1.0));
        let power = light.power(&AABB::default());
        sampler.set_light_source(Arc::new(light), 0).expect("area light");
        sampler.set_sample_generator(Box::new(StochasticSampleGenerator2D::new(device, 5, 64)));

        let mut out = Vec::new();
        sampler.sample_light_source(None, 2000, &mut out).expect("sample");
        let mean = out.iter().map(|s| s.weight[1]).sum::<f32>() / out.len() as f32;
        assert!((mean - power[1]).abs() / power[1] < 1e-3);
        assert!(out.iter().all(|s| s.direction.z > 0.0 && s.position.z.abs() < 1e-5));
    }

    #[test]
    fn test_generator_advances_between_calls() {
        let device = device();
        let mut sampler = UniformLightSampler::new(device.clone(), 16);
        let light = Arc::new(PointLight::new(Vector3f::zeros(), RGBSpectrum::splat(1.0)));
        sampler.set_light_source(light, 0).expect("point light");
        sampler.set_sample_generator(Box::new(StochasticSampleGenerator2D::new(device, 9, 16)));

        let mut first = Vec::new();
        let mut second = Vec::new();
        sampler.sample_light_source(None, 32, &mut first).expect("first");
        sampler.sample_light_source(None, 32, &mut second).expect("second");
        assert!(first.iter().zip(second.iter()).all(|(a, b)| a.direction != b.direction));
    }
}
