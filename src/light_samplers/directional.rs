// Copyright @yucwang 2026

use super::SamplerSlot;
use crate::core::computation_node::{generate_node_id, ComputationNode};
use crate::core::device::Device;
use crate::core::emitter::{EmitterFlag, LightSample, LightSource, LightSourceSampler};
use crate::core::error::TracerError;
use crate::core::sample_generator::SampleGenerator2D;
use crate::core::shape::Shape;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::shapes::triangle_mesh::TriangleMesh;

use std::sync::Arc;

/// Samples a directional light over a disk that covers the bounding mesh.
///
/// Every candidate ray is tested against the bounding mesh. A ray that misses
/// it keeps its slot but gets a zero weight, so each call returns exactly
/// `count` samples and the estimator stays unbiased: the disk density is
/// unchanged and missed rays contribute nothing either way.
pub struct DirectionalLightSampler {
    id: String,
    slot: SamplerSlot,
}

impl DirectionalLightSampler {
    pub fn new(device: Arc<Device>, work_group_size: usize) -> Self {
        Self { id: generate_node_id("DirectionalLightSampler"), slot: SamplerSlot::new(device, work_group_size) }
    }
}

impl ComputationNode for DirectionalLightSampler {
    fn id(&self) -> &str {
        &self.id
    }

    fn describe(&self) -> String {
        match &self.slot.light {
            Some(light) => format!("DirectionalLightSampler[{}] for {}", self.id, light.describe()),
            None => format!("DirectionalLightSampler[{}] (no light)", self.id),
        }
    }
}

impl LightSourceSampler for DirectionalLightSampler {
    fn set_light_source(&mut self, light: Arc<dyn LightSource>, light_id: usize) -> Result<(), TracerError> {
        if !light.flags().contains(EmitterFlag::DIRECTION) {
            return Err(TracerError::config(format!("{} is not a directional light", light.describe())));
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
        let mesh = match bounding_geometry {
            Some(mesh) if !mesh.is_empty() => mesh,
            _ => return Err(TracerError::config("directional light sampling needs a non-empty bounding mesh")),
        };
        if count == 0 {
            out.clear();
            return Ok(());
        }

        let bounds = mesh.bounding_box();
        let (positions, directions) = self.slot.draw(count)?;
        let samples = self.slot.map(&positions, &directions, |u_pos, u_dir| {
            let mut emission = light.sample_emission(u_pos, u_dir, &bounds);
            let ray = Ray3f::new(emission.position, emission.direction, None, None);
            if !mesh.ray_intersection_t(&ray) {
                emission.weight = RGBSpectrum::default();
            }
            emission
        })?;

        let missed = samples.iter().filter(|s| s.weight.is_black()).count();
        log::debug!("{}: {} of {} directional samples missed the bounding mesh", self.id, missed, count);
        *out = samples;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitters::{DirectionalLight, PointLight};
    use crate::math::aabb::AABB;
    use crate::math::constants::{Float, Vector3f};
    use crate::samplers::{StochasticSampleGenerator2D, UniformSampleGenerator2D};

    fn unit_plane() -> TriangleMesh {
        TriangleMesh::quad(Vector3f::zeros(), Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 0.0))
    }

    fn sampler(device: &Arc<Device>, seed: u32) -> DirectionalLightSampler {
        let mut sampler = DirectionalLightSampler::new(device.clone(), 32);
        let light = Arc::new(DirectionalLight::new_with(Vector3f::new(0.3, -1.0, 0.2), RGBSpectrum::splat(2.0)));
        sampler.set_light_source(light, 1).expect("directional light");
        sampler.set_sample_generator(Box::new(StochasticSampleGenerator2D::new(device.clone(), seed, 32)));
        sampler
    }

    #[test]
    fn test_requires_bounding_mesh_and_directional_light() {
        let device = Arc::new(Device::with_workers(2));
        let mut s = sampler(&device, 1);
        let mut out = Vec::new();
        let err = s.sample_light_source(None, 16, &mut out).unwrap_err();
        assert!(matches!(err, TracerError::InvalidConfiguration(_)));

        let point = Arc::new(PointLight::new(Vector3f::zeros(), RGBSpectrum::splat(1.0)));
        assert!(s.set_light_source(point, 0).is_err());
    }

    #[test]
    fn test_missed_rays_get_zero_weight() {
        let device = Arc::new(Device::with_workers(2));
        let mesh = unit_plane();
        let mut s = sampler(&device, 3);
        let mut out = Vec::new();
        s.sample_light_source(Some(&mesh), 4000, &mut out).expect("sample");
        assert_eq!(out.len(), 4000);

        let hits = out.iter().filter(|l| !l.weight.is_black()).count();
        assert!(hits > 0 && hits < out.len());
        for l in &out {
            let ray = Ray3f::new(l.position, l.direction, None, None);
            assert_eq!(mesh.ray_intersection_t(&ray), !l.weight.is_black());
            assert_eq!(l.light_id, 1);
        }

        // Total flux through the plane: irradiance times projected area.
        let dir = Vector3f::new(0.3, -1.0, 0.2).normalize();
        let expected = 2.0 * 4.0 * dir.y.abs();
        let estimate = out.iter().map(|l| l.weight[0]).sum::<Float>() / out.len() as Float;
        assert!((estimate - expected).abs() / expected < 0.1);
    }

    #[test]
    fn test_zero_weight_policy_is_reproducible() {
        let device = Arc::new(Device::with_workers(4));
        let mesh = unit_plane();
        let mut a = Vec::new();
        let mut b = Vec::new();
        sampler(&device, 42).sample_light_source(Some(&mesh), 512, &mut a).expect("a");
        sampler(&device, 42).sample_light_source(Some(&mesh), 512, &mut b).expect("b");
        let mask_a: Vec<bool> = a.iter().map(|l| l.weight.is_black()).collect();
        let mask_b: Vec<bool> = b.iter().map(|l| l.weight.is_black()).collect();
        assert_eq!(mask_a, mask_b);
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x.position == y.position));
    }

    #[test]
    fn test_disk_starts_outside_bounds() {
        let device = Arc::new(Device::with_workers(1));
        let mesh = TriangleMesh::cuboid(&AABB::new(Vector3f::new(-1.0, -1.0, -1.0), Vector3f::new(1.0, 1.0, 1.0)));
        let mut s = DirectionalLightSampler::new(device.clone(), 8);
        let light = Arc::new(DirectionalLight::new_with(Vector3f::new(0.0, 0.0, -1.0), RGBSpectrum::splat(1.0)));
        s.set_light_source(light, 0).expect("light");
        s.set_sample_generator(Box::new(UniformSampleGenerator2D::new(device, 8)));
        let mut out = Vec::new();
        s.sample_light_source(Some(&mesh), 16, &mut out).expect("sample");
        assert!(out.iter().all(|l| l.position.z > 1.0 && l.direction.z < 0.0));
    }
}
