// Copyright @yucwang 2026

use crate::core::emitter::{EmissionSample, EmitterFlag, LightSource};
use crate::core::shape::Shape;
use crate::math::aabb::AABB;
use crate::math::constants::{Vector2f, PI};
use crate::math::frame::Frame;
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{sample_cosine_hemisphere, sample_cosine_hemisphere_pdf};
use crate::shapes::triangle_mesh::TriangleMesh;

use std::sync::Arc;

/// Diffuse emitter on a triangle mesh, emitting `radiance` along the shading normal side.
pub struct AreaLight {
    shape: Arc<TriangleMesh>,
    radiance: RGBSpectrum,
}

impl AreaLight {
    pub fn from_shape(shape: Arc<TriangleMesh>, radiance: RGBSpectrum) -> Self {
        Self { shape, radiance }
    }

    pub fn shape(&self) -> &Arc<TriangleMesh> {
        &self.shape
    }
}

impl LightSource for AreaLight {
    fn flags(&self) -> EmitterFlag {
        EmitterFlag::SURFACE
    }

    fn power(&self, _scene_bounds: &AABB) -> RGBSpectrum {
        self.radiance * (PI * self.shape.surface_area())
    }

    fn sample_emission(&self, u_pos: &Vector2f, u_dir: &Vector2f, _scene_bounds: &AABB) -> EmissionSample {
        let record = self.shape.sample(u_pos);
        let hit = record.intersection();
        let frame = Frame::from_normal(&hit.sh_normal());
        let local_dir = sample_cosine_hemisphere(u_dir);
        let cos_theta = local_dir.z;

        let pdf = record.pdf() * sample_cosine_hemisphere_pdf(cos_theta);
        let weight = if pdf > 0.0 {
            self.radiance * (cos_theta / pdf)
        } else {
            RGBSpectrum::default()
        };
        EmissionSample { position: hit.p(), direction: frame.to_world(&local_dir), weight, pdf }
    }

    fn describe(&self) -> String {
        format!("AreaLight over {} triangles", self.shape.triangle_count())
    }
}
