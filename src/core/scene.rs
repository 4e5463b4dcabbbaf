// Copyright @yucwang 2026

use crate::core::emitter::LightSource;
use crate::core::error::TracerError;
use crate::core::medium::Medium;
use crate::core::shape::Shape;
use crate::math::aabb::AABB;
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;
use crate::media::homogeneous_medium::HomogeneousMedium;
use crate::shapes::triangle_mesh::TriangleMesh;

use std::sync::Arc;

/// What one tracing pass reads: the bounding mesh (which is also the only
/// scattering surface), the lights and the optional participating medium.
pub struct Scene {
    geometry: Arc<TriangleMesh>,
    lights: Vec<Arc<dyn LightSource>>,
    surface_albedo: RGBSpectrum,
    medium: Option<HomogeneousMedium>,
}

impl Scene {
    pub fn new(geometry: Arc<TriangleMesh>) -> Self {
        Self {
            geometry,
            lights: Vec::new(),
            surface_albedo: RGBSpectrum::splat(0.5),
            medium: None,
        }
    }

    pub fn with_light(mut self, light: Arc<dyn LightSource>) -> Self {
        self.lights.push(light);
        self
    }

    pub fn add_light(&mut self, light: Arc<dyn LightSource>) {
        self.lights.push(light);
    }

    pub fn with_surface_albedo(mut self, albedo: RGBSpectrum) -> Self {
        self.surface_albedo = RGBSpectrum::new(
            albedo[0].clamp(0.0, 1.0),
            albedo[1].clamp(0.0, 1.0),
            albedo[2].clamp(0.0, 1.0),
        );
        self
    }

    /// A medium without its own box fills the bounds of the geometry.
    pub fn with_medium(mut self, medium: HomogeneousMedium) -> Self {
        let medium = if medium.bbox().is_none() {
            medium.with_bbox(Some(self.bounds()))
        } else {
            medium
        };
        self.medium = Some(medium);
        self
    }

    pub fn geometry(&self) -> &Arc<TriangleMesh> {
        &self.geometry
    }

    pub fn lights(&self) -> &[Arc<dyn LightSource>] {
        &self.lights
    }

    pub fn surface_albedo(&self) -> RGBSpectrum {
        self.surface_albedo
    }

    pub fn medium(&self) -> Option<&HomogeneousMedium> {
        self.medium.as_ref()
    }

    pub fn bounds(&self) -> AABB {
        self.geometry.bounding_box()
    }

    /// Scalar emitted power of every light, used to split the photon budget.
    pub fn light_powers(&self) -> Vec<Float> {
        let bounds = self.bounds();
        self.lights.iter().map(|light| light.power(&bounds).average().max(0.0)).collect()
    }

    pub fn validate(&self) -> Result<(), TracerError> {
        if self.geometry.is_empty() {
            return Err(TracerError::config("scene geometry has no triangles"));
        }
        if self.lights.is_empty() {
            return Err(TracerError::config("scene has no light sources"));
        }
        if !self.light_powers().iter().any(|p| *p > 0.0) {
            return Err(TracerError::config("no light source emits any power"));
        }
        Ok(())
    }
}
