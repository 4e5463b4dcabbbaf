// Copyright @yucwang 2026

use crate::core::medium::Medium;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;

/// Grey participating medium with constant extinction, optionally bounded by a box.
#[derive(Debug, Clone)]
pub struct HomogeneousMedium {
    sigma_t: Float,
    albedo: RGBSpectrum,
    scale: Float,
    bbox: Option<AABB>,
}

impl HomogeneousMedium {
    pub fn new(sigma_t: Float, albedo: RGBSpectrum) -> Self {
        Self {
            sigma_t: sigma_t.max(0.0),
            albedo: clamp_spectrum(albedo),
            scale: 1.0,
            bbox: None,
        }
    }

    pub fn with_scale(mut self, scale: Float) -> Self {
        self.scale = scale.max(0.0);
        self
    }

    pub fn with_bbox(mut self, bbox: Option<AABB>) -> Self {
        self.bbox = bbox;
        self
    }

    pub fn density(&self) -> Float {
        self.sigma_t * self.scale
    }
}

impl Medium for HomogeneousMedium {
    fn sigma_t(&self, _p_world: Vector3f) -> RGBSpectrum {
        RGBSpectrum::splat(self.density())
    }

    fn albedo(&self, _p_world: Vector3f) -> RGBSpectrum {
        self.albedo
    }

    fn bbox(&self) -> Option<AABB> {
        self.bbox
    }

    fn sample_free_flight(&self, ray: &Ray3f, t_max: Float, u: Float) -> Option<Float> {
        let density = self.density();
        if density <= 0.0 {
            return None;
        }

        let mut segment = *ray;
        segment.max_t = segment.max_t.min(t_max);
        let (t_enter, t_exit) = match &self.bbox {
            Some(bbox) => bbox.ray_intersect_range(&segment)?,
            None => (segment.min_t, segment.max_t),
        };

        let t = t_enter - (1.0 - u).ln() / density;
        if t < t_exit {
            Some(t)
        } else {
            None
        }
    }
}

fn clamp_spectrum(value: RGBSpectrum) -> RGBSpectrum {
    RGBSpectrum::new(
        value[0].clamp(0.0, 1.0),
        value[1].clamp(0.0, 1.0),
        value[2].clamp(0.0, 1.0),
    )
}
