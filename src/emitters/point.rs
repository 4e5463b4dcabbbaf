// Copyright @yucwang 2026

use crate::core::emitter::{EmissionSample, EmitterFlag, LightSource};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector2f, Vector3f, PI};
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::math::warp::{square_to_uniform_sphere, square_to_uniform_sphere_pdf};

/// Isotropic point light; `intensity` is radiant intensity (W/sr).
#[derive(Debug, Clone)]
pub struct PointLight {
    position: Vector3f,
    intensity: RGBSpectrum,
}

impl PointLight {
    pub fn new(position: Vector3f, intensity: RGBSpectrum) -> Self {
        Self { position, intensity }
    }

    pub fn transformed(&self, to_world: &Transform) -> Self {
        Self { position: to_world.apply_point(self.position), intensity: self.intensity }
    }

    pub fn position(&self) -> Vector3f {
        self.position
    }
}

impl LightSource for PointLight {
    fn flags(&self) -> EmitterFlag {
        EmitterFlag::POSITION | EmitterFlag::DELTA
    }

    fn power(&self, _scene_bounds: &AABB) -> RGBSpectrum {
        self.intensity * (4.0 * PI)
    }

    fn sample_emission(&self, _u_pos: &Vector2f, u_dir: &Vector2f, _scene_bounds: &AABB) -> EmissionSample {
        let pdf: Float = square_to_uniform_sphere_pdf();
        EmissionSample {
            position: self.position,
            direction: square_to_uniform_sphere(u_dir),
            weight: self.intensity / pdf,
            pdf,
        }
    }

    fn describe(&self) -> String {
        format!("PointLight at ({:.3}, {:.3}, {:.3})", self.position.x, self.position.y, self.position.z)
    }
}
