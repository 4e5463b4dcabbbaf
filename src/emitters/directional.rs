// Copyright @yucwang 2026

use crate::core::emitter::{EmissionSample, EmitterFlag, LightSource};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector2f, Vector3f, PI};
use crate::math::frame::Frame;
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::math::warp::sample_uniform_disk_concentric;

/// Virtual emission plane for a directional light: a disk perpendicular to
/// the light direction that covers the bounding sphere of the scene and
/// sits just outside it.
#[derive(Debug, Clone, Copy)]
pub struct EmissionDisk {
    pub center: Vector3f,
    pub radius: Float,
    frame: Frame,
}

impl EmissionDisk {
    pub fn area(&self) -> Float {
        PI * self.radius * self.radius
    }

    pub fn point(&self, u: &Vector2f) -> Vector3f {
        let d = sample_uniform_disk_concentric(u) * self.radius;
        self.center + self.frame.to_world(&Vector3f::new(d.x, d.y, 0.0))
    }
}

/// Light arriving from infinitely far away along `direction` with `irradiance`
/// (W/m^2 on a surface perpendicular to it).
#[derive(Debug, Clone)]
pub struct DirectionalLight {
    pub direction: Vector3f,
    pub irradiance: RGBSpectrum,
}

impl DirectionalLight {
    pub fn new_with(direction: Vector3f, irradiance: RGBSpectrum) -> Self {
        let len = direction.norm();
        let direction = if len > 0.0 { direction / len } else { Vector3f::new(0.0, 0.0, -1.0) };
        Self { direction, irradiance }
    }

    pub fn transformed(&self, to_world: &Transform) -> Self {
        Self::new_with(to_world.apply_vector(self.direction), self.irradiance)
    }

    pub fn emission_disk(&self, scene_bounds: &AABB) -> EmissionDisk {
        let (center, radius) = if scene_bounds.is_valid() {
            (scene_bounds.center(), scene_bounds.bounding_radius())
        } else {
            (Vector3f::zeros(), 0.0)
        };
        let offset = radius * 1.001 + 1e-3;
        EmissionDisk {
            center: center - self.direction * offset,
            radius,
            frame: Frame::from_normal(&self.direction),
        }
    }
}

impl LightSource for DirectionalLight {
    fn flags(&self) -> EmitterFlag {
        EmitterFlag::DIRECTION | EmitterFlag::DELTA
    }

    fn power(&self, scene_bounds: &AABB) -> RGBSpectrum {
        self.irradiance * self.emission_disk(scene_bounds).area()
    }

    fn sample_emission(&self, u_pos: &Vector2f, _u_dir: &Vector2f, scene_bounds: &AABB) -> EmissionSample {
        let disk = self.emission_disk(scene_bounds);
        let area = disk.area();
        let (pdf, weight) = if area > 0.0 {
            (1.0 / area, self.irradiance * area)
        } else {
            (0.0, RGBSpectrum::default())
        };
        EmissionSample { position: disk.point(u_pos), direction: self.direction, weight, pdf }
    }

    fn describe(&self) -> String {
        format!("DirectionalLight towards ({:.3}, {:.3}, {:.3})", self.direction.x, self.direction.y, self.direction.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disk_sits_outside_bounds_and_faces_direction() {
        let light = DirectionalLight::new_with(Vector3f::new(0.0, -2.0, 0.0), RGBSpectrum::splat(1.0));
        assert!((light.direction - Vector3f::new(0.0, -1.0, 0.0)).norm() < 1e-6);

        let bounds = AABB::new(Vector3f::new(-1.0, -1.0, -1.0), Vector3f::new(1.0, 1.0, 1.0));
        let disk = light.emission_disk(&bounds);
        assert!((disk.radius - 3.0f32.sqrt()).abs() < 1e-5);
        assert!(disk.center.y > 1.7);

        let sample = light.sample_emission(&Vector2f::new(0.9, 0.1), &Vector2f::zeros(), &bounds);
        assert!((sample.position.y - disk.center.y).abs() < 1e-4);
        assert!((sample.pdf * disk.area() - 1.0).abs() < 1e-5);
        assert!((sample.weight[0] - disk.area()).abs() < 1e-4);
    }

    #[test]
    fn test_empty_bounds_emit_nothing() {
        let light = DirectionalLight::new_with(Vector3f::new(0.0, 0.0, -1.0), RGBSpectrum::splat(1.0));
        let sample = light.sample_emission(&Vector2f::new(0.5, 0.5), &Vector2f::zeros(), &AABB::default());
        assert!(sample.weight.is_black());
        assert_eq!(sample.pdf, 0.0);
    }
}
