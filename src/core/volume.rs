// Copyright @yucwang 2026

use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};

/// A field that can be evaluated at world positions, e.g. by an external volume renderer.
pub trait Volume: Send + Sync {
    fn bbox(&self) -> Option<AABB> {
        None
    }
    fn channels(&self) -> usize;
    fn eval(&self, p_world: Vector3f) -> Vector3f;

    fn eval_scalar(&self, p_world: Vector3f) -> Float {
        let v = self.eval(p_world);
        (v.x + v.y + v.z) / 3.0
    }
}
