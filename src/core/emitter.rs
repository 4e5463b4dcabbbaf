// Copyright @yucwang 2026

use crate::core::computation_node::ComputationNode;
use crate::core::error::TracerError;
use crate::core::sample_generator::SampleGenerator2D;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::spectrum::RGBSpectrum;
use crate::shapes::triangle_mesh::TriangleMesh;

use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitterFlag(u8);

impl EmitterFlag {
    pub const NONE: Self = Self(0);
    pub const DIRECTION: Self = Self(1 << 0);
    pub const SURFACE: Self = Self(1 << 1);
    pub const DELTA: Self = Self(1 << 2);
    pub const POSITION: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }
}

impl std::ops::BitOr for EmitterFlag {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for EmitterFlag {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// One emitted ray with its Monte Carlo weight (`emitted / pdf`).
#[derive(Debug, Clone, Copy)]
pub struct EmissionSample {
    pub position: Vector3f,
    pub direction: Vector3f,
    pub weight: RGBSpectrum,
    pub pdf: Float,
}

/// A light source descriptor. `scene_bounds` is only consulted by lights
/// without a finite emitting surface (directional).
pub trait LightSource: Send + Sync {
    fn flags(&self) -> EmitterFlag;
    /// Total flux leaving the light towards the scene.
    fn power(&self, scene_bounds: &AABB) -> RGBSpectrum;
    fn sample_emission(&self, u_pos: &Vector2f, u_dir: &Vector2f, scene_bounds: &AABB) -> EmissionSample;
    fn describe(&self) -> String;
}

/// Photon emission record produced by a [`LightSourceSampler`].
#[derive(Debug, Clone, Copy)]
pub struct LightSample {
    pub position: Vector3f,
    pub direction: Vector3f,
    /// Emitted quantity over sampling density, for a single sample.
    pub weight: RGBSpectrum,
    pub pdf: Float,
    pub light_id: usize,
}

impl Default for LightSample {
    fn default() -> Self {
        Self {
            position: Vector3f::zeros(),
            direction: Vector3f::new(0.0, 0.0, 1.0),
            weight: RGBSpectrum::default(),
            pdf: 0.0,
            light_id: 0,
        }
    }
}

pub trait LightSourceSampler: ComputationNode + Send {
    /// Fails with `InvalidConfiguration` if the sampler cannot handle this kind of light.
    fn set_light_source(&mut self, light: Arc<dyn LightSource>, light_id: usize) -> Result<(), TracerError>;
    fn set_sample_generator(&mut self, generator: Box<dyn SampleGenerator2D>);

    /// Replaces `out` with `count` samples of the configured light. Fails fast
    /// when the light, the generator, or required geometry is missing.
    fn sample_light_source(
        &mut self,
        bounding_geometry: Option<&TriangleMesh>,
        count: usize,
        out: &mut Vec<LightSample>,
    ) -> Result<(), TracerError>;
}
