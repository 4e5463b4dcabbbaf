// Copyright @yucwang 2026

use crate::core::computation_node::ComputationNode;
use crate::core::error::TracerError;
use crate::math::constants::{Float, Vector2f};

/// One 2D sample in the unit square with its density. `z` is always zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample2D {
    pub x: Float,
    pub y: Float,
    pub z: Float,
    pub pdf: Float,
}

impl Sample2D {
    pub fn new(x: Float, y: Float, pdf: Float) -> Self {
        Self { x, y, z: 0.0, pdf }
    }

    pub fn uv(&self) -> Vector2f {
        Vector2f::new(self.x, self.y)
    }
}

/// Bulk producer of 2D samples; `out[i]` belongs to lane `i`.
pub trait SampleGenerator2D: ComputationNode + Send {
    /// Back to the initial stream position.
    fn reset(&mut self);

    /// Replaces the contents of `out` (and `out2`, when given) with `count`
    /// samples. `count == 0` returns at once and touches nothing. On error
    /// both outputs are left as they were.
    fn generate(
        &mut self,
        count: usize,
        out: &mut Vec<Sample2D>,
        out2: Option<&mut Vec<Sample2D>>,
    ) -> Result<(), TracerError>;
}
