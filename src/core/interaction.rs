// Copyright @yucwang 2023

use crate::math::constants::{ Float, Vector2f, Vector3f };

#[derive(Debug, Clone, Copy)]
pub struct SurfaceIntersection {
    p: Vector3f,
    geo_normal: Vector3f,
    sh_normal:  Vector3f,
    uv: Vector2f,
    t: Float,
    tri_index: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
pub struct SurfaceSampleRecord {
    intersection: SurfaceIntersection,
    pdf: Float,
}

impl SurfaceIntersection {
    pub fn new(p: Vector3f, geo_normal: Vector3f, sh_normal: Vector3f,
               uv: Vector2f, t: Float) -> Self {
        Self { p, geo_normal, sh_normal, uv, t, tri_index: None }
    }

    pub fn t(&self) -> Float {
        self.t
    }

    pub fn p(&self) -> Vector3f {
        self.p
    }

    pub fn uv(&self) -> Vector2f {
        self.uv
    }

    pub fn geo_normal(&self) -> Vector3f {
        self.geo_normal
    }

    pub fn sh_normal(&self) -> Vector3f {
        self.sh_normal
    }

    pub fn triangle_index(&self) -> Option<usize> {
        self.tri_index
    }

    pub fn with_triangle_index(mut self, tri_index: Option<usize>) -> Self {
        self.tri_index = tri_index;
        self
    }

    pub fn with_sh_normal(mut self, sh_normal: Vector3f) -> Self {
        self.sh_normal = sh_normal;
        self
    }
}

impl SurfaceSampleRecord {
    pub fn new(intersection: SurfaceIntersection, pdf: Float) -> Self {
        Self { intersection, pdf }
    }

    pub fn intersection(&self) -> &SurfaceIntersection {
        &self.intersection
    }

    /// Density with respect to surface area.
    pub fn pdf(&self) -> Float {
        self.pdf
    }
}
