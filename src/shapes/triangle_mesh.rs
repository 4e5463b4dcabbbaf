// Copyright @yucwang 2023

use super::triangle::Triangle;

use crate::core::bvh::BVH;
use crate::core::error::TracerError;
use crate::core::interaction::{SurfaceIntersection, SurfaceSampleRecord};
use crate::core::shape::Shape;
use crate::io::obj_utils::{self, ObjLoadError};
use crate::math::aabb::AABB;
use crate::math::constants::{ Float, Vector2f, Vector3f, ONE_MINUS_EPSILON };
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;

use std::path::Path;

/// Triangulated mesh with an area CDF for uniform surface sampling.
pub struct TriangleMesh {
    triangles: Vec<Triangle>,
    tri_normals: Vec<Vector3f>,
    area_cdf: Vec<Float>,
    total_area: Float,
    bounds: AABB,
    bvh: BVH,
}

impl TriangleMesh {
    /// Builds a mesh from indexed positions; per-vertex normals are optional
    /// and, when present, averaged into a per-triangle shading normal.
    pub fn new(positions: &[Vector3f], normals: Option<&[Vector3f]>, indices: &[[usize; 3]]) -> Result<Self, TracerError> {
        let mut triangles = Vec::with_capacity(indices.len());
        let mut tri_normals = Vec::with_capacity(indices.len());
        for (face, idx) in indices.iter().enumerate() {
            if idx.iter().any(|i| *i >= positions.len()) {
                return Err(TracerError::config(format!("face {} references a missing vertex", face)));
            }
            let tri = Triangle::new(positions[idx[0]], positions[idx[1]], positions[idx[2]]);
            let geo_n = tri.geometric_normal();
            let sh_n = normals
                .filter(|n| idx.iter().all(|i| *i < n.len()))
                .map(|n| (n[idx[0]] + n[idx[1]] + n[idx[2]]).normalize())
                .filter(|n| n.iter().all(|c| c.is_finite()))
                .unwrap_or(geo_n);
            triangles.push(tri);
            tri_normals.push(sh_n);
        }
        Ok(Self::assemble(triangles, tri_normals))
    }

    pub fn from_triangles(triangles: Vec<Triangle>) -> Self {
        let tri_normals = triangles.iter().map(|t| t.geometric_normal()).collect();
        Self::assemble(triangles, tri_normals)
    }

    pub fn from_obj<P: AsRef<Path>>(path: P) -> Result<Self, ObjLoadError> {
        let data = obj_utils::load_mesh_from_file(path)?;
        let normals = if data.normals.len() == data.positions.len() {
            Some(data.normals.as_slice())
        } else {
            None
        };
        Self::new(&data.positions, normals, &data.indices)
            .map_err(|e| ObjLoadError::Topology(e.to_string()))
    }

    /// Two-triangle rectangle spanning `center ± half_u ± half_v`, facing `half_u x half_v`.
    pub fn quad(center: Vector3f, half_u: Vector3f, half_v: Vector3f) -> Self {
        let mut triangles = Vec::with_capacity(2);
        push_quad(&mut triangles, center - half_u - half_v, half_u * 2.0, half_v * 2.0);
        Self::from_triangles(triangles)
    }

    /// Closed box with outward-facing triangles.
    pub fn cuboid(bounds: &AABB) -> Self {
        let (lo, hi) = (bounds.p_min, bounds.p_max);
        let d = bounds.diagnal();
        let ex = Vector3f::new(d.x, 0.0, 0.0);
        let ey = Vector3f::new(0.0, d.y, 0.0);
        let ez = Vector3f::new(0.0, 0.0, d.z);

        let mut triangles = Vec::with_capacity(12);
        push_quad(&mut triangles, lo, ez, ey);
        push_quad(&mut triangles, Vector3f::new(hi.x, lo.y, lo.z), ey, ez);
        push_quad(&mut triangles, lo, ex, ez);
        push_quad(&mut triangles, Vector3f::new(lo.x, hi.y, lo.z), ez, ex);
        push_quad(&mut triangles, lo, ey, ex);
        push_quad(&mut triangles, Vector3f::new(lo.x, lo.y, hi.z), ex, ey);
        Self::from_triangles(triangles)
    }

    pub fn transformed(&self, transform: &Transform) -> Self {
        let triangles = self.triangles.iter().map(|t| t.transformed(transform)).collect();
        let tri_normals = self
            .tri_normals
            .iter()
            .map(|n| transform.apply_normal(*n).normalize())
            .collect();
        Self::assemble(triangles, tri_normals)
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn assemble(triangles: Vec<Triangle>, tri_normals: Vec<Vector3f>) -> Self {
        let mut area_cdf = Vec::with_capacity(triangles.len());
        let mut total_area = 0.0;
        let mut bounds = AABB::default();
        let mut prim_bounds = Vec::with_capacity(triangles.len());
        for tri in &triangles {
            total_area += tri.surface_area();
            area_cdf.push(total_area);
            let b = tri.bounding_box();
            bounds.expand_by_aabb(&b);
            prim_bounds.push(b);
        }
        let bvh = BVH::new(&prim_bounds);

        Self { triangles, tri_normals, area_cdf, total_area, bounds, bvh }
    }

    fn shading_normal(&self, idx: usize, geo_n: &Vector3f) -> Vector3f {
        let sh_n = self.tri_normals.get(idx).cloned().unwrap_or(*geo_n);
        if sh_n.dot(geo_n) < 0.0 { -sh_n } else { sh_n }
    }
}

fn push_quad(triangles: &mut Vec<Triangle>, corner: Vector3f, a: Vector3f, b: Vector3f) {
    triangles.push(Triangle::new(corner, corner + a, corner + a + b));
    triangles.push(Triangle::new(corner, corner + a + b, corner + b));
}

impl Shape for TriangleMesh {
    fn bounding_box(&self) -> AABB {
        self.bounds
    }

    fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection> {
        let (idx, hit) = self.bvh.ray_intersection(ray, |prim_idx, ray| {
            self.triangles[prim_idx].ray_intersection(ray).map(|h| (h, h.t()))
        })?;
        let sh_n = self.shading_normal(idx, &hit.geo_normal());
        Some(hit.with_sh_normal(sh_n).with_triangle_index(Some(idx)))
    }

    fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.bvh.ray_intersection_t(ray, |prim_idx, ray| self.triangles[prim_idx].ray_intersection_t(ray))
    }

    fn sample(&self, u: &Vector2f) -> SurfaceSampleRecord {
        if self.triangles.is_empty() || self.total_area <= 0.0 {
            let n = Vector3f::new(0.0, 0.0, 1.0);
            let intersection = SurfaceIntersection::new(Vector3f::zeros(), n, n, Vector2f::zeros(), 0.0);
            return SurfaceSampleRecord::new(intersection, 0.0);
        }

        let target = u.x * self.total_area;
        let idx = self
            .area_cdf
            .partition_point(|c| *c <= target)
            .min(self.triangles.len() - 1);
        let lower = if idx == 0 { 0.0 } else { self.area_cdf[idx - 1] };
        let tri_area = (self.area_cdf[idx] - lower).max(1e-12);
        let local_u = Vector2f::new(((target - lower) / tri_area).clamp(0.0, ONE_MINUS_EPSILON), u.y);

        let record = self.triangles[idx].sample(&local_u);
        let hit = *record.intersection();
        let sh_n = self.shading_normal(idx, &hit.geo_normal());
        SurfaceSampleRecord::new(hit.with_sh_normal(sh_n).with_triangle_index(Some(idx)), 1.0 / self.total_area)
    }

    fn surface_area(&self) -> Float {
        self.total_area
    }
}
