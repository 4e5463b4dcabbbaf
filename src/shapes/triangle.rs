// Copyright @yucwang 2023

use crate::core::shape::Shape;
use crate::core::interaction::{ SurfaceIntersection, SurfaceSampleRecord };
use crate::math::aabb::AABB;
use crate::math::constants:: { Float, Vector2f, Vector3f };
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;
use crate::math::warp::square_to_triangle;

#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    p0: Vector3f,
    p1: Vector3f,
    p2: Vector3f
}

impl Shape for Triangle {
    fn bounding_box(&self) -> AABB {
        let mut bound = AABB::new(self.p0, self.p1);
        bound.expand_by_point(&self.p2);

        bound
    }

    fn ray_intersection(&self, ray: &Ray3f) -> Option<SurfaceIntersection> {
        let (t, b1, b2) = self.intersect_barycentric(ray)?;
        let n = self.geometric_normal();
        let p = ray.at(t);
        Some(SurfaceIntersection::new(p, n, n, Vector2f::new(b1, b2), t))
    }

    fn ray_intersection_t(&self, ray: &Ray3f) -> bool {
        self.intersect_barycentric(ray).is_some()
    }

    fn sample(&self, u: &Vector2f) -> SurfaceSampleRecord {
        let bary = square_to_triangle(u);
        let p = self.p0 * bary.x + self.p1 * bary.y + self.p2 * bary.z;
        let n = self.geometric_normal();
        let interaction = SurfaceIntersection::new(p, n, n, Vector2f::new(bary.y, bary.z), 0.0);
        let area = self.surface_area();

        SurfaceSampleRecord::new(interaction, if area > 0.0 { 1.0 / area } else { 0.0 })
    }

    fn surface_area(&self) -> Float {
        0.5 * (self.p1 - self.p0).cross(&(self.p2 - self.p0)).norm()
    }
}

impl Triangle {
    pub fn new(p0: Vector3f, p1: Vector3f, p2: Vector3f) -> Self {
        Triangle { p0, p1, p2 }
    }

    // Moller-Trumbore, two-sided. Returns (t, b1, b2).
    fn intersect_barycentric(&self, ray: &Ray3f) -> Option<(Float, Float, Float)> {
        let edge0 = self.p1 - self.p0;
        let edge1 = self.p2 - self.p0;
        let pvec = ray.dir().cross(&edge1);
        let det = edge0.dot(&pvec);
        if det.abs() < 1e-10 {
            return None;
        }

        let inv_det = 1.0 / det;
        let tvec = ray.origin() - self.p0;
        let b1 = tvec.dot(&pvec) * inv_det;
        if !(0.0..=1.0).contains(&b1) {
            return None;
        }

        let qvec = tvec.cross(&edge0);
        let b2 = ray.dir().dot(&qvec) * inv_det;
        if b2 < 0.0 || b1 + b2 > 1.0 {
            return None;
        }

        let t = edge1.dot(&qvec) * inv_det;
        if ray.test_segment(t) && t > 0.0 {
            Some((t, b1, b2))
        } else {
            None
        }
    }

    pub fn geometric_normal(&self) -> Vector3f {
        let edge0 = self.p1 - self.p0;
        let edge1 = self.p2 - self.p0;
        edge0.cross(&edge1).normalize()
    }

    pub fn vertices(&self) -> (Vector3f, Vector3f, Vector3f) {
        (self.p0, self.p1, self.p2)
    }

    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            p0: transform.apply_point(self.p0),
            p1: transform.apply_point(self.p1),
            p2: transform.apply_point(self.p2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box1() {
        let p0 = Vector3f::new(1.0, 1.0, 1.0);
        let p1 = Vector3f::new(1.5, 4.0, -1.0);
        let p2 = Vector3f::new(-1.0, 2.0, 2.5);

        let triangle = Triangle::new(p0, p1, p2);
        let bounding_box = triangle.bounding_box();

        assert_eq!(bounding_box.p_min, Vector3f::new(-1.0, 1.0, -1.0));
        assert_eq!(bounding_box.p_max, Vector3f::new(1.5, 4.0, 2.5));
    }

    #[test]
    fn test_ray_intersection_both_sides() {
        let triangle = Triangle::new(Vector3f::new(1.0, 1.0, 0.0),
                                     Vector3f::new(2.0, 2.0, 0.0),
                                     Vector3f::new(2.0, 1.0, 0.0));

        let down = Ray3f::new(Vector3f::new(1.5, 1.1, 3.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        let up = Ray3f::new(Vector3f::new(1.5, 1.1, -3.0), Vector3f::new(0.0, 0.0, 1.0), None, None);
        let away = Ray3f::new(Vector3f::new(1.5, 1.1, 3.0), Vector3f::new(0.0, 0.0, 1.0), None, None);
        let outside = Ray3f::new(Vector3f::new(1.5, 2.0, 3.0), Vector3f::new(0.0, 0.0, -1.0), None, None);

        let hit = triangle.ray_intersection(&down).expect("hit from above");
        assert!((hit.t() - 3.0).abs() < 1e-5);
        assert!(triangle.ray_intersection_t(&up));
        assert!(!triangle.ray_intersection_t(&away));
        assert!(!triangle.ray_intersection_t(&outside));
    }

    #[test]
    fn test_sample_lies_on_triangle() {
        let triangle = Triangle::new(Vector3f::new(0.0, 0.0, 0.0),
                                     Vector3f::new(2.0, 0.0, 0.0),
                                     Vector3f::new(0.0, 2.0, 0.0));
        let record = triangle.sample(&Vector2f::new(0.3, 0.7));
        let p = record.intersection().p();
        assert!(p.z.abs() < 1e-6 && p.x >= 0.0 && p.y >= 0.0 && p.x + p.y <= 2.0 + 1e-5);
        assert!((record.pdf() - 0.5).abs() < 1e-6);
    }
}
