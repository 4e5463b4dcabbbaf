// Copyright @yucwang 2026

use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f, FLOAT_MAX};
use crate::math::ray::Ray3f;

const MAX_LEAF_SIZE: usize = 4;

#[derive(Debug, Clone)]
enum BVHNode {
    Leaf { bounds: AABB, start: usize, count: usize },
    // The left child always sits right after its parent.
    Interior { bounds: AABB, right: usize, axis: usize },
}

impl BVHNode {
    fn bounds(&self) -> &AABB {
        match self {
            BVHNode::Leaf { bounds, .. } => bounds,
            BVHNode::Interior { bounds, .. } => bounds,
        }
    }
}

/// Object-median bounding volume hierarchy over primitive bounds.
///
/// Only bounds are stored; primitive tests are supplied by the caller.
pub struct BVH {
    nodes: Vec<BVHNode>,
    indices: Vec<usize>,
}

impl BVH {
    pub fn new(prim_bounds: &[AABB]) -> Self {
        let centroids: Vec<Vector3f> = prim_bounds.iter().map(|b| b.center()).collect();
        let mut bvh = Self { nodes: Vec::new(), indices: (0..prim_bounds.len()).collect() };
        if !prim_bounds.is_empty() {
            bvh.build(prim_bounds, &centroids, 0, prim_bounds.len());
        }
        bvh
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn build(&mut self, prim_bounds: &[AABB], centroids: &[Vector3f], start: usize, end: usize) -> usize {
        let mut bounds = AABB::default();
        let mut centroid_bounds = AABB::default();
        for &idx in &self.indices[start..end] {
            bounds.expand_by_aabb(&prim_bounds[idx]);
            centroid_bounds.expand_by_point(&centroids[idx]);
        }

        let node_idx = self.nodes.len();
        let count = end - start;
        let axis = centroid_bounds.max_extent() as usize;
        let degenerate = centroid_bounds.diagnal()[axis] < 1e-6;
        if count <= MAX_LEAF_SIZE || degenerate {
            self.nodes.push(BVHNode::Leaf { bounds, start, count });
            return node_idx;
        }

        let mid = start + count / 2;
        self.indices[start..end].select_nth_unstable_by(count / 2, |a, b| {
            centroids[*a][axis]
                .partial_cmp(&centroids[*b][axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        self.nodes.push(BVHNode::Leaf { bounds, start, count });
        self.build(prim_bounds, centroids, start, mid);
        let right = self.build(prim_bounds, centroids, mid, end);
        self.nodes[node_idx] = BVHNode::Interior { bounds, right, axis };
        node_idx
    }

    /// Closest hit reported by `hit_fn`, which returns the hit and its distance.
    pub fn ray_intersection<F, T>(&self, ray: &Ray3f, mut hit_fn: F) -> Option<(usize, T)>
    where
        F: FnMut(usize, &Ray3f) -> Option<(T, Float)>,
    {
        let mut closest: Option<(usize, T)> = None;
        let mut closest_t = FLOAT_MAX;
        let mut ray = *ray;
        let mut stack = Vec::with_capacity(64);
        if !self.nodes.is_empty() {
            stack.push(0usize);
        }

        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            match node.bounds().ray_intersect_range(&ray) {
                Some((t_enter, _)) if t_enter <= closest_t => {}
                _ => continue,
            }

            match node {
                BVHNode::Leaf { start, count, .. } => {
                    for &prim_idx in &self.indices[*start..*start + *count] {
                        if let Some((hit, t)) = hit_fn(prim_idx, &ray) {
                            if t < closest_t {
                                closest_t = t;
                                ray.max_t = t;
                                closest = Some((prim_idx, hit));
                            }
                        }
                    }
                }
                BVHNode::Interior { right, axis, .. } => {
                    // Visit the near child first.
                    let left = node_idx + 1;
                    if ray.dir()[*axis] < 0.0 {
                        stack.push(left);
                        stack.push(*right);
                    } else {
                        stack.push(*right);
                        stack.push(left);
                    }
                }
            }
        }

        closest
    }

    /// Any-hit query with early exit.
    pub fn ray_intersection_t<F>(&self, ray: &Ray3f, mut hit_fn: F) -> bool
    where
        F: FnMut(usize, &Ray3f) -> bool,
    {
        let mut stack = Vec::with_capacity(64);
        if !self.nodes.is_empty() {
            stack.push(0usize);
        }
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if !node.bounds().ray_intersect(ray) {
                continue;
            }
            match node {
                BVHNode::Leaf { start, count, .. } => {
                    if self.indices[*start..*start + *count].iter().any(|&idx| hit_fn(idx, ray)) {
                        return true;
                    }
                }
                BVHNode::Interior { right, .. } => {
                    stack.push(*right);
                    stack.push(node_idx + 1);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::BVH;
    use crate::core::shape::Shape;
    use crate::math::constants::{Float, Vector3f};
    use crate::math::ray::Ray3f;
    use crate::shapes::triangle::Triangle;

    fn build_triangles() -> Vec<Triangle> {
        (0..32)
            .map(|i| {
                let x = (i % 8) as Float * 2.0;
                let z = -((i / 8) as Float);
                Triangle::new(
                    Vector3f::new(x, 0.0, z),
                    Vector3f::new(x + 0.5, 0.0, z),
                    Vector3f::new(x, 0.5, z),
                )
            })
            .collect()
    }

    #[test]
    fn test_bvh_matches_brute_force() {
        let triangles = build_triangles();
        let bounds: Vec<_> = triangles.iter().map(|t| t.bounding_box()).collect();
        let bvh = BVH::new(&bounds);
        assert!(bvh.node_count() > 1);

        for i in 0..8 {
            let origin = Vector3f::new(i as Float * 2.0 + 0.1, 0.1, 1.0);
            let ray = Ray3f::new(origin, Vector3f::new(0.0, 0.0, -1.0), None, None);

            let bvh_hit = bvh.ray_intersection(&ray, |prim_idx, ray| {
                triangles[prim_idx].ray_intersection(ray).map(|h| (h.t(), h.t()))
            });
            let brute_t = triangles
                .iter()
                .filter_map(|tri| tri.ray_intersection(&ray).map(|h| h.t()))
                .fold(Float::MAX, Float::min);

            let (_, bvh_t) = bvh_hit.expect("BVH must hit");
            assert!((bvh_t - brute_t).abs() < 1e-5);
            assert!((bvh_t - 1.0).abs() < 1e-5);
            assert!(bvh.ray_intersection_t(&ray, |idx, ray| triangles[idx].ray_intersection_t(ray)));
        }

        let miss = Ray3f::new(Vector3f::new(100.0, 100.0, 1.0), Vector3f::new(0.0, 0.0, -1.0), None, None);
        assert!(bvh.ray_intersection(&miss, |idx, ray| {
            triangles[idx].ray_intersection(ray).map(|h| (h.t(), h.t()))
        }).is_none());
    }
}
