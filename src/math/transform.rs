// Copyright 2020 @TwoCookingMice

use super::constants::{ Vector3f, Matrix4f };

use nalgebra::Vector4;

/// Affine object-to-world transform with a cached inverse.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    matrix: Matrix4f,
    inv_matrix: Matrix4f
}

impl Default for Transform {
    fn default() -> Self {
        Self { matrix: Matrix4f::identity(),
               inv_matrix: Matrix4f::identity() }
    }
}

impl Transform {
    pub fn new(matrix: Matrix4f) -> Self {
        Self { matrix,
               inv_matrix: matrix.try_inverse().unwrap_or(Matrix4f::identity())}
    }

    pub fn translate(t: Vector3f) -> Self {
        Self::new(Matrix4f::new_translation(&t))
    }

    pub fn scale(s: Vector3f) -> Self {
        Self::new(Matrix4f::new_nonuniform_scaling(&s))
    }

    /// `self` applied after `inner`.
    pub fn compose(&self, inner: &Transform) -> Self {
        Self::new(self.matrix * inner.matrix)
    }

    pub fn matrix(&self) -> &Matrix4f {
        &self.matrix
    }

    pub fn apply_point(&self, p: Vector3f) -> Vector3f {
        project(&(self.matrix * Vector4::new(p.x, p.y, p.z, 1.0)))
    }

    pub fn apply_vector(&self, v: Vector3f) -> Vector3f {
        (self.matrix * Vector4::new(v.x, v.y, v.z, 0.0)).xyz()
    }

    // Normals transform with the inverse transpose so that n^T x = 0 survives.
    pub fn apply_normal(&self, n: Vector3f) -> Vector3f {
        (self.inv_matrix.transpose() * Vector4::new(n.x, n.y, n.z, 0.0)).xyz()
    }
}

fn project(h: &Vector4<f32>) -> Vector3f {
    if h.w != 0.0 && h.w != 1.0 {
        Vector3f::new(h.x / h.w, h.y / h.w, h.z / h.w)
    } else {
        h.xyz()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_and_scale() {
        let t = Transform::translate(Vector3f::new(1.0, 2.0, 3.0))
            .compose(&Transform::scale(Vector3f::new(2.0, 2.0, 2.0)));
        let p = t.apply_point(Vector3f::new(1.0, 0.0, 0.0));
        assert!((p - Vector3f::new(3.0, 2.0, 3.0)).norm() < 1e-6);

        let v = t.apply_vector(Vector3f::new(0.0, 1.0, 0.0));
        assert!((v - Vector3f::new(0.0, 2.0, 0.0)).norm() < 1e-6);

    }
}
