// Copyright 2020 @TwoCookingMice

use super::constants::{Float, Vector3f, FLOAT_MAX, RAY_EPSILON};

#[derive(Debug, Clone, Copy)]
pub struct Ray3f {
    origin: Vector3f,
    dir: Vector3f,
    pub min_t: Float,
    pub max_t: Float
}

impl Ray3f {
    pub fn new(o: Vector3f, d: Vector3f,
               min_t: Option<Float>, max_t: Option<Float>) -> Self {
        Self { origin: o, dir: d.normalize(),
               min_t: min_t.unwrap_or(0.0),
               max_t: max_t.unwrap_or(FLOAT_MAX)}
    }

    /// Ray leaving a surface point, pushed off along `n` to the side `d` points to.
    pub fn spawn(p: Vector3f, n: Vector3f, d: Vector3f) -> Self {
        let side = if n.dot(&d) >= 0.0 { 1.0 } else { -1.0 };
        Self::new(p + n * (side * RAY_EPSILON), d, Some(0.0), None)
    }

    pub fn origin(&self) -> Vector3f {
        self.origin
    }

    pub fn dir(&self) -> Vector3f {
        self.dir
    }

    pub fn at(&self, t: Float) -> Vector3f {
        self.origin + self.dir * t
    }

    pub fn test_segment(&self, t: Float) -> bool {
        t >= self.min_t && t <= self.max_t
    }
}

#[cfg(test)]
mod tests {
    use super::Vector3f;
    use super::Ray3f;

    #[test]
    fn test_ray3f() {
        let o = Vector3f::new(0.0, 0.0, 0.0);
        let d = Vector3f::new(1.0, 0.0, 1.0);
        let ray = Ray3f::new(o, d, Some(1.0), Some(100.0));
        assert_eq!(o, ray.origin());

        let v1 = ray.at(2.0);
        assert!((v1[0] - std::f32::consts::SQRT_2).abs() < 1e-5);
        assert!(v1[1].abs() < 1e-6);

        assert!(ray.test_segment(50.0));
        assert!(!ray.test_segment(0.5));
        assert!(!ray.test_segment(105.0));
    }

    #[test]
    fn test_spawn_offsets_towards_direction() {
        let n = Vector3f::new(0.0, 0.0, 1.0);
        let up = Ray3f::spawn(Vector3f::zeros(), n, Vector3f::new(0.0, 0.0, 1.0));
        let down = Ray3f::spawn(Vector3f::zeros(), n, Vector3f::new(0.0, 0.0, -1.0));
        assert!(up.origin().z > 0.0);
        assert!(down.origin().z < 0.0);
    }
}
