// Copyright @yucwang 2023

use super::constants::{ INV_FOUR_PI, INV_PI, PI, Float, Vector2f, Vector3f };

pub fn square_to_uniform_sphere(u: &Vector2f) -> Vector3f {
    let z: Float = 1.0 - 2.0 * u.x;
    let r: Float = (1.0 - z * z).max(0.0).sqrt();
    let phi: Float = 2.0 * PI * u.y;
    let (sin_phi, cos_phi) = phi.sin_cos();

    Vector3f::new(r * cos_phi, r * sin_phi, z)
}

pub fn square_to_uniform_sphere_pdf() -> Float {
    INV_FOUR_PI
}

pub fn sample_uniform_disk_concentric(u: &Vector2f) -> Vector2f {
    let r1: Float = 2.0 * u.x - 1.0;
    let r2: Float = 2.0 * u.y - 1.0;

    let phi: Float;
    let r:   Float;

    if r1 == 0. && r2 == 0. {
        r = 0.0;
        phi = 0.0;
    } else if r1 * r1 > r2 * r2 {
        r = r1;
        phi = (PI / 4.0) * (r2 / r1);
    } else {
        r = r2;
        phi = (PI / 2.0) - (r1 / r2) * (PI / 4.0);
    }

    let (sin_phi, cos_phi) = phi.sin_cos();

    Vector2f::new(r * cos_phi, r * sin_phi)
}

pub fn sample_cosine_hemisphere(u: &Vector2f) -> Vector3f {
    let p = sample_uniform_disk_concentric(u);
    let z = (1. - p.x * p.x - p.y * p.y).max(0.0).sqrt();

    Vector3f::new(p.x, p.y, z)
}

pub fn sample_cosine_hemisphere_pdf(cos_theta: Float) -> Float {
    if cos_theta > 0.0 { cos_theta * INV_PI } else { 0.0 }
}

/// Maps the unit square to barycentric coordinates, uniform by area.
pub fn square_to_triangle(u: &Vector2f) -> Vector3f {
    let su = u.x.max(0.0).sqrt();
    let b1 = 1.0 - su;
    let b2 = u.y * su;

    Vector3f::new(1.0 - b1 - b2, b1, b2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sphere_is_unit_length() {
        for i in 0..16 {
            for j in 0..16 {
                let u = Vector2f::new((i as Float + 0.5) / 16.0, (j as Float + 0.5) / 16.0);
                let d = square_to_uniform_sphere(&u);
                assert!((d.norm() - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_cosine_hemisphere_stays_above_horizon() {
        let d = sample_cosine_hemisphere(&Vector2f::new(0.3, 0.8));
        assert!(d.z >= 0.0);
        assert!((d.norm() - 1.0).abs() < 1e-5);
        assert_eq!(sample_cosine_hemisphere_pdf(-0.5), 0.0);
    }

    #[test]
    fn test_square_to_triangle_sums_to_one() {
        let b = square_to_triangle(&Vector2f::new(0.25, 0.6));
        assert!((b.x + b.y + b.z - 1.0).abs() < 1e-6);
        assert!(b.x >= 0.0 && b.y >= 0.0 && b.z >= 0.0);
    }
}
