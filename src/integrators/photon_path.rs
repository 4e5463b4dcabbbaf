// Copyright @yucwang 2026

use crate::core::emitter::LightSample;
use crate::core::medium::Medium;
use crate::core::rng::RandomState;
use crate::core::scene::Scene;
use crate::core::shape::Shape;
use crate::math::constants::{Float, Vector2f, Vector3f, FLOAT_MAX};
use crate::math::frame::Frame;
use crate::math::ray::Ray3f;
use crate::math::spectrum::RGBSpectrum;
use crate::math::warp::{sample_cosine_hemisphere, square_to_uniform_sphere};

/// One photon interaction: where it happened, the direction the photon was
/// travelling, the power it carried when it arrived and the bounce index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotonRecord {
    pub position: Vector3f,
    pub incoming: Vector3f,
    pub power: RGBSpectrum,
    pub bounce_depth: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct PathSettings {
    pub max_bounces: u32,
    pub russian_roulette_depth: u32,
}

/// Follows one photon from its emission sample, appending a record for every
/// interaction. Surfaces are Lambertian with the scene albedo; the medium, if
/// any, scatters isotropically. Survival past `russian_roulette_depth` is
/// decided by the albedo of the interaction.
pub fn trace_photon(
    scene: &Scene,
    settings: &PathSettings,
    emission: &LightSample,
    rng: &mut RandomState,
    records: &mut Vec<PhotonRecord>,
) -> Result<(), String> {
    let mut power = emission.weight;
    let mut ray = Ray3f::new(emission.position, emission.direction, None, None);
    let geometry = scene.geometry();

    for depth in 0..settings.max_bounces {
        if power.is_black() {
            break;
        }
        if !power.is_finite() {
            return Err(format!("photon power became non-finite at bounce {}", depth));
        }

        let hit = geometry.ray_intersection(&ray);
        let t_hit = hit.map(|h| h.t()).unwrap_or(FLOAT_MAX);
        let scatter = match scene.medium() {
            Some(medium) => medium
                .sample_free_flight(&ray, t_hit, rng.next_float())
                .map(|t| (t, medium.albedo(ray.at(t)))),
            None => None,
        };

        let (albedo, next_ray) = if let Some((t, albedo)) = scatter {
            let p = ray.at(t);
            records.push(PhotonRecord { position: p, incoming: ray.dir(), power, bounce_depth: depth });
            let u = Vector2f::new(rng.next_float(), rng.next_float());
            (albedo, Ray3f::new(p, square_to_uniform_sphere(&u), None, None))
        } else if let Some(hit) = hit {
            let p = hit.p();
            records.push(PhotonRecord { position: p, incoming: ray.dir(), power, bounce_depth: depth });
            let mut n = hit.sh_normal();
            if n.dot(&ray.dir()) > 0.0 {
                n = -n;
            }
            let u = Vector2f::new(rng.next_float(), rng.next_float());
            let dir = Frame::from_normal(&n).to_world(&sample_cosine_hemisphere(&u));
            (scene.surface_albedo(), Ray3f::spawn(p, n, dir))
        } else {
            break;
        };

        // Lambertian and isotropic scattering both reduce to weighting by the albedo.
        power = power * albedo;
        if depth + 1 >= settings.russian_roulette_depth {
            let q: Float = albedo.max_component().min(1.0);
            if q <= 0.0 || rng.next_float() >= q {
                break;
            }
            power = power / q;
        }
        ray = next_ray;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitters::PointLight;
    use crate::math::aabb::AABB;
    use crate::media::HomogeneousMedium;
    use crate::shapes::triangle_mesh::TriangleMesh;

    use std::sync::Arc;

    fn down_sample(weight: Float) -> LightSample {
        LightSample {
            position: Vector3f::new(0.0, 1.0, 0.0),
            direction: Vector3f::new(0.0, -1.0, 0.0),
            weight: RGBSpectrum::splat(weight),
            pdf: 1.0,
            light_id: 0,
        }
    }

    fn plane_scene(albedo: Float) -> Scene {
        let plane = TriangleMesh::quad(Vector3f::zeros(), Vector3f::new(0.0, 0.0, 1.0), Vector3f::new(1.0, 0.0, 0.0));
        Scene::new(Arc::new(plane))
            .with_light(Arc::new(PointLight::new(Vector3f::new(0.0, 1.0, 0.0), RGBSpectrum::splat(1.0))))
            .with_surface_albedo(RGBSpectrum::splat(albedo))
    }

    #[test]
    fn test_black_surface_records_first_hit_only() {
        let scene = plane_scene(0.0);
        let settings = PathSettings { max_bounces: 8, russian_roulette_depth: 1 };
        let mut rng = RandomState::from_draw(1);
        let mut records = Vec::new();
        trace_photon(&scene, &settings, &down_sample(2.0), &mut rng, &mut records).expect("trace");
        assert_eq!(records.len(), 1);
        assert!(records[0].position.norm() < 1e-5);
        assert_eq!(records[0].power, RGBSpectrum::splat(2.0));
        assert_eq!(records[0].bounce_depth, 0);
        assert!((records[0].incoming - Vector3f::new(0.0, -1.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_closed_white_box_respects_max_bounces() {
        let cube = TriangleMesh::cuboid(&AABB::new(Vector3f::new(-1.0, -1.0, -1.0), Vector3f::new(1.0, 1.0, 1.0)));
        let scene = Scene::new(Arc::new(cube)).with_surface_albedo(RGBSpectrum::splat(1.0));
        let settings = PathSettings { max_bounces: 5, russian_roulette_depth: 100 };
        let mut rng = RandomState::from_draw(7);
        let mut records = Vec::new();
        let mut sample = down_sample(1.0);
        sample.position = Vector3f::zeros();
        trace_photon(&scene, &settings, &sample, &mut rng, &mut records).expect("trace");
        assert_eq!(records.len(), 5);
        for (depth, record) in records.iter().enumerate() {
            assert_eq!(record.bounce_depth, depth as u32);
            assert!((record.power[0] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_dense_medium_scatters_before_the_surface() {
        let scene = plane_scene(0.0).with_medium(HomogeneousMedium::new(1.0e4, RGBSpectrum::splat(0.5)).with_bbox(Some(
            AABB::new(Vector3f::new(-1.0, 0.25, -1.0), Vector3f::new(1.0, 0.75, 1.0)),
        )));
        let settings = PathSettings { max_bounces: 1, russian_roulette_depth: 10 };
        let mut rng = RandomState::from_draw(3);
        let mut records = Vec::new();
        trace_photon(&scene, &settings, &down_sample(1.0), &mut rng, &mut records).expect("trace");
        assert_eq!(records.len(), 1);
        assert!((records[0].position.y - 0.75).abs() < 1e-2);
    }

    #[test]
    fn test_miss_records_nothing() {
        let scene = plane_scene(0.5);
        let settings = PathSettings { max_bounces: 4, russian_roulette_depth: 1 };
        let mut rng = RandomState::from_draw(5);
        let mut records = Vec::new();
        let mut sample = down_sample(1.0);
        sample.direction = Vector3f::new(0.0, 1.0, 0.0);
        trace_photon(&scene, &settings, &sample, &mut rng, &mut records).expect("trace");
        assert!(records.is_empty());
    }
}
