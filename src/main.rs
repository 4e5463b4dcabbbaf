// Copyright 2020 TwoCookingMice

use lumenvol::core::device::Device;
use lumenvol::core::sample_generator::SampleGenerator2D;
use lumenvol::core::scene::Scene;
use lumenvol::core::shape::Shape;
use lumenvol::emitters::PointLight;
use lumenvol::integrators::photon_tracer::{PhotonTracer, TracerConfig};
use lumenvol::io::config_loader::load_config;
use lumenvol::io::{exr_utils, image_utils};
use lumenvol::math::aabb::AABB;
use lumenvol::math::constants::Vector3f;
use lumenvol::math::spectrum::RGBSpectrum;
use lumenvol::samplers::StochasticSampleGenerator2D;
use lumenvol::shapes::triangle_mesh::TriangleMesh;
use lumenvol::volumes::{DensityKernel, PhotonToVolume};

use std::env;
use std::error::Error;
use std::sync::Arc;

const DEFAULT_PASSES: u64 = 16;
const SCATTER_SAMPLES: usize = 1024;

struct Options {
    input_path: String,
    output_prefix: String,
    passes: Option<u64>,
    photons: Option<usize>,
    seed: Option<u32>,
    mesh_path: Option<String>,
}

fn parse_options(args: &[String]) -> Option<Options> {
    if args.len() < 3 {
        return None;
    }
    let mut options = Options {
        input_path: args[1].clone(),
        output_prefix: args[2].clone(),
        passes: None,
        photons: None,
        seed: None,
        mesh_path: None,
    };

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--passes" => {
                i += 1;
                options.passes = args.get(i).and_then(|v| v.parse::<u64>().ok());
            }
            "--photons" => {
                i += 1;
                options.photons = args.get(i).and_then(|v| v.parse::<usize>().ok());
            }
            "--seed" => {
                i += 1;
                options.seed = args.get(i).and_then(|v| v.parse::<u32>().ok());
            }
            "--mesh" => {
                i += 1;
                options.mesh_path = args.get(i).cloned();
            }
            other => log::warn!("Ignoring unknown argument '{}'.", other),
        }
        i += 1;
    }
    Some(options)
}

/// Closed grey box with a point light under the ceiling.
fn default_scene(geometry: Option<Arc<TriangleMesh>>) -> Scene {
    let geometry = geometry.unwrap_or_else(|| {
        Arc::new(TriangleMesh::cuboid(&AABB::new(Vector3f::new(-1.0, -1.0, -1.0), Vector3f::new(1.0, 1.0, 1.0))))
    });
    let light_position = geometry.bounding_box().center() + Vector3f::new(0.0, 0.5 * geometry.bounding_box().diagnal().y, 0.0) * 0.8;
    Scene::new(geometry)
        .with_light(Arc::new(PointLight::new(light_position, RGBSpectrum::splat(5.0))))
        .with_surface_albedo(RGBSpectrum::splat(0.6))
}

fn run(options: Options) -> Result<(), Box<dyn Error>> {
    let mesh = match &options.mesh_path {
        Some(path) => Some(Arc::new(TriangleMesh::from_obj(path)?)),
        None => None,
    };

    let (mut config, passes, scene) = if options.input_path == "-" {
        (TracerConfig::default(), None, default_scene(mesh))
    } else {
        let loaded = load_config(&options.input_path)?;
        let config = loaded.config.clone();
        let passes = loaded.passes;
        (config, passes, loaded.into_scene(mesh)?)
    };
    if let Some(photons) = options.photons {
        config.photons_per_pass = photons;
    }
    if let Some(seed) = options.seed {
        config.seed = seed;
    }
    let passes = options.passes.or(passes).unwrap_or(DEFAULT_PASSES);

    let device = Arc::new(Device::new());
    log::info!("Tracing {} passes of {} photons on {}.", passes, config.photons_per_pass, device.name());

    let mut tracer = PhotonTracer::with_config(device.clone(), config.clone())?;
    tracer.set_scene(Arc::new(scene))?;
    tracer.run(passes)?;

    let snapshot = tracer.snapshot()?;
    let converter = PhotonToVolume::new(device.clone(), DensityKernel::Tent { radius: 1 }, config.work_group_size);
    let volume = converter.convert(&snapshot)?;
    log::info!("Light volume after {} passes, peak density {}.", volume.passes(), volume.max_value());

    let slice = volume.grid().dims()[2] / 2;
    exr_utils::write_volume_slice(&volume, slice, &format!("{}_slice.exr", options.output_prefix))?;

    let mut generator = StochasticSampleGenerator2D::new(device, config.seed, config.work_group_size);
    let mut samples = Vec::new();
    generator.generate(SCATTER_SAMPLES, &mut samples, None)?;
    image_utils::write_sample_scatter(&samples, 256, format!("{}_samples.png", options.output_prefix))?;
    Ok(())
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let options = match parse_options(&args) {
        Some(options) => options,
        None => {
            eprintln!(
                "Usage: {} <config.xml|-> <out-prefix> [--passes N] [--photons N] [--seed N] [--mesh file.obj]",
                args.first().map(String::as_str).unwrap_or("lumenvol")
            );
            std::process::exit(1);
        }
    };

    if let Err(err) = run(options) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
