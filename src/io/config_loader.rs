// Copyright @yucwang 2026

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::emitter::LightSource;
use crate::core::scene::Scene;
use crate::emitters::{AreaLight, DirectionalLight, PointLight};
use crate::integrators::photon_tracer::TracerConfig;
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;
use crate::math::transform::Transform;
use crate::media::HomogeneousMedium;
use crate::shapes::triangle_mesh::TriangleMesh;
use std::sync::Arc;

#[derive(Debug)]
pub enum ConfigLoadError {
    Io(std::io::Error),
    Parse(String),
    MissingField(&'static str),
}

impl From<std::io::Error> for ConfigLoadError {
    fn from(err: std::io::Error) -> Self {
        ConfigLoadError::Io(err)
    }
}

impl From<quick_xml::Error> for ConfigLoadError {
    fn from(err: quick_xml::Error) -> Self {
        ConfigLoadError::Parse(err.to_string())
    }
}

impl fmt::Display for ConfigLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigLoadError::Io(err) => write!(f, "io error: {}", err),
            ConfigLoadError::Parse(msg) => write!(f, "parse error: {}", msg),
            ConfigLoadError::MissingField(field) => write!(f, "missing field: {}", field),
        }
    }
}

impl std::error::Error for ConfigLoadError {}

/// Everything a `<lumenvol>` file describes. Geometry stays optional so the
/// command line can supply the bounding mesh instead.
pub struct ConfigLoadResult {
    pub config: TracerConfig,
    pub passes: Option<u64>,
    pub geometry: Option<Arc<TriangleMesh>>,
    pub lights: Vec<Arc<dyn LightSource>>,
    pub surface_albedo: Option<RGBSpectrum>,
    pub medium: Option<HomogeneousMedium>,
}

impl ConfigLoadResult {
    pub fn into_scene(self, geometry_override: Option<Arc<TriangleMesh>>) -> Result<Scene, ConfigLoadError> {
        let geometry = geometry_override.or(self.geometry).ok_or(ConfigLoadError::MissingField("geometry"))?;
        let mut scene = Scene::new(geometry);
        for light in self.lights {
            scene.add_light(light);
        }
        if let Some(albedo) = self.surface_albedo {
            scene = scene.with_surface_albedo(albedo);
        }
        if let Some(medium) = self.medium {
            scene = scene.with_medium(medium);
        }
        Ok(scene)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ConfigLoadResult, ConfigLoadError> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    log::info!("Loading tracer configuration from: {}.", path.display());
    parse_config(&xml, base_dir)
}

pub fn parse_config(xml: &str, base_dir: &Path) -> Result<ConfigLoadResult, ConfigLoadError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();

    let mut defaults: HashMap<String, String> = HashMap::new();
    let mut seen_root = false;
    let mut result = ConfigLoadResult {
        config: TracerConfig::default(),
        passes: None,
        geometry: None,
        lights: Vec::new(),
        surface_albedo: None,
        medium: None,
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let attrs = collect_attributes(&e, &defaults)?;
                match e.name().as_ref() {
                    b"lumenvol" => seen_root = true,
                    b"default" => {
                        // `<default>` values are taken literally; they are what `$name` expands to.
                        if let (Some(k), Some(v)) = (attrs.get("name"), attrs.get("value")) {
                            defaults.insert(k.clone(), v.clone());
                        }
                    }
                    b"tracer" => parse_tracer(&attrs, &mut result.config)?,
                    b"run" => {
                        if let Some(passes) = attrs.get("passes") {
                            result.passes = Some(parse_u64(passes)?);
                        }
                    }
                    b"geometry" => result.geometry = Some(Arc::new(parse_geometry(&attrs, base_dir)?)),
                    b"surface" => {
                        let albedo = attrs.get("albedo").ok_or(ConfigLoadError::MissingField("surface.albedo"))?;
                        result.surface_albedo = Some(parse_spectrum(albedo)?);
                    }
                    b"medium" => result.medium = Some(parse_medium(&attrs)?),
                    b"light" => result.lights.push(parse_light(&attrs)?),
                    other => {
                        log::warn!("Ignoring unknown element <{}>.", String::from_utf8_lossy(other));
                    }
                }
            }
            Err(e) => {
                return Err(ConfigLoadError::Parse(e.to_string()));
            }
            _ => {}
        }

        buf.clear();
    }

    if !seen_root {
        return Err(ConfigLoadError::MissingField("lumenvol"));
    }
    Ok(result)
}

fn collect_attributes(e: &BytesStart<'_>, defaults: &HashMap<String, String>) -> Result<HashMap<String, String>, ConfigLoadError> {
    let mut attrs = HashMap::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr.unescape_value()?;
        let value = if e.name().as_ref() == b"default" { value.to_string() } else { resolve_value(&value, defaults) };
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn parse_tracer(attrs: &HashMap<String, String>, config: &mut TracerConfig) -> Result<(), ConfigLoadError> {
    for (key, value) in attrs {
        match key.as_str() {
            "photons_per_pass" => config.photons_per_pass = parse_usize(value)?,
            "work_group_size" => config.work_group_size = parse_usize(value)?,
            "seed" => config.seed = parse_u32(value)?,
            "max_bounces" => config.max_bounces = parse_u32(value)?,
            "russian_roulette_depth" => config.russian_roulette_depth = parse_u32(value)?,
            "share_with_display" => config.share_with_display = parse_bool(value)?,
            "volume_resolution" => config.volume_resolution = parse_resolution(value)?,
            _ => log::warn!("Ignoring unknown tracer attribute '{}'.", key),
        }
    }
    Ok(())
}

fn parse_geometry(attrs: &HashMap<String, String>, base_dir: &Path) -> Result<TriangleMesh, ConfigLoadError> {
    let geometry_type = attrs.get("type").ok_or(ConfigLoadError::MissingField("geometry.type"))?;
    match geometry_type.as_str() {
        "obj" => {
            let filename = attrs.get("filename").ok_or(ConfigLoadError::MissingField("geometry.filename"))?;
            let filename = if Path::new(filename).is_absolute() {
                filename.clone()
            } else {
                base_dir.join(filename).to_string_lossy().to_string()
            };
            TriangleMesh::from_obj(&filename).map_err(|e| ConfigLoadError::Parse(format!("obj load failed: {}", e)))
        }
        "box" => {
            let p_min = parse_vec3(attrs.get("min").ok_or(ConfigLoadError::MissingField("geometry.min"))?)?;
            let p_max = parse_vec3(attrs.get("max").ok_or(ConfigLoadError::MissingField("geometry.max"))?)?;
            Ok(TriangleMesh::cuboid(&AABB::new(p_min, p_max)))
        }
        "plane" => {
            let (center, half_u, half_v) = parse_quad(attrs)?;
            Ok(TriangleMesh::quad(center, half_u, half_v))
        }
        other => Err(ConfigLoadError::Parse(format!("unsupported geometry: {}", other))),
    }
}

fn parse_medium(attrs: &HashMap<String, String>) -> Result<HomogeneousMedium, ConfigLoadError> {
    let sigma_t = parse_float(attrs.get("sigma_t").ok_or(ConfigLoadError::MissingField("medium.sigma_t"))?)?;
    let albedo = match attrs.get("albedo") {
        Some(value) => parse_spectrum(value)?,
        None => RGBSpectrum::splat(1.0),
    };
    let mut medium = HomogeneousMedium::new(sigma_t, albedo);
    if let Some(scale) = attrs.get("scale") {
        medium = medium.with_scale(parse_float(scale)?);
    }
    if let (Some(p_min), Some(p_max)) = (attrs.get("min"), attrs.get("max")) {
        medium = medium.with_bbox(Some(AABB::new(parse_vec3(p_min)?, parse_vec3(p_max)?)));
    }
    Ok(medium)
}

/// Object-to-world transform of a light: `translate` applied after `scale`.
/// Either attribute may be omitted.
fn parse_transform(attrs: &HashMap<String, String>) -> Result<Transform, ConfigLoadError> {
    let mut transform = Transform::default();
    if let Some(scale) = attrs.get("scale") {
        let s = match parse_float(scale) {
            Ok(uniform) => Vector3f::new(uniform, uniform, uniform),
            Err(_) => parse_vec3(scale)?,
        };
        transform = Transform::scale(s);
    }
    if let Some(translate) = attrs.get("translate") {
        transform = Transform::translate(parse_vec3(translate)?).compose(&transform);
    }
    Ok(transform)
}

fn parse_light(attrs: &HashMap<String, String>) -> Result<Arc<dyn LightSource>, ConfigLoadError> {
    let light_type = attrs.get("type").ok_or(ConfigLoadError::MissingField("light.type"))?;
    let to_world = parse_transform(attrs)?;
    match light_type.as_str() {
        "point" => {
            let position = parse_vec3(attrs.get("position").ok_or(ConfigLoadError::MissingField("light.position"))?)?;
            let intensity = parse_spectrum(attrs.get("intensity").ok_or(ConfigLoadError::MissingField("light.intensity"))?)?;
            Ok(Arc::new(PointLight::new(position, intensity).transformed(&to_world)))
        }
        "directional" => {
            let direction = parse_vec3(attrs.get("direction").ok_or(ConfigLoadError::MissingField("light.direction"))?)?;
            let irradiance = parse_spectrum(attrs.get("irradiance").ok_or(ConfigLoadError::MissingField("light.irradiance"))?)?;
            if direction.norm() == 0.0 {
                return Err(ConfigLoadError::Parse("directional light needs a non-zero direction".to_string()));
            }
            Ok(Arc::new(DirectionalLight::new_with(direction, irradiance).transformed(&to_world)))
        }
        "area" => {
            let (center, half_u, half_v) = parse_quad(attrs)?;
            let radiance = parse_spectrum(attrs.get("radiance").ok_or(ConfigLoadError::MissingField("light.radiance"))?)?;
            let shape = Arc::new(TriangleMesh::quad(center, half_u, half_v).transformed(&to_world));
            Ok(Arc::new(AreaLight::from_shape(shape, radiance)))
        }
        other => Err(ConfigLoadError::Parse(format!("unsupported light: {}", other))),
    }
}

fn parse_quad(attrs: &HashMap<String, String>) -> Result<(Vector3f, Vector3f, Vector3f), ConfigLoadError> {
    let center = parse_vec3(attrs.get("center").ok_or(ConfigLoadError::MissingField("center"))?)?;
    let half_u = parse_vec3(attrs.get("half_u").ok_or(ConfigLoadError::MissingField("half_u"))?)?;
    let half_v = parse_vec3(attrs.get("half_v").ok_or(ConfigLoadError::MissingField("half_v"))?)?;
    Ok((center, half_u, half_v))
}

/// Replaces every `$name` token by its default. A name runs over ASCII
/// letters, digits and `_`; unknown names are kept as written.
fn resolve_value(raw: &str, defaults: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..len];
        match defaults.get(name) {
            Some(value) if !name.is_empty() => out.push_str(value),
            _ => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

fn parse_float(value: &str) -> Result<Float, ConfigLoadError> {
    value.trim().parse::<Float>().map_err(|_| ConfigLoadError::Parse(format!("invalid float: {}", value)))
}

fn parse_u32(value: &str) -> Result<u32, ConfigLoadError> {
    value.trim().parse::<u32>().map_err(|_| ConfigLoadError::Parse(format!("invalid integer: {}", value)))
}

fn parse_u64(value: &str) -> Result<u64, ConfigLoadError> {
    value.trim().parse::<u64>().map_err(|_| ConfigLoadError::Parse(format!("invalid integer: {}", value)))
}

fn parse_usize(value: &str) -> Result<usize, ConfigLoadError> {
    value.trim().parse::<usize>().map_err(|_| ConfigLoadError::Parse(format!("invalid integer: {}", value)))
}

fn parse_bool(value: &str) -> Result<bool, ConfigLoadError> {
    match value.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigLoadError::Parse(format!("invalid boolean: {}", value))),
    }
}

fn parse_vec3(value: &str) -> Result<Vector3f, ConfigLoadError> {
    let mut parts = value.split(',').map(|s| s.trim()).filter(|s| !s.is_empty());
    let x = parts.next().ok_or_else(|| ConfigLoadError::Parse("invalid vec3".to_string()))?;
    let y = parts.next().ok_or_else(|| ConfigLoadError::Parse("invalid vec3".to_string()))?;
    let z = parts.next().ok_or_else(|| ConfigLoadError::Parse("invalid vec3".to_string()))?;
    Ok(Vector3f::new(parse_float(x)?, parse_float(y)?, parse_float(z)?))
}

/// A single number is a grey spectrum; three comma-separated numbers are RGB.
fn parse_spectrum(value: &str) -> Result<RGBSpectrum, ConfigLoadError> {
    if value.contains(',') {
        let v = parse_vec3(value)?;
        Ok(RGBSpectrum::new(v.x, v.y, v.z))
    } else {
        Ok(RGBSpectrum::splat(parse_float(value)?))
    }
}

fn parse_resolution(value: &str) -> Result<[usize; 3], ConfigLoadError> {
    let parts: Vec<&str> = value.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).collect();
    match parts.as_slice() {
        [n] => {
            let n = parse_usize(n)?;
            Ok([n, n, n])
        }
        [x, y, z] => Ok([parse_usize(x)?, parse_usize(y)?, parse_usize(z)?]),
        _ => Err(ConfigLoadError::Parse(format!("invalid resolution: {}", value))),
    }
}
