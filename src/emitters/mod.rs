// Copyright @yucwang 2026

pub mod area;
pub mod directional;
pub mod point;

pub use area::AreaLight;
pub use directional::DirectionalLight;
pub use point::PointLight;
