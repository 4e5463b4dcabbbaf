// Copyright @yucwang 2026

pub mod config_loader;
pub mod exr_utils;
pub mod image_utils;
pub mod obj_utils;
