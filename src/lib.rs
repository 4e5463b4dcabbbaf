// Copyright @yucwang 2021

pub extern crate nalgebra as na;

pub mod core;
pub mod emitters;
pub mod integrators;
pub mod io;
pub mod light_samplers;
pub mod math;
pub mod media;
pub mod samplers;
pub mod shapes;
pub mod volumes;
