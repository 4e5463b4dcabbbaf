// Copyright @yucwang 2021

pub mod bvh;
pub mod computation_node;
pub mod device;
pub mod emitter;
pub mod error;
pub mod interaction;
pub mod interop;
pub mod medium;
pub mod rng;
pub mod sample_generator;
pub mod scene;
pub mod shape;
pub mod volume;
