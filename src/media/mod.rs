// Copyright @yucwang 2026

pub mod homogeneous_medium;

pub use homogeneous_medium::HomogeneousMedium;
