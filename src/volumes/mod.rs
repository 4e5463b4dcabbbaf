// Copyright @yucwang 2026

pub mod accumulator;
pub mod grid;
pub mod grid_volume;
pub mod photon_to_volume;

pub use accumulator::{AccumulatorSnapshot, LightVolumeAccumulator};
pub use grid::CellGrid;
pub use grid_volume::VolumeEstimate;
pub use photon_to_volume::{DensityKernel, PhotonToVolume};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeFilterMode {
    Nearest,
    Trilinear,
}
