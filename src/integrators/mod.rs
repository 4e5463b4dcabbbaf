// Copyright @yucwang 2026

pub mod photon_path;
pub mod photon_tracer;

pub use photon_path::{trace_photon, PathSettings, PhotonRecord};
pub use photon_tracer::{
    PassCompleted, PassOutcome, PhotonTracer, RunSummary, TracerConfig, TracerControl, TracerState,
};
