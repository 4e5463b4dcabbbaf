// Copyright @yucwang 2026

use crate::core::computation_node::{generate_node_id, ComputationNode};
use crate::core::device::{Device, KernelProgram};
use crate::core::error::TracerError;
use crate::core::rng::RandomState;
use crate::core::sample_generator::{Sample2D, SampleGenerator2D};
use crate::samplers::seeder::RandomStateSeeder;

use std::sync::Arc;

pub const STOCHASTIC_KERNEL: &str = "stochastic_sample_generator_2d";

#[derive(Clone, Copy, Default)]
struct LaneDraw {
    state: RandomState,
    first: Sample2D,
    second: Sample2D,
}

/// Random generator backed by one [`RandomState`] per lane.
///
/// Every call advances each lane's state, so no two calls ever see the same
/// stream. A call for `count` samples draws from lanes `0..count`; lanes
/// beyond the current buffer are seeded as they are first needed and keep
/// their advanced state when a later call asks for fewer. The whole buffer is
/// reseeded only on first use, after [`reset`] or after a seed change. Taking
/// `&mut self` keeps a single generate in flight per buffer.
///
/// [`reset`]: SampleGenerator2D::reset
pub struct StochasticSampleGenerator2D {
    id: String,
    device: Arc<Device>,
    program: KernelProgram,
    seeder: RandomStateSeeder,
    seed: u32,
    work_group_size: usize,
    states: Vec<RandomState>,
    needs_reseed: bool,
}

impl StochasticSampleGenerator2D {
    pub fn new(device: Arc<Device>, seed: u32, work_group_size: usize) -> Self {
        let program = device.program(STOCHASTIC_KERNEL);
        let seeder = RandomStateSeeder::new(device.clone());
        Self {
            id: generate_node_id("StochasticSampleGenerator2D"),
            device,
            program,
            seeder,
            seed,
            work_group_size,
            states: Vec::new(),
            needs_reseed: true,
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn set_seed(&mut self, seed: u32) {
        if seed != self.seed {
            self.seed = seed;
            self.needs_reseed = true;
        }
    }

    /// Current lane states, for diagnostics.
    pub fn states(&self) -> &[RandomState] {
        &self.states
    }

    fn ensure_seeded(&mut self, count: usize) -> Result<(), TracerError> {
        let kept = if self.needs_reseed { 0 } else { self.states.len() };
        if kept >= count {
            return Ok(());
        }
        let mut fresh = vec![RandomState::default(); count - kept];
        self.seeder.seed_from(&mut fresh, self.seed, kept, self.work_group_size)?;
        self.states.truncate(kept);
        self.states.extend(fresh);
        self.needs_reseed = false;
        log::debug!("{} seeded lanes {}..{} with seed {}", self.id, kept, count, self.seed);
        Ok(())
    }
}

impl ComputationNode for StochasticSampleGenerator2D {
    fn id(&self) -> &str {
        &self.id
    }

    fn describe(&self) -> String {
        format!("StochasticSampleGenerator2D[{}] seed={} lanes={}", self.id, self.seed, self.states.len())
    }
}

impl SampleGenerator2D for StochasticSampleGenerator2D {
    fn reset(&mut self) {
        self.needs_reseed = true;
    }

    fn generate(
        &mut self,
        count: usize,
        out: &mut Vec<Sample2D>,
        out2: Option<&mut Vec<Sample2D>>,
    ) -> Result<(), TracerError> {
        if count == 0 {
            return Ok(());
        }
        self.program.ensure_ready()?;
        self.ensure_seeded(count)?;

        let want_second = out2.is_some();
        let mut lanes: Vec<LaneDraw> = self.states[..count]
            .iter()
            .map(|state| LaneDraw { state: *state, ..LaneDraw::default() })
            .collect();

        self.device.dispatch(&self.program, self.work_group_size, &[], &mut lanes, |_, lane| {
            if !lane.state.is_seeded() {
                return Err("random state was never seeded".to_string());
            }
            let mut state = lane.state;
            lane.first = Sample2D::new(state.next_float(), state.next_float(), 1.0);
            if want_second {
                lane.second = Sample2D::new(state.next_float(), state.next_float(), 1.0);
            }
            lane.state = state;
            Ok(())
        })?;

        for (state, lane) in self.states.iter_mut().zip(lanes.iter()) {
            *state = lane.state;
        }
        *out = lanes.iter().map(|l| l.first).collect();
        if let Some(out2) = out2 {
            *out2 = lanes.iter().map(|l| l.second).collect();
        }
        Ok(())
    }
}
