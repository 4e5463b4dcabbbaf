// Copyright @yucwang 2026

//! Progressive photon tracer.
//!
//! One pass is `emit -> trace -> bin -> accumulate`, each step a device
//! dispatch whose event the next one waits on. Tracing is enqueued and the
//! host blocks on it only where binning needs the records. Passes run strictly one after
//! another from the thread that owns the tracer; other threads steer it
//! through a [`TracerControl`] and learn about finished passes through
//! [`PassCompleted`] messages.

use crate::core::computation_node::{generate_node_id, ComputationNode};
use crate::core::device::{Device, Event, KernelProgram, Submission};
use crate::core::emitter::{EmitterFlag, LightSample, LightSourceSampler};
use crate::core::error::TracerError;
use crate::core::interop::SharedBuffer;
use crate::core::rng::RandomState;
use crate::core::scene::Scene;
use crate::integrators::photon_path::{trace_photon, PathSettings, PhotonRecord};
use crate::light_samplers::{DirectionalLightSampler, UniformLightSampler};
use crate::math::constants::Float;
use crate::math::spectrum::RGBSpectrum;
use crate::samplers::{RandomStateSeeder, StochasticSampleGenerator2D, DEFAULT_WORK_GROUP_SIZE};
use crate::volumes::accumulator::{AccumulatorSnapshot, LightVolumeAccumulator};
use crate::volumes::grid::CellGrid;

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

pub const TRACE_KERNEL: &str = "photon_tracer";
pub const BIN_KERNEL: &str = "photon_binning";

#[derive(Debug, Clone, PartialEq)]
pub struct TracerConfig {
    pub photons_per_pass: usize,
    pub work_group_size: usize,
    pub seed: u32,
    pub max_bounces: u32,
    pub russian_roulette_depth: u32,
    /// Display reads the live accumulator instead of a per-pass copy.
    pub share_with_display: bool,
    pub volume_resolution: [usize; 3],
}

impl Default for TracerConfig {
    fn default() -> Self {
        Self {
            photons_per_pass: 10_000,
            work_group_size: DEFAULT_WORK_GROUP_SIZE,
            seed: 0,
            max_bounces: 8,
            russian_roulette_depth: 3,
            share_with_display: false,
            volume_resolution: [32, 32, 32],
        }
    }
}

impl TracerConfig {
    pub fn validate(&self) -> Result<(), TracerError> {
        if self.photons_per_pass == 0 {
            return Err(TracerError::config("photons_per_pass must be positive"));
        }
        if self.work_group_size == 0 {
            return Err(TracerError::config("work_group_size must be positive"));
        }
        if self.max_bounces == 0 {
            return Err(TracerError::config("max_bounces must be at least 1"));
        }
        if self.russian_roulette_depth == 0 {
            return Err(TracerError::config("russian_roulette_depth must be at least 1"));
        }
        if self.volume_resolution.iter().any(|r| *r == 0) {
            return Err(TracerError::config(format!(
                "volume_resolution {:?} must be positive on every axis",
                self.volume_resolution
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracerState {
    Idle,
    Seeding,
    Tracing(u64),
    Accumulating(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed { pass: u64 },
    /// The configuration changed while the pass was in flight; its result was dropped.
    Stale,
}

/// Invalidation signal: a fresher volume is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassCompleted {
    pub pass: u64,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: u64,
    pub stale: u64,
    pub aborted: u64,
}

struct ControlShared {
    generation: AtomicU64,
    pending: Mutex<Option<TracerConfig>>,
    state: Mutex<TracerState>,
}

/// Thread-safe handle for steering a tracer that runs elsewhere.
///
/// Every request bumps the generation. A pass compares the generation it
/// started with against the current one before committing, and drops its
/// result if they differ; the next pass then applies the change and restarts
/// from an empty accumulator.
#[derive(Clone)]
pub struct TracerControl {
    shared: Arc<ControlShared>,
}

impl TracerControl {
    fn new() -> Self {
        Self {
            shared: Arc::new(ControlShared {
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
                state: Mutex::new(TracerState::Idle),
            }),
        }
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Forces a reseed and an accumulator reset before the next pass.
    pub fn request_regenerate(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Queues a configuration for the next pass. Validation happens when it is applied.
    pub fn submit_config(&self, config: TracerConfig) {
        match self.shared.pending.lock() {
            Ok(mut pending) => *pending = Some(config),
            Err(poisoned) => *poisoned.into_inner() = Some(config),
        }
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn state(&self) -> TracerState {
        match self.shared.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_state(&self, new_state: TracerState) {
        match self.shared.state.lock() {
            Ok(mut state) => *state = new_state,
            Err(poisoned) => *poisoned.into_inner() = new_state,
        }
    }

    fn take_pending(&self) -> Option<TracerConfig> {
        match self.shared.pending.lock() {
            Ok(mut pending) => pending.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

/// Splits `total` photons across lights in proportion to `powers`, using
/// largest-remainder rounding so the counts always add up to `total`.
pub fn allocate_photons(powers: &[Float], total: usize) -> Vec<usize> {
    let sum: f64 = powers.iter().map(|p| p.max(0.0) as f64).sum();
    if powers.is_empty() || sum <= 0.0 {
        return vec![0; powers.len()];
    }

    let quotas: Vec<f64> = powers.iter().map(|p| p.max(0.0) as f64 * total as f64 / sum).collect();
    let mut counts: Vec<usize> = quotas.iter().map(|q| q.floor() as usize).collect();
    let assigned: usize = counts.iter().sum();
    let mut order: Vec<usize> = (0..powers.len()).collect();
    order.sort_by(|a, b| {
        let fa = quotas[*a] - quotas[*a].floor();
        let fb = quotas[*b] - quotas[*b].floor();
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal).then(a.cmp(b))
    });
    for index in order.into_iter().take(total.saturating_sub(assigned)) {
        counts[index] += 1;
    }
    counts
}

fn light_seed(seed: u32, light_index: usize) -> u32 {
    seed.wrapping_add(0x9E37_79B9u32.wrapping_mul(light_index as u32 + 1))
}

struct LightSlot {
    sampler: Box<dyn LightSourceSampler>,
    count: usize,
}

#[derive(Clone, Default)]
struct PhotonLane {
    state: RandomState,
    records: Vec<PhotonRecord>,
}

pub struct PhotonTracer {
    id: String,
    device: Arc<Device>,
    trace_program: KernelProgram,
    bin_program: KernelProgram,
    seeder: RandomStateSeeder,
    config: TracerConfig,
    scene: Option<Arc<Scene>>,
    slots: Vec<LightSlot>,
    lane_states: Vec<RandomState>,
    accumulator: Option<LightVolumeAccumulator>,
    display: Option<Arc<SharedBuffer<RGBSpectrum>>>,
    control: TracerControl,
    applied_generation: u64,
    needs_setup: bool,
    subscribers: Vec<Sender<PassCompleted>>,
    light_samples: Vec<LightSample>,
    last_contribution: Vec<RGBSpectrum>,
    last_record_count: usize,
}

impl PhotonTracer {
    pub fn new(device: Arc<Device>) -> Self {
        let trace_program = device.program(TRACE_KERNEL);
        let bin_program = device.program(BIN_KERNEL);
        let seeder = RandomStateSeeder::new(device.clone());
        Self {
            id: generate_node_id("PhotonTracer"),
            device,
            trace_program,
            bin_program,
            seeder,
            config: TracerConfig::default(),
            scene: None,
            slots: Vec::new(),
            lane_states: Vec::new(),
            accumulator: None,
            display: None,
            control: TracerControl::new(),
            applied_generation: 0,
            needs_setup: true,
            subscribers: Vec::new(),
            light_samples: Vec::new(),
            last_contribution: Vec::new(),
            last_record_count: 0,
        }
    }

    pub fn with_config(device: Arc<Device>, config: TracerConfig) -> Result<Self, TracerError> {
        let mut tracer = Self::new(device);
        tracer.set_config(config)?;
        Ok(tracer)
    }

    pub fn config(&self) -> &TracerConfig {
        &self.config
    }

    /// Applies a new configuration; any actual change restarts at pass 0.
    pub fn set_config(&mut self, config: TracerConfig) -> Result<(), TracerError> {
        config.validate()?;
        if config != self.config {
            log::info!("{}: configuration changed, restarting at pass 0", self.id);
            self.config = config;
            self.needs_setup = true;
        }
        Ok(())
    }

    /// Replaces geometry and lights; the accumulator restarts at pass 0.
    pub fn set_scene(&mut self, scene: Arc<Scene>) -> Result<(), TracerError> {
        scene.validate()?;
        log::info!(
            "{}: scene with {} lights and {} triangles, restarting at pass 0",
            self.id,
            scene.lights().len(),
            scene.geometry().triangle_count()
        );
        self.scene = Some(scene);
        self.needs_setup = true;
        Ok(())
    }

    /// The "regenerate" trigger: reseed and restart at pass 0.
    pub fn regenerate(&mut self) {
        self.needs_setup = true;
    }

    pub fn control(&self) -> TracerControl {
        self.control.clone()
    }

    pub fn state(&self) -> TracerState {
        self.control.state()
    }

    pub fn subscribe(&mut self) -> Receiver<PassCompleted> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn passes(&self) -> u64 {
        self.accumulator.as_ref().map(|a| a.passes()).unwrap_or(0)
    }

    pub fn accumulator(&self) -> Option<&LightVolumeAccumulator> {
        self.accumulator.as_ref()
    }

    pub fn snapshot(&self) -> Result<AccumulatorSnapshot, TracerError> {
        self.accumulator
            .as_ref()
            .ok_or_else(|| TracerError::config("photon tracer has not been set up yet"))?
            .snapshot()
    }

    /// Buffer a display context reads: the live cells when sharing, else a
    /// copy refreshed after every completed pass.
    pub fn display_buffer(&self) -> Option<Arc<SharedBuffer<RGBSpectrum>>> {
        self.display.clone()
    }

    /// Light samples emitted by the last completed pass, for diagnostics.
    pub fn light_samples(&self) -> &[LightSample] {
        &self.light_samples
    }

    /// Per-cell radiance density of the last completed pass alone.
    pub fn last_pass_contribution(&self) -> &[RGBSpectrum] {
        &self.last_contribution
    }

    pub fn last_record_count(&self) -> usize {
        self.last_record_count
    }

    /// Runs one full pass. Configuration errors come straight back; device
    /// errors and pending kernels abort the pass, are logged, and leave the
    /// accumulator at its last completed pass.
    pub fn trace_pass(&mut self) -> Result<PassOutcome, TracerError> {
        self.apply_control()?;
        let scene = self
            .scene
            .clone()
            .ok_or_else(|| TracerError::config("photon tracer has no scene"))?;

        if self.needs_setup {
            if let Err(err) = self.setup(&scene) {
                return Err(self.abort(0, err));
            }
        }

        let pass = self.passes() + 1;
        self.control.set_state(TracerState::Tracing(pass));
        let emitted = match self.emit(&scene) {
            Ok(emitted) => emitted,
            Err(err) => return Err(self.abort(pass, err)),
        };
        let emitted = Arc::new(emitted);
        let submission = match self.trace(&scene, &emitted) {
            Ok(submission) => submission,
            Err(err) => return Err(self.abort(pass, err)),
        };
        // Binning needs the photon records on the host.
        let (lanes, trace_event) = match submission.wait() {
            Ok(traced) => traced,
            Err(err) => return Err(self.abort(pass, err)),
        };
        log::debug!("{}: traced {} photons in {:?}", self.id, lanes.len(), trace_event.elapsed());
        if self.is_stale() {
            return Ok(self.discard(pass));
        }

        self.control.set_state(TracerState::Accumulating(pass));
        let (contribution, record_count, bin_event) = match self.bin(&lanes, &[trace_event]) {
            Ok(binned) => binned,
            Err(err) => return Err(self.abort(pass, err)),
        };
        if self.is_stale() {
            return Ok(self.discard(pass));
        }
        let committed = match self.accumulator.as_mut() {
            Some(accumulator) => accumulator.commit_pass(&contribution, &[bin_event]),
            None => Err(TracerError::config("photon tracer lost its accumulator")),
        };
        if let Err(err) = committed {
            return Err(self.abort(pass, err));
        }

        for (state, lane) in self.lane_states.iter_mut().zip(lanes.iter()) {
            *state = lane.state;
        }
        self.light_samples = Arc::try_unwrap(emitted).unwrap_or_else(|shared| shared.as_ref().clone());
        self.last_contribution = contribution;
        self.last_record_count = record_count;
        self.publish_display();
        self.control.set_state(TracerState::Idle);

        let message = PassCompleted { pass, generation: self.applied_generation };
        self.subscribers.retain(|tx| tx.send(message).is_ok());
        log::debug!("{}: pass {} committed ({} photon records)", self.id, pass, record_count);
        Ok(PassOutcome::Completed { pass })
    }

    /// Drives `passes` passes, skipping the ones that abort or go stale.
    pub fn run(&mut self, passes: u64) -> Result<RunSummary, TracerError> {
        let progress = ProgressBar::new(passes);
        progress.set_style(
            ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} passes {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut summary = RunSummary::default();
        for _ in 0..passes {
            match self.trace_pass() {
                Ok(PassOutcome::Completed { pass }) => {
                    summary.completed += 1;
                    progress.set_message(format!("k = {}", pass));
                }
                Ok(PassOutcome::Stale) => summary.stale += 1,
                Err(err) if err.is_recoverable() => summary.aborted += 1,
                Err(err) => {
                    progress.abandon();
                    return Err(err);
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        log::info!(
            "{}: {} passes completed, {} stale, {} aborted; accumulator at pass {}",
            self.id,
            summary.completed,
            summary.stale,
            summary.aborted,
            self.passes()
        );
        Ok(summary)
    }

    fn apply_control(&mut self) -> Result<(), TracerError> {
        let generation = self.control.generation();
        if generation == self.applied_generation {
            return Ok(());
        }
        if let Some(config) = self.control.take_pending() {
            config.validate()?;
            self.config = config;
        }
        self.applied_generation = generation;
        self.needs_setup = true;
        log::info!("{}: applying control generation {}", self.id, generation);
        Ok(())
    }

    fn is_stale(&self) -> bool {
        self.control.generation() != self.applied_generation
    }

    fn discard(&mut self, pass: u64) -> PassOutcome {
        log::warn!("{}: pass {} went stale before commit and was discarded", self.id, pass);
        self.control.set_state(TracerState::Idle);
        PassOutcome::Stale
    }

    fn abort(&mut self, pass: u64, err: TracerError) -> TracerError {
        match &err {
            TracerError::DeviceExecution { .. } => {
                log::error!("{}: pass {} aborted, accumulator kept at pass {}: {}", self.id, pass, self.passes(), err)
            }
            TracerError::CompilationPending(_) => log::warn!("{}: pass {} skipped: {}", self.id, pass, err),
            _ => log::error!("{}: pass {} failed: {}", self.id, pass, err),
        }
        self.control.set_state(TracerState::Idle);
        err
    }

    /// Seeding state: fresh accumulator, photon budget, per-light samplers
    /// and per-lane random states.
    fn setup(&mut self, scene: &Scene) -> Result<(), TracerError> {
        self.control.set_state(TracerState::Seeding);
        let config = self.config.clone();
        let wgs = config.work_group_size;

        let grid = CellGrid::new(config.volume_resolution, scene.bounds())?;
        let accumulator = LightVolumeAccumulator::new(self.device.clone(), grid, wgs);
        self.display = Some(if config.share_with_display {
            accumulator.shared_cells()
        } else {
            Arc::new(SharedBuffer::new("light_volume_display", vec![RGBSpectrum::default(); grid.cell_count()]))
        });
        self.accumulator = Some(accumulator);
        self.light_samples.clear();
        self.last_contribution.clear();

        let counts = allocate_photons(&scene.light_powers(), config.photons_per_pass);
        let mut slots = Vec::new();
        for (index, (light, count)) in scene.lights().iter().zip(counts.iter()).enumerate() {
            if *count == 0 {
                continue;
            }
            let mut sampler: Box<dyn LightSourceSampler> = if light.flags().contains(EmitterFlag::DIRECTION) {
                Box::new(DirectionalLightSampler::new(self.device.clone(), wgs))
            } else {
                Box::new(UniformLightSampler::new(self.device.clone(), wgs))
            };
            sampler.set_light_source(light.clone(), index)?;
            sampler.set_sample_generator(Box::new(StochasticSampleGenerator2D::new(
                self.device.clone(),
                light_seed(config.seed, index),
                wgs,
            )));
            log::debug!("{}: {} photons for {}", self.id, count, light.describe());
            slots.push(LightSlot { sampler, count: *count });
        }

        let mut lane_states = vec![RandomState::default(); config.photons_per_pass];
        self.seeder.seed(&mut lane_states, config.seed, wgs)?;

        self.slots = slots;
        self.lane_states = lane_states;
        self.needs_setup = false;
        log::info!(
            "{}: seeded {} lanes with seed {}, volume {:?}",
            self.id,
            config.photons_per_pass,
            config.seed,
            config.volume_resolution
        );
        Ok(())
    }

    fn emit(&mut self, scene: &Scene) -> Result<Vec<LightSample>, TracerError> {
        let mut emitted = Vec::with_capacity(self.config.photons_per_pass);
        let mut buffer = Vec::new();
        for slot in self.slots.iter_mut() {
            slot.sampler.sample_light_source(Some(scene.geometry().as_ref()), slot.count, &mut buffer)?;
            let share = 1.0 / slot.count as Float;
            emitted.extend(buffer.iter().map(|s| LightSample { weight: s.weight * share, ..*s }));
        }
        Ok(emitted)
    }

    /// Enqueues the tracing kernel, one photon per lane.
    fn trace(&self, scene: &Arc<Scene>, emitted: &Arc<Vec<LightSample>>) -> Result<Submission<PhotonLane>, TracerError> {
        if emitted.len() != self.lane_states.len() {
            return Err(TracerError::config(format!(
                "{} emitted photons for {} seeded lanes",
                emitted.len(),
                self.lane_states.len()
            )));
        }

        let settings = PathSettings {
            max_bounces: self.config.max_bounces,
            russian_roulette_depth: self.config.russian_roulette_depth,
        };
        let lanes: Vec<PhotonLane> = self
            .lane_states
            .iter()
            .map(|state| PhotonLane { state: *state, records: Vec::new() })
            .collect();
        let scene = scene.clone();
        let emitted = emitted.clone();
        self.device.enqueue(&self.trace_program, self.config.work_group_size, Vec::new(), lanes, move |lane, slot| {
            if !slot.state.is_seeded() {
                return Err("random state was never seeded".to_string());
            }
            trace_photon(&scene, &settings, &emitted[lane], &mut slot.state, &mut slot.records)
        })
    }

    /// Buckets records per cell in lane order, then sums each bucket on the
    /// device in that same order, so the result does not depend on scheduling.
    fn bin(&self, lanes: &[PhotonLane], wait_list: &[Event]) -> Result<(Vec<RGBSpectrum>, usize, Event), TracerError> {
        let accumulator = self
            .accumulator
            .as_ref()
            .ok_or_else(|| TracerError::config("photon tracer has not been set up yet"))?;
        let grid = *accumulator.grid();
        let cell_count = grid.cell_count();

        let mut offsets = vec![0usize; cell_count + 1];
        let mut binned = Vec::new();
        let mut outside = 0usize;
        for record in lanes.iter().flat_map(|lane| lane.records.iter()) {
            match grid.cell_index(&record.position) {
                Some(cell) => {
                    offsets[cell + 1] += 1;
                    binned.push((cell, record.power));
                }
                None => outside += 1,
            }
        }
        for cell in 0..cell_count {
            offsets[cell + 1] += offsets[cell];
        }
        let mut cursor = offsets.clone();
        let mut sorted = vec![RGBSpectrum::default(); binned.len()];
        for (cell, power) in binned.iter() {
            sorted[cursor[*cell]] = *power;
            cursor[*cell] += 1;
        }
        if outside > 0 {
            log::debug!("{}: {} photon records fell outside the volume", self.id, outside);
        }

        let inv_volume = 1.0 / grid.cell_volume();
        let mut contribution = vec![RGBSpectrum::default(); cell_count];
        let event = self.device.dispatch(&self.bin_program, self.config.work_group_size, wait_list, &mut contribution, |cell, out| {
            let mut sum = RGBSpectrum::default();
            for power in &sorted[offsets[cell]..offsets[cell + 1]] {
                sum += *power;
            }
            *out = sum * inv_volume;
            Ok(())
        })?;
        Ok((contribution, binned.len(), event))
    }

    fn publish_display(&self) {
        if self.config.share_with_display {
            return;
        }
        let (display, accumulator) = match (&self.display, &self.accumulator) {
            (Some(display), Some(accumulator)) => (display, accumulator),
            _ => return,
        };
        let cells = match accumulator.snapshot() {
            Ok(snapshot) => snapshot.cells,
            Err(err) => {
                log::warn!("{}: could not copy the volume for display: {}", self.id, err);
                return;
            }
        };
        match display.try_acquire() {
            Ok(mut target) => *target = cells,
            Err(err) => log::warn!("{}: display copy skipped this pass: {}", self.id, err),
        }
    }
}

impl ComputationNode for PhotonTracer {
    fn id(&self) -> &str {
        &self.id
    }

    fn describe(&self) -> String {
        format!(
            "PhotonTracer[{}] {} photons/pass, pass {}, {:?}",
            self.id,
            self.config.photons_per_pass,
            self.passes(),
            self.state()
        )
    }
}
