// Copyright @yucwang 2026

//! Data-parallel compute device.
//!
//! Kernels are closures dispatched over a range of lanes. Lanes are grouped
//! into work groups and the work groups are pulled by a pool of scoped worker
//! threads, so there is no ordering guarantee between lanes. Every lane owns
//! exactly one output slot; a kernel therefore cannot observe another lane's
//! result, and the output is independent of how the groups were scheduled.
//!
//! [`Device::enqueue`] hands a dispatch to a background thread and returns a
//! pending [`Event`] right away; later dispatches wait on it through their
//! wait list, and the host only blocks at [`Submission::wait`].

use crate::core::error::TracerError;

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramState {
    Pending,
    Ready,
    Failed(String),
}

/// Handle to a named kernel program. Clones share the build state, so a host
/// can finish a build on another thread and every holder observes it.
#[derive(Debug, Clone)]
pub struct KernelProgram {
    name: Arc<str>,
    state: Arc<RwLock<ProgramState>>,
}

impl KernelProgram {
    pub fn ready(name: &str) -> Self {
        Self { name: Arc::from(name), state: Arc::new(RwLock::new(ProgramState::Ready)) }
    }

    pub fn pending(name: &str) -> Self {
        Self { name: Arc::from(name), state: Arc::new(RwLock::new(ProgramState::Pending)) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ProgramState {
        match self.state.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ProgramState::Ready
    }

    pub fn mark_ready(&self) {
        self.set_state(ProgramState::Ready);
        log::debug!("kernel '{}' is ready", self.name);
    }

    pub fn mark_failed(&self, message: &str) {
        self.set_state(ProgramState::Failed(message.to_string()));
        log::error!("kernel '{}' failed to build: {}", self.name, message);
    }

    pub fn ensure_ready(&self) -> Result<(), TracerError> {
        match self.state() {
            ProgramState::Ready => Ok(()),
            ProgramState::Pending => Err(TracerError::CompilationPending(self.name.to_string())),
            ProgramState::Failed(msg) => Err(TracerError::device(self.name(), format!("build failed: {}", msg))),
        }
    }

    fn set_state(&self, new_state: ProgramState) {
        match self.state.write() {
            Ok(mut state) => *state = new_state,
            Err(poisoned) => *poisoned.into_inner() = new_state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStatus {
    Pending,
    Complete,
    Failed(String),
}

#[derive(Debug)]
struct Signal {
    status: Mutex<(EventStatus, Duration)>,
    done: Condvar,
}

/// Completion signal of one dispatch; later dispatches list it in their wait
/// list. Clones share the signal, so every holder sees the same completion.
#[derive(Debug, Clone)]
pub struct Event {
    kernel: Arc<str>,
    lanes: usize,
    signal: Arc<Signal>,
}

impl Event {
    fn with_status(label: &str, lanes: usize, status: EventStatus, elapsed: Duration) -> Self {
        Self {
            kernel: Arc::from(label),
            lanes,
            signal: Arc::new(Signal { status: Mutex::new((status, elapsed)), done: Condvar::new() }),
        }
    }

    /// A host-side marker that is already complete.
    pub fn completed(label: &str) -> Self {
        Self::with_status(label, 0, EventStatus::Complete, Duration::ZERO)
    }

    pub fn failed(label: &str, message: &str) -> Self {
        Self::with_status(label, 0, EventStatus::Failed(message.to_string()), Duration::ZERO)
    }

    fn pending(label: &str, lanes: usize) -> Self {
        Self::with_status(label, lanes, EventStatus::Pending, Duration::ZERO)
    }

    fn finish(&self, status: EventStatus, elapsed: Duration) {
        let mut guard = match self.signal.status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = (status, elapsed);
        self.signal.done.notify_all();
    }

    pub fn kernel(&self) -> &str {
        &self.kernel
    }

    pub fn status(&self) -> EventStatus {
        match self.signal.status.lock() {
            Ok(guard) => guard.0.clone(),
            Err(poisoned) => poisoned.into_inner().0.clone(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == EventStatus::Complete
    }

    /// Blocks until the dispatch behind this event has finished.
    pub fn wait(&self) -> EventStatus {
        let mut guard = match self.signal.status.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while guard.0 == EventStatus::Pending {
            guard = match self.signal.done.wait(guard) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        guard.0.clone()
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn elapsed(&self) -> Duration {
        match self.signal.status.lock() {
            Ok(guard) => guard.1,
            Err(poisoned) => poisoned.into_inner().1,
        }
    }
}

/// An enqueued dispatch that owns its lane data until the host collects it.
pub struct Submission<T> {
    event: Event,
    handle: thread::JoinHandle<Result<Vec<T>, TracerError>>,
}

impl<T> Submission<T> {
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Host barrier: blocks until the dispatch finished and hands back its lanes.
    pub fn wait(self) -> Result<(Vec<T>, Event), TracerError> {
        let kernel = self.event.kernel().to_string();
        match self.handle.join() {
            Ok(Ok(lanes)) => Ok((lanes, self.event)),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(TracerError::device(&kernel, "dispatch thread panicked")),
        }
    }
}

/// Blocks on every event of `wait_list`; the first failed one is reported.
fn wait_for(kernel: &str, wait_list: &[Event]) -> Result<(), TracerError> {
    for event in wait_list {
        if let EventStatus::Failed(msg) = event.wait() {
            return Err(TracerError::device(kernel, format!("dependency '{}' failed: {}", event.kernel(), msg)));
        }
    }
    Ok(())
}

/// Runs `kernel` over `out` in work groups pulled by up to `worker_count`
/// scoped threads. Returns the first lane fault.
fn run_lanes<T, F>(name: &str, worker_count: usize, work_group_size: usize, out: &mut [T], kernel: &F) -> Result<(), String>
where
    T: Send,
    F: Fn(usize, &mut T) -> Result<(), String> + Sync,
{
    let lanes = out.len();
    let group_count = (lanes + work_group_size - 1) / work_group_size;
    let first_fault: Mutex<Option<String>> = Mutex::new(None);
    let faulted = AtomicBool::new(false);

    let run_group = |group_index: usize, group: &mut [T]| {
        let base = group_index * work_group_size;
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            for (local, slot) in group.iter_mut().enumerate() {
                kernel(base + local, slot).map_err(|msg| format!("lane {}: {}", base + local, msg))?;
            }
            Ok::<(), String>(())
        }));
        let fault = match result {
            Ok(Ok(())) => None,
            Ok(Err(msg)) => Some(msg),
            Err(_) => Some(format!("work group {} panicked", group_index)),
        };
        if let Some(msg) = fault {
            faulted.store(true, Ordering::SeqCst);
            if let Ok(mut slot) = first_fault.lock() {
                slot.get_or_insert(msg);
            }
        }
    };

    let workers = worker_count.min(group_count);
    if workers <= 1 {
        for (group_index, group) in out.chunks_mut(work_group_size).enumerate() {
            if faulted.load(Ordering::SeqCst) {
                break;
            }
            run_group(group_index, group);
        }
    } else {
        let queue = Mutex::new(out.chunks_mut(work_group_size).enumerate());
        let completed = AtomicUsize::new(0);
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if faulted.load(Ordering::SeqCst) {
                        break;
                    }
                    let next = match queue.lock() {
                        Ok(mut groups) => groups.next(),
                        Err(_) => None,
                    };
                    match next {
                        Some((group_index, group)) => {
                            run_group(group_index, group);
                            completed.fetch_add(1, Ordering::Relaxed);
                        }
                        None => break,
                    }
                });
            }
        });
        log::trace!("'{}' ran {} of {} work groups", name, completed.load(Ordering::Relaxed), group_count);
    }

    let fault = match first_fault.into_inner() {
        Ok(fault) => fault,
        Err(poisoned) => poisoned.into_inner(),
    };
    match fault {
        Some(msg) => Err(msg),
        None => Ok(()),
    }
}

pub struct Device {
    name: String,
    worker_count: usize,
    programs: Mutex<HashMap<String, KernelProgram>>,
    #[cfg(test)]
    fail_next: AtomicBool,
}

impl Device {
    pub fn new() -> Self {
        let worker_count = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_workers(worker_count)
    }

    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            name: format!("cpu-compute[{}]", worker_count.max(1)),
            worker_count: worker_count.max(1),
            programs: Mutex::new(HashMap::new()),
            #[cfg(test)]
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Looks up a program by name, building it on first use.
    pub fn program(&self, name: &str) -> KernelProgram {
        let mut programs = match self.programs.lock() {
            Ok(programs) => programs,
            Err(poisoned) => poisoned.into_inner(),
        };
        programs
            .entry(name.to_string())
            .or_insert_with(|| KernelProgram::ready(name))
            .clone()
    }

    /// Installs a program whose build the host drives itself (e.g. one still pending).
    pub fn register_program(&self, program: KernelProgram) {
        let mut programs = match self.programs.lock() {
            Ok(programs) => programs,
            Err(poisoned) => poisoned.into_inner(),
        };
        programs.insert(program.name().to_string(), program);
    }

    #[cfg(test)]
    pub(crate) fn fail_next_dispatch(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_launch(&self, program: &KernelProgram, work_group_size: usize) -> Result<(), TracerError> {
        program.ensure_ready()?;
        if work_group_size == 0 {
            return Err(TracerError::config(format!("work group size of '{}' must be positive", program.name())));
        }
        #[cfg(test)]
        {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(TracerError::device(program.name(), "injected device fault"));
            }
        }
        Ok(())
    }

    /// Runs `kernel` once per lane of `out`, lane `i` receiving `&mut out[i]`,
    /// and returns once every lane finished.
    ///
    /// Nothing runs unless the program is ready; the dispatch first waits on
    /// every event in `wait_list` and refuses to run after a failed one. On a
    /// fault the contents of `out` are unspecified; callers dispatch into
    /// scratch storage and commit on `Ok`.
    pub fn dispatch<T, F>(
        &self,
        program: &KernelProgram,
        work_group_size: usize,
        wait_list: &[Event],
        out: &mut [T],
        kernel: F,
    ) -> Result<Event, TracerError>
    where
        T: Send,
        F: Fn(usize, &mut T) -> Result<(), String> + Sync,
    {
        self.check_launch(program, work_group_size)?;
        wait_for(program.name(), wait_list)?;

        let start = Instant::now();
        let lanes = out.len();
        run_lanes(program.name(), self.worker_count, work_group_size, out, &kernel)
            .map_err(|msg| TracerError::device(program.name(), msg))?;

        let elapsed = start.elapsed();
        log::debug!("'{}' dispatched {} lanes in {} groups ({:.3} ms)",
                    program.name(), lanes, (lanes + work_group_size - 1) / work_group_size, elapsed.as_secs_f64() * 1000.0);
        Ok(Event::with_status(program.name(), lanes, EventStatus::Complete, elapsed))
    }

    /// Enqueues `kernel` over the owned `lanes` and returns at once.
    ///
    /// The dispatch starts on a background thread after every event of
    /// `wait_list` completed. The returned event turns complete or failed
    /// when it ends; [`Submission::wait`] is the host barrier that hands the
    /// lanes back. A pending program or a zero work group size is reported
    /// here, before anything is enqueued.
    pub fn enqueue<T, F>(
        &self,
        program: &KernelProgram,
        work_group_size: usize,
        wait_list: Vec<Event>,
        mut lanes: Vec<T>,
        kernel: F,
    ) -> Result<Submission<T>, TracerError>
    where
        T: Send + 'static,
        F: Fn(usize, &mut T) -> Result<(), String> + Send + Sync + 'static,
    {
        self.check_launch(program, work_group_size)?;

        let event = Event::pending(program.name(), lanes.len());
        let signal = event.clone();
        let name = program.name().to_string();
        let worker_count = self.worker_count;
        let handle = thread::spawn(move || {
            if let Err(err) = wait_for(&name, &wait_list) {
                signal.finish(EventStatus::Failed(err.to_string()), Duration::ZERO);
                return Err(err);
            }
            let start = Instant::now();
            match run_lanes(&name, worker_count, work_group_size, &mut lanes, &kernel) {
                Ok(()) => {
                    let elapsed = start.elapsed();
                    log::debug!("'{}' finished {} enqueued lanes ({:.3} ms)", name, lanes.len(), elapsed.as_secs_f64() * 1000.0);
                    signal.finish(EventStatus::Complete, elapsed);
                    Ok(lanes)
                }
                Err(msg) => {
                    signal.finish(EventStatus::Failed(msg.clone()), start.elapsed());
                    Err(TracerError::device(&name, msg))
                }
            }
        });
        Ok(Submission { event, handle })
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}
