//! Simulation runner with lifecycle management
//!
//! This module provides the `SimulationRunner` which drives a kernel on a
//! background thread. Control inputs (pointer, config edits, particle count,
//! resets) are queued and applied between frames; after every frame the
//! runner publishes a `ParticleSnapshot` and the frame's metrics.

use kernel::{FrameMetrics, Interaction, Layout, ParticleSnapshot, SimulationKernel, SolverConfig};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SimulationConfig;

/// Physics time per frame above which a warning is logged.
pub const FRAME_BUDGET: Duration = Duration::from_millis(16);

/// Runner state enum
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerState {
    /// Simulation created but not yet started
    Created,
    /// Simulation actively running
    Running,
    /// Simulation paused
    Paused,
    /// Simulation finished (frame limit reached or stopped)
    Finished,
    /// Simulation encountered an error
    Error,
}

/// Frame-loop settings taken from the simulation config
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunnerSettings {
    /// Stop after this many frames
    pub max_frames: Option<u64>,
    /// Pace frames to this rate
    pub target_fps: Option<f32>,
    /// Run frames inside a dedicated rayon pool of this size
    pub worker_threads: Option<usize>,
    /// Gravity rotation in the XY plane per frame (degrees)
    pub gravity_rotation_step_deg: f32,
}

impl From<&SimulationConfig> for RunnerSettings {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            max_frames: config.max_frames,
            target_fps: config.target_fps,
            worker_threads: config.worker_threads,
            gravity_rotation_step_deg: config.gravity_rotation_step_deg,
        }
    }
}

/// Input queued by the control side, applied before the next frame
#[derive(Debug, Clone)]
enum Command {
    SetInteraction(Interaction),
    SetConfig(Box<SolverConfig>),
    SetParticleCount(usize),
    Reset(Layout),
    StepOnce,
}

/// Shared state between the runner thread and control interface
struct SharedState {
    /// Current runner state
    state: RunnerState,
    /// Simulated time (seconds)
    sim_time: f64,
    /// Number of frames in which physics ran
    frame_count: u64,
    /// Most recent error message (if state is Error)
    error_message: Option<String>,
    /// Inputs not yet applied
    commands: Vec<Command>,
    /// Particles after the last frame
    snapshot: Arc<ParticleSnapshot>,
    /// Metrics of the last frame
    metrics: FrameMetrics,
}

/// Lock the shared state, recovering it if a holder panicked.
fn lock(shared: &Mutex<SharedState>) -> MutexGuard<'_, SharedState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle for controlling and querying a running simulation
pub struct SimulationRunner {
    /// Shared state (protected by mutex)
    shared: Arc<Mutex<SharedState>>,
    /// Handle to the background thread
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl SimulationRunner {
    /// Create a new simulation runner with the given kernel
    ///
    /// The thread is spawned immediately but waits in `Created` until
    /// [`start`](Self::start) is called.
    pub fn new(mut kernel: Box<dyn SimulationKernel + Send>, settings: RunnerSettings) -> Self {
        let shared = Arc::new(Mutex::new(SharedState {
            state: RunnerState::Created,
            sim_time: 0.0,
            frame_count: 0,
            error_message: None,
            commands: Vec::new(),
            snapshot: Arc::new(kernel.snapshot()),
            metrics: kernel.metrics(),
        }));

        let shared_clone = Arc::clone(&shared);

        // Spawn background thread
        let thread_handle = thread::Builder::new()
            .name("sph-runner".to_string())
            .spawn(move || {
                run_simulation_loop(kernel.as_mut(), shared_clone, settings);
            });

        let thread_handle = match thread_handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                let mut guard = lock(&shared);
                guard.state = RunnerState::Error;
                guard.error_message = Some(format!("Failed to spawn runner thread: {}", e));
                None
            }
        };

        Self {
            shared,
            thread_handle,
        }
    }

    /// Get current runner state
    pub fn state(&self) -> RunnerState {
        lock(&self.shared).state.clone()
    }

    /// Get simulated time (seconds)
    pub fn sim_time(&self) -> f64 {
        lock(&self.shared).sim_time
    }

    /// Get number of frames in which physics ran
    pub fn frame_count(&self) -> u64 {
        lock(&self.shared).frame_count
    }

    /// Get error message if state is Error
    pub fn error_message(&self) -> Option<String> {
        lock(&self.shared).error_message.clone()
    }

    /// Particles as of the last completed frame
    pub fn snapshot(&self) -> Arc<ParticleSnapshot> {
        Arc::clone(&lock(&self.shared).snapshot)
    }

    /// Metrics of the last completed frame
    pub fn metrics(&self) -> FrameMetrics {
        lock(&self.shared).metrics
    }

    /// Start the simulation (transition from Created to Running)
    pub fn start(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Created {
            state.state = RunnerState::Running;
        }
    }

    /// Pause the simulation
    pub fn pause(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Running {
            state.state = RunnerState::Paused;
        }
    }

    /// Resume the simulation
    pub fn resume(&self) {
        let mut state = lock(&self.shared);
        if state.state == RunnerState::Paused {
            state.state = RunnerState::Running;
        }
    }

    /// Run exactly one frame while paused
    pub fn step_once(&self) {
        self.push(Command::StepOnce);
    }

    /// Stop the simulation; the thread exits after the current frame
    pub fn stop(&self) {
        let mut state = lock(&self.shared);
        if matches!(
            state.state,
            RunnerState::Created | RunnerState::Running | RunnerState::Paused
        ) {
            state.state = RunnerState::Finished;
        }
    }

    /// Replace the pointer interaction state
    pub fn set_interaction(&self, interaction: Interaction) {
        self.push(Command::SetInteraction(interaction));
    }

    /// Replace the solver configuration; invalid configs are logged and dropped
    pub fn set_config(&self, config: SolverConfig) {
        self.push(Command::SetConfig(Box::new(config)));
    }

    /// Grow or shrink the particle set
    pub fn set_particle_count(&self, count: usize) {
        self.push(Command::SetParticleCount(count));
    }

    /// Re-seed all particles with `layout`
    pub fn reset(&self, layout: Layout) {
        self.push(Command::Reset(layout));
    }

    fn push(&self, command: Command) {
        lock(&self.shared).commands.push(command);
    }

    /// Wait for the simulation thread to complete
    pub fn join(mut self) -> Result<(), String> {
        if let Some(handle) = self.thread_handle.take() {
            handle.join().map_err(|_| "Thread panicked".to_string())?;
        }
        match self.error_message() {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }
}

impl Drop for SimulationRunner {
    fn drop(&mut self) {
        // Set state to Finished to signal thread to exit
        let mut state = lock(&self.shared);
        if matches!(
            state.state,
            RunnerState::Created | RunnerState::Running | RunnerState::Paused
        ) {
            state.state = RunnerState::Finished;
        }
    }
}

/// Rotate the XY part of `gravity` by `degrees`.
pub fn rotate_gravity(gravity: [f32; 3], degrees: f32) -> [f32; 3] {
    let (sin, cos) = degrees.to_radians().sin_cos();
    [
        gravity[0] * cos - gravity[1] * sin,
        gravity[0] * sin + gravity[1] * cos,
        gravity[2],
    ]
}

/// Apply queued inputs in the order they were made.
///
/// Returns whether any input other than a step request was applied.
fn apply_commands(kernel: &mut (dyn SimulationKernel + Send), commands: Vec<Command>) -> bool {
    let changed = commands
        .iter()
        .any(|command| !matches!(command, Command::StepOnce));
    for command in commands {
        match command {
            Command::SetInteraction(interaction) => {
                if let Err(e) = kernel.set_interaction(interaction) {
                    tracing::warn!("Rejected interaction: {}", e);
                }
            }
            Command::SetConfig(config) => {
                if let Err(e) = kernel.set_config(*config) {
                    tracing::warn!("Rejected solver config: {}", e);
                }
            }
            Command::SetParticleCount(count) => {
                if let Err(e) = kernel.set_particle_count(count) {
                    tracing::warn!("Rejected particle count {}: {}", count, e);
                }
            }
            Command::Reset(layout) => {
                if let Err(e) = kernel.reset(layout) {
                    tracing::warn!("Rejected reset: {}", e);
                }
            }
            Command::StepOnce => kernel.request_step(),
        }
    }
    changed
}

/// Publish the current particles without advancing time.
fn publish_idle(kernel: &(dyn SimulationKernel + Send), shared: &Mutex<SharedState>) {
    let snapshot = Arc::new(kernel.snapshot());
    let metrics = FrameMetrics {
        particle_count: kernel.particle_count(),
        ..kernel.metrics()
    };
    let mut guard = lock(shared);
    guard.snapshot = snapshot;
    guard.metrics = metrics;
}

fn fail(shared: &Mutex<SharedState>, message: String) {
    tracing::error!("{}", message);
    let mut guard = lock(shared);
    guard.state = RunnerState::Error;
    guard.error_message = Some(message);
}

/// Main simulation loop executed in background thread
fn run_simulation_loop(
    kernel: &mut (dyn SimulationKernel + Send),
    shared: Arc<Mutex<SharedState>>,
    settings: RunnerSettings,
) {
    // Wait for start signal
    loop {
        let state = lock(&shared).state.clone();

        match state {
            RunnerState::Created => {
                // Wait a bit and check again
                thread::sleep(Duration::from_millis(10));
            }
            RunnerState::Running | RunnerState::Paused => break,
            _ => return, // Exit if finished or error
        }
    }

    let pool = match settings.worker_threads {
        Some(threads) => {
            let built = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("sph-worker-{}", i))
                .build();
            match built {
                Ok(pool) => Some(pool),
                Err(e) => {
                    fail(&shared, format!("Failed to build worker pool: {}", e));
                    return;
                }
            }
        }
        None => None,
    };
    let frame_interval = settings
        .target_fps
        .map(|fps| Duration::from_secs_f64(1.0 / fps as f64));

    tracing::info!(
        "Runner started: {} particles, {:?}, {} worker threads",
        kernel.particle_count(),
        kernel.dimension(),
        pool.as_ref()
            .map_or_else(rayon::current_num_threads, |p| p.current_num_threads()),
    );

    let start_wall_time = Instant::now();
    let mut sim_time = 0.0_f64;
    let mut frame_count = 0_u64;
    let mut over_budget = 0_u64;

    loop {
        let frame_start = Instant::now();

        // Check state and take pending inputs
        let (current_state, commands) = {
            let mut guard = lock(&shared);
            (guard.state.clone(), std::mem::take(&mut guard.commands))
        };

        match current_state {
            RunnerState::Running | RunnerState::Paused => {
                let changed = apply_commands(kernel, commands);
                kernel.pause(current_state == RunnerState::Paused);

                let ran = match &pool {
                    Some(pool) => pool.install(|| kernel.update()),
                    None => kernel.update(),
                };

                if !ran {
                    if changed {
                        publish_idle(kernel, &shared);
                    }
                    // Wait while paused
                    thread::sleep(Duration::from_millis(5));
                    continue;
                }

                let metrics = kernel.metrics();
                sim_time += kernel.config().effective_delta_time() as f64;
                frame_count += 1;

                if metrics.step_time > FRAME_BUDGET {
                    over_budget += 1;
                    tracing::warn!(
                        "Frame {} physics took {:.2} ms (budget {} ms)",
                        frame_count,
                        metrics.step_time.as_secs_f64() * 1000.0,
                        FRAME_BUDGET.as_millis()
                    );
                }

                if settings.gravity_rotation_step_deg != 0.0 {
                    let mut config = kernel.config().clone();
                    config.gravity = rotate_gravity(config.gravity, settings.gravity_rotation_step_deg);
                    if let Err(e) = kernel.set_config(config) {
                        tracing::warn!("Gravity rotation rejected: {}", e);
                    }
                }

                // Publish outputs
                let snapshot = Arc::new(kernel.snapshot());
                {
                    let mut guard = lock(&shared);
                    guard.sim_time = sim_time;
                    guard.frame_count = frame_count;
                    guard.snapshot = snapshot;
                    guard.metrics = metrics;
                }

                if !metrics.max_speed.is_finite() {
                    fail(
                        &shared,
                        format!("Simulation diverged at frame {}: non-finite velocity", frame_count),
                    );
                    break;
                }

                // Check stopping conditions
                if let Some(max_frames) = settings.max_frames {
                    if frame_count >= max_frames {
                        tracing::info!("Simulation finished: reached max_frames = {}", max_frames);
                        let mut guard = lock(&shared);
                        if guard.state != RunnerState::Error {
                            guard.state = RunnerState::Finished;
                        }
                        break;
                    }
                }

                // Log progress periodically
                if frame_count % 100 == 0 {
                    let wall_time = start_wall_time.elapsed().as_secs_f64();
                    tracing::debug!(
                        "Frame {}: sim_time={:.3}s, wall_time={:.2}s, mean_density={:.4}, max_speed={:.2}",
                        frame_count,
                        sim_time,
                        wall_time,
                        metrics.mean_density,
                        metrics.max_speed,
                    );
                }

                if let Some(interval) = frame_interval {
                    let elapsed = frame_start.elapsed();
                    if elapsed < interval {
                        thread::sleep(interval - elapsed);
                    }
                }
            }
            RunnerState::Finished | RunnerState::Error => {
                // Exit loop
                break;
            }
            RunnerState::Created => {
                // Shouldn't happen, but treat as finished
                break;
            }
        }
    }

    tracing::info!(
        "Simulation thread exiting: {} frames, {:.3}s simulated, {} over budget",
        frame_count,
        sim_time,
        over_budget
    );
}
