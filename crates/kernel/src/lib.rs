//! Real-time SPH fluid kernel
//!
//! This crate provides the particle solver for an interactive Smoothed
//! Particle Hydrodynamics fluid in two or three dimensions. It is
//! compute-only: rendering and input handling sit outside and talk to it
//! through [`SimulationKernel`].
//!
//! # Modules
//! - [`vector`] -- `SimVector` trait over `glam::Vec2` / `glam::Vec3`.
//! - [`smoothing`] -- poly6 and spiky kernels with radius-dependent constants.
//! - [`neighbor`] -- sorted spatial hash grid for neighbor queries.
//! - [`particle`] -- struct-of-arrays particle storage.
//! - [`params`] -- solver configuration, pointer interaction, config errors.
//! - [`sph`] -- the per-phase SPH operators.
//! - [`boundary`] -- box and circle/sphere collision.
//! - [`layout`] -- initial and reset particle arrangements.

#![warn(missing_docs)]

pub mod boundary;
pub mod layout;
pub mod neighbor;
pub mod params;
pub mod particle;
pub mod smoothing;
pub mod sph;
pub mod vector;

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub use boundary::Domain;
pub use layout::Layout;
pub use neighbor::SpatialHashGrid;
pub use params::{
    BoundaryMode, ConfigError, Interaction, NearPressureMode, PointerButton, SolverConfig,
    MAX_PARTICLES,
};
pub use particle::ParticleArrays;
pub use smoothing::SmoothingKernels;
pub use sph::StepParams;
pub use vector::{Dimension, SimVector};

// ---------------------------------------------------------------------------
// SimulationKernel trait
// ---------------------------------------------------------------------------

/// Aggregate statistics for the most recent step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameMetrics {
    /// Particles simulated.
    pub particle_count: usize,
    /// Mean density.
    pub mean_density: f32,
    /// Largest density.
    pub max_density: f32,
    /// Largest speed.
    pub max_speed: f32,
    /// Neighbor pairs whose predicted positions coincided.
    pub coincident_pairs: usize,
    /// Wall time spent in the step.
    pub step_time: Duration,
}

/// Read-only per-particle output for renderers and exporters.
///
/// Vectors are widened to three components; `z` is zero in 2D.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleSnapshot {
    /// Dimension of the simulation the snapshot came from.
    pub dimension: Dimension,
    /// Positions.
    pub positions: Vec<[f32; 3]>,
    /// Velocities.
    pub velocities: Vec<[f32; 3]>,
    /// Densities.
    pub densities: Vec<f32>,
}

impl ParticleSnapshot {
    /// Number of particles in the snapshot.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// `true` when the snapshot holds no particles.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Phases of one solver step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// Gravity and pointer forces.
    ExternalForces,
    /// Velocity lookahead.
    PredictPositions,
    /// Spatial hash rebuild from current positions.
    RebuildGrid,
    /// Neighbor gathering and density summation.
    DensityPass,
    /// Pressure and viscosity velocity update.
    ForceIntegrationPass,
    /// Position integration and collision.
    BoundaryPass,
    /// All phases finished.
    Done,
}

/// Object-safe interface the outer application drives a solver through.
///
/// Hides the vector type so 2D and 3D solvers can sit behind the same
/// `Box<dyn SimulationKernel>`.
pub trait SimulationKernel {
    /// Run one step unless paused; a pending single-step request runs even
    /// while paused. Returns whether physics ran.
    fn update(&mut self) -> bool;

    /// Run one step unconditionally.
    fn step(&mut self);

    /// Current configuration.
    fn config(&self) -> &SolverConfig;

    /// Replace the configuration; takes effect from the next step.
    fn set_config(&mut self, config: SolverConfig) -> Result<(), ConfigError>;

    /// Replace the pointer interaction state; an invalid one is rejected and
    /// the previous state kept.
    fn set_interaction(&mut self, interaction: Interaction) -> Result<(), ConfigError>;

    /// Grow or shrink the particle set.
    fn set_particle_count(&mut self, count: usize) -> Result<(), ConfigError>;

    /// Re-seed every particle with `layout`.
    fn reset(&mut self, layout: Layout) -> Result<(), ConfigError>;

    /// Pause or unpause [`update`](Self::update).
    fn pause(&mut self, paused: bool);

    /// Whether [`update`](Self::update) is currently skipping steps.
    fn is_paused(&self) -> bool;

    /// Let the next [`update`](Self::update) run once while paused.
    fn request_step(&mut self);

    /// Number of particles.
    fn particle_count(&self) -> usize;

    /// Dimension of the simulation.
    fn dimension(&self) -> Dimension;

    /// Copy out positions, velocities and densities.
    fn snapshot(&self) -> ParticleSnapshot;

    /// Statistics for the last step.
    fn metrics(&self) -> FrameMetrics;
}

// ---------------------------------------------------------------------------
// FluidSolver -- CPU implementation of SimulationKernel
// ---------------------------------------------------------------------------

/// Dimension-generic SPH solver.
///
/// Each step runs the phases of [`StepPhase`] in order, each as one rayon
/// fan-out over the particles:
///
/// 1. External forces (gravity, pointer)
/// 2. Position prediction
/// 3. Grid rebuild
/// 4. Density and near-density
/// 5. Pressure and viscosity
/// 6. Integration and collision
pub struct FluidSolver<V: SimVector> {
    /// Physics parameters, copied at the start of every step.
    config: SolverConfig,
    /// Pointer state, copied at the start of every step.
    interaction: Interaction,
    /// Particle data.
    particles: ParticleArrays<V>,
    /// Neighbor grid, rebuilt every step.
    grid: SpatialHashGrid<V>,
    /// Kernel constants for `config.smoothing_radius`.
    kernels: SmoothingKernels,
    /// Per-particle velocity change scratch for the force pass.
    velocity_changes: Vec<V>,
    paused: bool,
    step_requested: bool,
    phase: StepPhase,
    metrics: FrameMetrics,
    steps: u64,
}

impl<V: SimVector> FluidSolver<V> {
    /// Create a solver over existing particles.
    pub fn new(config: SolverConfig, particles: ParticleArrays<V>) -> Result<Self, ConfigError> {
        config.validate(V::DIMENSION)?;
        if particles.len() > MAX_PARTICLES {
            return Err(ConfigError::TooManyParticles(particles.len()));
        }
        let kernels = SmoothingKernels::new(V::DIMENSION, config.smoothing_radius);
        let mut grid = SpatialHashGrid::new();
        grid.resize(particles.len());

        tracing::info!(
            "SPH solver initialized: {:?}, {} particles, h = {}",
            V::DIMENSION,
            particles.len(),
            config.smoothing_radius
        );

        Ok(Self {
            velocity_changes: vec![V::ZERO; particles.len()],
            config,
            interaction: Interaction::default(),
            particles,
            grid,
            kernels,
            paused: false,
            step_requested: false,
            phase: StepPhase::Done,
            metrics: FrameMetrics::default(),
            steps: 0,
        })
    }

    /// Create a solver with `count` particles arranged by `layout` inside
    /// the configured bounds.
    pub fn with_layout(config: SolverConfig, count: usize, layout: Layout) -> Result<Self, ConfigError> {
        layout.validate()?;
        if count > MAX_PARTICLES {
            return Err(ConfigError::TooManyParticles(count));
        }
        let mut particles = ParticleArrays::with_capacity(count);
        for _ in 0..count {
            particles.push_particle(V::ZERO, V::ZERO);
        }
        let (min, max) = bounds::<V>(&config);
        layout.apply(&mut particles, min, max, &mut rand::thread_rng());
        Self::new(config, particles)
    }

    /// Particle data.
    pub fn particles(&self) -> &ParticleArrays<V> {
        &self.particles
    }

    /// Mutable particle data, for seeding custom scenes.
    ///
    /// Adding or removing particles here is not allowed; use
    /// [`set_particle_count`](SimulationKernel::set_particle_count).
    pub fn particles_mut(&mut self) -> &mut ParticleArrays<V> {
        &mut self.particles
    }

    /// Neighbor grid as of the last step.
    pub fn grid(&self) -> &SpatialHashGrid<V> {
        &self.grid
    }

    /// Kernel constants in use.
    pub fn kernels(&self) -> &SmoothingKernels {
        &self.kernels
    }

    /// Pointer interaction state.
    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// Last phase the solver entered.
    ///
    /// Steps run synchronously, so after a normal return this is always
    /// [`StepPhase::Done`]. After a panic unwinds out of a step it names the
    /// phase that was running.
    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    /// Steps run since construction.
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    fn run_step(&mut self) {
        let start = Instant::now();
        let params = StepParams::<V>::snapshot(&self.config, &self.interaction);
        let radius = self.kernels.radius();

        // --- 1. External forces ---
        self.enter(StepPhase::ExternalForces);
        sph::apply_external_forces(&mut self.particles, &params);

        // --- 2. Prediction ---
        self.enter(StepPhase::PredictPositions);
        sph::predict_positions(&mut self.particles, params.prediction_factor);

        // --- 3. Grid from current positions ---
        self.enter(StepPhase::RebuildGrid);
        self.grid.rebuild(&self.particles.position, radius);

        // --- 4. Density ---
        self.enter(StepPhase::DensityPass);
        sph::compute_densities(&mut self.particles, &self.grid, &self.kernels);

        // --- 5. Pressure + viscosity ---
        self.enter(StepPhase::ForceIntegrationPass);
        let coincident = sph::compute_velocity_changes(
            &self.particles,
            &self.kernels,
            &params,
            &mut self.velocity_changes,
        );
        sph::apply_velocity_changes(&mut self.particles.velocity, &self.velocity_changes);

        // --- 6. Integrate + collide ---
        self.enter(StepPhase::BoundaryPass);
        sph::integrate_positions(&mut self.particles, &params);

        self.phase = StepPhase::Done;
        self.steps += 1;
        self.metrics = self.measure(coincident, start.elapsed());

        if coincident > 0 {
            tracing::trace!("step {}: {} coincident pairs", self.steps, coincident);
        }
    }

    fn enter(&mut self, phase: StepPhase) {
        tracing::trace!("step {}: {:?}", self.steps + 1, phase);
        self.phase = phase;
    }

    fn measure(&self, coincident_pairs: usize, step_time: Duration) -> FrameMetrics {
        let n = self.particles.len();
        if n == 0 {
            return FrameMetrics {
                step_time,
                ..FrameMetrics::default()
            };
        }
        let (sum, max_density) = self
            .particles
            .density
            .par_iter()
            .map(|&d| (d as f64, d))
            .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1.max(b.1)));
        let max_speed_sq = self
            .particles
            .velocity
            .par_iter()
            .map(|v| v.length_squared())
            .reduce(|| 0.0, f32::max);
        FrameMetrics {
            particle_count: n,
            mean_density: (sum / n as f64) as f32,
            max_density,
            max_speed: max_speed_sq.sqrt(),
            coincident_pairs,
            step_time,
        }
    }
}

fn bounds<V: SimVector>(config: &SolverConfig) -> (V, V) {
    (
        V::from_array3(config.bounds_min),
        V::from_array3(config.bounds_max),
    )
}

impl<V: SimVector> SimulationKernel for FluidSolver<V> {
    fn update(&mut self) -> bool {
        if self.paused && !self.step_requested {
            return false;
        }
        self.step_requested = false;
        self.run_step();
        true
    }

    fn step(&mut self) {
        self.run_step();
    }

    fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn set_config(&mut self, config: SolverConfig) -> Result<(), ConfigError> {
        config.validate(V::DIMENSION)?;
        if config.smoothing_radius != self.kernels.radius() {
            tracing::debug!(
                "Smoothing radius {} -> {}, recomputing kernel constants",
                self.kernels.radius(),
                config.smoothing_radius
            );
            self.kernels.recompute(V::DIMENSION, config.smoothing_radius);
        }
        self.config = config;
        Ok(())
    }

    fn set_interaction(&mut self, interaction: Interaction) -> Result<(), ConfigError> {
        interaction.validate()?;
        self.interaction = interaction;
        Ok(())
    }

    fn set_particle_count(&mut self, count: usize) -> Result<(), ConfigError> {
        if count > MAX_PARTICLES {
            return Err(ConfigError::TooManyParticles(count));
        }
        let current = self.particles.len();
        if count > current {
            let (min, max) = bounds::<V>(&self.config);
            let mut rng = rand::thread_rng();
            for _ in current..count {
                self.particles
                    .push_particle(V::random_in_box(&mut rng, min, max), V::ZERO);
            }
        } else {
            self.particles.truncate(count);
        }
        self.grid.resize(count);
        self.velocity_changes.resize(count, V::ZERO);
        if count != current {
            tracing::info!("Particle count {} -> {}", current, count);
        }
        Ok(())
    }

    fn reset(&mut self, layout: Layout) -> Result<(), ConfigError> {
        layout.validate()?;
        let (min, max) = bounds::<V>(&self.config);
        layout.apply(&mut self.particles, min, max, &mut rand::thread_rng());
        tracing::info!("Reset {} particles with {:?}", self.particles.len(), layout);
        Ok(())
    }

    fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn is_paused(&self) -> bool {
        self.paused
    }

    fn request_step(&mut self) {
        self.step_requested = true;
    }

    fn particle_count(&self) -> usize {
        self.particles.len()
    }

    fn dimension(&self) -> Dimension {
        V::DIMENSION
    }

    fn snapshot(&self) -> ParticleSnapshot {
        ParticleSnapshot {
            dimension: V::DIMENSION,
            positions: self.particles.position.par_iter().map(|p| p.to_array3()).collect(),
            velocities: self.particles.velocity.par_iter().map(|v| v.to_array3()).collect(),
            densities: self.particles.density.clone(),
        }
    }

    fn metrics(&self) -> FrameMetrics {
        self.metrics
    }
}
