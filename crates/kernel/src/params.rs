//! Solver configuration and pointer interaction state.
//!
//! Both types are plain data, dimension-agnostic (`[f32; 3]`, z ignored in
//! 2D), and may be edited freely between steps. The solver copies them at
//! the start of every step.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::vector::Dimension;

/// Largest particle count the `u32` grid indices can address.
pub const MAX_PARTICLES: usize = u32::MAX as usize - 1;

/// Error raised when a configuration value cannot be simulated.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Smoothing radius is zero, negative or not finite.
    InvalidRadius(f32),
    /// Delta time or time scalar is zero, negative or not finite.
    InvalidTimeStep(f32),
    /// A named coefficient is out of its allowed range.
    InvalidParameter {
        /// Field name.
        name: &'static str,
        /// Rejected value.
        value: f32,
    },
    /// Lower bound is not below the upper bound on the given axis.
    InvertedBounds {
        /// Axis index (0 = x).
        axis: usize,
    },
    /// Requested particle count exceeds [`MAX_PARTICLES`].
    TooManyParticles(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidRadius(r) => {
                write!(f, "smoothing radius must be positive and finite, got {r}")
            }
            ConfigError::InvalidTimeStep(dt) => {
                write!(f, "time step must be positive and finite, got {dt}")
            }
            ConfigError::InvalidParameter { name, value } => {
                write!(f, "invalid value for {name}: {value}")
            }
            ConfigError::InvertedBounds { axis } => {
                write!(f, "bounds_min must be below bounds_max on axis {axis}")
            }
            ConfigError::TooManyParticles(n) => {
                write!(f, "particle count {n} exceeds the maximum of {MAX_PARTICLES}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which walls particles collide with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundaryMode {
    /// Axis-aligned box `[bounds_min, bounds_max]`.
    Box,
    /// Circle (2D) or sphere (3D).
    Circle {
        /// Centre of the circle/sphere.
        center: [f32; 3],
        /// Maximum distance from `center`.
        radius: f32,
        /// Also clamp to the box after the circle.
        #[serde(default = "default_box_fallback")]
        box_fallback: bool,
    },
}

/// How a neighbor pair shares near-pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NearPressureMode {
    /// `(near_i + near_j) / 2`, the same rule as regular pressure.
    #[default]
    Averaged,
    /// `near_j / 2`, ignoring the particle's own near-pressure. Softer
    /// short-range repulsion at the edge of dense clusters.
    NeighborOnly,
}

/// Physics parameters for the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Smoothing radius `h`; also the grid cell size.
    #[serde(default = "default_smoothing_radius")]
    pub smoothing_radius: f32,
    /// Nominal frame time (seconds).
    #[serde(default = "default_delta_time")]
    pub delta_time: f32,
    /// Slow-motion factor; the step advances `delta_time / time_scalar`.
    #[serde(default = "default_one")]
    pub time_scalar: f32,
    /// Lookahead used to compute predicted positions.
    #[serde(default = "default_prediction_factor")]
    pub prediction_factor: f32,
    /// Rest density the pressure term drives towards.
    #[serde(default = "default_target_density")]
    pub target_density: f32,
    /// Stiffness of the pressure term.
    #[serde(default = "default_pressure_multiplier")]
    pub pressure_multiplier: f32,
    /// Stiffness of the near-pressure term.
    #[serde(default = "default_near_pressure_multiplier")]
    pub near_pressure_multiplier: f32,
    /// Viscosity strength.
    #[serde(default = "default_viscosity_strength")]
    pub viscosity_strength: f32,
    /// Gravity acceleration vector.
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 3],
    /// Scale applied to `gravity`.
    #[serde(default = "default_one")]
    pub gravity_multiplier: f32,
    /// Fraction of velocity kept (and reversed) on wall contact.
    #[serde(default = "default_collision_damping")]
    pub collision_damping: f32,
    /// Lower corner of the domain box.
    #[serde(default = "default_bounds_min")]
    pub bounds_min: [f32; 3],
    /// Upper corner of the domain box.
    #[serde(default = "default_bounds_max")]
    pub bounds_max: [f32; 3],
    /// Active boundary resolver.
    #[serde(default = "default_boundary")]
    pub boundary: BoundaryMode,
    /// Pairwise near-pressure rule.
    #[serde(default)]
    pub near_pressure_mode: NearPressureMode,
}

fn default_smoothing_radius() -> f32 {
    10.0
}

fn default_delta_time() -> f32 {
    1.0 / 60.0
}

fn default_one() -> f32 {
    1.0
}

fn default_prediction_factor() -> f32 {
    1.0 / 120.0
}

fn default_target_density() -> f32 {
    2.0
}

fn default_pressure_multiplier() -> f32 {
    500.0
}

fn default_near_pressure_multiplier() -> f32 {
    100.0
}

fn default_viscosity_strength() -> f32 {
    0.25
}

// Screen space: +y points down.
fn default_gravity() -> [f32; 3] {
    [0.0, 9.8, 0.0]
}

fn default_collision_damping() -> f32 {
    0.26
}

fn default_bounds_min() -> [f32; 3] {
    [0.0, 0.0, 0.0]
}

fn default_bounds_max() -> [f32; 3] {
    [1000.0, 1000.0, 1000.0]
}

fn default_boundary() -> BoundaryMode {
    BoundaryMode::Box
}

fn default_box_fallback() -> bool {
    true
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            smoothing_radius: default_smoothing_radius(),
            delta_time: default_delta_time(),
            time_scalar: default_one(),
            prediction_factor: default_prediction_factor(),
            target_density: default_target_density(),
            pressure_multiplier: default_pressure_multiplier(),
            near_pressure_multiplier: default_near_pressure_multiplier(),
            viscosity_strength: default_viscosity_strength(),
            gravity: default_gravity(),
            gravity_multiplier: default_one(),
            collision_damping: default_collision_damping(),
            bounds_min: default_bounds_min(),
            bounds_max: default_bounds_max(),
            boundary: default_boundary(),
            near_pressure_mode: NearPressureMode::default(),
        }
    }
}

impl SolverConfig {
    /// Time advanced by one step.
    pub fn effective_delta_time(&self) -> f32 {
        self.delta_time / self.time_scalar
    }

    /// Check the configuration for a simulation in `dimension`.
    ///
    /// Only the first `dimension.axes()` components of the bounds are checked.
    pub fn validate(&self, dimension: Dimension) -> Result<(), ConfigError> {
        if !(self.smoothing_radius.is_finite() && self.smoothing_radius > 0.0) {
            return Err(ConfigError::InvalidRadius(self.smoothing_radius));
        }
        for dt in [self.delta_time, self.time_scalar] {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(ConfigError::InvalidTimeStep(dt));
            }
        }

        let non_negative = [
            ("prediction_factor", self.prediction_factor),
            ("collision_damping", self.collision_damping),
            ("viscosity_strength", self.viscosity_strength),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }
        let finite = [
            ("target_density", self.target_density),
            ("pressure_multiplier", self.pressure_multiplier),
            ("near_pressure_multiplier", self.near_pressure_multiplier),
            ("gravity_multiplier", self.gravity_multiplier),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::InvalidParameter { name, value });
            }
        }

        for axis in 0..dimension.axes() {
            if !(self.bounds_min[axis] < self.bounds_max[axis]) {
                return Err(ConfigError::InvertedBounds { axis });
            }
        }

        if let BoundaryMode::Circle { radius, .. } = self.boundary {
            if !(radius.is_finite() && radius > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "circle radius",
                    value: radius,
                });
            }
        }
        Ok(())
    }
}

/// Pointer button driving the interaction force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PointerButton {
    /// Push particles away from the pointer.
    #[default]
    Push,
    /// Pull particles towards the pointer.
    Pull,
}

/// Pointer interaction state, written by input handling, read once per step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Pointer position.
    pub point: [f32; 3],
    /// Radius of influence.
    pub radius: f32,
    /// Force at the pointer.
    pub strength: f32,
    /// Push or pull.
    pub button: PointerButton,
    /// Whether a button is held.
    pub active: bool,
}

impl Default for Interaction {
    fn default() -> Self {
        Self {
            point: [0.0; 3],
            radius: 250.0,
            strength: 50.0,
            button: PointerButton::Push,
            active: false,
        }
    }
}

impl Interaction {
    /// Reject a pointer that would produce non-finite forces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "interaction radius",
                value: self.radius,
            });
        }
        if !self.strength.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "interaction strength",
                value: self.strength,
            });
        }
        if let Some(&bad) = self.point.iter().find(|c| !c.is_finite()) {
            return Err(ConfigError::InvalidParameter {
                name: "interaction point",
                value: bad,
            });
        }
        Ok(())
    }
}
