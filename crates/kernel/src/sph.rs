//! Core SPH operators, one function per solver phase.
//!
//! Every operator is a single rayon fan-out over the particle range in which
//! particle `i` writes only its own slot. Anything a phase needs from other
//! particles was written by an earlier phase, so the phase boundaries are
//! the only synchronization.
//!
//! Pair math (density, pressure, viscosity) uses predicted positions;
//! neighbor lookup and integration use current positions.

use rayon::prelude::*;

use crate::boundary::Domain;
use crate::neighbor::SpatialHashGrid;
use crate::params::{Interaction, NearPressureMode, PointerButton, SolverConfig};
use crate::particle::ParticleArrays;
use crate::smoothing::SmoothingKernels;
use crate::vector::SimVector;

/// Per-step copy of everything the phases read from the outside.
///
/// Taken once at the start of a step so edits made between phases are not
/// observed by only some of them.
#[derive(Debug, Clone, Copy)]
pub struct StepParams<V: SimVector> {
    /// Time advanced by this step.
    pub dt: f32,
    /// Velocity lookahead for predicted positions.
    pub prediction_factor: f32,
    /// Rest density.
    pub target_density: f32,
    /// Pressure stiffness.
    pub pressure_multiplier: f32,
    /// Near-pressure stiffness.
    pub near_pressure_multiplier: f32,
    /// Viscosity strength.
    pub viscosity_strength: f32,
    /// Gravity already scaled by its multiplier.
    pub gravity: V,
    /// Wall damping.
    pub collision_damping: f32,
    /// Pairwise near-pressure rule.
    pub near_pressure_mode: NearPressureMode,
    /// Walls.
    pub domain: Domain<V>,
    /// Pointer force, present only while a button is held.
    pub pointer: Option<PointerForce<V>>,
}

impl<V: SimVector> StepParams<V> {
    /// Snapshot `config` and `interaction`.
    pub fn snapshot(config: &SolverConfig, interaction: &Interaction) -> Self {
        let pointer = interaction.active.then(|| PointerForce {
            point: V::from_array3(interaction.point),
            radius: interaction.radius,
            strength: interaction.strength,
            button: interaction.button,
        });
        Self {
            dt: config.effective_delta_time(),
            prediction_factor: config.prediction_factor,
            target_density: config.target_density,
            pressure_multiplier: config.pressure_multiplier,
            near_pressure_multiplier: config.near_pressure_multiplier,
            viscosity_strength: config.viscosity_strength,
            gravity: V::from_array3(config.gravity) * config.gravity_multiplier,
            collision_damping: config.collision_damping,
            near_pressure_mode: config.near_pressure_mode,
            domain: Domain::from_config(config),
            pointer,
        }
    }

    /// Pressure for a density: `(density - target) * k`.
    #[inline]
    pub fn pressure(&self, density: f32) -> f32 {
        (density - self.target_density) * self.pressure_multiplier
    }

    /// Near-pressure for a near-density: `near_density * k_near`.
    #[inline]
    pub fn near_pressure(&self, near_density: f32) -> f32 {
        near_density * self.near_pressure_multiplier
    }
}

/// Active pointer in the simulation's vector type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerForce<V: SimVector> {
    /// Pointer position.
    pub point: V,
    /// Radius of influence.
    pub radius: f32,
    /// Force at the pointer.
    pub strength: f32,
    /// Push or pull.
    pub button: PointerButton,
}

/// Pointer force on a particle at `position`.
///
/// ```text
/// push: away from the pointer, strength * (1 - d/r)^2
/// pull: towards the pointer,  strength * (1 - d/r)
/// ```
///
/// Zero at or beyond the radius. A push from exactly the pointer position
/// goes in a random direction; a pull there is zero.
pub fn interaction_force<V: SimVector>(pointer: &PointerForce<V>, position: V) -> V {
    let offset = position - pointer.point;
    let distance_sq = offset.length_squared();
    if distance_sq >= pointer.radius * pointer.radius {
        return V::ZERO;
    }
    let distance = distance_sq.sqrt();
    let proximity = 1.0 - distance / pointer.radius;
    match pointer.button {
        PointerButton::Push => {
            let away = if distance > 0.0 {
                offset / distance
            } else {
                V::random_unit(&mut rand::thread_rng())
            };
            away * (pointer.strength * proximity * proximity)
        }
        PointerButton::Pull => {
            if distance > 0.0 {
                -offset / distance * (pointer.strength * proximity)
            } else {
                V::ZERO
            }
        }
    }
}

// ---------------------------------------------------------------------------
// External forces and prediction
// ---------------------------------------------------------------------------

/// Add gravity (scaled by `dt`) and the pointer force to every velocity.
pub fn apply_external_forces<V: SimVector>(particles: &mut ParticleArrays<V>, params: &StepParams<V>) {
    let gravity_kick = params.gravity * params.dt;
    let pointer = params.pointer;
    particles
        .velocity
        .par_iter_mut()
        .zip(particles.position.par_iter())
        .for_each(|(velocity, &position)| {
            let mut force = gravity_kick;
            if let Some(pointer) = &pointer {
                force += interaction_force(pointer, position);
            }
            *velocity += force;
        });
}

/// `predicted = position + velocity * prediction_factor`.
pub fn predict_positions<V: SimVector>(particles: &mut ParticleArrays<V>, prediction_factor: f32) {
    let ParticleArrays {
        position,
        velocity,
        predicted_position,
        ..
    } = particles;
    predicted_position
        .par_iter_mut()
        .zip(position.par_iter().zip(velocity.par_iter()))
        .for_each(|(predicted, (&p, &v))| {
            *predicted = p + v * prediction_factor;
        });
}

// ---------------------------------------------------------------------------
// Density summation
// ---------------------------------------------------------------------------

/// Gather neighbors and sum density and near-density for every particle.
///
/// ```text
/// rho_i      = sum_j spiky_pow2(|x*_i - x*_j|)
/// rho_near_i = sum_j spiky_pow3(|x*_i - x*_j|)
/// ```
///
/// where `x*` is the predicted position. The sum includes `j = i`, so every
/// particle gets at least the kernel peak. `grid` must have been rebuilt from
/// the current positions.
pub fn compute_densities<V: SimVector>(
    particles: &mut ParticleArrays<V>,
    grid: &SpatialHashGrid<V>,
    kernels: &SmoothingKernels,
) {
    let ParticleArrays {
        position,
        predicted_position,
        density,
        near_density,
        neighbors,
        ..
    } = particles;
    let position: &[V] = position;
    let predicted: &[V] = predicted_position;

    neighbors
        .par_iter_mut()
        .zip(density.par_iter_mut().zip(near_density.par_iter_mut()))
        .enumerate()
        .for_each(|(i, (list, (rho, rho_near)))| {
            grid.query_into(i, position, list);
            let origin = predicted[i];
            let mut sum = 0.0;
            let mut near_sum = 0.0;
            for &j in list.iter() {
                let distance = origin.distance(predicted[j as usize]);
                sum += kernels.spiky_pow2(distance);
                near_sum += kernels.spiky_pow3(distance);
            }
            *rho = sum;
            *rho_near = near_sum;
        });
}

// ---------------------------------------------------------------------------
// Pressure and viscosity
// ---------------------------------------------------------------------------

/// Pressure force on particle `i` and the number of coincident neighbors.
///
/// ```text
/// F_i = sum_{j != i} P_ij * dir_ij * dW2(d_ij) / rho_i
///                  + Pn_ij * dir_ij * dW3(d_ij) / rho_near_i
/// ```
///
/// `dir_ij` points from `i` to `j`; a random unit vector is used when the
/// predicted positions coincide. Returns zero for a particle with zero
/// density.
pub fn pressure_force<V: SimVector>(
    i: usize,
    particles: &ParticleArrays<V>,
    kernels: &SmoothingKernels,
    params: &StepParams<V>,
) -> (V, usize) {
    let density = particles.density[i];
    if density <= 0.0 {
        return (V::ZERO, 0);
    }
    let near_density = particles.near_density[i];
    let origin = particles.predicted_position[i];
    let pressure = params.pressure(density);
    let near_pressure = params.near_pressure(near_density);

    let mut force = V::ZERO;
    let mut coincident = 0;
    for &j in &particles.neighbors[i] {
        let j = j as usize;
        if j == i {
            continue;
        }
        let offset = particles.predicted_position[j] - origin;
        let distance = offset.length();
        let direction = if distance > 0.0 {
            offset / distance
        } else {
            coincident += 1;
            V::random_unit(&mut rand::thread_rng())
        };

        let neighbor_pressure = params.pressure(particles.density[j]);
        let neighbor_near_pressure = params.near_pressure(particles.near_density[j]);
        let shared_pressure = (pressure + neighbor_pressure) * 0.5;
        let shared_near_pressure = match params.near_pressure_mode {
            NearPressureMode::Averaged => (near_pressure + neighbor_near_pressure) * 0.5,
            NearPressureMode::NeighborOnly => neighbor_near_pressure * 0.5,
        };

        force += direction * (shared_pressure * kernels.derivative_spiky_pow2(distance) / density);
        if near_density > 0.0 {
            force += direction
                * (shared_near_pressure * kernels.derivative_spiky_pow3(distance) / near_density);
        }
    }
    (force, coincident)
}

/// Unscaled viscosity force on particle `i`: `sum_{j != i} (v_j - v_i) * poly6(d_ij)`.
pub fn viscosity_force<V: SimVector>(
    i: usize,
    particles: &ParticleArrays<V>,
    kernels: &SmoothingKernels,
) -> V {
    let origin = particles.predicted_position[i];
    let velocity = particles.velocity[i];
    particles.neighbors[i]
        .iter()
        .map(|&j| j as usize)
        .filter(|&j| j != i)
        .fold(V::ZERO, |acc, j| {
            let distance = origin.distance(particles.predicted_position[j]);
            acc + (particles.velocity[j] - velocity) * kernels.poly6(distance)
        })
}

/// Compute every particle's velocity change for this step into `changes`.
///
/// ```text
/// dv_i = (F_pressure_i / rho_i) * dt + viscosity * F_visc_i * dt
/// ```
///
/// Reads velocities but does not write them, so all particles see the same
/// neighbor velocities. Returns the total number of coincident pairs.
pub fn compute_velocity_changes<V: SimVector>(
    particles: &ParticleArrays<V>,
    kernels: &SmoothingKernels,
    params: &StepParams<V>,
    changes: &mut Vec<V>,
) -> usize {
    changes.resize(particles.len(), V::ZERO);
    changes
        .par_iter_mut()
        .enumerate()
        .map(|(i, change)| {
            let density = particles.density[i];
            let (pressure, coincident) = pressure_force(i, particles, kernels, params);
            let pressure_acceleration = if density > 0.0 {
                pressure / density
            } else {
                V::ZERO
            };
            let viscosity = viscosity_force(i, particles, kernels) * params.viscosity_strength;
            *change = (pressure_acceleration + viscosity) * params.dt;
            coincident
        })
        .sum()
}

/// `velocity[i] += changes[i]`.
pub fn apply_velocity_changes<V: SimVector>(velocities: &mut [V], changes: &[V]) {
    velocities
        .par_iter_mut()
        .zip(changes.par_iter())
        .for_each(|(velocity, &change)| *velocity += change);
}

// ---------------------------------------------------------------------------
// Integration and collision
// ---------------------------------------------------------------------------

/// Euler step `position += velocity * dt`, then resolve wall collisions.
pub fn integrate_positions<V: SimVector>(particles: &mut ParticleArrays<V>, params: &StepParams<V>) {
    let dt = params.dt;
    let damping = params.collision_damping;
    let domain = params.domain;
    particles
        .position
        .par_iter_mut()
        .zip(particles.velocity.par_iter_mut())
        .for_each(|(position, velocity)| {
            *position += *velocity * dt;
            domain.resolve(position, velocity, damping);
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Dimension;
    use glam::Vec2;

    fn params() -> StepParams<Vec2> {
        let config = SolverConfig {
            gravity: [0.0, 0.0, 0.0],
            ..SolverConfig::default()
        };
        StepParams::snapshot(&config, &Interaction::default())
    }

    fn pair(distance: f32) -> ParticleArrays<Vec2> {
        let mut p = ParticleArrays::new();
        p.push_particle(Vec2::ZERO, Vec2::ZERO);
        p.push_particle(Vec2::new(distance, 0.0), Vec2::ZERO);
        p.neighbors = vec![vec![0, 1], vec![0, 1]];
        p
    }

    #[test]
    fn zero_density_skips_pressure() {
        let kernels = SmoothingKernels::new(Dimension::Two, 10.0);
        let mut p = pair(3.0);
        p.density = vec![0.0, 1.0];
        p.near_density = vec![0.0, 1.0];
        let (force, _) = pressure_force(0, &p, &kernels, &params());
        assert_eq!(force, Vec2::ZERO);

        let mut changes = Vec::new();
        compute_velocity_changes(&p, &kernels, &params(), &mut changes);
        assert!(changes[0].is_finite());
    }

    #[test]
    fn compressed_pair_repels() {
        let kernels = SmoothingKernels::new(Dimension::Two, 10.0);
        let mut p = pair(3.0);
        // Well above the target density of 2.
        p.density = vec![5.0, 5.0];
        p.near_density = vec![1.0, 1.0];
        let (f0, _) = pressure_force(0, &p, &kernels, &params());
        let (f1, _) = pressure_force(1, &p, &kernels, &params());
        assert!(f0.x < 0.0, "f0={f0}");
        assert!(f1.x > 0.0, "f1={f1}");
        assert!((f0 + f1).length() < 1.0e-4, "f0={f0}, f1={f1}");
    }

    #[test]
    fn neighbor_only_near_pressure_ignores_own_value() {
        let kernels = SmoothingKernels::new(Dimension::Two, 10.0);
        let mut p = pair(3.0);
        p.density = vec![2.0, 2.0]; // zero regular pressure
        p.near_density = vec![4.0, 1.0];

        let mut legacy = params();
        legacy.near_pressure_mode = NearPressureMode::NeighborOnly;
        let (averaged, _) = pressure_force(0, &p, &kernels, &params());
        let (neighbor_only, _) = pressure_force(0, &p, &kernels, &legacy);
        // (4k + 1k)/2 against 1k/2.
        assert!((averaged.x / neighbor_only.x - 5.0).abs() < 1.0e-4);
    }

    #[test]
    fn coincident_pair_gets_finite_direction() {
        let kernels = SmoothingKernels::new(Dimension::Two, 10.0);
        let mut p = pair(0.0);
        p.density = vec![5.0, 5.0];
        p.near_density = vec![3.0, 3.0];
        let (force, coincident) = pressure_force(0, &p, &kernels, &params());
        assert_eq!(coincident, 1);
        assert!(force.is_finite());
        assert!(force.length() > 0.0);
    }

    #[test]
    fn viscosity_pulls_towards_neighbor_velocity() {
        let kernels = SmoothingKernels::new(Dimension::Two, 10.0);
        let mut p = pair(2.0);
        p.velocity[1] = Vec2::new(0.0, 4.0);
        let f = viscosity_force(0, &p, &kernels);
        assert!(f.y > 0.0);
        assert_eq!(f.x, 0.0);
    }

    #[test]
    fn push_and_pull_interaction() {
        let push = PointerForce {
            point: Vec2::ZERO,
            radius: 10.0,
            strength: 50.0,
            button: PointerButton::Push,
        };
        let f = interaction_force(&push, Vec2::new(5.0, 0.0));
        assert!((f - Vec2::new(12.5, 0.0)).length() < 1.0e-4, "f={f}");
        assert_eq!(interaction_force(&push, Vec2::new(10.0, 0.0)), Vec2::ZERO);

        let pull = PointerForce { button: PointerButton::Pull, ..push };
        let f = interaction_force(&pull, Vec2::new(0.0, 5.0));
        assert!((f - Vec2::new(0.0, -25.0)).length() < 1.0e-4, "f={f}");
        assert_eq!(interaction_force(&pull, Vec2::ZERO), Vec2::ZERO);
    }
}
