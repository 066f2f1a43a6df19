//! Particle storage in struct-of-arrays layout.

use crate::vector::SimVector;

/// Struct-of-arrays particle storage.
///
/// All arrays are parallel: index `i` across every array refers to the same
/// particle. A particle's index is its identity; particles are only ever
/// appended at the tail or truncated from it.
#[derive(Debug, Clone)]
pub struct ParticleArrays<V: SimVector> {
    // ---- Kinematics ----
    /// Current positions.
    pub position: Vec<V>,
    /// Current velocities.
    pub velocity: Vec<V>,
    /// Positions extrapolated by the prediction lookahead; pair math only.
    pub predicted_position: Vec<V>,

    // ---- Per-step scalars ----
    /// Density from the last density pass.
    pub density: Vec<f32>,
    /// Near-density from the last density pass.
    pub near_density: Vec<f32>,

    /// Neighbor indices from the last density pass (self included).
    pub neighbors: Vec<Vec<u32>>,
}

impl<V: SimVector> ParticleArrays<V> {
    /// Create an empty particle collection.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty collection with room for `capacity` particles.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            position: Vec::with_capacity(capacity),
            velocity: Vec::with_capacity(capacity),
            predicted_position: Vec::with_capacity(capacity),
            density: Vec::with_capacity(capacity),
            near_density: Vec::with_capacity(capacity),
            neighbors: Vec::with_capacity(capacity),
        }
    }

    /// Number of particles currently stored.
    pub fn len(&self) -> usize {
        self.position.len()
    }

    /// `true` if there are no particles.
    pub fn is_empty(&self) -> bool {
        self.position.is_empty()
    }

    /// Append a particle at the tail.
    ///
    /// The predicted position starts at `position`; density fields start at
    /// zero until the next density pass.
    pub fn push_particle(&mut self, position: V, velocity: V) {
        self.position.push(position);
        self.velocity.push(velocity);
        self.predicted_position.push(position);
        self.density.push(0.0);
        self.near_density.push(0.0);
        self.neighbors.push(Vec::new());
    }

    /// Drop every particle with index `>= len`.
    pub fn truncate(&mut self, len: usize) {
        self.position.truncate(len);
        self.velocity.truncate(len);
        self.predicted_position.truncate(len);
        self.density.truncate(len);
        self.near_density.truncate(len);
        self.neighbors.truncate(len);
    }
}

impl<V: SimVector> Default for ParticleArrays<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn empty_particle_arrays() {
        let p = ParticleArrays::<Vec2>::new();
        assert_eq!(p.len(), 0);
        assert!(p.is_empty());
    }

    #[test]
    fn push_and_truncate() {
        let mut p = ParticleArrays::new();
        p.push_particle(Vec2::new(1.0, 2.0), Vec2::new(0.5, 0.0));
        p.push_particle(Vec2::new(3.0, 4.0), Vec2::ZERO);
        assert_eq!(p.len(), 2);
        assert_eq!(p.predicted_position[0], Vec2::new(1.0, 2.0));
        assert_eq!(p.neighbors.len(), 2);

        p.truncate(1);
        assert_eq!(p.len(), 1);
        assert_eq!(p.velocity.len(), 1);
        assert_eq!(p.density.len(), 1);
        assert_eq!(p.neighbors.len(), 1);
    }
}
