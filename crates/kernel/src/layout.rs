//! Initial and reset particle layouts.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::params::ConfigError;
use crate::particle::ParticleArrays;
use crate::vector::SimVector;

/// Arrangement used when (re)seeding particle positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Layout {
    /// Uniformly random inside the domain box.
    Random,
    /// Jittered lattice filling `scale` of the box, centred.
    Grid {
        /// Fraction of the box extent covered, in `[0, 1]`.
        scale: f32,
    },
    /// Random points in a disc (2D) or ball (3D) at the box centre.
    Disc {
        /// Fraction of the largest inscribed radius, in `[0, 1]`.
        scale: f32,
    },
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Grid { scale: 1.0 }
    }
}

impl Layout {
    /// Reject scales outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Layout::Random => Ok(()),
            Layout::Grid { scale } | Layout::Disc { scale } => {
                if (0.0..=1.0).contains(&scale) {
                    Ok(())
                } else {
                    Err(ConfigError::InvalidParameter {
                        name: "layout scale",
                        value: scale,
                    })
                }
            }
        }
    }

    /// `count` positions inside the box `[min, max]`.
    pub fn positions<V: SimVector, R: Rng + ?Sized>(
        &self,
        count: usize,
        min: V,
        max: V,
        rng: &mut R,
    ) -> Vec<V> {
        match *self {
            Layout::Random => (0..count).map(|_| V::random_in_box(rng, min, max)).collect(),
            Layout::Grid { scale } => grid_positions(count, min, max, scale, rng),
            Layout::Disc { scale } => disc_positions(count, min, max, scale, rng),
        }
    }

    /// Overwrite every particle's position with this layout and give it a
    /// random unit velocity.
    pub fn apply<V: SimVector, R: Rng + ?Sized>(
        &self,
        particles: &mut ParticleArrays<V>,
        min: V,
        max: V,
        rng: &mut R,
    ) {
        let positions = self.positions(particles.len(), min, max, rng);
        for (i, position) in positions.into_iter().enumerate() {
            particles.position[i] = position;
            particles.predicted_position[i] = position;
            particles.velocity[i] = V::random_unit(rng);
            particles.density[i] = 0.0;
            particles.near_density[i] = 0.0;
            particles.neighbors[i].clear();
        }
    }
}

fn grid_positions<V: SimVector, R: Rng + ?Sized>(
    count: usize,
    min: V,
    max: V,
    scale: f32,
    rng: &mut R,
) -> Vec<V> {
    if count == 0 {
        return Vec::new();
    }
    let axes = V::DIMENSION.axes();
    let per_axis = (count as f64).powf(1.0 / axes as f64).ceil().max(1.0) as usize;
    // Guard against powf rounding just below an exact power.
    let per_axis = if per_axis.pow(axes as u32) < count {
        per_axis + 1
    } else {
        per_axis
    };

    let center = (min + max) * 0.5;
    let extent = (max - min) * scale;
    let corner = center - extent * 0.5;
    let spacing = extent / (per_axis + 1) as f32;

    (0..count)
        .map(|i| {
            let mut position = corner;
            let mut rest = i;
            for axis in 0..axes {
                let cell = rest % per_axis;
                rest /= per_axis;
                let jitter = spacing[axis] * rng.gen_range(-0.1_f32..=0.1);
                position[axis] += spacing[axis] * (cell + 1) as f32 + jitter;
            }
            position
        })
        .collect()
}

fn disc_positions<V: SimVector, R: Rng + ?Sized>(
    count: usize,
    min: V,
    max: V,
    scale: f32,
    rng: &mut R,
) -> Vec<V> {
    let center = (min + max) * 0.5;
    let half = (max - min) * 0.5;
    let inscribed = (0..V::DIMENSION.axes())
        .map(|axis| half[axis])
        .fold(f32::INFINITY, f32::min);
    let radius = inscribed * scale;

    (0..count)
        .map(|_| {
            let distance = if radius > 0.0 { rng.gen_range(0.0..=radius) } else { 0.0 };
            center + V::random_unit(rng) * distance
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    fn inside<V: SimVector>(p: V, min: V, max: V) -> bool {
        (0..V::DIMENSION.axes()).all(|a| p[a] >= min[a] - 1.0e-4 && p[a] <= max[a] + 1.0e-4)
    }

    #[test]
    fn every_layout_stays_in_bounds() {
        let mut rng = rand::thread_rng();
        let (min, max) = (Vec2::new(100.0, 50.0), Vec2::new(900.0, 650.0));
        for layout in [Layout::Random, Layout::Grid { scale: 1.0 }, Layout::Disc { scale: 0.8 }] {
            let positions = layout.positions(1000, min, max, &mut rng);
            assert_eq!(positions.len(), 1000);
            assert!(positions.iter().all(|&p| inside(p, min, max)), "{layout:?}");
        }
        let (min3, max3) = (Vec3::ZERO, Vec3::splat(10.0));
        let positions = Layout::Grid { scale: 0.5 }.positions(64, min3, max3, &mut rng);
        assert!(positions.iter().all(|&p| inside(p, Vec3::splat(2.5), Vec3::splat(7.5))));
    }

    #[test]
    fn grid_points_are_distinct() {
        let mut rng = rand::thread_rng();
        let positions = Layout::Grid { scale: 1.0 }.positions(
            100,
            Vec2::ZERO,
            Vec2::splat(100.0),
            &mut rng,
        );
        for (i, a) in positions.iter().enumerate() {
            for b in &positions[i + 1..] {
                assert!(a.distance(*b) > 1.0, "{a} and {b} overlap");
            }
        }
    }

    #[test]
    fn apply_sets_unit_velocities() {
        let mut rng = rand::thread_rng();
        let mut particles = ParticleArrays::new();
        for _ in 0..10 {
            particles.push_particle(Vec2::ZERO, Vec2::ZERO);
        }
        Layout::Disc { scale: 1.0 }.apply(&mut particles, Vec2::ZERO, Vec2::splat(10.0), &mut rng);
        for v in &particles.velocity {
            assert!((v.length() - 1.0).abs() < 1.0e-5);
        }
    }

    #[test]
    fn rejects_out_of_range_scale() {
        assert!(Layout::Grid { scale: 1.5 }.validate().is_err());
        assert!(Layout::Disc { scale: -0.1 }.validate().is_err());
        assert!(Layout::Random.validate().is_ok());
    }
}
