//! Collision against the simulation domain.
//!
//! Runs after integration every step. The box resolver clamps each axis
//! independently; the circle/sphere resolver projects radially back onto the
//! boundary and may be followed by the box as a fallback.

use crate::params::{BoundaryMode, SolverConfig};
use crate::vector::SimVector;

/// Domain walls in the simulation's own vector type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain<V: SimVector> {
    /// Lower box corner.
    pub min: V,
    /// Upper box corner.
    pub max: V,
    /// Circle/sphere walls, if active.
    pub sphere: Option<SphereWall<V>>,
}

/// Circular (2D) or spherical (3D) wall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereWall<V: SimVector> {
    /// Centre.
    pub center: V,
    /// Maximum distance from the centre.
    pub radius: f32,
    /// Apply the box resolver afterwards.
    pub box_fallback: bool,
}

impl<V: SimVector> Domain<V> {
    /// Axis-aligned box domain.
    pub fn new_box(min: V, max: V) -> Self {
        Self { min, max, sphere: None }
    }

    /// Build the domain described by `config`.
    pub fn from_config(config: &SolverConfig) -> Self {
        let min = V::from_array3(config.bounds_min);
        let max = V::from_array3(config.bounds_max);
        let sphere = match config.boundary {
            BoundaryMode::Box => None,
            BoundaryMode::Circle {
                center,
                radius,
                box_fallback,
            } => Some(SphereWall {
                center: V::from_array3(center),
                radius,
                box_fallback,
            }),
        };
        Self { min, max, sphere }
    }

    /// Push an out-of-bounds particle back inside and damp its velocity.
    #[inline]
    pub fn resolve(&self, position: &mut V, velocity: &mut V, damping: f32) {
        match self.sphere {
            Some(wall) => {
                resolve_sphere(position, velocity, wall.center, wall.radius, damping);
                if wall.box_fallback {
                    resolve_box(position, velocity, self.min, self.max, damping);
                }
            }
            None => resolve_box(position, velocity, self.min, self.max, damping),
        }
    }
}

/// Clamp `position` into `[min, max]` per axis.
///
/// Each axis that was outside has its velocity component multiplied by
/// `-damping`. A particle exactly on a wall is left alone.
#[inline]
pub fn resolve_box<V: SimVector>(position: &mut V, velocity: &mut V, min: V, max: V, damping: f32) {
    for axis in 0..V::DIMENSION.axes() {
        if position[axis] < min[axis] {
            velocity[axis] *= -damping;
            position[axis] = min[axis];
        }
        if position[axis] > max[axis] {
            velocity[axis] *= -damping;
            position[axis] = max[axis];
        }
    }
}

/// Project a particle outside the circle/sphere back onto it.
///
/// The whole velocity is scaled by `-damping`; the position keeps its
/// direction from `center`.
#[inline]
pub fn resolve_sphere<V: SimVector>(
    position: &mut V,
    velocity: &mut V,
    center: V,
    radius: f32,
    damping: f32,
) {
    let offset = *position - center;
    let distance = offset.length();
    if distance > radius {
        *velocity *= -damping;
        *position = center + offset * (radius / distance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec2, Vec3};

    #[test]
    fn box_clamps_both_axes_at_corner() {
        let mut p = Vec2::new(-1.0, 12.0);
        let mut v = Vec2::new(-4.0, 2.0);
        resolve_box(&mut p, &mut v, Vec2::ZERO, Vec2::splat(10.0), 0.5);
        assert_eq!(p, Vec2::new(0.0, 10.0));
        assert_eq!(v, Vec2::new(2.0, -1.0));
    }

    #[test]
    fn inside_particle_untouched() {
        let mut p = Vec3::new(5.0, 5.0, 5.0);
        let mut v = Vec3::new(1.0, -1.0, 3.0);
        let domain = Domain::new_box(Vec3::ZERO, Vec3::splat(10.0));
        domain.resolve(&mut p, &mut v, 0.3);
        assert_eq!(p, Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(v, Vec3::new(1.0, -1.0, 3.0));
    }

    #[test]
    fn sphere_projects_along_radius() {
        let mut p = Vec2::new(20.0, 0.0);
        let mut v = Vec2::new(2.0, 1.0);
        resolve_sphere(&mut p, &mut v, Vec2::ZERO, 10.0, 0.5);
        assert!((p - Vec2::new(10.0, 0.0)).length() < 1.0e-5, "p={p}");
        assert_eq!(v, Vec2::new(-1.0, -0.5));
    }

    #[test]
    fn sphere_with_box_fallback() {
        let config = SolverConfig {
            bounds_min: [0.0, 0.0, 0.0],
            bounds_max: [5.0, 100.0, 100.0],
            boundary: BoundaryMode::Circle {
                center: [0.0, 0.0, 0.0],
                radius: 10.0,
                box_fallback: true,
            },
            ..SolverConfig::default()
        };
        let domain = Domain::<Vec2>::from_config(&config);
        let mut p = Vec2::new(8.0, 1.0);
        let mut v = Vec2::new(1.0, 0.0);
        domain.resolve(&mut p, &mut v, 1.0);
        // Inside the circle but beyond the box's x wall.
        assert_eq!(p.x, 5.0);
        assert_eq!(v.x, -1.0);
    }
}
