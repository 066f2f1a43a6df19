//! Dimension abstraction over `glam` vectors.
//!
//! The solver, grid and kernel library are written once against
//! [`SimVector`] and instantiated for [`Vec2`] and [`Vec3`]. Everything that
//! differs between the two cases (neighbor-cell offsets, hash constants,
//! random directions) lives in the two trait impls below.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Div, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

use glam::{IVec2, IVec3, Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of spatial axes a simulation runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// Planar simulation (x, y).
    Two,
    /// Volumetric simulation (x, y, z).
    Three,
}

impl Dimension {
    /// Number of axes.
    pub fn axes(self) -> usize {
        match self {
            Dimension::Two => 2,
            Dimension::Three => 3,
        }
    }
}

/// Prime-like multipliers for the per-axis cell hash.
const HASH_X: u32 = 15823;
const HASH_Y: u32 = 9737333;
const HASH_Z: u32 = 440817757;

static OFFSETS_2D: [IVec2; 9] = [
    IVec2::new(-1, -1),
    IVec2::new(-1, 0),
    IVec2::new(-1, 1),
    IVec2::new(0, -1),
    IVec2::new(0, 0),
    IVec2::new(0, 1),
    IVec2::new(1, -1),
    IVec2::new(1, 0),
    IVec2::new(1, 1),
];

static OFFSETS_3D: [IVec3; 27] = [
    IVec3::new(-1, -1, -1),
    IVec3::new(-1, -1, 0),
    IVec3::new(-1, -1, 1),
    IVec3::new(-1, 0, -1),
    IVec3::new(-1, 0, 0),
    IVec3::new(-1, 0, 1),
    IVec3::new(-1, 1, -1),
    IVec3::new(-1, 1, 0),
    IVec3::new(-1, 1, 1),
    IVec3::new(0, -1, -1),
    IVec3::new(0, -1, 0),
    IVec3::new(0, -1, 1),
    IVec3::new(0, 0, -1),
    IVec3::new(0, 0, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 1, -1),
    IVec3::new(0, 1, 0),
    IVec3::new(0, 1, 1),
    IVec3::new(1, -1, -1),
    IVec3::new(1, -1, 0),
    IVec3::new(1, -1, 1),
    IVec3::new(1, 0, -1),
    IVec3::new(1, 0, 0),
    IVec3::new(1, 0, 1),
    IVec3::new(1, 1, -1),
    IVec3::new(1, 1, 0),
    IVec3::new(1, 1, 1),
];

/// Vector type a simulation is generic over.
///
/// Implemented for [`Vec2`] and [`Vec3`] only.
pub trait SimVector:
    Copy
    + Send
    + Sync
    + Debug
    + Default
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f32, Output = Self>
    + Div<f32, Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign<f32>
    + Neg<Output = Self>
    + Index<usize, Output = f32>
    + IndexMut<usize>
    + 'static
{
    /// Dimension tag for this vector type.
    const DIMENSION: Dimension;

    /// The zero vector.
    const ZERO: Self;

    /// Integer grid cell coordinate.
    type Cell: Copy + Send + Sync + Debug + Eq + Add<Output = Self::Cell>;

    /// Euclidean length.
    fn length(self) -> f32;

    /// Squared Euclidean length.
    fn length_squared(self) -> f32;

    /// Distance to `other`.
    fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Squared distance to `other`.
    fn distance_squared(self, other: Self) -> f32 {
        (other - self).length_squared()
    }

    /// Component-wise `floor(self / radius)`.
    fn cell_coordinate(self, radius: f32) -> Self::Cell;

    /// Offsets of the cell itself and its immediate neighbors (9 or 27).
    fn cell_offsets() -> &'static [Self::Cell];

    /// Unreduced hash of a cell coordinate. Wraps on overflow.
    fn hash_cell(cell: Self::Cell) -> u32;

    /// Uniformly distributed unit direction.
    fn random_unit<R: Rng + ?Sized>(rng: &mut R) -> Self;

    /// Uniformly distributed point inside the box `[min, max]`.
    fn random_in_box<R: Rng + ?Sized>(rng: &mut R, min: Self, max: Self) -> Self;

    /// Build from a three-component array; extra components are dropped.
    fn from_array3(a: [f32; 3]) -> Self;

    /// Widen to a three-component array, padding with zero.
    fn to_array3(self) -> [f32; 3];
}

impl SimVector for Vec2 {
    const DIMENSION: Dimension = Dimension::Two;
    const ZERO: Self = Vec2::ZERO;
    type Cell = IVec2;

    #[inline]
    fn length(self) -> f32 {
        Vec2::length(self)
    }

    #[inline]
    fn length_squared(self) -> f32 {
        Vec2::length_squared(self)
    }

    #[inline]
    fn cell_coordinate(self, radius: f32) -> IVec2 {
        (self / radius).floor().as_ivec2()
    }

    fn cell_offsets() -> &'static [IVec2] {
        &OFFSETS_2D
    }

    #[inline]
    fn hash_cell(cell: IVec2) -> u32 {
        (cell.x as u32)
            .wrapping_mul(HASH_X)
            .wrapping_add((cell.y as u32).wrapping_mul(HASH_Y))
    }

    fn random_unit<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let theta = rng.gen_range(0.0..std::f32::consts::TAU);
        Vec2::new(theta.cos(), theta.sin())
    }

    fn random_in_box<R: Rng + ?Sized>(rng: &mut R, min: Self, max: Self) -> Self {
        Vec2::new(rng.gen_range(min.x..=max.x), rng.gen_range(min.y..=max.y))
    }

    fn from_array3(a: [f32; 3]) -> Self {
        Vec2::new(a[0], a[1])
    }

    fn to_array3(self) -> [f32; 3] {
        [self.x, self.y, 0.0]
    }
}

impl SimVector for Vec3 {
    const DIMENSION: Dimension = Dimension::Three;
    const ZERO: Self = Vec3::ZERO;
    type Cell = IVec3;

    #[inline]
    fn length(self) -> f32 {
        Vec3::length(self)
    }

    #[inline]
    fn length_squared(self) -> f32 {
        Vec3::length_squared(self)
    }

    #[inline]
    fn cell_coordinate(self, radius: f32) -> IVec3 {
        (self / radius).floor().as_ivec3()
    }

    fn cell_offsets() -> &'static [IVec3] {
        &OFFSETS_3D
    }

    #[inline]
    fn hash_cell(cell: IVec3) -> u32 {
        (cell.x as u32)
            .wrapping_mul(HASH_X)
            .wrapping_add((cell.y as u32).wrapping_mul(HASH_Y))
            .wrapping_add((cell.z as u32).wrapping_mul(HASH_Z))
    }

    fn random_unit<R: Rng + ?Sized>(rng: &mut R) -> Self {
        // Uniform on the sphere: uniform z, uniform azimuth.
        let z: f32 = rng.gen_range(-1.0..=1.0);
        let theta = rng.gen_range(0.0..std::f32::consts::TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * theta.cos(), r * theta.sin(), z)
    }

    fn random_in_box<R: Rng + ?Sized>(rng: &mut R, min: Self, max: Self) -> Self {
        Vec3::new(
            rng.gen_range(min.x..=max.x),
            rng.gen_range(min.y..=max.y),
            rng.gen_range(min.z..=max.z),
        )
    }

    fn from_array3(a: [f32; 3]) -> Self {
        Vec3::from_array(a)
    }

    fn to_array3(self) -> [f32; 3] {
        self.to_array()
    }
}
