//! Smoothing kernels used by the density, pressure and viscosity passes.
//!
//! All five functions share one support radius `h`. Their normalization
//! constants depend on `h` and on the dimension, so they are precomputed in
//! [`SmoothingKernels::recompute`] and reused for every pair evaluation.
//!
//! ```text
//! poly6(d)         = (h^2 - d^2)^3 * C_poly6      viscosity smoothing
//! spiky_pow2(d)    = (h - d)^2     * C_spiky2     density
//! spiky_pow3(d)    = (h - d)^3     * C_spiky3     near-density
//! d spiky_pow2(d)  = -(h - d)      * C_dspiky2
//! d spiky_pow3(d)  = -(h - d)^2    * C_dspiky3
//! ```
//!
//! Every function is exactly zero beyond `h`. Only the value is continuous
//! at the support edge, the derivative is not.

use std::f32::consts::PI;

use crate::vector::Dimension;

/// Precomputed smoothing kernels for one radius and dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingKernels {
    radius: f32,
    dimension: Dimension,
    poly6_scale: f32,
    spiky_pow2_scale: f32,
    spiky_pow3_scale: f32,
    derivative_spiky_pow2_scale: f32,
    derivative_spiky_pow3_scale: f32,
}

impl SmoothingKernels {
    /// Kernels for `dimension` with support radius `radius`.
    pub fn new(dimension: Dimension, radius: f32) -> Self {
        let mut kernels = Self {
            radius,
            dimension,
            poly6_scale: 0.0,
            spiky_pow2_scale: 0.0,
            spiky_pow3_scale: 0.0,
            derivative_spiky_pow2_scale: 0.0,
            derivative_spiky_pow3_scale: 0.0,
        };
        kernels.recompute(dimension, radius);
        kernels
    }

    /// Recompute all five normalization constants for a new radius and/or
    /// dimension.
    ///
    /// 2D constants come from integrating over the disc, 3D over the ball:
    ///
    /// ```text
    ///            2D              3D
    /// poly6      4 / (pi h^8)    315 / (64 pi h^9)
    /// spiky3     10 / (pi h^5)   15 / (pi h^6)
    /// spiky2     6 / (pi h^4)    15 / (2 pi h^5)
    /// dspiky3    30 / (pi h^5)   45 / (pi h^6)
    /// dspiky2    12 / (pi h^4)   15 / (pi h^5)
    /// ```
    pub fn recompute(&mut self, dimension: Dimension, radius: f32) {
        self.radius = radius;
        self.dimension = dimension;
        match dimension {
            Dimension::Two => {
                self.poly6_scale = 4.0 / (PI * radius.powi(8));
                self.spiky_pow3_scale = 10.0 / (PI * radius.powi(5));
                self.spiky_pow2_scale = 6.0 / (PI * radius.powi(4));
                self.derivative_spiky_pow3_scale = 30.0 / (PI * radius.powi(5));
                self.derivative_spiky_pow2_scale = 12.0 / (PI * radius.powi(4));
            }
            Dimension::Three => {
                self.poly6_scale = 315.0 / (64.0 * PI * radius.abs().powi(9));
                self.spiky_pow3_scale = 15.0 / (PI * radius.powi(6));
                self.spiky_pow2_scale = 15.0 / (2.0 * PI * radius.powi(5));
                self.derivative_spiky_pow3_scale = 45.0 / (PI * radius.powi(6));
                self.derivative_spiky_pow2_scale = 15.0 / (PI * radius.powi(5));
            }
        }
    }

    /// Support radius `h`.
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Dimension the constants were computed for.
    #[inline]
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// `(h^2 - d^2)^3 * C_poly6` inside the support, zero outside.
    #[inline]
    pub fn poly6(&self, distance: f32) -> f32 {
        if distance > self.radius {
            return 0.0;
        }
        let v = self.radius * self.radius - distance * distance;
        v * v * v * self.poly6_scale
    }

    /// Density kernel `(h - d)^2 * C_spiky2`.
    #[inline]
    pub fn spiky_pow2(&self, distance: f32) -> f32 {
        if distance > self.radius {
            return 0.0;
        }
        let v = self.radius - distance;
        v * v * self.spiky_pow2_scale
    }

    /// Near-density kernel `(h - d)^3 * C_spiky3`.
    #[inline]
    pub fn spiky_pow3(&self, distance: f32) -> f32 {
        if distance > self.radius {
            return 0.0;
        }
        let v = self.radius - distance;
        v * v * v * self.spiky_pow3_scale
    }

    /// Slope of [`spiky_pow2`](Self::spiky_pow2) with respect to distance.
    #[inline]
    pub fn derivative_spiky_pow2(&self, distance: f32) -> f32 {
        if distance >= self.radius {
            return 0.0;
        }
        let v = self.radius - distance;
        -v * self.derivative_spiky_pow2_scale
    }

    /// Slope of [`spiky_pow3`](Self::spiky_pow3) with respect to distance.
    #[inline]
    pub fn derivative_spiky_pow3(&self, distance: f32) -> f32 {
        if distance >= self.radius {
            return 0.0;
        }
        let v = self.radius - distance;
        -v * v * self.derivative_spiky_pow3_scale
    }
}
