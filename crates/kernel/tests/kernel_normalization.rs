//! Kernel support and normalization via density summation.
//!
//! A normalized kernel summed over a uniform lattice should reproduce the
//! lattice's number density for interior particles.

use glam::{Vec2, Vec3};
use kernel::{Dimension, FluidSolver, ParticleArrays, SimulationKernel, SmoothingKernels, SolverConfig};

#[test]
fn kernels_vanish_outside_support() {
    for dim in [Dimension::Two, Dimension::Three] {
        let k = SmoothingKernels::new(dim, 10.0);
        for d in [10.0001_f32, 10.5, 15.0, 1.0e6] {
            assert_eq!(k.poly6(d), 0.0, "{dim:?} poly6({d})");
            assert_eq!(k.spiky_pow2(d), 0.0, "{dim:?} spiky_pow2({d})");
            assert_eq!(k.spiky_pow3(d), 0.0, "{dim:?} spiky_pow3({d})");
            assert_eq!(k.derivative_spiky_pow2(d), 0.0, "{dim:?} d_spiky_pow2({d})");
            assert_eq!(k.derivative_spiky_pow3(d), 0.0, "{dim:?} d_spiky_pow3({d})");
        }
        // Edge of support: value and derivative both reach zero.
        assert_eq!(k.spiky_pow2(10.0), 0.0);
        assert_eq!(k.derivative_spiky_pow3(10.0), 0.0);
    }
}

#[test]
fn spiky_kernels_peak_at_zero() {
    let h = 10.0_f32;
    let pi = std::f32::consts::PI;
    let k2 = SmoothingKernels::new(Dimension::Two, h);
    let k3 = SmoothingKernels::new(Dimension::Three, h);

    let cases = [
        ("2D spiky_pow2", k2.spiky_pow2(0.0), h * h * 6.0 / (pi * h.powi(4))),
        ("2D spiky_pow3", k2.spiky_pow3(0.0), h * h * h * 10.0 / (pi * h.powi(5))),
        ("3D spiky_pow2", k3.spiky_pow2(0.0), h * h * 15.0 / (2.0 * pi * h.powi(5))),
        ("3D spiky_pow3", k3.spiky_pow3(0.0), h * h * h * 15.0 / (pi * h.powi(6))),
    ];
    for (name, w, expected) in cases {
        assert!(
            (w - expected).abs() <= expected * 1.0e-5,
            "{name}: w={w}, expected={expected}"
        );
    }
    for d in [0.1_f32, 1.0, 5.0, 9.9] {
        assert!(k2.spiky_pow2(d) < k2.spiky_pow2(0.0));
        assert!(k3.spiky_pow3(d) < k3.spiky_pow3(0.0));
    }
}

/// Still config so one step measures the initial arrangement.
fn still_config(h: f32) -> SolverConfig {
    SolverConfig {
        smoothing_radius: h,
        gravity: [0.0, 0.0, 0.0],
        pressure_multiplier: 0.0,
        near_pressure_multiplier: 0.0,
        viscosity_strength: 0.0,
        bounds_min: [-1000.0; 3],
        bounds_max: [1000.0; 3],
        ..SolverConfig::default()
    }
}

#[test]
fn density_at_rest_lattice_matches_number_density_2d() {
    let h = 10.0_f32;
    let spacing = 2.0_f32;
    let n = 21;

    let mut particles = ParticleArrays::new();
    for iy in 0..n {
        for ix in 0..n {
            let offset = (n / 2) as f32;
            particles.push_particle(
                Vec2::new((ix as f32 - offset) * spacing, (iy as f32 - offset) * spacing),
                Vec2::ZERO,
            );
        }
    }
    let center = (n / 2) * n + n / 2;
    assert_eq!(particles.position[center], Vec2::ZERO);

    let mut solver = FluidSolver::new(still_config(h), particles).unwrap();
    solver.step();

    let rho = solver.particles().density[center];
    let expected = 1.0 / (spacing * spacing);
    let err = (rho - expected).abs() / expected;
    eprintln!("2D lattice density: rho={rho:.5}, expected={expected:.5}, err={:.2}%", err * 100.0);
    assert!(err < 0.02, "2D density {rho} deviates {:.2}% from {expected}", err * 100.0);
}

#[test]
fn density_at_rest_lattice_matches_number_density_3d() {
    let h = 10.0_f32;
    let spacing = 2.5_f32;
    let n = 11;

    let mut particles = ParticleArrays::new();
    let offset = (n / 2) as f32;
    for iz in 0..n {
        for iy in 0..n {
            for ix in 0..n {
                particles.push_particle(
                    Vec3::new(
                        (ix as f32 - offset) * spacing,
                        (iy as f32 - offset) * spacing,
                        (iz as f32 - offset) * spacing,
                    ),
                    Vec3::ZERO,
                );
            }
        }
    }
    let center = particles
        .position
        .iter()
        .position(|p| *p == Vec3::ZERO)
        .unwrap();

    let mut solver = FluidSolver::new(still_config(h), particles).unwrap();
    solver.step();

    let rho = solver.particles().density[center];
    let expected = 1.0 / spacing.powi(3);
    let err = (rho - expected).abs() / expected;
    eprintln!("3D lattice density: rho={rho:.6}, expected={expected:.6}, err={:.2}%", err * 100.0);
    assert!(err < 0.02, "3D density {rho} deviates {:.2}% from {expected}", err * 100.0);
}
