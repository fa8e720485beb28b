//! Radial profiles and disk-wide scalars reduced from per-cell fields.
//!
//! All disk-integrated sums skip the innermost ring, which sits on the inner
//! boundary of the simulation domain. Annulus masses use the centroid radius
//! of each ring and its edge-to-edge width.

use crate::grid::{azimuthal_mass_average, frame_broadcast, radial_broadcast, theta_broadcast, weighted_ring_sum};
use diagnostics_common::GridGeometry;
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2, ArrayView3, Axis, Zip};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Rings at the inner boundary excluded from disk-integrated sums.
pub const EXCLUDED_INNER_RINGS: usize = 1;

/// An eccentricity/periastron pair of radial profiles, `(frames, num_radial)`.
#[derive(Debug, Clone)]
pub struct RadialEstimate {
    pub eccentricity: Array2<f64>,
    pub periastron: Array2<f64>,
}

/// `r * Δr` for each ring.
fn ring_area_factor(geometry: &GridGeometry) -> Array1<f64> {
    &geometry.radial_intervals * &geometry.delta_r
}

/// Mass-weighted average of a cell field over the disk (rings `1..`),
/// weighting each cell by `density * r * Δr`.
pub fn disk_mass_average(arr: ArrayView3<'_, f64>, density: ArrayView3<'_, f64>, geometry: &GridGeometry) -> Array1<f64> {
    let weights = ring_area_factor(geometry);
    let weighted = &arr * &density;
    let weighted_sum = weighted_ring_sum(weighted.view(), weights.view(), EXCLUDED_INNER_RINGS);
    let mass = weighted_ring_sum(density, weights.view(), EXCLUDED_INNER_RINGS);
    weighted_sum / mass
}

/// Total disk mass per frame: `sum(density * r * Δr) * Δθ` over rings `1..`.
pub fn total_mass(density: ArrayView3<'_, f64>, geometry: &GridGeometry) -> Array1<f64> {
    let weights = ring_area_factor(geometry);
    weighted_ring_sum(density, weights.view(), EXCLUDED_INNER_RINGS) * geometry.delta_theta
}

/// Mass of every ring, `(frames, num_radial)`. Excluded rings are included
/// here; callers decide what to skip.
pub fn ring_masses(density: ArrayView3<'_, f64>, geometry: &GridGeometry) -> Array2<f64> {
    let weights = ring_area_factor(geometry) * geometry.delta_theta;
    density.sum_axis(Axis(2)) * &weights
}

/// Disk-wide average of a radial profile, weighted by the azimuthally averaged
/// density of each annulus: `sum(x * radialDens * 2pi * r * Δr) / totalMass`.
pub fn radial_disk_mass_average(
    profile: ArrayView2<'_, f64>,
    radial_density: ArrayView2<'_, f64>,
    geometry: &GridGeometry,
    total_mass: ArrayView1<'_, f64>,
) -> Array1<f64> {
    let weights = ring_area_factor(geometry) * (2.0 * PI);
    let weighted = &profile * &radial_density * &weights;
    let weighted_sum = weighted.slice(s![.., EXCLUDED_INNER_RINGS..]).sum_axis(Axis(1));
    weighted_sum / &total_mass
}

/// Lubow estimator from the m=1 azimuthal projections of `vθ`.
///
/// `ω(r)` is the mass-weighted azimuthal mean of `vθ/r`; `vsin`, `vcos` are the
/// discrete projections of `vθ` on `sinθ`, `cosθ` normalized by `π`.
/// `e = 2 / (r ω) * |(vsin, vcos)|`, periastron `atan2(vsin, vcos)`.
pub fn lubow_estimator(geometry: &GridGeometry, density: ArrayView3<'_, f64>, v_azimuthal: ArrayView3<'_, f64>) -> RadialEstimate {
    let num_frames = v_azimuthal.len_of(Axis(0));
    let num_radial = geometry.num_radial();
    let num_theta = geometry.num_theta();

    let r = radial_broadcast(geometry.radial_intervals.view(), num_theta, num_frames);
    let sin_theta = theta_broadcast(geometry.theta_intervals.mapv(f64::sin).view(), num_radial, num_frames);
    let cos_theta = theta_broadcast(geometry.theta_intervals.mapv(f64::cos).view(), num_radial, num_frames);

    let angular_velocity = &v_azimuthal / &r;
    let omega = azimuthal_mass_average(angular_velocity.view(), density);

    let projection = geometry.delta_theta / PI;
    let v_sin = (&v_azimuthal * &sin_theta).sum_axis(Axis(2)) * projection;
    let v_cos = (&v_azimuthal * &cos_theta).sum_axis(Axis(2)) * projection;

    let r2d = frame_broadcast(geometry.radial_intervals.view(), num_frames);
    let eccentricity = Zip::from(&v_sin)
        .and(&v_cos)
        .and(&r2d)
        .and(&omega)
        .map_collect(|&vs, &vc, &r, &omega| 2.0 / (r * omega) * vs.hypot(vc));
    let periastron = Zip::from(&v_sin).and(&v_cos).map_collect(|&vs, &vc| vs.atan2(vc));

    RadialEstimate { eccentricity, periastron }
}

/// First azimuthal Fourier coefficient of each ring's density, using the
/// forward transform convention `c1 = sum_s ρ_s exp(-i θ_s)`.
pub fn density_mode_one(geometry: &GridGeometry, density: ArrayView3<'_, f64>) -> Array2<Complex64> {
    let twiddles: Array1<Complex64> = geometry
        .theta_intervals
        .iter()
        .map(|&theta| Complex64::new(theta.cos(), -theta.sin()))
        .collect();

    Zip::from(density.lanes(Axis(2))).map_collect(|ring| {
        ring.iter()
            .zip(twiddles.iter())
            .fold(Complex64::new(0.0, 0.0), |acc, (&rho, &w)| acc + w * rho)
    })
}

/// Morphological estimator: magnitude and phase of the m=1 density mode.
pub fn fourier_estimator(geometry: &GridGeometry, density: ArrayView3<'_, f64>) -> RadialEstimate {
    let modes = density_mode_one(geometry, density);
    RadialEstimate {
        eccentricity: modes.mapv(|c| c.norm()),
        periastron: modes.mapv(|c| c.im.atan2(c.re)),
    }
}

/// Smallest outer ring edge enclosing more than `fraction` of the disk mass,
/// one per frame. Falls back to the outermost edge when no ring crosses the
/// threshold (e.g. `fraction >= 1` or an empty disk).
pub fn disk_radius(density: ArrayView3<'_, f64>, geometry: &GridGeometry, fraction: f64) -> Array1<f64> {
    let masses = ring_masses(density, geometry);
    let outermost = geometry.radial_edges[geometry.radial_edges.len() - 1];

    masses
        .outer_iter()
        .map(|rings| {
            let disk = rings.slice(s![EXCLUDED_INNER_RINGS..]);
            let threshold = fraction * disk.sum();
            let mut cumulative = 0.0;
            disk.iter()
                .position(|&m| {
                    cumulative += m;
                    cumulative > threshold
                })
                .map_or(outermost, |k| geometry.ring_outer_edge(k + EXCLUDED_INNER_RINGS))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::Array3;

    const NUM_THETA: usize = 32;

    fn geometry() -> GridGeometry {
        GridGeometry::from_edges(&[0.4, 0.5, 0.7, 1.0, 1.4, 2.0, 2.8], NUM_THETA)
    }

    fn uniform_density(frames: usize, geometry: &GridGeometry, value: f64) -> Array3<f64> {
        Array3::from_elem((frames, geometry.num_radial(), geometry.num_theta()), value)
    }

    fn keplerian(frames: usize, geometry: &GridGeometry) -> Array3<f64> {
        Array3::from_shape_fn((frames, geometry.num_radial(), geometry.num_theta()), |(_, r, _)| {
            geometry.radial_intervals[r].powf(-0.5)
        })
    }

    #[test]
    fn test_total_mass_of_uniform_disk() {
        let geometry = geometry();
        let density = uniform_density(2, &geometry, 3.0);
        let mass = total_mass(density.view(), &geometry);

        let expected: f64 = (1..geometry.num_radial())
            .map(|k| 3.0 * geometry.radial_intervals[k] * geometry.delta_r[k] * 2.0 * PI)
            .sum();
        assert_relative_eq!(mass[0], expected, max_relative = 1e-12);
        assert_relative_eq!(mass[1], expected, max_relative = 1e-12);
    }

    #[test]
    fn test_inner_ring_is_excluded() {
        let geometry = geometry();
        let mut density = uniform_density(1, &geometry, 1.0);
        let baseline = total_mass(density.view(), &geometry)[0];
        density.slice_mut(s![.., 0, ..]).fill(1.0e6);

        assert_relative_eq!(total_mass(density.view(), &geometry)[0], baseline);

        let arr = Array3::from_shape_fn(density.raw_dim(), |(_, r, _)| if r == 0 { 100.0 } else { 0.25 });
        assert_relative_eq!(disk_mass_average(arr.view(), density.view(), &geometry)[0], 0.25, max_relative = 1e-12);
    }

    #[test]
    fn test_radial_average_of_constant_profile() {
        let geometry = geometry();
        let density = uniform_density(1, &geometry, 2.0);
        let mass = total_mass(density.view(), &geometry);
        let radial_density = crate::grid::azimuthal_mean(density.view());
        let profile = Array2::from_elem((1, geometry.num_radial()), 0.1);

        let avg = radial_disk_mass_average(profile.view(), radial_density.view(), &geometry, mass.view());
        assert_relative_eq!(avg[0], 0.1, max_relative = 1e-12);
    }

    #[test]
    fn test_lubow_circular_flow_is_zero() {
        let geometry = geometry();
        let density = uniform_density(2, &geometry, 1.0);
        let v_azimuthal = keplerian(2, &geometry);

        let lubow = lubow_estimator(&geometry, density.view(), v_azimuthal.view());
        assert_eq!(lubow.eccentricity.dim(), (2, geometry.num_radial()));
        for &e in lubow.eccentricity.iter() {
            assert_abs_diff_eq!(e, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_lubow_recovers_mode_one_velocity() {
        let geometry = geometry();
        let density = uniform_density(1, &geometry, 1.0);
        let amplitude = 0.05;
        let phase = 0.8;
        let v_azimuthal = Array3::from_shape_fn(density.raw_dim(), |(_, r, s)| {
            let radius = geometry.radial_intervals[r];
            let theta = geometry.theta_intervals[s];
            radius.powf(-0.5) * (1.0 + amplitude * (theta - phase).cos())
        });

        let lubow = lubow_estimator(&geometry, density.view(), v_azimuthal.view());
        for r in 0..geometry.num_radial() {
            assert_relative_eq!(lubow.eccentricity[[0, r]], 2.0 * amplitude, max_relative = 1e-9);
            assert_relative_eq!(lubow.periastron[[0, r]], phase, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_fourier_axisymmetric_is_zero() {
        let geometry = geometry();
        let density = Array3::from_shape_fn((1, geometry.num_radial(), NUM_THETA), |(_, r, _)| 1.0 + r as f64);
        let fourier = fourier_estimator(&geometry, density.view());
        for &e in fourier.eccentricity.iter() {
            assert_abs_diff_eq!(e, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_fourier_cosine_perturbation() {
        let geometry = geometry();
        let perturbed = |amplitude: f64| {
            Array3::from_shape_fn((1, geometry.num_radial(), NUM_THETA), |(_, r, s)| {
                let bump = if r == 3 { amplitude * geometry.theta_intervals[s].cos() } else { 0.0 };
                2.0 + bump
            })
        };

        let small = fourier_estimator(&geometry, perturbed(0.1).view());
        let large = fourier_estimator(&geometry, perturbed(0.3).view());

        assert_relative_eq!(small.eccentricity[[0, 3]], 0.1 * NUM_THETA as f64 / 2.0, max_relative = 1e-12);
        assert_relative_eq!(large.eccentricity[[0, 3]] / small.eccentricity[[0, 3]], 3.0, max_relative = 1e-12);
        assert_abs_diff_eq!(small.periastron[[0, 3]], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(small.eccentricity[[0, 2]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_disk_radius_monotone_in_fraction() {
        let geometry = geometry();
        let density = Array3::from_shape_fn((3, geometry.num_radial(), NUM_THETA), |(t, r, s)| {
            1.0 + 0.3 * t as f64 + 0.1 * r as f64 + 0.01 * s as f64
        });

        let fractions = [0.1, 0.5, 0.9, 0.95, 0.999_999];
        let radii: Vec<Array1<f64>> = fractions.iter().map(|&p| disk_radius(density.view(), &geometry, p)).collect();
        for t in 0..3 {
            for pair in radii.windows(2) {
                assert!(pair[0][t] <= pair[1][t]);
            }
            assert_relative_eq!(radii[4][t], 2.8);
        }
        assert_relative_eq!(disk_radius(density.view(), &geometry, 1.0)[0], 2.8);
    }

    #[test]
    fn test_disk_radius_first_crossing() {
        let geometry = geometry();
        // all mass in ring 2
        let density = Array3::from_shape_fn((1, geometry.num_radial(), NUM_THETA), |(_, r, _)| if r == 2 { 1.0 } else { 0.0 });
        let radius = disk_radius(density.view(), &geometry, 0.9);
        assert_relative_eq!(radius[0], geometry.ring_outer_edge(2));
    }
}
