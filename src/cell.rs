//! Per-cell osculating eccentricity vectors.
//!
//! Each fluid cell is treated as an independent test particle around a
//! central mass `GM` (Mueller & Kley 2012 form):
//!
//! ```text
//! ex = (r vθ)(vr sinθ + vθ cosθ)/GM − cosθ
//! ey = (r vθ)(vθ sinθ − vr cosθ)/GM − sinθ
//! ```
//!
//! Density plays no part here; it only enters the later weighted reductions.

use crate::grid::{radial_broadcast, theta_broadcast};
use diagnostics_common::{GridGeometry, Vec2};
use ndarray::{Array3, ArrayView3, Axis, Zip};

/// Eccentricity-vector fields, each shaped `(frames, num_radial, num_theta)`.
#[derive(Debug, Clone)]
pub struct CellDiagnostics {
    pub ecc_x: Array3<f64>,
    pub ecc_y: Array3<f64>,
    pub eccentricity: Array3<f64>,
    pub periastron: Array3<f64>,
}

/// Eccentricity vector of a single cell.
#[inline]
pub fn eccentricity_vector(r: f64, theta: f64, v_radial: f64, v_azimuthal: f64, gm: f64) -> Vec2 {
    let (sin_theta, cos_theta) = theta.sin_cos();
    let r_vtheta = r * v_azimuthal;
    Vec2::new(
        r_vtheta * (v_radial * sin_theta + v_azimuthal * cos_theta) / gm - cos_theta,
        r_vtheta * (v_azimuthal * sin_theta - v_radial * cos_theta) / gm - sin_theta,
    )
}

pub fn compute_cell_diagnostics(
    geometry: &GridGeometry,
    v_radial: ArrayView3<'_, f64>,
    v_azimuthal: ArrayView3<'_, f64>,
    gm: f64,
) -> CellDiagnostics {
    let num_frames = v_radial.len_of(Axis(0));
    let r = radial_broadcast(geometry.radial_intervals.view(), geometry.num_theta(), num_frames);
    let theta = theta_broadcast(geometry.theta_intervals.view(), geometry.num_radial(), num_frames);

    let shape = v_radial.raw_dim();
    let mut out = CellDiagnostics {
        ecc_x: Array3::zeros(shape.clone()),
        ecc_y: Array3::zeros(shape.clone()),
        eccentricity: Array3::zeros(shape.clone()),
        periastron: Array3::zeros(shape),
    };

    Zip::from(&mut out.ecc_x)
        .and(&mut out.ecc_y)
        .and(&r)
        .and(&theta)
        .and(&v_radial)
        .and(&v_azimuthal)
        .for_each(|ex, ey, &r, &theta, &vr, &vtheta| {
            let vector = eccentricity_vector(r, theta, vr, vtheta, gm);
            *ex = vector.x;
            *ey = vector.y;
        });

    Zip::from(&mut out.eccentricity)
        .and(&mut out.periastron)
        .and(&out.ecc_x)
        .and(&out.ecc_y)
        .for_each(|e, peri, &ex, &ey| {
            let (magnitude, angle) = Vec2::new(ex, ey).to_polar();
            *e = magnitude;
            *peri = angle;
        });

    out
}
