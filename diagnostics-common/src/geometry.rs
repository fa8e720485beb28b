use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Static polar-grid coordinates derived from the run's radial cell edges.
/// Computed once per run and shared read-only by every stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// N+1 strictly increasing cell-edge radii.
    pub radial_edges: Array1<f64>,
    /// N mass-centroid radii, one per ring.
    pub radial_intervals: Array1<f64>,
    /// M azimuthal cell angles, uniform over [0, 2pi).
    pub theta_intervals: Array1<f64>,
    /// N ring widths, `radial_edges[k+1] - radial_edges[k]`.
    pub delta_r: Array1<f64>,
    /// Azimuthal spacing, `2pi / M`.
    pub delta_theta: f64,
}

impl GridGeometry {
    /// Builds the geometry from cell edges and the azimuthal cell count.
    ///
    /// Ring `k` is placed at the centroid radius of the annulus between edges
    /// `k` and `k+1`, `(2/3)(r1^3 - r0^3)/(r1^2 - r0^2)`, not the midpoint.
    pub fn from_edges(radial_edges: &[f64], num_theta: usize) -> Self {
        let radial_intervals: Array1<f64> = radial_edges
            .windows(2)
            .map(|pair| annulus_centroid(pair[0], pair[1]))
            .collect();
        let delta_r: Array1<f64> = radial_edges.windows(2).map(|pair| pair[1] - pair[0]).collect();

        let delta_theta = if num_theta > 0 { 2.0 * PI / num_theta as f64 } else { 0.0 };
        let theta_intervals = Array1::from_shape_fn(num_theta, |k| k as f64 * delta_theta);

        GridGeometry {
            radial_edges: Array1::from(radial_edges.to_vec()),
            radial_intervals,
            theta_intervals,
            delta_r,
            delta_theta,
        }
    }

    #[inline]
    pub fn num_radial(&self) -> usize {
        self.radial_intervals.len()
    }

    #[inline]
    pub fn num_theta(&self) -> usize {
        self.theta_intervals.len()
    }

    /// Number of f64 values in one `(radial, azimuthal)` grid.
    #[inline]
    pub fn cells_per_grid(&self) -> usize {
        self.num_radial() * self.num_theta()
    }

    /// Outer edge radius of ring `k`.
    #[inline]
    pub fn ring_outer_edge(&self, k: usize) -> f64 {
        self.radial_edges[k + 1]
    }
}

/// Mass-centroid radius of the annulus `[r0, r1]`.
#[inline]
pub fn annulus_centroid(r0: f64, r1: f64) -> f64 {
    (2.0 / 3.0) * (r1.powi(3) - r0.powi(3)) / (r1.powi(2) - r0.powi(2))
}
