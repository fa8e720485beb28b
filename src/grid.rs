//! Broadcast helpers that expand 1-D coordinate arrays into full grid shapes.
//!
//! Grids are indexed `(frame, radial, azimuthal)`. Every stage that needs a
//! coordinate at each cell goes through these helpers rather than reshaping
//! at the call site.

use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView3, Axis};

/// Repeats a radial row along the azimuthal and frame axes:
/// `out[t, r, s] = row[r]`, shape `(num_frames, row.len(), num_theta)`.
#[inline]
pub fn radial_broadcast(row: ArrayView1<'_, f64>, num_theta: usize, num_frames: usize) -> Array3<f64> {
    Array3::from_shape_fn((num_frames, row.len(), num_theta), |(_, r, _)| row[r])
}

/// Repeats an azimuthal row along the radial and frame axes:
/// `out[t, r, s] = row[s]`, shape `(num_frames, num_radial, row.len())`.
#[inline]
pub fn theta_broadcast(row: ArrayView1<'_, f64>, num_radial: usize, num_frames: usize) -> Array3<f64> {
    Array3::from_shape_fn((num_frames, num_radial, row.len()), |(_, _, s)| row[s])
}

/// Repeats a radial row along the frame axis: `out[t, r] = row[r]`.
#[inline]
pub fn frame_broadcast(row: ArrayView1<'_, f64>, num_frames: usize) -> Array2<f64> {
    Array2::from_shape_fn((num_frames, row.len()), |(_, r)| row[r])
}

/// Azimuthal mass-weighted average:
/// `out[t, r] = sum_s(arr * density) / sum_s(density)`.
pub fn azimuthal_mass_average(arr: ArrayView3<'_, f64>, density: ArrayView3<'_, f64>) -> Array2<f64> {
    let weighted_sum = (&arr * &density).sum_axis(Axis(2));
    let ring_density = density.sum_axis(Axis(2));
    weighted_sum / ring_density
}

/// Azimuthal arithmetic mean per ring, shape `(num_frames, num_radial)`.
pub fn azimuthal_mean(arr: ArrayView3<'_, f64>) -> Array2<f64> {
    let num_theta = arr.len_of(Axis(2)) as f64;
    arr.sum_axis(Axis(2)) / num_theta
}

/// Per-ring sums of `arr[t, r, s] * weight[r]` over rings `skip..`, one per frame.
pub(crate) fn weighted_ring_sum(arr: ArrayView3<'_, f64>, ring_weight: ArrayView1<'_, f64>, skip: usize) -> Array1<f64> {
    let ring_sums = arr.sum_axis(Axis(2));
    ring_sums
        .outer_iter()
        .map(|rings| {
            rings
                .iter()
                .zip(ring_weight.iter())
                .skip(skip)
                .map(|(value, weight)| value * weight)
                .sum::<f64>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_broadcast_shapes() {
        let radial = array![1.0, 2.0, 3.0];
        let theta = array![0.0, 0.5];

        let r = radial_broadcast(radial.view(), 2, 4);
        assert_eq!(r.dim(), (4, 3, 2));
        assert_eq!(r[[3, 2, 1]], 3.0);
        assert_eq!(r[[0, 1, 0]], 2.0);

        let t = theta_broadcast(theta.view(), 3, 4);
        assert_eq!(t.dim(), (4, 3, 2));
        assert_eq!(t[[2, 0, 1]], 0.5);

        let f = frame_broadcast(radial.view(), 5);
        assert_eq!(f.dim(), (5, 3));
        assert_eq!(f[[4, 1]], 2.0);
    }

    #[test]
    fn test_mass_average_weights_by_density() {
        // one frame, one ring, two cells
        let arr = Array3::from_shape_vec((1, 1, 2), vec![1.0, 3.0]).unwrap();
        let density = Array3::from_shape_vec((1, 1, 2), vec![3.0, 1.0]).unwrap();
        let avg = azimuthal_mass_average(arr.view(), density.view());
        assert_relative_eq!(avg[[0, 0]], 1.5);
        assert_relative_eq!(azimuthal_mean(arr.view())[[0, 0]], 2.0);
    }

    #[test]
    fn test_weighted_ring_sum_skips_inner_rings() {
        let arr = Array3::from_shape_fn((2, 3, 2), |(t, r, _)| (t + 1) as f64 * (r + 1) as f64);
        let weights = array![100.0, 1.0, 10.0];
        let sums = weighted_ring_sum(arr.view(), weights.view(), 1);
        // frame 0: rings 1,2 sum over theta -> 4, 6
        assert_relative_eq!(sums[0], 4.0 * 1.0 + 6.0 * 10.0);
        assert_relative_eq!(sums[1], 8.0 * 1.0 + 12.0 * 10.0);
    }
}
