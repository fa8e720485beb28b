use ndarray::{Array3, Axis};
use serde::{Deserialize, Serialize};

/// A contiguous run of snapshots `[start, start + len)` stacked along axis 0.
/// Each field has shape `(len, num_radial, num_theta)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Index of the first snapshot in the batch.
    pub start: usize,
    pub density: Array3<f64>,
    pub v_radial: Array3<f64>,
    pub v_azimuthal: Array3<f64>,
}

impl Batch {
    /// Number of snapshots in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.density.len_of(Axis(0))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One past the last snapshot index in the batch.
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.len()
    }
}
