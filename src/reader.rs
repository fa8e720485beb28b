//! Streams gas snapshots from per-timestep binary files in bounded batches.

use diagnostics_common::{Batch, DiagnosticsError, DiagnosticsResult, GridGeometry};
use log::{debug, trace};
use ndarray::Array3;
use std::fs::{self, File};
use std::io::Read;
use std::mem::size_of;
use std::path::{Path, PathBuf};
use zerocopy::IntoBytes;

/// The three gas fields written per output index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasVariable {
    Density,
    RadialVelocity,
    AzimuthalVelocity,
}

impl GasVariable {
    pub const ALL: [GasVariable; 3] = [GasVariable::Density, GasVariable::RadialVelocity, GasVariable::AzimuthalVelocity];

    fn stem(self) -> &'static str {
        match self {
            GasVariable::Density => "gasdens",
            GasVariable::RadialVelocity => "gasvrad",
            GasVariable::AzimuthalVelocity => "gasvtheta",
        }
    }

    /// e.g. `gasdens12.dat`
    pub fn file_name(self, index: usize) -> String {
        format!("{}{}.dat", self.stem(), index)
    }

    /// Output index of a snapshot file name such as `gasvrad7.dat`.
    pub fn parse_index(file_name: &str) -> Option<usize> {
        GasVariable::ALL.iter().find_map(|variable| {
            let digits = file_name.strip_prefix(variable.stem())?.strip_suffix(".dat")?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()
        })
    }
}

/// Sequential reader over the snapshot files of one run directory.
///
/// The available sequence is the run of indices `0, 1, 2, ...` for which all
/// three variable files exist. It must end cleanly: a missing file followed by
/// later outputs is reported as [`DiagnosticsError::MissingSnapshot`].
/// A single cursor advances through the sequence, one batch at a time.
#[derive(Debug)]
pub struct SnapshotBatchReader {
    directory: PathBuf,
    num_radial: usize,
    num_theta: usize,
    total: usize,
    cursor: usize,
}

impl SnapshotBatchReader {
    /// Opens a run directory and counts the available snapshots.
    pub fn open(directory: impl Into<PathBuf>, geometry: &GridGeometry) -> DiagnosticsResult<Self> {
        let directory = directory.into();
        let total = count_available(&directory);
        check_clean_end(&directory, total)?;
        debug!("Found {} complete snapshots in {}", total, directory.display());
        Ok(SnapshotBatchReader {
            directory,
            num_radial: geometry.num_radial(),
            num_theta: geometry.num_theta(),
            total,
            cursor: 0,
        })
    }

    /// Number of consecutive complete snapshots present.
    pub fn total_available_count(&self) -> usize {
        self.total
    }

    pub fn has_remaining(&self) -> bool {
        self.cursor < self.total
    }

    pub fn path_of(&self, variable: GasVariable, index: usize) -> PathBuf {
        self.directory.join(variable.file_name(index))
    }

    /// Reads the next `max_size` snapshots (fewer at the end of the sequence)
    /// and advances the cursor past them.
    pub fn next_batch(&mut self, max_size: usize) -> DiagnosticsResult<Batch> {
        if max_size == 0 {
            return Err(DiagnosticsError::InvalidBatchSize);
        }
        if !self.has_remaining() {
            return Err(DiagnosticsError::EndOfData { cursor: self.cursor });
        }

        let start = self.cursor;
        let len = max_size.min(self.total - start);
        let batch = Batch {
            start,
            density: self.read_field(GasVariable::Density, start, len)?,
            v_radial: self.read_field(GasVariable::RadialVelocity, start, len)?,
            v_azimuthal: self.read_field(GasVariable::AzimuthalVelocity, start, len)?,
        };

        self.cursor += len;
        debug!("Read batch [{}, {}) of {}", start, self.cursor, self.total);
        Ok(batch)
    }

    /// Stacks `len` grids of one variable into a `(len, num_radial, num_theta)` array.
    fn read_field(&self, variable: GasVariable, start: usize, len: usize) -> DiagnosticsResult<Array3<f64>> {
        let cells = self.num_radial * self.num_theta;
        let mut values = vec![0.0; len * cells];
        for (i, grid) in values.chunks_exact_mut(cells).enumerate() {
            let index = start + i;
            trace!("Reading {:?} of snapshot {}", variable, index);
            read_grid_into(&self.path_of(variable, index), index, grid)?;
        }
        Array3::from_shape_vec((len, self.num_radial, self.num_theta), values)
            .map_err(|e| DiagnosticsError::input_format(&self.directory, e.to_string()))
    }
}

fn count_available(directory: &Path) -> usize {
    (0..)
        .take_while(|&index| {
            GasVariable::ALL
                .iter()
                .all(|variable| directory.join(variable.file_name(index)).is_file())
        })
        .count()
}

/// Fails if any snapshot file exists at or after the first incomplete index.
fn check_clean_end(directory: &Path, first_incomplete: usize) -> DiagnosticsResult<()> {
    let entries = fs::read_dir(directory).map_err(|e| DiagnosticsError::io(directory, e))?;
    let mut last_index = None;
    for entry in entries {
        let entry = entry.map_err(|e| DiagnosticsError::io(directory, e))?;
        if let Some(index) = entry.file_name().to_str().and_then(GasVariable::parse_index) {
            last_index = last_index.max(Some(index));
        }
    }

    match last_index {
        Some(last) if last >= first_incomplete => {
            let path = GasVariable::ALL
                .iter()
                .map(|variable| directory.join(variable.file_name(first_incomplete)))
                .find(|path| !path.is_file())
                .unwrap_or_else(|| directory.join(GasVariable::Density.file_name(first_incomplete)));
            Err(DiagnosticsError::MissingSnapshot { index: first_incomplete, path })
        }
        _ => Ok(()),
    }
}

/// Reads one flat row-major grid file into `values`. The file must hold exactly
/// `values.len()` native-endian f64 values.
pub fn read_grid_into(path: &Path, index: usize, values: &mut [f64]) -> DiagnosticsResult<()> {
    let read_err = |source| DiagnosticsError::SnapshotRead { index, path: path.to_path_buf(), source };

    let mut file = File::open(path).map_err(read_err)?;
    let found = file.metadata().map_err(read_err)?.len();
    let expected = (values.len() * size_of::<f64>()) as u64;
    if found != expected {
        return Err(DiagnosticsError::CorruptSnapshot { index, path: path.to_path_buf(), expected, found });
    }
    file.read_exact(values.as_mut_bytes()).map_err(read_err)
}
