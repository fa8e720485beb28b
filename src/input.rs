//! Parsers for the static text files of a simulation run directory.

use diagnostics_common::{DiagnosticsError, DiagnosticsResult, GridGeometry};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Scalar run dimensions read from the dimensions file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunDimensions {
    pub max_radius: f64,
    pub num_outputs: usize,
    pub num_radial: usize,
    pub num_theta: usize,
}

// Positions of the entries within the dimensions file
const MAX_RADIUS_POS: usize = 4;
const NUM_OUTPUTS_POS: usize = 5;
const NUM_RADIAL_POS: usize = 6;
const NUM_THETA_POS: usize = 7;

/// Reads every whitespace-separated float in a text file.
pub fn read_floats(path: &Path) -> DiagnosticsResult<Vec<f64>> {
    let text = fs::read_to_string(path).map_err(|e| DiagnosticsError::io(path, e))?;
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f64>()
                .map_err(|_| DiagnosticsError::input_format(path, format!("'{}' is not a number", token)))
        })
        .collect()
}

/// Loads the radial cell edges: at least two values, strictly increasing.
pub fn load_radial_edges(path: &Path) -> DiagnosticsResult<Vec<f64>> {
    let edges = read_floats(path)?;
    if edges.len() < 2 {
        return Err(DiagnosticsError::input_format(
            path,
            format!("need at least 2 radial edges, found {}", edges.len()),
        ));
    }
    if let Some(k) = edges.windows(2).position(|pair| !(pair[1] > pair[0])) {
        return Err(DiagnosticsError::input_format(
            path,
            format!("radial edges not strictly increasing at entry {} ({} -> {})", k + 1, edges[k], edges[k + 1]),
        ));
    }
    debug!("Loaded {} radial edges from {}", edges.len(), path.display());
    Ok(edges)
}

pub fn load_run_dimensions(path: &Path) -> DiagnosticsResult<RunDimensions> {
    let values = read_floats(path)?;
    if values.len() <= NUM_THETA_POS {
        return Err(DiagnosticsError::input_format(
            path,
            format!("expected at least {} entries, found {}", NUM_THETA_POS + 1, values.len()),
        ));
    }

    let count = |pos: usize, what: &str| -> DiagnosticsResult<usize> {
        let v = values[pos];
        if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
            Ok(v as usize)
        } else {
            Err(DiagnosticsError::input_format(path, format!("{} must be a non-negative integer, found {}", what, v)))
        }
    };

    Ok(RunDimensions {
        max_radius: values[MAX_RADIUS_POS],
        num_outputs: count(NUM_OUTPUTS_POS, "output count")?,
        num_radial: count(NUM_RADIAL_POS, "radial cell count")?,
        num_theta: count(NUM_THETA_POS, "azimuthal cell count")?,
    })
}

/// Loads both static files and derives the grid geometry, checking that the
/// edge count matches the radial cell count.
pub fn load_geometry(edges_path: &Path, dims_path: &Path) -> DiagnosticsResult<(RunDimensions, GridGeometry)> {
    let dims = load_run_dimensions(dims_path)?;
    if dims.num_theta == 0 {
        return Err(DiagnosticsError::input_format(dims_path, "azimuthal cell count must be positive"));
    }
    let edges = load_radial_edges(edges_path)?;
    if edges.len() != dims.num_radial + 1 {
        return Err(DiagnosticsError::input_format(
            edges_path,
            format!("{} edges for {} radial cells", edges.len(), dims.num_radial),
        ));
    }
    Ok((dims, GridGeometry::from_edges(&edges, dims.num_theta)))
}
