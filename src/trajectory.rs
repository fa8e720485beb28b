//! Companion-body trajectory: deduplicated, converted to polar form and
//! subsampled to one sample per gas snapshot.

use diagnostics_common::{DiagnosticsError, DiagnosticsResult, TrajectoryConfig, Vec2};
use log::{debug, info};
use ndarray::{s, Array1};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One raw trajectory row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryRow {
    pub time: f64,
    pub position: Vec2,
}

/// Companion polar position per snapshot index.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanionTrajectory {
    pub radius: Array1<f64>,
    pub angle: Array1<f64>,
}

impl CompanionTrajectory {
    /// Loads the trajectory log and keeps exactly `required` samples.
    pub fn load(path: &Path, config: &TrajectoryConfig, required: usize) -> DiagnosticsResult<Self> {
        let rows = parse_rows(path, config)?;
        let raw_count = rows.len();
        let rows = dedup_by_time(rows);
        if rows.len() < raw_count {
            info!("Dropped {} duplicate trajectory rows from restarts", raw_count - rows.len());
        }
        let trajectory = Self::from_rows(&rows, config.stride, required)?;
        debug!("Loaded companion trajectory with {} samples from {}", trajectory.sample_count(), path.display());
        Ok(trajectory)
    }

    /// Converts already-deduplicated rows to polar form, taking every
    /// `stride`-th row, and truncates to `required` samples.
    pub fn from_rows(rows: &[TrajectoryRow], stride: usize, required: usize) -> DiagnosticsResult<Self> {
        let (radius, angle): (Vec<f64>, Vec<f64>) = rows
            .iter()
            .step_by(stride.max(1))
            .take(required)
            .map(|row| row.position.to_polar())
            .unzip();

        if radius.len() < required {
            return Err(DiagnosticsError::TrajectoryTooShort { available: radius.len(), required });
        }
        Ok(CompanionTrajectory { radius: Array1::from(radius), angle: Array1::from(angle) })
    }

    pub fn sample_count(&self) -> usize {
        self.radius.len()
    }

    /// Samples for snapshot indices `[start, end)`.
    pub fn window(&self, start: usize, end: usize) -> (Array1<f64>, Array1<f64>) {
        let end = end.min(self.sample_count());
        let start = start.min(end);
        (self.radius.slice(s![start..end]).to_owned(), self.angle.slice(s![start..end]).to_owned())
    }
}

/// Keeps the first row for each distinct timestamp, in file order.
pub fn dedup_by_time(rows: Vec<TrajectoryRow>) -> Vec<TrajectoryRow> {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.into_iter().filter(|row| seen.insert(row.time.to_bits())).collect()
}

fn resolve_column(column: i64, width: usize) -> Option<usize> {
    let index = if column < 0 { width as i64 + column } else { column };
    (0..width as i64).contains(&index).then_some(index as usize)
}

/// Parses whitespace-separated rows, skipping blank and `#` lines.
pub fn parse_rows(path: &Path, config: &TrajectoryConfig) -> DiagnosticsResult<Vec<TrajectoryRow>> {
    let text = fs::read_to_string(path).map_err(|e| DiagnosticsError::io(path, e))?;
    let mut rows = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields = line
            .split_whitespace()
            .map(|token| token.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DiagnosticsError::input_format(path, format!("line {}: {}", line_no + 1, e)))?;

        let column = |c: i64, what: &str| {
            resolve_column(c, fields.len()).map(|i| fields[i]).ok_or_else(|| {
                DiagnosticsError::input_format(
                    path,
                    format!("line {}: no {} column {} in a row of {}", line_no + 1, what, c, fields.len()),
                )
            })
        };
        rows.push(TrajectoryRow {
            time: column(config.time_column, "time")?,
            position: Vec2::new(column(config.x_column, "x")?, column(config.y_column, "y")?),
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn row(time: f64, x: f64, y: f64) -> TrajectoryRow {
        TrajectoryRow { time, position: Vec2::new(x, y) }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let times = [0.0, 0.0, 1.0, 2.0, 2.0, 2.0, 3.0];
        let rows: Vec<_> = times.iter().enumerate().map(|(i, &t)| row(t, i as f64, 0.0)).collect();

        let unique = dedup_by_time(rows);
        assert_eq!(unique.len(), 4);
        let xs: Vec<f64> = unique.iter().map(|r| r.position.x).collect();
        assert_eq!(xs, vec![0.0, 2.0, 3.0, 6.0]);
    }

    #[test]
    fn test_polar_conversion_and_stride() {
        let rows = vec![
            row(0.0, 1.0, 0.0),
            row(1.0, 5.0, 5.0),
            row(2.0, 0.0, 2.0),
            row(3.0, 5.0, 5.0),
            row(4.0, -3.0, 0.0),
        ];
        let trajectory = CompanionTrajectory::from_rows(&rows, 2, 3).unwrap();
        assert_eq!(trajectory.sample_count(), 3);
        assert_relative_eq!(trajectory.radius[1], 2.0);
        assert_relative_eq!(trajectory.angle[1], PI / 2.0);
        assert_relative_eq!(trajectory.radius[2], 3.0);
        assert_relative_eq!(trajectory.angle[2], PI);
    }

    #[test]
    fn test_too_short() {
        let rows: Vec<_> = (0..5).map(|i| row(i as f64, 1.0, 0.0)).collect();
        match CompanionTrajectory::from_rows(&rows, 2, 4) {
            Err(DiagnosticsError::TrajectoryTooShort { available, required }) => {
                assert_eq!(available, 3);
                assert_eq!(required, 4);
            }
            other => panic!("expected TrajectoryTooShort, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_file_with_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bigplanet0.dat");
        // columns: step x y vx vy mass time omega
        let contents = "\
# restart log
0 1.0 0.0 0 0 0.1 0.0 0
1 0.0 1.0 0 0 0.1 1.0 0
2 -1.0 0.0 0 0 0.1 2.0 0
1 9.0 9.0 0 0 0.1 1.0 0
2 9.0 9.0 0 0 0.1 2.0 0
3 0.0 -1.0 0 0 0.1 3.0 0
";
        fs::write(&path, contents).unwrap();

        let config = TrajectoryConfig { stride: 1, ..TrajectoryConfig::default() };
        let trajectory = CompanionTrajectory::load(&path, &config, 4).unwrap();
        assert_eq!(trajectory.sample_count(), 4);
        assert!(trajectory.radius.iter().all(|&r| (r - 1.0).abs() < 1e-12));
        assert_relative_eq!(trajectory.angle[3], -PI / 2.0);

        let (radius, angle) = trajectory.window(1, 3);
        assert_eq!(radius.len(), 2);
        assert_relative_eq!(angle[0], PI / 2.0);
    }

    #[test]
    fn test_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orbit.dat");
        fs::write(&path, "0 1.0 0.0 0.0\n1 x 0.0 1.0\n").unwrap();
        let config = TrajectoryConfig::default();
        assert!(matches!(parse_rows(&path, &config), Err(DiagnosticsError::InputFormat { .. })));

        fs::write(&path, "0 1.0\n").unwrap();
        assert!(matches!(parse_rows(&path, &config), Err(DiagnosticsError::InputFormat { .. })));
    }
}
