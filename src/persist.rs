//! On-disk storage of diagnostic series.
//!
//! Each batch writes one file per diagnostic under `<output>/batches`, named
//! `<name>_<start>.<ext>`. Those files are never overwritten. The concatenation
//! pass lists them per diagnostic, orders them by the numeric start index and
//! stitches them into one full-run series at `<output>/<name>.<ext>`.
//!
//! A batch is staged under `.partial` names and renamed into place only once
//! every series of the batch has been written.

use crate::diagnostics::{DiagnosticBundle, DiagnosticSpec, SeriesKind, SeriesView};
use crate::input::RunDimensions;
use diagnostics_common::{DiagnosticsError, DiagnosticsResult, OutputFormat};
use log::{debug, trace, warn};
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const BATCH_DIR: &str = "batches";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SCALARS_CSV_FILE: &str = "disk_scalars.csv";
const PARTIAL_SUFFIX: &str = ".partial";

/// A persisted diagnostic array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SeriesData {
    Radial(Array2<f64>),
    Scalar(Array1<f64>),
}

impl SeriesData {
    /// Zero-length series of the given kind.
    pub fn empty(kind: SeriesKind, num_radial: usize) -> Self {
        match kind {
            SeriesKind::Radial => SeriesData::Radial(Array2::zeros((0, num_radial))),
            SeriesKind::Scalar => SeriesData::Scalar(Array1::zeros(0)),
        }
    }

    pub fn kind(&self) -> SeriesKind {
        match self {
            SeriesData::Radial(_) => SeriesKind::Radial,
            SeriesData::Scalar(_) => SeriesKind::Scalar,
        }
    }

    /// Number of timesteps.
    pub fn len(&self) -> usize {
        match self {
            SeriesData::Radial(a) => a.nrows(),
            SeriesData::Scalar(a) => a.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<SeriesView<'_>> for SeriesData {
    fn from(view: SeriesView<'_>) -> Self {
        match view {
            SeriesView::Radial(v) => SeriesData::Radial(v.to_owned()),
            SeriesView::Scalar(v) => SeriesData::Scalar(v.to_owned()),
        }
    }
}

fn encode_err(path: &Path, reason: impl ToString) -> DiagnosticsError {
    DiagnosticsError::Encode { path: path.to_path_buf(), reason: reason.to_string() }
}

/// A float as written to JSON, which has no literal for NaN or infinity.
/// Non-finite values are stored as their string form (`"NaN"`, `"inf"`, `"-inf"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum JsonFloat {
    Number(f64),
    Text(String),
}

impl From<f64> for JsonFloat {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            JsonFloat::Number(value)
        } else {
            JsonFloat::Text(value.to_string())
        }
    }
}

impl JsonFloat {
    fn value(&self, path: &Path) -> DiagnosticsResult<f64> {
        match self {
            JsonFloat::Number(v) => Ok(*v),
            JsonFloat::Text(text) => text
                .parse()
                .map_err(|_| encode_err(path, format!("'{}' is not a number", text))),
        }
    }
}

/// JSON layout of a [`SeriesData`]: row-major values plus their shape.
#[derive(Debug, Serialize, Deserialize)]
struct JsonSeries {
    kind: SeriesKind,
    shape: Vec<usize>,
    values: Vec<JsonFloat>,
}

impl JsonSeries {
    fn from_data(data: &SeriesData) -> Self {
        let (shape, values) = match data {
            SeriesData::Radial(a) => (a.shape().to_vec(), a.iter().map(|&v| JsonFloat::from(v)).collect()),
            SeriesData::Scalar(a) => (a.shape().to_vec(), a.iter().map(|&v| JsonFloat::from(v)).collect()),
        };
        JsonSeries { kind: data.kind(), shape, values }
    }

    fn into_data(self, path: &Path) -> DiagnosticsResult<SeriesData> {
        let values = self
            .values
            .iter()
            .map(|v| v.value(path))
            .collect::<DiagnosticsResult<Vec<f64>>>()?;
        let shape_err = |e: ndarray::ShapeError| encode_err(path, e);
        match (self.kind, self.shape.as_slice()) {
            (SeriesKind::Radial, &[rows, cols]) => {
                Array2::from_shape_vec((rows, cols), values).map(SeriesData::Radial).map_err(shape_err)
            }
            (SeriesKind::Scalar, &[len]) => Array1::from_shape_vec(len, values).map(SeriesData::Scalar).map_err(shape_err),
            (kind, shape) => Err(encode_err(path, format!("shape {:?} does not fit a {:?} series", shape, kind))),
        }
    }
}

fn write_encoded(file: File, path: &Path, data: &SeriesData, format: OutputFormat) -> DiagnosticsResult<()> {
    let mut writer = BufWriter::new(file);
    match format {
        OutputFormat::Bincode => bincode::serialize_into(&mut writer, data).map_err(|e| encode_err(path, e))?,
        OutputFormat::Json => {
            serde_json::to_writer(&mut writer, &JsonSeries::from_data(data)).map_err(|e| encode_err(path, e))?
        }
        OutputFormat::MessagePack => rmp_serde::encode::write(&mut writer, data).map_err(|e| encode_err(path, e))?,
    }
    writer.flush().map_err(|e| DiagnosticsError::io(path, e))
}

/// Reads one persisted series.
pub fn read_series(path: &Path, format: OutputFormat) -> DiagnosticsResult<SeriesData> {
    let file = File::open(path).map_err(|e| DiagnosticsError::io(path, e))?;
    let reader = BufReader::new(file);
    match format {
        OutputFormat::Bincode => bincode::deserialize_from(reader).map_err(|e| encode_err(path, e)),
        OutputFormat::Json => serde_json::from_reader::<_, JsonSeries>(reader)
            .map_err(|e| encode_err(path, e))?
            .into_data(path),
        OutputFormat::MessagePack => rmp_serde::decode::from_read(reader).map_err(|e| encode_err(path, e)),
    }
}

/// Start index encoded in a batch file name, if `file_name` is exactly
/// `<name>_<digits>.<extension>`.
pub fn parse_batch_start(file_name: &str, name: &str, extension: &str) -> Option<usize> {
    let digits = file_name
        .strip_prefix(name)?
        .strip_prefix('_')?
        .strip_suffix(extension)?
        .strip_suffix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Best-effort removal of staged files after a failed batch write.
fn discard(partials: &[PathBuf]) {
    for partial in partials {
        if let Err(e) = fs::remove_file(partial) {
            warn!("Could not remove staged file {}: {}", partial.display(), e);
        }
    }
}

/// Per-diagnostic entry of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub kind: SeriesKind,
    pub plottable: bool,
    pub frames: usize,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format: OutputFormat,
    pub dimensions: RunDimensions,
    pub series: Vec<ManifestEntry>,
}

/// A diagnostic after the concatenation pass.
#[derive(Debug, Clone)]
pub struct ConcatenatedSeries {
    pub spec: &'static DiagnosticSpec,
    pub data: SeriesData,
}

/// Output directory layout for one run.
#[derive(Debug, Clone)]
pub struct DiagnosticStore {
    root: PathBuf,
    format: OutputFormat,
}

impl DiagnosticStore {
    pub fn new(root: impl Into<PathBuf>, format: OutputFormat) -> Self {
        DiagnosticStore { root: root.into(), format }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn batch_dir(&self) -> PathBuf {
        self.root.join(BATCH_DIR)
    }

    pub fn batch_path(&self, name: &str, start: usize) -> PathBuf {
        self.batch_dir().join(format!("{}_{}.{}", name, start, self.format.extension()))
    }

    pub fn series_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.{}", name, self.format.extension()))
    }

    /// Writes every computed diagnostic of `bundle` as a new batch file.
    /// Fails with an I/O error, writing nothing, if any target already exists.
    /// If a write fails partway, the batch's staged files are removed.
    pub fn persist_bundle(
        &self,
        bundle: &DiagnosticBundle,
        table: &'static [DiagnosticSpec],
    ) -> DiagnosticsResult<Vec<&'static str>> {
        let dir = self.batch_dir();
        fs::create_dir_all(&dir).map_err(|e| DiagnosticsError::io(&dir, e))?;

        let mut targets = Vec::with_capacity(table.len());
        for spec in table {
            match spec.extract(bundle) {
                Some(view) => targets.push((spec.name, view, self.batch_path(spec.name, bundle.start))),
                None => trace!("'{}' not computed for batch {}", spec.name, bundle.start),
            }
        }
        if let Some((_, _, path)) = targets.iter().find(|(_, _, path)| path.exists()) {
            let exists = io::Error::new(io::ErrorKind::AlreadyExists, "batch file already exists");
            return Err(DiagnosticsError::io(path, exists));
        }

        let mut staged = Vec::with_capacity(targets.len());
        for (_, view, path) in &targets {
            let partial = partial_path(path);
            let result = File::create(&partial)
                .map_err(|e| DiagnosticsError::io(&partial, e))
                .and_then(|file| write_encoded(file, &partial, &SeriesData::from(*view), self.format));
            staged.push(partial);
            if let Err(e) = result {
                discard(&staged);
                return Err(e);
            }
        }

        for (i, (partial, (_, _, path))) in staged.iter().zip(&targets).enumerate() {
            if let Err(e) = fs::rename(partial, path) {
                discard(&staged[i..]);
                return Err(DiagnosticsError::io(path, e));
            }
        }

        debug!("Persisted {} series for batch starting at {}", targets.len(), bundle.start);
        Ok(targets.into_iter().map(|(name, _, _)| name).collect())
    }

    /// Batch files of one diagnostic, ordered by start index.
    pub fn list_batch_files(&self, name: &str) -> DiagnosticsResult<Vec<(usize, PathBuf)>> {
        let dir = self.batch_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let extension = self.format.extension();
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| DiagnosticsError::io(&dir, e))? {
            let entry = entry.map_err(|e| DiagnosticsError::io(&dir, e))?;
            let file_name = entry.file_name();
            if let Some(start) = file_name.to_str().and_then(|f| parse_batch_start(f, name, extension)) {
                files.push((start, entry.path()));
            }
        }
        files.sort_by_key(|(start, _)| *start);
        Ok(files)
    }

    /// Stitches the batch files of one diagnostic into a series along the time axis.
    pub fn concatenate(&self, spec: &DiagnosticSpec) -> DiagnosticsResult<SeriesData> {
        let files = self.list_batch_files(spec.name)?;
        if files.is_empty() {
            return Err(DiagnosticsError::MissingDiagnosticFiles {
                name: spec.name.to_string(),
                directory: self.batch_dir(),
            });
        }

        let shape_err = |reason: String| DiagnosticsError::SeriesShape { name: spec.name.to_string(), reason };
        let mut parts = Vec::with_capacity(files.len());
        let mut next_start = 0;
        for (start, path) in &files {
            if *start != next_start {
                return Err(shape_err(format!("expected a batch starting at {}, found {}", next_start, start)));
            }
            let part = read_series(path, self.format)?;
            if part.kind() != spec.kind {
                return Err(shape_err(format!("'{}' holds a {:?} series", path.display(), part.kind())));
            }
            next_start += part.len();
            parts.push(part);
        }

        let joined = match spec.kind {
            SeriesKind::Radial => {
                let views: Vec<_> = parts
                    .iter()
                    .filter_map(|p| match p {
                        SeriesData::Radial(a) => Some(a.view()),
                        SeriesData::Scalar(_) => None,
                    })
                    .collect();
                concatenate(Axis(0), &views).map(SeriesData::Radial)
            }
            SeriesKind::Scalar => {
                let views: Vec<_> = parts
                    .iter()
                    .filter_map(|p| match p {
                        SeriesData::Scalar(a) => Some(a.view()),
                        SeriesData::Radial(_) => None,
                    })
                    .collect();
                concatenate(Axis(0), &views).map(SeriesData::Scalar)
            }
        };
        let joined = joined.map_err(|e| shape_err(e.to_string()))?;
        debug!("Concatenated {} batch files of '{}' into {} frames", files.len(), spec.name, joined.len());
        Ok(joined)
    }

    /// Writes a full-run series, replacing any previous concatenation.
    pub fn write_series(&self, name: &str, data: &SeriesData) -> DiagnosticsResult<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|e| DiagnosticsError::io(&self.root, e))?;
        let path = self.series_path(name);
        let file = File::create(&path).map_err(|e| DiagnosticsError::io(&path, e))?;
        write_encoded(file, &path, data, self.format)?;
        Ok(path)
    }

    pub fn write_manifest(
        &self,
        series: &[ConcatenatedSeries],
        dimensions: &RunDimensions,
    ) -> DiagnosticsResult<PathBuf> {
        let manifest = Manifest {
            format: self.format,
            dimensions: *dimensions,
            series: series
                .iter()
                .map(|s| ManifestEntry {
                    name: s.spec.name.to_string(),
                    kind: s.spec.kind,
                    plottable: s.spec.plottable,
                    frames: s.data.len(),
                    file: format!("{}.{}", s.spec.name, self.format.extension()),
                })
                .collect(),
        };
        let path = self.root.join(MANIFEST_FILE);
        let file = File::create(&path).map_err(|e| DiagnosticsError::io(&path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &manifest).map_err(|e| encode_err(&path, e))?;
        writer.flush().map_err(|e| DiagnosticsError::io(&path, e))?;
        Ok(path)
    }

    /// One row per timestep, one column per non-empty scalar series.
    pub fn export_scalars_csv(&self, series: &[ConcatenatedSeries]) -> DiagnosticsResult<PathBuf> {
        let columns: Vec<(&str, &Array1<f64>)> = series
            .iter()
            .filter_map(|s| match &s.data {
                SeriesData::Scalar(a) if !a.is_empty() => Some((s.spec.name, a)),
                _ => None,
            })
            .collect();

        let frames = columns.first().map_or(0, |(_, a)| a.len());
        if let Some((name, a)) = columns.iter().find(|(_, a)| a.len() != frames) {
            return Err(DiagnosticsError::SeriesShape {
                name: name.to_string(),
                reason: format!("{} frames where other scalars have {}", a.len(), frames),
            });
        }

        let path = self.root.join(SCALARS_CSV_FILE);
        let csv_err = |e: csv::Error| encode_err(&path, e);
        let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;

        let mut header = vec!["index"];
        header.extend(columns.iter().map(|(name, _)| *name));
        writer.write_record(&header).map_err(csv_err)?;
        for t in 0..frames {
            let mut record = vec![t.to_string()];
            record.extend(columns.iter().map(|(_, a)| a[t].to_string()));
            writer.write_record(&record).map_err(csv_err)?;
        }
        writer.flush().map_err(|e| DiagnosticsError::io(&path, e))?;
        Ok(path)
    }
}
