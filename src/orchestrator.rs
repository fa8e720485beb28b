//! Drives a full diagnostics run: batch loop first, concatenation second.

use crate::diagnostics::{compute_diagnostics, DIAGNOSTICS};
use crate::input::{load_geometry, RunDimensions};
use crate::journal::RunJournal;
use crate::persist::{ConcatenatedSeries, DiagnosticStore, SeriesData};
use crate::reader::SnapshotBatchReader;
use crate::trajectory::CompanionTrajectory;
use diagnostics_common::{DiagnosticsConfig, DiagnosticsError, DiagnosticsResult, GridGeometry};
use indicatif::ProgressBar;
use log::{debug, info, warn};

pub struct DiagnosticsRun {
    config: DiagnosticsConfig,
    dimensions: RunDimensions,
    geometry: GridGeometry,
    reader: SnapshotBatchReader,
    companion: Option<CompanionTrajectory>,
    store: DiagnosticStore,
}

impl DiagnosticsRun {
    /// Loads the static run files and opens the snapshot sequence.
    pub fn new(config: DiagnosticsConfig) -> DiagnosticsResult<Self> {
        if config.batch.size == 0 {
            return Err(DiagnosticsError::InvalidBatchSize);
        }
        let (dimensions, geometry) = load_geometry(&config.radial_edges_path(), &config.dimensions_path())?;
        debug!("Run dimensions: {:?}", dimensions);

        let reader = SnapshotBatchReader::open(&config.input.directory, &geometry)?;
        let available = reader.total_available_count();
        if available == 0 {
            warn!("No complete snapshots found in {}", config.input.directory.display());
        } else if available < dimensions.num_outputs {
            info!("{} of {} expected snapshots are present", available, dimensions.num_outputs);
        }

        let companion = match (&config.trajectory, config.trajectory_path()) {
            (Some(trajectory_config), Some(path)) => {
                Some(CompanionTrajectory::load(&path, trajectory_config, available)?)
            }
            _ => None,
        };

        let store = DiagnosticStore::new(&config.output.directory, config.output.format);
        Ok(DiagnosticsRun { config, dimensions, geometry, reader, companion, store })
    }

    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn store(&self) -> &DiagnosticStore {
        &self.store
    }

    pub fn total_snapshots(&self) -> usize {
        self.reader.total_available_count()
    }

    pub fn has_companion(&self) -> bool {
        self.companion.is_some()
    }

    /// Computes and persists diagnostics for every remaining batch. Returns the
    /// number of snapshots processed.
    pub fn run_batches(&mut self, journal: &mut RunJournal, progress: &ProgressBar) -> DiagnosticsResult<usize> {
        let batch_size = self.config.batch.size;
        let gm = self.config.physics.gm;
        let mut processed = 0;

        while self.reader.has_remaining() {
            let batch = match self.reader.next_batch(batch_size) {
                Ok(batch) => batch,
                Err(e) if e.is_end_of_data() => break,
                Err(e) => return Err(e),
            };

            let bundle = compute_diagnostics(&self.geometry, &batch, gm, self.companion.as_ref());
            let written = self.store.persist_bundle(&bundle, DIAGNOSTICS)?;
            journal.record_batch(batch.start, batch.len(), written.len())?;

            processed += batch.len();
            progress.inc(batch.len() as u64);
            info!(
                "Batch [{}, {}) done | {} series | {}/{} snapshots",
                batch.start,
                batch.end(),
                written.len(),
                processed,
                self.total_snapshots()
            );
        }
        Ok(processed)
    }

    /// Joins every diagnostic's batch files into a full-run series and writes
    /// the run-level outputs. A diagnostic without batch files yields an
    /// empty series.
    pub fn concatenate_all(&self, journal: &mut RunJournal) -> DiagnosticsResult<Vec<ConcatenatedSeries>> {
        let mut series = Vec::with_capacity(DIAGNOSTICS.len());

        for spec in DIAGNOSTICS {
            let data = match self.store.concatenate(spec) {
                Ok(data) => data,
                Err(e @ DiagnosticsError::MissingDiagnosticFiles { .. }) => {
                    warn!("{}; writing an empty series", e);
                    journal.record_skip(spec.name, &e.to_string())?;
                    SeriesData::empty(spec.kind, self.geometry.num_radial())
                }
                Err(e) => return Err(e),
            };
            let path = self.store.write_series(spec.name, &data)?;
            debug!("Wrote '{}' ({} frames) to {}", spec.name, data.len(), path.display());
            journal.record_series(spec.name, data.len())?;
            series.push(ConcatenatedSeries { spec, data });
        }

        let manifest = self.store.write_manifest(&series, &self.dimensions)?;
        info!("Manifest written to {}", manifest.display());
        if self.config.output.export_csv {
            let csv_path = self.store.export_scalars_csv(&series)?;
            info!("Disk scalars exported to {}", csv_path.display());
        }
        Ok(series)
    }
}
