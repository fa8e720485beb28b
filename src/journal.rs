//! Per-run event journal, written as CSV next to the diagnostics.
//!
//! A journal is opened at the start of a run, handed by `&mut` to each stage,
//! and flushed by [`RunJournal::close`]. Repeated runs against the same output
//! directory append to the same file.

use diagnostics_common::{DiagnosticsError, DiagnosticsResult};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

pub const JOURNAL_FILE: &str = "journal.csv";

#[derive(Debug, Serialize)]
struct JournalRecord<'a> {
    event: &'a str,
    start: Option<usize>,
    count: Option<usize>,
    detail: &'a str,
}

pub struct RunJournal {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl RunJournal {
    pub fn open(directory: &Path) -> DiagnosticsResult<Self> {
        fs::create_dir_all(directory).map_err(|e| DiagnosticsError::io(directory, e))?;
        let path = directory.join(JOURNAL_FILE);
        let is_new = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| DiagnosticsError::io(&path, e))?;
        let writer = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
        Ok(RunJournal { writer, path })
    }

    fn write(&mut self, event: &str, start: Option<usize>, count: Option<usize>, detail: &str) -> DiagnosticsResult<()> {
        self.writer
            .serialize(JournalRecord { event, start, count, detail })
            .map_err(|e| DiagnosticsError::Encode { path: self.path.clone(), reason: e.to_string() })
    }

    pub fn record_start(&mut self, total: usize, detail: &str) -> DiagnosticsResult<()> {
        self.write("start", Some(0), Some(total), detail)
    }

    pub fn record_batch(&mut self, start: usize, count: usize, series: usize) -> DiagnosticsResult<()> {
        self.write("batch", Some(start), Some(count), &format!("{} series", series))
    }

    pub fn record_series(&mut self, name: &str, frames: usize) -> DiagnosticsResult<()> {
        self.write("series", None, Some(frames), name)
    }

    /// A diagnostic left empty by a recovered error.
    pub fn record_skip(&mut self, name: &str, reason: &str) -> DiagnosticsResult<()> {
        self.write("skip", None, None, &format!("{}: {}", name, reason))
    }

    pub fn record_finish(&mut self, frames: usize) -> DiagnosticsResult<()> {
        self.write("finish", None, Some(frames), "")
    }

    /// Flushes and closes the journal.
    pub fn close(mut self) -> DiagnosticsResult<()> {
        self.writer.flush().map_err(|e| DiagnosticsError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::Reader::from_path(path).unwrap();
        reader.records().map(|r| r.unwrap().iter().map(String::from).collect()).collect()
    }

    #[test]
    fn test_records_are_written_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut journal = RunJournal::open(dir.path()).unwrap();
        journal.record_start(7, "run01").unwrap();
        journal.record_batch(0, 3, 16).unwrap();
        journal.record_skip("companionRadius", "no files").unwrap();
        let path = dir.path().join(JOURNAL_FILE);
        journal.close().unwrap();

        let headers: Vec<String> = csv::Reader::from_path(&path).unwrap().headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["event", "start", "count", "detail"]);
        let rows = read_rows(&path);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["batch", "0", "3", "16 series"]);
        assert_eq!(rows[2], vec!["skip", "", "", "companionRadius: no files"]);
    }

    #[test]
    fn test_reopen_appends_without_second_header() {
        let dir = tempfile::tempdir().unwrap();
        for frames in [4, 9] {
            let mut journal = RunJournal::open(dir.path()).unwrap();
            journal.record_finish(frames).unwrap();
            journal.close().unwrap();
        }
        let rows = read_rows(&dir.path().join(JOURNAL_FILE));
        assert_eq!(rows, vec![vec!["finish", "", "4", ""], vec!["finish", "", "9", ""]]);
    }
}
