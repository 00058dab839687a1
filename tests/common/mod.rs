//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use enrich_rs::{LineSink, Outputs};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Upper bound for any single pipeline run in these tests
pub fn test_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Run `f` on its own thread and fail the test if it does not finish in time
pub fn within<T, F>(timeout: Duration, f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(timeout)
        .expect("pipeline did not finish in time")
}

/// Output files of one test run, removed on drop
pub struct OutputDir {
    dir: TempDir,
}

impl OutputDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn records_path(&self) -> PathBuf {
        self.dir.path().join("countries.tsv")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.path().join("set.txt")
    }

    pub fn failures_path(&self) -> PathBuf {
        self.dir.path().join("failed.tsv")
    }

    /// Records and summary sinks, truncating
    pub fn outputs(&self) -> Outputs {
        Outputs::new(
            LineSink::open(self.records_path(), false).expect("open records"),
            LineSink::open(self.summary_path(), false).expect("open summary"),
            None,
        )
    }

    /// Records, summary and failures sinks, truncating
    pub fn outputs_with_failures(&self) -> Outputs {
        let mut outputs = self.outputs();
        outputs.failures = Some(LineSink::open(self.failures_path(), false).expect("open failures"));
        outputs
    }

    pub fn records(&self) -> Vec<String> {
        read_lines(&self.records_path())
    }

    pub fn summary(&self) -> Vec<String> {
        read_lines(&self.summary_path())
    }

    pub fn failures(&self) -> Vec<String> {
        read_lines(&self.failures_path())
    }
}

/// Lines of a file (empty if the file does not exist)
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|content| content.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Collect lines into a set, asserting there were no duplicates
pub fn unique(lines: &[String]) -> HashSet<String> {
    let set: HashSet<String> = lines.iter().cloned().collect();
    assert_eq!(set.len(), lines.len(), "duplicate lines in {:?}", lines);
    set
}
