//! Record sorter with spill-to-disk runs.

use std::io::{BufWriter, Write};
use std::path::PathBuf;

use ems_core::{EmsError, ErrorInfo};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempDir};

use crate::merge::{MergeStream, Source};

/// Memory and storage parameters for a [`Sorter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SorterConfig {
    /// Maximum number of records buffered in memory before a run is spilled.
    #[serde(default = "default_max_run_len")]
    pub max_run_len: usize,
    /// Directory for spill files; a process temp directory when absent.
    #[serde(default)]
    pub spill_dir: Option<PathBuf>,
}

fn default_max_run_len() -> usize {
    1 << 20
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            max_run_len: default_max_run_len(),
            spill_dir: None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct SpillRun {
    pub(crate) file: NamedTempFile,
    pub(crate) len: usize,
}

/// Accumulates records and produces a globally sorted, re-streamable run.
///
/// At most `max_run_len` records live in memory at any time; overflow is
/// sorted and written to a bincode-encoded temp file. The record type only
/// needs `Ord` plus serde support.
pub struct Sorter<T> {
    config: SorterConfig,
    buffer: Vec<T>,
    runs: Vec<SpillRun>,
    spill_dir: Option<TempDir>,
    len: usize,
}

impl<T: Ord + Serialize> Sorter<T> {
    /// Creates an empty sorter with the given configuration.
    pub fn new(config: &SorterConfig) -> Self {
        Self {
            config: config.clone(),
            buffer: Vec::new(),
            runs: Vec::new(),
            spill_dir: None,
            len: 0,
        }
    }

    /// Adds one record, spilling a sorted run when the buffer is full.
    pub fn push(&mut self, item: T) -> Result<(), EmsError> {
        self.buffer.push(item);
        self.len += 1;
        if self.buffer.len() >= self.config.max_run_len.max(1) {
            self.spill()?;
        }
        Ok(())
    }

    /// Number of records pushed so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no record has been pushed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn spill(&mut self) -> Result<(), EmsError> {
        self.buffer.sort_unstable();
        if self.spill_dir.is_none() {
            let dir = match &self.config.spill_dir {
                Some(path) => tempfile::tempdir_in(path),
                None => tempfile::tempdir(),
            }
            .map_err(|err| sort_error("spill-dir", err.to_string()))?;
            self.spill_dir = Some(dir);
        }
        let Some(dir) = self.spill_dir.as_ref() else {
            return Err(sort_error("spill-dir", "spill directory unavailable"));
        };
        let file = NamedTempFile::new_in(dir.path())
            .map_err(|err| sort_error("spill-create", err.to_string()))?;
        {
            let mut writer = BufWriter::new(file.as_file());
            for item in &self.buffer {
                bincode::serialize_into(&mut writer, item)
                    .map_err(|err| sort_error("spill-encode", err.to_string()))?;
            }
            writer
                .flush()
                .map_err(|err| sort_error("spill-flush", err.to_string()))?;
        }
        self.runs.push(SpillRun {
            file,
            len: self.buffer.len(),
        });
        self.buffer.clear();
        Ok(())
    }

    /// Finalizes the sorter; no further pushes are possible afterwards.
    pub fn finalize(mut self) -> Result<SortedRun<T>, EmsError> {
        self.buffer.sort_unstable();
        Ok(SortedRun {
            tail: self.buffer,
            runs: self.runs,
            len: self.len,
            _spill_dir: self.spill_dir,
        })
    }
}

/// A finalized, globally sorted record sequence.
///
/// The run can be streamed any number of times; each [`SortedRun::stream`]
/// call opens fresh cursors over the spill files, which is how pipeline phases
/// replay the same stream (the executor re-reads the dependency chain seeds
/// the conflict phase already consumed).
#[derive(Debug)]
pub struct SortedRun<T> {
    pub(crate) tail: Vec<T>,
    pub(crate) runs: Vec<SpillRun>,
    pub(crate) len: usize,
    _spill_dir: Option<TempDir>,
}

impl<T: Ord + Clone + DeserializeOwned> SortedRun<T> {
    /// Opens a forward-only merge cursor positioned before the first record.
    pub fn stream(&self) -> Result<MergeStream<'_, T>, EmsError> {
        let mut sources = Vec::with_capacity(self.runs.len() + 1);
        for run in &self.runs {
            let file = run
                .file
                .reopen()
                .map_err(|err| sort_error("spill-reopen", err.to_string()))?;
            sources.push(Source::spill(file, run.len));
        }
        sources.push(Source::tail(&self.tail));
        MergeStream::new(sources)
    }

    /// Total number of records in the run.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the run holds no records.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

pub(crate) fn sort_error(code: &str, message: impl Into<String>) -> EmsError {
    EmsError::Sort(ErrorInfo::new(code, message))
}
