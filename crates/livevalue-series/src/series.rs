//! File-backed time series bound to one hub

use crate::tail::TailBuffer;
use crate::{Error, Result};
use livevalue_core::names;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};

/// Append-only log of formatted snapshots for a single hub
///
/// The file is `<dir>/<hub local id>`, one snapshot per line. Every write is
/// flushed before returning. If the file cannot be opened the failure is
/// logged and the series degrades to a no-op: writes are dropped and history
/// reads come back empty.
#[derive(Debug)]
pub struct TimeSeries {
    hub_name: String,
    id: String,
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl TimeSeries {
    /// Bind a series to `hub_name` under `dir`
    ///
    /// Fails with [`Error::IllegalHubName`] when the name is not in the hub
    /// namespace or its id could escape `dir` (see
    /// [`names::hub_local_id`]). IO failures do not fail construction.
    pub fn open(dir: impl AsRef<Path>, hub_name: &str) -> Result<Self> {
        let id = names::hub_local_id(hub_name)
            .ok_or_else(|| Error::IllegalHubName(hub_name.to_string()))?
            .to_string();
        let dir = dir.as_ref();
        let path = dir.join(&id);

        let writer = match Self::open_writer(dir, &path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                tracing::error!(
                    path = %path.display(),
                    error = %e,
                    "can't open time series storage"
                );
                None
            }
        };

        Ok(Self {
            hub_name: hub_name.to_string(),
            id,
            path,
            writer: Mutex::new(writer),
        })
    }

    fn open_writer(dir: &Path, path: &Path) -> Result<File> {
        std::fs::create_dir_all(dir)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(file)
    }

    /// Full name of the hub this series belongs to
    pub fn hub_name(&self) -> &str {
        &self.hub_name
    }

    /// Local id of the hub, also the file name
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether writes reach disk
    pub fn is_writable(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Append one line and flush it
    pub fn write(&self, line: &str) {
        let mut writer = self.writer.lock();
        let Some(w) = writer.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(w, "{}", line).and_then(|_| w.flush()) {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "time series write failed"
            );
        }
    }

    /// Lazily iterate over every stored line, oldest first
    ///
    /// Each call opens the file afresh, so the iterator sees every line
    /// written before the call.
    pub fn history(&self) -> History {
        if let Some(w) = self.writer.lock().as_mut() {
            let _ = w.flush();
        }
        match File::open(&self.path) {
            Ok(file) => History {
                lines: Some(BufReader::new(file).lines()),
            },
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "can't read time series"
                );
                History { lines: None }
            }
        }
    }

    /// The last `limit` lines in file order; `0` returns the whole history
    pub fn tail(&self, limit: usize) -> Vec<String> {
        if limit == 0 {
            return self.history().collect();
        }
        let mut buffer = TailBuffer::new(limit);
        buffer.extend(self.history());
        buffer.into_vec()
    }
}

/// Iterator over the lines of a time series file
///
/// A read error ends the iteration after being logged.
#[derive(Debug)]
pub struct History {
    lines: Option<Lines<BufReader<File>>>,
}

impl Iterator for History {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let lines = self.lines.as_mut()?;
        match lines.next()? {
            Ok(line) => Some(line),
            Err(e) => {
                tracing::error!(error = %e, "time series read failed");
                self.lines = None;
                None
            }
        }
    }
}
