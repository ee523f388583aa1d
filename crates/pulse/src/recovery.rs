// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Fallback for batches the store could not take.
//!
//! When an insert fails, the flusher hands the whole batch and the error to an
//! [`ErrorHandler`]. The default one, [`BackupHandler`], appends every record
//! to a per-category file so Beats and Hits can be replayed separately.

use chrono::Utc;
use std::fmt::{Display, Write as _};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::error;

use crate::constants::{BACKUP_FILE_EXTENSION, ERROR_LEVEL, TIME_FORMAT};
use crate::error::{PulseError, StoreError};
use crate::record::{Batch, Beat, Category};

/// Receives batches that could not be stored.
///
/// Called once per failed batch, possibly from several flushes at the same
/// time. Any `Fn(Option<&StoreError>, Batch)` closure is a handler.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: Option<&StoreError>, batch: Batch);
}

impl<F> ErrorHandler for F
where
    F: Fn(Option<&StoreError>, Batch) + Send + Sync,
{
    fn handle(&self, error: Option<&StoreError>, batch: Batch) {
        self(error, batch);
    }
}

/// Default [`ErrorHandler`] writing records to `pulse_beats.log` and
/// `pulse_hits.log` in a backup directory.
#[derive(Debug)]
pub struct BackupHandler {
    beats: Mutex<File>,
    hits: Mutex<File>,
}

impl BackupHandler {
    /// Creates `dir` if needed and opens both backup files for appending.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, PulseError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            PulseError::ConfigInvalid(format!(
                "failed to create backup directory {}: {e}",
                dir.display()
            ))
        })?;

        Ok(Self {
            beats: Mutex::new(open_backup(dir, Category::Beats)?),
            hits: Mutex::new(open_backup(dir, Category::Hits)?),
        })
    }

    /// Path of the backup file for `category` inside `dir`.
    pub fn path(dir: impl AsRef<Path>, category: Category) -> PathBuf {
        dir.as_ref()
            .join(category.collection())
            .with_extension(BACKUP_FILE_EXTENSION)
    }

    fn file(&self, category: Category) -> &Mutex<File> {
        match category {
            Category::Beats => &self.beats,
            Category::Hits => &self.hits,
        }
    }
}

fn open_backup(dir: &Path, category: Category) -> Result<File, PulseError> {
    let path = BackupHandler::path(dir, category);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| {
            PulseError::ConfigInvalid(format!(
                "failed to open backup file {}: {e}",
                path.display()
            ))
        })
}

/// Writes `records` one per line with a single write so concurrent handlers
/// never interleave inside a batch.
fn append<R: Display>(file: &Mutex<File>, records: &[R]) -> io::Result<()> {
    let mut lines = String::new();
    for record in records {
        // Writing into a String cannot fail
        let _ = writeln!(lines, "{record}");
    }

    #[allow(clippy::expect_used)]
    let mut file = file.lock().expect("lock poisoned");
    file.write_all(lines.as_bytes())
}

impl ErrorHandler for BackupHandler {
    fn handle(&self, error: Option<&StoreError>, batch: Batch) {
        let now = Utc::now();
        let category = batch.category();
        let count = batch.len();

        let written = match &batch {
            Batch::Beats(beats) => append(self.file(category), beats),
            Batch::Hits(hits) => append(self.file(category), hits),
        };
        if let Err(e) = written {
            error!("PULSE | Failed to back up {count} {category}: {e}");
        }

        if let Some(err) = error {
            error!("PULSE | {} {err}", now.format(TIME_FORMAT));
            let beat = Beat::new(now, ERROR_LEVEL, err.to_string());
            if let Err(e) = append(&self.beats, &[beat]) {
                error!("PULSE | Failed to back up flush error: {e}");
            }
        }
    }
}
