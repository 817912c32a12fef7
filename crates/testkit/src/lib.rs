#![warn(missing_docs)]
//! Deterministic testing surfaces: journal sinks, world snapshots, run
//! reports and a tick-stepping harness.

mod report;
mod snapshot;
mod worldtest;

use anyhow::{Context, Result};
use couchette_scripting::JournalEntry;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub use report::*;
pub use snapshot::*;
pub use worldtest::*;

/// A sink that writes newline-delimited JSON to disk.
pub struct JsonlSink {
    file: BufWriter<File>,
    written: usize,
}

impl JsonlSink {
    /// Create a new sink at `path`, creating parent directories if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create journal {}", path.display()))?;
        Ok(Self {
            file: BufWriter::new(file),
            written: 0,
        })
    }

    /// Append one record as a JSON line.
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.file, record)?;
        self.file.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// Append every journal entry in order.
    pub fn write_journal<'a, I>(&mut self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a JournalEntry>,
    {
        let before = self.written;
        for entry in entries {
            self.write(entry)?;
        }
        Ok(self.written - before)
    }

    /// Lines written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush buffered lines to disk.
    pub fn finish(mut self) -> Result<()> {
        self.file.flush()?;
        tracing::debug!(lines = self.written, "journal sink flushed");
        Ok(())
    }
}
