//! Run summaries exported as JSON for CI artifacts.

use anyhow::Result;
use couchette_scripting::{TickReport, World};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Summary of one headless run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run identifier.
    pub name: String,
    /// When the report was built (RFC 3339).
    pub timestamp: String,
    /// World seed.
    pub seed: u64,
    /// Overall outcome.
    pub result: RunResult,
    /// Dispatch counters.
    pub dispatch: DispatchMetrics,
    /// Save file written at the end of the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence: Option<PersistenceMetrics>,
}

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunResult {
    /// No fault had to be recovered.
    Clean,
    /// At least one actor was reset after a fault.
    Recovered,
}

/// Dispatch counters accumulated over the tick loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchMetrics {
    /// Ticks run.
    pub ticks: u64,
    /// Ticks held back by a cut-scene.
    pub halted_ticks: u64,
    /// Messages whose routine ran.
    pub delivered: usize,
    /// Messages without a live recipient.
    pub dropped: usize,
    /// Letters absorbed by subscriptions.
    pub absorbed: usize,
    /// Faults recovered.
    pub recovered: usize,
    /// Deepest call stack seen at the end of a tick.
    pub max_depth: u8,
    /// Live actors at the end of the run.
    pub live_actors: usize,
}

impl DispatchMetrics {
    /// Fold one tick into the counters.
    pub fn record(&mut self, report: &TickReport, world: &World) {
        self.ticks += 1;
        self.halted_ticks += u64::from(report.halted);
        self.delivered += report.delivered;
        self.dropped += report.dropped;
        self.absorbed += report.absorbed;
        self.recovered += report.recovered;
        let deepest = world.actors().map(|a| a.depth()).max().unwrap_or(0);
        self.max_depth = self.max_depth.max(deepest);
        self.live_actors = world.actors().filter(|a| a.is_live()).count();
    }
}

/// Size of the save written by a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceMetrics {
    /// Where the save went.
    pub path: PathBuf,
    /// Bytes on disk.
    pub bytes: usize,
    /// Actors in the save.
    pub actors: usize,
}

impl RunReport {
    /// Build a report stamped with the current time.
    pub fn new(name: impl Into<String>, seed: u64, dispatch: DispatchMetrics) -> Self {
        let result = if dispatch.recovered == 0 {
            RunResult::Clean
        } else {
            RunResult::Recovered
        };
        Self {
            name: name.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            seed,
            result,
            dispatch,
            persistence: None,
        }
    }

    /// Attach save metrics.
    pub fn with_persistence(mut self, metrics: PersistenceMetrics) -> Self {
        self.persistence = Some(metrics);
        self
    }
}

/// Sink for writing run reports to JSON files.
pub struct ReportSink {
    path: PathBuf,
}

impl ReportSink {
    /// Create a sink at `path`, creating parent directories if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Write the report as pretty JSON.
    pub fn write(&self, report: &RunReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        debug!(path = %self.path.display(), "run report written");
        Ok(())
    }
}
