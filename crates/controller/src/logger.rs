//! Append-only CSV cycle log.
//!
//! ```text
//! Date Time, temp, RH, e_sat, e, VPD, VWC[1], .., VWC[N], Counter[1], .., Counter[N]
//! 2024/06/01 08:00:00, 23.40, 61.00, 2.88, 1.76, 1.12, 0.41, .., 3, ..,
//! ```
//!
//! The header goes out once, when the medium is found empty at boot.  Rows
//! keep a trailing comma.  Storage trouble never stops the controller: the
//! first failure is reported, later ones are skipped quietly until a write
//! succeeds again.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::environment::EnvironmentSample;
use crate::hal::{LogStorage, Timestamp};
use crate::moisture::SensorReading;

/// Everything recorded about one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LogRecord {
    pub environment: EnvironmentSample,
    pub readings: Vec<SensorReading>,
    pub counters: Vec<u32>,
}

impl LogRecord {
    pub fn timestamp(&self) -> Timestamp {
        self.environment.timestamp
    }
}

pub(crate) fn format_timestamp(ts: &Timestamp) -> String {
    format!(
        "{:04}/{:02}/{:02} {:02}:{:02}:{:02}",
        ts.year(),
        ts.month() as u8,
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second()
    )
}

pub(crate) fn header(plots: usize) -> String {
    let mut fields: Vec<String> = ["Date Time", "temp", "RH", "e_sat", "e", "VPD"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    fields.extend((1..=plots).map(|i| format!("VWC[{i}]")));
    fields.extend((1..=plots).map(|i| format!("Counter[{i}]")));
    fields.join(", ")
}

pub(crate) fn format_row(record: &LogRecord) -> String {
    let env = &record.environment;
    let mut row = format!(
        "{}, {:.2}, {:.2}, {:.2}, {:.2}, {:.2}, ",
        format_timestamp(&record.timestamp()),
        env.temperature,
        env.humidity,
        env.e_sat,
        env.e,
        env.vpd
    );
    for r in &record.readings {
        row.push_str(&format!("{:.2}, ", r.vwc));
    }
    for c in &record.counters {
        row.push_str(&format!("{c}, "));
    }
    // Trailing comma stays, trailing space goes.
    row.pop();
    row
}

pub(crate) struct CsvLogger<S: LogStorage> {
    storage: S,
    plots: usize,
    /// Storage answered `begin`.  Until then every append probes it again.
    probed: bool,
    header_pending: bool,
    faulted: bool,
}

impl<S: LogStorage> CsvLogger<S> {
    pub fn new(storage: S, plots: usize) -> Self {
        Self {
            storage,
            plots,
            probed: false,
            header_pending: false,
            faulted: false,
        }
    }

    /// Probe storage and write the header if it is brand new.  Returns
    /// whether storage is usable.
    pub fn begin(&mut self) -> bool {
        match self.storage.begin() {
            Ok(()) => {
                info!("storage initialized");
                self.probed = true;
                self.header_pending = self.storage.is_fresh();
                if self.header_pending {
                    self.write_header();
                }
                true
            }
            Err(e) => {
                warn!("*******************************************");
                warn!("       storage failed, or not present      ");
                warn!("     WARNING: NO DATA WILL BE COLLECTED!   ");
                warn!("cause: {e:#}");
                warn!("*******************************************");
                self.faulted = true;
                false
            }
        }
    }

    /// Append one row.  Returns whether it reached storage.
    pub fn append(&mut self, record: &LogRecord) -> bool {
        if !self.probed {
            if self.storage.begin().is_err() {
                return false;
            }
            info!("storage inserted after boot");
            self.probed = true;
            self.header_pending = self.storage.is_fresh();
        }
        if self.header_pending && !self.write_header() {
            return false;
        }
        let row = format_row(record);
        self.write(&row)
    }

    #[cfg(test)]
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    #[cfg(test)]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn write_header(&mut self) -> bool {
        let line = header(self.plots);
        if self.write(&line) {
            self.header_pending = false;
            true
        } else {
            false
        }
    }

    fn write(&mut self, line: &str) -> bool {
        match self.storage.append_line(line) {
            Ok(()) => {
                if self.faulted {
                    info!("storage available again");
                }
                self.faulted = false;
                true
            }
            Err(e) => {
                if !self.faulted {
                    warn!("error writing log, logging skipped until storage recovers: {e:#}");
                }
                self.faulted = true;
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// File storage
// ---------------------------------------------------------------------------

/// Log file on a mounted filesystem (SD card, USB stick).  Opened per write
/// so a card swapped between cycles is picked up again.
pub(crate) struct FileStorage {
    path: PathBuf,
    fresh: bool,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fresh: false,
        }
    }

    fn open(&self) -> Result<std::fs::File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open log file {}", self.path.display()))
    }
}

impl LogStorage for FileStorage {
    fn begin(&mut self) -> Result<()> {
        let file = self.open()?;
        let len = file
            .metadata()
            .with_context(|| format!("failed to stat {}", self.path.display()))?
            .len();
        self.fresh = len == 0;
        Ok(())
    }

    fn is_fresh(&self) -> bool {
        self.fresh
    }

    fn append_line(&mut self, line: &str) -> Result<()> {
        let mut file = self.open()?;
        writeln!(file, "{line}")
            .and_then(|_| file.flush())
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
