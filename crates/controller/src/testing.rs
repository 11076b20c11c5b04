//! In-memory stand-ins for the hardware seams.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::Instant;

use crate::hal::{Board, ClockSource, LogStorage, Timestamp};
use crate::indicator::Status;
use crate::timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoardCall {
    Relay { plot: usize, open: bool },
    Status(Status),
    CloseAll,
}

/// Scripted board.  Each channel replays its raw sequence and then sticks on
/// the last value; unscripted channels read 0.
pub(crate) struct FakeBoard {
    raw: HashMap<u8, Vec<u16>>,
    reads: HashMap<u8, usize>,
    failing: Vec<u8>,
    pub humidity: f32,
    pub temperature: f32,
    pub calls: Vec<(Instant, BoardCall)>,
    open: Vec<usize>,
}

impl FakeBoard {
    pub fn new() -> Self {
        Self {
            raw: HashMap::new(),
            reads: HashMap::new(),
            failing: Vec::new(),
            humidity: 55.0,
            temperature: 21.0,
            calls: Vec::new(),
            open: Vec::new(),
        }
    }

    pub fn with_raw(mut self, channel: u8, values: Vec<u16>) -> Self {
        self.raw.insert(channel, values);
        self
    }

    pub fn with_climate(mut self, temperature: f32, humidity: f32) -> Self {
        self.temperature = temperature;
        self.humidity = humidity;
        self
    }

    pub fn with_failing_channel(mut self, channel: u8) -> Self {
        self.failing.push(channel);
        self
    }

    /// Last colour shown.
    pub fn status(&self) -> Option<Status> {
        self.calls.iter().rev().find_map(|(_, c)| match c {
            BoardCall::Status(s) => Some(*s),
            _ => None,
        })
    }

    pub fn relay_calls(&self) -> Vec<BoardCall> {
        self.calls
            .iter()
            .filter(|(_, c)| matches!(c, BoardCall::Relay { .. }))
            .map(|(_, c)| *c)
            .collect()
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.calls
            .iter()
            .filter_map(|(_, c)| match c {
                BoardCall::Status(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn any_relay_open(&self) -> bool {
        !self.open.is_empty()
    }

    /// (plot, opened at, closed at) for every completed valve opening.
    pub fn openings(&self) -> Vec<(usize, Instant, Instant)> {
        let mut started: HashMap<usize, Instant> = HashMap::new();
        let mut out = Vec::new();
        for (at, call) in &self.calls {
            if let BoardCall::Relay { plot, open } = call {
                if *open {
                    started.insert(*plot, *at);
                } else if let Some(from) = started.remove(plot) {
                    out.push((*plot, from, *at));
                }
            }
        }
        out
    }

    fn record(&mut self, call: BoardCall) {
        self.calls.push((Instant::now(), call));
    }
}

impl Board for FakeBoard {
    fn read_channel(&mut self, channel: u8) -> Result<u16> {
        if self.failing.contains(&channel) {
            bail!("channel {channel} did not answer");
        }
        let n = self.reads.entry(channel).or_insert(0);
        let value = self
            .raw
            .get(&channel)
            .and_then(|seq| seq.get(*n).or(seq.last()))
            .copied()
            .unwrap_or(0);
        *n += 1;
        Ok(value)
    }

    fn set_relay(&mut self, plot: usize, open: bool) {
        assert!(
            !open || self.open.is_empty() || self.open == [plot],
            "plot {plot} opened while {:?} already open",
            self.open
        );
        self.open.retain(|p| *p != plot);
        if open {
            self.open.push(plot);
        }
        self.record(BoardCall::Relay { plot, open });
    }

    fn set_status(&mut self, status: Status) {
        self.record(BoardCall::Status(status));
    }

    fn read_humidity(&mut self) -> f32 {
        self.humidity
    }

    fn read_temperature(&mut self) -> f32 {
        self.temperature
    }

    fn close_all(&mut self) {
        self.open.clear();
        self.record(BoardCall::CloseAll);
    }
}

/// Records requested holds and returns at once.
#[derive(Debug, Default)]
pub(crate) struct StepTimer {
    pub holds: Vec<Duration>,
}

impl Timer for StepTimer {
    async fn hold(&mut self, duration: Duration) {
        self.holds.push(duration);
    }
}

pub(crate) struct FixedClock {
    now: Timestamp,
    running: bool,
}

impl FixedClock {
    pub fn running(now: Timestamp) -> Self {
        Self { now, running: true }
    }

    pub fn stopped(now: Timestamp) -> Self {
        Self { now, running: false }
    }
}

impl ClockSource for FixedClock {
    fn is_running(&self) -> bool {
        self.running
    }

    fn adjust(&mut self, ts: Timestamp) {
        self.now = ts;
        self.running = true;
    }

    fn now(&self) -> Timestamp {
        self.now
    }
}

/// Lines kept in memory.  `failing` makes every write error out.
#[derive(Debug, Default)]
pub(crate) struct MemoryStorage {
    pub lines: Vec<String>,
    pub failing: bool,
    pub present: bool,
    pub fresh: bool,
}

impl MemoryStorage {
    /// Empty medium: the header is due.
    pub fn fresh() -> Self {
        Self {
            present: true,
            fresh: true,
            ..Default::default()
        }
    }

    /// Medium that already carries records.
    pub fn existing() -> Self {
        Self {
            present: true,
            ..Default::default()
        }
    }

    /// No card inserted.
    pub fn absent() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }
}

impl LogStorage for MemoryStorage {
    fn begin(&mut self) -> Result<()> {
        if !self.present {
            bail!("no medium");
        }
        Ok(())
    }

    fn is_fresh(&self) -> bool {
        self.fresh
    }

    fn append_line(&mut self, line: &str) -> Result<()> {
        if self.failing {
            bail!("write failed");
        }
        self.lines.push(line.to_string());
        Ok(())
    }
}

/// The paused tokio clock advances in whole milliseconds.
#[track_caller]
pub(crate) fn assert_duration_near(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(5),
        "expected ~{expected:?}, got {actual:?}"
    );
}
