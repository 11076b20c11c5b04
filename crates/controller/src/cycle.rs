//! The control loop.
//!
//! One cycle: guard the duty-cycle ratio, sample the air, check every probe,
//! decide plot by plot, log.  Then rest until the next cycle is due.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::clock::{self, ClockStatus};
use crate::config::{Config, Timing, DUTY_CYCLE_FACTOR};
use crate::decision::{self, Decision, Plot};
use crate::environment::EnvironmentSample;
use crate::hal::{Board, ClockSource, LogStorage, Timestamp};
use crate::indicator::{self, Status};
use crate::logger::{format_timestamp, CsvLogger, LogRecord};
use crate::moisture::{Calibration, SensorReading};
use crate::timer::Timer;

/// Minimum wait before retrying an aborted cycle.
const ABORT_RETRY_FLOOR: Duration = Duration::from_secs(1);

/// RunTime too short for the number of plots.  The cycle is dropped before
/// any hardware is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConfigurationError {
    pub run_time: Duration,
    pub required: Duration,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run time {}s is below {} x plots x irrigation time ({}s), cycle skipped",
            self.run_time.as_secs(),
            DUTY_CYCLE_FACTOR,
            self.required.as_secs()
        )
    }
}

impl std::error::Error for ConfigurationError {}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CycleReport {
    pub environment: EnvironmentSample,
    pub readings: Vec<SensorReading>,
    pub decisions: Vec<Decision>,
    pub counters: Vec<u32>,
    /// Indicator colour at cycle end (last probe checked).
    pub status: Status,
    /// Whether the row reached storage.
    pub logged: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CycleOutcome {
    Completed(CycleReport),
    Aborted(ConfigurationError),
}

pub(crate) struct Controller<B, C, S: LogStorage, T> {
    timing: Timing,
    calibration: Calibration,
    plots: Vec<Plot>,
    board: B,
    clock: C,
    logger: CsvLogger<S>,
    timer: T,
}

impl<B, C, S, T> Controller<B, C, S, T>
where
    B: Board,
    C: ClockSource,
    S: LogStorage,
    T: Timer,
{
    pub fn new(
        timing: Timing,
        calibration: Calibration,
        plots: Vec<Plot>,
        board: B,
        clock: C,
        storage: S,
        timer: T,
    ) -> Self {
        let logger = CsvLogger::new(storage, plots.len());
        Self {
            timing,
            calibration,
            plots,
            board,
            clock,
            logger,
            timer,
        }
    }

    pub fn from_config(cfg: &Config, board: B, clock: C, storage: S, timer: T) -> Self {
        let plots = cfg
            .plots
            .iter()
            .enumerate()
            .map(|(i, p)| Plot::new(i + 1, p.channel, p.threshold))
            .collect();
        Self::new(
            Timing::from_config(cfg),
            cfg.calibration,
            plots,
            board,
            clock,
            storage,
            timer,
        )
    }

    /// Relays closed, clock checked, storage probed.
    pub fn boot(&mut self, build: Timestamp) -> ClockStatus {
        self.board.close_all();
        let status = clock::ensure_running(&mut self.clock, build);
        self.logger.begin();

        let n = self.plots.len();
        info!(
            plots = n,
            irrig_time_sec = self.timing.irrig_time.as_secs(),
            run_time_sec = self.timing.run_time.as_secs(),
            rest_sec = self.timing.rest_period(n).as_secs_f32(),
            "controller ready"
        );
        for p in &self.plots {
            debug!(plot = p.id, channel = p.channel, threshold = p.threshold(), "plot");
        }
        status
    }

    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let n = self.plots.len();
        if !self.timing.duty_cycle_ok(n) {
            let err = ConfigurationError {
                run_time: self.timing.run_time,
                required: self.timing.required_run_time(n).unwrap_or(Duration::MAX),
            };
            warn!("{err}");
            return CycleOutcome::Aborted(err);
        }

        let environment = self.sample_environment();

        self.board.set_status(Status::Nominal);
        let mut status = Status::Nominal;
        let mut readings = Vec::with_capacity(n);
        for plot in &self.plots {
            let reading = match self.board.read_channel(plot.channel) {
                Ok(raw) => self.calibration.read(plot.id, raw),
                Err(e) => {
                    warn!(plot = plot.id, channel = plot.channel, "probe read failed: {e:#}");
                    // A silent probe is a fault whatever 0 happens to convert to.
                    SensorReading {
                        valid: false,
                        ..self.calibration.read(plot.id, 0)
                    }
                }
            };
            status = indicator::signal(&mut self.board, &reading);
            readings.push(reading);
        }

        let mut decisions = Vec::with_capacity(n);
        for (plot, reading) in self.plots.iter_mut().zip(&readings) {
            let d = decision::decide(
                &mut self.board,
                &mut self.timer,
                plot,
                reading.vwc,
                self.timing.irrig_time,
            )
            .await;
            decisions.push(d);
        }

        let record = LogRecord {
            environment,
            readings,
            counters: self.counters(),
        };
        print_summary(&record);
        let logged = self.logger.append(&record);

        CycleOutcome::Completed(CycleReport {
            environment: record.environment,
            readings: record.readings,
            decisions,
            counters: record.counters,
            status,
            logged,
        })
    }

    /// Cycle, rest, repeat.  Only returns by being dropped.
    pub async fn run_forever(&mut self) {
        let n = self.plots.len();
        loop {
            let wait = match self.run_cycle().await {
                CycleOutcome::Completed(report) => {
                    debug!(
                        irrigated = report
                            .decisions
                            .iter()
                            .filter(|d| **d == Decision::Irrigated)
                            .count(),
                        faults = report.readings.iter().filter(|r| !r.valid).count(),
                        air_ok = report.environment.is_valid(),
                        counters = ?report.counters,
                        status = ?report.status,
                        logged = report.logged,
                        "cycle complete"
                    );
                    self.timing.rest_period(n)
                }
                CycleOutcome::Aborted(_) => self.timing.run_time.max(ABORT_RETRY_FLOOR),
            };
            debug!(secs = wait.as_secs_f32(), "resting");
            self.timer.hold(wait).await;
        }
    }

    /// Cycle until `stop` resolves, then close every valve.  The valves are
    /// closed before a failed `stop` is reported.
    pub async fn run_until<F>(&mut self, stop: F) -> anyhow::Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let signal = tokio::select! {
            _ = self.run_forever() => Ok(()),
            res = stop => res,
        };
        if signal.is_ok() {
            info!("shutdown requested");
        }
        self.shutdown();
        signal.context("failed to listen for shutdown signal")
    }

    /// Leave every valve closed.
    pub fn shutdown(&mut self) {
        self.board.close_all();
        info!(counters = ?self.counters(), "all relays closed, controller stopped");
    }

    pub fn counters(&self) -> Vec<u32> {
        self.plots.iter().map(Plot::counter).collect()
    }

    fn sample_environment(&mut self) -> EnvironmentSample {
        let timestamp = self.clock.now();
        let humidity = self.board.read_humidity();
        let temperature = self.board.read_temperature();
        let sample = EnvironmentSample::derive(timestamp, temperature, humidity);
        if !sample.is_valid() {
            warn!("failed to read from humidity sensor");
        }
        sample
    }
}

fn print_summary(record: &LogRecord) {
    let env = &record.environment;
    info!("{}", format_timestamp(&env.timestamp));
    info!(
        "humidity: {:.2} %  temperature: {:.2} *C  e_sat: {:.2} kPa  e: {:.2} kPa  VPD: {:.2} kPa",
        env.humidity, env.temperature, env.e_sat, env.e, env.vpd
    );
    for (r, count) in record.readings.iter().zip(&record.counters) {
        info!("VWC[{}]: {:.2}  counter[{}]: {}", r.plot, r.vwc, r.plot, count);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
