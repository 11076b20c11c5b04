//! Controller configuration: compiled-in defaults, an optional TOML file that
//! overrides them, and validation.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use irrigation_sensors::adc;

use crate::moisture::Calibration;

/// RunTime must be at least this many times the decision phase.
pub(crate) const DUTY_CYCLE_FACTOR: u32 = 15;

// ---------------------------------------------------------------------------
// Compiled-in set points
// ---------------------------------------------------------------------------

/// Valve open time per irrigation event (s).
const IRRIG_TIME_SEC: u64 = 30;

/// Full cycle period (s).  One cycle every 30 min.
const RUN_TIME_SEC: u64 = 1800;

/// Estimated time spent sampling, printing and logging (ms), excluding the
/// irrigation holds.  Subtracted from the rest period.
const OVERHEAD_MS: u64 = 785;

/// Default VWC trigger (m3/m3).
const THRESHOLD: f32 = 0.4;

/// Relay driver lines for plots 1..=4 (BCM numbering).
const RELAY_GPIO: [u8; 4] = [5, 6, 13, 19];

const GREEN_LED_GPIO: u8 = 20;
const RED_LED_GPIO: u8 = 21;

const LOG_PATH: &str = "log.txt";

/// Probe inputs addressable on a full ADS1115 bank.
const MAX_CHANNELS: u8 = adc::INPUTS_PER_CHIP * adc::MAX_CHIPS;

/// BCM GPIO pins available on the Raspberry Pi 40-pin header for general
/// use. GPIO 0-1 are reserved for the ID EEPROM and must never be used.
/// GPIO 2-3 carry the I2C bus the soil ADCs sit on.
const VALID_GPIO_PINS: &[u8] = &[
    4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
];

// ---------------------------------------------------------------------------
// Config structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub irrig_time_sec: u64,
    pub run_time_sec: u64,
    pub overhead_ms: u64,
    pub calibration: Calibration,
    pub status_led: LedEntry,
    pub log_path: String,
    pub plots: Vec<PlotEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PlotEntry {
    pub threshold: f32,
    pub channel: u8,
    pub relay_gpio: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub(crate) struct LedEntry {
    pub green_gpio: u8,
    pub red_gpio: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            irrig_time_sec: IRRIG_TIME_SEC,
            run_time_sec: RUN_TIME_SEC,
            overhead_ms: OVERHEAD_MS,
            calibration: Calibration::default(),
            status_led: LedEntry::default(),
            log_path: LOG_PATH.to_string(),
            plots: RELAY_GPIO
                .iter()
                .enumerate()
                .map(|(i, &relay_gpio)| PlotEntry {
                    threshold: THRESHOLD,
                    channel: i as u8,
                    relay_gpio,
                })
                .collect(),
        }
    }
}

impl Default for LedEntry {
    fn default() -> Self {
        Self {
            green_gpio: GREEN_LED_GPIO,
            red_gpio: RED_LED_GPIO,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived timing
// ---------------------------------------------------------------------------

impl Config {
    pub fn plot_count(&self) -> usize {
        self.plots.len()
    }

    pub fn irrig_time(&self) -> Duration {
        Duration::from_secs(self.irrig_time_sec)
    }

    pub fn run_time(&self) -> Duration {
        Duration::from_secs(self.run_time_sec)
    }

    pub fn overhead(&self) -> Duration {
        Duration::from_millis(self.overhead_ms)
    }
}

/// Cycle timing derived from the configuration.  Kept separate so the
/// control loop can carry it without the rest of the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timing {
    pub irrig_time: Duration,
    pub run_time: Duration,
    pub overhead: Duration,
}

impl Timing {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            irrig_time: cfg.irrig_time(),
            run_time: cfg.run_time(),
            overhead: cfg.overhead(),
        }
    }

    /// Time spent holding valves (or pretending to) in one cycle.  Saturates
    /// at `Duration::MAX`.
    pub fn decision_phase(&self, plots: usize) -> Duration {
        u32::try_from(plots)
            .ok()
            .and_then(|n| self.irrig_time.checked_mul(n))
            .unwrap_or(Duration::MAX)
    }

    /// Smallest RunTime that keeps the duty-cycle margin, `None` when it
    /// does not fit in a `Duration`.
    pub fn required_run_time(&self, plots: usize) -> Option<Duration> {
        u32::try_from(plots)
            .ok()
            .and_then(|n| self.irrig_time.checked_mul(n))
            .and_then(|d| d.checked_mul(DUTY_CYCLE_FACTOR))
    }

    pub fn duty_cycle_ok(&self, plots: usize) -> bool {
        self.required_run_time(plots)
            .is_some_and(|required| self.run_time >= required)
    }

    /// Sleep after a completed cycle: RunTime − N·IrrigTime − overhead,
    /// never negative.
    pub fn rest_period(&self, plots: usize) -> Duration {
        self.run_time
            .saturating_sub(self.decision_phase(plots))
            .saturating_sub(self.overhead)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all config entries. Returns `Ok(())` or an error describing
    /// every violation found (not just the first one).
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_timing(&mut errors);
        self.validate_calibration(&mut errors);
        self.validate_plots(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_timing(&self, errors: &mut Vec<String>) {
        if self.irrig_time_sec == 0 {
            errors.push("irrig_time_sec must be positive".to_string());
        }
        if self.run_time_sec == 0 {
            errors.push("run_time_sec must be positive".to_string());
        }

        let timing = Timing::from_config(self);
        let n = self.plot_count();
        if n > 0 && self.irrig_time_sec > 0 && !timing.duty_cycle_ok(n) {
            match timing.required_run_time(n) {
                Some(required) => errors.push(format!(
                    "run_time_sec ({}) must be at least {DUTY_CYCLE_FACTOR} x {n} plots x irrig_time_sec ({}) = {}",
                    self.run_time_sec,
                    self.irrig_time_sec,
                    required.as_secs()
                )),
                None => errors.push(format!(
                    "irrig_time_sec ({}) is too large: {DUTY_CYCLE_FACTOR} x {n} plots x irrig_time_sec overflows",
                    self.irrig_time_sec
                )),
            }
        }
    }

    fn validate_calibration(&self, errors: &mut Vec<String>) {
        let c = &self.calibration;
        if !(c.vref.is_finite() && c.vref > 0.0) {
            errors.push(format!("calibration.vref must be positive, got {}", c.vref));
        }
        if c.adc_max == 0 {
            errors.push("calibration.adc_max must be positive".to_string());
        }
        if !c.slope.is_finite() || c.slope == 0.0 {
            errors.push(format!("calibration.slope must be finite and non-zero, got {}", c.slope));
        }
        if !c.intercept.is_finite() {
            errors.push(format!("calibration.intercept must be finite, got {}", c.intercept));
        }
        if !(c.valid_min < c.valid_max) {
            errors.push(format!(
                "calibration.valid_min ({}) must be below valid_max ({})",
                c.valid_min, c.valid_max
            ));
        }
    }

    fn validate_plots(&self, errors: &mut Vec<String>) {
        if self.plots.is_empty() {
            errors.push("at least one plot is required".to_string());
        }

        let mut seen_channels: HashSet<u8> = HashSet::new();
        let mut seen_pins: HashSet<u8> = HashSet::new();
        let leds = [self.status_led.green_gpio, self.status_led.red_gpio];

        for (i, p) in self.plots.iter().enumerate() {
            let ctx = format!("plot {}", i + 1);

            if !(0.0..=1.0).contains(&p.threshold) {
                errors.push(format!(
                    "{ctx}: threshold {} out of range [0.0, 1.0]",
                    p.threshold
                ));
            }

            if p.channel >= MAX_CHANNELS {
                errors.push(format!(
                    "{ctx}: channel {} out of range (bank has {MAX_CHANNELS} inputs)",
                    p.channel
                ));
            }

            if !seen_channels.insert(p.channel) {
                errors.push(format!(
                    "{ctx}: channel {} is already used by another plot",
                    p.channel
                ));
            }

            if !VALID_GPIO_PINS.contains(&p.relay_gpio) {
                errors.push(format!(
                    "{ctx}: relay_gpio {} is not a valid BCM GPIO pin (allowed: 4-27)",
                    p.relay_gpio
                ));
            } else if leds.contains(&p.relay_gpio) || !seen_pins.insert(p.relay_gpio) {
                errors.push(format!(
                    "{ctx}: relay_gpio {} is already in use",
                    p.relay_gpio
                ));
            }
        }

        for (name, pin) in [("green_gpio", leds[0]), ("red_gpio", leds[1])] {
            if !VALID_GPIO_PINS.contains(&pin) {
                errors.push(format!(
                    "status_led.{name} {pin} is not a valid BCM GPIO pin (allowed: 4-27)"
                ));
            }
        }
        if leds[0] == leds[1] {
            errors.push("status_led: green_gpio and red_gpio must differ".to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.  A missing file means "run
/// with the compiled-in set points", which are validated the same way.
pub fn load(path: &str) -> Result<Config> {
    let config = if Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?
    } else {
        tracing::info!(path, "no config file, using compiled-in set points");
        Config::default()
    };

    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;

    tracing::info!(
        plots = config.plot_count(),
        irrig_time_sec = config.irrig_time_sec,
        run_time_sec = config.run_time_sec,
        "config loaded"
    );

    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn plot(channel: u8, relay_gpio: u8) -> PlotEntry {
        PlotEntry {
            threshold: 0.4,
            channel,
            relay_gpio,
        }
    }

    /// Assert validation fails and the error message contains `needle`.
    fn assert_validation_err(cfg: &Config, needle: &str) {
        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        assert!(
            msg.contains(needle),
            "expected error containing {needle:?}, got: {msg}"
        );
    }

    // -- Defaults ---------------------------------------------------------

    #[test]
    fn defaults_pass_validation() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn defaults_sit_exactly_on_duty_cycle_limit() {
        let cfg = Config::default();
        let timing = Timing::from_config(&cfg);
        assert_eq!(timing.required_run_time(cfg.plot_count()), Some(cfg.run_time()));
    }

    // -- Parsing ----------------------------------------------------------

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
irrig_time_sec = 10
run_time_sec = 600
overhead_ms = 500
log_path = "/mnt/sd/log.txt"

[calibration]
vref = 4.096
adc_max = 32767
slope = 1.1785
intercept = -0.4938

[status_led]
green_gpio = 8
red_gpio = 9

[[plots]]
threshold = 0.35
channel = 0
relay_gpio = 22

[[plots]]
threshold = 0.45
channel = 1
relay_gpio = 23
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.plot_count(), 2);
        assert_eq!(cfg.irrig_time(), Duration::from_secs(10));
        assert_eq!(cfg.calibration.adc_max, 32767);
        // Unset calibration fields keep their defaults.
        assert_eq!(cfg.calibration.valid_max, 0.8);
        assert_eq!(cfg.plots[1].relay_gpio, 23);
        cfg.validate().unwrap();
    }

    #[test]
    fn parse_empty_config_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.plot_count(), 4);
        assert_eq!(cfg.run_time_sec, 1800);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let cfg = load("/nonexistent/irrigation.toml").unwrap();
        assert_eq!(cfg.plot_count(), Config::default().plot_count());
    }

    #[test]
    fn load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!("irrig-cfg-{}.toml", std::process::id()));
        std::fs::write(&path, "irrig_time_sec = 60\nrun_time_sec = 600\n").unwrap();
        let err = load(path.to_str().unwrap()).unwrap_err();
        assert!(format!("{err:#}").contains("run_time_sec (600)"));
        let _ = std::fs::remove_file(path);
    }

    // -- Timing -----------------------------------------------------------

    #[test]
    fn duty_cycle_ratio_violation_rejected() {
        let cfg = Config {
            run_time_sec: 1799,
            ..Config::default()
        };
        assert_validation_err(&cfg, "must be at least 15 x 4 plots x irrig_time_sec (30) = 1800");
    }

    #[test]
    fn huge_irrig_time_reported_not_panicking() {
        let cfg: Config =
            toml::from_str("irrig_time_sec = 1000000000000000000\nrun_time_sec = 1800").unwrap();
        assert_validation_err(&cfg, "irrig_time_sec (1000000000000000000) is too large");
    }

    #[test]
    fn overflowing_timing_fails_duty_cycle() {
        let timing = Timing {
            irrig_time: Duration::from_secs(u64::MAX / 2),
            run_time: Duration::MAX,
            overhead: Duration::ZERO,
        };
        assert_eq!(timing.required_run_time(4), None);
        assert!(!timing.duty_cycle_ok(4));
        assert_eq!(timing.decision_phase(4), Duration::MAX);
        assert_eq!(timing.rest_period(4), Duration::ZERO);
    }

    #[test]
    fn zero_irrig_time_rejected() {
        let cfg = Config {
            irrig_time_sec: 0,
            ..Config::default()
        };
        assert_validation_err(&cfg, "irrig_time_sec must be positive");
    }

    #[test]
    fn rest_period_subtracts_decision_phase_and_overhead() {
        let cfg = Config::default();
        let timing = Timing::from_config(&cfg);
        assert_eq!(
            timing.rest_period(4),
            Duration::from_secs(1800 - 120) - Duration::from_millis(785)
        );
    }

    #[test]
    fn rest_period_never_negative() {
        let timing = Timing {
            irrig_time: Duration::from_secs(30),
            run_time: Duration::from_secs(10),
            overhead: Duration::from_millis(785),
        };
        assert_eq!(timing.rest_period(2), Duration::ZERO);
    }

    // -- Calibration ------------------------------------------------------

    #[test]
    fn zero_adc_max_rejected() {
        let mut cfg = Config::default();
        cfg.calibration.adc_max = 0;
        assert_validation_err(&cfg, "adc_max must be positive");
    }

    #[test]
    fn inverted_valid_range_rejected() {
        let mut cfg = Config::default();
        cfg.calibration.valid_min = 0.9;
        assert_validation_err(&cfg, "must be below valid_max");
    }

    // -- Plots ------------------------------------------------------------

    #[test]
    fn no_plots_rejected() {
        let cfg = Config {
            plots: vec![],
            ..Config::default()
        };
        assert_validation_err(&cfg, "at least one plot is required");
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let mut cfg = Config::default();
        cfg.plots[0].threshold = 1.5;
        assert_validation_err(&cfg, "plot 1: threshold 1.5 out of range");
    }

    #[test]
    fn nan_threshold_rejected() {
        let mut cfg = Config::default();
        cfg.plots[2].threshold = f32::NAN;
        assert_validation_err(&cfg, "plot 3: threshold NaN");
    }

    #[test]
    fn channel_beyond_bank_rejected() {
        let mut cfg = Config::default();
        cfg.plots[0].channel = 16;
        assert_validation_err(&cfg, "channel 16 out of range");
    }

    #[test]
    fn duplicate_channel_rejected() {
        let mut cfg = Config::default();
        cfg.plots[1].channel = 0;
        assert_validation_err(&cfg, "plot 2: channel 0 is already used");
    }

    #[test]
    fn reserved_gpio_rejected() {
        let mut cfg = Config::default();
        cfg.plots[0].relay_gpio = 2;
        assert_validation_err(&cfg, "not a valid BCM GPIO pin");
    }

    #[test]
    fn relay_on_led_pin_rejected() {
        let mut cfg = Config::default();
        cfg.plots[0].relay_gpio = GREEN_LED_GPIO;
        assert_validation_err(&cfg, "plot 1: relay_gpio 20 is already in use");
    }

    #[test]
    fn duplicate_relay_rejected() {
        let cfg = Config {
            run_time_sec: 900,
            plots: vec![plot(0, 22), plot(1, 22)],
            ..Config::default()
        };
        assert_validation_err(&cfg, "plot 2: relay_gpio 22 is already in use");
    }

    #[test]
    fn same_led_pins_rejected() {
        let mut cfg = Config::default();
        cfg.status_led.red_gpio = cfg.status_led.green_gpio;
        assert_validation_err(&cfg, "must differ");
    }

    // -- Multiple errors reported at once ---------------------------------

    #[test]
    fn multiple_errors_collected() {
        let mut cfg = Config {
            run_time_sec: 60,
            plots: vec![plot(0, 1), plot(0, 5)],
            ..Config::default()
        };
        cfg.calibration.vref = 0.0;
        let msg = format!("{:#}", cfg.validate().unwrap_err());
        assert!(msg.contains("run_time_sec (60)"), "missing duty error in: {msg}");
        assert!(msg.contains("vref must be positive"), "missing vref error in: {msg}");
        assert!(msg.contains("channel 0 is already used"), "missing channel error in: {msg}");
        assert!(msg.contains("not a valid BCM GPIO pin"), "missing gpio error in: {msg}");
    }
}
