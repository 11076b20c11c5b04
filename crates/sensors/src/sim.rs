//! Stateful soil and climate simulator for running the controller without
//! probes attached.
//!
//! Each probe is a mean-reverting random walk with a per-scenario drying
//! drift, a fixed per-probe offset, converter noise and the odd spike.  A
//! probe whose valve is open gets wetter every sample.
//!
//! State is tracked as a wetness fraction (0.0 = `raw_dry`, 1.0 = `raw_wet`)
//! so the same model works for probes whose code rises with moisture (10HS)
//! and ones whose code falls (most capacitive boards).

use std::fmt;

// ---------------------------------------------------------------------------
// Normal samples from fastrand
// ---------------------------------------------------------------------------

/// Irwin-Hall: twelve uniforms minus six is close enough to N(0, 1).
fn approx_std_normal() -> f64 {
    let mut sum: f64 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f64();
    }
    sum - 6.0
}

/// Sample from N(mean, sigma).
fn gaussian(mean: f64, sigma: f64) -> f64 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Scenario presets
// ---------------------------------------------------------------------------

/// Soil and air behaviour profile, picked with `SIM_SCENARIO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Mid-range start drying slowly; spikes on about 3% of reads.
    Drying,
    /// Hovers near the centre.  Low noise, rare spikes.
    Stable,
    /// High noise, ~10% spike rate, and the air sensor drops out now and
    /// then.  Exercises the fault indicator and NaN handling.
    Flaky,
    /// Starts near the wet end.  Very slow drying.  Plots should rarely
    /// need water.
    Wet,
}

impl Scenario {
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Self::Stable,
            "flaky" => Self::Flaky,
            "wet" => Self::Wet,
            _ => Self::Drying, // default
        }
    }

    fn params(self) -> Params {
        match self {
            Self::Drying => Params {
                drift: -0.004,
                walk_sigma: 0.010,
                mean_reversion: 0.02,
                noise_sigma: 0.006,
                spike_prob: 0.03,
                spike_sigma: 0.14,
                start: 0.5,
                dropout_prob: 0.0,
            },
            Self::Stable => Params {
                drift: -0.0005,
                walk_sigma: 0.004,
                mean_reversion: 0.05,
                noise_sigma: 0.003,
                spike_prob: 0.005,
                spike_sigma: 0.07,
                start: 0.5,
                dropout_prob: 0.0,
            },
            Self::Flaky => Params {
                drift: -0.002,
                walk_sigma: 0.018,
                mean_reversion: 0.02,
                noise_sigma: 0.015,
                spike_prob: 0.10,
                spike_sigma: 0.20,
                start: 0.5,
                dropout_prob: 0.05,
            },
            Self::Wet => Params {
                drift: -0.001,
                walk_sigma: 0.006,
                mean_reversion: 0.02,
                noise_sigma: 0.004,
                spike_prob: 0.02,
                spike_sigma: 0.10,
                start: 0.8,
                dropout_prob: 0.0,
            },
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drying => write!(f, "drying"),
            Self::Stable => write!(f, "stable"),
            Self::Flaky => write!(f, "flaky"),
            Self::Wet => write!(f, "wet"),
        }
    }
}

/// Model parameters, all in wetness-fraction units per sample.
struct Params {
    drift: f64,
    walk_sigma: f64,
    mean_reversion: f64,
    noise_sigma: f64,
    spike_prob: f64,
    spike_sigma: f64,
    start: f64,
    dropout_prob: f64,
}

// ---------------------------------------------------------------------------
// Soil
// ---------------------------------------------------------------------------

/// Internal state for a single simulated probe channel.
struct ProbeState {
    /// Current "true" wetness.  Evolves each sample.
    base: f64,
    /// Permanent per-probe calibration offset.
    offset: f64,
    noise_sigma: f64,
    watering: bool,
}

/// Wetness gained per sample while the plot's valve is open.
const WET_RATE: f64 = 0.05;

/// Centre the random walk reverts toward.
const CENTER: f64 = 0.5;

/// Stateful simulator producing realistic soil moisture ADC codes.
pub struct SoilMoistureSim {
    probes: Vec<ProbeState>,
    params: Params,
    raw_dry: f64,
    raw_wet: f64,
    adc_max: f64,
}

impl SoilMoistureSim {
    /// Create a simulator for `channels` probes.
    ///
    /// `raw_dry` / `raw_wet` are the ADC codes of bone-dry and saturated
    /// substrate; either may be the larger one.
    pub fn new(scenario: Scenario, channels: usize, raw_dry: f64, raw_wet: f64, adc_max: u16) -> Self {
        let params = scenario.params();
        let probes = (0..channels)
            .map(|_| ProbeState {
                base: (params.start + gaussian(0.0, 0.03)).clamp(0.0, 1.0),
                offset: gaussian(0.0, 0.02),
                noise_sigma: params.noise_sigma * (1.0 + 0.2 * approx_std_normal()).max(0.3),
                watering: false,
            })
            .collect();

        Self {
            probes,
            params,
            raw_dry,
            raw_wet,
            adc_max: adc_max as f64,
        }
    }

    /// Inform the simulator whether the valve feeding `channel` is open.
    pub fn set_watering(&mut self, channel: usize, active: bool) {
        if let Some(p) = self.probes.get_mut(channel) {
            p.watering = active;
        }
    }

    /// Produce the next ADC code for `channel`.  Unknown channels read 0,
    /// like a floating input pulled to ground.
    pub fn sample(&mut self, channel: usize) -> u16 {
        let Some(probe) = self.probes.get_mut(channel) else {
            return 0;
        };
        let p = &self.params;

        let pull = p.mean_reversion * (CENTER - probe.base);
        let walk = gaussian(0.0, p.walk_sigma);
        let wet = if probe.watering { WET_RATE } else { 0.0 };
        probe.base = (probe.base + p.drift + pull + walk + wet).clamp(-0.05, 1.05);

        let noise = gaussian(0.0, probe.noise_sigma);
        let spike = if fastrand::f64() < p.spike_prob {
            gaussian(0.0, p.spike_sigma)
        } else {
            0.0
        };

        let wetness = probe.base + probe.offset + noise + spike;
        let raw = self.raw_dry + wetness * (self.raw_wet - self.raw_dry);
        raw.round().clamp(0.0, self.adc_max) as u16
    }

    /// Number of probe channels in this simulator.
    pub fn channel_count(&self) -> usize {
        self.probes.len()
    }
}

// ---------------------------------------------------------------------------
// Climate
// ---------------------------------------------------------------------------

/// Greenhouse air simulator: temperature and relative humidity random walks
/// that occasionally fail to read (NaN) in the flaky scenario.
pub struct ClimateSim {
    temperature: f64,
    humidity: f64,
    dropout_prob: f64,
}

impl ClimateSim {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            temperature: gaussian(24.0, 1.5),
            humidity: gaussian(60.0, 5.0).clamp(20.0, 95.0),
            dropout_prob: scenario.params().dropout_prob,
        }
    }

    /// Next `(humidity %, temperature °C)` pair.
    pub fn sample(&mut self) -> (f32, f32) {
        self.temperature = (self.temperature + gaussian(0.0, 0.3)).clamp(5.0, 45.0);
        self.humidity = (self.humidity + gaussian(0.0, 1.0)).clamp(5.0, 100.0);

        if fastrand::f64() < self.dropout_prob {
            return (f32::NAN, f32::NAN);
        }
        (self.humidity as f32, self.temperature as f32)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
